mod builtin;
mod cache;
mod chip;
mod chip_type;
mod circuit;
mod commands;
mod config;
mod handles;
mod host;
mod pin;
#[cfg(test)]
mod scenarios;
mod simulator;
pub use cache::{CacheAborted, CacheEntry, CacheMonitor, CacheRegistry, LookupTable, LutState};
pub use chip::*;
pub use chip_type::*;
pub use circuit::*;
pub use commands::*;
pub use config::*;
pub use handles::{ChipIndex, ChipPath, PinAddress, PinIndex, ROOT_ID};
pub use host::*;
pub use pin::SimPin;
pub use simulator::*;
