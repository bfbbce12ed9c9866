//! Hierarchical, tri-state digital logic chip simulation.
//!
//! Chips are described with [description::ChipDescription]s and collected in a
//! [description::ChipLibrary]. A [sim::Simulator] flattens a description into a
//! [sim::Circuit] arena and advances it one tick at a time, caching the truth
//! tables of combinational chips as it goes.
pub mod circuits;
pub mod data_structures;
pub mod description;
pub mod error;
pub mod sim;
pub use error::{SimError, SimResult};
