//! Composite chips built out of NANDs.
mod adder;
mod gates;
mod sr_latch;
pub use adder::*;
pub use gates::{and, not, or, xor};
pub use sr_latch::*;

use crate::description::ChipLibrary;

/// Returns the built-in chips plus every chip of this module.
pub fn library() -> ChipLibrary {
    ChipLibrary::with_builtins()
        .with(not())
        .with(and())
        .with(or())
        .with(xor())
        .with(sr_latch())
        .with(half_adder())
}
