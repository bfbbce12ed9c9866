mod bit_state;
mod slab;
pub use bit_state::*;
pub use slab::{Slab, SlabIndex};
