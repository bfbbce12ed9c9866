use crate::data_structures::SlabIndex;
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};

/// Id of the root chip, and the owner id of a chip's own boundary pins in a [PinAddress].
pub const ROOT_ID: i32 = -1;

/// Represents the index of a chip in a [super::Circuit].
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct ChipIndex {
    pub(super) idx: SlabIndex,
}
impl Display for ChipIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "chip#{}", self.idx)
    }
}

/// Represents the index of a pin in a [super::Circuit].
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct PinIndex {
    pub(super) idx: SlabIndex,
}
impl Display for PinIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.idx)
    }
}

macro_rules! ci {
    ( $x:expr ) => {{
        ChipIndex { idx: $x }
    }};
}
macro_rules! pi {
    ( $x:expr ) => {{
        PinIndex { idx: $x }
    }};
}
pub(super) use ci;
pub(super) use pi;

/// Address of a pin inside one chip scope.
///
/// `owner_id` is the id of the subchip that owns the pin, or [ROOT_ID] for the scope's own
/// boundary pins.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct PinAddress {
    pub owner_id: i32,
    pub pin_id: i32,
}
impl PinAddress {
    pub const fn new(owner_id: i32, pin_id: i32) -> PinAddress {
        PinAddress { owner_id, pin_id }
    }

    /// Address of the boundary pin `pin_id` of the current scope.
    pub const fn boundary(pin_id: i32) -> PinAddress {
        PinAddress::new(ROOT_ID, pin_id)
    }

    pub fn is_boundary(&self) -> bool {
        self.owner_id == ROOT_ID
    }
}
impl Display for PinAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_id, self.pin_id)
    }
}

/// Path of subchip ids leading from the root chip to a nested chip, the empty path is the root.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ChipPath(pub SmallVec<[i32; 4]>);
impl ChipPath {
    pub fn root() -> ChipPath {
        ChipPath::default()
    }

    /// Returns the path of the subchip `sub_chip_id` of the chip at `self`.
    pub fn child(&self, sub_chip_id: i32) -> ChipPath {
        let mut path = self.clone();
        path.0.push(sub_chip_id);
        path
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}
impl From<&[i32]> for ChipPath {
    fn from(ids: &[i32]) -> Self {
        ChipPath(ids.iter().copied().collect())
    }
}
impl Display for ChipPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}
