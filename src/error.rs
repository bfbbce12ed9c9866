use crate::sim::ChipType;
use thiserror::Error;

/// Errors returned while building a circuit or applying a structural edit to it.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SimError {
    #[error("no chip named {0:?} in the library")]
    UnknownChip(String),
    #[error("chip {chip:?} has more than one pin with id {pin_id}")]
    DuplicatePinId { chip: String, pin_id: i32 },
    #[error("pin {pin_id} of chip {chip:?} has invalid width {width}")]
    InvalidPinWidth {
        chip: String,
        pin_id: i32,
        width: usize,
    },
    #[error("chip {chip:?} doesn't have the pin layout of a {chip_type} chip")]
    InvalidPinLayout { chip: String, chip_type: ChipType },
    #[error("no pin with id {pin_id} owned by {owner_id} in chip {chip:?}")]
    PinNotFound {
        chip: String,
        owner_id: i32,
        pin_id: i32,
    },
    #[error("no subchip with id {sub_chip_id} in chip {chip:?}")]
    SubChipNotFound { chip: String, sub_chip_id: i32 },
    #[error("chip {chip:?} already has a subchip with id {sub_chip_id}")]
    DuplicateSubChipId { chip: String, sub_chip_id: i32 },
    #[error("no chip at path {0:?}")]
    ChipPathNotFound(Vec<i32>),
    #[error("chip {0:?} contains itself")]
    RecursiveDefinition(String),
    #[error("the simulator is no longer receiving commands")]
    SimulatorDisconnected,
}

pub type SimResult<T> = Result<T, SimError>;
