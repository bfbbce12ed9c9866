use super::{ChipIndex, PinIndex};
use crate::data_structures::BitState;
use smallvec::SmallVec;

/// Frame stamp of a pin or chip that has not received anything yet.
pub(crate) const NEVER: u64 = u64::MAX;

/// A signal terminal of a simulated chip.
///
/// Pins fan out to the pins listed in [SimPin::targets]. An input pin counts how many of its
/// drivers have delivered a signal during the current frame, once all of them have it notifies
/// its chip through [super::SimChip]'s ready counter.
#[derive(Debug, Clone)]
pub struct SimPin {
    pub(crate) id: i32,
    pub(crate) is_input: bool,
    pub(crate) parent: ChipIndex,
    pub(crate) state: BitState,
    pub(crate) targets: SmallVec<[PinIndex; 2]>,
    pub(crate) num_input_connections: usize,
    pub(crate) num_inputs_received_this_frame: usize,
    pub(crate) last_updated_frame: u64,
    pub(crate) latest_source_id: i32,
    pub(crate) latest_source_parent_chip_id: i32,
}
impl SimPin {
    /// Returns an undriven pin, all of its bits are disconnected.
    pub(crate) fn new(id: i32, is_input: bool, parent: ChipIndex, width: usize) -> SimPin {
        SimPin {
            id,
            is_input,
            parent,
            state: BitState::disconnected(width),
            targets: SmallVec::new(),
            num_input_connections: 0,
            num_inputs_received_this_frame: 0,
            last_updated_frame: NEVER,
            latest_source_id: -1,
            latest_source_parent_chip_id: -1,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_input(&self) -> bool {
        self.is_input
    }

    pub fn parent(&self) -> ChipIndex {
        self.parent
    }

    pub fn state(&self) -> &BitState {
        &self.state
    }

    pub fn width(&self) -> usize {
        self.state.width()
    }

    /// Pins this pin drives.
    pub fn targets(&self) -> &[PinIndex] {
        &self.targets
    }

    /// Number of wires driving this pin.
    pub fn num_input_connections(&self) -> usize {
        self.num_input_connections
    }

    /// Returns `(pin id, parent chip id)` of the driver that last changed this pin,
    /// `(-1, -1)` if no driver has.
    pub fn latest_source(&self) -> (i32, i32) {
        (self.latest_source_id, self.latest_source_parent_chip_id)
    }

    /// Forgets what has been received this frame.
    pub(crate) fn reset_received(&mut self) {
        self.num_inputs_received_this_frame = 0;
        self.last_updated_frame = NEVER;
    }

    /// Removes one driver, an undriven pin goes back to being fully disconnected.
    ///
    /// Returns true if this was the last driver.
    pub(crate) fn drop_driver(&mut self) -> bool {
        self.num_input_connections = self.num_input_connections.saturating_sub(1);
        if self.num_input_connections == 0 {
            self.state.set_all_disconnected();
            self.latest_source_id = -1;
            self.latest_source_parent_chip_id = -1;
            true
        } else {
            false
        }
    }
}
