use super::cache::LutState;
use super::pin::NEVER;
use super::{ChipIndex, ChipType, PinIndex};

/// A node of the simulated chip tree.
///
/// Built-in chips are leaves whose behavior lives in [super::builtin], custom chips own an ordered
/// list of subchips. The order of [SimChip::sub_chips] is the evaluation order discovered by the
/// last reorder pass, the last subchip is evaluated first.
#[derive(Debug, Clone)]
pub struct SimChip {
    pub(crate) name: String,
    pub(crate) id: i32,
    pub(crate) chip_type: ChipType,
    pub(crate) parent: Option<ChipIndex>,
    pub(crate) inputs: Vec<PinIndex>,
    pub(crate) outputs: Vec<PinIndex>,
    pub(crate) sub_chips: Vec<ChipIndex>,
    pub(crate) internal_state: Vec<u32>,
    pub(crate) should_be_cached: bool,
    pub(crate) num_connected_inputs: usize,
    pub(crate) num_inputs_ready: usize,
    pub(crate) ready_frame: u64,
    pub(crate) lut: LutState,
    /// Set once the chip or anything inside it has been changed after it was built.
    pub(crate) edited: bool,
}
impl SimChip {
    pub(crate) fn new(
        name: String,
        id: i32,
        chip_type: ChipType,
        parent: Option<ChipIndex>,
        should_be_cached: bool,
    ) -> SimChip {
        SimChip {
            name,
            id,
            chip_type,
            parent,
            inputs: Vec::new(),
            outputs: Vec::new(),
            sub_chips: Vec::new(),
            internal_state: vec![0; chip_type.internal_state_len()],
            should_be_cached,
            num_connected_inputs: 0,
            num_inputs_ready: 0,
            ready_frame: NEVER,
            lut: LutState::NotBuilt,
            edited: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the chip among its siblings, -1 for the root.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    pub fn is_builtin(&self) -> bool {
        self.chip_type.is_builtin()
    }

    pub fn parent(&self) -> Option<ChipIndex> {
        self.parent
    }

    pub fn inputs(&self) -> &[PinIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PinIndex] {
        &self.outputs
    }

    pub fn sub_chips(&self) -> &[ChipIndex] {
        &self.sub_chips
    }

    pub fn internal_state(&self) -> &[u32] {
        &self.internal_state
    }

    /// Returns true if the chip no longer matches the definition it was built from.
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Number of input pins with at least one driver.
    pub fn num_connected_inputs(&self) -> usize {
        self.num_connected_inputs
    }

    /// Overwrites the internal state with `data`, truncated or zero padded to the current length.
    ///
    /// Chips without a fixed internal state length take `data` as is.
    pub fn set_internal_state(&mut self, data: &[u32]) {
        if self.chip_type.internal_state_len() == 0 {
            self.internal_state = data.to_vec();
            return;
        }
        let n = data.len().min(self.internal_state.len());
        self.internal_state[..n].copy_from_slice(&data[..n]);
        for v in &mut self.internal_state[n..] {
            *v = 0;
        }
    }

    /// Returns true once every driven input has received all of its drivers during `frame`.
    pub fn is_ready(&self, frame: u64) -> bool {
        let ready = if self.ready_frame == frame {
            self.num_inputs_ready
        } else {
            0
        };
        ready == self.num_connected_inputs
    }

    /// Called by an input pin that has received all of its drivers during `frame`.
    pub(crate) fn mark_input_ready(&mut self, frame: u64) {
        if self.ready_frame != frame {
            self.ready_frame = frame;
            self.num_inputs_ready = 0;
        }
        self.num_inputs_ready += 1;
    }

    pub(crate) fn reset_ready(&mut self) {
        self.num_inputs_ready = 0;
        self.ready_frame = NEVER;
    }
}
