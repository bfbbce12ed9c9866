use super::{ChipPath, Simulator};
use crate::data_structures::BitState;
use crate::description::{ChipDescription, ChipLibrary, WireDescription};
use crate::error::{SimError, SimResult};
use crossbeam_channel::Sender;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A structural edit or external input, queued from another thread and applied by the
/// [Simulator] between two ticks.
#[derive(Debug, Clone)]
pub enum SimCommand {
    AddSubChip {
        parent: ChipPath,
        description: ChipDescription,
        /// Definitions of the chips nested inside `description`.
        library: Arc<ChipLibrary>,
        sub_chip_id: i32,
        internal_data: Option<Vec<u32>>,
    },
    RemoveSubChip {
        parent: ChipPath,
        sub_chip_id: i32,
    },
    AddConnection {
        chip: ChipPath,
        wire: WireDescription,
    },
    RemoveConnection {
        chip: ChipPath,
        wire: WireDescription,
    },
    AddPin {
        chip: ChipPath,
        pin_id: i32,
        is_input: bool,
        width: usize,
    },
    RemovePin {
        chip: ChipPath,
        pin_id: i32,
    },
    SetInternalState {
        chip: ChipPath,
        data: Vec<u32>,
    },
    /// Sets the externally driven state of the root input pin `pin_id`.
    SetDevInput {
        pin_id: i32,
        state: BitState,
    },
}

impl SimCommand {
    /// Returns true if applying the command changes the topology of the chip tree.
    pub fn is_structural(&self) -> bool {
        !matches!(self, SimCommand::SetDevInput { .. })
    }

    pub(super) fn apply(self, sim: &mut Simulator) -> SimResult<()> {
        use SimCommand::*;
        match self {
            AddSubChip {
                parent,
                description,
                library,
                sub_chip_id,
                internal_data,
            } => {
                let scope = sim.circuit.chip_at(&parent)?;
                sim.circuit.add_sub_chip(
                    scope,
                    &description,
                    &library,
                    sub_chip_id,
                    internal_data.as_deref(),
                    &mut sim.rng,
                )?;
                sim.invalidate_cache(scope);
            }
            RemoveSubChip {
                parent,
                sub_chip_id,
            } => {
                let scope = sim.circuit.chip_at(&parent)?;
                sim.circuit.remove_sub_chip(scope, sub_chip_id)?;
                sim.invalidate_cache(scope);
            }
            AddConnection { chip, wire } => {
                let scope = sim.circuit.chip_at(&chip)?;
                sim.circuit.connect(scope, wire)?;
                sim.invalidate_cache(scope);
            }
            RemoveConnection { chip, wire } => {
                let scope = sim.circuit.chip_at(&chip)?;
                sim.circuit.disconnect(scope, wire)?;
                sim.invalidate_cache(scope);
            }
            AddPin {
                chip,
                pin_id,
                is_input,
                width,
            } => {
                let c = sim.circuit.chip_at(&chip)?;
                sim.circuit.add_pin(c, pin_id, is_input, width)?;
                sim.invalidate_cache(c);
            }
            RemovePin { chip, pin_id } => {
                let c = sim.circuit.chip_at(&chip)?;
                sim.circuit.remove_pin(c, pin_id)?;
                if c == sim.circuit.root() {
                    sim.dev_inputs.shift_remove(&pin_id);
                }
                sim.invalidate_cache(c);
            }
            SetInternalState { chip, data } => {
                let c = sim.circuit.chip_at(&chip)?;
                sim.circuit.chip_mut(c).set_internal_state(&data);
                sim.invalidate_cache(c);
            }
            SetDevInput { pin_id, state } => {
                sim.dev_inputs.insert(pin_id, state);
            }
        }
        Ok(())
    }
}

impl Display for SimCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use SimCommand::*;
        match self {
            AddSubChip {
                parent,
                description,
                sub_chip_id,
                ..
            } => write!(f, "add {}#{} to {}", description.name, sub_chip_id, parent),
            RemoveSubChip {
                parent,
                sub_chip_id,
            } => write!(f, "remove #{} from {}", sub_chip_id, parent),
            AddConnection { chip, wire } => {
                write!(f, "connect {} -> {} in {}", wire.source, wire.target, chip)
            }
            RemoveConnection { chip, wire } => {
                write!(f, "disconnect {} -> {} in {}", wire.source, wire.target, chip)
            }
            AddPin {
                chip,
                pin_id,
                is_input,
                width,
            } => {
                let kind = if *is_input { "input" } else { "output" };
                write!(f, "add {} bit {} pin {} to {}", width, kind, pin_id, chip)
            }
            RemovePin { chip, pin_id } => write!(f, "remove pin {} from {}", pin_id, chip),
            SetInternalState { chip, data } => {
                write!(f, "set {} words of internal state of {}", data.len(), chip)
            }
            SetDevInput { pin_id, state } => write!(f, "drive dev pin {} with {}", pin_id, state),
        }
    }
}

/// Cloneable handle used by other threads to queue [SimCommand]s for a [Simulator].
#[derive(Debug, Clone)]
pub struct SimCommandSender {
    pub(super) sender: Sender<SimCommand>,
}
impl SimCommandSender {
    /// Queues `command`, it is applied at the start of the next tick.
    pub fn send(&self, command: SimCommand) -> SimResult<()> {
        self.sender
            .send(command)
            .map_err(|_| SimError::SimulatorDisconnected)
    }

    pub fn set_dev_input(&self, pin_id: i32, state: BitState) -> SimResult<()> {
        self.send(SimCommand::SetDevInput { pin_id, state })
    }
}
