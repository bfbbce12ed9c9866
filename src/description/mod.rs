//! Definitions of chips as plain data, from which a [crate::sim::Circuit] is built.
pub mod builtins;

use crate::error::{SimError, SimResult};
use crate::sim::{ChipType, PinAddress};
use indexmap::{IndexMap, IndexSet};

/// One pin of a chip definition.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PinDescription {
    pub name: String,
    pub id: i32,
    pub width: usize,
}
impl PinDescription {
    pub fn new<S: Into<String>>(name: S, id: i32, width: usize) -> PinDescription {
        PinDescription {
            name: name.into(),
            id,
            width,
        }
    }
}

/// An instance of the chip definition `name` nested inside another chip.
///
/// `internal_data` is a persisted snapshot of the instance's internal state, such as ROM contents
/// or the value of a constant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubChipDescription {
    pub name: String,
    pub id: i32,
    pub internal_data: Option<Vec<u32>>,
}

/// A wire inside a chip, from an output (or boundary input) pin to an input (or boundary output) pin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WireDescription {
    pub source: PinAddress,
    pub target: PinAddress,
}

/// Definition of a chip: its pins and, for custom chips, its subchips and wiring.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChipDescription {
    pub name: String,
    pub chip_type: ChipType,
    pub input_pins: Vec<PinDescription>,
    pub output_pins: Vec<PinDescription>,
    pub sub_chips: Vec<SubChipDescription>,
    pub wires: Vec<WireDescription>,
    /// Opts a chip with many input bits into lookup table caching.
    pub should_be_cached: bool,
}
impl ChipDescription {
    /// Returns an empty definition of type `chip_type`.
    pub fn new<S: Into<String>>(name: S, chip_type: ChipType) -> ChipDescription {
        ChipDescription {
            name: name.into(),
            chip_type,
            input_pins: Vec::new(),
            output_pins: Vec::new(),
            sub_chips: Vec::new(),
            wires: Vec::new(),
            should_be_cached: false,
        }
    }

    /// Returns an empty custom chip definition.
    pub fn custom<S: Into<String>>(name: S) -> ChipDescription {
        Self::new(name, ChipType::Custom)
    }

    pub fn with_input<S: Into<String>>(mut self, name: S, id: i32, width: usize) -> Self {
        self.input_pins.push(PinDescription::new(name, id, width));
        self
    }

    pub fn with_output<S: Into<String>>(mut self, name: S, id: i32, width: usize) -> Self {
        self.output_pins.push(PinDescription::new(name, id, width));
        self
    }

    pub fn with_sub_chip<S: Into<String>>(mut self, name: S, id: i32) -> Self {
        self.sub_chips.push(SubChipDescription {
            name: name.into(),
            id,
            internal_data: None,
        });
        self
    }

    pub fn with_sub_chip_data<S: Into<String>>(mut self, name: S, id: i32, data: Vec<u32>) -> Self {
        self.sub_chips.push(SubChipDescription {
            name: name.into(),
            id,
            internal_data: Some(data),
        });
        self
    }

    pub fn with_wire(mut self, source: PinAddress, target: PinAddress) -> Self {
        self.wires.push(WireDescription { source, target });
        self
    }

    pub fn cached(mut self, should_be_cached: bool) -> Self {
        self.should_be_cached = should_be_cached;
        self
    }

    /// Checks that pin ids are unique and every width is at least 1.
    pub fn validate_pins(&self) -> SimResult<()> {
        let mut seen = IndexSet::new();
        for pin in self.input_pins.iter().chain(&self.output_pins) {
            if pin.width == 0 {
                return Err(SimError::InvalidPinWidth {
                    chip: self.name.clone(),
                    pin_id: pin.id,
                    width: pin.width,
                });
            }
            if !seen.insert(pin.id) {
                return Err(SimError::DuplicatePinId {
                    chip: self.name.clone(),
                    pin_id: pin.id,
                });
            }
        }
        Ok(())
    }
}

/// Collection of chip definitions keyed by name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ChipLibrary {
    chips: IndexMap<String, ChipDescription>,
}
impl ChipLibrary {
    pub fn new() -> ChipLibrary {
        Default::default()
    }

    /// Adds `chip` to the library and returns the definition it replaced.
    pub fn add(&mut self, chip: ChipDescription) -> Option<ChipDescription> {
        self.chips.insert(chip.name.clone(), chip)
    }

    pub fn with(mut self, chip: ChipDescription) -> Self {
        self.add(chip);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<ChipDescription> {
        self.chips.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ChipDescription> {
        self.chips.get(name)
    }

    /// Like [ChipLibrary::get] but returns [SimError::UnknownChip] for a missing name.
    pub fn lookup(&self, name: &str) -> SimResult<&ChipDescription> {
        self.get(name)
            .ok_or_else(|| SimError::UnknownChip(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chips.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChipDescription> {
        self.chips.values()
    }
}
