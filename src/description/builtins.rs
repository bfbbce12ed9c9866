//! Pin layouts of the built-in chips.
//!
//! The simulator reads and writes built-in pins by position, the order of the pins here is the
//! order [crate::sim::builtin] expects.
use super::{ChipDescription, ChipLibrary};
use crate::error::{SimError, SimResult};
use crate::sim::ChipType;
use num_integer::Integer;

/// Widths of the dev pins, buses and split/merge chips added by [ChipLibrary::with_builtins].
pub const DEFAULT_PIN_WIDTHS: [usize; 3] = [1, 4, 8];
/// `(wide, narrow)` width pairs of the split and merge chips added by [ChipLibrary::with_builtins].
pub const DEFAULT_SPLIT_MERGE_PAIRS: [(usize, usize); 3] = [(4, 1), (8, 4), (8, 1)];

fn builtin(chip_type: ChipType) -> ChipDescription {
    ChipDescription::new(chip_type.to_string(), chip_type)
}

pub fn nand() -> ChipDescription {
    builtin(ChipType::Nand)
        .with_input("IN B", 0, 1)
        .with_input("IN A", 1, 1)
        .with_output("OUT", 2, 1)
}

pub fn tri_state_buffer() -> ChipDescription {
    builtin(ChipType::TriStateBuffer)
        .with_input("IN", 0, 1)
        .with_input("ENABLE", 1, 1)
        .with_output("OUT", 2, 1)
}

pub fn clock() -> ChipDescription {
    builtin(ChipType::Clock).with_output("CLK", 0, 1)
}

pub fn pulse() -> ChipDescription {
    builtin(ChipType::Pulse)
        .with_input("IN", 0, 1)
        .with_output("PULSE", 1, 1)
}

pub fn ram_8() -> ChipDescription {
    builtin(ChipType::Ram8)
        .with_input("ADDRESS", 0, 8)
        .with_input("DATA", 1, 8)
        .with_input("WRITE", 2, 1)
        .with_input("RESET", 3, 1)
        .with_input("CLOCK", 4, 1)
        .with_output("OUT", 5, 8)
}

pub fn rom_256x16() -> ChipDescription {
    builtin(ChipType::Rom256x16)
        .with_input("ADDRESS", 0, 8)
        .with_output("OUT B", 1, 8)
        .with_output("OUT A", 2, 8)
}

pub fn eeprom_256x16() -> ChipDescription {
    builtin(ChipType::Eeprom256x16)
        .with_input("ADDRESS", 0, 8)
        .with_input("WRITE B", 1, 8)
        .with_input("WRITE A", 2, 8)
        .with_input("WRITE", 3, 1)
        .with_input("CLOCK", 4, 1)
        .with_output("OUT B", 5, 8)
        .with_output("OUT A", 6, 8)
}

pub fn constant_8() -> ChipDescription {
    builtin(ChipType::Constant8).with_output("VALUE OUT", 0, 8)
}

pub fn key() -> ChipDescription {
    builtin(ChipType::Key).with_output("OUT", 0, 1)
}

pub fn button() -> ChipDescription {
    builtin(ChipType::Button).with_output("OUT", 0, 1)
}

pub fn toggle() -> ChipDescription {
    builtin(ChipType::Toggle).with_output("OUT", 0, 1)
}

pub fn buzzer() -> ChipDescription {
    builtin(ChipType::Buzzer)
        .with_input("PITCH", 1, 8)
        .with_input("VOLUME", 0, 4)
}

pub fn display_rgb() -> ChipDescription {
    builtin(ChipType::DisplayRgb)
        .with_input("ADDRESS", 0, 8)
        .with_input("RED", 1, 4)
        .with_input("GREEN", 2, 4)
        .with_input("BLUE", 3, 4)
        .with_input("RESET", 4, 1)
        .with_input("WRITE", 5, 1)
        .with_input("REFRESH", 6, 1)
        .with_input("CLOCK", 7, 1)
        .with_output("R OUT", 8, 4)
        .with_output("G OUT", 9, 4)
        .with_output("B OUT", 10, 4)
}

pub fn display_dot() -> ChipDescription {
    builtin(ChipType::DisplayDot)
        .with_input("ADDRESS", 0, 8)
        .with_input("PIXEL IN", 1, 1)
        .with_input("RESET", 2, 1)
        .with_input("WRITE", 3, 1)
        .with_input("REFRESH", 4, 1)
        .with_input("CLOCK", 5, 1)
        .with_output("PIXEL OUT", 6, 1)
}

pub fn seven_segment() -> ChipDescription {
    ["A", "B", "C", "D", "E", "F", "G", "COL"]
        .iter()
        .enumerate()
        .fold(builtin(ChipType::SevenSegmentDisplay), |chip, (i, name)| {
            chip.with_input(*name, i as i32, 1)
        })
}

pub fn display_led() -> ChipDescription {
    builtin(ChipType::DisplayLed).with_input("IN", 0, 1)
}

/// Top level input of a circuit, it drives its single output pin.
pub fn in_pin(width: usize) -> ChipDescription {
    ChipDescription::new(format!("IN-{}", width), ChipType::InPin).with_output("OUT", 0, width)
}

/// Top level output of a circuit.
pub fn out_pin(width: usize) -> ChipDescription {
    ChipDescription::new(format!("OUT-{}", width), ChipType::OutPin).with_input("IN", 0, width)
}

pub fn bus(width: usize) -> ChipDescription {
    ChipDescription::new(format!("BUS-{}", width), ChipType::Bus)
        .with_input("IN", 0, width)
        .with_output("OUT", 1, width)
}

pub fn bus_terminus(width: usize) -> ChipDescription {
    ChipDescription::new(format!("BUS-TERMINUS-{}", width), ChipType::BusTerminus)
        .with_input("IN", 0, width)
}

/// Returns how many `narrow` slices fit in `wide`.
fn slice_count(wide: usize, narrow: usize) -> SimResult<usize> {
    let invalid = |name: String| SimError::InvalidPinWidth {
        chip: name,
        pin_id: 0,
        width: narrow,
    };
    if narrow == 0 || wide <= narrow {
        return Err(invalid(format!("{}-{}", wide, narrow)));
    }
    match Integer::div_rem(&wide, &narrow) {
        (count, 0) => Ok(count),
        _ => Err(invalid(format!("{}-{}", wide, narrow))),
    }
}

/// Splits a `wide` input into `wide / narrow` outputs, the last output carries the lowest bits.
pub fn split(wide: usize, narrow: usize) -> SimResult<ChipDescription> {
    let count = slice_count(wide, narrow)?;
    let mut chip = ChipDescription::new(format!("{}-{}", wide, narrow), ChipType::Split)
        .with_input("IN", 0, wide);
    for j in 0..count {
        let letter = (b'A' + (count - 1 - j) as u8 % 26) as char;
        chip = chip.with_output(format!("OUT {}", letter), j as i32 + 1, narrow);
    }
    Ok(chip)
}

/// Merges `wide / narrow` inputs into a `wide` output, the last input provides the lowest bits.
pub fn merge(wide: usize, narrow: usize) -> SimResult<ChipDescription> {
    let count = slice_count(wide, narrow)?;
    let mut chip = ChipDescription::new(format!("{}-{}", narrow, wide), ChipType::Merge);
    for j in 0..count {
        let letter = (b'A' + (count - 1 - j) as u8 % 26) as char;
        chip = chip.with_input(format!("IN {}", letter), j as i32, narrow);
    }
    Ok(chip.with_output("OUT", count as i32, wide))
}

impl ChipLibrary {
    /// Returns a library with every built-in chip.
    pub fn with_builtins() -> ChipLibrary {
        let mut lib = ChipLibrary::new();
        for chip in [
            nand(),
            tri_state_buffer(),
            clock(),
            pulse(),
            ram_8(),
            rom_256x16(),
            eeprom_256x16(),
            constant_8(),
            key(),
            button(),
            toggle(),
            buzzer(),
            display_rgb(),
            display_dot(),
            seven_segment(),
            display_led(),
        ] {
            lib.add(chip);
        }
        for width in DEFAULT_PIN_WIDTHS {
            lib.add(in_pin(width));
            lib.add(out_pin(width));
            lib.add(bus(width));
            lib.add(bus_terminus(width));
        }
        for (wide, narrow) in DEFAULT_SPLIT_MERGE_PAIRS {
            for chip in [merge(wide, narrow), split(wide, narrow)].into_iter().flatten() {
                lib.add(chip);
            }
        }
        lib
    }
}
