use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display, EnumIter};

/// Number of addresses of every 8 bit addressed memory and display.
pub const ADDRESS_SPACE_8_BIT: usize = 256;

/// Kind of a simulated chip.
///
/// Every kind except [ChipType::Custom] is a leaf with behavior implemented by the simulator,
/// a custom chip is defined entirely by its subchips and wires.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumIter, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ChipType {
    #[strum(to_string = "CUSTOM")]
    Custom,
    #[strum(to_string = "NAND")]
    Nand,
    #[strum(to_string = "3-STATE BUFFER")]
    TriStateBuffer,
    #[strum(to_string = "CLOCK")]
    Clock,
    #[strum(to_string = "PULSE")]
    Pulse,
    #[strum(to_string = "DETECTOR")]
    Detector,
    #[strum(to_string = "RAM-8")]
    Ram8,
    #[strum(to_string = "ROM 256×16")]
    Rom256x16,
    #[strum(to_string = "EEPROM 256×16")]
    Eeprom256x16,
    #[strum(to_string = "7-SEGMENT")]
    SevenSegmentDisplay,
    #[strum(to_string = "RGB DISPLAY")]
    DisplayRgb,
    #[strum(to_string = "DOT DISPLAY")]
    DisplayDot,
    #[strum(to_string = "LED")]
    DisplayLed,
    #[strum(to_string = "MERGE")]
    Merge,
    #[strum(to_string = "SPLIT")]
    Split,
    #[strum(to_string = "IN")]
    InPin,
    #[strum(to_string = "OUT")]
    OutPin,
    #[strum(to_string = "KEY")]
    Key,
    #[strum(to_string = "BUTTON")]
    Button,
    #[strum(to_string = "DIPSWITCH")]
    Toggle,
    #[strum(to_string = "CONST")]
    Constant8,
    #[strum(to_string = "BUS")]
    Bus,
    #[strum(to_string = "BUS-TERMINUS")]
    BusTerminus,
    #[strum(to_string = "BUZZER")]
    Buzzer,
    #[strum(to_string = "RTC")]
    Rtc,
    #[strum(to_string = "SPS")]
    Sps,
}
use ChipType::*;

impl ChipType {
    pub fn is_builtin(&self) -> bool {
        *self != Custom
    }

    /// Returns true for the origin of a bus, which must be evaluated after every other
    /// chip driving the bus.
    pub fn is_bus_origin(&self) -> bool {
        *self == Bus
    }

    pub fn is_bus_terminus(&self) -> bool {
        *self == BusTerminus
    }

    pub fn is_bus(&self) -> bool {
        self.is_bus_origin() || self.is_bus_terminus()
    }

    pub fn is_rom(&self) -> bool {
        matches!(self, Rom256x16 | Eeprom256x16)
    }

    /// Returns true if a built-in chip's outputs depend only on its current inputs.
    ///
    /// Constant and ROM contents only change between ticks so they count as combinational.
    /// Returns [None] for [ChipType::Custom], whose answer depends on its contents.
    pub fn is_combinational_builtin(&self) -> Option<bool> {
        match self {
            Custom => None,
            Nand | TriStateBuffer | Detector | Merge | Split | Constant8 | Rom256x16 | InPin
            | OutPin | Bus | BusTerminus => Some(true),
            Clock | Pulse | Ram8 | SevenSegmentDisplay | DisplayRgb | DisplayDot | DisplayLed
            | Key | Button | Toggle | Buzzer | Eeprom256x16 | Rtc | Sps => Some(false),
        }
    }

    /// Returns the length of the internal state of a chip of this type.
    pub fn internal_state_len(&self) -> usize {
        match self {
            // Front buffer, back buffer, previous clock.
            DisplayRgb | DisplayDot => ADDRESS_SPACE_8_BIT * 2 + 1,
            // Memory, previous clock.
            Ram8 | Eeprom256x16 => ADDRESS_SPACE_8_BIT + 1,
            Rom256x16 => ADDRESS_SPACE_8_BIT,
            // Duration, ticks remaining, previous input.
            Pulse => 3,
            Constant8 | Key | Button | Toggle => 1,
            _ => 0,
        }
    }

    /// Returns the input and output widths of a built-in kind whose pins are read by position.
    ///
    /// Returns [None] for [ChipType::Custom] and for kinds without a fixed layout, such as
    /// split and merge chips, buses and passive sinks.
    pub fn fixed_pin_widths(&self) -> Option<(&'static [usize], &'static [usize])> {
        let layout: (&'static [usize], &'static [usize]) = match self {
            Nand | TriStateBuffer => (&[1, 1], &[1]),
            Clock | Key | Button | Toggle => (&[], &[1]),
            Pulse => (&[1], &[1]),
            Ram8 => (&[8, 8, 1, 1, 1], &[8]),
            Rom256x16 => (&[8], &[8, 8]),
            Eeprom256x16 => (&[8, 8, 8, 1, 1], &[8, 8]),
            Constant8 => (&[], &[8]),
            Buzzer => (&[8, 4], &[]),
            // Address, red, green, blue, reset, write, refresh, clock.
            DisplayRgb => (&[8, 4, 4, 4, 1, 1, 1, 1], &[4, 4, 4]),
            // Address, pixel, reset, write, refresh, clock.
            DisplayDot => (&[8, 1, 1, 1, 1, 1], &[1]),
            Custom | Merge | Split | Bus | BusTerminus | InPin | OutPin | SevenSegmentDisplay
            | DisplayLed | Detector | Rtc | Sps => return None,
        };
        Some(layout)
    }
}
