use super::chip_type::ADDRESS_SPACE_8_BIT;
use super::{ChipIndex, ChipType, PinIndex, SimChip, SimPin, Simulator};
use crate::data_structures::{BitState, Logic, Slab};
use smallvec::SmallVec;
use ChipType::*;

const PULSE_DURATION: usize = 0;
const PULSE_TICKS_REMAINING: usize = 1;
const PULSE_INPUT_OLD: usize = 2;

/// Index of the previous clock level in the internal state of clocked memories and displays.
const MEMORY_CLOCK: usize = ADDRESS_SPACE_8_BIT;
const DISPLAY_CLOCK: usize = ADDRESS_SPACE_8_BIT * 2;

#[inline(always)]
fn state(pins: &Slab<SimPin>, pin: PinIndex) -> &BitState {
    &pins[pin.idx].state
}

#[inline(always)]
fn state_mut(pins: &mut Slab<SimPin>, pin: PinIndex) -> &mut BitState {
    &mut pins[pin.idx].state
}

/// Value bits of an input, disconnected bits read as 0.
#[inline(always)]
fn value(pins: &Slab<SimPin>, pin: PinIndex) -> u32 {
    state(pins, pin).value()
}

#[inline(always)]
fn high(pins: &Slab<SimPin>, pin: PinIndex) -> bool {
    state(pins, pin).first_bit_high()
}

/// 8 bit address of an input.
#[inline(always)]
fn address(pins: &Slab<SimPin>, pin: PinIndex) -> usize {
    (value(pins, pin) as usize) % ADDRESS_SPACE_8_BIT
}

fn copy_pin(pins: &mut Slab<SimPin>, from: PinIndex, to: PinIndex) {
    if let Some((to, from)) = pins.get_pair_mut(to.idx, from.idx) {
        to.state.copy_from(&from.state);
    }
}

/// Detects a rising edge of `clock_high` and remembers the level in `previous`.
#[inline(always)]
fn rising_edge(clock_high: bool, previous: &mut u32) -> bool {
    let rising = clock_high && *previous == 0;
    *previous = clock_high as u32;
    rising
}

/// Clocked write path shared by both displays: reset or write the back buffer, then optionally
/// flip it to the front.
fn update_display(
    memory: &mut [u32],
    rising: bool,
    reset: bool,
    write: Option<(usize, u32)>,
    refresh: bool,
) {
    if !rising {
        return;
    }
    let (front, back) = memory[..ADDRESS_SPACE_8_BIT * 2].split_at_mut(ADDRESS_SPACE_8_BIT);
    if reset {
        back.iter_mut().for_each(|v| *v = 0);
    } else if let Some((address, data)) = write {
        back[address] = data;
    }
    if refresh {
        front.copy_from_slice(back);
    }
}

/// Evaluates the built-in chip `chip`: reads its inputs, updates its internal state and writes
/// its outputs.
///
/// # Panics
///
/// Panics if `chip` is a custom chip or its pins don't follow the built-in layout of its type.
pub(super) fn process_builtin_chip(sim: &mut Simulator, chip: ChipIndex) {
    let frame = sim.frame;
    let steps_per_clock_transition = sim.config.steps_per_clock_transition;
    let host = &mut sim.host;
    let pins = &mut sim.circuit.pins;
    let SimChip {
        chip_type,
        inputs,
        outputs,
        internal_state,
        ..
    } = &mut sim.circuit.chips[chip.idx];

    let mut rom_edited = false;
    match chip_type {
        Nand => {
            let nand = !(value(pins, inputs[0]) & value(pins, inputs[1])) & 1;
            state_mut(pins, outputs[0]).set_value(nand);
        }
        Clock => {
            let high = steps_per_clock_transition != 0
                && (frame / steps_per_clock_transition) % 2 == 0;
            state_mut(pins, outputs[0]).set_bit(0, Logic::from_bool(high));
        }
        Pulse => {
            let input = state(pins, inputs[0]);
            let input_high = input.first_bit_high();
            let input_disconnected = input.has_tristate();

            let mut ticks_remaining = internal_state[PULSE_TICKS_REMAINING];
            if ticks_remaining == 0 && input_high && internal_state[PULSE_INPUT_OLD] == 0 {
                ticks_remaining = internal_state[PULSE_DURATION];
                internal_state[PULSE_TICKS_REMAINING] = ticks_remaining;
            }

            let level = if ticks_remaining > 0 {
                internal_state[PULSE_TICKS_REMAINING] -= 1;
                Logic::High
            } else if input_disconnected {
                Logic::Disconnected
            } else {
                Logic::Low
            };
            state_mut(pins, outputs[0]).set_bit(0, level);
            internal_state[PULSE_INPUT_OLD] = input_high as u32;
        }
        TriStateBuffer => {
            if high(pins, inputs[1]) {
                copy_pin(pins, inputs[0], outputs[0]);
            } else {
                state_mut(pins, outputs[0]).set_all_disconnected();
            }
        }
        Key => {
            let key = char::from_u32(internal_state[0]).unwrap_or('\0');
            let held = host.key_is_held(key);
            state_mut(pins, outputs[0]).set_bit(0, Logic::from_bool(held));
        }
        Button | Toggle => {
            state_mut(pins, outputs[0]).set_value(internal_state[0] & 1);
        }
        DisplayRgb => {
            let address = address(pins, inputs[0]);
            let red = value(pins, inputs[1]);
            let green = value(pins, inputs[2]);
            let blue = value(pins, inputs[3]);
            let rising = rising_edge(high(pins, inputs[7]), &mut internal_state[DISPLAY_CLOCK]);
            let write = high(pins, inputs[5]).then(|| (address, red | green << 4 | blue << 8));
            update_display(
                internal_state,
                rising,
                high(pins, inputs[4]),
                write,
                high(pins, inputs[6]),
            );

            let color = internal_state[address];
            state_mut(pins, outputs[0]).set_value(color & 0xF);
            state_mut(pins, outputs[1]).set_value((color >> 4) & 0xF);
            state_mut(pins, outputs[2]).set_value((color >> 8) & 0xF);
        }
        DisplayDot => {
            let address = address(pins, inputs[0]);
            let pixel = high(pins, inputs[1]) as u32;
            let rising = rising_edge(high(pins, inputs[5]), &mut internal_state[DISPLAY_CLOCK]);
            let write = high(pins, inputs[3]).then(|| (address, pixel));
            update_display(
                internal_state,
                rising,
                high(pins, inputs[2]),
                write,
                high(pins, inputs[4]),
            );
            state_mut(pins, outputs[0]).set_value(internal_state[address]);
        }
        Ram8 => {
            let address = address(pins, inputs[0]);
            let data = value(pins, inputs[1]);
            let write = high(pins, inputs[2]);
            let reset = high(pins, inputs[3]);
            if rising_edge(high(pins, inputs[4]), &mut internal_state[MEMORY_CLOCK]) {
                if reset {
                    internal_state[..ADDRESS_SPACE_8_BIT]
                        .iter_mut()
                        .for_each(|v| *v = 0);
                } else if write {
                    internal_state[address] = data & 0xFF;
                }
            }
            state_mut(pins, outputs[0]).set_value(internal_state[address]);
        }
        Rom256x16 => {
            let data = internal_state[address(pins, inputs[0])];
            state_mut(pins, outputs[0]).set_value((data >> 8) & 0xFF);
            state_mut(pins, outputs[1]).set_value(data & 0xFF);
        }
        Eeprom256x16 => {
            let address = address(pins, inputs[0]);
            let write = high(pins, inputs[3]);
            let rising = rising_edge(high(pins, inputs[4]), &mut internal_state[MEMORY_CLOCK]);
            if write && rising {
                let high_byte = value(pins, inputs[1]) & 0xFF;
                let low_byte = value(pins, inputs[2]) & 0xFF;
                internal_state[address] = high_byte << 8 | low_byte;
                rom_edited = true;
            }
            let data = internal_state[address];
            state_mut(pins, outputs[0]).set_value((data >> 8) & 0xFF);
            state_mut(pins, outputs[1]).set_value(data & 0xFF);
        }
        Buzzer => {
            host.register_note(value(pins, inputs[0]), value(pins, inputs[1]));
        }
        Constant8 => {
            state_mut(pins, outputs[0]).set_value(internal_state[0]);
        }
        Split => {
            let input = std::mem::take(state_mut(pins, inputs[0]));
            let mut targets: SmallVec<[BitState; 8]> = outputs
                .iter()
                .map(|p| std::mem::take(state_mut(pins, *p)))
                .collect();
            input.handle_split(&mut targets);
            for (p, s) in outputs.iter().zip(targets) {
                *state_mut(pins, *p) = s;
            }
            *state_mut(pins, inputs[0]) = input;
        }
        Merge => {
            let mut output = std::mem::take(state_mut(pins, outputs[0]));
            output.handle_merge(inputs.iter().map(|p| state(pins, *p)));
            *state_mut(pins, outputs[0]) = output;
        }
        Bus => copy_pin(pins, inputs[0], outputs[0]),
        SevenSegmentDisplay | DisplayLed | Detector | InPin | OutPin | BusTerminus | Rtc | Sps => {}
        Custom => unreachable!("Tried to process a custom chip as a built-in"),
    }

    if rom_edited {
        sim.host.rom_contents_edited(&sim.circuit.chips[chip.idx]);
    }
}
