//! End to end behavior of whole circuits.
use super::cache::{calculate_lut, try_processing_from_cache};
use super::*;
use crate::circuits;
use crate::data_structures::{BitState, Logic};
use crate::description::{ChipDescription, ChipLibrary, WireDescription};
use proptest::prelude::*;
use std::sync::Arc;

fn simulator(desc: &ChipDescription, library: &ChipLibrary, seed: u64) -> Simulator {
    Simulator::build(desc, library, SimConfig::seeded(seed), NullHost).unwrap()
}

fn drive(sim: &mut Simulator, pin_id: i32, width: usize, value: u32) {
    sim.set_dev_input(pin_id, BitState::from_value(width, value));
}

#[test]
fn test_nand_truth_table() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("A", 0, 1)
        .with_input("B", 1, 1)
        .with_output("OUT", 2, 1)
        .with_sub_chip("NAND", 0)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 1))
        .with_wire(PinAddress::boundary(1), PinAddress::new(0, 0))
        .with_wire(PinAddress::new(0, 2), PinAddress::boundary(2));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    for (a, b, expected) in [(0, 0, 1), (0, 1, 1), (1, 0, 1), (1, 1, 0)] {
        drive(&mut sim, 0, 1, a);
        drive(&mut sim, 1, 1, b);
        sim.run_simulation_step();
        assert_eq!(sim.output(2).unwrap().value(), expected, "{} {}", a, b);
    }
}

#[test]
fn test_pulse() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("IN", 0, 1)
        .with_output("OUT", 1, 1)
        .with_sub_chip_data("PULSE", 0, vec![3])
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::new(0, 1), PinAddress::boundary(1));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);

    let mut levels = Vec::new();
    drive(&mut sim, 0, 1, 1);
    sim.run_simulation_step();
    levels.push(sim.output(1).unwrap().tristated_value(0));
    drive(&mut sim, 0, 1, 0);
    for _ in 0..4 {
        sim.run_simulation_step();
        levels.push(sim.output(1).unwrap().tristated_value(0));
    }
    use Logic::*;
    assert_eq!(levels, vec![High, High, High, Low, Low]);
}

#[test]
fn test_pulse_passes_disconnected_input() {
    let desc = ChipDescription::custom("ROOT")
        .with_output("OUT", 1, 1)
        .with_sub_chip_data("PULSE", 0, vec![3])
        .with_wire(PinAddress::new(0, 1), PinAddress::boundary(1));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    sim.run_simulation_step();
    assert!(sim.output(1).unwrap().is_disconnected());
}

#[test]
fn test_ram() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("ADDRESS", 0, 8)
        .with_input("DATA", 1, 8)
        .with_input("WRITE", 2, 1)
        .with_input("RESET", 3, 1)
        .with_input("CLOCK", 4, 1)
        .with_output("OUT", 5, 8)
        .with_sub_chip("RAM-8", 0)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::boundary(1), PinAddress::new(0, 1))
        .with_wire(PinAddress::boundary(2), PinAddress::new(0, 2))
        .with_wire(PinAddress::boundary(3), PinAddress::new(0, 3))
        .with_wire(PinAddress::boundary(4), PinAddress::new(0, 4))
        .with_wire(PinAddress::new(0, 5), PinAddress::boundary(5));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 9);
    let step = |sim: &mut Simulator,
                address: u32,
                data: u32,
                write: u32,
                reset: u32,
                clock: u32| {
        let inputs = [(8, address), (8, data), (1, write), (1, reset), (1, clock)];
        for (pin_id, (width, value)) in inputs.into_iter().enumerate() {
            drive(sim, pin_id as i32, width, value);
        }
        sim.run_simulation_step();
        sim.output(5).unwrap().value()
    };

    step(&mut sim, 5, 0xAB, 1, 0, 0);
    assert_eq!(step(&mut sim, 5, 0xAB, 1, 0, 1), 0xAB);
    // Writes only happen on the rising edge.
    assert_eq!(step(&mut sim, 5, 0x12, 1, 0, 1), 0xAB);
    assert_eq!(step(&mut sim, 5, 0x12, 0, 0, 0), 0xAB);
    step(&mut sim, 6, 0x34, 1, 0, 1);
    assert_eq!(step(&mut sim, 5, 0, 0, 0, 0), 0xAB);
    assert_eq!(step(&mut sim, 6, 0, 0, 0, 0), 0x34);

    step(&mut sim, 5, 0, 0, 1, 1);
    assert_eq!(step(&mut sim, 5, 0, 0, 0, 0), 0);
    assert_eq!(step(&mut sim, 6, 0, 0, 0, 0), 0);
}

#[test]
fn test_rom_and_constant() {
    let mut rom_data = vec![0; 256];
    rom_data[3] = 0xBEEF;
    let desc = ChipDescription::custom("ROOT")
        .with_output("HIGH", 1, 8)
        .with_output("LOW", 2, 8)
        .with_sub_chip_data("CONST", 0, vec![3])
        .with_sub_chip_data("ROM 256×16", 1, rom_data)
        .with_wire(PinAddress::new(0, 0), PinAddress::new(1, 0))
        .with_wire(PinAddress::new(1, 1), PinAddress::boundary(1))
        .with_wire(PinAddress::new(1, 2), PinAddress::boundary(2));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    sim.run_simulation_step();
    assert_eq!(sim.output(1).unwrap().value(), 0xBE);
    assert_eq!(sim.output(2).unwrap().value(), 0xEF);
}

#[test]
fn test_dot_display_double_buffering() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("ADDRESS", 0, 8)
        .with_input("PIXEL", 1, 1)
        .with_input("RESET", 2, 1)
        .with_input("WRITE", 3, 1)
        .with_input("REFRESH", 4, 1)
        .with_input("CLOCK", 5, 1)
        .with_output("OUT", 6, 1)
        .with_sub_chip("DOT DISPLAY", 0);
    let desc = (0..7).fold(desc, |desc, pin_id| {
        let (source, target) = if pin_id < 6 {
            (PinAddress::boundary(pin_id), PinAddress::new(0, pin_id))
        } else {
            (PinAddress::new(0, pin_id), PinAddress::boundary(pin_id))
        };
        desc.with_wire(source, target)
    });
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    let step = |sim: &mut Simulator, write: u32, refresh: u32, clock: u32| {
        let widths = [8, 1, 1, 1, 1, 1];
        let values = [7, 1, 0, write, refresh, clock];
        for (pin_id, (width, value)) in widths.into_iter().zip(values).enumerate() {
            drive(sim, pin_id as i32, width, value);
        }
        sim.run_simulation_step();
        sim.output(6).unwrap().value()
    };

    step(&mut sim, 1, 0, 0);
    // Written to the back buffer only.
    assert_eq!(step(&mut sim, 1, 0, 1), 0);
    step(&mut sim, 0, 0, 0);
    assert_eq!(step(&mut sim, 0, 1, 1), 1);
}

#[test]
fn test_split_merge_chips() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("IN", 0, 8)
        .with_output("OUT", 1, 8)
        .with_output("HIGH", 2, 4)
        .with_sub_chip("8-4", 0)
        .with_sub_chip("4-8", 1)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::new(0, 1), PinAddress::new(1, 0))
        .with_wire(PinAddress::new(0, 2), PinAddress::new(1, 1))
        .with_wire(PinAddress::new(0, 1), PinAddress::boundary(2))
        .with_wire(PinAddress::new(1, 2), PinAddress::boundary(1));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    for value in [0x00, 0x5A, 0xC3, 0xFF] {
        drive(&mut sim, 0, 8, value);
        sim.run_simulation_step();
        assert_eq!(sim.output(1).unwrap().value(), value);
        assert_eq!(sim.output(2).unwrap().value(), value >> 4);
    }
}

/// Builds a state of `width` bits cycling through low, high and disconnected bits.
fn patterned(width: usize) -> BitState {
    let mut state = BitState::from_width(width);
    for i in 0..width {
        let level = match (i * 7 + i / 3) % 5 {
            0 | 3 => Logic::High,
            1 => Logic::Disconnected,
            _ => Logic::Low,
        };
        state.set_bit(i, level);
    }
    state
}

#[test]
fn test_split_merge_round_trip_across_tiers() {
    for width in [1, 16, 17, 32, 33, 1000] {
        let source = patterned(width);
        let mut partitions = vec![vec![width]];
        if width > 1 {
            partitions.push(vec![width / 2, width - width / 2]);
            partitions.push(vec![1, width - 1]);
        }
        if width % 4 == 0 {
            partitions.push(vec![width / 4; 4]);
        }
        for partition in partitions {
            let mut targets: Vec<BitState> =
                partition.iter().map(|w| BitState::from_width(*w)).collect();
            source.handle_split(&mut targets);

            // The last target holds the lowest bits.
            let lowest = targets.last().unwrap();
            assert_eq!(
                lowest.tristated_value(0),
                source.tristated_value(0),
                "{:?}",
                partition
            );

            let mut merged = BitState::from_width(width);
            merged.handle_merge(targets.iter());
            assert_eq!(merged, source, "width {} split as {:?}", width, partition);
        }
    }
}

#[test]
fn test_undriven_pins_stay_disconnected() {
    let mut lib = circuits::library();
    lib.add(
        ChipDescription::custom("PARTIAL")
            .with_input("S", 0, 1)
            .with_sub_chip("SR LATCH", 0)
            .with_sub_chip("AND", 1)
            .with_sub_chip("RAM-8", 2)
            .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
            .with_wire(PinAddress::new(0, 2), PinAddress::new(1, 0)),
    );
    let mut sim = simulator(lib.get("PARTIAL").unwrap(), &lib, 4);

    let undriven = |sim: &Simulator| -> Vec<PinIndex> {
        let circuit = sim.circuit();
        circuit
            .pins
            .iter()
            .filter(|(_, pin)| {
                pin.is_input && pin.num_input_connections == 0 && pin.parent != circuit.root()
            })
            .map(|(idx, _)| PinIndex { idx })
            .collect()
    };
    let pins = undriven(&sim);
    assert!(!pins.is_empty());

    for tick in 0..6 {
        drive(&mut sim, 0, 1, tick % 2);
        sim.run_simulation_step();
        for pin in &pins {
            let state = sim.circuit().pin(*pin).state();
            assert!(state.is_disconnected(), "{} after tick {}", pin, tick);
            assert!((0..state.width()).all(|i| state.tristated_value(i) == Logic::Disconnected));
        }
    }
    assert_eq!(pins, undriven(&sim));
}

#[test]
fn test_self_loop_is_not_combinational() {
    let desc = ChipDescription::custom("LOOP")
        .with_input("A", 0, 1)
        .with_output("OUT", 1, 1)
        .with_sub_chip("NAND", 0)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::new(0, 2), PinAddress::new(0, 1))
        .with_wire(PinAddress::new(0, 2), PinAddress::boundary(1));
    let sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    let root = sim.circuit().root();
    assert!(!sim.circuit().is_combinational(root));
    assert!(!sim.circuit().can_cache(root, sim.config()));
}

#[test]
fn test_reorder_discovers_dependency_order() {
    // NAND 0 feeds NAND 1, listed in that order.
    let desc = ChipDescription::custom("CHAIN")
        .with_input("A", 0, 1)
        .with_output("OUT", 1, 1)
        .with_sub_chip("NAND", 0)
        .with_sub_chip("NAND", 1)
        .with_wire(PinAddress::new(0, 2), PinAddress::new(1, 0))
        .with_wire(PinAddress::new(0, 2), PinAddress::new(1, 1))
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 1))
        .with_wire(PinAddress::new(1, 2), PinAddress::boundary(1));
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    let ids = |sim: &Simulator| -> Vec<i32> {
        let circuit = sim.circuit();
        let root = circuit.chip(circuit.root());
        root.sub_chips().iter().map(|s| circuit.chip(*s).id()).collect()
    };
    assert_eq!(ids(&sim), vec![0, 1]);

    drive(&mut sim, 0, 1, 1);
    sim.run_simulation_step();
    // Evaluated last to first.
    assert_eq!(ids(&sim), vec![1, 0]);
    assert_eq!(sim.output(1).unwrap().value(), 1);

    for value in [0, 1, 0] {
        drive(&mut sim, 0, 1, value);
        sim.run_simulation_step();
        assert_eq!(sim.output(1).unwrap().value(), value);
        assert_eq!(ids(&sim), vec![1, 0]);
    }
}

/// Five input bits: a 4 bit `X` XORed bitwise with the 1 bit `Y`, and `X & Y` on bit 0.
fn mixer(library: &mut ChipLibrary) -> ChipDescription {
    const SPLIT: i32 = 10;
    const MERGE: i32 = 11;
    const CARRY: i32 = 12;
    let mut desc = ChipDescription::custom("MIXER")
        .with_input("X", 0, 4)
        .with_input("Y", 1, 1)
        .with_output("OUT", 2, 4)
        .with_output("CARRY", 3, 1)
        .with_sub_chip("4-1", SPLIT)
        .with_sub_chip("1-4", MERGE)
        .with_sub_chip("AND", CARRY)
        .with_wire(PinAddress::boundary(0), PinAddress::new(SPLIT, 0))
        .with_wire(PinAddress::new(SPLIT, 4), PinAddress::new(CARRY, 0))
        .with_wire(PinAddress::boundary(1), PinAddress::new(CARRY, 1))
        .with_wire(PinAddress::new(CARRY, 2), PinAddress::boundary(3))
        .with_wire(PinAddress::new(MERGE, 4), PinAddress::boundary(2));
    for bit in 0..4 {
        desc = desc
            .with_sub_chip("XOR", bit)
            .with_wire(PinAddress::new(SPLIT, bit + 1), PinAddress::new(bit, 0))
            .with_wire(PinAddress::boundary(1), PinAddress::new(bit, 1))
            .with_wire(PinAddress::new(bit, 2), PinAddress::new(MERGE, bit));
    }
    library.add(desc.clone());
    ChipDescription::custom("OUTER")
        .with_input("X", 0, 4)
        .with_input("Y", 1, 1)
        .with_output("OUT", 2, 4)
        .with_output("CARRY", 3, 1)
        .with_sub_chip("MIXER", 0)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::boundary(1), PinAddress::new(0, 1))
        .with_wire(PinAddress::new(0, 2), PinAddress::boundary(2))
        .with_wire(PinAddress::new(0, 3), PinAddress::boundary(3))
}

#[test]
fn test_cached_evaluation_matches_direct_evaluation() {
    let mut lib = circuits::library();
    let outer = mixer(&mut lib);
    let mut cached = simulator(&outer, &lib, 1);
    let mut direct = Simulator::build(
        &outer,
        &lib,
        SimConfig {
            cache_enabled: false,
            ..SimConfig::seeded(1)
        },
        NullHost,
    )
    .unwrap();

    for combination in 0..32u32 {
        let (x, y) = (combination & 0xF, combination >> 4);
        for sim in [&mut cached, &mut direct] {
            drive(sim, 0, 4, x);
            drive(sim, 1, 1, y);
            sim.run_simulation_step();
        }
        for pin_id in [2, 3] {
            assert_eq!(
                cached.output(pin_id).unwrap(),
                direct.output(pin_id).unwrap(),
                "x={} y={}",
                x,
                y
            );
        }
        let expected = if y == 1 { x ^ 0xF } else { x };
        assert_eq!(cached.output(2).unwrap().value(), expected);
        assert_eq!(cached.output(3).unwrap().value(), x & y & 1);
    }

    let entry = cached.cache_registry().get("MIXER").unwrap();
    assert_eq!(entry.table.as_ref().unwrap().num_entries(), 32);
    assert!(direct.cache_registry().is_empty());
}

#[test]
fn test_lookup_table_build_restores_inputs() {
    let mut lib = circuits::library();
    let outer = mixer(&mut lib);
    let mut sim = simulator(&outer, &lib, 1);
    drive(&mut sim, 0, 4, 0b1001);
    sim.run_simulation_step();

    let mixer = sim.circuit().sub_chip(sim.circuit().root(), 0).unwrap();
    let inputs = sim.circuit().chip(mixer).inputs().to_vec();
    let before: Vec<BitState> = inputs
        .iter()
        .map(|p| sim.circuit().pin(*p).state().clone())
        .collect();

    // Y is undriven, so the table is built but can't be used.
    assert!(!try_processing_from_cache(&mut sim, mixer));
    assert!(matches!(sim.circuit().chip(mixer).lut, LutState::Ready(_)));
    let after: Vec<BitState> = inputs
        .iter()
        .map(|p| sim.circuit().pin(*p).state().clone())
        .collect();
    assert_eq!(before, after);
    assert!(after[1].is_disconnected());

    // Asking again reuses the registry entry.
    let frame = calculate_lut(&mut sim, mixer).unwrap();
    assert_eq!(frame, sim.frame());
}

#[test]
fn test_aborted_lookup_table_build() {
    let mut lib = circuits::library();
    let outer = mixer(&mut lib);
    let mut sim = simulator(&outer, &lib, 1);
    drive(&mut sim, 0, 4, 0b0110);
    drive(&mut sim, 1, 1, 1);
    sim.run_simulation_step();
    let mixer = sim.circuit().sub_chip(sim.circuit().root(), 0).unwrap();

    let monitor = sim.monitor();
    monitor.abort();
    assert!(monitor.is_aborted());
    assert!(calculate_lut(&mut sim, mixer).is_err());
    assert!(!try_processing_from_cache(&mut sim, mixer));
    assert!(matches!(sim.circuit().chip(mixer).lut, LutState::NotBuilt));
    assert!(!monitor.is_building());

    let x = sim.circuit().chip(mixer).inputs()[0];
    assert_eq!(sim.circuit().pin(x).state().value(), 0b0110);

    // The abort only lasted for one frame.
    sim.run_simulation_step();
    assert!(matches!(sim.circuit().chip(mixer).lut, LutState::Ready(_)));
    assert_eq!(sim.output(2).unwrap().value(), 0b1001);
}

#[test]
fn test_edit_invalidates_lookup_table() {
    let mut lib = circuits::library();
    let outer = mixer(&mut lib);
    let mut sim = simulator(&outer, &lib, 1);
    drive(&mut sim, 0, 4, 0b0011);
    drive(&mut sim, 1, 1, 1);
    sim.run_simulation_step();
    sim.run_simulation_step();
    assert!(sim.cache_registry().get("MIXER").is_some());
    assert_eq!(sim.output(3).unwrap().value(), 1);

    // Cut the carry output inside the mixer.
    sim.command_sender()
        .send(SimCommand::RemoveConnection {
            chip: ChipPath::root().child(0),
            wire: WireDescription {
                source: PinAddress::new(12, 2),
                target: PinAddress::boundary(3),
            },
        })
        .unwrap();
    sim.run_simulation_step();
    let mixer = sim.circuit().sub_chip(sim.circuit().root(), 0).unwrap();
    let key = format!("MIXER@{}", mixer);
    assert!(sim.circuit().chip(mixer).is_edited());
    assert!(sim.cache_registry().get(&key).is_none());
    assert!(sim.output(3).unwrap().is_disconnected());

    sim.run_simulation_step();
    let entry = sim.cache_registry().get(&key).unwrap();
    assert_eq!(entry.frame, sim.frame());
    assert!(sim.output(3).unwrap().is_disconnected());
    assert_eq!(sim.output(2).unwrap().value(), 0b1100);

    // The table of the unedited definition is still there for other instances.
    let shared = sim.cache_registry().get("MIXER").unwrap();
    assert!(shared.frame < sim.frame());
}

#[test]
fn test_edited_instance_keeps_its_table_to_itself() {
    let mut lib = circuits::library();
    mixer(&mut lib);
    let mixer_desc = lib.get("MIXER").unwrap().clone();
    let library = Arc::new(lib.clone());
    let pair = ChipDescription::custom("PAIR")
        .with_input("X", 0, 4)
        .with_input("Y", 1, 1)
        .with_output("OUT A", 2, 4)
        .with_output("CARRY A", 3, 1)
        .with_output("OUT B", 4, 4)
        .with_output("CARRY B", 5, 1)
        .with_sub_chip("MIXER", 0)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::boundary(1), PinAddress::new(0, 1))
        .with_wire(PinAddress::new(0, 2), PinAddress::boundary(2))
        .with_wire(PinAddress::new(0, 3), PinAddress::boundary(3));
    let mut cached = simulator(&pair, &lib, 2);
    let mut direct = Simulator::build(
        &pair,
        &lib,
        SimConfig {
            cache_enabled: false,
            ..SimConfig::seeded(2)
        },
        NullHost,
    )
    .unwrap();

    let wire = |source, target| SimCommand::AddConnection {
        chip: ChipPath::root(),
        wire: WireDescription { source, target },
    };
    let edits = [
        vec![SimCommand::RemoveConnection {
            chip: ChipPath::root().child(0),
            wire: WireDescription {
                source: PinAddress::new(12, 2),
                target: PinAddress::boundary(3),
            },
        }],
        // A fresh instance of the same definition, added once the edited one has its table.
        vec![
            SimCommand::AddSubChip {
                parent: ChipPath::root(),
                description: mixer_desc,
                library,
                sub_chip_id: 1,
                internal_data: None,
            },
            wire(PinAddress::boundary(0), PinAddress::new(1, 0)),
            wire(PinAddress::boundary(1), PinAddress::new(1, 1)),
            wire(PinAddress::new(1, 2), PinAddress::boundary(4)),
            wire(PinAddress::new(1, 3), PinAddress::boundary(5)),
        ],
    ];
    for commands in edits {
        for sim in [&mut cached, &mut direct] {
            for command in &commands {
                sim.command_sender().send(command.clone()).unwrap();
            }
            drive(sim, 0, 4, 0b0111);
            drive(sim, 1, 1, 1);
            sim.run_simulation_step();
            sim.run_simulation_step();
        }
    }

    for combination in 0..32u32 {
        let (x, y) = (combination & 0xF, combination >> 4);
        for sim in [&mut cached, &mut direct] {
            drive(sim, 0, 4, x);
            drive(sim, 1, 1, y);
            sim.run_simulation_step();
        }
        for pin_id in 2..6 {
            assert_eq!(
                cached.output(pin_id).unwrap(),
                direct.output(pin_id).unwrap(),
                "pin {} x={} y={}",
                pin_id,
                x,
                y
            );
        }
        assert!(cached.output(3).unwrap().is_disconnected());
        assert_eq!(cached.output(5).unwrap().value(), x & y & 1);
        assert_eq!(cached.output(2).unwrap(), cached.output(4).unwrap());
    }

    let root = cached.circuit().root();
    let edited = cached.circuit().sub_chip(root, 0).unwrap();
    let fresh = cached.circuit().sub_chip(root, 1).unwrap();
    assert!(!cached.circuit().chip(fresh).is_edited());
    let (edited, fresh) = (&cached.circuit().chip(edited).lut, &cached.circuit().chip(fresh).lut);
    match (edited, fresh) {
        (LutState::Ready(edited), LutState::Ready(fresh)) => assert!(!Arc::ptr_eq(edited, fresh)),
        other => panic!("both mixers should have tables, got {:?}", other),
    }
}

#[test]
fn test_rgb_display() {
    let desc = ChipDescription::custom("ROOT")
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
        .with_sub_chip("RGB DISPLAY", 0);
    let desc = (0..11).fold(desc, |desc, pin_id| {
        let (source, target) = if pin_id < 8 {
            (PinAddress::boundary(pin_id), PinAddress::new(0, pin_id))
        } else {
            (PinAddress::new(0, pin_id), PinAddress::boundary(pin_id))
        };
        desc.with_wire(source, target)
    });
    let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), 0);
    let step = |sim: &mut Simulator, reset: u32, write: u32, refresh: u32, clock: u32| {
        let widths = [8, 4, 4, 4, 1, 1, 1, 1];
        let values = [42, 0x3, 0xA, 0x5, reset, write, refresh, clock];
        for (pin_id, (width, value)) in widths.into_iter().zip(values).enumerate() {
            drive(sim, pin_id as i32, width, value);
        }
        sim.run_simulation_step();
        [8, 9, 10].map(|pin_id| sim.output(pin_id).unwrap().value())
    };

    step(&mut sim, 0, 1, 0, 0);
    // Written to the back buffer only.
    assert_eq!(step(&mut sim, 0, 1, 0, 1), [0, 0, 0]);
    let display = sim.circuit().sub_chip(sim.circuit().root(), 0).unwrap();
    let memory = sim.circuit().chip(display).internal_state();
    assert_eq!(memory[256 + 42], 0x3 | 0xA << 4 | 0x5 << 8);

    // Nothing happens without a rising edge.
    assert_eq!(step(&mut sim, 0, 0, 1, 1), [0, 0, 0]);
    step(&mut sim, 0, 0, 0, 0);
    assert_eq!(step(&mut sim, 0, 0, 1, 1), [0x3, 0xA, 0x5]);

    step(&mut sim, 0, 0, 0, 0);
    // Reset clears the back buffer, which the refresh then shows.
    assert_eq!(step(&mut sim, 1, 0, 1, 1), [0, 0, 0]);
}

#[test]
fn test_bus_passes_the_enabled_driver() {
    let desc = ChipDescription::custom("ROOT")
        .with_input("D0", 0, 1)
        .with_input("E0", 1, 1)
        .with_input("D1", 2, 1)
        .with_input("E1", 3, 1)
        .with_output("LINE", 4, 1)
        .with_sub_chip("3-STATE BUFFER", 0)
        .with_sub_chip("3-STATE BUFFER", 1)
        .with_sub_chip("BUS-1", 2)
        .with_sub_chip("BUS-TERMINUS-1", 3)
        .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
        .with_wire(PinAddress::boundary(1), PinAddress::new(0, 1))
        .with_wire(PinAddress::boundary(2), PinAddress::new(1, 0))
        .with_wire(PinAddress::boundary(3), PinAddress::new(1, 1))
        .with_wire(PinAddress::new(0, 2), PinAddress::new(2, 0))
        .with_wire(PinAddress::new(1, 2), PinAddress::new(2, 0))
        .with_wire(PinAddress::new(2, 1), PinAddress::new(3, 0))
        .with_wire(PinAddress::new(2, 1), PinAddress::boundary(4));
    let mut sim = Simulator::build(
        &desc,
        &ChipLibrary::with_builtins(),
        SimConfig {
            reorder_period: 1,
            ..SimConfig::seeded(6)
        },
        NullHost,
    )
    .unwrap();

    for (d0, e0, d1, e1) in [(1, 1, 0, 0), (0, 1, 1, 0), (0, 0, 1, 1), (1, 0, 0, 1)] {
        for (pin_id, value) in [d0, e0, d1, e1].into_iter().enumerate() {
            drive(&mut sim, pin_id as i32, 1, value);
        }
        sim.run_simulation_step();
        let expected = if e0 == 1 { d0 } else { d1 };
        assert_eq!(sim.output(4).unwrap(), &BitState::from_value(1, expected));
    }

    drive(&mut sim, 1, 1, 0);
    drive(&mut sim, 3, 1, 0);
    sim.run_simulation_step();
    assert!(sim.output(4).unwrap().is_disconnected());

    let ids: Vec<i32> = {
        let circuit = sim.circuit();
        let root = circuit.chip(circuit.root());
        root.sub_chips().iter().map(|s| circuit.chip(*s).id()).collect()
    };
    // The bus runs after both of its drivers.
    let position = |id| ids.iter().position(|i| *i == id).unwrap();
    assert!(position(2) < position(0));
    assert!(position(2) < position(1));
}

fn arb_state(width: usize) -> impl Strategy<Value = BitState> {
    prop::collection::vec(0u8..3, width).prop_map(move |levels| {
        let mut state = BitState::from_width(width);
        for (i, level) in levels.into_iter().enumerate() {
            state.set_bit(i, Logic::try_from(level).unwrap_or(Logic::Disconnected));
        }
        state
    })
}

/// Bitwise resolution of two drivers, disconnected bits give way to connected ones.
fn resolve(x: &BitState, y: &BitState, or: bool) -> BitState {
    let mut out = BitState::from_width(x.width());
    for i in 0..x.width() {
        let level = match (x.tristated_value(i), y.tristated_value(i)) {
            (Logic::Disconnected, Logic::Disconnected) => Logic::Disconnected,
            (Logic::Disconnected, other) | (other, Logic::Disconnected) => other,
            (a, b) => {
                let (a, b) = (a == Logic::High, b == Logic::High);
                Logic::from_bool(if or { a | b } else { a & b })
            }
        };
        out.set_bit(i, level);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_two_drivers_resolve_to_and_or_or(x in arb_state(6), y in arb_state(6), seed in any::<u64>()) {
        let desc = ChipDescription::custom("SHORT")
            .with_input("X", 0, 6)
            .with_input("Y", 1, 6)
            .with_output("OUT", 2, 6)
            .with_wire(PinAddress::boundary(0), PinAddress::boundary(2))
            .with_wire(PinAddress::boundary(1), PinAddress::boundary(2));
        let mut sim = simulator(&desc, &ChipLibrary::with_builtins(), seed);
        sim.set_dev_input(0, x.clone());
        sim.set_dev_input(1, y.clone());
        sim.run_simulation_step();

        let out = sim.output(2).unwrap();
        prop_assert!(*out == resolve(&x, &y, true) || *out == resolve(&x, &y, false));
        prop_assert_eq!(out.tristate_flags() & !(x.tristate_flags() & y.tristate_flags()), 0);
    }
}
