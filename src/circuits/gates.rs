use crate::description::ChipDescription;
use crate::sim::PinAddress;

const IN_A: PinAddress = PinAddress::boundary(0);
const IN_B: PinAddress = PinAddress::boundary(1);

/// Address of pin `pin_id` of subchip `sub_chip_id`.
pub(super) const fn pin(sub_chip_id: i32, pin_id: i32) -> PinAddress {
    PinAddress::new(sub_chip_id, pin_id)
}

/// NAND pin ids.
pub(super) const NAND_IN_B: i32 = 0;
pub(super) const NAND_IN_A: i32 = 1;
pub(super) const NAND_OUT: i32 = 2;

/// Returns a NOT gate made of one NAND with both inputs tied together.
///
/// Input `IN` has id 0, output `OUT` has id 1.
///
/// # Example
///
/// ```
/// # use chipsim::circuits::{self, not};
/// # use chipsim::data_structures::BitState;
/// # use chipsim::sim::{NullHost, SimConfig, Simulator};
/// let mut sim = Simulator::build(&not(), &circuits::library(), SimConfig::seeded(0), NullHost)
///     .unwrap();
/// sim.set_dev_input(0, BitState::from_value(1, 0));
/// sim.run_simulation_step();
/// assert_eq!(sim.output(1).unwrap().value(), 1);
/// ```
pub fn not() -> ChipDescription {
    ChipDescription::custom("NOT")
        .with_input("IN", 0, 1)
        .with_output("OUT", 1, 1)
        .with_sub_chip("NAND", 0)
        .with_wire(IN_A, pin(0, NAND_IN_A))
        .with_wire(IN_A, pin(0, NAND_IN_B))
        .with_wire(pin(0, NAND_OUT), PinAddress::boundary(1))
}

/// Returns an AND gate, a NAND followed by a [not].
///
/// Inputs `A` and `B` have ids 0 and 1, output `OUT` has id 2.
pub fn and() -> ChipDescription {
    ChipDescription::custom("AND")
        .with_input("A", 0, 1)
        .with_input("B", 1, 1)
        .with_output("OUT", 2, 1)
        .with_sub_chip("NAND", 0)
        .with_sub_chip("NOT", 1)
        .with_wire(IN_A, pin(0, NAND_IN_A))
        .with_wire(IN_B, pin(0, NAND_IN_B))
        .with_wire(pin(0, NAND_OUT), pin(1, 0))
        .with_wire(pin(1, 1), PinAddress::boundary(2))
}

/// Returns an OR gate, a NAND of both inputs inverted.
///
/// Inputs `A` and `B` have ids 0 and 1, output `OUT` has id 2.
pub fn or() -> ChipDescription {
    ChipDescription::custom("OR")
        .with_input("A", 0, 1)
        .with_input("B", 1, 1)
        .with_output("OUT", 2, 1)
        .with_sub_chip("NOT", 0)
        .with_sub_chip("NOT", 1)
        .with_sub_chip("NAND", 2)
        .with_wire(IN_A, pin(0, 0))
        .with_wire(IN_B, pin(1, 0))
        .with_wire(pin(0, 1), pin(2, NAND_IN_A))
        .with_wire(pin(1, 1), pin(2, NAND_IN_B))
        .with_wire(pin(2, NAND_OUT), PinAddress::boundary(2))
}

/// Returns the four NAND XOR gate.
///
/// Inputs `A` and `B` have ids 0 and 1, output `OUT` has id 2.
pub fn xor() -> ChipDescription {
    ChipDescription::custom("XOR")
        .with_input("A", 0, 1)
        .with_input("B", 1, 1)
        .with_output("OUT", 2, 1)
        .with_sub_chip("NAND", 0)
        .with_sub_chip("NAND", 1)
        .with_sub_chip("NAND", 2)
        .with_sub_chip("NAND", 3)
        .with_wire(IN_A, pin(0, NAND_IN_A))
        .with_wire(IN_B, pin(0, NAND_IN_B))
        .with_wire(IN_A, pin(1, NAND_IN_A))
        .with_wire(pin(0, NAND_OUT), pin(1, NAND_IN_B))
        .with_wire(IN_B, pin(2, NAND_IN_A))
        .with_wire(pin(0, NAND_OUT), pin(2, NAND_IN_B))
        .with_wire(pin(1, NAND_OUT), pin(3, NAND_IN_A))
        .with_wire(pin(2, NAND_OUT), pin(3, NAND_IN_B))
        .with_wire(pin(3, NAND_OUT), PinAddress::boundary(2))
}
