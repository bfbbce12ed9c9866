use super::gates::{pin, NAND_IN_A, NAND_IN_B, NAND_OUT};
use crate::description::ChipDescription;
use crate::sim::PinAddress;

/// Returns an [SR latch](https://en.wikipedia.org/wiki/Flip-flop_(electronics)#SR_NAND_latch)
/// made of two cross coupled NANDs behind two [super::not] gates.
///
/// Inputs `S` and `R` have ids 0 and 1, output `Q` has id 2.
///
/// # Example
///
/// ```
/// # use chipsim::circuits::{self, sr_latch};
/// # use chipsim::data_structures::BitState;
/// # use chipsim::sim::{NullHost, SimConfig, Simulator};
/// let library = circuits::library();
/// let mut sim = Simulator::build(&sr_latch(), &library, SimConfig::seeded(0), NullHost).unwrap();
/// let mut pulse = |sim: &mut Simulator, pin_id| {
///     sim.set_dev_input(pin_id, BitState::from_value(1, 1));
///     sim.run_simulation_step();
///     sim.run_simulation_step();
///     sim.set_dev_input(pin_id, BitState::from_value(1, 0));
///     sim.run_simulation_step();
///     sim.run_simulation_step();
/// };
/// sim.set_dev_input(0, BitState::from_value(1, 0));
/// sim.set_dev_input(1, BitState::from_value(1, 0));
///
/// pulse(&mut sim, 0);
/// assert_eq!(sim.output(2).unwrap().value(), 1);
///
/// pulse(&mut sim, 1);
/// assert_eq!(sim.output(2).unwrap().value(), 0);
/// ```
pub fn sr_latch() -> ChipDescription {
    const Q: i32 = 2;
    const NQ: i32 = 3;
    ChipDescription::custom("SR LATCH")
        .with_input("S", 0, 1)
        .with_input("R", 1, 1)
        .with_output("Q", 2, 1)
        .with_sub_chip("NOT", 0)
        .with_sub_chip("NOT", 1)
        .with_sub_chip("NAND", Q)
        .with_sub_chip("NAND", NQ)
        .with_wire(PinAddress::boundary(0), pin(0, 0))
        .with_wire(PinAddress::boundary(1), pin(1, 0))
        .with_wire(pin(0, 1), pin(Q, NAND_IN_A))
        .with_wire(pin(NQ, NAND_OUT), pin(Q, NAND_IN_B))
        .with_wire(pin(1, 1), pin(NQ, NAND_IN_A))
        .with_wire(pin(Q, NAND_OUT), pin(NQ, NAND_IN_B))
        .with_wire(pin(Q, NAND_OUT), PinAddress::boundary(2))
}
