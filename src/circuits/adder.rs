use super::gates::pin;
use crate::description::ChipDescription;
use crate::sim::PinAddress;

/// Returns a half adder made of a [super::xor] and an [super::and].
///
/// Inputs `A` and `B` have ids 0 and 1, outputs `SUM` and `CARRY` have ids 2 and 3.
pub fn half_adder() -> ChipDescription {
    ChipDescription::custom("HALF ADDER")
        .with_input("A", 0, 1)
        .with_input("B", 1, 1)
        .with_output("SUM", 2, 1)
        .with_output("CARRY", 3, 1)
        .with_sub_chip("XOR", 0)
        .with_sub_chip("AND", 1)
        .with_wire(PinAddress::boundary(0), pin(0, 0))
        .with_wire(PinAddress::boundary(1), pin(0, 1))
        .with_wire(PinAddress::boundary(0), pin(1, 0))
        .with_wire(PinAddress::boundary(1), pin(1, 1))
        .with_wire(pin(0, 2), PinAddress::boundary(2))
        .with_wire(pin(1, 2), PinAddress::boundary(3))
}
