use bitvec::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{self, Display, Formatter};

/// Widest state stored in the packed 16 bit tier.
pub const MAX_SHORT_WIDTH: usize = 16;
/// Widest state stored in the two word tier.
pub const MAX_MEDIUM_WIDTH: usize = 32;

/// Level of a single bit of a [BitState].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Logic {
    Low = 0,
    High = 1,
    Disconnected = 2,
}
impl Logic {
    pub fn from_bool(b: bool) -> Logic {
        if b {
            Logic::High
        } else {
            Logic::Low
        }
    }
}
impl Display for Logic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = match self {
            Logic::Low => '0',
            Logic::High => '1',
            Logic::Disconnected => 'Z',
        };
        write!(f, "{}", c)
    }
}

/// Returns a mask with the lowest `width` bits set.
#[inline(always)]
fn mask_32(width: usize) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Tri-stated signal carried by one pin.
///
/// Every bit is one of [Logic::Low], [Logic::High] or [Logic::Disconnected], stored as a value bit
/// plus a tristate flag. The representation is picked once from the width and never changes:
///
/// * 1 bit: [BitState::Single].
/// * up to 16 bits: [BitState::Short], values in the low half of one word, flags in the high half.
/// * up to 32 bits: [BitState::Medium], one word of values and one word of flags.
/// * wider: [BitState::Wide], two bit vectors.
///
/// A bit with its tristate flag set always stores a value of 0.
///
/// # Example
///
/// ```
/// # use chipsim::data_structures::{BitState, Logic};
/// let mut s = BitState::from_width(4);
/// s.set_value(0b1010);
/// assert_eq!(s.tristated_value(1), Logic::High);
///
/// s.set_all_disconnected();
/// assert_eq!(s.value(), 0);
/// assert_eq!(s.tristated_value(1), Logic::Disconnected);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BitState {
    Single { value: bool, tristate: bool },
    Short { width: u8, packed: u32 },
    Medium { width: u8, values: u32, tristates: u32 },
    Wide { values: BitVec<u64, Lsb0>, tristates: BitVec<u64, Lsb0> },
}
use BitState::*;

impl BitState {
    /// Returns a state of `width` bits, all of them [Logic::Low].
    ///
    /// # Panics
    ///
    /// Panics if `width` == 0.
    pub fn from_width(width: usize) -> BitState {
        assert!(width > 0, "Tried to create a BitState of width 0");
        if width == 1 {
            Single {
                value: false,
                tristate: false,
            }
        } else if width <= MAX_SHORT_WIDTH {
            Short {
                width: width as u8,
                packed: 0,
            }
        } else if width <= MAX_MEDIUM_WIDTH {
            Medium {
                width: width as u8,
                values: 0,
                tristates: 0,
            }
        } else {
            Wide {
                values: BitVec::repeat(false, width),
                tristates: BitVec::repeat(false, width),
            }
        }
    }

    /// Returns a fully disconnected state of `width` bits.
    pub fn disconnected(width: usize) -> BitState {
        let mut s = Self::from_width(width);
        s.set_all_disconnected();
        s
    }

    /// Returns a state of `width` bits holding the lowest bits of `value`.
    pub fn from_value(width: usize, value: u32) -> BitState {
        let mut s = Self::from_width(width);
        s.set_value(value);
        s
    }

    /// Returns the number of bits in the state.
    pub fn width(&self) -> usize {
        match self {
            Single { .. } => 1,
            Short { width, .. } | Medium { width, .. } => *width as usize,
            Wide { values, .. } => values.len(),
        }
    }

    /// Loads up to 32 bits starting at `start` as `(values, tristates)`.
    fn load_range(&self, start: usize, width: usize) -> (u32, u32) {
        debug_assert!(width > 0 && width <= 32 && start + width <= self.width());
        let mask = mask_32(width);
        match self {
            Single { value, tristate } => (*value as u32, *tristate as u32),
            Short { packed, .. } => (
                ((packed & 0xFFFF) >> start) & mask,
                ((packed >> 16) >> start) & mask,
            ),
            Medium {
                values, tristates, ..
            } => ((values >> start) & mask, (tristates >> start) & mask),
            Wide { values, tristates } => (
                values[start..start + width].load_le::<u32>(),
                tristates[start..start + width].load_le::<u32>(),
            ),
        }
    }

    /// Stores up to 32 bits starting at `start`, values under a set tristate flag are cleared.
    fn store_range(&mut self, start: usize, width: usize, values: u32, tristates: u32) {
        debug_assert!(width > 0 && width <= 32 && start + width <= self.width());
        let mask = mask_32(width);
        let tristates = tristates & mask;
        let values = values & mask & !tristates;
        match self {
            Single { value, tristate } => {
                *value = values & 1 != 0;
                *tristate = tristates & 1 != 0;
            }
            Short { packed, .. } => {
                let keep = !((mask << start) | (mask << (start + 16)));
                *packed = (*packed & keep) | (values << start) | ((tristates << start) << 16);
            }
            Medium {
                values: v,
                tristates: t,
                ..
            } => {
                *v = (*v & !(mask << start)) | (values << start);
                *t = (*t & !(mask << start)) | (tristates << start);
            }
            Wide {
                values: v,
                tristates: t,
            } => {
                v[start..start + width].store_le(values);
                t[start..start + width].store_le(tristates);
            }
        }
    }

    /// Copies `width` bits from `src` starting at `src_start` into `self` starting at `dst_start`.
    fn copy_range(&mut self, dst_start: usize, src: &BitState, src_start: usize, width: usize) {
        let mut done = 0;
        while done < width {
            let chunk = (width - done).min(32);
            let (v, t) = src.load_range(src_start + done, chunk);
            self.store_range(dst_start + done, chunk, v, t);
            done += chunk;
        }
    }

    /// Iterates over 32 bit chunks of both states as `(start, width, self, other)`.
    fn chunks_with<'a>(
        &'a self,
        other: &'a BitState,
    ) -> impl Iterator<Item = (usize, usize, (u32, u32), (u32, u32))> + 'a {
        let width = self.width();
        (0..width).step_by(32).map(move |start| {
            let chunk = (width - start).min(32);
            (
                start,
                chunk,
                self.load_range(start, chunk),
                other.load_range(start, chunk),
            )
        })
    }

    /// Sets every bit to [Logic::Disconnected].
    pub fn set_all_disconnected(&mut self) {
        match self {
            Single { value, tristate } => {
                *value = false;
                *tristate = true;
            }
            Short { width, packed } => *packed = mask_32(*width as usize) << 16,
            Medium {
                width,
                values,
                tristates,
            } => {
                *values = 0;
                *tristates = mask_32(*width as usize);
            }
            Wide { values, tristates } => {
                values.fill(false);
                tristates.fill(true);
            }
        }
    }

    /// Returns true if every bit is [Logic::Disconnected].
    pub fn is_disconnected(&self) -> bool {
        match self {
            Wide { tristates, .. } => tristates.all(),
            _ => self.tristate_flags() == mask_32(self.width()),
        }
    }

    /// Returns true if at least one bit is [Logic::Disconnected].
    pub fn has_tristate(&self) -> bool {
        match self {
            Wide { tristates, .. } => tristates.any(),
            _ => self.tristate_flags() != 0,
        }
    }

    /// Returns the value bits as an integer, only the lowest 32 bits of a wide state are returned.
    ///
    /// Disconnected bits read as 0.
    pub fn value(&self) -> u32 {
        self.load_range(0, self.width().min(32)).0
    }

    /// Returns the lowest 32 tristate flags.
    pub fn tristate_flags(&self) -> u32 {
        self.load_range(0, self.width().min(32)).1
    }

    /// Sets the value bits from `value` and clears every tristate flag.
    ///
    /// Bits of a wide state above the 32nd are cleared.
    pub fn set_value(&mut self, value: u32) {
        if let Wide { values, tristates } = self {
            values.fill(false);
            tristates.fill(false);
        }
        let width = self.width().min(32);
        self.store_range(0, width, value, 0);
    }

    /// Returns the level of the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [BitState::width].
    pub fn tristated_value(&self, index: usize) -> Logic {
        assert!(
            index < self.width(),
            "Tried to read bit {} of a {} bit state",
            index,
            self.width()
        );
        match self.load_range(index, 1) {
            (_, 1) => Logic::Disconnected,
            (1, _) => Logic::High,
            _ => Logic::Low,
        }
    }

    /// Sets the bit at `index` to `level`.
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [BitState::width].
    pub fn set_bit(&mut self, index: usize, level: Logic) {
        assert!(
            index < self.width(),
            "Tried to write bit {} of a {} bit state",
            index,
            self.width()
        );
        let (v, t) = match level {
            Logic::Low => (0, 0),
            Logic::High => (1, 0),
            Logic::Disconnected => (0, 1),
        };
        self.store_range(index, 1, v, t);
    }

    /// Returns true if the lowest bit is [Logic::High].
    pub fn first_bit_high(&self) -> bool {
        self.tristated_value(0) == Logic::High
    }

    /// Flips the value of the bit at `index`.
    ///
    /// The tristate flag of that bit is cleared, every other bit is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [BitState::width].
    pub fn toggle_bit(&mut self, index: usize) {
        let next = match self.tristated_value(index) {
            Logic::High => Logic::Low,
            Logic::Low | Logic::Disconnected => Logic::High,
        };
        self.set_bit(index, next);
    }

    /// Replaces `self` with the bitwise OR of both values.
    ///
    /// Only bits disconnected in both states stay disconnected.
    pub fn set_as_or(&mut self, other: &BitState) {
        self.combine(other, |a, b| a | b);
    }

    /// Replaces `self` with the bitwise AND of both values.
    ///
    /// Only bits disconnected in both states stay disconnected.
    pub fn set_as_and(&mut self, other: &BitState) {
        self.combine(other, |a, b| a & b);
    }

    fn combine(&mut self, other: &BitState, op: impl Fn(u32, u32) -> u32) {
        self.assert_same_width(other);
        let combined: Vec<_> = self
            .chunks_with(other)
            .map(|(start, width, (av, at), (bv, bt))| (start, width, op(av, bv), at & bt))
            .collect();
        for (start, width, v, t) in combined {
            self.store_range(start, width, v, t);
        }
    }

    /// Copies `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the widths differ.
    pub fn copy_from(&mut self, other: &BitState) {
        self.assert_same_width(other);
        match (&mut *self, other) {
            (
                Wide { values, tristates },
                Wide {
                    values: ov,
                    tristates: ot,
                },
            ) => {
                values.copy_from_bitslice(ov);
                tristates.copy_from_bitslice(ot);
            }
            (s, o) => *s = o.clone(),
        }
    }

    /// Resolves a second driver `other` arriving at a pin that already holds `self`.
    ///
    /// The resolved bits take the OR of both drivers when `pick_or` is true and the AND otherwise.
    /// A bit disconnected on one side takes the other side's value, so a disconnected driver never
    /// wins against a driven one. Only bits disconnected on both sides stay disconnected.
    ///
    /// Returns true if the state changed.
    ///
    /// # Panics
    ///
    /// Panics if the widths differ.
    pub fn handle_conflict(&mut self, other: &BitState, pick_or: bool) -> bool {
        self.assert_same_width(other);
        let resolved: Vec<_> = self
            .chunks_with(other)
            .map(|(start, width, (av, at), (bv, bt))| {
                let or = av | bv;
                let and = av & bv;
                let any_tristate = at | bt;
                let picked = if pick_or { or } else { and };
                let values = (picked & !any_tristate) | (or & any_tristate);
                let tristates = at & bt;
                let changed = values != av || tristates != at;
                (start, width, values, tristates, changed)
            })
            .collect();

        let mut changed = false;
        for (start, width, v, t, c) in resolved {
            self.store_range(start, width, v, t);
            changed |= c;
        }
        changed
    }

    /// Returns `width` bits of `self` starting at bit `start` as a new state.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn slice(&self, start: usize, width: usize) -> BitState {
        self.assert_range(start, width);
        let mut out = BitState::from_width(width);
        out.copy_range(0, self, start, width);
        out
    }

    /// Overwrites the bits of `self` starting at `start` with `src`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn write_slice(&mut self, start: usize, src: &BitState) {
        self.assert_range(start, src.width());
        self.copy_range(start, src, 0, src.width());
    }

    /// Splits `self` into `targets`.
    ///
    /// The last target receives the lowest order bits, the first target the highest.
    ///
    /// # Panics
    ///
    /// Panics if the widths of `targets` don't add up to the width of `self`.
    pub fn handle_split(&self, targets: &mut [BitState]) {
        let total: usize = targets.iter().map(BitState::width).sum();
        assert_eq!(total, self.width(), "Split widths don't add up");
        let mut offset = 0;
        for target in targets.iter_mut().rev() {
            let width = target.width();
            target.copy_range(0, self, offset, width);
            offset += width;
        }
    }

    /// Concatenates `sources` into `self`.
    ///
    /// The last source provides the lowest order bits, the first source the highest.
    ///
    /// # Panics
    ///
    /// Panics if the widths of `sources` don't add up to the width of `self`.
    pub fn handle_merge<'a>(&mut self, sources: impl DoubleEndedIterator<Item = &'a BitState>) {
        let mut offset = 0;
        for source in sources.rev() {
            let width = source.width();
            self.assert_range(offset, width);
            self.copy_range(offset, source, 0, width);
            offset += width;
        }
        assert_eq!(offset, self.width(), "Merge widths don't add up");
    }

    /// Returns the packed encoding used by lookup tables: values in the low 16 bits,
    /// tristate flags in the high 16 bits.
    ///
    /// # Panics
    ///
    /// Panics if the state is wider than 16 bits.
    pub fn to_short(&self) -> u32 {
        match self {
            Single { value, tristate } => *value as u32 | (*tristate as u32) << 16,
            Short { packed, .. } => *packed,
            _ => panic!(
                "Tried to pack a {} bit state into a short encoding",
                self.width()
            ),
        }
    }

    /// Overwrites `self` from the encoding returned by [BitState::to_short].
    ///
    /// # Panics
    ///
    /// Panics if the state is wider than 16 bits.
    pub fn set_short(&mut self, packed: u32) {
        let width = self.width();
        assert!(
            width <= MAX_SHORT_WIDTH,
            "Tried to unpack a short encoding into a {} bit state",
            width
        );
        self.store_range(0, width, packed & 0xFFFF, packed >> 16);
    }

    fn assert_same_width(&self, other: &BitState) {
        assert_eq!(
            self.width(),
            other.width(),
            "Tried to combine states of different widths"
        );
    }

    fn assert_range(&self, start: usize, width: usize) {
        assert!(
            width > 0 && start + width <= self.width(),
            "Bit range {}..{} out of bounds for a {} bit state",
            start,
            start + width,
            self.width()
        );
    }
}

impl Default for BitState {
    fn default() -> Self {
        BitState::disconnected(1)
    }
}

/// Prints the state highest bit first, disconnected bits as `Z`.
impl Display for BitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for i in (0..self.width()).rev() {
            write!(f, "{}", self.tristated_value(i))?;
        }
        Ok(())
    }
}
