//! Fixed-width two's complement integers.
//!
//! All values are stored in a `u64` and reduced modulo `2^bits` after every
//! operation, so an [`IntType`] of 8 bits behaves exactly like a wrapping
//! `u8`/`i8`. This is the integer type of every host value the engine touches.

use rand::Rng;

use crate::formatter::Formatter;

/// The widest supported integer type.
pub const MAX_BITS: u32 = u64::BITS;

/// An integer type with a fixed number of bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IntType {
    bits: u32,
    mask: u64,
}

impl IntType {
    pub const I1: Self = Self::new(1);
    pub const I8: Self = Self::new(8);
    pub const I16: Self = Self::new(16);
    pub const I32: Self = Self::new(32);
    pub const I64: Self = Self::new(64);

    /// Creates a type with the given number of bits.
    ///
    /// Panics if `bits` is not in `1..=64`.
    pub const fn new(bits: u32) -> Self {
        assert!(bits >= 1 && bits <= MAX_BITS, "Unsupported integer width.");
        let mask = if bits == MAX_BITS {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        Self { bits, mask }
    }

    /// Like [`IntType::new`] but returns `None` for unsupported widths.
    pub fn try_new(bits: u32) -> Option<Self> {
        (1..=MAX_BITS).contains(&bits).then(|| Self::new(bits))
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// The width of the smallest of `u8`, `u16`, `u32` and `u64` that holds
    /// values of this type. C and Rust code stores values in that type.
    ///
    /// ```
    /// use obfus::int_type::IntType;
    /// assert_eq!(IntType::I1.native_bits(), 8);
    /// assert_eq!(IntType::new(17).native_bits(), 32);
    /// assert_eq!(IntType::I64.native_bits(), 64);
    /// ```
    pub fn native_bits(&self) -> u32 {
        self.bits.next_power_of_two().max(8)
    }

    /// Whether C and Rust have an unsigned type of exactly this width.
    pub fn is_native(&self) -> bool {
        self.native_bits() == self.bits
    }

    /// Reduces an arbitrary `u64` to a value of this type.
    pub fn element(&self, v: u64) -> u64 {
        v & self.mask
    }

    /// Converts a signed integer to its two's complement representative.
    ///
    /// ```
    /// use obfus::int_type::IntType;
    /// assert_eq!(IntType::I8.from_i64(-1), 255);
    /// assert_eq!(IntType::I8.from_i64(-6), 250);
    /// ```
    pub fn from_i64(&self, v: i64) -> u64 {
        v as u64 & self.mask
    }

    /// Interprets the value as a signed integer.
    ///
    /// ```
    /// use obfus::int_type::IntType;
    /// assert_eq!(IntType::I8.to_i64(255), -1);
    /// assert_eq!(IntType::new(4).to_i64(7), 7);
    /// assert_eq!(IntType::new(4).to_i64(8), -8);
    /// ```
    pub fn to_i64(&self, v: u64) -> i64 {
        let shift = MAX_BITS - self.bits;
        ((v << shift) as i64) >> shift
    }

    /// The value with every bit set, i.e. `-1`.
    pub fn ones(&self) -> u64 {
        self.mask
    }

    pub fn add(&self, l: u64, r: u64) -> u64 {
        l.wrapping_add(r) & self.mask
    }

    pub fn sub(&self, l: u64, r: u64) -> u64 {
        l.wrapping_sub(r) & self.mask
    }

    pub fn mul(&self, l: u64, r: u64) -> u64 {
        l.wrapping_mul(r) & self.mask
    }

    pub fn neg(&self, e: u64) -> u64 {
        e.wrapping_neg() & self.mask
    }

    pub fn not(&self, e: u64) -> u64 {
        !e & self.mask
    }

    pub fn and(l: u64, r: u64) -> u64 {
        l & r
    }

    pub fn or(l: u64, r: u64) -> u64 {
        l | r
    }

    pub fn xor(l: u64, r: u64) -> u64 {
        l ^ r
    }

    /// Unsigned less than.
    pub fn ult(&self, l: u64, r: u64) -> bool {
        l < r
    }

    /// Returns a uniformly random value.
    pub fn random<R: Rng>(&self, rng: &mut R) -> u64 {
        rng.random::<u64>() & self.mask
    }

    /// Parses a decimal number and reduces it.
    /// Overflowing literals wrap, the same way the constant would in C.
    pub(crate) fn parse_element(
        &self,
        it: &mut std::iter::Peekable<std::str::Chars>,
    ) -> Option<u64> {
        let mut v: u64 = 0;
        let mut any = false;
        while let Some(d) = it.peek().and_then(|c| c.to_digit(10)) {
            v = v.wrapping_mul(10).wrapping_add(d as u64);
            any = true;
            it.next();
        }

        any.then_some(v & self.mask)
    }

    /// Returns the name of the data type for the given formatter.
    ///
    /// C and Rust use the [native](IntType::native_bits) type.
    pub fn data_type_name(&self, formatter: Formatter) -> impl std::fmt::Display {
        IntTypeName { ty: *self, formatter }
    }
}

struct IntTypeName {
    ty: IntType,
    formatter: Formatter,
}

impl std::fmt::Display for IntTypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.formatter {
            Formatter::C => write!(f, "uint{}_t", self.ty.native_bits()),
            Formatter::Rust => write!(f, "Wrapping<u{}>", self.ty.native_bits()),
            Formatter::LLVM => write!(f, "i{}", self.ty.bits),
        }
    }
}

impl std::fmt::Display for IntType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.bits)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wrapping_matches_primitive() {
        let t = IntType::I8;
        for (a, b) in itertools::iproduct!(0..=255u8, [0u8, 1, 7, 128, 255]) {
            let (l, r) = (a as u64, b as u64);
            assert_eq!(t.add(l, r), a.wrapping_add(b) as u64);
            assert_eq!(t.sub(l, r), a.wrapping_sub(b) as u64);
            assert_eq!(t.mul(l, r), a.wrapping_mul(b) as u64);
            assert_eq!(t.not(l), !a as u64);
            assert_eq!(t.ult(l, r), a < b);
        }
    }

    #[test]
    fn full_width() {
        let t = IntType::I64;
        assert_eq!(t.mask(), u64::MAX);
        assert_eq!(t.from_i64(-1), u64::MAX);
        assert_eq!(t.to_i64(u64::MAX), -1);
        assert_eq!(t.add(u64::MAX, 2), 1);
    }

    #[test]
    fn odd_width() {
        let t = IntType::new(5);
        assert_eq!(t.ones(), 31);
        assert_eq!(t.add(30, 3), 1);
        assert_eq!(t.neg(1), 31);
        assert!(!t.is_native());
        assert_eq!(t.data_type_name(Formatter::C).to_string(), "uint8_t");
        assert_eq!(t.data_type_name(Formatter::LLVM).to_string(), "i5");
        assert!(IntType::try_new(0).is_none());
        assert!(IntType::try_new(65).is_none());
    }
}
