//! Null bitmaps and packed booleans.
//!
//! A message groups its optional fields and booleans in batches of at most 8 flags.
//! Each batch is sent as a single byte at a fixed position in the field order,
//! before the payloads it describes. Absent fields then cost nothing on the wire.

/// One byte of packed flags, filled from the least significant bit upwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bits {
    byte: u8,
    len: u8,
}

impl Bits {
    #[inline(always)]
    pub const fn new() -> Self {
        Self { byte: 0, len: 0 }
    }

    /// Appends a flag.
    ///
    /// # Panics
    ///
    /// If the byte already holds 8 flags.
    #[inline(always)]
    pub const fn with(self, flag: bool) -> Self {
        assert!(self.len < 8, "a bit group holds at most 8 flags");

        Self {
            byte: self.byte | ((flag as u8) << self.len),
            len: self.len + 1,
        }
    }

    /// Appends a presence flag for an optional value.
    #[inline(always)]
    pub const fn with_some<T>(self, value: &Option<T>) -> Self {
        self.with(value.is_some())
    }

    #[inline(always)]
    pub const fn byte(self) -> u8 {
        self.byte
    }

    /// Returns the flag at position `n`.
    #[inline(always)]
    pub const fn get(self, n: u8) -> bool {
        self.byte & (1 << n) != 0
    }

    /// Returns `true` if the optional value at position `n` is absent.
    #[inline(always)]
    pub const fn is_null(self, n: u8) -> bool {
        !self.get(n)
    }

    /// Returns a default value if the flag at position `n` is set, `None` otherwise.
    #[inline(always)]
    pub fn some_if<T: Default>(self, n: u8) -> Option<T> {
        self.get(n).then(T::default)
    }
}

impl From<u8> for Bits {
    #[inline(always)]
    fn from(byte: u8) -> Self {
        Self { byte, len: 8 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fill_from_the_low_bit() {
        let bits = Bits::new().with(true).with(false).with(true);
        assert_eq!(bits.byte(), 0b101);
    }

    #[test]
    fn decoded_flags_match_encoded_ones() {
        let bits = Bits::from(Bits::new().with_some(&Some(1)).with_some(&None::<u8>).byte());

        assert!(bits.get(0));
        assert!(bits.is_null(1));
        assert_eq!(bits.some_if::<u8>(0), Some(0));
        assert_eq!(bits.some_if::<u8>(1), None);
    }

    #[test]
    #[should_panic]
    fn ninth_flag_panics() {
        let mut bits = Bits::new();
        for _ in 0..9 {
            bits = bits.with(true);
        }
    }
}
