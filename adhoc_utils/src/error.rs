use core::fmt;

use thiserror::Error;

/// A collection longer than its declared maximum.
///
/// `pack` and `field` locate the offending field: the message name and the
/// field's position in its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Overflow {
    pub pack: &'static str,
    pub field: u8,
    pub max: usize,
    pub len: usize,
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: length {} exceeds the declared maximum {}",
            self.pack, self.field, self.len, self.max
        )
    }
}

/// Errors raised while encoding or decoding a message.
///
/// None of these are recoverable for the stream they occurred on: once a pump
/// fails, its cursor must be reset and the surrounding channel torn down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{0}")]
    Overflow(Overflow),
    #[error("expected pack id {expected}, got {got}")]
    UnexpectedId { expected: u16, got: u16 },
    #[error("invalid length width {0}, at most 4 bytes are allowed")]
    BadWidth(u8),
    #[error("{pack}.{field}: string is not valid UTF-8")]
    InvalidUtf8 { pack: &'static str, field: u8 },
    #[error("input ended in the middle of a value")]
    Truncated,
}
