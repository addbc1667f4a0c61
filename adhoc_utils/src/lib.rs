//! Runtime for resumable, allocation-conscious binary (de)serialization of protocol messages.
//!
//! This crate provides the building blocks shared by every message of an AdHoc-style
//! protocol:
//!
//! - minimal-width little-endian integers and fixed-width scalars,
//! - null bitmaps packing up to 8 presence/boolean flags per byte,
//! - bounded strings, byte blobs, arrays and maps,
//! - resumable pumps that walk a message's fields in a fixed order and can suspend
//!   whenever the current buffer is exhausted, resuming later at the exact same point.
//!
//! All resumption state lives in a [`Cursor`], owned by the caller and passed into
//! every pump call through a [`Writer`] or a [`Reader`]. Messages themselves are plain
//! data and can be shared freely while they are being transmitted.
//!
//! ```ignore
//! let mut cursor = Cursor::default();
//!
//! loop {
//!     let mut buf = [0; 64];
//!     let mut w = Writer::new(&mut buf, &mut cursor);
//!     let progress = message.put(&mut w)?;
//!     transport.send(&buf[..w.written()])?;
//!
//!     if progress.is_done() {
//!         break;
//!     }
//! }
//! ```

pub mod bits;
pub mod map;
pub mod message;
pub mod queue;

mod error;
mod reader;
mod slot;
mod writer;

pub use bits::Bits;
pub use error::{CodecError, Overflow};
pub use map::Map;
pub use message::{Message, Packet, Step, Wire, from_slice, if_present, to_vec};
pub use reader::Reader;
pub use slot::{CodecConfig, Cursor, OverflowPolicy, Slot};
pub use writer::Writer;

/// Number of bytes used by a message header (the absolute value of the message id).
pub const ID_BYTES: usize = 1;

/// Largest id magnitude a header can hold.
///
/// Checked at compile time for every message that is transmitted, received or
/// listed in [`packets!`].
pub const ID_MAX: u16 = (1 << (8 * ID_BYTES)) - 1;

/// Size of the largest primitive written in one piece (a map header: control byte
/// plus two 4-byte counts).
///
/// An empty output buffer at least this large always lets a transmit pump progress.
pub const MIN_BUFFER_LEN: usize = 9;

/// Outcome of a single pump call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Progress {
    /// The buffer was exhausted, call again with a fresh one.
    Pending,
    /// The value was fully written or read.
    Done,
}

impl Progress {
    #[inline(always)]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    #[inline(always)]
    pub const fn done_if(done: bool) -> Self {
        if done { Self::Done } else { Self::Pending }
    }
}

/// Returns the minimal number of bytes (`0..=4`) needed to represent `value`.
///
/// Zero takes no bytes at all.
#[inline(always)]
pub const fn bytes_needed(value: u32) -> usize {
    if value == 0 {
        0
    } else if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFF_FFFF {
        3
    } else {
        4
    }
}

/// Like [`bytes_needed`], for collection lengths.
///
/// Lengths that do not fit in 32 bits are saturated, they are caught by the
/// declared maxima long before that.
#[inline(always)]
pub(crate) fn len_bytes(len: usize) -> usize {
    bytes_needed(u32::try_from(len).unwrap_or(u32::MAX))
}

/// A fixed-width value transmitted as its little-endian bit pattern.
pub trait Scalar: Copy + Default {
    /// Width on the wire, in bytes.
    const WIDTH: usize;

    /// Reinterprets the value as an unsigned integer of [`Self::WIDTH`] bytes.
    fn to_wire(self) -> u64;

    /// Inverse of [`Scalar::to_wire`], only the low [`Self::WIDTH`] bytes are used.
    fn from_wire(bits: u64) -> Self;
}

macro_rules! unsigned_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const WIDTH: usize = size_of::<$t>();

            #[inline(always)]
            fn to_wire(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn from_wire(bits: u64) -> Self {
                bits as $t
            }
        }
    )*};
}

macro_rules! signed_scalar {
    ($($t:ty => $u:ty),*) => {$(
        impl Scalar for $t {
            const WIDTH: usize = size_of::<$t>();

            #[inline(always)]
            fn to_wire(self) -> u64 {
                self as $u as u64
            }

            #[inline(always)]
            fn from_wire(bits: u64) -> Self {
                bits as $u as $t
            }
        }
    )*};
}

unsigned_scalar!(u8, u16, u32, u64);
signed_scalar!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);

impl Scalar for bool {
    const WIDTH: usize = 1;

    #[inline(always)]
    fn to_wire(self) -> u64 {
        u64::from(self)
    }

    #[inline(always)]
    fn from_wire(bits: u64) -> Self {
        bits & 1 != 0
    }
}

impl Scalar for f32 {
    const WIDTH: usize = 4;

    #[inline(always)]
    fn to_wire(self) -> u64 {
        u64::from(self.to_bits())
    }

    #[inline(always)]
    fn from_wire(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl Scalar for f64 {
    const WIDTH: usize = 8;

    #[inline(always)]
    fn to_wire(self) -> u64 {
        self.to_bits()
    }

    #[inline(always)]
    fn from_wire(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
