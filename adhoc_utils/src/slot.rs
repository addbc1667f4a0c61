//! Resumption state shared by [`Writer`](crate::Writer) and [`Reader`](crate::Reader).

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{CodecError, MIN_BUFFER_LEN, Overflow};

/// What to do with a collection longer than its declared maximum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Fail the pump with [`CodecError::Overflow`].
    #[default]
    Reject,
    /// Report the overflow, then keep only the first `max` elements.
    ///
    /// On the receiving side every declared element is still consumed, so the
    /// stream stays framed.
    Clamp,
}

/// Codec settings, fixed for the lifetime of a [`Cursor`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl CodecConfig {
    /// Rejects every overflow.
    #[inline(always)]
    pub const fn strict() -> Self {
        Self {
            overflow: OverflowPolicy::Reject,
        }
    }

    /// Clamps overflowing collections instead of failing.
    #[inline(always)]
    pub const fn lenient() -> Self {
        Self {
            overflow: OverflowPolicy::Clamp,
        }
    }
}

/// Bookkeeping for one nesting level of a pump.
///
/// `state` is the resumption point inside the value being walked, `index` and
/// `index_max` track progress through a collection. The other fields are scratch
/// space for the collection codecs (length width, pending map key...).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Slot {
    pub state: u32,
    pub index: usize,
    pub index_max: usize,
    pub extra: usize,
    pub bits: u8,
    pub key: u64,
    pub overflowed: bool,
}

/// Externally owned resumption state for one in-flight transmit or receive.
///
/// A cursor holds a stack of [`Slot`]s (one per nesting level: message, field,
/// collection element...), the bytes of a primitive that arrived split across two
/// input buffers, and the codec configuration.
///
/// One cursor must drive exactly one value at a time. Once the value reports
/// [`Progress::Done`](crate::Progress::Done), [`reset`](Self::reset) the cursor
/// before reusing it.
pub struct Cursor {
    slots: Vec<Slot>,
    depth: usize,
    pub(crate) partial: arrayvec::ArrayVec<u8, MIN_BUFFER_LEN>,
    pub(crate) scratch: Vec<u8>,
    context: (&'static str, u8),
    config: CodecConfig,
    on_overflow: Option<Box<dyn FnMut(&Overflow) + Send>>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("slots", &&self.slots[..=self.depth])
            .field("partial", &self.partial)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl Cursor {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            slots: vec![Slot::default()],
            depth: 0,
            partial: arrayvec::ArrayVec::new_const(),
            scratch: Vec::new(),
            context: ("", 0),
            config,
            on_overflow: None,
        }
    }

    /// Installs a callback invoked on every overflow, before the policy applies.
    pub fn with_overflow_handler(mut self, f: impl FnMut(&Overflow) + Send + 'static) -> Self {
        self.on_overflow = Some(Box::new(f));
        self
    }

    #[inline(always)]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Current nesting depth, `0` being the outermost value.
    #[inline(always)]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// The slot of the outermost value.
    #[inline(always)]
    pub fn root(&self) -> &Slot {
        &self.slots[0]
    }

    /// Returns `true` if nothing has been written or read since the last reset.
    pub fn is_idle(&self) -> bool {
        self.depth == 0 && self.slots[0] == Slot::default() && self.partial.is_empty()
    }

    /// Discards all resumption state, keeping the configuration and overflow handler.
    pub fn reset(&mut self) {
        self.slots.truncate(1);
        self.slots[0] = Slot::default();
        self.depth = 0;
        self.partial.clear();
        self.scratch.clear();
        self.context = ("", 0);
    }

    #[inline(always)]
    pub(crate) fn current(&self) -> &Slot {
        &self.slots[self.depth]
    }

    #[inline(always)]
    pub(crate) fn slot(&mut self) -> &mut Slot {
        &mut self.slots[self.depth]
    }

    #[inline(always)]
    pub(crate) fn set_context(&mut self, pack: &'static str, field: u8) {
        self.context = (pack, field);
    }

    /// Enters a nested value, allocating its slot on first use.
    #[inline(always)]
    pub(crate) fn descend(&mut self) {
        self.depth += 1;
        if self.slots.len() == self.depth {
            self.slots.push(Slot::default());
        }
    }

    /// Leaves a nested value. Its slot is cleared once it is done, ready for the
    /// next sibling.
    #[inline(always)]
    pub(crate) fn ascend(&mut self, done: bool) {
        if done {
            self.slots[self.depth] = Slot::default();
        }
        self.depth -= 1;
    }

    /// Applies the overflow policy to a collection of `len` elements declared with
    /// maximum `max`.
    ///
    /// Returns the number of elements to keep. Each overflow is reported once per
    /// slot, even if the pump retries the same step.
    pub(crate) fn bound(&mut self, len: usize, max: usize) -> Result<usize, CodecError> {
        if len <= max {
            return Ok(len);
        }

        let (pack, field) = self.context;
        let overflow = Overflow {
            pack,
            field,
            max,
            len,
        };

        if !self.slot().overflowed {
            if let Some(f) = self.on_overflow.as_mut() {
                f(&overflow);
            }

            match self.config.overflow {
                OverflowPolicy::Reject => return Err(CodecError::Overflow(overflow)),
                OverflowPolicy::Clamp => log::warn!("{overflow}, clamping"),
            }

            self.slot().overflowed = true;
        }

        Ok(max)
    }

    /// Context for UTF-8 errors.
    #[inline(always)]
    pub(crate) fn invalid_utf8(&self) -> CodecError {
        let (pack, field) = self.context;
        CodecError::InvalidUtf8 { pack, field }
    }
}
