//! Decoding half of the codec.

use core::hash::Hash;

use crate::{CodecError, Cursor, Map, Progress, Scalar, Slot, Wire};

/// Collection slot states.
const CONTROL: u32 = 0;
const LEN: u32 = 1;
const BODY: u32 = 2;

/// Map slot states.
const MAP_CONTROL: u32 = 0;
const MAP_VALUED_COUNT: u32 = 1;
const MAP_NULL_COUNT: u32 = 2;
const MAP_NULL_KEY: u32 = 3;
const MAP_KEY: u32 = 4;
const MAP_VALUE: u32 = 5;
const MAP_NULL_VALUED: u32 = 6;
const MAP_DONE: u32 = 7;

const NULL_KEY: u8 = 1 << 6;
const NULL_KEY_VALUED: u8 = 1 << 7;

#[inline(always)]
fn le_bytes(src: &[u8]) -> u64 {
    let mut bytes = [0; 8];
    bytes[..src.len()].copy_from_slice(src);
    u64::from_le_bytes(bytes)
}

/// Reads values out of one input buffer, resuming from the state held in a [`Cursor`].
///
/// When a primitive arrives split across two buffers, its first bytes are consumed
/// and parked in the cursor, and the read completes on the next call.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    pub(crate) cursor: &'a mut Cursor,
}

impl<'a> Reader<'a> {
    #[inline(always)]
    pub fn new(buf: &'a [u8], cursor: &'a mut Cursor) -> Self {
        Self {
            buf,
            pos: 0,
            cursor,
        }
    }

    /// Number of bytes consumed so far.
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The resumption state of the value currently being read.
    #[inline(always)]
    pub fn state(&self) -> u32 {
        self.cursor.current().state
    }

    #[inline(always)]
    pub fn set_state(&mut self, state: u32) {
        self.cursor.slot().state = state;
    }

    #[inline(always)]
    pub fn slot(&mut self) -> &mut Slot {
        self.cursor.slot()
    }

    /// Reads a `width`-byte little-endian integer.
    ///
    /// Returns `None` if the input ran out first. Whatever bytes were available
    /// have then been consumed, and the next call with the same `width` picks up
    /// where this one left off.
    pub fn get_val(&mut self, width: usize) -> Option<u64> {
        debug_assert!(width <= 8);

        let buf = self.buf;

        if self.cursor.partial.is_empty() {
            if let Some(src) = buf.get(self.pos..self.pos + width) {
                self.pos += width;
                return Some(le_bytes(src));
            }
        }

        let partial = &mut self.cursor.partial;
        let n = (width - partial.len()).min(buf.len() - self.pos);

        for &byte in &buf[self.pos..self.pos + n] {
            partial.push(byte);
        }
        self.pos += n;

        if partial.len() < width {
            log::trace!("{} of {width} bytes available, suspending", partial.len());
            return None;
        }

        let value = le_bytes(&partial[..]);
        partial.clear();
        Some(value)
    }

    #[inline(always)]
    pub fn get_u8(&mut self) -> Option<u8> {
        self.get_val(1).map(|v| v as u8)
    }

    #[inline(always)]
    pub fn get<T: Scalar>(&mut self) -> Option<T> {
        self.get_val(T::WIDTH).map(T::from_wire)
    }

    /// Runs `f` one nesting level down, with its own slot.
    ///
    /// The child slot survives a suspension, and is cleared once `f` is done.
    pub fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Progress, CodecError>,
    ) -> Result<Progress, CodecError> {
        self.cursor.descend();
        let res = f(self);
        self.cursor.ascend(matches!(res, Ok(Progress::Done)));
        res
    }

    /// Reads a length prefix: the control byte, then the length.
    ///
    /// Returns the number of elements to keep once the length is known and checked
    /// against `max`. Every declared element must still be consumed; the slot holds
    /// the declared count in `index_max` and the kept count in `extra`.
    fn get_len(&mut self, max: usize) -> Result<Option<usize>, CodecError> {
        if self.state() == CONTROL {
            let Some(control) = self.get_u8() else {
                return Ok(None);
            };

            if control > 4 {
                return Err(CodecError::BadWidth(control));
            }

            let slot = self.cursor.slot();
            slot.bits = control;
            slot.state = LEN;
        }

        let width = usize::from(self.cursor.current().bits);
        let Some(len) = self.get_val(width) else {
            return Ok(None);
        };

        let len = len as usize;
        let keep = self.cursor.bound(len, max)?;

        let slot = self.cursor.slot();
        slot.index = 0;
        slot.index_max = len;
        slot.extra = keep;
        slot.state = BODY;

        Ok(Some(keep))
    }

    /// Reads a byte blob of at most `max` bytes into `dst`, replacing its contents.
    pub fn get_bytes(&mut self, dst: &mut Vec<u8>, max: usize) -> Result<Progress, CodecError> {
        if self.state() != BODY {
            let Some(keep) = self.get_len(max)? else {
                return Ok(Progress::Pending);
            };

            dst.clear();
            dst.reserve_exact(keep);
        }

        let Slot {
            index,
            index_max,
            extra: keep,
            ..
        } = *self.cursor.current();

        let n = (index_max - index).min(self.remaining());
        let src = &self.buf[self.pos..self.pos + n];
        let kept = keep.saturating_sub(index).min(n);

        dst.extend_from_slice(&src[..kept]);
        self.pos += n;

        let slot = self.cursor.slot();
        slot.index += n;
        Ok(Progress::done_if(slot.index == index_max))
    }

    /// Reads a string of at most `max` bytes of UTF-8 into `dst`, replacing its contents.
    ///
    /// A string clamped in the middle of a character loses that character.
    pub fn get_str(&mut self, dst: &mut String, max: usize) -> Result<Progress, CodecError> {
        let mut scratch = core::mem::take(&mut self.cursor.scratch);
        let res = self.get_bytes(&mut scratch, max);

        if let Ok(Progress::Done) = res {
            let clamped = self.cursor.current().overflowed;

            let valid = match core::str::from_utf8(&scratch) {
                Ok(s) => Some(s.len()),
                // a clamped string may end in the middle of a character
                Err(e) if clamped && e.error_len().is_none() => Some(e.valid_up_to()),
                Err(_) => None,
            };

            let Some(valid) = valid else {
                self.cursor.scratch = scratch;
                return Err(self.cursor.invalid_utf8());
            };

            dst.clear();
            dst.push_str(core::str::from_utf8(&scratch[..valid]).unwrap_or_default());
            scratch.clear();
        }

        self.cursor.scratch = scratch;
        res
    }

    /// Reads an array of at most `max` scalars into `dst`, replacing its contents.
    ///
    /// Whole elements are read in bulk, an element split across two buffers goes
    /// through the partial-read accumulator.
    pub fn get_array<T: Scalar>(&mut self, dst: &mut Vec<T>, max: usize) -> Result<Progress, CodecError> {
        if self.state() != BODY {
            let Some(keep) = self.get_len(max)? else {
                return Ok(Progress::Pending);
            };

            dst.clear();
            dst.reserve_exact(keep);
        }

        let Slot {
            index_max,
            extra: keep,
            ..
        } = *self.cursor.current();

        loop {
            let mut index = self.cursor.current().index;

            if self.cursor.partial.is_empty() {
                let n = (index_max - index).min(self.remaining() / T::WIDTH);
                let src = &self.buf[self.pos..self.pos + n * T::WIDTH];

                for chunk in src.chunks_exact(T::WIDTH) {
                    if index < keep {
                        dst.push(T::from_wire(le_bytes(chunk)));
                    }
                    index += 1;
                }

                self.pos += n * T::WIDTH;
                self.cursor.slot().index = index;
            }

            if index == index_max {
                return Ok(Progress::Done);
            }

            let Some(item) = self.get::<T>() else {
                return Ok(Progress::Pending);
            };

            if index < keep {
                dst.push(item);
            }
            self.cursor.slot().index += 1;
        }
    }

    /// Reads a sequence of at most `max` nested values into `dst`, replacing its contents.
    pub fn get_seq<T: Wire>(&mut self, dst: &mut Vec<T>, max: usize) -> Result<Progress, CodecError> {
        if self.state() != BODY {
            let Some(keep) = self.get_len(max)? else {
                return Ok(Progress::Pending);
            };

            dst.clear();
            dst.reserve_exact(keep);
        }

        loop {
            let Slot {
                index,
                index_max,
                extra: keep,
                ..
            } = *self.cursor.current();

            if index == index_max {
                // clamped elements were decoded to stay framed
                dst.truncate(keep);
                return Ok(Progress::Done);
            }

            if dst.len() == index {
                dst.push(T::default());
            }

            let item = &mut dst[index];

            if !self.nested(|r| item.get(r))?.is_done() {
                return Ok(Progress::Pending);
            }

            self.cursor.slot().index += 1;
        }
    }

    /// Reads a map of at most `max` entries (the null key aside) into `dst`,
    /// replacing its contents.
    pub fn get_map<K, V>(&mut self, dst: &mut Map<K, V>, max: usize) -> Result<Progress, CodecError>
    where
        K: Scalar + Eq + Hash,
        V: Wire,
    {
        loop {
            match self.state() {
                MAP_CONTROL => {
                    let Some(control) = self.get_u8() else {
                        return Ok(Progress::Pending);
                    };

                    if control & 0b111 > 4 || (control >> 3) & 0b111 > 4 {
                        return Err(CodecError::BadWidth(control));
                    }

                    let slot = self.cursor.slot();
                    slot.bits = control;
                    slot.state = MAP_VALUED_COUNT;
                }

                MAP_VALUED_COUNT => {
                    let width = usize::from(self.cursor.current().bits & 0b111);

                    let Some(valued) = self.get_val(width) else {
                        return Ok(Progress::Pending);
                    };

                    let slot = self.cursor.slot();
                    slot.index_max = valued as usize;
                    slot.state = MAP_NULL_COUNT;
                }

                MAP_NULL_COUNT => {
                    let width = usize::from((self.cursor.current().bits >> 3) & 0b111);

                    let Some(nulls) = self.get_val(width) else {
                        return Ok(Progress::Pending);
                    };

                    let nulls = nulls as usize;
                    let valued = self.cursor.current().index_max;
                    let keep = self.cursor.bound(valued + nulls, max)?;

                    dst.entries.clear();
                    dst.entries.reserve(keep);
                    dst.null_key = None;

                    let slot = self.cursor.slot();
                    slot.index = 0;
                    slot.extra = nulls;
                    slot.state = MAP_NULL_KEY;
                }

                MAP_NULL_KEY => {
                    let control = self.cursor.current().bits;

                    if control & NULL_KEY_VALUED != 0 {
                        let value = dst
                            .null_key
                            .get_or_insert_with(|| Some(V::default()))
                            .get_or_insert_with(V::default);

                        if !self.nested(|r| value.get(r))?.is_done() {
                            return Ok(Progress::Pending);
                        }
                    } else if control & NULL_KEY != 0 {
                        dst.null_key = Some(None);
                    }

                    self.set_state(MAP_KEY);
                }

                MAP_KEY | MAP_VALUE => {
                    let Slot {
                        index, index_max, ..
                    } = *self.cursor.current();

                    if index == index_max {
                        let slot = self.cursor.slot();
                        slot.index = 0;
                        slot.state = MAP_NULL_VALUED;
                        continue;
                    }

                    if self.state() == MAP_KEY {
                        let Some(key) = self.get::<K>() else {
                            return Ok(Progress::Pending);
                        };

                        dst.entries.insert(key, Some(V::default()));

                        let slot = self.cursor.slot();
                        slot.key = key.to_wire();
                        slot.state = MAP_VALUE;
                    }

                    let key = K::from_wire(self.cursor.current().key);
                    let value = dst
                        .entries
                        .entry(key)
                        .or_insert_with(|| Some(V::default()))
                        .get_or_insert_with(V::default);

                    if !self.nested(|r| value.get(r))?.is_done() {
                        return Ok(Progress::Pending);
                    }

                    let slot = self.cursor.slot();
                    slot.index += 1;
                    slot.state = MAP_KEY;
                }

                MAP_NULL_VALUED => {
                    let Slot { index, extra, .. } = *self.cursor.current();

                    for _ in index..extra {
                        let Some(key) = self.get::<K>() else {
                            return Ok(Progress::Pending);
                        };

                        dst.entries.insert(key, None);
                        self.cursor.slot().index += 1;
                    }

                    self.set_state(MAP_DONE);
                }

                MAP_DONE => {
                    // only a clamped overflow gets this far
                    if self.cursor.current().overflowed {
                        dst.truncate(max);
                    }

                    return Ok(Progress::Done);
                }

                state => panic!("invalid map state {state}"),
            }
        }
    }
}
