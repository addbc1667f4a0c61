//! Encoding half of the codec.

use core::hash::Hash;

use crate::{CodecError, Cursor, Map, Progress, Scalar, Slot, Wire, len_bytes};

/// Collection slot states.
const HEAD: u32 = 0;
const BODY: u32 = 1;

/// Map slot states.
const MAP_HEAD: u32 = 0;
const MAP_NULL_KEY: u32 = 1;
const MAP_KEY: u32 = 2;
const MAP_VALUE: u32 = 3;
const MAP_NULL_VALUED: u32 = 4;
const MAP_DONE: u32 = 5;

/// Writes values into one output buffer, resuming from the state held in a [`Cursor`].
///
/// Primitives (scalars, length prefixes, map headers) are written atomically: if the
/// buffer cannot hold one entirely, nothing is written and the caller gets
/// [`Progress::Pending`] back. Byte blobs and arrays are split at byte and element
/// boundaries respectively.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
    pub(crate) cursor: &'a mut Cursor,
}

impl<'a> Writer<'a> {
    #[inline(always)]
    pub fn new(buf: &'a mut [u8], cursor: &'a mut Cursor) -> Self {
        Self {
            buf,
            pos: 0,
            cursor,
        }
    }

    /// Number of bytes written so far.
    #[inline(always)]
    pub fn written(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The resumption state of the value currently being written.
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

    /// Writes the `width` low-order bytes of `value`, little-endian.
    ///
    /// Returns `false`, writing nothing, if they don't all fit.
    #[inline]
    pub fn put_val(&mut self, value: u64, width: usize) -> bool {
        debug_assert!(width <= 8);

        let Some(dst) = self.buf.get_mut(self.pos..self.pos + width) else {
            return false;
        };

        dst.copy_from_slice(&value.to_le_bytes()[..width]);
        self.pos += width;
        true
    }

    #[inline(always)]
    pub fn put_u8(&mut self, byte: u8) -> bool {
        self.put_val(u64::from(byte), 1)
    }

    #[inline(always)]
    pub fn put<T: Scalar>(&mut self, value: T) -> bool {
        self.put_val(value.to_wire(), T::WIDTH)
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

    /// Writes a length prefix for `len` elements, then enters the body state.
    fn put_len(&mut self, len: usize) -> bool {
        let width = len_bytes(len);

        if self.remaining() < 1 + width {
            return false;
        }

        // control byte, then the length itself
        let written = self.put_u8(width as u8) && self.put_val(len as u64, width);
        debug_assert!(written, "length prefix did not fit");

        let slot = self.cursor.slot();
        slot.index = 0;
        slot.index_max = len;
        slot.state = BODY;
        true
    }

    /// Writes a byte blob of at most `max` bytes.
    pub fn put_bytes(&mut self, bytes: &[u8], max: usize) -> Result<Progress, CodecError> {
        if self.state() == HEAD {
            let len = self.cursor.bound(bytes.len(), max)?;

            if !self.put_len(len) {
                return Ok(Progress::Pending);
            }
        }

        Ok(self.put_body(bytes))
    }

    /// Writes a string of at most `max` bytes of UTF-8.
    ///
    /// A clamped string is cut at the last character boundary that fits.
    pub fn put_str(&mut self, s: &str, max: usize) -> Result<Progress, CodecError> {
        if self.state() == HEAD {
            let mut len = self.cursor.bound(s.len(), max)?;

            while !s.is_char_boundary(len) {
                len -= 1;
            }

            if !self.put_len(len) {
                return Ok(Progress::Pending);
            }
        }

        Ok(self.put_body(s.as_bytes()))
    }

    fn put_body(&mut self, bytes: &[u8]) -> Progress {
        let Slot {
            index, index_max, ..
        } = *self.cursor.current();

        let n = (index_max - index).min(self.remaining());
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[index..index + n]);
        self.pos += n;

        let slot = self.cursor.slot();
        slot.index += n;
        Progress::done_if(slot.index == index_max)
    }

    /// Writes an array of at most `max` scalars.
    ///
    /// As many whole elements as fit are written per call.
    pub fn put_array<T: Scalar>(&mut self, items: &[T], max: usize) -> Result<Progress, CodecError> {
        if self.state() == HEAD {
            let len = self.cursor.bound(items.len(), max)?;

            if !self.put_len(len) {
                return Ok(Progress::Pending);
            }
        }

        let Slot {
            index, index_max, ..
        } = *self.cursor.current();

        let n = (index_max - index).min(self.remaining() / T::WIDTH);

        for &item in &items[index..index + n] {
            let written = self.put(item);
            debug_assert!(written, "array element did not fit");
        }

        let slot = self.cursor.slot();
        slot.index += n;
        Ok(Progress::done_if(slot.index == index_max))
    }

    /// Writes a sequence of at most `max` nested values, each in its own slot.
    pub fn put_seq<T: Wire>(&mut self, items: &[T], max: usize) -> Result<Progress, CodecError> {
        if self.state() == HEAD {
            let len = self.cursor.bound(items.len(), max)?;

            if !self.put_len(len) {
                return Ok(Progress::Pending);
            }
        }

        loop {
            let Slot {
                index, index_max, ..
            } = *self.cursor.current();

            if index == index_max {
                return Ok(Progress::Done);
            }

            let item = &items[index];

            if !self.nested(|w| item.put(w))?.is_done() {
                return Ok(Progress::Pending);
            }

            self.cursor.slot().index += 1;
        }
    }

    /// Writes a map of at most `max` entries, the null key aside.
    ///
    /// Under [`OverflowPolicy::Clamp`](crate::OverflowPolicy::Clamp), entries carrying
    /// a value are kept first.
    ///
    /// # Panics
    ///
    /// If `map` is modified between two calls for the same transmit.
    pub fn put_map<K, V>(&mut self, map: &Map<K, V>, max: usize) -> Result<Progress, CodecError>
    where
        K: Scalar + Eq + Hash,
        V: Wire,
    {
        loop {
            match self.state() {
                MAP_HEAD => {
                    let valued = map.valued().count();
                    let nulls = map.entries.len() - valued;

                    let len = self.cursor.bound(valued + nulls, max)?;
                    let valued = valued.min(len);
                    let nulls = nulls.min(len - valued);

                    let (wv, wn) = (len_bytes(valued), len_bytes(nulls));

                    if self.remaining() < 1 + wv + wn {
                        return Ok(Progress::Pending);
                    }

                    let mut control = wv as u8 | (wn as u8) << 3;
                    if let Some(value) = &map.null_key {
                        control |= 1 << 6;
                        if value.is_some() {
                            control |= 1 << 7;
                        }
                    }

                    let written = self.put_u8(control)
                        && self.put_val(valued as u64, wv)
                        && self.put_val(nulls as u64, wn);
                    debug_assert!(written, "map header did not fit");

                    let slot = self.cursor.slot();
                    slot.index = 0;
                    slot.index_max = valued;
                    slot.extra = nulls;
                    slot.state = MAP_NULL_KEY;
                }

                MAP_NULL_KEY => {
                    if let Some(Some(value)) = &map.null_key {
                        if !self.nested(|w| value.put(w))?.is_done() {
                            return Ok(Progress::Pending);
                        }
                    }

                    self.set_state(MAP_KEY);
                }

                MAP_KEY | MAP_VALUE => {
                    let Slot {
                        index, index_max, ..
                    } = *self.cursor.current();

                    let mut entries = map.valued().skip(index);

                    for _ in index..index_max {
                        let Some((&key, value)) = entries.next() else {
                            panic!("map modified during transmit");
                        };

                        if self.state() == MAP_KEY {
                            if !self.put(key) {
                                return Ok(Progress::Pending);
                            }
                            self.set_state(MAP_VALUE);
                        }

                        if !self.nested(|w| value.put(w))?.is_done() {
                            return Ok(Progress::Pending);
                        }

                        let slot = self.cursor.slot();
                        slot.index += 1;
                        slot.state = MAP_KEY;
                    }

                    let slot = self.cursor.slot();
                    slot.index = 0;
                    slot.state = MAP_NULL_VALUED;
                }

                MAP_NULL_VALUED => {
                    let Slot { index, extra, .. } = *self.cursor.current();

                    let mut keys = map.null_valued().skip(index);

                    for _ in index..extra {
                        let Some(&key) = keys.next() else {
                            panic!("map modified during transmit");
                        };

                        if !self.put(key) {
                            return Ok(Progress::Pending);
                        }

                        self.cursor.slot().index += 1;
                    }

                    self.set_state(MAP_DONE);
                }

                MAP_DONE => return Ok(Progress::Done),

                state => panic!("invalid map state {state}"),
            }
        }
    }
}
