//! Messages, and the pumps that walk them.
//!
//! A message describes its wire layout as a fixed list of [`Step`]s. The generic
//! [`transmit`] and [`receive`] pumps walk that list one step at a time, keeping
//! their position in the [`Cursor`](crate::Cursor) so that they can stop whenever
//! the buffer runs out and pick up at the same step on the next call.

use crate::{Bits, CodecConfig, CodecError, Cursor, ID_BYTES, ID_MAX, Progress, Reader, Writer};

/// One step of a message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// A byte of packed flags: group number.
    Bits(u8),
    /// A field: position passed to the field hooks.
    Field(u8),
}

/// A value that can be written and read resumably.
///
/// Implemented for every fixed-width scalar, and for every [`Message`].
pub trait Wire: Default {
    fn put(&self, w: &mut Writer<'_>) -> Result<Progress, CodecError>;

    fn get(&mut self, r: &mut Reader<'_>) -> Result<Progress, CodecError>;
}

/// A message type (pack), with its id and field layout.
///
/// The field hooks are called with the writer/reader one level below the message,
/// so each field has a slot of its own. A hook called for an absent optional field
/// must report [`Progress::Done`] without touching the buffer: on the receiving
/// side, [`get_bits`](Self::get_bits) has already set it to `None`.
pub trait Message: Default {
    /// Positive for packets that travel on their own, negative for packs only
    /// found inside other messages. The magnitude is at most [`ID_MAX`].
    ///
    /// ```compile_fail
    /// use adhoc_utils::{CodecError, Message, Progress, Reader, Step, Writer};
    ///
    /// #[derive(Default)]
    /// struct Wide;
    ///
    /// impl Message for Wide {
    ///     const ID: i16 = 300;
    ///     const NAME: &'static str = "Wide";
    ///     const LAYOUT: &'static [Step] = &[];
    ///
    ///     fn put_field(&self, _: u8, _: &mut Writer<'_>) -> Result<Progress, CodecError> {
    ///         Ok(Progress::Done)
    ///     }
    ///
    ///     fn get_field(&mut self, _: u8, _: &mut Reader<'_>) -> Result<Progress, CodecError> {
    ///         Ok(Progress::Done)
    ///     }
    /// }
    ///
    /// let _ = adhoc_utils::to_vec(&Wide, Default::default());
    /// ```
    const ID: i16;
    const NAME: &'static str;
    const LAYOUT: &'static [Step];

    /// Packs the flags of group `group`.
    fn put_bits(&self, group: u8) -> Bits {
        let _ = group;
        Bits::new()
    }

    /// Unpacks the flags of group `group`.
    ///
    /// Optional fields flagged as present are set to `Some(Default::default())`,
    /// their payload is filled in by the following field steps.
    fn get_bits(&mut self, group: u8, bits: Bits) {
        let _ = (group, bits);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError>;

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError>;
}

/// The messages of a channel, as one type.
///
/// Usually implemented for an enum with one variant per root message, through
/// [`packets!`](crate::packets).
pub trait Packet: Sized {
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    /// Creates the empty message for `id`, or `None` if `id` is unknown.
    fn allocate(id: u16) -> Option<Self>;

    /// Writes the message, header included.
    fn put(&self, w: &mut Writer<'_>) -> Result<Progress, CodecError>;

    /// Reads the message body, the header having been consumed by [`read_id`].
    fn get(&mut self, r: &mut Reader<'_>) -> Result<Progress, CodecError>;
}

/// Runs `f` on an optional field's value, or reports it done if there is none.
///
/// ```ignore
/// 3 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, 255)),
/// ```
#[inline(always)]
pub fn if_present<T>(
    value: Option<T>,
    f: impl FnOnce(T) -> Result<Progress, CodecError>,
) -> Result<Progress, CodecError> {
    value.map_or(Ok(Progress::Done), f)
}

/// Slot state of a message pump once its header is through.
const FIRST_STEP: u32 = 1;

/// Reads the id of a packet from the header.
///
/// Returns `None` (possibly having consumed a partial header) if the input ran out.
///
/// # Panics
///
/// If the header has already been read.
pub fn read_id(r: &mut Reader<'_>) -> Option<u16> {
    assert_eq!(r.state(), 0, "packet header already read");

    let id = r.get_val(ID_BYTES)? as u16;
    r.set_state(FIRST_STEP);
    Some(id)
}

/// Writes as much of `m` as fits in `w`.
///
/// Calling this again once it has returned [`Progress::Done`] writes nothing and
/// returns [`Progress::Done`] again, until the cursor is reset.
///
/// # Panics
///
/// If the cursor is in a state this message can't be in.
pub fn transmit<M: Message>(m: &M, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
    const { assert!(M::ID.unsigned_abs() <= ID_MAX, "message id does not fit in the header") };

    let last = M::LAYOUT.len() as u32;

    loop {
        match w.state() {
            0 => {
                if !w.put_val(u64::from(M::ID.unsigned_abs()), ID_BYTES) {
                    return Ok(Progress::Pending);
                }

                if w.cursor.depth() == 0 {
                    log::debug!("transmitting {}", M::NAME);
                }
            }

            state if state <= last => match M::LAYOUT[state as usize - 1] {
                Step::Bits(group) => {
                    if !w.put_u8(m.put_bits(group).byte()) {
                        return Ok(Progress::Pending);
                    }
                }
                Step::Field(field) => {
                    w.cursor.set_context(M::NAME, field);

                    if !w.nested(|w| m.put_field(field, w))?.is_done() {
                        log::trace!("{}.{field}: output buffer full, suspending", M::NAME);
                        return Ok(Progress::Pending);
                    }
                }
            },

            state if state == last + 1 => return Ok(Progress::Done),

            state => panic!("invalid state {state} for message {}", M::NAME),
        }

        let state = w.state();
        w.set_state(state + 1);

        if state == last && w.cursor.depth() == 0 {
            log::debug!("transmitted {}", M::NAME);
        }
    }
}

/// Reads as much of `m` as `r` holds.
///
/// Like [`transmit`], further calls after completion are no-ops.
///
/// # Panics
///
/// If the cursor is in a state this message can't be in.
pub fn receive<M: Message>(m: &mut M, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
    const { assert!(M::ID.unsigned_abs() <= ID_MAX, "message id does not fit in the header") };

    let last = M::LAYOUT.len() as u32;
    let expected = M::ID.unsigned_abs();

    loop {
        match r.state() {
            0 => {
                let Some(got) = r.get_val(ID_BYTES) else {
                    return Ok(Progress::Pending);
                };

                let got = got as u16;
                if got != expected {
                    return Err(CodecError::UnexpectedId { expected, got });
                }
            }

            state if state <= last => match M::LAYOUT[state as usize - 1] {
                Step::Bits(group) => {
                    let Some(byte) = r.get_u8() else {
                        return Ok(Progress::Pending);
                    };

                    m.get_bits(group, Bits::from(byte));
                }
                Step::Field(field) => {
                    r.cursor.set_context(M::NAME, field);

                    if !r.nested(|r| m.get_field(field, r))?.is_done() {
                        log::trace!("{}.{field}: input exhausted, suspending", M::NAME);
                        return Ok(Progress::Pending);
                    }
                }
            },

            state if state == last + 1 => return Ok(Progress::Done),

            state => panic!("invalid state {state} for message {}", M::NAME),
        }

        let state = r.state();
        r.set_state(state + 1);

        if state == last && r.cursor.depth() == 0 {
            log::debug!("received {}", M::NAME);
        }
    }
}

impl<M: Message> Wire for M {
    #[inline(always)]
    fn put(&self, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        transmit(self, w)
    }

    #[inline(always)]
    fn get(&mut self, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        receive(self, r)
    }
}

macro_rules! scalar_wire {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            #[inline(always)]
            fn put(&self, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
                Ok(Progress::done_if(w.put(*self)))
            }

            #[inline(always)]
            fn get(&mut self, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
                Ok(match r.get::<$t>() {
                    Some(value) => {
                        *self = value;
                        Progress::Done
                    }
                    None => Progress::Pending,
                })
            }
        }
    )*};
}

scalar_wire!(u8, u16, u32, u64, i8, i16, i32, i64, bool, f32, f64);

/// Encodes `value` in one go.
pub fn to_vec<T: Wire>(value: &T, config: CodecConfig) -> Result<Vec<u8>, CodecError> {
    let mut cursor = Cursor::new(config);
    let mut out = Vec::new();
    let mut buf = [0; 256];

    loop {
        let mut w = Writer::new(&mut buf, &mut cursor);
        let progress = value.put(&mut w)?;
        let written = w.written();

        out.extend_from_slice(&buf[..written]);

        if progress.is_done() {
            return Ok(out);
        }
    }
}

/// Decodes a value from a complete encoding.
///
/// Trailing bytes are ignored.
pub fn from_slice<T: Wire>(bytes: &[u8], config: CodecConfig) -> Result<T, CodecError> {
    let mut cursor = Cursor::new(config);
    let mut value = T::default();

    match value.get(&mut Reader::new(bytes, &mut cursor))? {
        Progress::Done => Ok(value),
        Progress::Pending => Err(CodecError::Truncated),
    }
}

/// Declares an enum with one variant per root message, and implements
/// [`Packet`](crate::Packet) for it.
///
/// Each variant is named after, and wraps, the message type of the same name.
///
/// ```ignore
/// adhoc_utils::packets! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum AgentPacket { Version, Info }
/// }
/// ```
#[macro_export]
macro_rules! packets {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($variant),)+
        }

        const _: () = {
            $(
                let id = <$variant as $crate::Message>::ID;
                assert!(
                    id > 0 && id.unsigned_abs() <= $crate::ID_MAX,
                    concat!(stringify!($variant), " is not a root message id that fits in the header"),
                );
            )+
        };

        impl $crate::Packet for $name {
            fn id(&self) -> u16 {
                match self {
                    $(Self::$variant(_) => <$variant as $crate::Message>::ID as u16,)+
                }
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$variant as $crate::Message>::NAME,)+
                }
            }

            fn allocate(id: u16) -> Option<Self> {
                $(
                    if id == <$variant as $crate::Message>::ID as u16 {
                        return Some(Self::$variant(Default::default()));
                    }
                )+
                None
            }

            fn put(
                &self,
                w: &mut $crate::Writer<'_>,
            ) -> Result<$crate::Progress, $crate::CodecError> {
                match self {
                    $(Self::$variant(m) => $crate::message::transmit(m, w),)+
                }
            }

            fn get(
                &mut self,
                r: &mut $crate::Reader<'_>,
            ) -> Result<$crate::Progress, $crate::CodecError> {
                match self {
                    $(Self::$variant(m) => $crate::message::receive(m, r),)+
                }
            }
        }

        $(
            impl From<$variant> for $name {
                #[inline(always)]
                fn from(m: $variant) -> Self {
                    Self::$variant(m)
                }
            }
        )+
    };
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
