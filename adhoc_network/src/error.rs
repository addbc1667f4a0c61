use thiserror::Error;

use adhoc_utils::CodecError;

/// Errors raised by a [`Channel`](crate::Channel).
///
/// All of them except [`ChannelError::QueueFull`] are fatal: the channel logs them,
/// closes itself, and answers every later call with [`ChannelError::Closed`].
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unknown packet id {0}")]
    UnknownId(u16),
    #[error("packet {id} is not expected in stage {stage}")]
    UnexpectedPacket { stage: String, id: u16 },
    #[error("send queue is full ({0} packets)")]
    QueueFull(usize),
    #[error("channel is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Returns `true` if the channel survives this error.
    #[inline(always)]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull(_))
    }
}
