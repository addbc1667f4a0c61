//! User hooks of a [`Channel`](crate::Channel).

use adhoc_utils::Packet;

/// Creates the empty packet an incoming header announces.
///
/// Lets callers recycle packets, or refuse ids they do not want to handle: returning
/// `None` fails the channel with [`ChannelError::UnknownId`](crate::ChannelError::UnknownId).
///
/// Any `FnMut(u16) -> Option<P>` is an allocator.
pub trait Allocator<P> {
    fn allocate(&mut self, id: u16) -> Option<P>;
}

/// Allocates packets with [`Packet::allocate`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultAllocator;

impl<P: Packet> Allocator<P> for DefaultAllocator {
    #[inline(always)]
    fn allocate(&mut self, id: u16) -> Option<P> {
        P::allocate(id)
    }
}

impl<P, F: FnMut(u16) -> Option<P>> Allocator<P> for F {
    #[inline(always)]
    fn allocate(&mut self, id: u16) -> Option<P> {
        self(id)
    }
}

/// Callbacks invoked once a packet has fully gone through, after the stage
/// transition it triggers.
///
/// Both methods do nothing by default.
#[allow(unused_variables)]
pub trait Events<P> {
    /// The last byte of `packet` has been encoded.
    ///
    /// When the transport hands out buffers shorter than
    /// [`MIN_BUFFER_LEN`](adhoc_utils::MIN_BUFFER_LEN), packets are encoded into the
    /// staging buffer first: this then fires, and the stage moves on, while some of
    /// the packet's bytes are still waiting in
    /// [`Transmitter`](crate::Transmitter) for the next
    /// [`Channel::get_bytes`](crate::Channel::get_bytes) call.
    fn on_sent(&mut self, packet: &P) {}

    /// `packet` has been decoded. It is queued for [`Channel::recv`](crate::Channel::recv)
    /// right after this returns.
    fn on_received(&mut self, packet: &P) {}
}

impl<P> Events<P> for () {}
