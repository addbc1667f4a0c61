//! The channel state machine.

use std::{collections::VecDeque, fmt, iter, sync::Arc};

use arrayvec::ArrayVec;

use adhoc_proto::stage::StageTable;
use adhoc_utils::{
    CodecError, Cursor, MIN_BUFFER_LEN, Overflow, Packet, Reader, Writer, message::read_id,
};

use crate::{Allocator, ChannelConfig, ChannelError, DefaultAllocator, Events};

/// Size of the buffer a [`Transmitter`] encodes into when the transport offers
/// less than [`MIN_BUFFER_LEN`] bytes.
pub const STAGING_LEN: usize = 256;

/// The sending half of a [`Channel`].
pub struct Transmitter<P> {
    queue: VecDeque<P>,
    current: Option<P>,
    cursor: Cursor,
    staging: ArrayVec<u8, STAGING_LEN>,
    flushed: usize,
}

impl<P: Packet> Transmitter<P> {
    fn new(cursor: Cursor) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            cursor,
            staging: ArrayVec::new_const(),
            flushed: 0,
        }
    }

    /// Number of packets waiting to be sent, the one in flight excluded.
    #[inline(always)]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The packet being encoded, if any.
    #[inline(always)]
    pub fn in_flight(&self) -> Option<&P> {
        self.current.as_ref()
    }

    /// Returns `true` if no byte is waiting to go out.
    #[inline(always)]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none() && !self.is_staged()
    }

    #[inline(always)]
    fn is_staged(&self) -> bool {
        self.flushed < self.staging.len()
    }

    /// Copies as many staged bytes as fit into `out`.
    fn flush(&mut self, out: &mut [u8]) -> usize {
        let staged = &self.staging[self.flushed..];
        let n = staged.len().min(out.len());
        out[..n].copy_from_slice(&staged[..n]);
        self.flushed += n;

        if !self.is_staged() {
            self.staging.clear();
            self.flushed = 0;
        }

        n
    }

    /// Encodes the packet in flight into `out`.
    ///
    /// Returns the number of bytes written, and the packet once its last byte is
    /// out of the pump. Buffers shorter than [`MIN_BUFFER_LEN`] are served from the
    /// staging buffer.
    fn encode(&mut self, out: &mut [u8]) -> Result<(usize, Option<P>), CodecError> {
        let Some(packet) = &self.current else {
            return Ok((0, None));
        };

        let (n, progress) = if out.len() >= MIN_BUFFER_LEN {
            let mut w = Writer::new(out, &mut self.cursor);
            let progress = packet.put(&mut w)?;
            (w.written(), progress)
        } else {
            self.staging.clear();
            self.staging.extend(iter::repeat_n(0, STAGING_LEN));

            let mut w = Writer::new(&mut self.staging[..], &mut self.cursor);
            let progress = packet.put(&mut w);
            let staged = w.written();
            self.staging.truncate(staged);
            let progress = progress?;

            self.flushed = 0;
            (self.flush(out), progress)
        };

        if !progress.is_done() {
            return Ok((n, None));
        }

        self.cursor.reset();
        Ok((n, self.current.take()))
    }
}

impl<P: Packet> fmt::Debug for Transmitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter")
            .field("queued", &self.queue.len())
            .field("in_flight", &self.current.as_ref().map(P::name))
            .field("staged", &(self.staging.len() - self.flushed))
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// The receiving half of a [`Channel`].
pub struct Receiver<P> {
    current: Option<P>,
    cursor: Cursor,
    inbox: VecDeque<P>,
}

impl<P: Packet> Receiver<P> {
    fn new(cursor: Cursor) -> Self {
        Self {
            current: None,
            cursor,
            inbox: VecDeque::new(),
        }
    }

    /// The packet being decoded, if its header has arrived.
    #[inline(always)]
    pub fn in_flight(&self) -> Option<&P> {
        self.current.as_ref()
    }

    /// Number of decoded packets not yet taken out with [`Channel::recv`].
    #[inline(always)]
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl<P: Packet> fmt::Debug for Receiver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("in_flight", &self.current.as_ref().map(P::name))
            .field("pending", &self.inbox.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// A two-way conversation over a byte transport.
///
/// `P` is the packet family carried, `T` the conversation rules. Incoming packets
/// are created by `A`, and `E` is notified of every completed packet.
///
/// The channel never touches the transport itself: feed it the bytes you receive
/// with [`Channel::put_bytes`], and ask it for the bytes to send with
/// [`Channel::get_bytes`] (or use one of the adapters over [`std::io`] and `rtrb`).
///
/// # Errors
///
/// Apart from [`ChannelError::QueueFull`], every error closes the channel for good.
pub struct Channel<P, T: StageTable, A = DefaultAllocator, E = ()> {
    tx: Transmitter<P>,
    rx: Receiver<P>,
    table: T,
    stage: T::Stage,
    allocator: A,
    events: E,
    config: ChannelConfig,
    closed: bool,
}

impl<P: Packet, T: StageTable> Channel<P, T> {
    pub fn new(table: T, config: ChannelConfig) -> Self {
        Self {
            tx: Transmitter::new(Cursor::new(config.codec)),
            rx: Receiver::new(Cursor::new(config.codec)),
            stage: table.start(),
            table,
            allocator: DefaultAllocator,
            events: (),
            config,
            closed: false,
        }
    }
}

impl<P: Packet, T: StageTable, A: Allocator<P>, E: Events<P>> Channel<P, T, A, E> {
    /// Replaces the allocator used for incoming packets.
    pub fn with_allocator<B: Allocator<P>>(self, allocator: B) -> Channel<P, T, B, E> {
        Channel {
            tx: self.tx,
            rx: self.rx,
            table: self.table,
            stage: self.stage,
            allocator,
            events: self.events,
            config: self.config,
            closed: self.closed,
        }
    }

    /// Replaces the event hooks.
    pub fn with_events<F: Events<P>>(self, events: F) -> Channel<P, T, A, F> {
        Channel {
            tx: self.tx,
            rx: self.rx,
            table: self.table,
            stage: self.stage,
            allocator: self.allocator,
            events,
            config: self.config,
            closed: self.closed,
        }
    }

    /// Installs a callback invoked on every collection overflow, in both directions.
    ///
    /// Mostly useful with [`OverflowPolicy::Clamp`](adhoc_utils::OverflowPolicy::Clamp),
    /// where overflows are otherwise silent. Resets both pumps, so call this before
    /// any byte goes through.
    pub fn with_overflow_handler(
        mut self,
        handler: impl Fn(&Overflow) + Send + Sync + 'static,
    ) -> Self {
        let handler = Arc::new(handler);
        let tx_handler = Arc::clone(&handler);

        self.tx.cursor = Cursor::new(self.config.codec).with_overflow_handler(move |o| (*tx_handler)(o));
        self.rx.cursor = Cursor::new(self.config.codec).with_overflow_handler(move |o| (*handler)(o));
        self
    }

    #[inline(always)]
    pub fn stage(&self) -> T::Stage {
        self.stage
    }

    #[inline(always)]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    #[inline(always)]
    pub fn table(&self) -> &T {
        &self.table
    }

    #[inline(always)]
    pub fn transmitter(&self) -> &Transmitter<P> {
        &self.tx
    }

    #[inline(always)]
    pub fn receiver(&self) -> &Receiver<P> {
        &self.rx
    }

    #[inline(always)]
    pub fn events(&self) -> &E {
        &self.events
    }

    #[inline(always)]
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the channel, dropping every queued and partially decoded packet.
    ///
    /// Packets already decoded can still be taken out with [`Channel::recv`].
    pub fn close(&mut self) {
        if !self.closed {
            log::debug!("closing channel in stage {:?}", self.stage);
        }

        self.closed = true;
        self.tx.queue.clear();
        self.tx.current = None;
        self.tx.staging.clear();
        self.tx.flushed = 0;
        self.tx.cursor.reset();
        self.rx.current = None;
        self.rx.cursor.reset();
    }

    /// Queues `packet` for transmission.
    ///
    /// Stage rules are only checked once the packet reaches the front of the queue.
    pub fn send(&mut self, packet: impl Into<P>) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        if self.tx.queue.len() >= self.config.queue_limit {
            return Err(ChannelError::QueueFull(self.config.queue_limit));
        }

        self.tx.queue.push_back(packet.into());
        Ok(())
    }

    /// Takes out the oldest decoded packet.
    #[inline(always)]
    pub fn recv(&mut self) -> Option<P> {
        self.rx.inbox.pop_front()
    }

    /// Fills `buf` with outgoing bytes, returning how many were written.
    ///
    /// Returns less than `buf.len()` only when nothing else is queued. Buffers of any
    /// size, down to a single byte, are accepted. A packet counts as sent, and
    /// [`Events::on_sent`] fires, as soon as it is fully encoded, which for small
    /// buffers may be before all of its staged bytes have been handed out.
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        self.transmit(buf).map_err(|e| self.fail(e))
    }

    /// Consumes every byte of `bytes`, queueing the packets they complete.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        self.receive(bytes).map_err(|e| self.fail(e))
    }

    pub(crate) fn fail(&mut self, e: ChannelError) -> ChannelError {
        log::error!("channel failed in stage {:?}: {e}", self.stage);
        self.close();
        e
    }

    fn check(table: &T, stage: T::Stage, id: u16) -> Result<T::Stage, ChannelError> {
        table
            .transition(stage, id)
            .ok_or_else(|| ChannelError::UnexpectedPacket {
                stage: format!("{stage:?}"),
                id,
            })
    }

    fn transmit(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let mut n = 0;

        loop {
            n += self.tx.flush(&mut buf[n..]);

            if self.tx.is_staged() || n == buf.len() {
                return Ok(n);
            }

            if self.tx.current.is_none() {
                let Some(packet) = self.tx.queue.pop_front() else {
                    return Ok(n);
                };

                Self::check(&self.table, self.stage, packet.id())?;
                log::trace!("sending {}", packet.name());
                self.tx.current = Some(packet);
            }

            let (written, done) = self.tx.encode(&mut buf[n..])?;
            n += written;

            if let Some(packet) = done {
                let next = Self::check(&self.table, self.stage, packet.id())?;
                log::debug!("sent {}: {:?} -> {next:?}", packet.name(), self.stage);
                self.stage = next;
                self.events.on_sent(&packet);
            }
        }
    }

    fn receive(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let mut pos = 0;

        while pos < bytes.len() {
            let mut r = Reader::new(&bytes[pos..], &mut self.rx.cursor);

            let packet = match &mut self.rx.current {
                Some(packet) => packet,
                slot @ None => {
                    let Some(id) = read_id(&mut r) else {
                        return Ok(());
                    };

                    Self::check(&self.table, self.stage, id)?;
                    let packet = self
                        .allocator
                        .allocate(id)
                        .ok_or(ChannelError::UnknownId(id))?;
                    log::trace!("receiving {}", packet.name());
                    slot.insert(packet)
                }
            };

            let progress = packet.get(&mut r)?;
            pos += r.consumed();

            if !progress.is_done() {
                continue;
            }

            self.rx.cursor.reset();

            if let Some(packet) = self.rx.current.take() {
                let next = Self::check(&self.table, self.stage, packet.id())?;
                log::debug!("received {}: {:?} -> {next:?}", packet.name(), self.stage);
                self.stage = next;
                self.events.on_received(&packet);
                self.rx.inbox.push_back(packet);
            }
        }

        Ok(())
    }
}

impl<P: Packet, T: StageTable, A, E> fmt::Debug for Channel<P, T, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("stage", &self.stage)
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
