//! Adapters moving a [`Channel`]'s bytes through common transports.

use std::io;

use adhoc_proto::stage::StageTable;
use adhoc_utils::{
    Packet,
    queue::{consume_with, produce_with, rtrb},
};

use crate::{Allocator, Channel, ChannelError, Events};

/// Size of the stack buffer the [`std::io`] adapters go through.
const IO_CHUNK_LEN: usize = 1024;

/// Returns `true` for the error kinds a socket with a read timeout reports when
/// the timeout elapses.
#[inline(always)]
pub fn io_err_is_timeout(e: io::ErrorKind) -> bool {
    use io::ErrorKind::*;
    [WouldBlock, TimedOut].contains(&e)
}

impl<P: Packet, T: StageTable, A: Allocator<P>, E: Events<P>> Channel<P, T, A, E> {
    /// Writes every outgoing byte to `w`, returning how many were written.
    ///
    /// `w` should be blocking: the bytes of a failed write are lost, and the
    /// channel is closed.
    pub fn write_to(&mut self, mut w: impl io::Write) -> Result<usize, ChannelError> {
        let mut buf = [0; IO_CHUNK_LEN];
        let mut total = 0;

        loop {
            let n = self.get_bytes(&mut buf)?;

            if n == 0 {
                w.flush().map_err(|e| self.fail(e.into()))?;
                return Ok(total);
            }

            w.write_all(&buf[..n]).map_err(|e| self.fail(e.into()))?;
            total += n;
        }
    }

    /// Performs a single read from `r`, returning the number of bytes consumed.
    ///
    /// Timeouts (see [`io_err_is_timeout`]) read nothing and are not errors. The end
    /// of the stream closes the channel, cleanly between two packets, with an
    /// [`io::ErrorKind::UnexpectedEof`] error in the middle of one.
    pub fn read_from(&mut self, mut r: impl io::Read) -> Result<usize, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let mut buf = [0; IO_CHUNK_LEN];

        let n = loop {
            match r.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if io_err_is_timeout(e.kind()) => return Ok(0),
                Err(e) => return Err(self.fail(e.into())),
            }
        };

        if n == 0 {
            if self.receiver().in_flight().is_some() {
                return Err(self.fail(io::Error::from(io::ErrorKind::UnexpectedEof).into()));
            }

            self.close();
            return Ok(0);
        }

        self.put_bytes(&buf[..n])?;
        Ok(n)
    }

    /// Fills the free slots of `tx` with outgoing bytes, returning how many were pushed.
    #[inline(always)]
    pub fn push_into(&mut self, tx: &mut rtrb::Producer<u8>) -> Result<usize, ChannelError> {
        produce_with(tx, |buf| self.get_bytes(buf))
    }

    /// Feeds every byte readable from `rx` to the channel, returning how many were pulled.
    #[inline(always)]
    pub fn pull_from(&mut self, rx: &mut rtrb::Consumer<u8>) -> Result<usize, ChannelError> {
        consume_with(rx, |bytes| self.put_bytes(bytes))
    }
}
