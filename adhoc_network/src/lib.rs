//! Channels carrying AdHoc protocol packets over arbitrary byte transports.
//!
//! A [`Channel`] couples the resumable pumps of `adhoc_utils` with a
//! [`StageTable`] describing the conversation. It owns two halves:
//!
//! - a [`Transmitter`], draining a bounded queue of outgoing packets into
//!   whatever buffers the transport hands out, no matter how small,
//! - a [`Receiver`], feeding incoming bytes to the packet being decoded, allocating
//!   a fresh one whenever a header arrives.
//!
//! Every packet, sent or received, is checked against the stage table twice: once
//! when its header goes through (so illegal packets are never allocated nor
//! encoded), and once it is complete, at which point the conversation moves on to
//! the next stage and the user's [`Events`] hooks fire.
//!
//! ## Scope
//!
//! - Byte-oriented I/O: plain slices, [`std::io`] streams and `rtrb` ring buffers.
//! - Bounded queues and fatal error handling (any protocol violation closes the
//!   channel).
//!
//! This crate is intentionally transport-agnostic: it does not open sockets, and
//! leaves framing decisions (how many bytes to move at once, when to flush) to the
//! caller.

mod channel;
mod config;
mod error;
mod hooks;
mod transport;

pub use channel::{Channel, Receiver, STAGING_LEN, Transmitter};
pub use config::ChannelConfig;
pub use error::ChannelError;
pub use hooks::{Allocator, DefaultAllocator, Events};
pub use transport::io_err_is_timeout;

pub use adhoc_proto;
pub use adhoc_proto::stage::StageTable;
pub use adhoc_utils;
