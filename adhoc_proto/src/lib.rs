//! Message definitions for the AdHoc agent and observer protocols.
//!
//! ## Roles
//!
//! Three kinds of endpoints talk to a central **server**:
//!
//! - **Agents** upload protocol descriptions ([`Project`](project::Project)) and
//!   request generated code back.
//! - **Observers** display a protocol description as a diagram, and persist the
//!   user's [`Layout`](observer::Layout) of it.
//!
//! ## Protocol model
//!
//! Every message is a plain struct implementing [`Message`](adhoc_utils::Message):
//! a numeric id, a name, and a fixed field layout. Messages with a positive id travel
//! on their own and appear in a packet enum ([`AgentPacket`](agent::AgentPacket),
//! [`ObserverPacket`](observer::ObserverPacket)). Messages with a negative id only
//! ever appear inside another one. The [`Project`](project::Project) aggregate is the
//! largest of them, with nested lists of hosts, packs, fields, channels and constants.
//!
//! ## Stages
//!
//! Which message may be sent or received next depends on the stage of the
//! conversation. Each channel's rules are a [`Transitions`](stage::Transitions)
//! table, see [`agent::stages`] and [`observer::stages`].
//!
//! ## Wire format
//!
//! See [`adhoc_utils`] for the encoding itself. Optional fields and booleans are
//! packed into bit groups, each group's byte preceding the fields it describes.

pub mod agent;
pub mod observer;
pub mod project;
pub mod stage;

pub use agent::AgentPacket;
pub use observer::ObserverPacket;
pub use project::Project;

/// Maximum length of names and short strings, in bytes.
pub const NAME_LEN: usize = 255;

/// Maximum length of documentation strings, in bytes.
pub const DOC_LEN: usize = 65_000;
