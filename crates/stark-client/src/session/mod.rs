//! Sans-IO protocol session.
//!
//! `Session` is the whole Stark client state machine: channel state, pending
//! request table, outbound queue, keep-alive answers, and inbound dispatch.
//! It performs no I/O. Drivers feed it channel events (`handle_open`,
//! `handle_text`, `handle_close`, `expire`) and collect what it wants written
//! with `poll_transmit` and what it wants reported with `poll_event`.
//!
//! A session has exactly one owner. The async client keeps it inside a single
//! worker task, so the tables need no locking.

pub mod engine;
pub mod outbound;
pub mod pending;
pub mod state;

pub use engine::{Session, SessionEvent, SessionOptions};
pub use outbound::{DrainOrder, OutboundQueue};
pub use pending::{PendingRequests, ReplyHandler, Take};
pub use state::ChannelState;
