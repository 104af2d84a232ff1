//! Client sync agent: the consumer-facing side of the relay protocol.
//!
//! Views own a [`SyncAgent`] per session. The agent replays local edits
//! outward, applies remote edits inward while suppressing the echo of a
//! just-sent local edit, and reconnects with a fixed delay whenever the
//! transport drops.

pub mod sync_agent;

pub use sync_agent::{Handler, HandlerId, LOCAL_EDIT_WINDOW, RECONNECT_DELAY, SyncAgent};
