//! WebSocket layer: connection handling, wire messages, and the
//! per-session connection registry.
//!
//! The WebSocket endpoint at `/ws/{session_id}` carries the realtime
//! collaboration protocol: snapshot on join, edit relay, presence updates.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;
