//! # collab-relay
//!
//! REST API and WebSocket relay for realtime collaborative coding
//! sessions.
//!
//! Multiple clients join a named session and edit a shared document
//! (source code text + selected language) with low latency. The relay
//! serializes writes per session, rebroadcasts edits to every other
//! member (last-writer-wins, no merge), and pushes participant presence
//! updates on join and leave. The crate also ships the client-side
//! [`client::SyncAgent`], a reconnecting WebSocket client with local-edit
//! echo suppression.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket, SyncAgent)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Connection Pump (ws/)
//!     │
//!     ├── SessionService (service/)
//!     │
//!     ├── SessionStore (domain/)
//!     └── ConnectionRegistry (ws/registry)
//! ```

pub mod api;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
