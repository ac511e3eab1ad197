//! # v086 Relay Server Library
//!
//! This library implements a relay server for the v086 emulator netplay
//! protocol. Emulator clients never talk to each other directly: every input
//! packet, chat line and lifecycle change flows through the server, which
//! fans it out to the right subset of connected clients over UDP.
//!
//! ## Core Responsibilities
//!
//! ### Reliable Delivery Over UDP
//! Datagrams may be lost, so every message a session sends carries a wrapping
//! 16-bit message number and stays in a bounded resend cache. When a client
//! reports that it stopped hearing from the server at some number, its
//! session replays everything from that number onwards, bundled at most nine
//! messages per datagram.
//!
//! ### Request and Event Dispatch
//! Inbound requests are routed to one stateless handler per message family.
//! The handler calls into the domain model, which publishes events; each
//! interested session runs the matching event handler to build its own
//! notification. Handlers are built once and shared by every session.
//!
//! ### Per-Client Socket Binding
//! After the handshake each client gets a private UDP port. The first
//! datagram fixes the peer address for that port and anything arriving from
//! elsewhere is logged and dropped.
//!
//! ### Looking-For-Game Reports
//! A freshly created game can be advertised after a debounce delay. Joining,
//! starting or leaving the game cancels the pending report.
//!
//! ## Architecture Design
//!
//! ### One Task Per Session
//! Each session runs its own receive loop on a tokio task. Domain events are
//! delivered synchronously on whichever task triggered them, and sends never
//! await, so a handler can notify any session without crossing tasks.
//!
//! ### Short Locks
//! Number assignment, caching, encoding and sending happen under one
//! per-session lock. The domain model releases its own lock before it
//! delivers events, so handlers are free to send or resend.
//!
//! ## Module Organization
//!
//! - `transport`: private single-peer UDP binding
//! - `session`: per-client numbering, resend cache and dispatch
//! - `cache`: resend cache and game-data caches
//! - `actions`: request and event handler tables
//! - `model`: users, games and domain events
//! - `scheduler`: debounced cancellable delayed tasks
//! - `lookingforgame`: looking-for-game reports and broadcasters
//! - `controller`: the public connect port
//! - `config` and `error`: runtime settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use protocol::BincodeCodec;
//! use relay::actions::HandlerTables;
//! use relay::config::RelayConfig;
//! use relay::controller::ConnectController;
//! use relay::model::RelayServer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::default();
//!     config.validate()?;
//!
//!     let server = RelayServer::new(config);
//!     let controller = ConnectController::bind(
//!         server,
//!         Arc::new(HandlerTables::standard()),
//!         Arc::new(BincodeCodec),
//!     )
//!     .await?;
//!
//!     // Answers handshakes and spawns one session task per client
//!     controller.run().await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod lookingforgame;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;
