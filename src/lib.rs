#![warn(missing_docs)]

//! A client library for a UDP-based social deduction party game's
//! matchmaking/game protocol. Handles the handshake, reliability
//! (acks, keep-alive pings, reconnects), the roster/game model, and
//! exposes a small event-driven facade for bots and tools.

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate slog;

pub mod bytes;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod model;
pub mod protocol;
pub mod reliability;
pub mod session;

pub use crate::client::Client;
pub use crate::config::ClientConfig;
pub use crate::errors::{Error, ErrorKind, Result};
