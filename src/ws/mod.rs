//! WebSocket layer: live tail of the log plus window replay.
//!
//! The endpoint at `/ws` pushes every appended record to the client and
//! answers `ping` and `replay` commands on the same socket.

pub mod connection;
pub mod handler;
pub mod messages;
