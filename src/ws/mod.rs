//! WebSocket transport: upgrade, wire protocol, connection fan-out

pub mod handler;
pub mod hub;
pub mod protocol;
