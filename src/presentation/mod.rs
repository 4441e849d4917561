//! Presentation Layer
//!
//! The WebSocket gateway and the HTTP surface.

pub mod http;
pub mod middleware;
pub mod websocket;
