//! WebSocket Gateway
//!
//! Real-time communication via WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod messages;

pub use gateway::{ChatGateway, ConnectedSession};
pub use handler::ws_handler;
pub use messages::{ClientCommand, ErrorEvent, ServerEvent};
