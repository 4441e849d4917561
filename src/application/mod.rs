//! Application Layer
//!
//! Business logic services orchestrating the flow between the gateway and
//! the domain layer.

pub mod services;

pub use services::*;
