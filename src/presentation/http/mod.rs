//! HTTP Surface
//!
//! Routes and handlers for the chat-domain REST endpoints.

pub mod handlers;
pub mod routes;
