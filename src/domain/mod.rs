//! # Domain Layer
//!
//! Core entities of the chat domain and the repository traits through which
//! the orchestrators consume persistence. No infrastructure dependencies;
//! implementations live in `infrastructure::repositories`.

pub mod entities;
pub mod services;

pub use entities::*;
pub use services::*;
