//! Infrastructure Layer
//!
//! Implementations for everything outside the domain core:
//! - PostgreSQL repositories for the chat tables
//! - In-memory protection stores (sessions, rate limits, dedup, breaker)
//! - Room message encryption
//! - Prometheus metrics

pub mod crypto;
pub mod database;
pub mod metrics;
pub mod repositories;
pub mod stores;
