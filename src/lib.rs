//! # Chat Gateway Library
//!
//! Real-time chat subsystem of a social-network backend:
//! - WebSocket gateway with per-connection session lifecycle
//! - Multi-category rate limiting and a security event log
//! - Message deduplication for at-least-once transports
//! - Per-room authenticated message encryption
//! - Presence-aware unread propagation
//! - Circuit-breaker-protected mutual-follow checks
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities and repository traits
//! - **Application Layer**: Orchestration services
//! - **Infrastructure Layer**: PostgreSQL repositories, in-memory stores,
//!   encryption, metrics
//! - **Presentation Layer**: WebSocket gateway and HTTP surface
//!
//! ## Module Structure
//!
//! ```text
//! chat_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities and traits
//! +-- application/    Application services
//! +-- infrastructure/ Repositories, stores, crypto, metrics
//! +-- presentation/   WebSocket gateway and HTTP routes
//! +-- shared/         Common utilities (errors, sanitization)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
