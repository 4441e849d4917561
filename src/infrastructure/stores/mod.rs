//! In-Memory Protection Stores
//!
//! Process-wide tables with explicit TTL-based lifecycles: sessions, rate
//! limit buckets, the security event log, the message dedup window, and the
//! circuit breaker. None of these persist; a restart starts them empty by
//! design. All are safe under the multi-threaded runtime (sharded maps or
//! short-lived mutexes).

pub mod circuit_breaker;
pub mod dedup;
pub mod rate_limiter;
pub mod security_log;
pub mod session_store;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use dedup::MessageDeduplicator;
pub use rate_limiter::{RateCategory, RateLimiter};
pub use security_log::SecurityEventLog;
pub use session_store::{Session, SessionStore};
