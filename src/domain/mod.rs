//! Domain layer - pure algorithms with no clocks, locks or I/O.
//!
//! This layer contains the core logic of each primitive:
//! - Sliding-window request log (rate limiting)
//! - Circuit breaker state machine
//! - Recency-ordered map with lazy expiry (LRU cache)
//!
//! Every operation takes the current time in milliseconds as an argument,
//! which keeps all types in this layer deterministic and easily testable.

pub mod circuit;
pub mod recency;
pub mod window;
