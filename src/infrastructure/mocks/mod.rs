//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling deterministic testing of time-driven primitives.

pub mod clock;
pub mod layer;
pub mod timer;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use timer::MockTimer;
