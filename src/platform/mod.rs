//! Hardware abstraction layer
//!
//! Traits describing the board services the firmware depends on, plus mock
//! implementations for hardware-free builds and tests. Production builds
//! provide board-specific implementations of the same traits.

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{PlatformError, Result};
