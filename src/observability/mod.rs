//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers produce:
//!     → tracing events on every state transition
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//! ```
//!
//! # Design Decisions
//! - Structured fields (breaker name, from/to state, failures)
//! - The library never logs the caller's errors; it only reports transitions
//! - Subscriber installation is left to binaries

pub mod logging;
