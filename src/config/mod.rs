//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → CircuitBreaker::from_config / logging init
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a breaker's threshold and timeout
//!   never change after construction
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BreakerConfig;
pub use schema::GuardConfig;
pub use schema::ObservabilityConfig;
