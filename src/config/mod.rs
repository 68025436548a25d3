//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WardenConfig (validated, immutable)
//!     → DeadlineConfig handed to the middleware at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; deadline settings never change while
//!   requests are in flight
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DeadlineConfig, ListenerConfig, ObservabilityConfig, WardenConfig};
pub use validation::{validate_config, ValidationError};
