//! Configuration types
//!
//! Board-agnostic configuration structures and the embedded TOML parser.

pub mod toml;
pub mod types;

pub use self::toml::parse_config;
pub use types::*;
