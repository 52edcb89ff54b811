//! # domains
//!
//! Entities, wire-level value types, error taxonomy and port traits for the
//! disaster dashboard. Nothing in here performs I/O; adapters implement the
//! ports and `services` drives them.

pub mod errors;
pub mod events;
pub mod http;
pub mod merge;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use events::*;
pub use http::*;
pub use merge::*;
pub use models::*;
pub use ports::*;
