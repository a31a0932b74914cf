//! Adapters layer: Concrete implementations of ports.
//!
//! - `json`: reference tables and profiles from JSON files

pub mod json;

pub use json::LoadError;
