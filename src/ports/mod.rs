//! Ports layer: Trait definitions for external operations.
//!
//! The engine only needs a reference table; where it comes from (a JSON
//! file, an embedded copy, a test fixture) sits behind `ReferenceSource`.

mod reference_source;

pub use reference_source::ReferenceSource;
