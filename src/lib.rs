//! # lmsgrowth
//!
//! Growth reference engine for child measurements using the LMS method.
//!
//! This crate provides:
//! - Interpolation of L, M and S at any decimal age across a reference
//!   spliced from several source populations (UK-WHO)
//! - SDS, centile and percentage-of-median calculation, and the inverse
//!   (measurement at a given SDS or centile)
//! - Decimal age, with correction for preterm birth
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Reference tables, interpolation profile and LMS numerics
//! - `ports`: Trait definitions for loading reference data
//! - `adapters`: Concrete implementations (JSON reference files)
//! - `application`: Calculator service over a loaded reference
//! - `config`: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{Calculation, GrowthCalculator, Observation};
pub use domain::{GrowthReference, Lms, MeasurementType, ReferenceProfile, Sex};

/// Result type for lmsgrowth operations
pub type Result<T> = std::result::Result<T, GrowthError>;

/// Main error type for lmsgrowth
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    #[error(transparent)]
    Reference(#[from] domain::ReferenceError),

    #[error("Failed to load reference data: {0}")]
    Load(#[from] adapters::LoadError),

    #[error("Invalid age: {0}")]
    Age(#[from] domain::AgeError),

    #[error("Invalid measurement: {0}")]
    Measurement(#[from] domain::MeasurementError),

    #[error("Reference source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
