//! Domain layer: growth reference types and numerics.
//!
//! Everything here is pure computation over an immutable reference table.
//! Nothing performs I/O; loading lives in `adapters`.

pub mod age;
mod interpolation;
pub mod lms;
mod measurement;
mod profile;
mod reference;

pub use age::{corrected_decimal_age, decimal_age, AgeError, Gestation};
pub use interpolation::{
    cubic_interpolation, linear_interpolation, GrowthReference, Interpolation, InterpolationMode,
};
pub use lms::{centile, sds_for_centile, Lms, LmsError, COLE_NINE_CENTILES};
pub use measurement::{bmi_from_height_weight, MeasurementError, MeasurementType, Sex};
pub use profile::{
    AgeBound, AgeRange, CoverageWindow, LinearZone, ReferenceProfile, UK_WHO_DECIMAL_AGES,
};
pub use reference::{
    Query, ReferenceError, ReferencePoint, ReferenceSeries, ReferenceTable, TableError,
};

#[cfg(test)]
pub(crate) use interpolation::tests::synthetic_table;
