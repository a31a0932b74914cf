//! Reference table: LMS rows per measurement and sex, ordered by decimal age.
//!
//! Every row carries its own age. Rows sharing an age are deliberate: they
//! mark a switch between source populations (UK90 to WHO at 42 weeks, lying
//! to standing height at 2 years, WHO back to UK90 at 4 years) and are never
//! merged.
//!
//! The table is built once and is read-only afterwards; share it behind an
//! `Arc`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lms::{Lms, LmsError};
use super::measurement::{MeasurementType, Sex};

/// The (age, measurement, sex) a calculation was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub age: f64,
    pub measurement: MeasurementType,
    pub sex: Sex,
}

impl Query {
    #[must_use]
    pub fn new(age: f64, measurement: MeasurementType, sex: Sex) -> Self {
        Self {
            age,
            measurement,
            sex,
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) at age {}y", self.measurement, self.sex, self.age)
    }
}

/// Error type for reference lookups and LMS conversions.
///
/// Every variant carries the query that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReferenceError {
    #[error("Age outside the reference range [{min}, {max}] for {query}")]
    OutOfDomainAge { query: Query, min: f64, max: f64 },

    #[error("No reference data for {query}: {reason}")]
    UnsupportedMeasurementRange { query: Query, reason: String },

    #[error("Invalid LMS data for {query}: {detail}")]
    InvalidLmsData { query: Query, detail: String },

    #[error("Invalid observation {value} for {query}")]
    InvalidObservation { query: Query, value: f64 },

    #[error("No measurement corresponds to SDS {sds} for {query}")]
    UndefinedMeasurement { query: Query, sds: f64 },
}

impl ReferenceError {
    /// Attach query context to an LMS formula error.
    #[must_use]
    pub fn from_lms(query: Query, err: LmsError) -> Self {
        match err {
            LmsError::InvalidParameters(detail) => Self::InvalidLmsData { query, detail },
            LmsError::NonPositiveObservation(value) => Self::InvalidObservation { query, value },
            LmsError::UndefinedMeasurement(sds) => Self::UndefinedMeasurement { query, sds },
        }
    }

    /// The query that failed.
    #[must_use]
    pub fn query(&self) -> &Query {
        match self {
            Self::OutOfDomainAge { query, .. }
            | Self::UnsupportedMeasurementRange { query, .. }
            | Self::InvalidLmsData { query, .. }
            | Self::InvalidObservation { query, .. }
            | Self::UndefinedMeasurement { query, .. } => query,
        }
    }
}

/// Error raised while building a table from raw rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{measurement} ({sex}) row {row}: {detail}")]
pub struct TableError {
    pub measurement: MeasurementType,
    pub sex: Sex,
    pub row: usize,
    pub detail: String,
}

/// One row of the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Decimal age in years; negative before term (40 weeks gestation)
    pub age: f64,
    /// `None` where the source population has no data at this age
    pub lms: Option<Lms>,
}

impl ReferencePoint {
    #[must_use]
    pub fn new(age: f64, lms: Lms) -> Self {
        Self {
            age,
            lms: Some(lms),
        }
    }

    /// A row with no data.
    #[must_use]
    pub fn gap(age: f64) -> Self {
        Self { age, lms: None }
    }
}

/// Ordered rows for a single measurement and sex.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSeries {
    points: Vec<ReferencePoint>,
}

impl ReferenceSeries {
    /// Validate and wrap rows.
    ///
    /// # Errors
    /// Returns error if there are no rows, an age is not finite, ages
    /// decrease, or a present LMS triple is invalid.
    pub fn new(
        measurement: MeasurementType,
        sex: Sex,
        points: Vec<ReferencePoint>,
    ) -> Result<Self, TableError> {
        let fail = |row: usize, detail: String| TableError {
            measurement,
            sex,
            row,
            detail,
        };

        if points.is_empty() {
            return Err(fail(0, "series has no rows".to_string()));
        }

        for (row, point) in points.iter().enumerate() {
            if !point.age.is_finite() {
                return Err(fail(row, format!("age {} is not finite", point.age)));
            }
            if row > 0 && point.age < points[row - 1].age {
                return Err(fail(
                    row,
                    format!(
                        "age {} is below the previous age {}",
                        point.age,
                        points[row - 1].age
                    ),
                ));
            }
            if let Some(lms) = &point.lms {
                lms.validate().map_err(|e| fail(row, e.to_string()))?;
            }
        }

        Ok(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Youngest age in the series.
    #[must_use]
    pub fn min_age(&self) -> f64 {
        self.points[0].age
    }

    /// Oldest age in the series.
    #[must_use]
    pub fn max_age(&self) -> f64 {
        self.points[self.points.len() - 1].age
    }

    /// Index of the last row whose age is at or below `age`.
    ///
    /// Where several rows share that age, the last of them is returned.
    /// `None` if `age` is below the first row or is NaN.
    #[must_use]
    pub fn locate(&self, age: f64) -> Option<usize> {
        if age.is_nan() {
            return None;
        }
        self.points.partition_point(|p| p.age <= age).checked_sub(1)
    }

    /// Decimal age of row `index`.
    #[must_use]
    pub fn age_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).map(|p| p.age)
    }
}

/// Complete reference dataset, keyed by measurement and sex.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    name: String,
    series: BTreeMap<(MeasurementType, Sex), ReferenceSeries>,
}

impl ReferenceTable {
    /// Build a table from already validated series.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        series: impl IntoIterator<Item = ((MeasurementType, Sex), ReferenceSeries)>,
    ) -> Self {
        Self {
            name: name.into(),
            series: series.into_iter().collect(),
        }
    }

    /// Dataset name (e.g. `uk-who`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rows for one measurement and sex.
    #[must_use]
    pub fn series(&self, measurement: MeasurementType, sex: Sex) -> Option<&ReferenceSeries> {
        self.series.get(&(measurement, sex))
    }

    /// Measurement/sex combinations present in the table.
    pub fn keys(&self) -> impl Iterator<Item = (MeasurementType, Sex)> + '_ {
        self.series.keys().copied()
    }

    /// Total number of rows across all series.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.series.values().map(ReferenceSeries::len).sum()
    }
}
