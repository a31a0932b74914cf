//! JSON adapter: Implementation of ReferenceSource.
//!
//! Reads reference tables in the layout used by the growth reference
//! packages:
//!
//! ```json
//! {
//!   "name": "uk-who",
//!   "measurement": {
//!     "height": { "male": [ { "age": -0.2875, "L": 1, "M": 33.9, "S": 0.08 }, ... ] }
//!   }
//! }
//! ```
//!
//! Rows may omit `age`, in which case they align by position with the
//! document's `decimal_ages` array (or with the UK-WHO ages when the
//! document has none). A row that is `null`, or whose L/M/S are all
//! `null`, is a gap.
//!
//! # Integrity
//!
//! Clinical reference data must not drift silently. When an expected
//! SHA-256 digest is configured, the file bytes are checked before parsing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::domain::{
    Lms, MeasurementType, ReferencePoint, ReferenceProfile, ReferenceSeries, ReferenceTable, Sex,
    TableError, UK_WHO_DECIMAL_AGES,
};
use crate::ports::ReferenceSource;

/// Error type for loading reference files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SHA-256 mismatch for {path:?}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid reference layout: {0}")]
    Layout(String),

    #[error("Invalid reference data: {0}")]
    Table(#[from] TableError),
}

#[derive(Debug, Deserialize)]
struct RawReference {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimal_ages: Option<Vec<f64>>,
    measurement: BTreeMap<String, BTreeMap<String, Vec<Option<RawRow>>>>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    age: Option<f64>,
    #[serde(rename = "L", default)]
    l: Option<f64>,
    #[serde(rename = "M", default)]
    m: Option<f64>,
    #[serde(rename = "S", default)]
    s: Option<f64>,
}

impl RawRow {
    fn lms(&self) -> Result<Option<Lms>, String> {
        match (self.l, self.m, self.s) {
            (Some(l), Some(m), Some(s)) => Ok(Some(Lms::new(l, m, s))),
            (None, None, None) => Ok(None),
            _ => Err("row has some but not all of L, M and S".to_string()),
        }
    }
}

/// Lower-case hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a reference table document.
///
/// `fallback_name` is used when the document has no `name`.
///
/// # Errors
/// Returns error on malformed JSON, unknown measurement or sex keys, age
/// alignment problems, or invalid rows.
pub fn parse_reference(json: &str, fallback_name: &str) -> Result<ReferenceTable, LoadError> {
    let raw: RawReference = serde_json::from_str(json)?;
    let name = raw.name.unwrap_or_else(|| fallback_name.to_string());
    let shared_ages: &[f64] = raw.decimal_ages.as_deref().unwrap_or(&UK_WHO_DECIMAL_AGES[..]);

    let mut series = Vec::new();
    let mut seen = BTreeSet::new();
    for (measurement_key, by_sex) in &raw.measurement {
        let measurement: MeasurementType = measurement_key.parse().map_err(LoadError::Layout)?;
        for (sex_key, rows) in by_sex {
            let sex: Sex = sex_key.parse().map_err(LoadError::Layout)?;
            // Aliases ("length", "m") name the same series as their canonical keys.
            if !seen.insert((measurement, sex)) {
                return Err(LoadError::Layout(format!(
                    "duplicate series {measurement} ({sex}) under key {measurement_key}/{sex_key}"
                )));
            }
            let points = build_points(measurement, sex, rows, shared_ages)?;
            series.push((
                (measurement, sex),
                ReferenceSeries::new(measurement, sex, points)?,
            ));
        }
    }

    if series.is_empty() {
        return Err(LoadError::Layout("document has no measurement data".to_string()));
    }

    Ok(ReferenceTable::new(name, series))
}

fn build_points(
    measurement: MeasurementType,
    sex: Sex,
    rows: &[Option<RawRow>],
    shared_ages: &[f64],
) -> Result<Vec<ReferencePoint>, LoadError> {
    let with_age = rows
        .iter()
        .filter(|row| row.as_ref().is_some_and(|r| r.age.is_some()))
        .count();

    let aligned = if with_age == rows.len() {
        false
    } else if with_age == 0 {
        if rows.len() != shared_ages.len() {
            return Err(LoadError::Layout(format!(
                "{measurement} ({sex}) has {} rows but there are {} decimal ages",
                rows.len(),
                shared_ages.len()
            )));
        }
        true
    } else {
        return Err(LoadError::Layout(format!(
            "{measurement} ({sex}) mixes rows with and without ages"
        )));
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let table_error = |detail: String| TableError {
                measurement,
                sex,
                row: index,
                detail,
            };
            let Some(row) = row else {
                // A null row carries no age of its own, so it only makes
                // sense in an aligned layout.
                return if aligned {
                    Ok(ReferencePoint::gap(shared_ages[index]))
                } else {
                    Err(LoadError::Layout(format!(
                        "{measurement} ({sex}) row {index} is null but rows carry ages"
                    )))
                };
            };
            let age = if aligned {
                shared_ages[index]
            } else {
                row.age.ok_or_else(|| {
                    LoadError::Layout(format!("{measurement} ({sex}) row {index} has no age"))
                })?
            };
            let lms = row.lms().map_err(table_error)?;
            Ok(ReferencePoint { age, lms })
        })
        .collect()
}

/// Read a reference profile (interpolation zones and coverage windows).
///
/// # Errors
/// Returns error if the file cannot be read or is not a valid profile.
pub fn load_profile(path: &Path) -> Result<ReferenceProfile, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let profile: ReferenceProfile = serde_json::from_str(&content)?;
    tracing::info!(
        "Loaded profile '{}' from {:?} ({} linear zones, {} coverage windows)",
        profile.name,
        path,
        profile.linear_zones.len(),
        profile.coverage.len()
    );
    Ok(profile)
}

/// Reference table stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonReferenceFile {
    path: PathBuf,
    expected_sha256: Option<String>,
}

impl JsonReferenceFile {
    /// Source reading `path` without an integrity check.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expected_sha256: None,
        }
    }

    /// Require the file to hash to `sha256_hex` before it is parsed.
    #[must_use]
    pub fn with_sha256(mut self, sha256_hex: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256_hex.into().trim().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn verify_digest(&self, bytes: &[u8]) -> Result<(), LoadError> {
        let Some(expected) = &self.expected_sha256 else {
            tracing::debug!("No SHA-256 configured for {:?}; skipping integrity check", self.path);
            return Ok(());
        };
        let actual = sha256_hex(bytes);
        if &actual != expected {
            tracing::error!("Reference data at {:?} failed its integrity check", self.path);
            return Err(LoadError::DigestMismatch {
                path: self.path.clone(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl ReferenceSource for JsonReferenceFile {
    type Error = LoadError;

    fn load(&self) -> Result<ReferenceTable, LoadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.verify_digest(&bytes)?;

        let content = std::str::from_utf8(&bytes)
            .map_err(|e| LoadError::Layout(format!("file is not UTF-8: {e}")))?;
        let fallback_name = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("reference");
        let table = parse_reference(content, fallback_name)?;

        tracing::info!(
            "Loaded reference '{}' from {:?} ({} series, {} rows)",
            table.name(),
            self.path,
            table.keys().count(),
            table.row_count()
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("JSON file {}", self.path.display())
    }
}
