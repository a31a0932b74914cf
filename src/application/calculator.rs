//! Calculator service: growth calculations against a loaded reference.
//!
//! The service owns the reference behind an `Arc`, so clones are cheap and
//! can be handed to worker threads. Every operation is a pure function of
//! the reference and its arguments.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{
    self, GrowthReference, InterpolationMode, Lms, MeasurementType, Query, ReferenceError,
    ReferenceProfile, Sex, COLE_NINE_CENTILES,
};
use crate::ports::ReferenceSource;
use crate::GrowthError;

/// One measurement of one child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Decimal age (corrected for gestation where appropriate)
    pub age: f64,
    pub measurement: MeasurementType,
    pub sex: Sex,
    /// Raw value in the measurement's units
    pub value: f64,
}

impl Observation {
    #[must_use]
    pub fn new(age: f64, measurement: MeasurementType, sex: Sex, value: f64) -> Self {
        Self {
            age,
            measurement,
            sex,
            value,
        }
    }
}

/// Result of a single calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub observation: Observation,
    pub lms: Lms,
    pub mode: InterpolationMode,
    pub sds: f64,
    pub centile: f64,
    /// Value as a percentage of the age/sex median
    pub percentage_median: f64,
}

/// Measurement value on one centile line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CentileValue {
    pub centile: f64,
    pub sds: f64,
    pub value: f64,
}

/// Service for growth calculations.
#[derive(Debug, Clone)]
pub struct GrowthCalculator {
    reference: Arc<GrowthReference>,
}

impl GrowthCalculator {
    /// Create a calculator over an already built reference.
    #[must_use]
    pub fn new(reference: Arc<GrowthReference>) -> Self {
        Self { reference }
    }

    /// Load the reference table once from `source`.
    ///
    /// # Errors
    /// Returns `GrowthError::Source` wrapping the source's own error if it
    /// fails to load.
    pub fn from_source<R: ReferenceSource>(
        source: &R,
        profile: ReferenceProfile,
    ) -> Result<Self, GrowthError> {
        tracing::info!("Loading reference data from {}", source.describe());
        let table = source
            .load()
            .map_err(|e| GrowthError::Source(Box::new(e)))?;

        let missing: Vec<String> = MeasurementType::ALL
            .iter()
            .flat_map(|&m| Sex::ALL.iter().map(move |&s| (m, s)))
            .filter(|&(m, s)| table.series(m, s).is_none())
            .map(|(m, s)| format!("{m}/{s}"))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "Reference '{}' has no data for: {}",
                table.name(),
                missing.join(", ")
            );
        }

        tracing::info!(
            "Reference '{}' ready with profile '{}'",
            table.name(),
            profile.name
        );
        Ok(Self::new(Arc::new(GrowthReference::new(table, profile))))
    }

    #[must_use]
    pub fn reference(&self) -> &GrowthReference {
        &self.reference
    }

    /// Standard deviation score for a measurement.
    ///
    /// # Errors
    /// Returns error if the age, measurement or value is outside the reference.
    pub fn sds(&self, age: f64, measurement: MeasurementType, value: f64, sex: Sex) -> Result<f64, GrowthError> {
        Ok(self.reference.sds(age, measurement, value, sex)?)
    }

    /// Centile for a standard deviation score.
    #[must_use]
    pub fn centile(&self, sds: f64) -> f64 {
        domain::centile(sds)
    }

    /// Measurement value at a standard deviation score.
    ///
    /// # Errors
    /// Returns error if the age or measurement is outside the reference.
    pub fn measurement_from_sds(
        &self,
        measurement: MeasurementType,
        requested_sds: f64,
        sex: Sex,
        age: f64,
    ) -> Result<f64, GrowthError> {
        Ok(self
            .reference
            .measurement_from_sds(measurement, requested_sds, sex, age)?)
    }

    /// Measurement value on a centile line.
    ///
    /// # Errors
    /// Returns `GrowthError::Validation` if the centile is not strictly
    /// between 0 and 100, or a lookup error.
    pub fn measurement_for_centile(
        &self,
        measurement: MeasurementType,
        centile: f64,
        sex: Sex,
        age: f64,
    ) -> Result<f64, GrowthError> {
        let sds = domain::sds_for_centile(centile).ok_or_else(|| {
            GrowthError::Validation(format!("Centile {centile} must be between 0 and 100"))
        })?;
        self.measurement_from_sds(measurement, sds, sex, age)
    }

    /// BMI as a percentage of the median for age and sex.
    ///
    /// # Errors
    /// Returns error if the age is outside the BMI reference.
    pub fn percentage_median(&self, age: f64, actual_bmi: f64, sex: Sex) -> Result<f64, GrowthError> {
        Ok(self.reference.percentage_median(age, actual_bmi, sex)?)
    }

    /// Full calculation for one observation.
    ///
    /// # Errors
    /// Returns error if the observation cannot be placed on the reference.
    pub fn calculate(&self, observation: &Observation) -> Result<Calculation, GrowthError> {
        let Observation {
            age,
            measurement,
            sex,
            value,
        } = *observation;

        let interpolation = self.reference.interpolate(age, measurement, sex)?;
        let query = Query::new(age, measurement, sex);
        let sds = domain::lms::z_score(&interpolation.lms, value)
            .map_err(|e| ReferenceError::from_lms(query, e))?;
        let centile = domain::centile(sds);
        let percentage_median = value / interpolation.lms.m * 100.0;

        tracing::debug!(
            "{measurement} {value} ({sex}, {age:.4}y): sds={sds:.3}, centile={centile:.1} [{} @ row {}]",
            interpolation.mode,
            interpolation.index
        );

        Ok(Calculation {
            observation: *observation,
            lms: interpolation.lms,
            mode: interpolation.mode,
            sds,
            centile,
            percentage_median,
        })
    }

    /// Calculate many observations in parallel.
    ///
    /// Results are returned in input order; a failing observation does not
    /// affect the others.
    #[must_use]
    pub fn calculate_batch(&self, observations: &[Observation]) -> Vec<Result<Calculation, GrowthError>> {
        let results: Vec<_> = observations
            .par_iter()
            .map(|observation| self.calculate(observation))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!("{failed} of {} observations could not be calculated", results.len());
        }
        results
    }

    /// Values of the nine chart centile lines at one age.
    ///
    /// # Errors
    /// Returns error if the age or measurement is outside the reference.
    pub fn centile_lines(
        &self,
        measurement: MeasurementType,
        sex: Sex,
        age: f64,
    ) -> Result<Vec<CentileValue>, GrowthError> {
        let lms = self.reference.get_lms(age, measurement, sex)?;
        let query = Query::new(age, measurement, sex);
        COLE_NINE_CENTILES
            .iter()
            .map(|&(centile, sds)| {
                let value = domain::lms::value_from_z(&lms, sds)
                    .map_err(|e| ReferenceError::from_lms(query, e))?;
                Ok(CentileValue { centile, sds, value })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthetic_table;

    fn create_test_calculator() -> GrowthCalculator {
        let reference = GrowthReference::new(synthetic_table(), ReferenceProfile::uk_who());
        GrowthCalculator::new(Arc::new(reference))
    }

    #[test]
    fn test_calculate_matches_engine() {
        let calculator = create_test_calculator();
        let observation = Observation::new(3.3, MeasurementType::Weight, Sex::Female, 14.2);
        let result = calculator.calculate(&observation).expect("Should calculate");

        let sds = calculator
            .sds(3.3, MeasurementType::Weight, 14.2, Sex::Female)
            .expect("Should calculate sds");
        assert_eq!(result.sds, sds);
        assert_eq!(result.centile, calculator.centile(sds));
        assert_eq!(result.mode, InterpolationMode::Cubic);
        assert!((result.percentage_median - 14.2 / result.lms.m * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_reports_errors() {
        let calculator = create_test_calculator();
        let observation = Observation::new(25.0, MeasurementType::Height, Sex::Male, 180.0);
        let err = calculator.calculate(&observation).expect_err("Above 20y");
        assert!(matches!(
            err,
            GrowthError::Reference(ReferenceError::OutOfDomainAge { .. })
        ));
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let calculator = create_test_calculator();
        let observations = vec![
            Observation::new(1.0, MeasurementType::Height, Sex::Male, 76.0),
            Observation::new(25.0, MeasurementType::Height, Sex::Male, 180.0),
            Observation::new(0.01, MeasurementType::Bmi, Sex::Female, 13.0),
            Observation::new(8.0, MeasurementType::Bmi, Sex::Female, 16.0),
        ];
        let results = calculator.calculate_batch(&observations);

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(matches!(
            results[2],
            Err(GrowthError::Reference(ReferenceError::UnsupportedMeasurementRange { .. }))
        ));
        let last = results[3].as_ref().expect("Should calculate");
        assert_eq!(last.observation, observations[3]);
    }

    #[test]
    fn test_centile_lines_are_ordered() {
        let calculator = create_test_calculator();
        let lines = calculator
            .centile_lines(MeasurementType::Ofc, Sex::Male, 0.5)
            .expect("Should compute lines");

        assert_eq!(lines.len(), 9);
        assert!(lines.windows(2).all(|w| w[0].value < w[1].value));
        let median = calculator.reference().get_lms(0.5, MeasurementType::Ofc, Sex::Male).expect("valid").m;
        assert!((lines[4].value - median).abs() < 1e-12);
    }

    #[test]
    fn test_measurement_for_centile() {
        let calculator = create_test_calculator();
        let value = calculator
            .measurement_for_centile(MeasurementType::Height, 50.0, Sex::Female, 6.0)
            .expect("Should compute");
        let median = calculator
            .reference()
            .get_lms(6.0, MeasurementType::Height, Sex::Female)
            .expect("valid")
            .m;
        assert!((value - median).abs() < 1e-9);

        assert!(matches!(
            calculator.measurement_for_centile(MeasurementType::Height, 100.0, Sex::Female, 6.0),
            Err(GrowthError::Validation(_))
        ));
    }

    #[test]
    fn test_percentage_median_bmi() {
        let calculator = create_test_calculator();
        let m = calculator
            .reference()
            .get_lms(12.0, MeasurementType::Bmi, Sex::Male)
            .expect("valid")
            .m;
        let pct = calculator
            .percentage_median(12.0, m * 1.25, Sex::Male)
            .expect("Should compute");
        assert!((pct - 125.0).abs() < 1e-9);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fixture unavailable")]
    struct FixtureUnavailable;

    struct FixtureSource {
        available: bool,
    }

    impl ReferenceSource for FixtureSource {
        type Error = FixtureUnavailable;

        fn load(&self) -> Result<crate::domain::ReferenceTable, FixtureUnavailable> {
            if self.available {
                Ok(synthetic_table())
            } else {
                Err(FixtureUnavailable)
            }
        }

        fn describe(&self) -> String {
            "in-memory fixture".to_string()
        }
    }

    #[test]
    fn test_from_source_accepts_any_source() {
        let calculator =
            GrowthCalculator::from_source(&FixtureSource { available: true }, ReferenceProfile::uk_who())
                .expect("Should load");
        assert!(calculator
            .sds(1.0, MeasurementType::Height, 76.0, Sex::Male)
            .is_ok_and(f64::is_finite));

        let err = GrowthCalculator::from_source(&FixtureSource { available: false }, ReferenceProfile::uk_who())
            .expect_err("Source fails");
        match err {
            GrowthError::Source(source) => assert!(source.downcast_ref::<FixtureUnavailable>().is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_calculator_is_shareable_across_threads() {
        let calculator = create_test_calculator();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let calculator = calculator.clone();
                std::thread::spawn(move || {
                    calculator
                        .sds(5.0 + f64::from(i), MeasurementType::Weight, 20.0, Sex::Male)
                        .expect("Should calculate")
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("thread").is_finite());
        }
    }
}
