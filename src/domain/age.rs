//! Decimal age from dates, with correction for preterm birth.
//!
//! Decimal age is elapsed days divided by 365.25. Babies born before 37
//! completed weeks are plotted at their corrected age: chronological age
//! minus the weeks they arrived before 40 weeks gestation. Corrected ages
//! are negative until term, which is why the reference starts at 23 weeks
//! gestation (-0.3258 y).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Days per decimal year.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Pregnancy length at term (40 weeks), in days.
pub const TERM_DAYS: i64 = 280;

/// Error type for age calculations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgeError {
    #[error("Observation date {observation} is before birth date {birth}")]
    ObservationBeforeBirth {
        birth: NaiveDate,
        observation: NaiveDate,
    },

    #[error("Gestation {weeks}+{days} weeks is outside 22+0 to 44+6")]
    InvalidGestation { weeks: u32, days: u32 },
}

/// Gestational age at birth in completed weeks plus days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gestation {
    pub weeks: u32,
    pub days: u32,
}

impl Gestation {
    /// Validate and build a gestation.
    ///
    /// # Errors
    /// Returns `AgeError::InvalidGestation` outside 22+0 to 44+6 weeks.
    pub fn new(weeks: u32, days: u32) -> Result<Self, AgeError> {
        if !(22..=44).contains(&weeks) || days > 6 {
            return Err(AgeError::InvalidGestation { weeks, days });
        }
        Ok(Self { weeks, days })
    }

    /// Term birth (40+0).
    #[must_use]
    pub fn term() -> Self {
        Self { weeks: 40, days: 0 }
    }

    #[must_use]
    pub fn total_days(&self) -> i64 {
        i64::from(self.weeks) * 7 + i64::from(self.days)
    }

    /// Born before 37 completed weeks.
    #[must_use]
    pub fn is_preterm(&self) -> bool {
        self.weeks < 37
    }
}

/// Chronological decimal age.
///
/// # Errors
/// Returns error if the observation precedes birth.
pub fn decimal_age(birth: NaiveDate, observation: NaiveDate) -> Result<f64, AgeError> {
    let days = (observation - birth).num_days();
    if days < 0 {
        return Err(AgeError::ObservationBeforeBirth { birth, observation });
    }
    Ok(days as f64 / DAYS_PER_YEAR)
}

/// Decimal age corrected for gestation.
///
/// Term babies (37 weeks and over) get their chronological age.
///
/// # Errors
/// Returns error if the observation precedes birth.
pub fn corrected_decimal_age(
    birth: NaiveDate,
    observation: NaiveDate,
    gestation: Gestation,
) -> Result<f64, AgeError> {
    let chronological = decimal_age(birth, observation)?;
    if !gestation.is_preterm() {
        return Ok(chronological);
    }
    let days = (observation - birth).num_days() - (TERM_DAYS - gestation.total_days());
    Ok(days as f64 / DAYS_PER_YEAR)
}
