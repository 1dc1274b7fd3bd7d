//! Separation, retirement and disability decrement tables
//!
//! Rates are annual probabilities. Tables are plain data so a plan can swap in
//! the rates from its own valuation report.

use crate::error::{ModelError, Result};

/// Rates indexed by years of service, starting at `start` and capped at the last entry
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTable {
    start: u32,
    rates: Vec<f64>,
}

impl ServiceTable {
    pub fn new(start: u32, rates: Vec<f64>) -> Result<Self> {
        if rates.is_empty() {
            return Err(ModelError::InvalidTable("service table has no rates".into()));
        }
        validate_probabilities(&rates)?;
        Ok(Self { start, rates })
    }

    /// Build from (service, rate) pairs; services must be contiguous
    pub fn from_pairs(pairs: &[(u32, f64)]) -> Result<Self> {
        let start = pairs
            .first()
            .map(|&(service, _)| service)
            .ok_or_else(|| ModelError::InvalidTable("service table has no rows".into()))?;
        for (offset, &(service, _)) in pairs.iter().enumerate() {
            if service != start + offset as u32 {
                return Err(ModelError::InvalidTable(format!(
                    "service table skips from {} to {}",
                    start + offset as u32 - 1,
                    service
                )));
            }
        }
        Self::new(start, pairs.iter().map(|&(_, rate)| rate).collect())
    }

    /// Rate for the given service, or None below the first tabulated service
    pub fn rate(&self, service: u32) -> Option<f64> {
        let offset = service.checked_sub(self.start)? as usize;
        self.rates.get(offset.min(self.rates.len() - 1)).copied()
    }

    /// Highest service with its own entry; longer service uses this rate
    pub fn cap(&self) -> u32 {
        self.start + self.rates.len() as u32 - 1
    }
}

/// Values keyed by the lower bound of each age band
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBandTable {
    bands: Vec<(u32, f64)>,
}

impl AgeBandTable {
    pub fn new(bands: Vec<(u32, f64)>) -> Result<Self> {
        if bands.is_empty() {
            return Err(ModelError::InvalidTable("age band table has no bands".into()));
        }
        if bands.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(ModelError::InvalidTable(
                "age band lower bounds must be strictly increasing".into(),
            ));
        }
        Ok(Self { bands })
    }

    /// Built-in tables whose bands are known to be ordered
    pub(super) fn ordered(bands: Vec<(u32, f64)>) -> Self {
        Self { bands }
    }

    /// Value of the band containing `age`, or None below the first band
    pub fn value(&self, age: u32) -> Option<f64> {
        self.bands
            .iter()
            .rev()
            .find(|&&(lower, _)| age >= lower)
            .map(|&(_, value)| value)
    }

    /// Like `value`, but ages below the first band take the first band's value
    pub fn value_or_first(&self, age: u32) -> f64 {
        self.value(age).unwrap_or(self.bands[0].1)
    }
}

fn validate_probabilities(rates: &[f64]) -> Result<()> {
    match rates.iter().find(|r| !(0.0..=1.0).contains(*r)) {
        Some(bad) => Err(ModelError::InvalidTable(format!("rate {} is not a probability", bad))),
        None => Ok(()),
    }
}

/// Annual withdrawal probability for active members by capped service
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationTable {
    by_service: ServiceTable,
}

impl SeparationTable {
    pub fn new(by_service: ServiceTable) -> Self {
        Self { by_service }
    }

    /// Decreasing over the first twenty years of service, then flat
    pub fn default_valuation() -> Self {
        Self {
            by_service: ServiceTable {
                start: 0,
                rates: vec![
                    0.180, 0.140, 0.110, 0.090, 0.080, // 0-4
                    0.070, 0.060, 0.055, 0.050, 0.045, // 5-9
                    0.040, 0.035, 0.032, 0.030, 0.028, // 10-14
                    0.026, 0.024, 0.022, 0.021, 0.020, // 15-19
                    0.020, // 20+
                ],
            },
        }
    }

    /// Rate at `min(service, cap)`; zero below the first tabulated service
    pub fn rate(&self, service: u32) -> f64 {
        self.by_service.rate(service).unwrap_or(0.0)
    }

    pub fn by_service(&self) -> &ServiceTable {
        &self.by_service
    }
}

/// Service retirement rates with an age path and a long-service path
#[derive(Debug, Clone, PartialEq)]
pub struct RetirementTable {
    /// Rates from the first eligible age; the final band is normally certain retirement
    pub by_age: AgeBandTable,
    /// Completed service required before the age path applies
    pub min_completed_service_for_age: u32,
    /// Rates by completed service, regardless of age
    pub by_service: ServiceTable,
}

impl RetirementTable {
    pub fn default_valuation() -> Self {
        Self {
            by_age: AgeBandTable {
                bands: vec![(62, 0.25), (63, 0.15), (70, 1.0)],
            },
            min_completed_service_for_age: 15,
            by_service: ServiceTable {
                start: 20,
                rates: vec![
                    0.050, 0.040, 0.040, 0.040, 0.040, // 20-24
                    0.050, 0.060, 0.070, 0.080, 0.100, // 25-29
                    0.120, 0.150, 0.180, 0.220, 0.300, // 30-34+
                ],
            },
        }
    }

    /// Age-path probability, or None when the member is not eligible for it
    pub fn age_path(&self, age: u32, service: u32) -> Option<f64> {
        if completed_service(service) < self.min_completed_service_for_age {
            return None;
        }
        self.by_age.value(age)
    }

    /// Service-path probability, or None when the member is not eligible for it
    pub fn service_path(&self, service: u32) -> Option<f64> {
        self.by_service.rate(completed_service(service))
    }

    /// Probability that either path retires the member this year
    ///
    /// Both paths are tested against the same draw, so the combined
    /// probability is the larger of the two.
    pub fn probability(&self, age: u32, service: u32) -> f64 {
        let age_rate = self.age_path(age, service).unwrap_or(0.0);
        let service_rate = self.service_path(service).unwrap_or(0.0);
        age_rate.max(service_rate)
    }
}

/// Disability incidence by five-year age band from age 20
#[derive(Debug, Clone, PartialEq)]
pub struct DisabilityTable {
    by_age: AgeBandTable,
}

impl DisabilityTable {
    pub fn new(by_age: AgeBandTable) -> Self {
        Self { by_age }
    }

    pub fn default_valuation() -> Self {
        Self {
            by_age: AgeBandTable {
                bands: vec![
                    (20, 0.0001),
                    (25, 0.0002),
                    (30, 0.0004),
                    (35, 0.0007),
                    (40, 0.0012),
                    (45, 0.0020),
                    (50, 0.0033),
                    (55, 0.0050),
                    (60, 0.0060),
                ],
            },
        }
    }

    pub fn rate(&self, age: u32) -> f64 {
        self.by_age.value_or_first(age)
    }
}

/// Service years minus the year in progress
pub fn completed_service(service: u32) -> u32 {
    service.saturating_sub(1)
}
