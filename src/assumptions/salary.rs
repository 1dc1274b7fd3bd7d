//! Salary merit scale

use std::collections::HashMap;

use super::decrements::AgeBandTable;
use crate::member::Tier;

/// Multiplicative annual salary growth by age band, with optional per-tier scales
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryScale {
    default: AgeBandTable,
    by_tier: HashMap<Tier, AgeBandTable>,
}

impl SalaryScale {
    pub fn new(default: AgeBandTable) -> Self {
        Self {
            default,
            by_tier: HashMap::new(),
        }
    }

    /// Six bands from under 25 through 50 and over, non-increasing in age
    pub fn default_valuation() -> Self {
        let bands = vec![
            (0, 1.075),
            (25, 1.065),
            (30, 1.055),
            (35, 1.045),
            (40, 1.040),
            (50, 1.035),
        ];
        Self::new(AgeBandTable::ordered(bands))
    }

    /// Override the scale for one tier
    pub fn with_tier(mut self, tier: Tier, scale: AgeBandTable) -> Self {
        self.by_tier.insert(tier, scale);
        self
    }

    /// Growth factor rolling the prior year's salary into `year`
    ///
    /// The calendar year is accepted so that plans with scheduled across-the-board
    /// increases can key on it; the built-in scales depend on age and tier only.
    pub fn growth_factor(&self, _year: i32, age: u32, tier: Tier) -> f64 {
        self.by_tier
            .get(&tier)
            .unwrap_or(&self.default)
            .value_or_first(age)
    }
}
