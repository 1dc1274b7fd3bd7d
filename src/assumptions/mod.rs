//! Valuation assumptions: mortality, decrements, salary scale and benefit terms

mod decrements;
pub mod loader;
mod mortality;
mod salary;

pub use decrements::{
    completed_service, AgeBandTable, DisabilityTable, RetirementTable, SeparationTable,
    ServiceTable,
};
pub use loader::LoadedAssumptions;
pub use mortality::{ClassFactors, MortalitySource, MortalityTable};
pub use salary::SalaryScale;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Contribution and pension constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenefitTerms {
    /// Combined employer and employee contribution as a share of salary
    pub premium_rate: f64,
    /// Starting pension as a share of the highest lifetime salary
    pub pension_multiplier: f64,
    /// Annual cost-of-living increase applied from the first retired year
    pub cola: f64,
}

impl Default for BenefitTerms {
    fn default() -> Self {
        Self {
            premium_rate: 0.25,
            pension_multiplier: 0.55,
            cola: 0.02,
        }
    }
}

/// Container for all projection assumptions
#[derive(Debug, Clone)]
pub struct Assumptions {
    pub mortality: Arc<dyn MortalitySource>,
    pub separation: SeparationTable,
    pub retirement: RetirementTable,
    pub disability: DisabilityTable,
    pub salary: SalaryScale,
    pub benefits: BenefitTerms,
}

impl Assumptions {
    /// Built-in valuation tables
    pub fn default_valuation() -> Self {
        Self {
            mortality: Arc::new(MortalityTable::iam_2012_basic()),
            separation: SeparationTable::default_valuation(),
            retirement: RetirementTable::default_valuation(),
            disability: DisabilityTable::default_valuation(),
            salary: SalaryScale::default_valuation(),
            benefits: BenefitTerms::default(),
        }
    }

    /// Load assumptions from CSV files in the default location (data/assumptions/)
    pub fn from_csv() -> Result<Self> {
        Self::from_csv_path(Path::new(loader::DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load assumptions from CSV files in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let loaded = LoadedAssumptions::load_from(path)?;
        let defaults = RetirementTable::default_valuation();

        Ok(Self {
            mortality: Arc::new(MortalityTable::from_loaded(&loaded)),
            separation: SeparationTable::new(ServiceTable::from_pairs(&loaded.separation_rates)?),
            retirement: RetirementTable {
                by_age: AgeBandTable::new(loaded.retirement_age_rates.clone())?,
                min_completed_service_for_age: defaults.min_completed_service_for_age,
                by_service: ServiceTable::from_pairs(&loaded.retirement_service_rates)?,
            },
            disability: DisabilityTable::new(AgeBandTable::new(loaded.disability_rates.clone())?),
            salary: SalaryScale::new(AgeBandTable::new(loaded.salary_scale.clone())?),
            benefits: loaded.benefit_terms,
        })
    }

    /// Replace the mortality source, e.g. with a plan's own experience study
    pub fn with_mortality(mut self, mortality: Arc<dyn MortalitySource>) -> Self {
        self.mortality = mortality;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MortalityClass, Sex, Tier};

    #[test]
    fn test_csv_matches_built_in_tables() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(loader::DEFAULT_ASSUMPTIONS_PATH);
        let loaded = Assumptions::from_csv_path(&dir).unwrap();
        let built_in = Assumptions::default_valuation();

        assert_eq!(loaded.separation, built_in.separation);
        assert_eq!(loaded.retirement, built_in.retirement);
        assert_eq!(loaded.disability, built_in.disability);
        assert_eq!(loaded.salary, built_in.salary);
        assert_eq!(loaded.benefits, built_in.benefits);
        for age in [20, 45, 70, 95, 120, 121] {
            assert_eq!(
                loaded.mortality.probability(age, Sex::Male, MortalityClass::Safety),
                built_in.mortality.probability(age, Sex::Male, MortalityClass::Safety),
            );
        }
        assert_eq!(loaded.salary.growth_factor(2030, 33, Tier(1)), 1.055);
    }
}
