//! CSV-based assumption loader
//!
//! Loads a plan's valuation tables from CSV files in data/assumptions/

use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use super::mortality::ClassFactors;
use super::BenefitTerms;
use crate::error::{ModelError, Result};
use crate::member::MortalityClass;

/// Default path to assumptions directory
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions";

fn open_reader(path: &Path, file: &str) -> Result<csv::Reader<File>> {
    let file = File::open(path.join(file))?;
    Ok(csv::Reader::from_reader(file))
}

fn field<T>(record: &csv::StringRecord, idx: usize, file: &str) -> Result<T>
where
    T: FromStr,
    ModelError: From<T::Err>,
{
    let raw = record
        .get(idx)
        .ok_or_else(|| ModelError::InvalidTable(format!("{}: missing column {}", file, idx)))?;
    Ok(raw.trim().parse::<T>()?)
}

/// Load mortality base rates from CSV
/// Returns Vec<(female_rate, male_rate)> indexed by age
pub fn load_mortality_base_rates(path: &Path) -> Result<Vec<(f64, f64)>> {
    const FILE: &str = "mortality_base_rates.csv";
    let mut reader = open_reader(path, FILE)?;
    let mut rates: Vec<(f64, f64)> = Vec::new();

    for result in reader.records() {
        let record = result?;
        let age: usize = field(&record, 0, FILE)?;
        let female: f64 = field(&record, 1, FILE)?;
        let male: f64 = field(&record, 2, FILE)?;

        if age != rates.len() {
            return Err(ModelError::InvalidTable(format!(
                "{}: expected age {}, found {}",
                FILE,
                rates.len(),
                age
            )));
        }
        rates.push((female, male));
    }

    Ok(rates)
}

/// Load mortality class factors from CSV, defaulting classes the file omits
pub fn load_mortality_class_factors(path: &Path) -> Result<ClassFactors> {
    const FILE: &str = "mortality_class_factors.csv";
    let mut reader = open_reader(path, FILE)?;
    let mut factors = ClassFactors::default();

    for result in reader.records() {
        let record = result?;
        let class = MortalityClass::from_code(record.get(0).unwrap_or_default())?;
        let factor: f64 = field(&record, 1, FILE)?;
        factors.set(class, factor);
    }

    Ok(factors)
}

/// Load a two-column table of (integer key, rate)
///
/// Used for the service-indexed and age-banded decrement tables and the
/// salary scale, which all share this layout.
pub fn load_keyed_rates(path: &Path, file: &str) -> Result<Vec<(u32, f64)>> {
    let mut reader = open_reader(path, file)?;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let key: u32 = field(&record, 0, file)?;
        let rate: f64 = field(&record, 1, file)?;
        rows.push((key, rate));
    }

    Ok(rows)
}

/// Load premium and pension terms from CSV
pub fn load_benefit_terms(path: &Path) -> Result<BenefitTerms> {
    const FILE: &str = "benefit_terms.csv";
    let mut reader = open_reader(path, FILE)?;
    let mut terms = BenefitTerms::default();

    for result in reader.records() {
        let record = result?;
        let value: f64 = field(&record, 1, FILE)?;
        match record.get(0).map(str::trim) {
            Some("premium_rate") => terms.premium_rate = value,
            Some("pension_multiplier") => terms.pension_multiplier = value,
            Some("cola") => terms.cola = value,
            other => {
                return Err(ModelError::UnknownCode {
                    field: "benefit term",
                    value: other.unwrap_or_default().to_string(),
                })
            }
        }
    }

    Ok(terms)
}

/// All tables loaded from one assumptions directory
pub struct LoadedAssumptions {
    pub mortality_base_rates: Vec<(f64, f64)>,
    pub mortality_class_factors: ClassFactors,
    pub separation_rates: Vec<(u32, f64)>,
    pub retirement_age_rates: Vec<(u32, f64)>,
    pub retirement_service_rates: Vec<(u32, f64)>,
    pub disability_rates: Vec<(u32, f64)>,
    pub salary_scale: Vec<(u32, f64)>,
    pub benefit_terms: BenefitTerms,
}

impl LoadedAssumptions {
    /// Load all assumptions from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load all assumptions from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self {
            mortality_base_rates: load_mortality_base_rates(path)?,
            mortality_class_factors: load_mortality_class_factors(path)?,
            separation_rates: load_keyed_rates(path, "separation_rates.csv")?,
            retirement_age_rates: load_keyed_rates(path, "retirement_age_rates.csv")?,
            retirement_service_rates: load_keyed_rates(path, "retirement_service_rates.csv")?,
            disability_rates: load_keyed_rates(path, "disability_rates.csv")?,
            salary_scale: load_keyed_rates(path, "salary_scale.csv")?,
            benefit_terms: load_benefit_terms(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn data_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_ASSUMPTIONS_PATH)
    }

    #[test]
    fn test_load_shipped_assumptions() {
        let result = LoadedAssumptions::load_from(&data_dir());
        assert!(result.is_ok(), "Failed to load assumptions: {:?}", result.err());

        let loaded = result.unwrap();

        assert_eq!(loaded.mortality_base_rates.len(), 121);
        assert_eq!(loaded.mortality_base_rates[77], (0.0195, 0.026155));
        assert_eq!(loaded.mortality_class_factors.safety, 0.9);
        assert_eq!(loaded.separation_rates.len(), 21);
        assert_eq!(loaded.retirement_age_rates.last(), Some(&(70, 1.0)));
        assert_eq!(loaded.retirement_service_rates.first(), Some(&(20, 0.05)));
        assert_eq!(loaded.disability_rates.len(), 9);
        assert_eq!(loaded.salary_scale.len(), 6);
        assert_eq!(loaded.benefit_terms, BenefitTerms::default());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let result = LoadedAssumptions::load_from(Path::new("/nonexistent/assumptions"));
        assert!(matches!(result, Err(ModelError::Io(_))));
    }
}
