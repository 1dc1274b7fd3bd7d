//! Member records: employment status, demographics and the year-by-year salary history

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Employment status of a member in a given year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Separated,
    Retired,
    Disabled,
    /// Terminal: no record follows the first deceased year
    Deceased,
}

impl Status {
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Separated => "separated",
            Status::Retired => "retired",
            Status::Disabled => "disabled",
            Status::Deceased => "deceased",
        }
    }

    /// Parse the lowercase status codes used in member files
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "separated" => Ok(Status::Separated),
            "retired" => Ok(Status::Retired),
            "disabled" => Ok(Status::Disabled),
            "deceased" => Ok(Status::Deceased),
            _ => Err(ModelError::UnknownCode { field: "status", value: code.to_string() }),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sex of the member, used for mortality lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "F" | "f" | "Female" | "female" => Ok(Sex::Female),
            "M" | "m" | "Male" | "male" => Ok(Sex::Male),
            _ => Err(ModelError::UnknownCode { field: "sex", value: code.to_string() }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
        }
    }
}

/// Mortality classification of the member's occupation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MortalityClass {
    General,
    Safety,
}

impl MortalityClass {
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(MortalityClass::General),
            "safety" => Ok(MortalityClass::Safety),
            _ => Err(ModelError::UnknownCode { field: "mortality class", value: code.to_string() }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MortalityClass::General => "General",
            MortalityClass::Safety => "Safety",
        }
    }
}

/// Benefit tier of the plan the member belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tier(pub u8);

impl Default for Tier {
    fn default() -> Self {
        Tier(1)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Opaque member identifier, unique within a population
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draw a fresh 16 hex digit identifier. Uniqueness is checked by the population.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{:016x}", rng.random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Demographic attributes that drive decrement and salary lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub sex: Sex,
    pub mortality_class: MortalityClass,
    pub tier: Tier,
}

impl Default for MemberProfile {
    fn default() -> Self {
        Self {
            sex: Sex::Female,
            mortality_class: MortalityClass::General,
            tier: Tier::default(),
        }
    }
}

/// One member-year of the salary history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryHistoryRecord {
    pub year: i32,
    pub age: u32,
    /// Completed plus in-progress years of service
    pub service: u32,
    /// Zero once the member is no longer active
    pub salary: f64,
    pub status: Status,
    /// True for years taken from an observed record
    pub from_data: bool,
    pub premium: f64,
    /// Zero unless retired
    pub pension: f64,
}

impl SalaryHistoryRecord {
    pub fn new(year: i32, age: u32, service: u32, salary: f64, status: Status, from_data: bool) -> Self {
        Self {
            year,
            age,
            service,
            salary,
            status,
            from_data,
            premium: 0.0,
            pension: 0.0,
        }
    }

    /// Premium contributions minus pension payments
    pub fn net_flow(&self) -> f64 {
        self.premium - self.pension
    }
}

/// A plan member with a complete simulated lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub birth_year: i32,
    pub hire_year: i32,
    pub sep_year: Option<i32>,
    pub retire_year: Option<i32>,
    pub sex: Sex,
    pub mortality_class: MortalityClass,
    pub tier: Tier,
    /// Individually solved rate of return, present only for members who retire
    pub car: Option<f64>,
    pub note: String,
    /// Contiguous, strictly increasing years from hire through the final simulated year
    pub history: Vec<SalaryHistoryRecord>,
}

impl Member {
    pub fn profile(&self) -> MemberProfile {
        MemberProfile {
            sex: self.sex,
            mortality_class: self.mortality_class,
            tier: self.tier,
        }
    }

    pub fn first_year(&self) -> i32 {
        self.history.first().map(|r| r.year).unwrap_or(self.hire_year)
    }

    /// Last simulated year (the death year when the simulation ran to death)
    pub fn final_year(&self) -> i32 {
        self.history.last().map(|r| r.year).unwrap_or(self.hire_year)
    }

    pub fn death_year(&self) -> Option<i32> {
        self.history
            .last()
            .filter(|r| r.status == Status::Deceased)
            .map(|r| r.year)
    }

    pub fn ever_retired(&self) -> bool {
        self.retire_year.is_some()
    }

    pub fn record(&self, year: i32) -> Option<&SalaryHistoryRecord> {
        let offset = year.checked_sub(self.first_year())?;
        usize::try_from(offset).ok().and_then(|idx| self.history.get(idx))
    }

    pub fn status_in(&self, year: i32) -> Option<Status> {
        self.record(year).map(|r| r.status)
    }

    pub fn max_salary(&self) -> f64 {
        self.history.iter().map(|r| r.salary).fold(0.0, f64::max)
    }

    /// (year, premium - pension) for every simulated year
    pub fn net_flows(&self) -> Vec<(i32, f64)> {
        self.history.iter().map(|r| (r.year, r.net_flow())).collect()
    }

    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            id: self.id.clone(),
            hire_year: self.first_year(),
            death_year: self.final_year(),
            retire_year: self.retire_year,
            sep_year: self.sep_year,
            car: self.car,
        }
    }
}

/// Compact per-member view used by the cash-flow aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub id: MemberId,
    pub hire_year: i32,
    /// Final simulated year
    pub death_year: i32,
    pub retire_year: Option<i32>,
    pub sep_year: Option<i32>,
    pub car: Option<f64>,
}
