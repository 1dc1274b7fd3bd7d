//! Pension CAR - Monte Carlo estimation of the rate of return a defined-benefit plan pays its members
//!
//! This library provides:
//! - Member career simulation (mortality, separation, retirement, disability)
//! - Salary reconstruction and projection with age-banded merit scales
//! - Premium and pension derivation for each simulated year
//! - Cohort cash-flow aggregation and compound annual rate (CAR) solving
//! - A parallel Monte Carlo driver and an invested-fund ledger

pub mod assumptions;
pub mod error;
pub mod fund;
pub mod member;
pub mod population;
pub mod projection;
pub mod report;
pub mod scenario;

// Re-export commonly used types
pub use assumptions::{Assumptions, BenefitTerms, MortalitySource, MortalityTable};
pub use error::{ModelError, Result};
pub use member::{Member, MemberBuilder, MemberId, Snapshot, Status};
pub use population::{MemberPopulation, PopulationConfig};
pub use projection::{aggregate, find_rate, CareerConfig, MasterCashFlowMatrix, NO_SOLUTION};
pub use scenario::{Cohort, ModelRunResult, ModelRunner};
