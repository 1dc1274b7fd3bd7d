//! Career simulator
//!
//! Reconstructs the years between hire and an observation (backward) and
//! projects the years from an observation until death (forward).

use rand::Rng;

use super::state::CareerState;
use super::transitions::Transitions;
use crate::assumptions::Assumptions;
use crate::member::{MemberProfile, SalaryHistoryRecord, Status};

/// Configuration for the career walk
#[derive(Debug, Clone)]
pub struct CareerConfig {
    /// The forward walk stops once the next year would pass this age
    pub max_age: u32,

    /// Apply the disability check after retirement each year
    pub include_disability: bool,
}

impl Default for CareerConfig {
    fn default() -> Self {
        Self {
            max_age: 110,
            include_disability: false,
        }
    }
}

/// Year-by-year career simulator
pub struct CareerSimulator<'a> {
    assumptions: &'a Assumptions,
    transitions: Transitions<'a>,
    config: CareerConfig,
}

impl<'a> CareerSimulator<'a> {
    pub fn new(assumptions: &'a Assumptions, config: CareerConfig) -> Self {
        Self {
            assumptions,
            transitions: Transitions::new(assumptions),
            config,
        }
    }

    /// Reconstruct the active years from hire up to, but excluding, the seed year
    ///
    /// Each step undoes one year of merit growth. The hire year's salary is then
    /// scaled by a uniform draw to reflect a partial first year.
    pub fn backward<R: Rng + ?Sized>(
        &self,
        seed: &CareerState,
        profile: &MemberProfile,
        rng: &mut R,
    ) -> Vec<SalaryHistoryRecord> {
        let mut records = Vec::with_capacity(seed.service as usize);
        let mut state = seed.clone();
        state.status = Status::Active;

        for _ in 0..seed.service {
            let factor = self
                .assumptions
                .salary
                .growth_factor(state.year, state.age, profile.tier);
            state.retreat_year();
            state.salary /= factor;
            records.push(state.to_record(false));
        }

        if let Some(hire_year) = records.last_mut() {
            hire_year.salary *= rng.random::<f64>();
        }

        records.reverse();
        records
    }

    /// Project from the seed year until death or the age limit
    ///
    /// The seed year is the first record and is marked as observed.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        seed: &CareerState,
        profile: &MemberProfile,
        rng: &mut R,
    ) -> Vec<SalaryHistoryRecord> {
        let mut records = vec![seed.to_record(true)];
        let mut state = seed.clone();

        while state.status != Status::Deceased && state.age < self.config.max_age {
            state.advance_year();
            state.status = self.transitions.apply_year(
                state.age,
                state.service,
                profile,
                state.status,
                self.config.include_disability,
                rng,
            );

            if state.status.is_active() {
                state.service += 1;
                state.salary *= self
                    .assumptions
                    .salary
                    .growth_factor(state.year, state.age, profile.tier);
            } else {
                state.salary = 0.0;
            }

            records.push(state.to_record(false));
        }

        records
    }

    /// Full lifetime from a single observed year
    pub fn from_year<R: Rng + ?Sized>(
        &self,
        seed: &CareerState,
        profile: &MemberProfile,
        rng: &mut R,
    ) -> Vec<SalaryHistoryRecord> {
        let mut history = self.backward(seed, profile, rng);
        history.extend(self.forward(seed, profile, rng));
        history
    }

    /// Full lifetime around a contiguous run of observed years
    ///
    /// Observed rows are kept as given; simulated years are added before the
    /// first row and after the last.
    pub fn from_record<R: Rng + ?Sized>(
        &self,
        observed: &[SalaryHistoryRecord],
        profile: &MemberProfile,
        rng: &mut R,
    ) -> Vec<SalaryHistoryRecord> {
        let (Some(first), Some(last)) = (observed.first(), observed.last()) else {
            return Vec::new();
        };

        let mut history = self.backward(&CareerState::from_record(first), profile, rng);
        history.extend(observed.iter().cloned());
        history.extend(
            self.forward(&CareerState::from_record(last), profile, rng)
                .into_iter()
                .skip(1),
        );
        history
    }
}
