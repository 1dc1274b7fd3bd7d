//! Annual status transitions
//!
//! Each check draws one uniform sample from the caller's generator when the
//! member's status is eligible for it, and none otherwise. Checks run once per
//! member-year in the order death, separation, retirement.

use rand::Rng;

use crate::assumptions::Assumptions;
use crate::member::{MemberProfile, Status};

/// Stochastic decrement checks against the plan's tables
#[derive(Debug, Clone, Copy)]
pub struct Transitions<'a> {
    assumptions: &'a Assumptions,
}

impl<'a> Transitions<'a> {
    pub fn new(assumptions: &'a Assumptions) -> Self {
        Self { assumptions }
    }

    /// Every status except deceased is exposed to mortality
    pub fn death_check<R: Rng + ?Sized>(
        &self,
        age: u32,
        profile: &MemberProfile,
        status: Status,
        rng: &mut R,
    ) -> Status {
        if status == Status::Deceased {
            return status;
        }
        let q = self
            .assumptions
            .mortality
            .probability(age, profile.sex, profile.mortality_class);
        if rng.random::<f64>() < q {
            Status::Deceased
        } else {
            status
        }
    }

    /// Only active members separate
    pub fn separation_check<R: Rng + ?Sized>(&self, service: u32, status: Status, rng: &mut R) -> Status {
        if status != Status::Active {
            return status;
        }
        if rng.random::<f64>() < self.assumptions.separation.rate(service) {
            Status::Separated
        } else {
            status
        }
    }

    /// Separated members remain exposed, so a vested leaver can retire later
    pub fn retirement_check<R: Rng + ?Sized>(
        &self,
        age: u32,
        service: u32,
        status: Status,
        rng: &mut R,
    ) -> Status {
        if matches!(status, Status::Retired | Status::Deceased | Status::Disabled) {
            return status;
        }
        if rng.random::<f64>() < self.assumptions.retirement.probability(age, service) {
            Status::Retired
        } else {
            status
        }
    }

    /// Only active members become disabled
    pub fn disability_check<R: Rng + ?Sized>(&self, age: u32, status: Status, rng: &mut R) -> Status {
        if status != Status::Active {
            return status;
        }
        if rng.random::<f64>() < self.assumptions.disability.rate(age) {
            Status::Disabled
        } else {
            status
        }
    }

    /// Status at the end of one simulated year
    pub fn apply_year<R: Rng + ?Sized>(
        &self,
        age: u32,
        service: u32,
        profile: &MemberProfile,
        status: Status,
        include_disability: bool,
        rng: &mut R,
    ) -> Status {
        let status = self.death_check(age, profile, status, rng);
        let status = self.separation_check(service, status, rng);
        let status = self.retirement_check(age, service, status, rng);
        if include_disability {
            self.disability_check(age, status, rng)
        } else {
            status
        }
    }
}
