//! Member builder: observed data in, complete lifetime member out

use rand::Rng;

use super::data::{Member, MemberId, MemberProfile, SalaryHistoryRecord, Status};
use crate::assumptions::{Assumptions, BenefitTerms};
use crate::error::{ModelError, Result};
use crate::projection::{find_rate, CareerConfig, CareerSimulator, CareerState};

/// One observed year for an active member
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Generated when absent
    pub id: Option<MemberId>,
    pub year: i32,
    pub age: Option<u32>,
    pub birth_year: Option<i32>,
    pub service: Option<u32>,
    pub hire_year: Option<i32>,
    pub salary: f64,
    pub profile: MemberProfile,
    pub note: String,
}

impl Snapshot {
    pub fn new(year: i32, age: u32, service: u32, salary: f64) -> Self {
        Self {
            id: None,
            year,
            age: Some(age),
            birth_year: None,
            service: Some(service),
            hire_year: None,
            salary,
            profile: MemberProfile::default(),
            note: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<MemberId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_profile(mut self, profile: MemberProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// One row of an observed multi-year history
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedYear {
    pub year: i32,
    pub salary: f64,
    pub status: Status,
    /// Recorded contribution; computed from salary when absent
    pub premium: Option<f64>,
}

/// A contiguous run of observed years for one member
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRecord {
    pub id: Option<MemberId>,
    /// Age in the first observed year
    pub age: Option<u32>,
    pub birth_year: Option<i32>,
    /// Service in the first observed year
    pub service: Option<u32>,
    pub hire_year: Option<i32>,
    pub profile: MemberProfile,
    pub note: String,
    pub rows: Vec<ObservedYear>,
}

fn resolve_birth_year(year: i32, age: Option<u32>, birth_year: Option<i32>) -> Result<i32> {
    match (age, birth_year) {
        (Some(age), _) => Ok(year - age as i32),
        (None, Some(birth_year)) => Ok(birth_year),
        (None, None) => Err(ModelError::MissingAge),
    }
}

fn resolve_hire_year(year: i32, service: Option<u32>, hire_year: Option<i32>) -> Result<i32> {
    match (service, hire_year) {
        (Some(service), _) => Ok(year - service as i32),
        (None, Some(hire_year)) => Ok(hire_year),
        (None, None) => Err(ModelError::MissingService),
    }
}

fn years_between(from: i32, to: i32, what: &str) -> Result<u32> {
    u32::try_from(to - from)
        .map_err(|_| ModelError::InvalidSnapshot(format!("{} {} falls after {}", what, from, to)))
}

fn check_amount(what: &str, year: i32, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::InvalidSnapshot(format!("{} {} in {}", what, value, year)));
    }
    Ok(())
}

/// Builds members by simulating their careers and deriving contributions and benefits
pub struct MemberBuilder<'a> {
    assumptions: &'a Assumptions,
    simulator: CareerSimulator<'a>,
}

impl<'a> MemberBuilder<'a> {
    pub fn new(assumptions: &'a Assumptions, config: CareerConfig) -> Self {
        Self {
            assumptions,
            simulator: CareerSimulator::new(assumptions, config),
        }
    }

    /// Member from a single observed active year
    pub fn from_year<R: Rng + ?Sized>(&self, snapshot: &Snapshot, rng: &mut R) -> Result<Member> {
        let birth_year = resolve_birth_year(snapshot.year, snapshot.age, snapshot.birth_year)?;
        let hire_year = resolve_hire_year(snapshot.year, snapshot.service, snapshot.hire_year)?;
        let age = years_between(birth_year, snapshot.year, "birth year")?;
        let service = years_between(hire_year, snapshot.year, "hire year")?;
        if hire_year < birth_year {
            return Err(ModelError::InvalidSnapshot(format!(
                "hired in {} before birth in {}",
                hire_year, birth_year
            )));
        }
        check_amount("salary", snapshot.year, snapshot.salary)?;

        let seed = CareerState::active(snapshot.year, age, service, snapshot.salary);
        let mut history = self.simulator.from_year(&seed, &snapshot.profile, rng);
        apply_premiums(&mut history, &self.assumptions.benefits, true);

        let id = snapshot.id.clone().unwrap_or_else(|| MemberId::random(rng));
        Ok(assemble(
            id,
            snapshot.profile,
            birth_year,
            hire_year,
            snapshot.note.clone(),
            history,
            &self.assumptions.benefits,
        ))
    }

    /// Member from a partial observed history
    pub fn from_record<R: Rng + ?Sized>(&self, record: &ObservedRecord, rng: &mut R) -> Result<Member> {
        let first = record.rows.first().ok_or(ModelError::EmptyHistory)?;
        let birth_year = resolve_birth_year(first.year, record.age, record.birth_year)?;
        let hire_year = resolve_hire_year(first.year, record.service, record.hire_year)?;
        let mut age = years_between(birth_year, first.year, "birth year")?;
        let mut service = years_between(hire_year, first.year, "hire year")?;

        let mut observed = Vec::with_capacity(record.rows.len());
        for (i, row) in record.rows.iter().enumerate() {
            let expected = first.year + i as i32;
            if row.year != expected {
                return Err(ModelError::NonContiguousHistory { expected, found: row.year });
            }
            if i > 0 {
                age += 1;
                if row.status.is_active() {
                    service += 1;
                }
            }
            if row.status == Status::Deceased && i + 1 != record.rows.len() {
                return Err(ModelError::DeceasedNotLast { year: row.year });
            }
            check_amount("salary", row.year, row.salary)?;
            if let Some(premium) = row.premium {
                check_amount("premium", row.year, premium)?;
            }

            let mut r = SalaryHistoryRecord::new(row.year, age, service, row.salary, row.status, true);
            r.premium = row
                .premium
                .unwrap_or(row.salary * self.assumptions.benefits.premium_rate);
            observed.push(r);
        }

        let mut history = self.simulator.from_record(&observed, &record.profile, rng);
        apply_premiums(&mut history, &self.assumptions.benefits, false);

        let id = record.id.clone().unwrap_or_else(|| MemberId::random(rng));
        Ok(assemble(
            id,
            record.profile,
            birth_year,
            hire_year,
            record.note.clone(),
            history,
            &self.assumptions.benefits,
        ))
    }
}

/// Premium on every year, or only on simulated years when observed premiums are kept
fn apply_premiums(history: &mut [SalaryHistoryRecord], terms: &BenefitTerms, include_observed: bool) {
    for record in history.iter_mut().filter(|r| include_observed || !r.from_data) {
        record.premium = record.salary * terms.premium_rate;
    }
}

/// Pension on every retired year, compounding from the first one; returns that year
fn apply_pensions(history: &mut [SalaryHistoryRecord], terms: &BenefitTerms) -> Option<i32> {
    let first_retired = history.iter().find(|r| r.status == Status::Retired)?.year;
    let max_salary = history.iter().map(|r| r.salary).fold(0.0, f64::max);
    let starting_pension = terms.pension_multiplier * max_salary;

    for record in history.iter_mut() {
        record.pension = if record.status == Status::Retired {
            starting_pension * (1.0 + terms.cola).powi(record.year - first_retired)
        } else {
            0.0
        };
    }

    Some(first_retired)
}

fn assemble(
    id: MemberId,
    profile: MemberProfile,
    birth_year: i32,
    hire_year: i32,
    note: String,
    mut history: Vec<SalaryHistoryRecord>,
    terms: &BenefitTerms,
) -> Member {
    let retire_year = apply_pensions(&mut history, terms);
    let sep_year = history
        .iter()
        .find(|r| r.status == Status::Separated)
        .map(|r| r.year);

    let car = retire_year.map(|_| {
        let flows: Vec<(i32, f64)> = history.iter().map(|r| (r.year, r.net_flow())).collect();
        find_rate(&flows)
    });

    Member {
        id,
        birth_year,
        hire_year,
        sep_year,
        retire_year,
        sex: profile.sex,
        mortality_class: profile.mortality_class,
        tier: profile.tier,
        car,
        note,
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::{AgeBandTable, MortalitySource, RetirementTable, SeparationTable, ServiceTable};
    use crate::member::{MortalityClass, Sex, Tier};
    use crate::projection::is_no_solution;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Arc;

    #[derive(Debug)]
    struct DiesAt(u32);

    impl MortalitySource for DiesAt {
        fn probability(&self, age: u32, _sex: Sex, _class: MortalityClass) -> f64 {
            if age >= self.0 { 1.0 } else { 0.0 }
        }
    }

    /// Never separates; retires with certainty at `retire_age`; dies at `death_age`
    fn scripted(retire_age: u32, death_age: u32) -> Assumptions {
        let mut assumptions =
            Assumptions::default_valuation().with_mortality(Arc::new(DiesAt(death_age)));
        assumptions.separation = SeparationTable::new(ServiceTable::new(0, vec![0.0]).unwrap());
        assumptions.retirement = RetirementTable {
            by_age: AgeBandTable::new(vec![(retire_age, 1.0)]).unwrap(),
            min_completed_service_for_age: 0,
            by_service: ServiceTable::new(200, vec![0.0]).unwrap(),
        };
        assumptions
    }

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    #[test]
    fn test_birth_and_hire_years() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let member = builder
            .from_year(&Snapshot::new(2020, 40, 10, 60_000.0).with_id("m1"), &mut rng())
            .unwrap();

        assert_eq!(member.id, MemberId::new("m1"));
        assert_eq!(member.birth_year, 1980);
        assert_eq!(member.hire_year, 2010);
        assert_eq!(member.history.first().unwrap().year, 2010);
        assert_eq!(member.retire_year, Some(2045));
        assert_eq!(member.death_year(), Some(2065));
        assert_eq!(member.sep_year, None);
    }

    #[test]
    fn test_explicit_birth_and_hire_years() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let snapshot = Snapshot {
            age: None,
            birth_year: Some(1975),
            service: None,
            hire_year: Some(2005),
            ..Snapshot::new(2020, 0, 0, 60_000.0)
        };
        let member = builder.from_year(&snapshot, &mut rng()).unwrap();
        assert_eq!(member.birth_year, 1975);
        assert_eq!(member.hire_year, 2005);
        assert_eq!(member.record(2020).unwrap().age, 45);
        assert_eq!(member.record(2020).unwrap().service, 15);
    }

    #[test]
    fn test_missing_age_is_error() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let snapshot = Snapshot { age: None, ..Snapshot::new(2020, 40, 10, 60_000.0) };
        assert!(matches!(builder.from_year(&snapshot, &mut rng()), Err(ModelError::MissingAge)));
    }

    #[test]
    fn test_hire_before_birth_is_error() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let snapshot = Snapshot::new(2020, 20, 25, 60_000.0);
        assert!(matches!(builder.from_year(&snapshot, &mut rng()), Err(ModelError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_premium_is_quarter_of_salary() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let member = builder.from_year(&Snapshot::new(2020, 40, 10, 60_000.0), &mut rng()).unwrap();

        for record in &member.history {
            assert_relative_eq!(record.premium, 0.25 * record.salary, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_pension_compounds_from_first_retired_year() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let member = builder.from_year(&Snapshot::new(2020, 40, 10, 60_000.0), &mut rng()).unwrap();

        let starting = 0.55 * member.max_salary();
        let first = member.record(2045).unwrap();
        assert_eq!(first.status, Status::Retired);
        assert_relative_eq!(first.pension, starting, max_relative = 1e-12);
        assert_relative_eq!(member.record(2050).unwrap().pension, starting * 1.02f64.powi(5), max_relative = 1e-12);

        for record in member.history.iter().filter(|r| r.status != Status::Retired) {
            assert_eq!(record.pension, 0.0);
        }
        assert!(member.car.is_some());
        assert!(!is_no_solution(member.car.unwrap()));
    }

    #[test]
    fn test_never_retired_has_no_pension_or_car() {
        // Dies before the retirement age
        let assumptions = scripted(65, 50);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let member = builder.from_year(&Snapshot::new(2020, 40, 10, 60_000.0), &mut rng()).unwrap();

        assert_eq!(member.retire_year, None);
        assert_eq!(member.car, None);
        assert!(member.history.iter().all(|r| r.pension == 0.0));
    }

    #[test]
    fn test_generated_id_when_absent() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let member = builder.from_year(&Snapshot::new(2020, 40, 10, 60_000.0), &mut rng()).unwrap();
        assert_eq!(member.id.as_str().len(), 16);
    }

    fn observed(rows: &[(i32, f64, Status, Option<f64>)]) -> ObservedRecord {
        ObservedRecord {
            id: Some(MemberId::new("obs")),
            age: Some(50),
            birth_year: None,
            service: Some(20),
            hire_year: None,
            profile: MemberProfile { sex: Sex::Male, mortality_class: MortalityClass::Safety, tier: Tier(2) },
            note: "from payroll".into(),
            rows: rows
                .iter()
                .map(|&(year, salary, status, premium)| ObservedYear { year, salary, status, premium })
                .collect(),
        }
    }

    #[test]
    fn test_from_record_stitches_observed_rows() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let record = observed(&[
            (2018, 90_000.0, Status::Active, Some(20_000.0)),
            (2019, 92_000.0, Status::Active, None),
            (2020, 95_000.0, Status::Active, Some(21_000.0)),
        ]);
        let member = builder.from_record(&record, &mut rng()).unwrap();

        assert_eq!(member.birth_year, 1968);
        assert_eq!(member.hire_year, 1998);
        assert_eq!(member.history.first().unwrap().year, 1998);
        assert_eq!(member.note, "from payroll");
        assert_eq!(member.tier, Tier(2));

        let r2018 = member.record(2018).unwrap();
        assert!(r2018.from_data);
        assert_eq!(r2018.premium, 20_000.0);
        assert_eq!(member.record(2019).unwrap().premium, 92_000.0 * 0.25);
        assert_eq!(member.record(2020).unwrap().premium, 21_000.0);
        assert_eq!(member.record(2020).unwrap().service, 22);
        assert!(!member.record(2021).unwrap().from_data);
        assert_eq!(member.history.iter().filter(|r| r.from_data).count(), 3);
    }

    #[test]
    fn test_from_record_rejects_gaps() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let record = observed(&[
            (2018, 90_000.0, Status::Active, None),
            (2020, 95_000.0, Status::Active, None),
        ]);
        assert!(matches!(
            builder.from_record(&record, &mut rng()),
            Err(ModelError::NonContiguousHistory { expected: 2019, found: 2020 })
        ));
    }

    #[test]
    fn test_from_record_rejects_bad_amounts() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());

        let negative_salary = observed(&[(2020, -50_000.0, Status::Active, None)]);
        assert!(matches!(
            builder.from_record(&negative_salary, &mut rng()),
            Err(ModelError::InvalidSnapshot(_))
        ));

        let nan_salary = observed(&[
            (2019, 90_000.0, Status::Active, None),
            (2020, f64::NAN, Status::Active, None),
        ]);
        assert!(matches!(
            builder.from_record(&nan_salary, &mut rng()),
            Err(ModelError::InvalidSnapshot(_))
        ));

        let negative_premium = observed(&[(2020, 90_000.0, Status::Active, Some(-1.0))]);
        assert!(matches!(
            builder.from_record(&negative_premium, &mut rng()),
            Err(ModelError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_from_record_rejects_empty_and_early_death() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        assert!(matches!(builder.from_record(&observed(&[]), &mut rng()), Err(ModelError::EmptyHistory)));

        let record = observed(&[
            (2018, 0.0, Status::Deceased, None),
            (2019, 0.0, Status::Deceased, None),
        ]);
        assert!(matches!(
            builder.from_record(&record, &mut rng()),
            Err(ModelError::DeceasedNotLast { year: 2018 })
        ));
    }

    #[test]
    fn test_from_record_separated_history() {
        let assumptions = scripted(65, 85);
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let record = observed(&[
            (2018, 90_000.0, Status::Active, None),
            (2019, 0.0, Status::Separated, None),
        ]);
        let member = builder.from_record(&record, &mut rng()).unwrap();

        assert_eq!(member.sep_year, Some(2019));
        assert_eq!(member.record(2019).unwrap().service, 20);
        // A separated member still reaches the retirement age path
        assert_eq!(member.retire_year, Some(2033));
    }
}
