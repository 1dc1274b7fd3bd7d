//! Member populations: id-unique storage, synthetic generation and CSV snapshot loading

use std::collections::hash_map::{Entry, Values};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::{Reader, ReaderBuilder};
use log::{debug, info};
use rand::Rng;

use crate::error::{ModelError, Result};
use crate::member::{
    Member, MemberBuilder, MemberId, MemberProfile, MemberSummary, MortalityClass, Sex, Snapshot,
    Tier,
};

/// Fresh ids drawn before giving up on a collision
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Members keyed by id; ids are unique
#[derive(Debug, Clone, Default)]
pub struct MemberPopulation {
    members: HashMap<MemberId, Member>,
}

impl MemberPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, rejecting an id already present
    pub fn insert(&mut self, member: Member) -> Result<()> {
        match self.members.entry(member.id.clone()) {
            Entry::Occupied(_) => Err(ModelError::DuplicateId(member.id)),
            Entry::Vacant(slot) => {
                slot.insert(member);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> Values<'_, MemberId, Member> {
        self.members.values()
    }

    /// Summaries ordered by id
    pub fn summaries(&self) -> Vec<MemberSummary> {
        let mut summaries: Vec<_> = self.members.values().map(Member::summary).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn retiree_count(&self) -> usize {
        self.members.values().filter(|m| m.ever_retired()).count()
    }

    /// Draw an id not yet in the population
    pub fn fresh_id<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<MemberId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = MemberId::random(rng);
            if !self.contains(&id) {
                return Ok(id);
            }
            debug!("Generated id {} already in use, redrawing", id);
        }
        Err(ModelError::IdCollision { attempts: MAX_ID_ATTEMPTS })
    }

    /// Build one member per snapshot
    ///
    /// Snapshots without an id get a fresh one; supplied ids must be unique.
    pub fn from_snapshots<R: Rng + ?Sized>(
        snapshots: &[Snapshot],
        builder: &MemberBuilder<'_>,
        rng: &mut R,
    ) -> Result<Self> {
        let mut population = Self::new();
        for snapshot in snapshots {
            let member = match snapshot.id {
                Some(_) => builder.from_year(snapshot, rng)?,
                None => {
                    let id = population.fresh_id(rng)?;
                    builder.from_year(&Snapshot { id: Some(id), ..snapshot.clone() }, rng)?
                }
            };
            population.insert(member)?;
        }
        Ok(population)
    }
}

impl<'a> IntoIterator for &'a MemberPopulation {
    type Item = &'a Member;
    type IntoIter = Values<'a, MemberId, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Shape of a synthetic population of active employees at valuation
#[derive(Debug, Clone)]
pub struct PopulationConfig {
    pub size: usize,
    pub valuation_year: i32,
    /// Inclusive range of current ages
    pub age_range: (u32, u32),
    /// Inclusive range of ages at hire; capped by the current age
    pub entry_age_range: (u32, u32),
    /// Uniform salary range at valuation
    pub salary_range: (f64, f64),
    pub female_share: f64,
    pub safety_share: f64,
    pub tier: Tier,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 100,
            valuation_year: 2024,
            age_range: (25, 64),
            entry_age_range: (20, 45),
            salary_range: (40_000.0, 120_000.0),
            female_share: 0.5,
            safety_share: 0.2,
            tier: Tier(1),
        }
    }
}

impl PopulationConfig {
    pub fn with_size(size: usize, valuation_year: i32) -> Self {
        Self {
            size,
            valuation_year,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        let (min_age, max_age) = self.age_range;
        let (min_entry, max_entry) = self.entry_age_range;
        let (min_salary, max_salary) = self.salary_range;
        if min_age > max_age || min_entry > max_entry || min_entry > min_age {
            return Err(ModelError::InvalidDistribution(format!(
                "ages {:?} with entry ages {:?}",
                self.age_range, self.entry_age_range
            )));
        }
        if !(min_salary >= 0.0 && min_salary <= max_salary && max_salary.is_finite()) {
            return Err(ModelError::InvalidDistribution(format!(
                "salary range {:?}",
                self.salary_range
            )));
        }
        for share in [self.female_share, self.safety_share] {
            if !(0.0..=1.0).contains(&share) {
                return Err(ModelError::InvalidDistribution(format!("share {}", share)));
            }
        }
        Ok(())
    }

    /// Draw one active-employee snapshot
    pub fn sample_snapshot<R: Rng + ?Sized>(&self, rng: &mut R) -> Snapshot {
        let (min_age, max_age) = self.age_range;
        let (min_entry, max_entry) = self.entry_age_range;
        let (min_salary, max_salary) = self.salary_range;

        let age = rng.random_range(min_age..=max_age);
        let entry_age = rng.random_range(min_entry..=max_entry.min(age));
        let salary = if max_salary > min_salary {
            rng.random_range(min_salary..max_salary)
        } else {
            min_salary
        };
        let sex = if rng.random::<f64>() < self.female_share { Sex::Female } else { Sex::Male };
        let mortality_class = if rng.random::<f64>() < self.safety_share {
            MortalityClass::Safety
        } else {
            MortalityClass::General
        };

        Snapshot {
            profile: MemberProfile { sex, mortality_class, tier: self.tier },
            ..Snapshot::new(self.valuation_year, age, age - entry_age, salary)
        }
    }

    /// Generate and build a full synthetic population
    pub fn generate<R: Rng + ?Sized>(&self, builder: &MemberBuilder<'_>, rng: &mut R) -> Result<MemberPopulation> {
        self.validate()?;

        let mut population = MemberPopulation::new();
        for _ in 0..self.size {
            let id = population.fresh_id(rng)?;
            let snapshot = Snapshot { id: Some(id), ..self.sample_snapshot(rng) };
            population.insert(builder.from_year(&snapshot, rng)?)?;
        }

        debug!(
            "Generated {} members ({} retire) for {}",
            population.len(),
            population.retiree_count(),
            self.valuation_year
        );
        Ok(population)
    }
}

/// Raw CSV row of a member snapshot file
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<String>,
    year: i32,
    age: Option<u32>,
    service: Option<u32>,
    salary: f64,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    mortality_class: Option<String>,
    #[serde(default)]
    tier: Option<u8>,
    #[serde(default)]
    note: Option<String>,
}

impl CsvRow {
    fn into_snapshot(self) -> Result<Snapshot> {
        let defaults = MemberProfile::default();
        let sex = match self.sex.as_deref().map(str::trim) {
            None | Some("") => defaults.sex,
            Some(code) => Sex::from_code(code)?,
        };
        let mortality_class = match self.mortality_class.as_deref().map(str::trim) {
            None | Some("") => defaults.mortality_class,
            Some(code) => MortalityClass::from_code(code)?,
        };

        Ok(Snapshot {
            id: self.id.filter(|id| !id.trim().is_empty()).map(MemberId::from),
            year: self.year,
            age: self.age,
            birth_year: None,
            service: self.service,
            hire_year: None,
            salary: self.salary,
            profile: MemberProfile {
                sex,
                mortality_class,
                tier: self.tier.map(Tier).unwrap_or(defaults.tier),
            },
            note: self.note.unwrap_or_default(),
        })
    }
}

fn read_snapshots<R: Read>(mut reader: Reader<R>) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        snapshots.push(row.into_snapshot()?);
    }
    Ok(snapshots)
}

/// Load member snapshots from a CSV file
pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>> {
    let path = path.as_ref();
    let snapshots = read_snapshots(ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?)?;
    info!("Loaded {} member snapshots from {}", snapshots.len(), path.display());
    Ok(snapshots)
}

/// Load member snapshots from any CSV source
pub fn load_snapshots_from_reader<R: Read>(source: R) -> Result<Vec<Snapshot>> {
    read_snapshots(ReaderBuilder::new().trim(csv::Trim::All).from_reader(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::Assumptions;
    use crate::projection::CareerConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn member(id: &str) -> Member {
        let assumptions = Assumptions::default_valuation();
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        builder
            .from_year(&Snapshot::new(2024, 40, 10, 60_000.0).with_id(id), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut population = MemberPopulation::new();
        population.insert(member("a")).unwrap();
        population.insert(member("b")).unwrap();

        match population.insert(member("a")) {
            Err(ModelError::DuplicateId(id)) => assert_eq!(id, MemberId::new("a")),
            other => panic!("expected duplicate id error, got {:?}", other),
        }
        assert_eq!(population.len(), 2);
        assert_eq!(population.summaries().len(), 2);
    }

    #[test]
    fn test_generate_population() {
        let assumptions = Assumptions::default_valuation();
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let config = PopulationConfig::with_size(40, 2024);
        let mut rng = ChaCha20Rng::seed_from_u64(11);

        let population = config.generate(&builder, &mut rng).unwrap();
        assert_eq!(population.len(), 40);

        for member in &population {
            let seed = member.record(2024).unwrap();
            assert!(seed.from_data);
            assert!((25..=64).contains(&seed.age));
            assert!(seed.salary >= 40_000.0 && seed.salary < 120_000.0);
            assert_eq!(member.hire_year, 2024 - seed.service as i32);
            assert!(seed.age - seed.service >= 20);
        }
    }

    #[test]
    fn test_generate_is_reproducible_with_seed() {
        let assumptions = Assumptions::default_valuation();
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let config = PopulationConfig::with_size(10, 2024);

        let ids = |seed| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut ids: Vec<_> = config
                .generate(&builder, &mut rng)
                .unwrap()
                .iter()
                .map(|m| (m.id.clone(), m.final_year()))
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(5), ids(5));
    }

    #[test]
    fn test_invalid_config() {
        let assumptions = Assumptions::default_valuation();
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let config = PopulationConfig { entry_age_range: (30, 45), age_range: (25, 64), ..Default::default() };
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(matches!(
            config.generate(&builder, &mut rng),
            Err(ModelError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn test_empty_population() {
        let population = MemberPopulation::new();
        assert!(population.is_empty());
        assert!(population.summaries().is_empty());
        assert_eq!(population.retiree_count(), 0);
    }

    #[test]
    fn test_load_snapshots_from_reader() {
        let data = "\
id,year,age,service,salary,sex,mortality_class,tier,note
a1,2024,45,12,72000,M,safety,2,police
,2024,30,0,50000,F,,,
";
        let snapshots = load_snapshots_from_reader(data.as_bytes()).unwrap();
        assert_eq!(snapshots.len(), 2);

        let first = &snapshots[0];
        assert_eq!(first.id, Some(MemberId::new("a1")));
        assert_eq!(first.age, Some(45));
        assert_eq!(first.service, Some(12));
        assert_eq!(first.profile.sex, Sex::Male);
        assert_eq!(first.profile.mortality_class, MortalityClass::Safety);
        assert_eq!(first.profile.tier, Tier(2));
        assert_eq!(first.note, "police");

        let second = &snapshots[1];
        assert_eq!(second.id, None);
        assert_eq!(second.profile, MemberProfile::default());
        assert_eq!(second.note, "");
    }

    #[test]
    fn test_unknown_sex_code() {
        let data = "id,year,age,service,salary,sex,mortality_class,tier,note\nx,2024,45,12,72000,Q,general,1,\n";
        assert!(matches!(
            load_snapshots_from_reader(data.as_bytes()),
            Err(ModelError::UnknownCode { field: "sex", .. })
        ));
    }

    #[test]
    fn test_from_snapshots_assigns_ids() {
        let assumptions = Assumptions::default_valuation();
        let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
        let snapshots = vec![
            Snapshot::new(2024, 40, 10, 60_000.0).with_id("known"),
            Snapshot::new(2024, 35, 5, 55_000.0),
            Snapshot::new(2024, 50, 25, 90_000.0),
        ];
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let population = MemberPopulation::from_snapshots(&snapshots, &builder, &mut rng).unwrap();
        assert_eq!(population.len(), 3);
        assert!(population.contains(&MemberId::new("known")));
    }
}
