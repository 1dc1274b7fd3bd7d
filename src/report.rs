//! Human-readable summaries and CSV export

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::fund::FundYear;
use crate::member::{Member, Status};
use crate::population::MemberPopulation;
use crate::projection::{is_no_solution, MasterCashFlowMatrix};
use crate::scenario::{CohortSummary, ModelRunResult};

const STATUS_ORDER: [Status; 5] = [
    Status::Active,
    Status::Separated,
    Status::Retired,
    Status::Disabled,
    Status::Deceased,
];

fn format_year(year: Option<i32>) -> String {
    year.map_or_else(|| "-".to_string(), |y| y.to_string())
}

fn format_rate(rate: Option<f64>) -> String {
    match rate {
        None => "-".to_string(),
        Some(r) if is_no_solution(r) => "unresolved".to_string(),
        Some(r) => format!("{:.2}%", r * 100.0),
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Member {} ({}, {}, {})",
            self.id,
            self.sex.as_str(),
            self.mortality_class.as_str(),
            self.tier
        )?;
        writeln!(
            f,
            "  Born {}, hired {}, separated {}, retired {}, final year {}",
            self.birth_year,
            self.hire_year,
            format_year(self.sep_year),
            format_year(self.retire_year),
            self.final_year()
        )?;
        writeln!(f, "  CAR: {}", format_rate(self.car))?;
        if !self.note.is_empty() {
            writeln!(f, "  Note: {}", self.note)?;
        }

        writeln!(
            f,
            "  {:>4} {:>3} {:>3} {:<9} {:>12} {:>10} {:>10}",
            "Year", "Age", "Svc", "Status", "Salary", "Premium", "Pension"
        )?;
        for r in &self.history {
            writeln!(
                f,
                "  {:>4} {:>3} {:>3} {:<9} {:>12.2} {:>10.2} {:>10.2}{}",
                r.year,
                r.age,
                r.service,
                r.status.as_str(),
                r.salary,
                r.premium,
                r.pension,
                if r.from_data { " *" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Population statistics at a valuation year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationReport {
    pub valuation_year: i32,
    pub members: usize,
    /// Members by status in the valuation year; members not yet hired are left out
    pub by_status: Vec<(Status, usize)>,
    /// Mean salary of members active in the valuation year
    pub mean_salary: f64,
    /// Mean service of members active in the valuation year
    pub mean_service: f64,
    /// Members who retire at some point
    pub retirees: usize,
    /// Mean individual CAR over members whose rate resolved
    pub mean_car: Option<f64>,
}

impl PopulationReport {
    pub fn new(population: &MemberPopulation, valuation_year: i32) -> Self {
        let mut counts = [0usize; STATUS_ORDER.len()];
        let mut salary_total = 0.0;
        let mut service_total = 0.0;
        let mut active = 0usize;
        let mut cars = Vec::new();

        for member in population {
            if let Some(record) = member.record(valuation_year) {
                if let Some(idx) = STATUS_ORDER.iter().position(|&s| s == record.status) {
                    counts[idx] += 1;
                }
                if record.status.is_active() {
                    active += 1;
                    salary_total += record.salary;
                    service_total += record.service as f64;
                }
            }
            if let Some(car) = member.car.filter(|&c| !is_no_solution(c)) {
                cars.push(car);
            }
        }

        let mean = |total: f64, n: usize| if n == 0 { 0.0 } else { total / n as f64 };

        Self {
            valuation_year,
            members: population.len(),
            by_status: STATUS_ORDER.iter().copied().zip(counts).collect(),
            mean_salary: mean(salary_total, active),
            mean_service: mean(service_total, active),
            retirees: population.retiree_count(),
            mean_car: (!cars.is_empty()).then(|| cars.iter().sum::<f64>() / cars.len() as f64),
        }
    }

    pub fn count(&self, status: Status) -> usize {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |&(_, n)| n)
    }
}

impl fmt::Display for PopulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Population at {}: {} members", self.valuation_year, self.members)?;
        for (status, count) in &self.by_status {
            writeln!(f, "  {:<10} {}", status.as_str(), count)?;
        }
        writeln!(f, "  Mean salary (active):  ${:.2}", self.mean_salary)?;
        writeln!(f, "  Mean service (active): {:.1} years", self.mean_service)?;
        writeln!(f, "  Ever retire:           {}", self.retirees)?;
        write!(f, "  Mean individual CAR:   {}", format_rate(self.mean_car))
    }
}

/// Fixed-width table of per-cohort rate statistics
pub fn format_summary(summaries: &[CohortSummary]) -> String {
    let mut out = format!(
        "{:<10} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "Cohort", "Count", "Mean", "Median", "StdDev", "Min", "Max"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:<10} {:>6} {:>7.2}% {:>7.2}% {:>7.2}% {:>7.2}% {:>7.2}%\n",
            s.cohort.to_string(),
            s.count,
            s.mean * 100.0,
            s.median * 100.0,
            s.std_dev * 100.0,
            s.min * 100.0,
            s.max * 100.0
        ));
    }
    out
}

/// Write `trial,cohort,car` rows
pub fn write_results_csv<W: Write>(result: &ModelRunResult, mut out: W) -> Result<()> {
    writeln!(out, "trial,cohort,car")?;
    for row in &result.rows {
        writeln!(out, "{},{},{:.8}", row.trial, row.cohort, row.car)?;
    }
    out.flush()?;
    Ok(())
}

/// Write the matrix as `year`, one column per cohort, then `total`
pub fn write_matrix_csv<W: Write>(matrix: &MasterCashFlowMatrix, mut out: W) -> Result<()> {
    write!(out, "year")?;
    for cohort in &matrix.cohorts {
        write!(out, ",{}", cohort)?;
    }
    writeln!(out, ",total")?;

    for idx in 0..matrix.row_count() {
        let Some((year, cells, total)) = matrix.row(idx) else {
            break;
        };
        write!(out, "{}", year)?;
        for cell in cells {
            write!(out, ",{:.2}", cell)?;
        }
        writeln!(out, ",{:.2}", total)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a fund projection as one row per year
pub fn write_fund_csv<W: Write>(rows: &[FundYear], mut out: W) -> Result<()> {
    writeln!(out, "year,net_flow,shortfall,return,equity,bonds,other,total")?;
    for r in rows {
        writeln!(
            out,
            "{},{:.2},{:.2},{:.6},{:.2},{:.2},{:.2},{:.2}",
            r.year,
            r.net_flow,
            r.shortfall,
            r.return_rate,
            r.assets.equity,
            r.assets.bonds,
            r.assets.other,
            r.assets.total()
        )?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberId, MortalityClass, SalaryHistoryRecord, Sex, Tier};
    use crate::population::MemberPopulation;
    use crate::projection::aggregate;
    use crate::scenario::{Cohort, ModelRunRow};

    fn retiree(id: &str, car: Option<f64>) -> Member {
        let mut history = vec![
            SalaryHistoryRecord::new(2020, 60, 30, 80_000.0, Status::Active, true),
            SalaryHistoryRecord::new(2021, 61, 30, 0.0, Status::Retired, false),
            SalaryHistoryRecord::new(2022, 62, 30, 0.0, Status::Deceased, false),
        ];
        history[0].premium = 20_000.0;
        history[1].pension = 44_000.0;
        Member {
            id: MemberId::new(id),
            birth_year: 1960,
            hire_year: 1990,
            sep_year: None,
            retire_year: Some(2021),
            sex: Sex::Male,
            mortality_class: MortalityClass::Safety,
            tier: Tier(2),
            car,
            note: "sample".into(),
            history,
        }
    }

    #[test]
    fn test_member_display() {
        let text = retiree("r1", Some(0.045)).to_string();
        assert!(text.starts_with("Member r1 (M, Safety, tier 2)"));
        assert!(text.contains("retired 2021"));
        assert!(text.contains("CAR: 4.50%"));
        assert!(text.contains("Note: sample"));
        assert!(text.contains("deceased"));
        assert_eq!(text.lines().count(), 4 + 1 + 3);
    }

    #[test]
    fn test_unresolved_car_display() {
        let text = retiree("r1", Some(1.0)).to_string();
        assert!(text.contains("CAR: unresolved"));
    }

    #[test]
    fn test_population_report() {
        let mut population = MemberPopulation::new();
        population.insert(retiree("a", Some(0.04))).unwrap();
        population.insert(retiree("b", Some(0.06))).unwrap();
        population.insert(retiree("c", Some(1.0))).unwrap();

        let report = PopulationReport::new(&population, 2020);
        assert_eq!(report.members, 3);
        assert_eq!(report.count(Status::Active), 3);
        assert_eq!(report.count(Status::Retired), 0);
        assert_eq!(report.mean_salary, 80_000.0);
        assert_eq!(report.mean_service, 30.0);
        assert_eq!(report.retirees, 3);
        assert!((report.mean_car.unwrap() - 0.05).abs() < 1e-12);

        let later = PopulationReport::new(&population, 2021);
        assert_eq!(later.count(Status::Retired), 3);
        assert_eq!(later.mean_salary, 0.0);
        assert!(report.to_string().contains("3 members"));
    }

    #[test]
    fn test_empty_population_report() {
        let report = PopulationReport::new(&MemberPopulation::new(), 2024);
        assert_eq!(report.members, 0);
        assert_eq!(report.mean_car, None);
        assert_eq!(report.mean_salary, 0.0);
    }

    #[test]
    fn test_results_csv() {
        let result = ModelRunResult {
            trials: 1,
            rows: vec![
                ModelRunRow { trial: 0, cohort: Cohort::Aggregate, car: 0.05 },
                ModelRunRow { trial: 0, cohort: Cohort::Year(2040), car: 0.0425 },
            ],
        };
        let mut buf = Vec::new();
        write_results_csv(&result, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "trial,cohort,car\n0,aggregate,0.05000000\n0,2040,0.04250000\n"
        );
    }

    #[test]
    fn test_matrix_csv() {
        let mut population = MemberPopulation::new();
        population.insert(retiree("a", None)).unwrap();
        let matrix = aggregate(&population, &population.summaries());

        let mut buf = Vec::new();
        write_matrix_csv(&matrix, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "year,2021,total\n2020,20000.00,20000.00\n2021,-44000.00,-44000.00\n2022,0.00,0.00\n"
        );
    }

    #[test]
    fn test_fund_csv() {
        use crate::fund::Holdings;
        let rows = [
            FundYear {
                year: 2025,
                net_flow: 1_000.0,
                shortfall: 0.0,
                return_rate: 0.05,
                assets: Holdings { equity: 630.0, bonds: 315.0, other: 105.0 },
            },
            FundYear {
                year: 2026,
                net_flow: -2_000.0,
                shortfall: 950.0,
                return_rate: 0.0,
                assets: Holdings::default(),
            },
        ];

        let mut buf = Vec::new();
        write_fund_csv(&rows, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "year,net_flow,shortfall,return,equity,bonds,other,total\n\
             2025,1000.00,0.00,0.050000,630.00,315.00,105.00,1050.00\n\
             2026,-2000.00,950.00,0.000000,0.00,0.00,0.00,0.00\n"
        );
    }

    #[test]
    fn test_summary_table() {
        let table = format_summary(&[]);
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("Cohort"));
    }
}
