//! Cohort cash-flow aggregation
//!
//! Groups members by retirement year and sums their net flows (premium minus
//! pension) into a year-by-cohort matrix with a total column.

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::member::MemberSummary;
use crate::population::MemberPopulation;

/// Net cash flow by calendar year (rows) and retirement cohort (columns)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterCashFlowMatrix {
    /// Contiguous calendar years from the earliest hire to the latest final year
    pub years: Vec<i32>,
    /// Every retirement year from the earliest to the latest, populated or not
    pub cohorts: Vec<i32>,
    /// One column per cohort, each with one cell per row
    columns: Vec<Vec<f64>>,
    /// Row-wise sum of the cohort columns
    total: Vec<f64>,
}

impl MasterCashFlowMatrix {
    /// Matrix over `years` with every cohort column zeroed
    fn zeroed(years: Vec<i32>, cohorts: Vec<i32>) -> Self {
        let rows = years.len();
        Self {
            columns: vec![vec![0.0; rows]; cohorts.len()],
            total: vec![0.0; rows],
            years,
            cohorts,
        }
    }

    pub fn start_year(&self) -> Option<i32> {
        self.years.first().copied()
    }

    pub fn end_year(&self) -> Option<i32> {
        self.years.last().copied()
    }

    pub fn row_count(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn cohort_index(&self, cohort: i32) -> Option<usize> {
        let first = *self.cohorts.first()?;
        let idx = usize::try_from(cohort.checked_sub(first)?).ok()?;
        (idx < self.cohorts.len()).then_some(idx)
    }

    /// Column for one retirement year
    pub fn cohort_column(&self, cohort: i32) -> Option<&[f64]> {
        self.cohort_index(cohort).map(|idx| self.columns[idx].as_slice())
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }

    /// (year, flow) pairs of one cohort, ready for the rate solver
    pub fn cohort_flows(&self, cohort: i32) -> Option<Vec<(i32, f64)>> {
        self.cohort_column(cohort).map(|column| self.with_years(column))
    }

    /// (year, flow) pairs of the whole plan
    pub fn total_flows(&self) -> Vec<(i32, f64)> {
        self.with_years(&self.total)
    }

    fn with_years(&self, column: &[f64]) -> Vec<(i32, f64)> {
        self.years.iter().copied().zip(column.iter().copied()).collect()
    }

    /// Cells of one row in cohort order, followed by the total
    pub fn row(&self, idx: usize) -> Option<(i32, Vec<f64>, f64)> {
        let year = *self.years.get(idx)?;
        let cells = self.columns.iter().map(|column| column[idx]).collect();
        Some((year, cells, self.total[idx]))
    }

    fn sum_rows(&mut self) {
        for (row, total) in self.total.iter_mut().enumerate() {
            *total = self.columns.iter().map(|column| column[row]).sum();
        }
    }
}

/// Build the cohort matrix for a population
///
/// The row range comes from the summaries' hire and final years; members who
/// never retire widen the range but contribute to no column.
pub fn aggregate(population: &MemberPopulation, summaries: &[MemberSummary]) -> MasterCashFlowMatrix {
    let (Some(start_year), Some(end_year)) = (
        summaries.iter().map(|s| s.hire_year).min(),
        summaries.iter().map(|s| s.death_year).max(),
    ) else {
        return MasterCashFlowMatrix::default();
    };

    let cohorts = match (
        summaries.iter().filter_map(|s| s.retire_year).min(),
        summaries.iter().filter_map(|s| s.retire_year).max(),
    ) {
        (Some(first), Some(last)) => (first..=last).collect(),
        _ => Vec::new(),
    };

    let mut matrix = MasterCashFlowMatrix::zeroed((start_year..=end_year).collect(), cohorts);
    let mut seen = HashSet::new();

    for summary in summaries {
        let Some(cohort) = summary.retire_year else {
            continue;
        };
        if !seen.insert(&summary.id) {
            warn!("Member {} summarized more than once; later copies ignored", summary.id);
            continue;
        }
        let Some(member) = population.get(&summary.id) else {
            warn!("Summary for member {} has no member in the population", summary.id);
            continue;
        };
        let Some(col) = matrix.cohort_index(cohort) else {
            continue;
        };

        for record in &member.history {
            let row = usize::try_from(record.year - start_year).ok();
            match row.and_then(|row| matrix.columns[col].get_mut(row)) {
                Some(cell) => *cell += record.net_flow(),
                None => warn!(
                    "Member {} has a record in {} outside {}..={}",
                    member.id, record.year, start_year, end_year
                ),
            }
        }
    }

    matrix.sum_rows();
    matrix
}
