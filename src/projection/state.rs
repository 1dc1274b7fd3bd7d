//! Career state tracking for a single member

use crate::member::{SalaryHistoryRecord, Status};

/// State of a member at one point of the career walk
#[derive(Debug, Clone, PartialEq)]
pub struct CareerState {
    pub year: i32,
    pub age: u32,
    /// Completed plus in-progress years of service
    pub service: u32,
    pub salary: f64,
    pub status: Status,
}

impl CareerState {
    /// Active member observed in `year`
    pub fn active(year: i32, age: u32, service: u32, salary: f64) -> Self {
        Self {
            year,
            age,
            service,
            salary,
            status: Status::Active,
        }
    }

    pub fn from_record(record: &SalaryHistoryRecord) -> Self {
        Self {
            year: record.year,
            age: record.age,
            service: record.service,
            salary: record.salary,
            status: record.status,
        }
    }

    pub fn to_record(&self, from_data: bool) -> SalaryHistoryRecord {
        SalaryHistoryRecord::new(self.year, self.age, self.service, self.salary, self.status, from_data)
    }

    /// Move one calendar year forward; status and salary are set by the caller
    pub fn advance_year(&mut self) {
        self.year += 1;
        self.age += 1;
    }

    /// Move one calendar year back, giving up one year of service
    pub fn retreat_year(&mut self) {
        self.year -= 1;
        self.age = self.age.saturating_sub(1);
        self.service = self.service.saturating_sub(1);
    }
}
