//! Error types for member construction, table loading and population building

use thiserror::Error;

use crate::member::MemberId;

/// Errors raised while building members, populations or assumption tables
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("member has neither an age nor a birth year")]
    MissingAge,

    #[error("member has neither a service count nor a hire year")]
    MissingService,

    #[error("invalid member snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("observed history has no rows")]
    EmptyHistory,

    #[error("observed history is not contiguous: expected year {expected}, found {found}")]
    NonContiguousHistory { expected: i32, found: i32 },

    #[error("observed history records a death in {year} before its final row")]
    DeceasedNotLast { year: i32 },

    #[error("member id {0} already exists in the population")]
    DuplicateId(MemberId),

    #[error("could not generate a unique member id after {attempts} attempts")]
    IdCollision { attempts: usize },

    #[error("unknown {field} code: {value}")]
    UnknownCode { field: &'static str, value: String },

    #[error("invalid assumption table: {0}")]
    InvalidTable(String),

    #[error("invalid return distribution: {0}")]
    InvalidDistribution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
