//! Plan members: demographic data, salary histories and the member builder

mod builder;
mod data;

pub use builder::{MemberBuilder, ObservedRecord, ObservedYear, Snapshot};
pub use data::{
    Member, MemberId, MemberProfile, MemberSummary, MortalityClass, SalaryHistoryRecord, Sex,
    Status, Tier,
};
