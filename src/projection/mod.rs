//! Member career projection, cohort aggregation and rate solving

mod career;
mod cashflows;
mod irr;
mod state;
mod transitions;

pub use career::{CareerConfig, CareerSimulator};
pub use cashflows::{aggregate, MasterCashFlowMatrix};
pub use irr::{find_rate, is_no_solution, try_find_rate, NO_SOLUTION};
pub use state::CareerState;
pub use transitions::Transitions;
