pub mod scheduler;
pub mod types;

pub use scheduler::PollScheduler;
pub use types::{CycleOutcome, CycleReport, Fetched, PollCycle};
