pub mod state;

pub use state::{
    CoordinationPanel, DashboardEvent, DashboardSnapshot, DashboardState, PollApplied, SharedDashboard,
};
