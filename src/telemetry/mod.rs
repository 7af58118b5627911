pub mod reconciler;
pub mod types;
pub mod window;

pub use reconciler::{reconcile, system_load_pct};
pub use types::*;
pub use window::TimeWindow;
