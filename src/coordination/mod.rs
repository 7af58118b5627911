pub mod client;
pub mod types;

pub use client::CoordinationClient;
pub use types::*;
