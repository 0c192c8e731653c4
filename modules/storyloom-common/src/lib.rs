pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ScoreWeights};
pub use error::EngagementError;
pub use types::*;
