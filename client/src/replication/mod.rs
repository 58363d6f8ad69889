mod config;
mod engine;
mod history;
mod stats;
mod time;

pub use config::ReplicationConfig;
pub use engine::ReplicationEngine;
pub use history::InterpolationHistory;
pub use stats::SyncStats;
pub use time::ServerTimeEstimator;
