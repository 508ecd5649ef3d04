pub mod config;
pub mod orchestrator;
pub mod report;

pub use config::RecoveryConfig;
pub use orchestrator::{ProgressSink, Recovery};
pub use report::{BroadcastFailure, RecoveryReport, VnodeAssignment};
