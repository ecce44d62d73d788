//! RHSM-Core: subscription-manager interaction for system upgrades
//!
//! This crate talks to `subscription-manager` and `yum` on the source
//! system (or inside a target root) during a major-version upgrade.
//!
//! ## Layers
//!
//! - [`context`]: where commands run (host or chroot) and filesystem access
//! - [`mapper`]: command failures to user-facing [`TerminalError`]s
//! - [`retry`]: re-invocation of recoverable operations
//! - [`repos`]: `yum repoinfo` parsing and duplicate detection
//! - [`certs`]: product certificate discovery and replacement
//! - [`rhsm`]: the operations themselves, gated by the skip switch
//!
//! Everything is synchronous and runs on the caller's thread.

pub mod certs;
pub mod config;
pub mod context;
pub mod error;
pub mod fakes;
pub mod mapper;
pub mod report;
pub mod repos;
pub mod retry;
pub mod rhsm;
pub mod snapshot;
pub mod telemetry;

pub use certs::PRODUCT_CERT_DIRS;
pub use config::{RhsmConfig, SKIP_RHSM_ENV};
pub use context::{ChrootActions, CommandOutput, HostActions, IsolatedActions};
pub use error::{FailureKind, RunError, TerminalError};
pub use mapper::{ErrorMapper, DEFAULT_COMMAND_HINT};
pub use report::{CollectedReports, Flag, Report, ReportSink, Severity, Tag};
pub use repos::{
    find_duplicate_repos, inhibit_on_duplicate_repos, parse_repos, rhsm_repo_ids, RepoIter,
    Repository, DEFAULT_RHSM_REPOFILE,
};
pub use retry::{retry, RetryPolicy, Sleeper, ThreadSleeper};
pub use rhsm::Rhsm;
pub use snapshot::SubscriptionSnapshot;
pub use telemetry::init_tracing;

/// Result type for rhsm-core operations
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Check if subscription-manager runs in `context`
pub fn is_subscription_manager_available(context: &dyn IsolatedActions) -> bool {
    context.call(&["subscription-manager", "--version"]).is_ok()
}
