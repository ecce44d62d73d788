//! Subscription-manager operations
//!
//! [`Rhsm`] composes the pieces of this crate around each operation
//! explicitly: the skip switch check first, then (for recoverable
//! mutations) the retry policy, then the error-mapped command itself.
//! Gated operations return `Ok(None)` when RHSM is switched off.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info};

use crate::certs;
use crate::config::RhsmConfig;
use crate::context::IsolatedActions;
use crate::mapper::ErrorMapper;
use crate::report::ReportSink;
use crate::repos::{inhibit_on_duplicate_repos, parse_repos, rhsm_repo_ids, Repository};
use crate::retry::{retry, Sleeper};
use crate::snapshot::SubscriptionSnapshot;
use crate::Result;

static SKU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SKU:\s*(\S+)").expect("valid SKU regex"));
static REPO_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Repo ID:\s*(\S+)").expect("valid repo id regex"));
static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Release:\s*(\S+)").expect("valid release regex"));

const SUBSCRIPTION_MANAGER: &str = "subscription-manager";

const YUM_REPOINFO: ErrorMapper<'static> = ErrorMapper::new(
    "yum",
    "Unable to get list of available yum repositories.",
)
.with_hint("Please ensure the yum repositories are configured correctly and reachable.");

const CONTAINER_MODE: ErrorMapper<'static> = ErrorMapper::new(
    "ln",
    "Cannot set the container mode for the subscription-manager.",
)
.with_hint("Please ensure /etc/rhsm exists and /etc/rhsm-host can be created in the target root.");

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Entry point for every subscription-manager interaction.
pub struct Rhsm<'a> {
    config: &'a RhsmConfig,
    reports: &'a dyn ReportSink,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Rhsm<'a> {
    /// Bind the operations to one configuration, report sink and sleeper.
    ///
    /// `sleeper` is only used between attempts of retried operations.
    pub fn new(config: &'a RhsmConfig, reports: &'a dyn ReportSink, sleeper: &'a dyn Sleeper) -> Self {
        Rhsm {
            config,
            reports,
            sleeper,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &RhsmConfig {
        self.config
    }

    /// Run `op` unless the skip switch is set.
    fn with_rhsm<T>(&self, operation: &str, op: impl FnOnce() -> Result<T>) -> Result<Option<T>> {
        if self.config.skip_rhsm() {
            debug!(operation, "RHSM is skipped, not performing operation");
            return Ok(None);
        }
        op().map(Some)
    }

    /// Run `op` under the configured retry policy.
    fn with_retry<T>(&self, operation: &str, op: impl FnMut() -> Result<T>) -> Result<T> {
        retry(&self.config.retry, self.sleeper, operation, op)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// SKUs of the subscriptions the system is attached to
    pub fn get_attached_skus(&self, context: &dyn IsolatedActions) -> Result<Option<Vec<String>>> {
        self.with_rhsm("get_attached_skus", || attached_skus(context))
    }

    /// Ids of the repositories available through the RHSM repo file.
    ///
    /// Not gated by the skip switch; `yum` works without RHSM. Duplicate
    /// repository definitions produce an inhibitor report.
    pub fn get_available_repo_ids(
        &self,
        context: &dyn IsolatedActions,
        releasever: Option<&str>,
    ) -> Result<Vec<String>> {
        let repos = self.get_available_repos(context, releasever)?;
        Ok(rhsm_repo_ids(&repos, &self.config.rhsm_repo_file))
    }

    /// Every repository `yum repoinfo` reports, whatever file defines it.
    pub fn get_available_repos(
        &self,
        context: &dyn IsolatedActions,
        releasever: Option<&str>,
    ) -> Result<Vec<Repository>> {
        let mut args = vec!["yum", "repoinfo"];
        if let Some(releasever) = releasever.filter(|r| !r.is_empty()) {
            args.extend(["--releasever", releasever]);
        }

        let output = YUM_REPOINFO.call(context, &args)?;
        inhibit_on_duplicate_repos(&output.stderr, self.reports);
        parse_repos(&output.stdout).collect()
    }

    /// Ids of the repositories enabled through subscription-manager
    pub fn get_enabled_repo_ids(&self, context: &dyn IsolatedActions) -> Result<Option<Vec<String>>> {
        self.with_rhsm("get_enabled_repo_ids", || enabled_repo_ids(context))
    }

    /// Release subscription-manager is pinned to; empty when unset
    pub fn get_release(&self, context: &dyn IsolatedActions) -> Result<Option<String>> {
        self.with_rhsm("get_release", || release(context))
    }

    /// Full paths of the installed product certificates
    pub fn get_existing_product_certificates(
        &self,
        context: &dyn IsolatedActions,
    ) -> Result<Option<Vec<String>>> {
        self.with_rhsm("get_existing_product_certificates", || {
            certs::existing_product_certificates(context, &self.config.product_cert_dirs)
        })
    }

    /// Gather the complete subscription state of the source system.
    ///
    /// All or nothing: the first failing step aborts the scan.
    pub fn scan_rhsm_info(&self, context: &dyn IsolatedActions) -> Result<Option<SubscriptionSnapshot>> {
        self.with_rhsm("scan_rhsm_info", || {
            Ok(SubscriptionSnapshot {
                attached_skus: attached_skus(context)?,
                available_repos: self.get_available_repo_ids(context, None)?,
                enabled_repos: enabled_repo_ids(context)?,
                release: release(context)?,
                existing_product_certificates: certs::existing_product_certificates(
                    context,
                    &self.config.product_cert_dirs,
                )?,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Pin subscription-manager to `release` (retried)
    pub fn set_release(&self, context: &dyn IsolatedActions, release: &str) -> Result<Option<()>> {
        self.with_rhsm("set_release", || {
            self.with_retry("set_release", || {
                ErrorMapper::subscription_manager()
                    .call(context, &[SUBSCRIPTION_MANAGER, "release", "--set", release])
                    .map(|_| ())
            })
        })
    }

    /// Remove the pinned release (retried)
    pub fn unset_release(&self, context: &dyn IsolatedActions) -> Result<Option<()>> {
        self.with_rhsm("unset_release", || {
            self.with_retry("unset_release", || {
                ErrorMapper::subscription_manager()
                    .call(context, &[SUBSCRIPTION_MANAGER, "release", "--unset"])
                    .map(|_| ())
            })
        })
    }

    /// Refresh the local subscription data (retried)
    pub fn refresh(&self, context: &dyn IsolatedActions) -> Result<Option<()>> {
        self.with_rhsm("refresh", || {
            self.with_retry("refresh", || {
                ErrorMapper::subscription_manager()
                    .call(context, &[SUBSCRIPTION_MANAGER, "refresh"])
                    .map(|_| ())
            })
        })
    }

    /// Put RHSM into container mode inside an isolated target root.
    ///
    /// Refuses to touch the host: logs an error and returns without acting.
    pub fn set_container_mode(&self, context: &dyn IsolatedActions) -> Result<Option<()>> {
        self.with_rhsm("set_container_mode", || {
            if !context.is_isolated() {
                error!("Trying to set RHSM into the container mode on host. Skipping the action.");
                return Ok(());
            }
            CONTAINER_MODE
                .call(context, &["ln", "-s", "/etc/rhsm", "/etc/rhsm-host"])
                .map(|_| ())
        })
    }

    /// Replace the product certificates recorded in `snapshot` with `cert_path`
    pub fn switch_certificate(
        &self,
        context: &dyn IsolatedActions,
        snapshot: &SubscriptionSnapshot,
        cert_path: &Path,
    ) -> Result<Option<()>> {
        self.with_rhsm("switch_certificate", || {
            certs::switch_certificate(
                context,
                &snapshot.existing_product_certificates,
                cert_path,
                &self.config.product_cert_dirs,
            )
        })
    }
}

fn attached_skus(context: &dyn IsolatedActions) -> Result<Vec<String>> {
    let output = ErrorMapper::subscription_manager()
        .call(context, &[SUBSCRIPTION_MANAGER, "list", "--consumed"])?;
    Ok(find_all(&SKU_RE, &output.stdout))
}

fn enabled_repo_ids(context: &dyn IsolatedActions) -> Result<Vec<String>> {
    let output = ErrorMapper::subscription_manager()
        .call(context, &[SUBSCRIPTION_MANAGER, "repos", "--list-enabled"])?;
    Ok(find_all(&REPO_UID_RE, &output.stdout))
}

fn release(context: &dyn IsolatedActions) -> Result<String> {
    let output = ErrorMapper::subscription_manager().call(context, &[SUBSCRIPTION_MANAGER, "release"])?;
    let release = find_all(&RELEASE_RE, &output.stdout)
        .into_iter()
        .next()
        .unwrap_or_default();
    info!(release = %release, "subscription-manager release");
    Ok(release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::fakes::{FakeActions, FakeResponse, RecordingSleeper};
    use crate::report::CollectedReports;
    use crate::retry::RetryPolicy;

    fn config(var: &str) -> RhsmConfig {
        RhsmConfig::default()
            .with_skip_env_var(var)
            .with_retry(RetryPolicy::new(5, 5))
    }

    #[test]
    fn test_enabled_repo_ids() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_ENABLED");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host().on_call(
            &["subscription-manager", "repos", "--list-enabled"],
            FakeResponse::stdout(
                "Repo ID: rhel-8-for-x86_64-baseos-rpms\nRepo ID: rhel-8-for-x86_64-appstream-rpms\n",
            ),
        );

        let repos = Rhsm::new(&cfg, &reports, &sleeper)
            .get_enabled_repo_ids(&ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            repos,
            vec![
                "rhel-8-for-x86_64-baseos-rpms".to_string(),
                "rhel-8-for-x86_64-appstream-rpms".to_string(),
            ]
        );
    }

    #[test]
    fn test_release_missing_is_empty_string() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_RELEASE");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host().on_call(
            &["subscription-manager", "release"],
            FakeResponse::stdout("Release not set\n"),
        );

        let release = Rhsm::new(&cfg, &reports, &sleeper).get_release(&ctx).unwrap();
        assert_eq!(release, Some(String::new()));
    }

    #[test]
    fn test_release_set() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_RELEASE_SET");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host().on_call(
            &["subscription-manager", "release"],
            FakeResponse::stdout("Release: 7.9\n"),
        );

        let release = Rhsm::new(&cfg, &reports, &sleeper).get_release(&ctx).unwrap();
        assert_eq!(release.as_deref(), Some("7.9"));
    }

    #[test]
    fn test_attached_skus() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_SKUS");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host().on_call(
            &["subscription-manager", "list", "--consumed"],
            FakeResponse::stdout("Subscription Name: RHEL\nSKU:            RH00009\nSKU: MCT3718\n"),
        );

        let skus = Rhsm::new(&cfg, &reports, &sleeper)
            .get_attached_skus(&ctx)
            .unwrap()
            .unwrap();
        assert_eq!(skus, vec!["RH00009".to_string(), "MCT3718".to_string()]);
    }

    #[test]
    fn test_releasever_is_passed_to_yum() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_RELEASEVER");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host().on_call(
            &["yum", "repoinfo", "--releasever", "8"],
            FakeResponse::stdout(""),
        );

        let ids = Rhsm::new(&cfg, &reports, &sleeper)
            .get_available_repo_ids(&ctx, Some("8"))
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(ctx.call_count(&["yum", "repoinfo", "--releasever", "8"]), 1);
    }

    #[test]
    fn test_container_mode_refused_on_host() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_CONTAINER_HOST");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::host();

        let result = Rhsm::new(&cfg, &reports, &sleeper).set_container_mode(&ctx);
        assert!(result.is_ok());
        assert!(ctx.ops().is_empty());
    }

    #[test]
    fn test_container_mode_failure_is_command_failure() {
        let cfg = config("RHSM_CORE_UNIT_SKIP_CONTAINER_FAIL");
        let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
        let ctx = FakeActions::isolated().on_call(
            &["ln", "-s", "/etc/rhsm", "/etc/rhsm-host"],
            FakeResponse::failure("ln: failed to create symbolic link: File exists"),
        );

        let err = Rhsm::new(&cfg, &reports, &sleeper)
            .set_container_mode(&ctx)
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Command);
        assert_eq!(err.message, "Cannot set the container mode for the subscription-manager.");
        assert_eq!(err.stderr(), Some("ln: failed to create symbolic link: File exists"));
    }
}
