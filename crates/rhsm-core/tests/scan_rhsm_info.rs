//! End-to-end tests for gathering the subscription snapshot.

use rhsm_core::fakes::{FakeActions, FakeOp, FakeResponse, RecordingSleeper};
use rhsm_core::{CollectedReports, FailureKind, Rhsm, RhsmConfig, SubscriptionSnapshot};

const REPOINFO: &str = "\
Loaded plugins: product-id, subscription-manager
Repo-id      : rhel-7-server-rpms/7Server/x86_64
Repo-name    : Red Hat Enterprise Linux 7 Server (RPMs)
Repo-filename: /etc/yum.repos.d/redhat.repo

Repo-id      : rhel-7-server-extras-rpms/x86_64
Repo-name    : Red Hat Enterprise Linux 7 Server - Extras (RPMs)
Repo-filename: /etc/yum.repos.d/redhat.repo

Repo-id      : custom
Repo-name    : Custom repository
Repo-filename: /etc/yum.repos.d/custom.repo
";

fn source_system() -> FakeActions {
    FakeActions::host()
        .on_call(
            &["subscription-manager", "list", "--consumed"],
            FakeResponse::stdout("Subscription Name: Red Hat Enterprise Linux\nSKU: RH00009\n"),
        )
        .on_call(&["yum", "repoinfo"], FakeResponse::stdout(REPOINFO))
        .on_call(
            &["subscription-manager", "repos", "--list-enabled"],
            FakeResponse::stdout("Repo ID: rhel-7-server-rpms\n"),
        )
        .on_call(
            &["subscription-manager", "release"],
            FakeResponse::stdout("Release: 7.9\n"),
        )
        .with_dir("/etc/pki/product", &["69.pem"])
        .with_dir("/etc/pki/product-default", &["69.pem"])
}

#[test]
fn test_scan_builds_complete_snapshot() {
    let config = RhsmConfig::default().with_skip_env_var("RHSM_IT_SCAN_COMPLETE");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = source_system();

    let snapshot = Rhsm::new(&config, &reports, &sleeper)
        .scan_rhsm_info(&ctx)
        .unwrap()
        .expect("scan is not skipped");

    assert_eq!(
        snapshot,
        SubscriptionSnapshot {
            attached_skus: vec!["RH00009".into()],
            available_repos: vec![
                "rhel-7-server-rpms".into(),
                "rhel-7-server-extras-rpms".into()
            ],
            enabled_repos: vec!["rhel-7-server-rpms".into()],
            release: "7.9".into(),
            existing_product_certificates: vec![
                "/etc/pki/product/69.pem".into(),
                "/etc/pki/product-default/69.pem".into(),
            ],
        }
    );
    assert!(reports.reports().is_empty());
}

#[test]
fn test_scan_only_reads() {
    let config = RhsmConfig::default().with_skip_env_var("RHSM_IT_SCAN_READ_ONLY");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = source_system();

    Rhsm::new(&config, &reports, &sleeper)
        .scan_rhsm_info(&ctx)
        .unwrap();

    assert!(ctx
        .ops()
        .iter()
        .all(|op| matches!(op, FakeOp::Call(_))));
    assert_eq!(ctx.calls().len(), 4);
}

#[test]
fn test_scan_is_all_or_nothing() {
    let config = RhsmConfig::default().with_skip_env_var("RHSM_IT_SCAN_FAILS");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host()
        .on_call(
            &["subscription-manager", "list", "--consumed"],
            FakeResponse::stdout("SKU: RH00009\n"),
        )
        .on_call(&["yum", "repoinfo"], FakeResponse::stdout(REPOINFO))
        .on_call(
            &["subscription-manager", "repos", "--list-enabled"],
            FakeResponse::failure("This system is not registered"),
        );

    let err = Rhsm::new(&config, &reports, &sleeper)
        .scan_rhsm_info(&ctx)
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Command);
    assert_eq!(err.stderr(), Some("This system is not registered"));
    // read-only queries are never retried and later steps never run
    assert_eq!(
        ctx.call_count(&["subscription-manager", "repos", "--list-enabled"]),
        1
    );
    assert_eq!(ctx.call_count(&["subscription-manager", "release"]), 0);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn test_scan_without_subscription_manager_is_execution_failure() {
    let config = RhsmConfig::default().with_skip_env_var("RHSM_IT_SCAN_MISSING");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host();

    let err = Rhsm::new(&config, &reports, &sleeper)
        .scan_rhsm_info(&ctx)
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Execution);
    assert_eq!(
        err.hint(),
        Some("Please ensure subscription-manager is installed and executable.")
    );
}

#[test]
fn test_skip_mode_is_a_no_op_for_every_gated_operation() {
    let var = "RHSM_IT_SKIP_ALL";
    let config = RhsmConfig::default().with_skip_env_var(var);
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let rhsm = Rhsm::new(&config, &reports, &sleeper);
    let ctx = FakeActions::isolated().with_dir("/etc/pki/product", &["69.pem"]);

    std::env::set_var(var, "1");
    assert_eq!(rhsm.scan_rhsm_info(&ctx).unwrap(), None);
    assert_eq!(rhsm.get_attached_skus(&ctx).unwrap(), None);
    assert_eq!(rhsm.get_enabled_repo_ids(&ctx).unwrap(), None);
    assert_eq!(rhsm.get_release(&ctx).unwrap(), None);
    assert_eq!(rhsm.get_existing_product_certificates(&ctx).unwrap(), None);
    assert_eq!(rhsm.set_release(&ctx, "8.6").unwrap(), None);
    assert_eq!(rhsm.unset_release(&ctx).unwrap(), None);
    assert_eq!(rhsm.refresh(&ctx).unwrap(), None);
    assert_eq!(rhsm.set_container_mode(&ctx).unwrap(), None);
    assert_eq!(
        rhsm.switch_certificate(
            &ctx,
            &SubscriptionSnapshot {
                existing_product_certificates: vec!["/etc/pki/product/69.pem".into()],
                ..Default::default()
            },
            std::path::Path::new("/tmp/479.pem"),
        )
        .unwrap(),
        None
    );
    std::env::remove_var(var);

    assert!(ctx.ops().is_empty());
    assert!(sleeper.delays().is_empty());
    assert_eq!(ctx.files_in("/etc/pki/product"), vec!["69.pem".to_string()]);
}

#[test]
fn test_skip_mode_toggles_between_calls() {
    let var = "RHSM_IT_SKIP_TOGGLE";
    let config = RhsmConfig::default().with_skip_env_var(var);
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let rhsm = Rhsm::new(&config, &reports, &sleeper);
    let ctx = FakeActions::host().on_call(
        &["subscription-manager", "release"],
        FakeResponse::stdout("Release: 8.6\n"),
    );

    std::env::set_var(var, "1");
    assert_eq!(rhsm.get_release(&ctx).unwrap(), None);

    std::env::set_var(var, "0");
    assert_eq!(rhsm.get_release(&ctx).unwrap().as_deref(), Some("8.6"));
    std::env::remove_var(var);

    assert_eq!(ctx.call_count(&["subscription-manager", "release"]), 1);
}
