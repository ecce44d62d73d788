//! Retry behaviour of the subscription-manager mutations.

use std::time::Duration;

use rhsm_core::fakes::{FakeActions, FakeResponse, RecordingSleeper};
use rhsm_core::{CollectedReports, FailureKind, RetryPolicy, Rhsm, RhsmConfig};

const SET: [&str; 4] = ["subscription-manager", "release", "--set", "8.6"];
const UNSET: [&str; 3] = ["subscription-manager", "release", "--unset"];
const REFRESH: [&str; 2] = ["subscription-manager", "refresh"];

fn config(var: &str) -> RhsmConfig {
    RhsmConfig::default().with_skip_env_var(var)
}

#[test]
fn test_set_release_gives_up_after_five_attempts() {
    let config = config("RHSM_IT_RETRY_SET_EXHAUSTED");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host().on_call(&SET, FakeResponse::failure("Network error"));

    let err = Rhsm::new(&config, &reports, &sleeper)
        .set_release(&ctx, "8.6")
        .unwrap_err();

    assert_eq!(ctx.call_count(&SET), 5);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5); 4]);
    assert_eq!(err.kind, FailureKind::Command);
    assert_eq!(err.stderr(), Some("Network error"));
}

#[test]
fn test_unset_release_recovers_on_third_attempt() {
    let config = config("RHSM_IT_RETRY_UNSET_RECOVERS");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host()
        .on_call(&UNSET, FakeResponse::failure("timeout"))
        .on_call(&UNSET, FakeResponse::failure("timeout"))
        .on_call(&UNSET, FakeResponse::stdout("Release preference has been unset\n"));

    let result = Rhsm::new(&config, &reports, &sleeper).unset_release(&ctx);

    assert_eq!(result.unwrap(), Some(()));
    assert_eq!(ctx.call_count(&UNSET), 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[test]
fn test_refresh_uses_configured_policy() {
    let config = config("RHSM_IT_RETRY_REFRESH").with_retry(RetryPolicy::new(2, 0));
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host().on_call(&REFRESH, FakeResponse::failure("server busy"));

    let result = Rhsm::new(&config, &reports, &sleeper).refresh(&ctx);

    assert!(result.is_err());
    assert_eq!(ctx.call_count(&REFRESH), 2);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn test_missing_binary_is_retried_too() {
    let config = config("RHSM_IT_RETRY_MISSING").with_retry(RetryPolicy::new(3, 1));
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host();

    let err = Rhsm::new(&config, &reports, &sleeper)
        .refresh(&ctx)
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Execution);
    assert_eq!(ctx.call_count(&REFRESH), 3);
}

#[test]
fn test_queries_are_not_retried() {
    let config = config("RHSM_IT_RETRY_QUERY");
    let (reports, sleeper) = (CollectedReports::new(), RecordingSleeper::new());
    let ctx = FakeActions::host().on_call(
        &["subscription-manager", "release"],
        FakeResponse::failure("not registered"),
    );

    let result = Rhsm::new(&config, &reports, &sleeper).get_release(&ctx);

    assert!(result.is_err());
    assert_eq!(ctx.call_count(&["subscription-manager", "release"]), 1);
    assert!(sleeper.delays().is_empty());
}
