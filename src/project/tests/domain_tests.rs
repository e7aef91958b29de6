//! Tests for project identifiers, subscriptions, and secrets.

use crate::project::domain::{
    EventLabels, EventSubscription, LogLevel, ProjectDomainError, ProjectId, ProjectSpec,
    REDACTED_SECRET_VALUE, Secret, WorkerSpec,
};
use rstest::rstest;

fn labels(pairs: &[(&str, &str)]) -> EventLabels {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[rstest]
#[case("blog")]
#[case("my-site-2")]
fn valid_project_ids_are_accepted(#[case] raw: &str) {
    assert_eq!(ProjectId::new(raw).expect("valid id").as_str(), raw);
}

#[rstest]
#[case("")]
#[case("Blog")]
#[case("2fast")]
#[case("trailing-")]
#[case("with space")]
fn invalid_project_ids_are_rejected(#[case] raw: &str) {
    assert!(ProjectId::new(raw).is_err());
}

#[rstest]
#[case("github", "push", true)]
#[case("github", "anything", true)]
#[case("gitlab", "push", false)]
#[case("", "push", false)]
#[case("github", "", false)]
fn wildcard_subscription_matches_any_type(
    #[case] source: &str,
    #[case] event_type: &str,
    #[case] expected: bool,
) {
    let subscription = EventSubscription::new("github", ["push", "*"]);

    assert_eq!(
        subscription.matches(source, event_type, &EventLabels::new()),
        expected
    );
}

#[rstest]
#[case(&[], true)]
#[case(&[("branch", "main")], true)]
#[case(&[("branch", "main"), ("repo", "site")], true)]
#[case(&[("branch", "dev")], false)]
#[case(&[("owner", "someone")], false)]
fn event_labels_must_all_match(#[case] event_labels: &[(&str, &str)], #[case] expected: bool) {
    let subscription = EventSubscription::new("github", ["push"])
        .with_label("branch", "main")
        .with_label("repo", "site");

    assert_eq!(
        subscription.matches("github", "push", &labels(event_labels)),
        expected
    );
}

#[test]
fn empty_type_list_matches_every_type() {
    let subscription = EventSubscription::new("github", Vec::<String>::new());

    assert!(subscription.matches("github", "release", &EventLabels::new()));
}

#[test]
fn secrets_need_a_key_and_redact_their_value() {
    assert_eq!(Secret::new(" ", "value"), Err(ProjectDomainError::EmptySecretKey));

    let secret = Secret::new("token", "hunter2").expect("valid secret");
    let redacted = secret.redacted();

    assert_eq!(redacted.key(), "token");
    assert_eq!(redacted.value(), REDACTED_SECRET_VALUE);
    assert_eq!(secret.value(), "hunter2");
}

#[test]
fn spec_reads_wire_field_names() {
    let spec: ProjectSpec = serde_json::from_value(serde_json::json!({
        "eventSubscriptions": [{"source": "github", "types": ["push"]}],
        "workerTemplate": {
            "workspaceSize": "5Gi",
            "logLevel": "DEBUG",
            "git": {"cloneURL": "https://example.com/repo.git", "initSubmodules": true}
        }
    }))
    .expect("decode spec");

    let worker: &WorkerSpec = &spec.worker_template;
    assert_eq!(spec.event_subscriptions.len(), 1);
    assert_eq!(worker.workspace_size, "5Gi");
    assert_eq!(worker.log_level, LogLevel::Debug);
    assert_eq!(worker.git.clone_url, "https://example.com/repo.git");
    assert!(worker.git.init_submodules);
}

#[rstest]
#[case("debug", LogLevel::Debug)]
#[case("WARN", LogLevel::Warn)]
fn log_levels_parse_case_insensitively(#[case] raw: &str, #[case] expected: LogLevel) {
    assert_eq!(LogLevel::try_from(raw), Ok(expected));
}
