use std::fmt::{Display, Formatter};
use std::future::Future;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use crate::audit::{AuditEntry, AuditRecord};
use crate::pattern::Tier;
use crate::profile::{EnvironmentProfile, ProfileTable, RefMatch};
use crate::secrets::{SecretLookup, StaticSecrets};
use crate::trigger::{EventKind, TriggerContext};

/// Target environment reported when nothing could be selected.
pub const UNKNOWN_ENVIRONMENT: &str = "unknown";

/// Why no environment was selected.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoMatch {
    #[error("ref '{git_ref}' matches no branch pattern")]
    NoPatternMatched { git_ref: String },

    #[error("ref '{git_ref}' matches {} in the {tier} tier", .candidates.join(", "))]
    Ambiguous {
        git_ref: String,
        tier: Tier,
        candidates: Vec<String>,
    },

    #[error("override requested without a target environment")]
    MissingEnvironment,

    #[error("environment '{requested}' is not configured")]
    UnknownEnvironment { requested: String },

    #[error("event does not trigger deployments")]
    UnsupportedEvent,
}

/// Terminal outcomes that stop a deployment. They are reported, never retried.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    #[error("no environment matched: {cause}")]
    NoEnvironmentMatched { cause: NoMatch },

    #[error("environment '{environment}' matched, but secrets are missing: {}", .missing.join(", "))]
    CoordinatesUnresolved {
        environment: String,
        missing: Vec<String>,
    },

    #[error("override into production environment '{environment}' requires notes")]
    OverrideRejected { environment: String },
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::NoEnvironmentMatched { .. } => FailureKind::NoEnvironmentMatched,
            Failure::CoordinatesUnresolved { .. } => FailureKind::CoordinatesUnresolved,
            Failure::OverrideRejected { .. } => FailureKind::OverrideRejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoEnvironmentMatched,
    CoordinatesUnresolved,
    OverrideRejected,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureKind::NoEnvironmentMatched => "no_environment_matched",
            FailureKind::CoordinatesUnresolved => "coordinates_unresolved",
            FailureKind::OverrideRejected => "override_rejected",
        })
    }
}

/// The single answer every downstream step of a pipeline run works from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    should_deploy: bool,
    target_environment: String,
    cluster_name: String,
    resource_group: String,
    create_release: bool,
    failure: Option<Failure>,
    audit_record: AuditRecord,
}

impl ResolutionResult {
    pub fn should_deploy(&self) -> bool {
        self.should_deploy
    }

    pub fn target_environment(&self) -> &str {
        &self.target_environment
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn create_release(&self) -> bool {
        self.create_release
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn audit_record(&self) -> &AuditRecord {
        &self.audit_record
    }
}

struct Coordinates {
    cluster_name: String,
    resource_group: String,
}

/// Pick the environment for a trigger without touching any secrets.
///
/// An override takes the requested environment as-is. A manual dispatch naming a known
/// environment selects it directly. Events other than push, pull request and manual
/// dispatch select nothing. Everything else goes through ref matching.
pub fn select<'a>(
    context: &TriggerContext,
    profiles: &'a ProfileTable,
) -> Result<&'a EnvironmentProfile, NoMatch> {
    if context.override_validation {
        let requested = context
            .manual_environment
            .as_deref()
            .ok_or(NoMatch::MissingEnvironment)?;
        return profiles.by_name(requested).ok_or_else(|| NoMatch::UnknownEnvironment {
            requested: requested.to_string(),
        });
    }

    if context.event_kind == EventKind::Other {
        return Err(NoMatch::UnsupportedEvent);
    }

    if context.event_kind == EventKind::ManualDispatch {
        if let Some(requested) = &context.manual_environment {
            if let Some(profile) = profiles.by_name(requested) {
                debug!("Environment '{}' selected by dispatch input", profile.name);
                return Ok(profile);
            }
            warn!("Requested environment '{requested}' is not configured, matching ref instead");
        }
    }

    match profiles.match_ref(&context.git_ref) {
        RefMatch::Matched { profile, tier } => {
            debug!("Ref {} matched '{}' in the {tier} tier", context.git_ref, profile.name);
            Ok(profile)
        }
        RefMatch::Ambiguous { tier, candidates } => Err(NoMatch::Ambiguous {
            git_ref: context.git_ref.clone(),
            tier,
            candidates,
        }),
        RefMatch::NoMatch => Err(NoMatch::NoPatternMatched {
            git_ref: context.git_ref.clone(),
        }),
    }
}

/// An override into a production environment must carry notes.
pub fn gate(context: &TriggerContext, profile: &EnvironmentProfile) -> Result<(), Failure> {
    if context.override_validation && profile.production && context.notes().is_none() {
        return Err(Failure::OverrideRejected {
            environment: profile.name.clone(),
        });
    }
    Ok(())
}

/// Secret keys a resolution of `context` will look up, or `None` if it will not look up any.
pub fn secret_keys<'a>(context: &TriggerContext, profiles: &'a ProfileTable) -> Option<[&'a str; 2]> {
    let profile = select(context, profiles).ok()?;
    gate(context, profile).ok()?;
    Some([
        profile.cluster_secret_key.as_str(),
        profile.resource_group_secret_key.as_str(),
    ])
}

/// Resolve against a backend that has to be read up front, such as a key vault.
///
/// `fetch` is called at most once, with the two keys of a selected environment that
/// passed the override gate.
pub async fn resolve_prefetched<'a, F, Fut>(
    context: &TriggerContext,
    profiles: &'a ProfileTable,
    fetch: F,
) -> ResolutionResult
where
    F: FnOnce([&'a str; 2]) -> Fut,
    Fut: Future<Output = StaticSecrets>,
{
    let secrets = match secret_keys(context, profiles) {
        Some(keys) => fetch(keys).await,
        None => StaticSecrets::default(),
    };
    resolve(context, profiles, &secrets)
}

pub fn resolve<S>(context: &TriggerContext, profiles: &ProfileTable, secrets: &S) -> ResolutionResult
where
    S: SecretLookup + ?Sized,
{
    resolve_at(context, profiles, secrets, Utc::now())
}

/// Like [resolve], with the audit timestamp supplied by the caller.
pub fn resolve_at<S>(
    context: &TriggerContext,
    profiles: &ProfileTable,
    secrets: &S,
    timestamp: DateTime<Utc>,
) -> ResolutionResult
where
    S: SecretLookup + ?Sized,
{
    let (target_environment, outcome) = match select(context, profiles) {
        Ok(profile) => (
            profile.name.clone(),
            coordinates(context, profile, secrets).map(|c| (c, profile.creates_release)),
        ),
        Err(cause) => (
            UNKNOWN_ENVIRONMENT.to_string(),
            Err(Failure::NoEnvironmentMatched { cause }),
        ),
    };

    let (cluster_name, resource_group, create_release, failure) = match outcome {
        Ok((coordinates, creates_release)) => (
            coordinates.cluster_name,
            coordinates.resource_group,
            creates_release,
            None,
        ),
        Err(failure) => (String::new(), String::new(), false, Some(failure)),
    };
    let should_deploy = failure.is_none();

    match &failure {
        None => info!(
            "Deploying to '{target_environment}' (release: {create_release}) from {}",
            context.git_ref
        ),
        Some(failure) => warn!("Not deploying: {failure}"),
    }

    let audit_record = AuditRecord::new(
        timestamp,
        AuditEntry {
            actor: context.actor.clone(),
            git_ref: context.git_ref.clone(),
            event_kind: context.event_kind,
            override_used: context.override_validation,
            override_notes: context.notes().map(String::from),
            target_environment: target_environment.clone(),
            should_deploy,
            failure: failure.as_ref().map(Failure::kind),
        },
    );

    ResolutionResult {
        should_deploy,
        target_environment,
        cluster_name,
        resource_group,
        create_release,
        failure,
        audit_record,
    }
}

fn coordinates<S>(
    context: &TriggerContext,
    profile: &EnvironmentProfile,
    secrets: &S,
) -> Result<Coordinates, Failure>
where
    S: SecretLookup + ?Sized,
{
    gate(context, profile)?;

    let cluster_name = lookup(secrets, &profile.cluster_secret_key);
    let resource_group = lookup(secrets, &profile.resource_group_secret_key);

    match (cluster_name, resource_group) {
        (Some(cluster_name), Some(resource_group)) => Ok(Coordinates {
            cluster_name,
            resource_group,
        }),
        // Half a set of coordinates is as good as none.
        (cluster_name, resource_group) => Err(Failure::CoordinatesUnresolved {
            environment: profile.name.clone(),
            missing: [
                (cluster_name, &profile.cluster_secret_key),
                (resource_group, &profile.resource_group_secret_key),
            ]
            .into_iter()
            .filter(|(value, _)| value.is_none())
            .map(|(_, key)| key.clone())
            .collect(),
        }),
    }
}

/// A secret that is unset, blank, or failed to load counts as absent.
fn lookup<S>(secrets: &S, key: &str) -> Option<String>
where
    S: SecretLookup + ?Sized,
{
    match secrets.lookup(key) {
        Ok(Some(value)) if !value.trim().is_empty() => {
            debug!("Secret {key} resolved");
            Some(value.trim().to_string())
        }
        Ok(Some(_)) => {
            warn!("Secret {key} is empty");
            None
        }
        Ok(None) => {
            warn!("Secret {key} is not set");
            None
        }
        Err(err) => {
            warn!("Secret {key} could not be read: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use chrono::TimeZone;
    use crate::profile::test::{profile, standard_table};
    use crate::secrets::StaticSecrets;

    fn all_secrets() -> StaticSecrets {
        [
            ("AKS_CLUSTER_DEV", "dev-cluster"),
            ("AKS_RESOURCE_GROUP_DEV", "dev-rg"),
            ("AKS_CLUSTER_STAGING", "staging-cluster"),
            ("AKS_RESOURCE_GROUP_STAGING", "staging-rg"),
            ("AKS_CLUSTER_PRODUCTION", "prod-cluster"),
            ("AKS_RESOURCE_GROUP_PRODUCTION", "prod-rg"),
        ]
        .into_iter()
        .collect()
    }

    fn push(git_ref: &str) -> TriggerContext {
        TriggerContext::new(git_ref, EventKind::Push)
    }

    fn manual(git_ref: &str, environment: &str) -> TriggerContext {
        TriggerContext {
            manual_environment: Some(environment.to_string()),
            ..TriggerContext::new(git_ref, EventKind::ManualDispatch)
        }
    }

    fn overridden(git_ref: &str, environment: &str, notes: &str) -> TriggerContext {
        TriggerContext {
            override_validation: true,
            override_notes: Some(notes.to_string()),
            ..manual(git_ref, environment)
        }
    }

    fn kind(result: &ResolutionResult) -> Option<FailureKind> {
        result.failure().map(Failure::kind)
    }

    #[test]
    fn develop_deploys_to_dev() {
        let result = resolve(&push("refs/heads/develop"), &standard_table(), &all_secrets());
        assert!(result.should_deploy());
        assert_eq!(result.target_environment(), "dev");
        assert_eq!(result.cluster_name(), "dev-cluster");
        assert_eq!(result.resource_group(), "dev-rg");
        assert!(!result.create_release());
        assert_eq!(result.failure(), None);
    }

    #[test]
    fn tags_deploy_to_production_and_release() {
        let result = resolve(&push("refs/tags/v2.0.0"), &standard_table(), &all_secrets());
        assert!(result.should_deploy());
        assert_eq!(result.target_environment(), "production");
        assert!(result.create_release());
    }

    #[test]
    fn every_uniquely_matched_ref_deploys_to_its_profile() {
        let table = standard_table();
        for (git_ref, expected) in [
            ("refs/heads/develop", "dev"),
            ("develop", "dev"),
            ("refs/heads/release/1.0", "staging"),
            ("refs/heads/release/2024-11", "staging"),
            ("refs/heads/main", "production"),
            ("refs/tags/v0.0.1", "production"),
        ] {
            let result = resolve(&push(git_ref), &table, &all_secrets());
            assert!(result.should_deploy(), "{git_ref}");
            assert_eq!(result.target_environment(), expected, "{git_ref}");
        }
    }

    #[test]
    fn unmatched_refs_do_not_deploy() {
        let table = standard_table();
        for git_ref in ["refs/heads/feature/x", "refs/pull/7/merge", "refs/heads/developer", ""] {
            let result = resolve(&push(git_ref), &table, &all_secrets());
            assert!(!result.should_deploy(), "{git_ref}");
            assert_eq!(result.target_environment(), UNKNOWN_ENVIRONMENT);
            assert_eq!(kind(&result), Some(FailureKind::NoEnvironmentMatched));
            assert_eq!(result.cluster_name(), "");
            assert!(!result.create_release());
        }
    }

    #[test]
    fn ambiguous_refs_do_not_deploy() {
        let table = ProfileTable::unchecked(vec![
            profile("dev", &["release/*"]),
            profile("staging", &["release/*"]),
        ]);
        let result = resolve(&push("refs/heads/release/1"), &table, &all_secrets());
        assert!(!result.should_deploy());
        assert_eq!(result.target_environment(), UNKNOWN_ENVIRONMENT);
        assert_eq!(
            result.failure(),
            Some(&Failure::NoEnvironmentMatched {
                cause: NoMatch::Ambiguous {
                    git_ref: "refs/heads/release/1".into(),
                    tier: Tier::PrefixBranch,
                    candidates: vec!["dev".into(), "staging".into()],
                }
            })
        );
    }

    #[test]
    fn other_events_do_not_deploy() {
        let context = TriggerContext::new("refs/heads/develop", EventKind::Other);
        let result = resolve(&context, &standard_table(), &all_secrets());
        assert!(!result.should_deploy());
        assert_eq!(result.target_environment(), UNKNOWN_ENVIRONMENT);
        assert_eq!(
            result.failure(),
            Some(&Failure::NoEnvironmentMatched { cause: NoMatch::UnsupportedEvent })
        );
        assert_eq!(result.audit_record().entry().event_kind, EventKind::Other);
        assert_eq!(result.audit_record().fingerprint().len(), 64);
    }

    #[test]
    fn manual_dispatch_selects_environment_directly() {
        let result = resolve(&manual("refs/heads/feature/x", "sqe"), &standard_table(), &all_secrets());
        assert!(result.should_deploy());
        assert_eq!(result.target_environment(), "staging");
        assert!(!result.audit_record().entry().override_used);
    }

    #[test]
    fn manual_dispatch_with_unknown_environment_falls_back_to_ref() {
        let result = resolve(&manual("refs/heads/develop", "qa"), &standard_table(), &all_secrets());
        assert_eq!(result.target_environment(), "dev");
    }

    #[test]
    fn environment_input_is_ignored_on_push() {
        let context = TriggerContext {
            manual_environment: Some("production".into()),
            ..push("refs/heads/develop")
        };
        let result = resolve(&context, &standard_table(), &all_secrets());
        assert_eq!(result.target_environment(), "dev");
    }

    #[test]
    fn production_override_without_notes_is_rejected() {
        for notes in ["", "   "] {
            for git_ref in ["refs/heads/main", "refs/heads/feature/x", "refs/tags/v1"] {
                let result = resolve(&overridden(git_ref, "prod", notes), &standard_table(), &all_secrets());
                assert!(!result.should_deploy());
                assert_eq!(kind(&result), Some(FailureKind::OverrideRejected));
                assert_eq!(result.target_environment(), "production");
                assert_eq!(result.cluster_name(), "");
                assert!(!result.create_release());
                assert!(result.audit_record().entry().override_used);
            }
        }

        let mut context = overridden("refs/heads/main", "prod", "");
        context.override_notes = None;
        let result = resolve(&context, &standard_table(), &all_secrets());
        assert_eq!(kind(&result), Some(FailureKind::OverrideRejected));
    }

    #[test]
    fn rejected_override_does_not_read_secrets() {
        let lookup = |key: &str| -> Option<String> { panic!("unexpected lookup of {key}") };
        let result = resolve(&overridden("refs/heads/x", "production", ""), &standard_table(), &lookup);
        assert_eq!(kind(&result), Some(FailureKind::OverrideRejected));
    }

    #[test]
    fn secret_keys_follow_selection_and_gate() {
        let table = standard_table();
        assert_eq!(
            secret_keys(&push("refs/heads/develop"), &table),
            Some(["AKS_CLUSTER_DEV", "AKS_RESOURCE_GROUP_DEV"])
        );
        assert_eq!(
            secret_keys(&overridden("refs/heads/x", "prod", "INC-1"), &table),
            Some(["AKS_CLUSTER_PRODUCTION", "AKS_RESOURCE_GROUP_PRODUCTION"])
        );
        assert_eq!(secret_keys(&overridden("refs/heads/x", "prod", " "), &table), None);
        assert_eq!(secret_keys(&push("refs/heads/feature/x"), &table), None);
    }

    #[tokio::test]
    async fn rejected_override_fetches_nothing() {
        let table = standard_table();
        let fetched = RefCell::new(Vec::new());
        let result = resolve_prefetched(&overridden("refs/heads/x", "prod", ""), &table, |keys| {
            fetched.borrow_mut().extend(keys.map(String::from));
            async { all_secrets() }
        })
        .await;
        assert_eq!(kind(&result), Some(FailureKind::OverrideRejected));
        assert!(fetched.borrow().is_empty());
    }

    #[tokio::test]
    async fn prefetch_reads_only_the_selected_environment() {
        let table = standard_table();
        let fetched = RefCell::new(Vec::new());
        let result = resolve_prefetched(&overridden("refs/heads/x", "prod", "INC-9"), &table, |keys| {
            fetched.borrow_mut().extend(keys.map(String::from));
            async {
                [("AKS_CLUSTER_PRODUCTION", "prod-cluster"), ("AKS_RESOURCE_GROUP_PRODUCTION", "prod-rg")]
                    .into_iter()
                    .collect::<StaticSecrets>()
            }
        })
        .await;
        assert!(result.should_deploy());
        assert_eq!(result.cluster_name(), "prod-cluster");
        assert_eq!(
            *fetched.borrow(),
            ["AKS_CLUSTER_PRODUCTION", "AKS_RESOURCE_GROUP_PRODUCTION"]
        );
    }

    #[test]
    fn production_override_with_notes_deploys_from_any_branch() {
        let context = overridden("refs/heads/feature/x", "production", " INC-42 rollback ");
        let result = resolve(&context, &standard_table(), &all_secrets());
        assert!(result.should_deploy());
        assert_eq!(result.target_environment(), "production");
        assert_eq!(result.cluster_name(), "prod-cluster");
        assert!(result.create_release());
        assert_eq!(result.audit_record().entry().override_notes.as_deref(), Some("INC-42 rollback"));
    }

    #[test]
    fn non_production_override_needs_no_notes() {
        let result = resolve(&overridden("refs/heads/main", "dev", ""), &standard_table(), &all_secrets());
        assert!(result.should_deploy());
        assert_eq!(result.target_environment(), "dev");
        assert_eq!(result.audit_record().entry().override_notes, None);
    }

    #[test]
    fn override_requires_known_environment() {
        let result = resolve(&overridden("refs/heads/develop", "qa", "x"), &standard_table(), &all_secrets());
        assert_eq!(result.target_environment(), UNKNOWN_ENVIRONMENT);
        assert_eq!(
            result.failure(),
            Some(&Failure::NoEnvironmentMatched {
                cause: NoMatch::UnknownEnvironment { requested: "qa".into() }
            })
        );

        let mut context = overridden("refs/heads/develop", "dev", "x");
        context.manual_environment = None;
        let result = resolve(&context, &standard_table(), &all_secrets());
        assert_eq!(
            result.failure(),
            Some(&Failure::NoEnvironmentMatched { cause: NoMatch::MissingEnvironment })
        );
    }

    #[test]
    fn missing_coordinates_are_reported_separately() {
        let table = standard_table();
        let cases: [(&[(&str, &str)], &[&str]); 4] = [
            (&[("AKS_CLUSTER_DEV", "dev-cluster")], &["AKS_RESOURCE_GROUP_DEV"]),
            (&[("AKS_RESOURCE_GROUP_DEV", "dev-rg")], &["AKS_CLUSTER_DEV"]),
            (
                &[("AKS_CLUSTER_DEV", ""), ("AKS_RESOURCE_GROUP_DEV", " \n")],
                &["AKS_CLUSTER_DEV", "AKS_RESOURCE_GROUP_DEV"],
            ),
            (&[], &["AKS_CLUSTER_DEV", "AKS_RESOURCE_GROUP_DEV"]),
        ];

        for (secrets, missing) in cases {
            let secrets: StaticSecrets = secrets.iter().copied().collect();
            let result = resolve(&push("refs/heads/develop"), &table, &secrets);
            assert!(!result.should_deploy());
            assert_eq!(result.target_environment(), "dev");
            assert_eq!(result.cluster_name(), "");
            assert_eq!(result.resource_group(), "");
            assert!(!result.create_release());
            assert_eq!(
                result.failure(),
                Some(&Failure::CoordinatesUnresolved {
                    environment: "dev".into(),
                    missing: missing.iter().map(|s| s.to_string()).collect(),
                })
            );
        }
    }

    #[test]
    fn coordinates_are_trimmed() {
        let secrets: StaticSecrets =
            [("AKS_CLUSTER_DEV", "dev-cluster\n"), ("AKS_RESOURCE_GROUP_DEV", " dev-rg")]
                .into_iter()
                .collect();
        let result = resolve(&push("refs/heads/develop"), &standard_table(), &secrets);
        assert_eq!(result.cluster_name(), "dev-cluster");
        assert_eq!(result.resource_group(), "dev-rg");
    }

    #[test]
    fn failed_lookups_count_as_missing() {
        struct Broken;
        impl SecretLookup for Broken {
            fn lookup(&self, key: &str) -> Result<Option<String>, crate::secrets::Error> {
                Err(crate::secrets::Error::NotUnicode(key.to_string()))
            }
        }
        let result = resolve(&push("refs/heads/develop"), &standard_table(), &Broken);
        assert_eq!(kind(&result), Some(FailureKind::CoordinatesUnresolved));
    }

    #[test]
    fn audit_record_is_always_complete() {
        let context = TriggerContext {
            actor: "octocat".into(),
            ..push("refs/heads/nowhere")
        };
        let result = resolve(&context, &standard_table(), &all_secrets());
        let entry = result.audit_record().entry();
        assert_eq!(entry.actor, "octocat");
        assert_eq!(entry.git_ref, "refs/heads/nowhere");
        assert_eq!(entry.event_kind, EventKind::Push);
        assert!(!entry.override_used);
        assert!(!entry.should_deploy);
        assert_eq!(entry.target_environment, UNKNOWN_ENVIRONMENT);
        assert_eq!(entry.failure, Some(FailureKind::NoEnvironmentMatched));
    }

    #[test]
    fn resolution_is_idempotent() {
        let table = standard_table();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        for context in [
            push("refs/heads/develop"),
            push("refs/heads/feature/x"),
            overridden("refs/heads/main", "prod", ""),
            overridden("refs/heads/main", "prod", "notes"),
        ] {
            assert_eq!(
                resolve_at(&context, &table, &all_secrets(), at),
                resolve_at(&context, &table, &all_secrets(), at)
            );

            let first = resolve(&context, &table, &all_secrets());
            let second = resolve(&context, &table, &all_secrets());
            assert_eq!(first.audit_record().fingerprint(), second.audit_record().fingerprint());
            assert_eq!(first.audit_record().entry(), second.audit_record().entry());
            assert_eq!(first.failure(), second.failure());
            assert_eq!(first.cluster_name(), second.cluster_name());
            assert_eq!(first.should_deploy(), second.should_deploy());
        }
    }

    #[test]
    fn failures_serialize_with_kind_tag() {
        let failure = Failure::NoEnvironmentMatched {
            cause: NoMatch::NoPatternMatched { git_ref: "refs/heads/x".into() },
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["kind"], "no_environment_matched");
        assert_eq!(value["cause"]["reason"], "no_pattern_matched");
        assert_eq!(
            failure.to_string(),
            "no environment matched: ref 'refs/heads/x' matches no branch pattern"
        );
    }
}
