//! Rollout-block controller — one reconciliation pass per application.
//!
//! A pass evaluates the application against its active blocking policies
//! (condition upkeep, override resolution, cleanup of invalid overrides),
//! writes the application back if anything changed, and records at most one
//! notification. Writes are optimistic; on conflict the application is
//! re-read and the pure evaluation re-run against the fresh copy.

use shipgate_core::config::ControllerConfig;
use shipgate_core::{
    Application, ApplicationEvent, BlockingPolicy, REASON_OVERRIDING_ROLLOUT_BLOCK,
    REASON_ROLLOUT_BLOCK,
};
use shipgate_state::StateStore;
use tracing::{debug, error, info, warn};

use crate::condition::sync_rollout_block_condition;
use crate::error::{RolloutError, RolloutResult};
use crate::overrides::remove_override;
use crate::resolver::{ActivePolicySet, Resolution, Verdict, resolve};
use crate::store::{ApplicationStore, EventRecorder};

/// Result of evaluating an application without touching the store.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The application with its condition refreshed and invalid overrides removed.
    pub application: Application,
    pub verdict: Verdict,
    /// Override names removed because no active policy matched them.
    pub removed_overrides: Vec<String>,
    /// True if `application` differs from the input.
    pub changed: bool,
}

/// Evaluate `app` against the active policy set.
///
/// The `RolloutBlock` condition is refreshed on every evaluation and the
/// override declaration rewritten in sorted, de-duplicated form. Invalid
/// overrides are removed one at a time and resolution repeated until a
/// verdict is reached; each round removes a name, so this terminates.
pub fn evaluate(app: &Application, active: &ActivePolicySet) -> Evaluation {
    let mut application = app.clone();
    let mut changed = sync_rollout_block_condition(active, &mut application.status);
    let mut removed_overrides = Vec::new();

    let canonical = application.overrides().to_annotation();
    if canonical != application.override_declaration() {
        debug!(
            application = %application.key(),
            overrides = %canonical,
            "normalising override declaration"
        );
        application.set_override_declaration(canonical);
        changed = true;
    }

    let verdict = loop {
        match resolve(&application.overrides(), active) {
            Resolution::Verdict(verdict) => break verdict,
            Resolution::InvalidOverride(name) => {
                warn!(
                    application = %application.key(),
                    policy = %name,
                    "removing override for inactive rollout block"
                );
                let corrected = remove_override(application.override_declaration(), &name);
                application.set_override_declaration(corrected);
                sync_rollout_block_condition(active, &mut application.status);
                changed = true;
                removed_overrides.push(name);
            }
        }
    };

    Evaluation {
        application,
        verdict,
        removed_overrides,
        changed,
    }
}

/// What happened to the application in the store during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Nothing changed; no write was attempted.
    Unchanged,
    /// The updated application was stored.
    Written,
    /// Every attempt conflicted; the next pass will try again.
    Abandoned,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Latest known application (the stored copy when written).
    pub application: Application,
    pub verdict: Verdict,
    pub removed_overrides: Vec<String>,
    pub write: WriteOutcome,
}

/// Drives reconciliation passes against a store and an event sink.
pub struct RolloutBlockController<S> {
    store: S,
    config: ControllerConfig,
}

impl<S: ApplicationStore + EventRecorder> RolloutBlockController<S> {
    pub fn new(store: S, config: ControllerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconciliation pass for `app`.
    pub fn reconcile(
        &self,
        app: &Application,
        namespace_policies: &[BlockingPolicy],
        cluster_policies: &[BlockingPolicy],
    ) -> RolloutResult<Reconciliation> {
        let active = ActivePolicySet::new(namespace_policies, cluster_policies);
        let key = app.key();
        let max_attempts = self.config.max_update_attempts.max(1);
        let mut current = app.clone();
        let mut attempt = 1;

        let (evaluation, write) = loop {
            let evaluation = evaluate(&current, &active);
            if !evaluation.changed {
                break (evaluation, WriteOutcome::Unchanged);
            }

            match self.store.update_application(&evaluation.application) {
                Ok(stored) => {
                    debug!(application = %key, version = stored.resource_version, attempt, "application written");
                    let evaluation = Evaluation {
                        application: stored,
                        ..evaluation
                    };
                    break (evaluation, WriteOutcome::Written);
                }
                Err(e) if e.is_conflict() => {
                    if attempt >= max_attempts {
                        error!(
                            application = %key,
                            attempts = attempt,
                            error = %e,
                            "giving up on application update for this pass"
                        );
                        break (evaluation, WriteOutcome::Abandoned);
                    }
                    debug!(application = %key, attempt, "update conflicted, re-reading application");
                    current = self
                        .store
                        .get_application(&app.namespace, &app.name)?
                        .ok_or_else(|| RolloutError::ApplicationNotFound(key.clone()))?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.notify(&evaluation);

        Ok(Reconciliation {
            application: evaluation.application,
            verdict: evaluation.verdict,
            removed_overrides: evaluation.removed_overrides,
            write,
        })
    }

    /// Run a pass and return only whether the release is held.
    pub fn should_block_rollout(
        &self,
        app: &Application,
        namespace_policies: &[BlockingPolicy],
        cluster_policies: &[BlockingPolicy],
    ) -> RolloutResult<bool> {
        Ok(self
            .reconcile(app, namespace_policies, cluster_policies)?
            .verdict
            .blocked)
    }

    /// Record the pass's notification, if any.
    fn notify(&self, evaluation: &Evaluation) {
        if !self.config.emit_events {
            return;
        }
        let app = &evaluation.application;
        let verdict = &evaluation.verdict;
        if verdict.blocked {
            info!(application = %app.key(), blocking = ?verdict.blocking, "rollout blocked");
            self.store.record(ApplicationEvent::warning(
                app,
                REASON_ROLLOUT_BLOCK,
                &verdict.message,
            ));
        } else if !app.override_declaration().is_empty() {
            info!(application = %app.key(), overridden = ?verdict.overridden, "overriding rollout blocks");
            self.store.record(ApplicationEvent::normal(
                app,
                REASON_OVERRIDING_ROLLOUT_BLOCK,
                app.override_declaration(),
            ));
        }
    }
}

impl RolloutBlockController<StateStore> {
    /// Load an application and its active policies from the store, then
    /// run a pass.
    pub fn reconcile_application(&self, namespace: &str, name: &str) -> RolloutResult<Reconciliation> {
        let app = self
            .store
            .get_application(namespace, name)?
            .ok_or_else(|| RolloutError::ApplicationNotFound(format!("{namespace}/{name}")))?;
        let namespace_policies = self.store.list_namespace_policies(namespace)?;
        let cluster_policies = self.store.list_cluster_policies()?;
        self.reconcile(&app, &namespace_policies, &cluster_policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipgate_core::{ConditionStatus, ConditionType, EventType};

    fn app_with_overrides(declaration: &str) -> Application {
        let mut app = Application::new("default", "api");
        app.set_override_declaration(declaration.to_string());
        app
    }

    fn controller() -> RolloutBlockController<StateStore> {
        let store = StateStore::open_in_memory().unwrap();
        RolloutBlockController::new(store, ControllerConfig::default())
    }

    // ── evaluate ───────────────────────────────────────────────────

    #[test]
    fn evaluate_blocks_without_overrides() {
        let active = ActivePolicySet::new(&[], &[BlockingPolicy::cluster("maintenance")]);
        let eval = evaluate(&app_with_overrides(""), &active);

        assert!(eval.verdict.blocked);
        assert!(eval.verdict.message.contains("maintenance"));
        assert!(eval.changed);
        let cond = eval
            .application
            .status
            .condition(ConditionType::RolloutBlock)
            .unwrap();
        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.message.as_deref(), Some("maintenance"));
    }

    #[test]
    fn evaluate_override_keeps_condition_active() {
        let active = ActivePolicySet::new(&[], &[BlockingPolicy::cluster("maintenance")]);
        let eval = evaluate(&app_with_overrides("maintenance"), &active);

        assert!(!eval.verdict.blocked);
        let cond = eval
            .application
            .status
            .condition(ConditionType::RolloutBlock)
            .unwrap();
        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.message.as_deref(), Some("maintenance"));
    }

    #[test]
    fn evaluate_removes_invalid_override_then_blocks() {
        let active = ActivePolicySet::new(
            &[BlockingPolicy::namespaced("default", "a")],
            &[BlockingPolicy::cluster("b")],
        );
        let eval = evaluate(&app_with_overrides("a,c"), &active);

        assert_eq!(eval.removed_overrides, vec!["c"]);
        assert_eq!(eval.application.override_declaration(), "a");
        assert!(eval.verdict.blocked);
        assert_eq!(eval.verdict.blocking, vec!["b"]);
    }

    #[test]
    fn evaluate_removes_several_invalid_overrides() {
        let active = ActivePolicySet::new(&[], &[BlockingPolicy::cluster("b")]);
        let eval = evaluate(&app_with_overrides("z,b,x"), &active);

        assert_eq!(eval.removed_overrides, vec!["x", "z"]);
        assert_eq!(eval.application.override_declaration(), "b");
        assert!(!eval.verdict.blocked);
    }

    #[test]
    fn evaluate_without_policies_keeps_stale_override() {
        let eval = evaluate(&app_with_overrides("stale"), &ActivePolicySet::default());

        assert!(!eval.verdict.blocked);
        assert!(eval.removed_overrides.is_empty());
        assert_eq!(eval.application.override_declaration(), "stale");
        let cond = eval
            .application
            .status
            .condition(ConditionType::RolloutBlock)
            .unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
    }

    #[test]
    fn evaluate_normalises_valid_declaration() {
        let active = ActivePolicySet::new(
            &[BlockingPolicy::namespaced("default", "a")],
            &[BlockingPolicy::cluster("b")],
        );
        let eval = evaluate(&app_with_overrides("b,a,,a"), &active);

        assert!(eval.changed);
        assert!(eval.removed_overrides.is_empty());
        assert_eq!(eval.application.override_declaration(), "a,b");
        assert!(!eval.verdict.blocked);

        let again = evaluate(&eval.application, &active);
        assert!(!again.changed);
    }

    #[test]
    fn evaluate_leaves_missing_annotation_alone() {
        let eval = evaluate(&Application::new("default", "api"), &ActivePolicySet::default());
        assert!(eval.application.annotations.is_empty());
    }

    #[test]
    fn evaluate_twice_is_stable() {
        let active = ActivePolicySet::new(&[], &[BlockingPolicy::cluster("freeze")]);
        let first = evaluate(&app_with_overrides(""), &active);
        let second = evaluate(&first.application, &active);

        assert!(!second.changed);
        assert_eq!(second.application, first.application);
    }

    // ── reconcile against StateStore ───────────────────────────────

    #[test]
    fn reconcile_writes_condition_and_warns() {
        let ctl = controller();
        let app = ctl.store().create_application(&app_with_overrides("")).unwrap();
        ctl.store()
            .put_policy(&BlockingPolicy::cluster("maintenance"))
            .unwrap();

        let result = ctl.reconcile_application("default", "api").unwrap();
        assert!(result.verdict.blocked);
        assert_eq!(result.write, WriteOutcome::Written);
        assert_eq!(result.application.resource_version, app.resource_version + 1);

        let events = ctl.store().list_events("default/api", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Warning);
        assert_eq!(events[0].reason, REASON_ROLLOUT_BLOCK);
    }

    #[test]
    fn reconcile_unchanged_skips_write() {
        let ctl = controller();
        ctl.store().create_application(&app_with_overrides("")).unwrap();

        let first = ctl.reconcile_application("default", "api").unwrap();
        assert_eq!(first.write, WriteOutcome::Written);

        let second = ctl.reconcile_application("default", "api").unwrap();
        assert_eq!(second.write, WriteOutcome::Unchanged);
        assert_eq!(second.application.resource_version, 2);
        // Unblocked with no overrides: no notification.
        assert!(ctl.store().list_events("default/api", 10).unwrap().is_empty());
    }

    #[test]
    fn reconcile_override_records_normal_event() {
        let ctl = controller();
        ctl.store()
            .create_application(&app_with_overrides("maintenance"))
            .unwrap();
        ctl.store()
            .put_policy(&BlockingPolicy::namespaced("default", "maintenance"))
            .unwrap();

        let result = ctl.reconcile_application("default", "api").unwrap();
        assert!(!result.verdict.blocked);

        let events = ctl.store().list_events("default/api", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Normal);
        assert_eq!(events[0].reason, REASON_OVERRIDING_ROLLOUT_BLOCK);
        assert_eq!(events[0].message, "maintenance");
    }

    #[test]
    fn reconcile_ignores_other_namespaces() {
        let ctl = controller();
        ctl.store().create_application(&app_with_overrides("")).unwrap();
        ctl.store()
            .put_policy(&BlockingPolicy::namespaced("other", "freeze"))
            .unwrap();

        let result = ctl.reconcile_application("default", "api").unwrap();
        assert!(!result.verdict.blocked);
    }

    #[test]
    fn reconcile_missing_application() {
        let ctl = controller();
        let err = ctl.reconcile_application("default", "ghost").unwrap_err();
        assert!(matches!(err, RolloutError::ApplicationNotFound(ref k) if k == "default/ghost"));
    }

    #[test]
    fn events_can_be_disabled() {
        let store = StateStore::open_in_memory().unwrap();
        let ctl = RolloutBlockController::new(
            store,
            ControllerConfig {
                emit_events: false,
                ..Default::default()
            },
        );
        ctl.store().create_application(&app_with_overrides("")).unwrap();
        ctl.store().put_policy(&BlockingPolicy::cluster("freeze")).unwrap();

        assert!(ctl.reconcile_application("default", "api").unwrap().verdict.blocked);
        assert!(ctl.store().list_events("default/api", 10).unwrap().is_empty());
    }
}
