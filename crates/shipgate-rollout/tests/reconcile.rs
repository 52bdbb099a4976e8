//! End-to-end reconciliation passes against a real in-memory store,
//! including concurrent writers racing the controller.

use std::cell::{Cell, RefCell};

use shipgate_core::config::ControllerConfig;
use shipgate_core::{
    Application, ApplicationEvent, BlockingPolicy, ConditionStatus, ConditionType, EventType,
};
use shipgate_rollout::{ApplicationStore, EventRecorder, RolloutBlockController, WriteOutcome};
use shipgate_state::{StateResult, StateStore};

/// Store wrapper that lets another writer sneak in before the controller's
/// next `conflicts` updates, forcing a version conflict each time.
struct RacingStore {
    inner: StateStore,
    conflicts: Cell<u32>,
    update_calls: Cell<u32>,
    events: RefCell<Vec<ApplicationEvent>>,
}

impl RacingStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: StateStore::open_in_memory().unwrap(),
            conflicts: Cell::new(conflicts),
            update_calls: Cell::new(0),
            events: RefCell::new(Vec::new()),
        }
    }
}

impl ApplicationStore for RacingStore {
    fn get_application(&self, namespace: &str, name: &str) -> StateResult<Option<Application>> {
        self.inner.get_application(namespace, name)
    }

    fn update_application(&self, app: &Application) -> StateResult<Application> {
        self.update_calls.set(self.update_calls.get() + 1);
        if self.conflicts.get() > 0 {
            self.conflicts.set(self.conflicts.get() - 1);
            let mut theirs = self.inner.get_application(&app.namespace, &app.name)?.unwrap();
            theirs
                .annotations
                .insert("owner".to_string(), format!("team-{}", self.update_calls.get()));
            self.inner.update_application(&theirs)?;
        }
        self.inner.update_application(app)
    }
}

impl EventRecorder for RacingStore {
    fn record(&self, event: ApplicationEvent) {
        self.events.borrow_mut().push(event);
    }
}

fn app(declaration: &str) -> Application {
    let mut app = Application::new("default", "api");
    app.set_override_declaration(declaration.to_string());
    app
}

#[test]
fn invalid_override_is_removed_and_persisted() {
    let store = StateStore::open_in_memory().unwrap();
    let ctl = RolloutBlockController::new(store, ControllerConfig::default());
    ctl.store().create_application(&app("a,c")).unwrap();
    ctl.store()
        .put_policy(&BlockingPolicy::namespaced("default", "a"))
        .unwrap();
    ctl.store().put_policy(&BlockingPolicy::cluster("b")).unwrap();

    let first = ctl.reconcile_application("default", "api").unwrap();
    assert_eq!(first.removed_overrides, vec!["c"]);
    assert!(first.verdict.blocked);
    assert_eq!(first.verdict.blocking, vec!["b"]);
    assert_eq!(first.write, WriteOutcome::Written);

    let stored = ctl.store().get_application("default", "api").unwrap().unwrap();
    assert_eq!(stored.override_declaration(), "a");
    let cond = stored.status.condition(ConditionType::RolloutBlock).unwrap();
    assert_eq!(cond.status, ConditionStatus::True);
    assert_eq!(cond.message.as_deref(), Some("a,b"));

    // Next pass: nothing left to correct, still blocked by `b`.
    let second = ctl.reconcile_application("default", "api").unwrap();
    assert!(second.removed_overrides.is_empty());
    assert!(second.verdict.blocked);
    assert_eq!(second.write, WriteOutcome::Unchanged);

    let events = ctl.store().list_events("default/api", 10).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event_type == EventType::Warning));
}

#[test]
fn removing_last_policy_clears_condition() {
    let store = StateStore::open_in_memory().unwrap();
    let ctl = RolloutBlockController::new(store, ControllerConfig::default());
    ctl.store().create_application(&app("")).unwrap();
    ctl.store().put_policy(&BlockingPolicy::cluster("freeze")).unwrap();

    assert!(ctl.reconcile_application("default", "api").unwrap().verdict.blocked);

    ctl.store()
        .delete_policy(&shipgate_core::PolicyScope::Cluster, "freeze")
        .unwrap();
    let result = ctl.reconcile_application("default", "api").unwrap();
    assert!(!result.verdict.blocked);
    assert_eq!(result.write, WriteOutcome::Written);
    let cond = result
        .application
        .status
        .condition(ConditionType::RolloutBlock)
        .unwrap();
    assert_eq!(cond.status, ConditionStatus::False);
    assert!(cond.message.is_none());
}

#[test]
fn conflict_is_retried_on_fresh_copy() {
    let ctl = RolloutBlockController::new(RacingStore::new(1), ControllerConfig::default());
    let created = ctl.store().inner.create_application(&app("")).unwrap();
    let cluster = vec![BlockingPolicy::cluster("maintenance")];

    let result = ctl.reconcile(&created, &[], &cluster).unwrap();
    assert!(result.verdict.blocked);
    assert_eq!(result.write, WriteOutcome::Written);
    assert_eq!(ctl.store().update_calls.get(), 2);

    // The concurrent writer's annotation survives the retry.
    let stored = ctl
        .store()
        .inner
        .get_application("default", "api")
        .unwrap()
        .unwrap();
    assert_eq!(stored.annotations.get("owner").map(String::as_str), Some("team-1"));
    assert!(stored.status.condition(ConditionType::RolloutBlock).is_some());

    assert_eq!(ctl.store().events.borrow().len(), 1);
}

#[test]
fn exhausted_retries_are_not_fatal() {
    let config = ControllerConfig {
        max_update_attempts: 3,
        ..Default::default()
    };
    let ctl = RolloutBlockController::new(RacingStore::new(u32::MAX), config);
    let created = ctl.store().inner.create_application(&app("")).unwrap();
    let cluster = vec![BlockingPolicy::cluster("maintenance")];

    let result = ctl.reconcile(&created, &[], &cluster).unwrap();
    assert!(result.verdict.blocked);
    assert_eq!(result.write, WriteOutcome::Abandoned);
    assert_eq!(ctl.store().update_calls.get(), 3);

    // Still exactly one notification for the pass.
    let events = ctl.store().events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Warning);
}

#[test]
fn override_without_policies_is_kept() {
    let ctl = RolloutBlockController::new(RacingStore::new(0), ControllerConfig::default());
    let created = ctl.store().inner.create_application(&app("stale")).unwrap();

    let blocked = ctl.should_block_rollout(&created, &[], &[]).unwrap();
    assert!(!blocked);

    let stored = ctl
        .store()
        .inner
        .get_application("default", "api")
        .unwrap()
        .unwrap();
    assert_eq!(stored.override_declaration(), "stale");
    let cond = stored.status.condition(ConditionType::RolloutBlock).unwrap();
    assert_eq!(cond.status, ConditionStatus::False);

    let events = ctl.store().events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Normal);
    assert_eq!(events[0].message, "stale");
}
