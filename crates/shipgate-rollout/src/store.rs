//! I/O seams used by the controller.
//!
//! [`StateStore`] implements both traits; tests substitute their own to
//! simulate concurrent writers.

use shipgate_core::{Application, ApplicationEvent};
use shipgate_state::{StateResult, StateStore};
use tracing::warn;

/// Read/write access to applications with optimistic concurrency.
pub trait ApplicationStore {
    /// Fresh read of an application.
    fn get_application(&self, namespace: &str, name: &str) -> StateResult<Option<Application>>;
    /// Write `app` if its `resource_version` is current; conflicts surface
    /// as [`shipgate_state::StateError::Conflict`].
    fn update_application(&self, app: &Application) -> StateResult<Application>;
}

/// Sink for human-readable notifications.
pub trait EventRecorder {
    fn record(&self, event: ApplicationEvent);
}

impl ApplicationStore for StateStore {
    fn get_application(&self, namespace: &str, name: &str) -> StateResult<Option<Application>> {
        StateStore::get_application(self, namespace, name)
    }

    fn update_application(&self, app: &Application) -> StateResult<Application> {
        StateStore::update_application(self, app)
    }
}

impl EventRecorder for StateStore {
    fn record(&self, event: ApplicationEvent) {
        if let Err(e) = self.record_event(&event) {
            warn!(application = %event.application, reason = %event.reason, error = %e, "failed to record event");
        }
    }
}
