//! StateStore — redb-backed persistence for Shipgate.
//!
//! Provides typed operations over applications, blocking policies, and
//! application events. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use tracing::debug;

use shipgate_core::{Application, ApplicationEvent, BlockingPolicy, PolicyScope};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        txn.open_table(NAMESPACE_POLICIES).map_err(map_err!(Table))?;
        txn.open_table(CLUSTER_POLICIES).map_err(map_err!(Table))?;
        txn.open_table(EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic helpers ────────────────────────────────────────────

    fn get_json<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Scan a table, keeping values whose key starts with `prefix`.
    fn scan_json<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let item: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    fn remove_key(&self, def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Applications ───────────────────────────────────────────────

    /// Insert a new application at resource version 1.
    pub fn create_application(&self, app: &Application) -> StateResult<Application> {
        validate_segment("namespace", &app.namespace)?;
        validate_segment("application name", &app.name)?;
        let key = app.key();
        let mut stored = app.clone();
        stored.resource_version = 1;
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(key));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "application created");
        Ok(stored)
    }

    /// Get an application by namespace and name.
    pub fn get_application(&self, namespace: &str, name: &str) -> StateResult<Option<Application>> {
        self.get_json(APPLICATIONS, &format!("{namespace}/{name}"))
    }

    /// List all applications.
    pub fn list_applications(&self) -> StateResult<Vec<Application>> {
        self.scan_json(APPLICATIONS, "")
    }

    /// Write an application if its `resource_version` still matches the
    /// stored copy. Returns the stored copy with the bumped version.
    pub fn update_application(&self, app: &Application) -> StateResult<Application> {
        let key = app.key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            let current: Application = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(key)),
            };
            if current.resource_version != app.resource_version {
                return Err(StateError::Conflict {
                    key,
                    expected: app.resource_version,
                    actual: current.resource_version,
                });
            }

            let mut next = app.clone();
            next.resource_version = current.resource_version + 1;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored = next;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version = stored.resource_version, "application updated");
        Ok(stored)
    }

    /// Delete an application. Returns true if it existed.
    pub fn delete_application(&self, namespace: &str, name: &str) -> StateResult<bool> {
        let key = format!("{namespace}/{name}");
        let existed = self.remove_key(APPLICATIONS, &key)?;
        debug!(%key, existed, "application deleted");
        Ok(existed)
    }

    // ── Blocking policies ──────────────────────────────────────────

    /// Insert or update a blocking policy in the table matching its scope.
    pub fn put_policy(&self, policy: &BlockingPolicy) -> StateResult<()> {
        if let PolicyScope::Namespace(ns) = &policy.scope {
            validate_segment("namespace", ns)?;
        }
        validate_segment("policy name", &policy.name)?;
        let key = policy.table_key();
        let value = serde_json::to_vec(policy).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn
                .open_table(policy_table(&policy.scope))
                .map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, scope = %policy.scope.label(), "blocking policy stored");
        Ok(())
    }

    /// Get a blocking policy by scope and name.
    pub fn get_policy(&self, scope: &PolicyScope, name: &str) -> StateResult<Option<BlockingPolicy>> {
        self.get_json(policy_table(scope), &policy_key(scope, name))
    }

    /// Delete a blocking policy. Returns true if it existed.
    pub fn delete_policy(&self, scope: &PolicyScope, name: &str) -> StateResult<bool> {
        let key = policy_key(scope, name);
        let existed = self.remove_key(policy_table(scope), &key)?;
        debug!(%key, existed, "blocking policy deleted");
        Ok(existed)
    }

    /// Policies scoped to exactly `namespace`.
    pub fn list_namespace_policies(&self, namespace: &str) -> StateResult<Vec<BlockingPolicy>> {
        let mut policies: Vec<BlockingPolicy> =
            self.scan_json(NAMESPACE_POLICIES, &format!("{namespace}/"))?;
        policies.retain(|p| matches!(&p.scope, PolicyScope::Namespace(ns) if ns == namespace));
        Ok(policies)
    }

    /// Policies scoped to the whole cluster.
    pub fn list_cluster_policies(&self) -> StateResult<Vec<BlockingPolicy>> {
        self.scan_json(CLUSTER_POLICIES, "")
    }

    /// Every stored policy, namespace-scoped first.
    pub fn list_policies(&self) -> StateResult<Vec<BlockingPolicy>> {
        let mut all = self.scan_json(NAMESPACE_POLICIES, "")?;
        all.extend(self.list_cluster_policies()?);
        Ok(all)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Append an event to its application's history.
    pub fn record_event(&self, event: &ApplicationEvent) -> StateResult<()> {
        validate_application_key(&event.application)?;
        let (start, end) = event_range(&event.application);
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let key;
        {
            let mut table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            // Next sequence number follows the last key in this application's range.
            let seq = match table
                .range(start.as_str()..end.as_str())
                .map_err(map_err!(Read))?
                .next_back()
            {
                Some(entry) => {
                    let (k, _) = entry.map_err(map_err!(Read))?;
                    let last: u64 = k.value()[start.len()..]
                        .parse::<u64>()
                        .map_err(map_err!(Deserialize))?;
                    last + 1
                }
                None => 0,
            };
            key = format!("{start}{seq:010}");
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, reason = %event.reason, "event recorded");
        Ok(())
    }

    /// The newest `limit` events for an application (by `{namespace}/{name}`
    /// key), oldest first.
    pub fn list_events(&self, application: &str, limit: usize) -> StateResult<Vec<ApplicationEvent>> {
        let (start, end) = event_range(application);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut events = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
            .rev()
        {
            if events.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: ApplicationEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if event.application == application {
                events.push(event);
            }
        }
        events.reverse();
        Ok(events)
    }
}

/// Reject values that would collide with the `/` and `:` key separators.
fn validate_segment(kind: &'static str, value: &str) -> StateResult<()> {
    if value.is_empty() || value.contains(['/', ':']) {
        return Err(StateError::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Check a `{namespace}/{name}` application key.
fn validate_application_key(key: &str) -> StateResult<()> {
    match key.split_once('/') {
        Some((namespace, name)) => {
            validate_segment("namespace", namespace)?;
            validate_segment("application name", name)
        }
        None => Err(StateError::InvalidName {
            kind: "application key",
            value: key.to_string(),
        }),
    }
}

/// Key range `[{application}:, {application};)` covering one application's events.
fn event_range(application: &str) -> (String, String) {
    (format!("{application}:"), format!("{application};"))
}

fn policy_table(scope: &PolicyScope) -> JsonTable {
    match scope {
        PolicyScope::Namespace(_) => NAMESPACE_POLICIES,
        PolicyScope::Cluster => CLUSTER_POLICIES,
    }
}

fn policy_key(scope: &PolicyScope, name: &str) -> String {
    match scope {
        PolicyScope::Namespace(ns) => format!("{ns}/{name}"),
        PolicyScope::Cluster => name.to_string(),
    }
}
