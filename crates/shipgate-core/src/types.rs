//! Shared types used across Shipgate crates.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Application annotation holding the override declaration.
pub const OVERRIDE_ANNOTATION: &str = "shipgate.dev/rollout-blocks-override";

/// Event reason for a release held by one or more blocking policies.
pub const REASON_ROLLOUT_BLOCK: &str = "RolloutBlock";

/// Event reason for a release proceeding because its blocks are overridden.
pub const REASON_OVERRIDING_ROLLOUT_BLOCK: &str = "OverridingRolloutBlock";

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── Blocking policies ─────────────────────────────────────────────

/// Where a blocking policy applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "namespace", rename_all = "snake_case")]
pub enum PolicyScope {
    /// Applies to every application in one namespace.
    Namespace(String),
    /// Applies to every application in the cluster.
    Cluster,
}

impl PolicyScope {
    pub fn label(&self) -> String {
        match self {
            PolicyScope::Namespace(ns) => format!("namespace:{ns}"),
            PolicyScope::Cluster => "cluster".to_string(),
        }
    }
}

/// A named rule that holds releases until removed or overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingPolicy {
    /// Identity used for override matching (exact, case-sensitive).
    pub name: String,
    pub scope: PolicyScope,
    /// Free-form reason given by whoever created the block.
    pub message: Option<String>,
    /// Unix timestamp (seconds) when this policy was created.
    pub created_at: u64,
}

impl BlockingPolicy {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: PolicyScope::Namespace(namespace.to_string()),
            message: None,
            created_at: unix_now(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: PolicyScope::Cluster,
            message: None,
            created_at: unix_now(),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Build the key for the policy tables.
    pub fn table_key(&self) -> String {
        match &self.scope {
            PolicyScope::Namespace(ns) => format!("{ns}/{}", self.name),
            PolicyScope::Cluster => self.name.clone(),
        }
    }
}

// ── Override declaration ──────────────────────────────────────────

/// Set of policy names an application owner asked to bypass.
///
/// The annotation form is a comma-joined string; this is the parsed form.
/// Segments are matched exactly, so no whitespace trimming happens here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    names: BTreeSet<String>,
}

impl OverrideSet {
    /// Parse an annotation value. Empty segments and duplicates are dropped.
    pub fn parse(declaration: &str) -> Self {
        let names = declaration
            .split(',')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    /// Sorted, comma-joined annotation value. Empty when no names remain.
    pub fn to_annotation(&self) -> String {
        self.names
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Remove `name`. Returns true if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

impl<S: Into<String>> FromIterator<S> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }
}

// ── Application ───────────────────────────────────────────────────

/// The release-owning entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    /// Bumped by the store on every successful write.
    #[serde(default)]
    pub resource_version: u64,
}

impl Application {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            annotations: BTreeMap::new(),
            status: ApplicationStatus::default(),
            resource_version: 0,
        }
    }

    /// Build the composite key for the applications table.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Raw override annotation value, or `""` when absent.
    pub fn override_declaration(&self) -> &str {
        self.annotations
            .get(OVERRIDE_ANNOTATION)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_override_declaration(&mut self, declaration: String) {
        self.annotations
            .insert(OVERRIDE_ANNOTATION.to_string(), declaration);
    }

    pub fn overrides(&self) -> OverrideSet {
        OverrideSet::parse(self.override_declaration())
    }
}

/// Observed state of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    #[serde(default)]
    pub conditions: Vec<ApplicationCondition>,
}

impl ApplicationStatus {
    pub fn condition(&self, condition_type: ConditionType) -> Option<&ApplicationCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// Condition tags an application can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Blocked by one or more active blocking policies.
    RolloutBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_bool(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// A single entry in the application's condition list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Unix timestamp of the last change to this entry.
    pub last_transition_time: u64,
}

// ── Events ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Normal,
    Warning,
}

/// A human-readable notification attached to an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    /// Application key (`{namespace}/{name}`).
    pub application: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub timestamp: u64,
}

impl ApplicationEvent {
    pub fn warning(app: &Application, reason: &str, message: &str) -> Self {
        Self::new(app, EventType::Warning, reason, message)
    }

    pub fn normal(app: &Application, reason: &str, message: &str) -> Self {
        Self::new(app, EventType::Normal, reason, message)
    }

    fn new(app: &Application, event_type: EventType, reason: &str, message: &str) -> Self {
        Self {
            application: app.key(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: unix_now(),
        }
    }
}
