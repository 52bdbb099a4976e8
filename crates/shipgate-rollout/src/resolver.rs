//! Override resolution — decides whether active blocking policies hold a release.
//!
//! The resolver is a pure function over an override declaration and the
//! active policy set. It never mutates anything; an override naming a policy
//! that is not active comes back as [`Resolution::InvalidOverride`] so the
//! caller can clean the declaration and ask again.

use std::collections::BTreeSet;

use shipgate_core::{BlockingPolicy, OverrideSet};
use tracing::debug;

/// Union of the namespace-scoped and cluster-scoped policies in effect
/// for one application.
#[derive(Debug, Clone, Default)]
pub struct ActivePolicySet {
    policies: Vec<BlockingPolicy>,
    names: BTreeSet<String>,
}

impl ActivePolicySet {
    pub fn new(namespace_policies: &[BlockingPolicy], cluster_policies: &[BlockingPolicy]) -> Self {
        let policies: Vec<BlockingPolicy> = namespace_policies
            .iter()
            .chain(cluster_policies)
            .cloned()
            .collect();
        let names = policies.iter().map(|p| p.name.clone()).collect();
        Self { policies, names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Number of distinct policy names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Distinct policy names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn policies(&self) -> &[BlockingPolicy] {
        &self.policies
    }
}

/// Outcome of resolving an override declaration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Verdict {
    pub blocked: bool,
    /// Human-readable explanation. Empty when no policy is active.
    pub message: String,
    /// Active policies not covered by an override, alphabetical.
    pub blocking: Vec<String>,
    /// Active policies covered by an override, alphabetical.
    pub overridden: Vec<String>,
}

impl Verdict {
    /// Verdict for an application with no active policies.
    pub fn unblocked() -> Self {
        Self {
            blocked: false,
            message: String::new(),
            blocking: Vec::new(),
            overridden: Vec::new(),
        }
    }
}

/// Result of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Verdict(Verdict),
    /// The declaration names a policy that is not active. Only the first
    /// such name (alphabetically) is reported per call.
    InvalidOverride(String),
}

/// Resolve `declaration` against the active policy set.
pub fn resolve(declaration: &OverrideSet, active: &ActivePolicySet) -> Resolution {
    if active.is_empty() {
        return Resolution::Verdict(Verdict::unblocked());
    }

    if let Some(invalid) = declaration.iter().find(|name| !active.contains(name)) {
        debug!(policy = %invalid, "override names an inactive policy");
        return Resolution::InvalidOverride(invalid.to_string());
    }

    let (overridden, blocking): (Vec<String>, Vec<String>) = active
        .names()
        .map(str::to_string)
        .partition(|name| declaration.contains(name));

    let verdict = if blocking.is_empty() {
        Verdict {
            blocked: false,
            message: format!("overriding rollout blocks: {}", overridden.join(",")),
            blocking,
            overridden,
        }
    } else {
        Verdict {
            blocked: true,
            message: format!("rollout blocked by policies: {}", blocking.join(",")),
            blocking,
            overridden,
        }
    };
    Resolution::Verdict(verdict)
}
