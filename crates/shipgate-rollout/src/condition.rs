//! `RolloutBlock` status condition upkeep.
//!
//! The condition mirrors the active policy set, whether or not those
//! policies are overridden.

use shipgate_core::{
    ApplicationCondition, ApplicationStatus, ConditionStatus, ConditionType, unix_now,
};
use tracing::debug;

use crate::resolver::ActivePolicySet;

const REASON_BLOCKED: &str = "RolloutBlocksActive";
const REASON_CLEAR: &str = "NoRolloutBlocks";

/// Build the `RolloutBlock` condition for the given active set.
pub fn rollout_block_condition(active: &ActivePolicySet) -> ApplicationCondition {
    let names = active.names().collect::<Vec<_>>().join(",");
    let blocked = !names.is_empty();
    ApplicationCondition {
        condition_type: ConditionType::RolloutBlock,
        status: ConditionStatus::from_bool(blocked),
        reason: Some(if blocked { REASON_BLOCKED } else { REASON_CLEAR }.to_string()),
        message: blocked.then_some(names),
        last_transition_time: unix_now(),
    }
}

/// Upsert `condition` by type. Returns true if the status changed.
///
/// An existing entry with the same status, reason and message is left
/// untouched, transition time included.
pub fn set_condition(status: &mut ApplicationStatus, condition: ApplicationCondition) -> bool {
    match status
        .conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    {
        Some(existing) => {
            if existing.status == condition.status
                && existing.reason == condition.reason
                && existing.message == condition.message
            {
                return false;
            }
            *existing = condition;
        }
        None => status.conditions.push(condition),
    }
    true
}

/// Refresh the `RolloutBlock` condition from the active policies.
/// Returns true if the status changed.
pub fn sync_rollout_block_condition(active: &ActivePolicySet, status: &mut ApplicationStatus) -> bool {
    let condition = rollout_block_condition(active);
    let changed = set_condition(status, condition);
    if changed {
        debug!(active = active.len(), "rollout block condition updated");
    }
    changed
}
