//! Shipgate rollout blocks — decide whether a release is held.
//!
//! Given an application and the blocking policies active for its namespace
//! and the cluster, this crate decides whether the release must wait, keeps
//! the application's override declaration free of stale names, and keeps its
//! `RolloutBlock` status condition in line with the active policies.
//!
//! # Components
//!
//! - **`resolver`** — Override resolution (blocked/unblocked verdict, invalid overrides)
//! - **`overrides`** — Removal of invalid names from the override annotation
//! - **`condition`** — `RolloutBlock` status condition upkeep
//! - **`controller`** — One reconciliation pass: evaluate, persist with retry, notify

pub mod condition;
pub mod controller;
pub mod error;
pub mod overrides;
pub mod resolver;
pub mod store;

pub use condition::sync_rollout_block_condition;
pub use controller::{Evaluation, Reconciliation, RolloutBlockController, WriteOutcome, evaluate};
pub use error::{RolloutError, RolloutResult};
pub use overrides::remove_override;
pub use resolver::{ActivePolicySet, Resolution, Verdict, resolve};
pub use store::{ApplicationStore, EventRecorder};
