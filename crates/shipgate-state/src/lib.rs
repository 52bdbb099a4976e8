//! shipgate-state — embedded resource store for Shipgate.
//!
//! Backed by [redb](https://docs.rs/redb), holds applications, namespace- and
//! cluster-scoped blocking policies, and the notification events recorded
//! against applications.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{namespace}/{name}`, `{application}:{seq}`) enable
//! prefix scans for related records.
//!
//! Application writes are optimistic: [`StateStore::update_application`]
//! rejects a write whose `resource_version` is stale with
//! [`StateError::Conflict`], and callers re-read before retrying.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
