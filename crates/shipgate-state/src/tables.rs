//! redb table definitions for the Shipgate resource store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Applications keyed by `{namespace}/{name}`.
pub const APPLICATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("applications");

/// Namespace-scoped blocking policies keyed by `{namespace}/{name}`.
pub const NAMESPACE_POLICIES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("namespace_policies");

/// Cluster-scoped blocking policies keyed by `{name}`.
pub const CLUSTER_POLICIES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("cluster_policies");

/// Application events keyed by `{namespace}/{name}:{seq}` (seq zero-padded).
pub const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// Shape shared by every table: string key, JSON bytes value.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;
