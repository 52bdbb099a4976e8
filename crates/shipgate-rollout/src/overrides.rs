//! Override annotation cleanup.

use shipgate_core::OverrideSet;

/// Remove every occurrence of `name` from an override declaration.
///
/// The result is sorted and comma-joined, or empty when nothing remains.
pub fn remove_override(declaration: &str, name: &str) -> String {
    let mut overrides = OverrideSet::parse(declaration);
    overrides.remove(name);
    overrides.to_annotation()
}
