//! Entity trait: records whose identity survives updates.

/// Entity marker + minimal interface.
///
/// Products, alerts and configuration parameters are entities; movements and
/// audit entries are append-only facts and only carry an id.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Human-readable label used in audit details (e.g. `product 'Widget'`).
    fn audit_label(&self) -> String;
}
