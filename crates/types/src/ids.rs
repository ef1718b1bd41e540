//! Newtype wrappers for compile-time identifiers
//!
//! These types keep plan numbers and binding numbers from being mixed up
//! with each other or with plain row indexes.

use std::fmt;

/// Identifies one deduplicated root-level plan within a compiled document.
///
/// Plan IDs are dense and allocated in first-occurrence order, starting at 0.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PlanId(usize);

impl PlanId {
    /// Creates a new PlanId from its dense index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the dense index of this plan
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan#{}", self.0)
    }
}

/// Identifies one `for` binding of a template, numbered in document order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BindingId(usize);

impl BindingId {
    /// Creates a new BindingId from its dense index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the dense index of this binding
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_id_creation() {
        let id1 = PlanId::new(3);
        let id2 = PlanId::new(3);

        assert_eq!(id1, id2);
        assert_eq!(id1.index(), 3);
        assert_eq!(id1.to_string(), "plan#3");
    }

    #[test]
    fn test_ids_order_by_index() {
        let mut ids = vec![BindingId::new(2), BindingId::new(0), BindingId::new(1)];
        ids.sort();

        assert_eq!(ids, vec![BindingId::new(0), BindingId::new(1), BindingId::new(2)]);
        assert_eq!(ids[2].to_string(), "binding#2");
    }

    #[test]
    fn test_hash_map_usage() {
        use std::collections::HashMap;

        let mut fetched = HashMap::new();
        fetched.insert(PlanId::new(0), 42);
        fetched.insert(PlanId::new(1), 100);

        assert_eq!(fetched.get(&PlanId::new(0)), Some(&42));
        assert_eq!(fetched.get(&PlanId::new(2)), None);
    }
}
