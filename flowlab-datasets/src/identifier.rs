//! ID generation.
//!
//! Stores, codecs and the generator take an [`IdGenerator`] explicitly
//! instead of sharing a global counter.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of globally unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new id with the given prefix (e.g. `"ds"`, `"dp"`).
    fn next_id(&self, prefix: &str) -> String;
}

/// Time-based ids with a random suffix.
///
/// Ids look like `dp_1718000000000_3f2a9c1b`. They carry no ordering
/// guarantee beyond the millisecond timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdGenerator;

impl DefaultIdGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self
    }
}

impl IdGenerator for DefaultIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &suffix[..8])
    }
}

/// Deterministic counter-based ids (`dp_1`, `dp_2`, ...).
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_ids_are_unique() {
        let ids = DefaultIdGenerator::new();
        let generated: HashSet<String> = (0..100).map(|_| ids.next_id("dp")).collect();
        assert_eq!(generated.len(), 100);
    }

    #[test]
    fn test_default_id_prefix() {
        let id = DefaultIdGenerator::new().next_id("ds");
        assert!(id.starts_with("ds_"));
        assert_eq!(id.split('_').count(), 3);
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id("dp"), "dp_1");
        assert_eq!(ids.next_id("ds"), "ds_2");
    }
}
