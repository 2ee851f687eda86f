//! Per-resource sequence numbers.

use std::collections::HashMap;

use super::Resource;

/// Issues and checks per-resource sequence numbers.
///
/// Every fetch is tagged when it is issued. A completion is applied only if
/// its tag is newer than the last tag applied for the same resource, so an
/// older fetch that finishes late can never overwrite a newer one.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    slots: HashMap<Resource, Slot>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    issued: u64,
    applied: u64,
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag a new fetch of `resource`.
    pub fn issue(&mut self, resource: &Resource) -> u64 {
        let slot = self.slots.entry(resource.clone()).or_default();
        slot.issued += 1;
        slot.issued
    }

    /// Record a completion. Returns `false` if `seq` is not newer than the
    /// last applied completion for `resource`.
    pub fn accept(&mut self, resource: &Resource, seq: u64) -> bool {
        let slot = self.slots.entry(resource.clone()).or_default();
        if seq <= slot.applied {
            return false;
        }
        slot.applied = seq;
        true
    }

    /// Last applied tag for `resource` (0 if none).
    #[must_use]
    pub fn applied(&self, resource: &Resource) -> u64 {
        self.slots.get(resource).map_or(0, |s| s.applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_completion_is_rejected() {
        let mut tracker = SequenceTracker::new();
        let a = tracker.issue(&Resource::Patients);
        let b = tracker.issue(&Resource::Patients);
        assert!(tracker.accept(&Resource::Patients, b));
        assert!(!tracker.accept(&Resource::Patients, a));
        assert_eq!(tracker.applied(&Resource::Patients), b);
    }

    #[test]
    fn test_resources_are_independent() {
        let mut tracker = SequenceTracker::new();
        let p1 = tracker.issue(&Resource::Patients);
        let p2 = tracker.issue(&Resource::Patients);
        let a1 = tracker.issue(&Resource::Analytics);
        assert_eq!(a1, 1);
        assert!(tracker.accept(&Resource::Patients, p2));
        assert!(tracker.accept(&Resource::Analytics, a1));
        assert!(!tracker.accept(&Resource::Patients, p1));
    }

    #[test]
    fn test_same_seq_twice_is_rejected() {
        let mut tracker = SequenceTracker::new();
        let seq = tracker.issue(&Resource::RedCases);
        assert!(tracker.accept(&Resource::RedCases, seq));
        assert!(!tracker.accept(&Resource::RedCases, seq));
    }
}
