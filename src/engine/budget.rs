//! Response byte-budget enforcement
//!
//! Keeps the longest prefix of a result set whose cumulative serialized size
//! fits the caller's context budget. Deterministic for a given input and
//! budget: continuation tokens depend on the cut point being reproducible.

use super::types::ActivityEvent;
use tracing::debug;

/// Enforces a serialized-size budget on a response
#[derive(Debug, Clone, Copy)]
pub struct BudgetTruncator {
    byte_budget: usize,
}

impl BudgetTruncator {
    pub fn new(byte_budget: usize) -> Self {
        Self { byte_budget }
    }

    /// Serialized size of one event as it will appear on the wire
    pub fn serialized_size(event: &ActivityEvent) -> usize {
        serde_json::to_vec(event).map(|b| b.len()).unwrap_or(usize::MAX)
    }

    /// Keep the longest prefix within budget.
    ///
    /// Returns the kept events and whether any were dropped.
    pub fn truncate(&self, events: Vec<ActivityEvent>) -> (Vec<ActivityEvent>, bool) {
        let total = events.len();
        let mut used = 0usize;
        let mut kept = Vec::with_capacity(events.len());

        for event in events {
            let size = Self::serialized_size(&event);
            match used.checked_add(size) {
                Some(next) if next <= self.byte_budget => {
                    used = next;
                    kept.push(event);
                }
                _ => break,
            }
        }

        let truncated = kept.len() < total;
        if truncated {
            debug!(
                kept = kept.len(),
                dropped = total - kept.len(),
                budget_bytes = self.byte_budget,
                "response truncated to fit byte budget"
            );
        }
        (kept, truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> ActivityEvent {
        ActivityEvent {
            event_id: id.to_string(),
            event_time: None,
            event_name: "ConsoleLogin".to_string(),
            event_source: "signin.amazonaws.com".to_string(),
            actor_identity: "alice".to_string(),
            source_ip: None,
            aws_region: None,
            resources: vec![],
            raw_payload: None,
            read_only: true,
        }
    }

    #[test]
    fn test_everything_fits() {
        let truncator = BudgetTruncator::new(1 << 20);
        let (kept, truncated) = truncator.truncate(vec![event("a"), event("b")]);
        assert_eq!(kept.len(), 2);
        assert!(!truncated);
    }

    #[test]
    fn test_prefix_kept_in_order() {
        let one = BudgetTruncator::serialized_size(&event("a"));
        let truncator = BudgetTruncator::new(one * 2 + 1);
        let (kept, truncated) = truncator.truncate(vec![event("a"), event("b"), event("c")]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].event_id, "a");
        assert_eq!(kept[1].event_id, "b");
        assert!(truncated);
    }

    #[test]
    fn test_zero_budget_keeps_nothing() {
        let truncator = BudgetTruncator::new(0);
        let (kept, truncated) = truncator.truncate(vec![event("a")]);
        assert!(kept.is_empty());
        assert!(truncated);
    }

    #[test]
    fn test_empty_input_is_not_truncated() {
        let truncator = BudgetTruncator::new(0);
        let (kept, truncated) = truncator.truncate(vec![]);
        assert!(kept.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn test_deterministic_across_invocations() {
        let events: Vec<ActivityEvent> = (0..50).map(|i| event(&format!("ev-{}", i))).collect();
        let truncator = BudgetTruncator::new(BudgetTruncator::serialized_size(&events[0]) * 7);

        let (first_kept, first_flag) = truncator.truncate(events.clone());
        for _ in 0..10 {
            let (kept, flag) = truncator.truncate(events.clone());
            assert_eq!(kept.len(), first_kept.len());
            assert_eq!(flag, first_flag);
            for (a, b) in kept.iter().zip(first_kept.iter()) {
                assert_eq!(a.event_id, b.event_id);
            }
        }
    }
}
