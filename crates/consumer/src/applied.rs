//! Bounded record of line items applied under idempotent retry.

use std::collections::{HashMap, HashSet, VecDeque};

use common::ProductId;

/// Identifies one line item within an event: position and product.
type ItemKey = (usize, ProductId);

/// Applied line items for the most recent `window` events.
///
/// Events are evicted oldest-first once more than `window` distinct event
/// IDs have been recorded. A redelivery of an evicted event is applied again.
#[derive(Debug)]
pub(crate) struct AppliedItems {
    window: usize,
    items: HashMap<String, HashSet<ItemKey>>,
    order: VecDeque<String>,
}

impl AppliedItems {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            items: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn contains(&self, event_id: &str, index: usize, product_id: &ProductId) -> bool {
        self.items
            .get(event_id)
            .is_some_and(|keys| keys.contains(&(index, product_id.clone())))
    }

    pub(crate) fn insert(&mut self, event_id: &str, index: usize, product_id: ProductId) {
        if !self.items.contains_key(event_id) {
            self.order.push_back(event_id.to_string());
            while self.order.len() > self.window {
                if let Some(oldest) = self.order.pop_front() {
                    self.items.remove(&oldest);
                }
            }
        }

        self.items
            .entry(event_id.to_string())
            .or_default()
            .insert((index, product_id));
    }

    /// Number of events currently remembered.
    pub(crate) fn events(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_items_per_event() {
        let mut applied = AppliedItems::new(10);
        applied.insert("e1", 0, ProductId::new("A"));

        assert!(applied.contains("e1", 0, &ProductId::new("A")));
        assert!(!applied.contains("e1", 1, &ProductId::new("A")));
        assert!(!applied.contains("e2", 0, &ProductId::new("A")));
    }

    #[test]
    fn evicts_oldest_event_beyond_window() {
        let mut applied = AppliedItems::new(2);
        applied.insert("e1", 0, ProductId::new("A"));
        applied.insert("e1", 1, ProductId::new("B"));
        applied.insert("e2", 0, ProductId::new("A"));
        applied.insert("e3", 0, ProductId::new("A"));

        assert_eq!(applied.events(), 2);
        assert!(!applied.contains("e1", 0, &ProductId::new("A")));
        assert!(!applied.contains("e1", 1, &ProductId::new("B")));
        assert!(applied.contains("e2", 0, &ProductId::new("A")));
        assert!(applied.contains("e3", 0, &ProductId::new("A")));
    }

    #[test]
    fn more_items_for_a_known_event_do_not_evict() {
        let mut applied = AppliedItems::new(1);
        for index in 0..5 {
            applied.insert("e1", index, ProductId::new("A"));
        }

        assert_eq!(applied.events(), 1);
        assert!(applied.contains("e1", 0, &ProductId::new("A")));
        assert!(applied.contains("e1", 4, &ProductId::new("A")));
    }

    #[test]
    fn stays_bounded_over_many_events() {
        let mut applied = AppliedItems::new(100);
        for n in 0..10_000 {
            applied.insert(&format!("e{n}"), 0, ProductId::new("A"));
        }

        assert_eq!(applied.events(), 100);
        assert!(!applied.contains("e0", 0, &ProductId::new("A")));
        assert!(applied.contains("e9999", 0, &ProductId::new("A")));
    }
}
