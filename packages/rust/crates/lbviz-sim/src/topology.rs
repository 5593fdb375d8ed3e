//! Topology store: ordered targets plus the edges they imply.
//!
//! Pure state, no I/O. Every target owns exactly two edges
//! (balancer -> target, target -> service); both are appended together so the
//! edge set always matches the target set.

use std::collections::{HashMap, HashSet};

use lbviz_types::{Edge, Registration, SimError, SimResult, Target};

/// Immutable copy of the topology for renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    /// Targets in insertion order.
    pub targets: Vec<Target>,
    /// Edges in insertion order.
    pub edges: Vec<Edge>,
}

/// Append-only set of targets and their edges.
#[derive(Debug, Clone, Default)]
pub struct TopologyStore {
    targets: Vec<Target>,
    edges: Vec<Edge>,
    used_indices: HashSet<u32>,
}

impl TopologyStore {
    /// Empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology seeded with `ip1..=ip{count}`, already known to the decision service.
    #[must_use]
    pub fn with_initial_targets(count: u32) -> Self {
        let mut store = Self::new();
        for display_index in 1..=count {
            // Fresh store and distinct indices: insertion cannot collide.
            let _ = store.insert(display_index, Registration::Confirmed);
        }
        store
    }

    /// Append a target with zero selections and its two edges.
    ///
    /// # Errors
    /// Returns `SimError::DuplicateId` if `display_index` is already used; the
    /// store is left unchanged.
    pub fn add_target(&mut self, display_index: u32) -> SimResult<Target> {
        self.insert(display_index, Registration::Pending)
    }

    fn insert(&mut self, display_index: u32, registration: Registration) -> SimResult<Target> {
        if self.used_indices.contains(&display_index) {
            return Err(SimError::DuplicateId(Target::id_for(display_index)));
        }
        let target = Target::new(display_index, registration);
        self.edges.extend(Edge::implied_by(&target.id));
        self.used_indices.insert(display_index);
        self.targets.push(target.clone());
        Ok(target)
    }

    /// Index the next "add target" action uses: target count + 1, skipping
    /// indices already taken by explicit adds.
    #[must_use]
    pub fn next_display_index(&self) -> u32 {
        let mut candidate = u32::try_from(self.targets.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        while self.used_indices.contains(&candidate) {
            candidate = candidate.saturating_add(1);
        }
        candidate
    }

    /// Apply one decision.
    ///
    /// Counts come from `counts_by_target`; a target missing from the map keeps
    /// its current count. Only the target matching `target_id`
    /// (case-insensitive) is highlighted. Returns whether a target matched.
    pub fn apply_decision(&mut self, target_id: &str, counts_by_target: &HashMap<String, u64>) -> bool {
        let mut matched = false;
        for target in &mut self.targets {
            if let Some(count) = lookup_count(counts_by_target, &target.id) {
                target.selection_count = count;
            }
            target.highlighted = target.id.eq_ignore_ascii_case(target_id);
            matched |= target.highlighted;
        }
        matched
    }

    /// Un-highlight every target.
    pub fn clear_highlights(&mut self) {
        for target in &mut self.targets {
            target.highlighted = false;
        }
    }

    /// Record the registration outcome for `id`. Returns false for unknown ids.
    pub fn set_registration(&mut self, id: &str, registration: Registration) -> bool {
        match self.targets.iter_mut().find(|target| target.id == id) {
            Some(target) => {
                target.registration = registration;
                true
            }
            None => false,
        }
    }

    /// Look up a target by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|target| target.id == id)
    }

    /// Targets in insertion order.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when no target exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Copy for renderers.
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            targets: self.targets.clone(),
            edges: self.edges.clone(),
        }
    }
}

fn lookup_count(counts: &HashMap<String, u64>, id: &str) -> Option<u64> {
    counts.get(id).copied().or_else(|| {
        counts
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(_, count)| *count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbviz_types::NodeRef;

    fn counts(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_initial_targets_are_confirmed() {
        let store = TopologyStore::with_initial_targets(3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.edges().len(), 6);
        let ids: Vec<&str> = store.targets().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["ip1", "ip2", "ip3"]);
        assert!(
            store
                .targets()
                .iter()
                .all(|t| t.registration == Registration::Confirmed)
        );
    }

    #[test]
    fn test_edge_count_tracks_targets() {
        let mut store = TopologyStore::new();
        for (n, index) in [7, 2, 9, 4, 1].into_iter().enumerate() {
            store.add_target(index).unwrap();
            assert_eq!(store.edges().len(), 2 * (n + 1));
        }
        for target in store.targets() {
            let touching = store
                .edges()
                .iter()
                .filter(|e| {
                    e.from == NodeRef::Target(target.id.clone())
                        || e.to == NodeRef::Target(target.id.clone())
                })
                .count();
            assert_eq!(touching, 2);
        }
    }

    #[test]
    fn test_duplicate_index_leaves_store_unchanged() {
        let mut store = TopologyStore::with_initial_targets(3);
        let before = store.snapshot();
        let err = store.add_target(2).unwrap_err();
        assert_eq!(err, SimError::DuplicateId("ip2".to_string()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_added_target_starts_pending_at_zero() {
        let mut store = TopologyStore::with_initial_targets(3);
        let target = store.add_target(4).unwrap();
        assert_eq!(target.id, "ip4");
        assert_eq!(target.selection_count, 0);
        assert_eq!(target.registration, Registration::Pending);
    }

    #[test]
    fn test_apply_decision_highlights_exactly_one() {
        let mut store = TopologyStore::with_initial_targets(3);
        let matched = store.apply_decision("ip2", &counts(&[("ip1", 0), ("ip2", 1), ("ip3", 0)]));
        assert!(matched);
        let highlighted: Vec<&str> = store
            .targets()
            .iter()
            .filter(|t| t.highlighted)
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(highlighted, ["ip2"]);
        assert_eq!(store.get("ip2").unwrap().selection_count, 1);
        assert_eq!(store.get("ip1").unwrap().selection_count, 0);
    }

    #[test]
    fn test_apply_decision_is_case_insensitive() {
        let mut store = TopologyStore::with_initial_targets(2);
        assert!(store.apply_decision("IP2", &counts(&[("IP2", 5)])));
        let ip2 = store.get("ip2").unwrap();
        assert!(ip2.highlighted);
        assert_eq!(ip2.selection_count, 5);
    }

    #[test]
    fn test_apply_decision_unknown_target_clears_highlight() {
        let mut store = TopologyStore::with_initial_targets(3);
        store.apply_decision("ip1", &counts(&[("ip1", 1)]));
        let matched = store.apply_decision("ip9", &counts(&[("ip1", 1)]));
        assert!(!matched);
        assert!(store.targets().iter().all(|t| !t.highlighted));
    }

    #[test]
    fn test_missing_counts_keep_previous_value() {
        let mut store = TopologyStore::with_initial_targets(3);
        store.apply_decision("ip3", &counts(&[("ip1", 4), ("ip2", 2), ("ip3", 7)]));
        store.apply_decision("ip1", &counts(&[("ip1", 5)]));
        assert_eq!(store.get("ip1").unwrap().selection_count, 5);
        assert_eq!(store.get("ip2").unwrap().selection_count, 2);
        assert_eq!(store.get("ip3").unwrap().selection_count, 7);
    }

    #[test]
    fn test_next_display_index_skips_taken() {
        let mut store = TopologyStore::with_initial_targets(3);
        assert_eq!(store.next_display_index(), 4);
        store.add_target(5).unwrap();
        // four targets -> 5 is next by count, but it is taken
        assert_eq!(store.next_display_index(), 6);
    }

    #[test]
    fn test_clear_highlights_and_registration() {
        let mut store = TopologyStore::with_initial_targets(2);
        store.apply_decision("ip1", &HashMap::new());
        store.clear_highlights();
        assert!(store.targets().iter().all(|t| !t.highlighted));

        assert!(store.set_registration("ip2", Registration::Failed("down".to_string())));
        assert!(!store.set_registration("ip9", Registration::Confirmed));
    }
}
