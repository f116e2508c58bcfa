//! Tournament tree over calendar slots.
//!
//! A complete binary winner tree: leaves are calendar slots, each
//! internal node holds the slot whose head event wins the comparison of
//! its two children. The slot index is the stable handle: leaf `M + s`
//! always belongs to slot `s`, so re-keying one slot replays only its
//! root path.

use std::cmp::Ordering;

use ricochet_core::Event;

const EMPTY: u32 = u32::MAX;

/// Winner tree keyed by each slot's head event.
#[derive(Clone, Debug)]
pub struct TournamentTree {
    /// Current head of each slot. `None` means "never".
    heads: Vec<Option<Event>>,
    /// Winner slot per node; `nodes[1]` is the root, leaves start at
    /// `leaves`.
    nodes: Vec<u32>,
    leaves: usize,
}

impl TournamentTree {
    /// Tree over `slots` empty slots.
    ///
    /// `slots` must fit a `u32` below `u32::MAX`; the calendar checks
    /// this before building a tree.
    pub fn new(slots: usize) -> Self {
        let leaves = slots.max(1).next_power_of_two();
        let mut nodes = vec![EMPTY; 2 * leaves];
        for (slot, node) in nodes[leaves..leaves + slots].iter_mut().enumerate() {
            *node = slot as u32;
        }
        let mut tree = Self {
            heads: vec![None; slots],
            nodes,
            leaves,
        };
        tree.rebuild();
        tree
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// `true` if the tree has no slots.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Current key of `slot`.
    pub fn head(&self, slot: usize) -> Option<&Event> {
        self.heads.get(slot).and_then(Option::as_ref)
    }

    /// Re-key `slot` and replay its path to the root. O(log N).
    pub fn update(&mut self, slot: usize, head: Option<Event>) {
        let Some(entry) = self.heads.get_mut(slot) else {
            return;
        };
        *entry = head;
        let mut node = (self.leaves + slot) / 2;
        while node >= 1 {
            self.nodes[node] = self.winner(self.nodes[2 * node], self.nodes[2 * node + 1]);
            node /= 2;
        }
    }

    /// Replace every key at once and recompute all internal nodes. O(N).
    pub fn rebuild(&mut self) {
        for node in (1..self.leaves).rev() {
            self.nodes[node] = self.winner(self.nodes[2 * node], self.nodes[2 * node + 1]);
        }
    }

    /// Overwrite the key of `slot` without touching internal nodes.
    /// Follow with [`rebuild`](Self::rebuild).
    pub fn set_unsorted(&mut self, slot: usize, head: Option<Event>) {
        if let Some(entry) = self.heads.get_mut(slot) {
            *entry = head;
        }
    }

    /// Slot holding the globally earliest event, with that event.
    pub fn top(&self) -> Option<(usize, &Event)> {
        let slot = *self.nodes.get(1)?;
        self.key(slot).map(|e| (slot as usize, e))
    }

    fn key(&self, slot: u32) -> Option<&Event> {
        if slot == EMPTY {
            return None;
        }
        self.head(slot as usize)
    }

    fn winner(&self, a: u32, b: u32) -> u32 {
        match (self.key(a), self.key(b)) {
            (Some(x), Some(y)) => {
                if y.order(x) == Ordering::Less {
                    b
                } else {
                    a
                }
            }
            (Some(_), None) => a,
            (None, Some(_)) => b,
            (None, None) => a.min(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ricochet_core::ParticleId;

    fn at(p: u32, dt: f64) -> Event {
        Event::cell_transition(ParticleId(p), dt)
    }

    #[test]
    fn empty_tree_has_no_top() {
        let tree = TournamentTree::new(5);
        assert!(tree.top().is_none());
    }

    #[test]
    fn top_tracks_updates() {
        let mut tree = TournamentTree::new(5);
        tree.update(3, Some(at(3, 2.0)));
        assert_eq!(tree.top().map(|(s, _)| s), Some(3));
        tree.update(1, Some(at(1, 1.0)));
        assert_eq!(tree.top().map(|(s, _)| s), Some(1));
        tree.update(1, None);
        assert_eq!(tree.top().map(|(s, _)| s), Some(3));
        tree.update(3, Some(at(3, 9.0)));
        tree.update(4, Some(at(4, 8.0)));
        assert_eq!(tree.top().map(|(s, e)| (s, e.dt)), Some((4, 8.0)));
    }

    #[test]
    fn single_slot_tree() {
        let mut tree = TournamentTree::new(1);
        tree.update(0, Some(at(0, 1.5)));
        assert_eq!(tree.top().map(|(s, _)| s), Some(0));
    }

    #[test]
    fn time_ties_go_to_lower_owner() {
        let mut tree = TournamentTree::new(4);
        tree.update(2, Some(at(2, 1.0)));
        tree.update(0, Some(at(0, 1.0)));
        assert_eq!(tree.top().map(|(s, _)| s), Some(0));
    }

    #[test]
    fn out_of_range_update_is_ignored() {
        let mut tree = TournamentTree::new(2);
        tree.update(7, Some(at(7, 0.0)));
        assert!(tree.top().is_none());
    }

    proptest! {
        #[test]
        fn top_is_minimum_after_random_updates(
            ops in prop::collection::vec((0usize..13, prop::option::of(0.0f64..100.0)), 1..200),
        ) {
            let mut tree = TournamentTree::new(13);
            let mut model: Vec<Option<f64>> = vec![None; 13];
            for (slot, dt) in ops {
                tree.update(slot, dt.map(|t| at(slot as u32, t)));
                model[slot] = dt;
                let expected = model
                    .iter()
                    .enumerate()
                    .filter_map(|(s, t)| t.map(|t| (t, s)))
                    .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let got = tree.top().map(|(s, e)| (e.dt, s));
                prop_assert_eq!(got, expected);
            }
        }
    }
}
