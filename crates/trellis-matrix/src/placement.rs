//! Placement of new members into the tree.
//!
//! Placement tries the sponsor's own slots first, then spills over by
//! breadth-first search of the sponsor's subtree: all depth-1 children
//! left to right, then depth-2, and so on, at most [`MAX_DEPTH`] layers
//! below the sponsor. At every node the L → M → R tie-break applies, so
//! the shallowest, left-most open position always fills first. Downstream
//! reward targeting depends on this ordering.
//!
//! Concurrent placements contending for one slot are serialized by the
//! store's conditional claim write: the loser re-runs the search against
//! the updated tree.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use trellis_core::constants::{MAX_DEPTH, PLACEMENT_RETRY_LIMIT};
use trellis_core::error::{PlacementError, StoreError};
use trellis_core::traits::MatrixStore;
use trellis_core::types::{MatrixNode, Slot, WalletAddress};

/// Outcome of a successful placement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// The node the member was placed under.
    pub parent: WalletAddress,
    /// Root of the tree the member landed in.
    pub root: WalletAddress,
    /// Absolute depth of the new node, capped at [`MAX_DEPTH`].
    pub depth: u8,
    /// Slot claimed under the parent.
    pub slot: Slot,
    /// Whether the member landed somewhere other than directly under the
    /// sponsor.
    pub spillover: bool,
}

/// A position the search selected, pending the conditional claim.
struct Candidate {
    parent: WalletAddress,
    parent_depth: u8,
    /// `None` when the parent is itself a registered root.
    parent_root: Option<WalletAddress>,
    slot: Slot,
    spillover: bool,
}

/// Places new members under their sponsor, with spillover.
pub struct PlacementEngine<S: MatrixStore> {
    store: Arc<S>,
}

impl<S: MatrixStore> PlacementEngine<S> {
    /// Create an engine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Place `member` into the tree under `sponsor`.
    ///
    /// # Errors
    ///
    /// - [`PlacementError::DuplicatePlacement`] if `member` is already placed
    /// - [`PlacementError::ReferrerNotFound`] if `sponsor` is unplaced
    /// - [`PlacementError::MatrixFull`] if no open slot exists within
    ///   [`MAX_DEPTH`] layers below the sponsor
    /// - [`PlacementError::Store`] on persistent contention or backend
    ///   failure; safe to retry wholesale
    pub fn place(
        &self,
        member: &WalletAddress,
        sponsor: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<Placement, PlacementError> {
        if self.store.is_placed(member)? {
            return Err(PlacementError::DuplicatePlacement(member.clone()));
        }
        if !self.store.is_placed(sponsor)? {
            return Err(PlacementError::ReferrerNotFound(sponsor.clone()));
        }

        let mut conflicts = 0;
        loop {
            let Some(candidate) = self.search(sponsor)? else {
                return Err(PlacementError::MatrixFull {
                    sponsor: sponsor.clone(),
                    depth: MAX_DEPTH,
                });
            };

            let depth = candidate.parent_depth.saturating_add(1).min(MAX_DEPTH);
            let root = candidate
                .parent_root
                .clone()
                .unwrap_or_else(|| candidate.parent.clone());
            let node = MatrixNode {
                member: member.clone(),
                parent: candidate.parent.clone(),
                root: root.clone(),
                depth,
                slot: candidate.slot,
                placed_at: now,
            };

            match self.store.claim_slot(node) {
                Ok(()) => {
                    info!(
                        member = %member,
                        parent = %candidate.parent,
                        depth,
                        slot = %candidate.slot,
                        spillover = candidate.spillover,
                        "placed member"
                    );
                    return Ok(Placement {
                        parent: candidate.parent,
                        root,
                        depth,
                        slot: candidate.slot,
                        spillover: candidate.spillover,
                    });
                }
                Err(StoreError::SlotOccupied { parent, slot }) => {
                    conflicts += 1;
                    if conflicts >= PLACEMENT_RETRY_LIMIT {
                        return Err(StoreError::SlotOccupied { parent, slot }.into());
                    }
                    debug!(
                        member = %member,
                        parent = %parent,
                        slot = %slot,
                        attempt = conflicts,
                        "slot claimed concurrently; re-running search"
                    );
                }
                Err(StoreError::DuplicatePlacement(w)) => {
                    return Err(PlacementError::DuplicatePlacement(w));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Breadth-first search for the first node with an open slot, at most
    /// [`MAX_DEPTH`] layers below the sponsor. Children are enqueued in
    /// slot order, so the traversal is strictly breadth-first with the
    /// L → M → R tie-break at every node.
    fn search(&self, sponsor: &WalletAddress) -> Result<Option<Candidate>, StoreError> {
        let (sponsor_depth, sponsor_root) = match self.store.node(sponsor)? {
            Some(node) => (node.depth, Some(node.root)),
            // A registered root: depth 0, roots its own tree.
            None => (0, None),
        };

        struct Visit {
            wallet: WalletAddress,
            depth: u8,
            root: Option<WalletAddress>,
            /// Layers below the sponsor.
            rel: u8,
        }

        let mut queue = VecDeque::new();
        queue.push_back(Visit {
            wallet: sponsor.clone(),
            depth: sponsor_depth,
            root: sponsor_root,
            rel: 0,
        });

        while let Some(visit) = queue.pop_front() {
            // A child of this node would sit more than MAX_DEPTH layers
            // below the sponsor.
            if visit.rel >= MAX_DEPTH {
                continue;
            }

            let children = self.store.children(&visit.wallet)?;
            let occupied: HashSet<Slot> = children.iter().map(|c| c.slot).collect();
            if let Some(slot) = Slot::ALL.into_iter().find(|s| !occupied.contains(s)) {
                return Ok(Some(Candidate {
                    parent: visit.wallet,
                    parent_depth: visit.depth,
                    parent_root: visit.root,
                    slot,
                    spillover: visit.rel > 0,
                }));
            }

            for child in children {
                queue.push_back(Visit {
                    wallet: child.member,
                    depth: child.depth,
                    root: Some(child.root),
                    rel: visit.rel + 1,
                });
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::store::MemoryStore;

    fn wallet(seed: u8) -> WalletAddress {
        WalletAddress::from_bytes([seed; 20])
    }

    fn engine() -> (Arc<MemoryStore>, PlacementEngine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.register_root(wallet(0)).unwrap();
        let engine = PlacementEngine::new(Arc::clone(&store));
        (store, engine)
    }

    #[test]
    fn direct_placement_fills_l_then_m_then_r() {
        let (_store, engine) = engine();
        let now = Utc::now();

        let first = engine.place(&wallet(1), &wallet(0), now).unwrap();
        assert_eq!(first.slot, Slot::Left);
        assert_eq!(first.depth, 1);
        assert!(!first.spillover);

        let second = engine.place(&wallet(2), &wallet(0), now).unwrap();
        assert_eq!(second.slot, Slot::Middle);

        let third = engine.place(&wallet(3), &wallet(0), now).unwrap();
        assert_eq!(third.slot, Slot::Right);

        // Sponsor full: the fourth spills over to the left child's L slot.
        let fourth = engine.place(&wallet(4), &wallet(0), now).unwrap();
        assert_eq!(fourth.parent, wallet(1));
        assert_eq!(fourth.slot, Slot::Left);
        assert_eq!(fourth.depth, 2);
        assert!(fourth.spillover);
    }

    #[test]
    fn spillover_prefers_shallowest_leftmost_opening() {
        // Root A with children B(L), C(M), D(R). B and C are full with
        // grandchildren; D has its M slot open. A new member sponsored by
        // A must land under D at M — not deeper under B or C.
        let (_store, engine) = engine();
        let now = Utc::now();
        let a = wallet(0);

        for seed in 1..=3 {
            engine.place(&wallet(seed), &a, now).unwrap();
        }
        // Fill B and C completely.
        for seed in 4..=9 {
            let sponsor = if seed <= 6 { wallet(1) } else { wallet(2) };
            engine.place(&wallet(seed), &sponsor, now).unwrap();
        }
        // D keeps only its L slot occupied.
        engine.place(&wallet(10), &wallet(3), now).unwrap();

        let placement = engine.place(&wallet(11), &a, now).unwrap();
        assert_eq!(placement.parent, wallet(3));
        assert_eq!(placement.slot, Slot::Middle);
        assert_eq!(placement.depth, 2);
        assert!(placement.spillover);

        // Depth-2 layer still has an opening (D's R), so the next
        // placement stays at depth 2 rather than descending under B.
        let next = engine.place(&wallet(12), &a, now).unwrap();
        assert_eq!(next.parent, wallet(3));
        assert_eq!(next.slot, Slot::Right);
    }

    #[test]
    fn duplicate_placement_rejected() {
        let (_store, engine) = engine();
        let now = Utc::now();
        engine.place(&wallet(1), &wallet(0), now).unwrap();

        let err = engine.place(&wallet(1), &wallet(0), now).unwrap_err();
        assert_eq!(err, PlacementError::DuplicatePlacement(wallet(1)));

        // A registered root cannot be placed either.
        let err = engine.place(&wallet(0), &wallet(1), now).unwrap_err();
        assert_eq!(err, PlacementError::DuplicatePlacement(wallet(0)));
    }

    #[test]
    fn unknown_sponsor_rejected() {
        let (_store, engine) = engine();
        let err = engine
            .place(&wallet(1), &wallet(42), Utc::now())
            .unwrap_err();
        assert_eq!(err, PlacementError::ReferrerNotFound(wallet(42)));
    }

    #[test]
    fn root_inherited_through_spillover() {
        let (_store, engine) = engine();
        let now = Utc::now();
        for seed in 1..=4 {
            let placement = engine.place(&wallet(seed), &wallet(0), now).unwrap();
            assert_eq!(placement.root, wallet(0));
        }
        // Sponsored by a placed member: same tree root.
        let placement = engine.place(&wallet(5), &wallet(4), now).unwrap();
        assert_eq!(placement.root, wallet(0));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Random placement sequences never violate the structural
            /// invariants: one node per wallet, at most three children
            /// per parent with distinct slots, child depth = parent
            /// depth + 1 (capped).
            #[test]
            fn placement_invariants(sponsor_picks in prop::collection::vec(0usize..64, 1..48)) {
                let store = Arc::new(MemoryStore::new());
                store.register_root(wallet(0)).unwrap();
                let engine = PlacementEngine::new(Arc::clone(&store));
                let now = Utc::now();

                let mut placed = vec![wallet(0)];
                for (i, pick) in sponsor_picks.iter().enumerate() {
                    let member = wallet(i as u8 + 1);
                    let sponsor = placed[pick % placed.len()].clone();
                    engine.place(&member, &sponsor, now).unwrap();
                    placed.push(member);
                }

                for parent in &placed {
                    let children = store.children(parent).unwrap();
                    prop_assert!(children.len() <= 3);
                    let slots: std::collections::HashSet<Slot> =
                        children.iter().map(|c| c.slot).collect();
                    prop_assert_eq!(slots.len(), children.len());

                    let parent_depth = store.node(parent).unwrap().map_or(0, |n| n.depth);
                    for child in children {
                        prop_assert_eq!(
                            child.depth,
                            parent_depth.saturating_add(1).min(MAX_DEPTH)
                        );
                    }
                }
            }
        }
    }
}
