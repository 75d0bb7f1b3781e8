//! Team statistics and layer views over a member's subtree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use trellis_core::constants::MAX_DEPTH;
use trellis_core::error::StoreError;
use trellis_core::traits::MatrixStore;
use trellis_core::types::{MatrixNode, WalletAddress};

/// Team counts for a wallet's subtree, up to [`MAX_DEPTH`] layers deep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    /// Members directly under the wallet (layer 1).
    pub direct_count: usize,
    /// All members within [`MAX_DEPTH`] layers.
    pub total_count: usize,
    /// Member count per relative layer; layers with no members are
    /// omitted.
    pub per_depth_counts: BTreeMap<u8, usize>,
}

/// Count the wallet's team, layer by layer.
///
/// An unplaced wallet has an empty team; this is not an error.
pub fn referral_stats<S: MatrixStore>(
    store: &S,
    wallet: &WalletAddress,
) -> Result<ReferralStats, StoreError> {
    let mut stats = ReferralStats::default();
    let mut frontier = vec![wallet.clone()];

    for depth in 1..=MAX_DEPTH {
        let mut next = Vec::new();
        for parent in &frontier {
            for child in store.children(parent)? {
                next.push(child.member);
            }
        }
        if next.is_empty() {
            break;
        }
        if depth == 1 {
            stats.direct_count = next.len();
        }
        stats.total_count += next.len();
        stats.per_depth_counts.insert(depth, next.len());
        frontier = next;
    }

    Ok(stats)
}

/// The members exactly `depth` layers below `wallet`, in breadth/slot
/// order. Empty for depth 0, depths beyond [`MAX_DEPTH`], or unplaced
/// wallets.
pub fn layer_members<S: MatrixStore>(
    store: &S,
    wallet: &WalletAddress,
    depth: u8,
) -> Result<Vec<MatrixNode>, StoreError> {
    if depth == 0 || depth > MAX_DEPTH {
        return Ok(Vec::new());
    }

    let mut layer = store.children(wallet)?;
    for _ in 1..depth {
        let mut next = Vec::new();
        for node in &layer {
            next.extend(store.children(&node.member)?);
        }
        if next.is_empty() {
            return Ok(Vec::new());
        }
        layer = next;
    }
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use trellis_core::store::MemoryStore;
    use trellis_core::types::Slot;

    use crate::placement::PlacementEngine;

    fn wallet(seed: u8) -> WalletAddress {
        WalletAddress::from_bytes([seed; 20])
    }

    /// Root with a full first layer and a partially filled second layer.
    fn sample_tree() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.register_root(wallet(0)).unwrap();
        let engine = PlacementEngine::new(Arc::clone(&store));
        let now = Utc::now();
        // Layer 1: 3 members; layer 2: 5 members via spillover.
        for seed in 1..=8 {
            engine.place(&wallet(seed), &wallet(0), now).unwrap();
        }
        store
    }

    #[test]
    fn stats_count_layers() {
        let store = sample_tree();
        let stats = referral_stats(store.as_ref(), &wallet(0)).unwrap();
        assert_eq!(stats.direct_count, 3);
        assert_eq!(stats.total_count, 8);
        assert_eq!(stats.per_depth_counts.get(&1), Some(&3));
        assert_eq!(stats.per_depth_counts.get(&2), Some(&5));
        assert_eq!(stats.per_depth_counts.get(&3), None);
    }

    #[test]
    fn stats_empty_for_unplaced() {
        let store = sample_tree();
        let stats = referral_stats(store.as_ref(), &wallet(77)).unwrap();
        assert_eq!(stats, ReferralStats::default());
    }

    #[test]
    fn layer_view_in_breadth_order() {
        let store = sample_tree();
        let layer2 = layer_members(store.as_ref(), &wallet(0), 2).unwrap();
        assert_eq!(layer2.len(), 5);
        // Spillover filled w1's slots first, left to right.
        assert_eq!(layer2[0].parent, wallet(1));
        assert_eq!(layer2[0].slot, Slot::Left);
        assert_eq!(layer2[0].member, wallet(4));

        assert!(layer_members(store.as_ref(), &wallet(0), 0).unwrap().is_empty());
        assert!(layer_members(store.as_ref(), &wallet(0), 3).unwrap().is_empty());
        assert!(layer_members(store.as_ref(), &wallet(0), 20).unwrap().is_empty());
    }

    #[test]
    fn stats_for_mid_tree_member() {
        let store = sample_tree();
        // w1 has 3 children (w4, w5, w6) after spillover.
        let stats = referral_stats(store.as_ref(), &wallet(1)).unwrap();
        assert_eq!(stats.direct_count, 3);
        assert_eq!(stats.total_count, 3);
    }
}
