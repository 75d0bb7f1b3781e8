//! Ancestor-chain walks over the placement tree.
//!
//! The chain of a member is the ordered list of placement ancestors
//! obtained by following parent pointers, nearest first, up to
//! [`MAX_DEPTH`] hops. Placement is append-only, so no cycles can exist
//! and every walk terminates at a registered root or at the cap.

use std::collections::HashSet;
use std::sync::Arc;

use trellis_core::constants::MAX_DEPTH;
use trellis_core::error::StoreError;
use trellis_core::traits::MatrixStore;
use trellis_core::types::{ChainLink, MatrixNode, Slot, WalletAddress};

/// Read-side index over the placement tree.
///
/// Cheap to clone; all state lives in the shared store.
pub struct ChainIndex<S: MatrixStore> {
    store: Arc<S>,
}

impl<S: MatrixStore> Clone for ChainIndex<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: MatrixStore> ChainIndex<S> {
    /// Create an index over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The member's ancestor chain, nearest first, at most [`MAX_DEPTH`]
    /// links. Empty for unplaced wallets (including registered roots,
    /// which have no ancestors).
    pub fn chain_of(&self, wallet: &WalletAddress) -> Result<Vec<ChainLink>, StoreError> {
        let mut links = Vec::new();
        let Some(mut node) = self.store.node(wallet)? else {
            return Ok(links);
        };
        for depth in 1..=MAX_DEPTH {
            links.push(ChainLink {
                ancestor: node.parent.clone(),
                depth,
                slot: node.slot,
            });
            match self.store.node(&node.parent)? {
                Some(parent) => node = parent,
                // Reached a registered root.
                None => break,
            }
        }
        Ok(links)
    }

    /// First open slot among `wallet`'s direct children, in L, M, R
    /// order. `None` if all three are occupied or `wallet` is unplaced.
    pub fn find_open_slot(&self, wallet: &WalletAddress) -> Result<Option<Slot>, StoreError> {
        if !self.store.is_placed(wallet)? {
            return Ok(None);
        }
        let occupied: HashSet<Slot> = self
            .store
            .children(wallet)?
            .iter()
            .map(|child| child.slot)
            .collect();
        Ok(Slot::ALL.into_iter().find(|slot| !occupied.contains(slot)))
    }

    /// Direct children of `wallet`, ordered by slot.
    pub fn children(&self, wallet: &WalletAddress) -> Result<Vec<MatrixNode>, StoreError> {
        self.store.children(wallet)
    }
}
