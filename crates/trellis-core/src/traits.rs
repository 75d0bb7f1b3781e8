//! Trait interfaces between crates:
//! - [`MemberDirectory`] — read-only member state, owned by the external
//!   member directory
//! - [`MatrixStore`] — placement-tree persistence with a conditional
//!   slot-claim write (trellis-matrix consumes)
//! - [`RewardLedger`] — reward and revenue persistence with conditional
//!   status transitions (trellis-rewards consumes)
//!
//! The shipped implementation is the in-memory
//! [`MemoryStore`](crate::store::MemoryStore); a persistent backend would
//! implement the same traits.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    MatrixNode, MemberRecord, NewReward, NewRevenue, Reward, RewardId, RewardStatus, RevenueEntry,
    UpgradeOutcome, WalletAddress,
};

/// Read-only view of member state.
///
/// Level and activation are owned by the external member directory; this
/// core never mutates them through this trait.
pub trait MemberDirectory: Send + Sync {
    /// Look up a member. Returns `None` if the wallet is unknown.
    fn member(&self, wallet: &WalletAddress) -> Result<Option<MemberRecord>, StoreError>;
}

/// Placement-tree persistence.
///
/// Nodes are append-only: created once at placement, never updated or
/// deleted. Tree roots (company seed wallets) are registered separately
/// and have no node of their own.
pub trait MatrixStore: Send + Sync {
    /// Look up a member's node. Returns `None` for unplaced wallets and
    /// for registered roots.
    fn node(&self, wallet: &WalletAddress) -> Result<Option<MatrixNode>, StoreError>;

    /// Direct children of `parent`, ordered by slot (L, M, R).
    fn children(&self, parent: &WalletAddress) -> Result<Vec<MatrixNode>, StoreError>;

    /// Whether `wallet` is a registered tree root.
    fn is_root(&self, wallet: &WalletAddress) -> Result<bool, StoreError>;

    /// Whether `wallet` occupies a position in some tree (has a node or
    /// is a registered root).
    ///
    /// Default implementation delegates to [`node`](Self::node) and
    /// [`is_root`](Self::is_root).
    fn is_placed(&self, wallet: &WalletAddress) -> Result<bool, StoreError> {
        Ok(self.node(wallet)?.is_some() || self.is_root(wallet)?)
    }

    /// Register a tree root — the external bootstrap path for company
    /// seed wallets.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicatePlacement`] if the wallet is already placed
    /// or already a root.
    fn register_root(&self, wallet: WalletAddress) -> Result<(), StoreError>;

    /// Conditionally insert `node`, claiming `(node.parent, node.slot)`.
    ///
    /// This is the serialization mechanism for contended placements: the
    /// claim fails rather than overwrite if another placement filled the
    /// slot between the caller's read and this write.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SlotOccupied`] if the slot was filled meanwhile
    /// - [`StoreError::DuplicatePlacement`] if the member already has a
    ///   node or is a registered root
    fn claim_slot(&self, node: MatrixNode) -> Result<(), StoreError>;
}

/// A conditional reward status change.
///
/// Applied by [`RewardLedger::transition`] only when the reward's current
/// status equals the caller's expected source state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionAction {
    /// `Pending -> Confirmed`, stamping `confirmed_at`.
    Confirm { at: DateTime<Utc> },
    /// `Pending -> Expired`.
    Expire,
    /// `Confirmed -> Claimed`, recording the settlement reference.
    Claim { at: DateTime<Utc>, settlement_tx: String },
}

impl TransitionAction {
    /// The status this action moves a reward to.
    pub fn target_status(&self) -> RewardStatus {
        match self {
            TransitionAction::Confirm { .. } => RewardStatus::Confirmed,
            TransitionAction::Expire => RewardStatus::Expired,
            TransitionAction::Claim { .. } => RewardStatus::Claimed,
        }
    }
}

/// Reward and unallocated-revenue persistence.
///
/// Every mutating operation is idempotent or conditional on prior state,
/// so wholesale retry after a transient failure is safe.
pub trait RewardLedger: Send + Sync {
    /// Commit one upgrade event: the reward row (if any), the fee entry
    /// (if any), and the upgrade receipt, as a single atomic unit.
    ///
    /// Idempotent on `(member, trigger_level)`: a replay writes nothing
    /// and returns [`UpgradeOutcome::Duplicate`] with the original
    /// receipt.
    fn record_upgrade(
        &self,
        member: &WalletAddress,
        trigger_level: u8,
        reward: Option<NewReward>,
        fee: Option<NewRevenue>,
    ) -> Result<UpgradeOutcome, StoreError>;

    /// Insert a reward outside the upgrade path (reallocation).
    fn create_reward(&self, reward: NewReward) -> Result<Reward, StoreError>;

    /// Append an unallocated-revenue entry.
    fn credit_revenue(&self, entry: NewRevenue) -> Result<RevenueEntry, StoreError>;

    /// Point lookup by id.
    fn reward(&self, id: RewardId) -> Result<Option<Reward>, StoreError>;

    /// Up to `limit` rewards in `status`, oldest first.
    fn rewards_by_status(
        &self,
        status: RewardStatus,
        limit: usize,
    ) -> Result<Vec<Reward>, StoreError>;

    /// All rewards payable to `wallet`, oldest first.
    fn rewards_for_recipient(&self, wallet: &WalletAddress) -> Result<Vec<Reward>, StoreError>;

    /// Compare-and-set status transition.
    ///
    /// Applies `action` only if the reward's current status equals
    /// `expected`; returns `Ok(false)` (not an error) when the guard
    /// fails, which callers treat as having lost a benign race.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownReward`] if `id` does not exist
    /// - [`StoreError::IllegalTransition`] if `expected -> action` is not
    ///   in the transition table
    fn transition(
        &self,
        id: RewardId,
        expected: RewardStatus,
        action: TransitionAction,
    ) -> Result<bool, StoreError>;

    /// The full unallocated-revenue ledger, oldest first.
    fn revenue_entries(&self) -> Result<Vec<RevenueEntry>, StoreError>;

    /// Total cents in the unallocated-revenue ledger.
    ///
    /// Default implementation sums [`revenue_entries`](Self::revenue_entries).
    fn revenue_total(&self) -> Result<u64, StoreError> {
        Ok(self
            .revenue_entries()?
            .iter()
            .map(|e| e.amount_cents)
            .sum())
    }
}
