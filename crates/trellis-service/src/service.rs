//! Service composition.
//!
//! [`TrellisService`] wires the in-memory store and the three engines
//! behind one handle. The scheduled reconciler and the manual RPC
//! trigger both go through
//! [`run_reconciler_cycle`](TrellisService::run_reconciler_cycle), so
//! their behavior under concurrent invocation is identical.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use trellis_core::error::TrellisError;
use trellis_core::store::MemoryStore;
use trellis_core::traits::{MatrixStore, RewardLedger};
use trellis_core::types::{
    ChainLink, MatrixNode, MemberRecord, Reward, RewardId, RewardStatus, RevenueEntry,
    WalletAddress,
};
use trellis_matrix::{
    ChainIndex, Placement, PlacementEngine, ReferralStats, layer_members, referral_stats,
};
use trellis_rewards::{CycleReport, DistributionEngine, Reconciler, record_claim};

use crate::config::ServiceConfig;

/// Aggregate counters for the `getinfo` surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Known members.
    pub members: usize,
    /// Placed matrix nodes (roots excluded).
    pub placements: usize,
    /// Registered tree roots.
    pub roots: usize,
    /// Rewards currently pending.
    pub pending_rewards: usize,
    /// Rewards currently confirmed.
    pub confirmed_rewards: usize,
    /// Total cents in the unallocated-revenue ledger.
    pub revenue_total_cents: u64,
}

/// The composed Trellis service.
pub struct TrellisService {
    store: Arc<MemoryStore>,
    placement: PlacementEngine<MemoryStore>,
    distribution: DistributionEngine<MemoryStore>,
    reconciler: Reconciler<MemoryStore>,
    chain: ChainIndex<MemoryStore>,
}

impl TrellisService {
    /// Create a service over a fresh in-memory store.
    pub fn new(config: &ServiceConfig) -> Arc<Self> {
        let store = Arc::new(MemoryStore::new());
        let placement = PlacementEngine::new(Arc::clone(&store));
        let distribution = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::with_batch_limit(Arc::clone(&store), config.batch_limit);
        let chain = ChainIndex::new(Arc::clone(&store));
        Arc::new(Self {
            store,
            placement,
            distribution,
            reconciler,
            chain,
        })
    }

    /// The underlying store (external-directory and bootstrap side).
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Place a new member under a sponsor.
    pub fn place_member(
        &self,
        member: &WalletAddress,
        sponsor: &WalletAddress,
    ) -> Result<Placement, TrellisError> {
        Ok(self.placement.place(member, sponsor, Utc::now())?)
    }

    /// Process a level-upgrade event.
    pub fn process_level_upgrade(
        &self,
        member: &WalletAddress,
        trigger_level: u8,
    ) -> Result<Vec<RewardId>, TrellisError> {
        Ok(self
            .distribution
            .process_level_upgrade(member, trigger_level)?)
    }

    /// Run one reconciler cycle — the scheduled and administrative
    /// trigger paths both land here.
    pub fn run_reconciler_cycle(&self) -> Result<CycleReport, TrellisError> {
        Ok(self.reconciler.run_cycle()?)
    }

    /// A member's ancestor chain, nearest first.
    pub fn chain_of(&self, wallet: &WalletAddress) -> Result<Vec<ChainLink>, TrellisError> {
        Ok(self.chain.chain_of(wallet)?)
    }

    /// Team counts for a wallet's subtree.
    pub fn referral_stats(&self, wallet: &WalletAddress) -> Result<ReferralStats, TrellisError> {
        Ok(referral_stats(self.store.as_ref(), wallet)?)
    }

    /// Members exactly `depth` layers below `wallet`.
    pub fn layer_members(
        &self,
        wallet: &WalletAddress,
        depth: u8,
    ) -> Result<Vec<MatrixNode>, TrellisError> {
        Ok(layer_members(self.store.as_ref(), wallet, depth)?)
    }

    /// Record a claim settlement reference against a confirmed reward.
    pub fn record_claim(
        &self,
        id: RewardId,
        claimer: &WalletAddress,
        settlement_tx: String,
    ) -> Result<Reward, TrellisError> {
        Ok(record_claim(
            self.store.as_ref(),
            id,
            claimer,
            settlement_tx,
            Utc::now(),
        )?)
    }

    /// All rewards payable to a wallet.
    pub fn rewards_for(&self, wallet: &WalletAddress) -> Result<Vec<Reward>, TrellisError> {
        Ok(self.store.rewards_for_recipient(wallet)?)
    }

    /// Point lookup of a reward.
    pub fn reward(&self, id: RewardId) -> Result<Option<Reward>, TrellisError> {
        Ok(self.store.reward(id)?)
    }

    /// The unallocated-revenue ledger.
    pub fn revenue_entries(&self) -> Result<Vec<RevenueEntry>, TrellisError> {
        Ok(self.store.revenue_entries()?)
    }

    /// Register a tree root (bootstrap path).
    pub fn register_root(&self, wallet: WalletAddress) -> Result<(), TrellisError> {
        Ok(self.store.register_root(wallet)?)
    }

    /// Insert or replace a member record (external-directory side).
    pub fn upsert_member(&self, record: MemberRecord) {
        self.store.upsert_member(record);
    }

    /// Set a member's current level (external-directory side).
    pub fn set_member_level(&self, wallet: &WalletAddress, level: u8) -> Result<(), TrellisError> {
        Ok(self.store.set_member_level(wallet, level)?)
    }

    /// Aggregate counters.
    pub fn info(&self) -> Result<ServiceInfo, TrellisError> {
        Ok(ServiceInfo {
            members: self.store.member_count(),
            placements: self.store.node_count(),
            roots: self.store.root_count(),
            pending_rewards: self.store.status_count(RewardStatus::Pending),
            confirmed_rewards: self.store.status_count(RewardStatus::Confirmed),
            revenue_total_cents: self.store.revenue_total()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(seed: u8) -> WalletAddress {
        WalletAddress::from_bytes([seed; 20])
    }

    fn activated(seed: u8, level: u8) -> MemberRecord {
        MemberRecord {
            wallet: wallet(seed),
            current_level: level,
            is_activated: true,
            sponsor: Some(wallet(0)),
        }
    }

    #[test]
    fn composed_flow_places_and_rewards() {
        let service = TrellisService::new(&ServiceConfig::default());
        service.register_root(wallet(0)).unwrap();
        for seed in 0..=2 {
            service.upsert_member(activated(seed, 19));
        }

        let placement = service.place_member(&wallet(1), &wallet(0)).unwrap();
        assert_eq!(placement.depth, 1);
        service.place_member(&wallet(2), &wallet(1)).unwrap();

        let ids = service.process_level_upgrade(&wallet(2), 1).unwrap();
        assert_eq!(ids.len(), 1);

        let info = service.info().unwrap();
        assert_eq!(info.placements, 2);
        assert_eq!(info.roots, 1);
        assert_eq!(info.confirmed_rewards, 1);
        assert_eq!(info.revenue_total_cents, 30_00);
    }

    #[test]
    fn manual_cycle_runs_through_the_service() {
        let service = TrellisService::new(&ServiceConfig::default());
        service.register_root(wallet(0)).unwrap();
        for seed in 0..=1 {
            service.upsert_member(activated(seed, 19));
        }
        service.place_member(&wallet(1), &wallet(0)).unwrap();

        let report = service.run_reconciler_cycle().unwrap();
        assert_eq!(report, CycleReport::default());
    }
}
