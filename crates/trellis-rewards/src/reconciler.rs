//! Batched reconciliation of pending rewards.
//!
//! One pure, idempotent sweep serves both the scheduled timer and the
//! manual administrative trigger. Every status change is a conditional
//! write guarded by the expected source state, so overlapping cycles —
//! scheduled plus manual, or two manual — never double-process a reward,
//! and re-running on an unchanged dataset is a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use trellis_core::constants::DEFAULT_BATCH_LIMIT;
use trellis_core::error::StoreError;
use trellis_core::traits::{MatrixStore, MemberDirectory, RewardLedger, TransitionAction};
use trellis_core::types::{Reward, RewardStatus};

use crate::reallocation::{ReallocationOutcome, Reallocator};

/// Counters for one reconciler cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Pending rewards confirmed this cycle.
    pub confirmed: usize,
    /// Pending rewards expired this cycle.
    pub expired: usize,
    /// Expired rewards reassigned to an ancestor farther up the chain.
    pub reallocated: usize,
    /// Expired rewards whose amount went to unallocated revenue.
    pub unallocated: usize,
    /// Items skipped after an isolated failure; they stay pending for
    /// the next cycle.
    pub failed: usize,
}

/// What happened to one pending reward during a cycle.
enum ItemOutcome {
    Confirmed,
    Expired(ReallocationOutcome),
    /// Below the required level and not yet past the window.
    Left,
    /// Lost a conditional write to a concurrent cycle.
    Raced,
}

/// Sweeps pending rewards: confirm, expire, reallocate.
pub struct Reconciler<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    store: Arc<S>,
    reallocator: Reallocator<S>,
    batch_limit: usize,
}

impl<S> Reconciler<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    /// Create a reconciler with the default batch limit.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_batch_limit(store, DEFAULT_BATCH_LIMIT)
    }

    /// Create a reconciler loading up to `batch_limit` pending rewards
    /// per cycle.
    pub fn with_batch_limit(store: Arc<S>, batch_limit: usize) -> Self {
        let reallocator = Reallocator::new(Arc::clone(&store));
        Self {
            store,
            reallocator,
            batch_limit,
        }
    }

    /// Run one cycle at the current wall-clock time.
    pub fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        self.run_cycle_at(Utc::now())
    }

    /// Run one cycle against the given clock.
    ///
    /// Loads up to the batch limit of pending rewards, oldest first, and
    /// reconciles each independently: an item's failure is logged,
    /// counted, and skipped — it never aborts the batch.
    pub fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, StoreError> {
        let pending = self
            .store
            .rewards_by_status(RewardStatus::Pending, self.batch_limit)?;
        let mut report = CycleReport::default();

        for reward in &pending {
            match self.reconcile_one(reward, now) {
                Ok(ItemOutcome::Confirmed) => report.confirmed += 1,
                Ok(ItemOutcome::Expired(outcome)) => {
                    report.expired += 1;
                    match outcome {
                        ReallocationOutcome::Reassigned(_) => report.reallocated += 1,
                        ReallocationOutcome::Unallocated(_) => report.unallocated += 1,
                    }
                }
                Ok(ItemOutcome::Left | ItemOutcome::Raced) => {}
                Err(e) => {
                    warn!(reward = %reward.id, error = %e, "reconcile failed; leaving pending");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = pending.len(),
            confirmed = report.confirmed,
            expired = report.expired,
            reallocated = report.reallocated,
            unallocated = report.unallocated,
            failed = report.failed,
            "reconciler cycle complete"
        );
        Ok(report)
    }

    fn reconcile_one(&self, reward: &Reward, now: DateTime<Utc>) -> Result<ItemOutcome, StoreError> {
        let recipient = self.store.member(&reward.recipient)?;
        if recipient.is_some_and(|m| m.qualifies_for(reward.requires_level)) {
            return if self.store.transition(
                reward.id,
                RewardStatus::Pending,
                TransitionAction::Confirm { at: now },
            )? {
                info!(reward = %reward.id, recipient = %reward.recipient, "pending reward confirmed");
                Ok(ItemOutcome::Confirmed)
            } else {
                Ok(ItemOutcome::Raced)
            };
        }

        if reward.expires_at.is_some_and(|expires| now > expires) {
            return if self
                .store
                .transition(reward.id, RewardStatus::Pending, TransitionAction::Expire)?
            {
                info!(reward = %reward.id, recipient = %reward.recipient, "pending reward expired");
                let outcome = self.reallocator.reallocate(reward, now)?;
                Ok(ItemOutcome::Expired(outcome))
            } else {
                Ok(ItemOutcome::Raced)
            };
        }

        Ok(ItemOutcome::Left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use trellis_core::error::StoreError;
    use trellis_core::store::MemoryStore;
    use trellis_core::types::{
        MatrixNode, MemberRecord, NewReward, RevenueReason, Slot, WalletAddress,
    };

    use crate::distribution::DistributionEngine;

    fn wallet(seed: u8) -> WalletAddress {
        WalletAddress::from_bytes([seed; 20])
    }

    fn add_member(store: &MemoryStore, seed: u8, level: u8, activated: bool) {
        store.upsert_member(MemberRecord {
            wallet: wallet(seed),
            current_level: level,
            is_activated: activated,
            sponsor: None,
        });
    }

    /// Straight line root w0 -> w1 -> ... -> w5; levels per member.
    fn line(levels: [u8; 6]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.register_root(wallet(0)).unwrap();
        for (i, level) in levels.into_iter().enumerate() {
            add_member(&store, i as u8, level, true);
            if i > 0 {
                store
                    .claim_slot(MatrixNode {
                        member: wallet(i as u8),
                        parent: wallet(i as u8 - 1),
                        root: wallet(0),
                        depth: i as u8,
                        slot: Slot::Left,
                        placed_at: Utc::now(),
                    })
                    .unwrap();
            }
        }
        store
    }

    #[test]
    fn pending_stays_until_level_reached_then_confirms() {
        // Position 5 of w5's chain is the root w0, holding level 2 < 5.
        let store = line([2, 19, 19, 19, 19, 5]);
        let engine = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let now = Utc::now();

        let ids = engine.process_level_upgrade_at(&wallet(5), 5, now).unwrap();
        let reward = store.reward(ids[0]).unwrap().unwrap();
        assert_eq!(reward.recipient, wallet(0));
        assert_eq!(reward.requires_level, 5);
        assert_eq!(reward.status, RewardStatus::Pending);

        // Still below the required level: untouched across cycles.
        let report = reconciler.run_cycle_at(now + Duration::hours(1)).unwrap();
        assert_eq!(report, CycleReport::default());
        let report = reconciler.run_cycle_at(now + Duration::hours(2)).unwrap();
        assert_eq!(report, CycleReport::default());

        // Recipient reaches level 5: first cycle confirms.
        store.set_member_level(&wallet(0), 5).unwrap();
        let confirm_time = now + Duration::hours(3);
        let report = reconciler.run_cycle_at(confirm_time).unwrap();
        assert_eq!(report.confirmed, 1);
        assert_eq!(report.expired, 0);

        let reward = store.reward(ids[0]).unwrap().unwrap();
        assert_eq!(reward.status, RewardStatus::Confirmed);
        assert_eq!(reward.confirmed_at, Some(confirm_time));
    }

    #[test]
    fn expiry_reallocates_to_next_qualifying_ancestor() {
        // Position 2 of w5's chain is w3 (level 1, never qualifies for 2);
        // position 3 is w2 (unqualified), position 4 is w1 (level 19).
        let store = line([19, 19, 1, 1, 19, 2]);
        let engine = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let now = Utc::now();

        let ids = engine.process_level_upgrade_at(&wallet(5), 2, now).unwrap();
        let original = store.reward(ids[0]).unwrap().unwrap();
        assert_eq!(original.recipient, wallet(3));
        assert_eq!(original.payout_depth, 2);

        let after_window = now + Duration::hours(73);
        let report = reconciler.run_cycle_at(after_window).unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.reallocated, 1);
        assert_eq!(report.unallocated, 0);

        // The original is terminally expired, never resurrected.
        let original = store.reward(original.id).unwrap().unwrap();
        assert_eq!(original.status, RewardStatus::Expired);

        // Exactly one replacement, at the first qualifying position
        // beyond payout_depth 2 — w1 at chain position 4 (w2 at 3 does
        // not qualify) — confirmed immediately with the identical amount.
        let replacements = store.rewards_for_recipient(&wallet(1)).unwrap();
        assert_eq!(replacements.len(), 1);
        let replacement = &replacements[0];
        assert_eq!(replacement.status, RewardStatus::Confirmed);
        assert_eq!(replacement.amount_cents, original.amount_cents);
        assert_eq!(replacement.payout_depth, 4);
        assert_eq!(replacement.expires_at, None);
        assert!(
            replacement
                .notes
                .as_deref()
                .unwrap()
                .contains(&original.id.to_string())
        );
    }

    #[test]
    fn expiry_without_qualified_upline_credits_sink_once() {
        // Nobody above position 2 qualifies for level 2.
        let store = line([1, 1, 1, 1, 1, 2]);
        let engine = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let now = Utc::now();

        let ids = engine.process_level_upgrade_at(&wallet(5), 2, now).unwrap();
        let amount = store.reward(ids[0]).unwrap().unwrap().amount_cents;

        let report = reconciler.run_cycle_at(now + Duration::hours(73)).unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.unallocated, 1);

        let entries = store.revenue_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount_cents, amount);
        assert_eq!(entries[0].reason, RevenueReason::NoQualifiedUpline);

        // A further cycle adds nothing: the reward is terminal.
        let report = reconciler.run_cycle_at(now + Duration::hours(80)).unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(store.revenue_entries().unwrap().len(), 1);
    }

    #[test]
    fn double_cycle_is_a_no_op() {
        // Position 3 of w5's chain is w2, holding level 2 < 3.
        let store = line([19, 19, 2, 19, 19, 5]);
        let engine = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let now = Utc::now();

        engine.process_level_upgrade_at(&wallet(5), 3, now).unwrap();
        store.set_member_level(&wallet(2), 3).unwrap();

        let first = reconciler.run_cycle_at(now + Duration::hours(1)).unwrap();
        assert_eq!(first.confirmed, 1);
        let second = reconciler.run_cycle_at(now + Duration::hours(1)).unwrap();
        assert_eq!(second, CycleReport::default());
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let store = line([19, 19, 1, 1, 19, 2]);
        let engine = DistributionEngine::new(Arc::clone(&store));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let now = Utc::now();

        let ids = engine.process_level_upgrade_at(&wallet(5), 2, now).unwrap();
        let expires_at = store.reward(ids[0]).unwrap().unwrap().expires_at.unwrap();

        // Exactly at the boundary: not yet expired.
        let report = reconciler.run_cycle_at(expires_at).unwrap();
        assert_eq!(report.expired, 0);
        // One tick past: expired.
        let report = reconciler
            .run_cycle_at(expires_at + Duration::seconds(1))
            .unwrap();
        assert_eq!(report.expired, 1);
    }

    #[test]
    fn batch_limit_bounds_the_sweep() {
        let store = line([19, 19, 19, 19, 19, 1]);
        let reconciler = Reconciler::with_batch_limit(Arc::clone(&store), 2);
        let now = Utc::now();

        for seed in 10..15u8 {
            add_member(&store, seed, 0, false);
            store
                .create_reward(NewReward {
                    recipient: wallet(seed),
                    source: wallet(5),
                    trigger_level: 2,
                    payout_depth: 2,
                    amount_cents: 150_00,
                    status: RewardStatus::Pending,
                    requires_level: 2,
                    expires_at: Some(now + Duration::hours(72)),
                    confirmed_at: None,
                    notes: None,
                    created_at: now,
                })
                .unwrap();
            store.activate_member(&wallet(seed)).unwrap();
            store.set_member_level(&wallet(seed), 2).unwrap();
        }

        let report = reconciler.run_cycle_at(now).unwrap();
        assert_eq!(report.confirmed, 2);
        let report = reconciler.run_cycle_at(now).unwrap();
        assert_eq!(report.confirmed, 2);
        let report = reconciler.run_cycle_at(now).unwrap();
        assert_eq!(report.confirmed, 1);
    }

    /// Delegating store whose directory fails for one wallet, to exercise
    /// per-item isolation.
    struct FailingDirectory {
        inner: Arc<MemoryStore>,
        poisoned: WalletAddress,
    }

    impl MemberDirectory for FailingDirectory {
        fn member(&self, wallet: &WalletAddress) -> Result<Option<MemberRecord>, StoreError> {
            if *wallet == self.poisoned {
                return Err(StoreError::Unavailable("directory timeout".into()));
            }
            self.inner.member(wallet)
        }
    }

    impl MatrixStore for FailingDirectory {
        fn node(&self, wallet: &WalletAddress) -> Result<Option<MatrixNode>, StoreError> {
            self.inner.node(wallet)
        }
        fn children(&self, parent: &WalletAddress) -> Result<Vec<MatrixNode>, StoreError> {
            self.inner.children(parent)
        }
        fn is_root(&self, wallet: &WalletAddress) -> Result<bool, StoreError> {
            self.inner.is_root(wallet)
        }
        fn register_root(&self, wallet: WalletAddress) -> Result<(), StoreError> {
            self.inner.register_root(wallet)
        }
        fn claim_slot(&self, node: MatrixNode) -> Result<(), StoreError> {
            self.inner.claim_slot(node)
        }
    }

    impl RewardLedger for FailingDirectory {
        fn record_upgrade(
            &self,
            member: &WalletAddress,
            trigger_level: u8,
            reward: Option<NewReward>,
            fee: Option<trellis_core::types::NewRevenue>,
        ) -> Result<trellis_core::types::UpgradeOutcome, StoreError> {
            self.inner.record_upgrade(member, trigger_level, reward, fee)
        }
        fn create_reward(&self, reward: NewReward) -> Result<Reward, StoreError> {
            self.inner.create_reward(reward)
        }
        fn credit_revenue(
            &self,
            entry: trellis_core::types::NewRevenue,
        ) -> Result<trellis_core::types::RevenueEntry, StoreError> {
            self.inner.credit_revenue(entry)
        }
        fn reward(&self, id: trellis_core::types::RewardId) -> Result<Option<Reward>, StoreError> {
            self.inner.reward(id)
        }
        fn rewards_by_status(
            &self,
            status: RewardStatus,
            limit: usize,
        ) -> Result<Vec<Reward>, StoreError> {
            self.inner.rewards_by_status(status, limit)
        }
        fn rewards_for_recipient(&self, wallet: &WalletAddress) -> Result<Vec<Reward>, StoreError> {
            self.inner.rewards_for_recipient(wallet)
        }
        fn transition(
            &self,
            id: trellis_core::types::RewardId,
            expected: RewardStatus,
            action: TransitionAction,
        ) -> Result<bool, StoreError> {
            self.inner.transition(id, expected, action)
        }
        fn revenue_entries(&self) -> Result<Vec<trellis_core::types::RevenueEntry>, StoreError> {
            self.inner.revenue_entries()
        }
    }

    #[test]
    fn item_failure_is_isolated() {
        let inner = line([19, 19, 19, 19, 19, 1]);
        let now = Utc::now();
        for (i, seed) in [20u8, 21, 22].iter().enumerate() {
            add_member(&inner, *seed, 2, true);
            inner
                .create_reward(NewReward {
                    recipient: wallet(*seed),
                    source: wallet(5),
                    trigger_level: 2,
                    payout_depth: i as u8 + 1,
                    amount_cents: 150_00,
                    status: RewardStatus::Pending,
                    requires_level: 2,
                    expires_at: Some(now + Duration::hours(72)),
                    confirmed_at: None,
                    notes: None,
                    created_at: now,
                })
                .unwrap();
        }

        let flaky = Arc::new(FailingDirectory {
            inner: Arc::clone(&inner),
            poisoned: wallet(21),
        });
        let reconciler = Reconciler::new(Arc::clone(&flaky));
        let report = reconciler.run_cycle_at(now).unwrap();

        // The poisoned item fails in isolation; its neighbors confirm.
        assert_eq!(report.confirmed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(inner.status_count(RewardStatus::Pending), 1);

        // Once the directory recovers, the next cycle picks it up.
        let reconciler = Reconciler::new(Arc::clone(&inner));
        let report = reconciler.run_cycle_at(now).unwrap();
        assert_eq!(report.confirmed, 1);
        assert_eq!(report.failed, 0);
    }
}
