//! Reallocation of expired pending rewards.
//!
//! When a pending reward expires, its amount moves farther up the same
//! chain: the source member's chain is re-fetched and searched strictly
//! beyond the expired recipient's chain position for the first activated
//! ancestor holding the required level. The replacement reward is created
//! directly `Confirmed` — no fresh pending window — with an audit note
//! referencing the original. When the search exhausts the chain, the
//! amount is credited to unallocated revenue instead. The expired reward
//! itself is never resurrected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use trellis_core::error::StoreError;
use trellis_core::traits::{MatrixStore, MemberDirectory, RewardLedger};
use trellis_core::types::{
    NewReward, NewRevenue, Reward, RewardId, RewardStatus, RevenueId, RevenueReason,
};
use trellis_matrix::ChainIndex;

/// Where an expired reward's amount ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReallocationOutcome {
    /// A new confirmed reward was created for a qualifying ancestor.
    Reassigned(RewardId),
    /// No qualifying ancestor remained; the amount went to the sink.
    Unallocated(RevenueId),
}

/// Moves expired reward amounts up the chain.
pub struct Reallocator<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    store: Arc<S>,
    chain: ChainIndex<S>,
}

impl<S> Reallocator<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    /// Create a reallocator over the given store.
    pub fn new(store: Arc<S>) -> Self {
        let chain = ChainIndex::new(Arc::clone(&store));
        Self { store, chain }
    }

    /// Reallocate one expired reward.
    ///
    /// The caller must have won the `Pending -> Expired` transition for
    /// `expired`; that guard makes reallocation run at most once per
    /// reward even under overlapping reconciler cycles.
    pub fn reallocate(
        &self,
        expired: &Reward,
        now: DateTime<Utc>,
    ) -> Result<ReallocationOutcome, StoreError> {
        let chain = self.chain.chain_of(&expired.source)?;

        for link in chain.iter().filter(|l| l.depth > expired.payout_depth) {
            let Some(record) = self.store.member(&link.ancestor)? else {
                continue;
            };
            if !record.qualifies_for(expired.requires_level) {
                continue;
            }

            let reward = self.store.create_reward(NewReward {
                recipient: link.ancestor.clone(),
                source: expired.source.clone(),
                trigger_level: expired.trigger_level,
                payout_depth: link.depth,
                amount_cents: expired.amount_cents,
                status: RewardStatus::Confirmed,
                requires_level: expired.requires_level,
                expires_at: None,
                confirmed_at: Some(now),
                notes: Some(format!("reallocated from expired reward {}", expired.id)),
                created_at: now,
            })?;
            info!(
                original = %expired.id,
                replacement = %reward.id,
                recipient = %reward.recipient,
                payout_depth = reward.payout_depth,
                amount_cents = reward.amount_cents,
                "expired reward reallocated up the chain"
            );
            return Ok(ReallocationOutcome::Reassigned(reward.id));
        }

        let entry = self.store.credit_revenue(NewRevenue {
            source: expired.source.clone(),
            amount_cents: expired.amount_cents,
            reason: RevenueReason::NoQualifiedUpline,
            notes: Some(format!("expired reward {}", expired.id)),
            recorded_at: now,
        })?;
        info!(
            original = %expired.id,
            revenue = %entry.id,
            amount_cents = entry.amount_cents,
            "no qualified upline; amount credited to unallocated revenue"
        );
        Ok(ReallocationOutcome::Unallocated(entry.id))
    }
}
