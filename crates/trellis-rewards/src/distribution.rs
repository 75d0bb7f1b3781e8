//! Reward distribution on level upgrades.
//!
//! The N-th ancestor is selected by chain *position*, not by matrix
//! depth: `chain[N-1]` as returned by the chain index. `payout_depth`
//! stores that chain position at creation time; the reconciler's
//! reallocation search resumes strictly beyond it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use trellis_core::constants::{PENDING_WINDOW_HOURS, PLATFORM_FEE_CENTS};
use trellis_core::error::RewardError;
use trellis_core::schedule::{is_valid_trigger_level, level_reward_cents};
use trellis_core::traits::{MatrixStore, MemberDirectory, RewardLedger};
use trellis_core::types::{
    NewReward, NewRevenue, RewardId, RewardStatus, RevenueReason, UpgradeOutcome, WalletAddress,
};
use trellis_matrix::ChainIndex;

/// Computes and records the rewards fired by a level upgrade.
pub struct DistributionEngine<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    store: Arc<S>,
    chain: ChainIndex<S>,
}

impl<S> DistributionEngine<S>
where
    S: MatrixStore + RewardLedger + MemberDirectory,
{
    /// Create an engine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        let chain = ChainIndex::new(Arc::clone(&store));
        Self { store, chain }
    }

    /// Process an upgrade event at the current wall-clock time.
    pub fn process_level_upgrade(
        &self,
        member: &WalletAddress,
        trigger_level: u8,
    ) -> Result<Vec<RewardId>, RewardError> {
        self.process_level_upgrade_at(member, trigger_level, Utc::now())
    }

    /// Process an upgrade event: select the target ancestor, write the
    /// reward (and the Level-1 platform fee) as one atomic unit.
    ///
    /// Returns the ids of the rewards this event created — empty when
    /// the member's chain is shorter than `trigger_level` (a logged
    /// no-op, not an error). Replays of the same `(member,
    /// trigger_level)` event return the original ids without writing.
    ///
    /// # Errors
    ///
    /// - [`RewardError::InvalidTriggerLevel`] unless `1 <= trigger_level <= 19`
    /// - [`RewardError::MemberNotEligible`] if the member is unknown or
    ///   not activated
    pub fn process_level_upgrade_at(
        &self,
        member: &WalletAddress,
        trigger_level: u8,
        now: DateTime<Utc>,
    ) -> Result<Vec<RewardId>, RewardError> {
        if !is_valid_trigger_level(trigger_level) {
            return Err(RewardError::InvalidTriggerLevel(trigger_level));
        }
        let record = self
            .store
            .member(member)?
            .filter(|m| m.is_activated)
            .ok_or_else(|| RewardError::MemberNotEligible(member.clone()))?;

        let amount_cents = level_reward_cents(trigger_level);
        let chain = self.chain.chain_of(&record.wallet)?;

        let reward = if chain.len() < trigger_level as usize {
            info!(
                member = %member,
                trigger_level,
                chain_len = chain.len(),
                "no ancestor at chain position; no reward created"
            );
            None
        } else {
            let target = &chain[trigger_level as usize - 1];
            let target_record = self.store.member(&target.ancestor)?;
            let qualifies = target_record
                .as_ref()
                .is_some_and(|m| m.qualifies_for(trigger_level));

            let new = if qualifies {
                NewReward {
                    recipient: target.ancestor.clone(),
                    source: member.clone(),
                    trigger_level,
                    payout_depth: target.depth,
                    amount_cents,
                    status: RewardStatus::Confirmed,
                    requires_level: trigger_level,
                    expires_at: None,
                    confirmed_at: Some(now),
                    notes: None,
                    created_at: now,
                }
            } else {
                NewReward {
                    recipient: target.ancestor.clone(),
                    source: member.clone(),
                    trigger_level,
                    payout_depth: target.depth,
                    amount_cents,
                    status: RewardStatus::Pending,
                    requires_level: trigger_level,
                    expires_at: Some(now + Duration::hours(PENDING_WINDOW_HOURS)),
                    confirmed_at: None,
                    notes: None,
                    created_at: now,
                }
            };
            Some(new)
        };

        // Level-1 upgrades carry the fixed platform fee regardless of the
        // reward outcome.
        let fee = (trigger_level == 1).then(|| NewRevenue {
            source: member.clone(),
            amount_cents: PLATFORM_FEE_CENTS,
            reason: RevenueReason::PlatformFee,
            notes: None,
            recorded_at: now,
        });

        match self
            .store
            .record_upgrade(member, trigger_level, reward, fee)?
        {
            UpgradeOutcome::Applied(receipt) => {
                if let Some(id) = receipt.reward {
                    info!(
                        member = %member,
                        trigger_level,
                        reward = %id,
                        amount_cents,
                        "upgrade reward recorded"
                    );
                }
                Ok(receipt.reward.into_iter().collect())
            }
            UpgradeOutcome::Duplicate(receipt) => {
                debug!(
                    member = %member,
                    trigger_level,
                    "upgrade already processed; returning original receipt"
                );
                Ok(receipt.reward.into_iter().collect())
            }
        }
    }
}
