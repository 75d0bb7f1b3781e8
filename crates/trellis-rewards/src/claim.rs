//! Claim settlement recording.
//!
//! When a recipient claims a confirmed reward, the external payment
//! executor performs the actual transfer; this module only records the
//! settlement reference against the reward, moving it `Confirmed ->
//! Claimed` under the usual conditional-write guard.

use chrono::{DateTime, Utc};
use tracing::info;

use trellis_core::error::RewardError;
use trellis_core::traits::{RewardLedger, TransitionAction};
use trellis_core::types::{Reward, RewardId, RewardStatus, WalletAddress};

/// Record a claim against a confirmed reward.
///
/// # Errors
///
/// - [`RewardError::RewardNotFound`] if `id` does not exist
/// - [`RewardError::NotRecipient`] if `claimer` is not the recipient
/// - [`RewardError::NotClaimable`] unless the reward is `Confirmed`
///   (including when a concurrent claim won the transition first)
pub fn record_claim<S: RewardLedger>(
    store: &S,
    id: RewardId,
    claimer: &WalletAddress,
    settlement_tx: String,
    now: DateTime<Utc>,
) -> Result<Reward, RewardError> {
    let reward = store.reward(id)?.ok_or(RewardError::RewardNotFound(id))?;
    if reward.recipient != *claimer {
        return Err(RewardError::NotRecipient(claimer.clone()));
    }
    if reward.status != RewardStatus::Confirmed {
        return Err(RewardError::NotClaimable {
            id,
            status: reward.status,
        });
    }

    let won = store.transition(
        id,
        RewardStatus::Confirmed,
        TransitionAction::Claim {
            at: now,
            settlement_tx: settlement_tx.clone(),
        },
    )?;
    if !won {
        let status = store
            .reward(id)?
            .map_or(RewardStatus::Confirmed, |r| r.status);
        return Err(RewardError::NotClaimable { id, status });
    }

    info!(reward = %id, claimer = %claimer, settlement_tx = %settlement_tx, "claim recorded");
    store.reward(id)?.ok_or(RewardError::RewardNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::store::MemoryStore;
    use trellis_core::types::NewReward;

    fn wallet(seed: u8) -> WalletAddress {
        WalletAddress::from_bytes([seed; 20])
    }

    fn confirmed_reward(store: &MemoryStore) -> Reward {
        let now = Utc::now();
        store
            .create_reward(NewReward {
                recipient: wallet(1),
                source: wallet(9),
                trigger_level: 2,
                payout_depth: 2,
                amount_cents: 150_00,
                status: RewardStatus::Confirmed,
                requires_level: 2,
                expires_at: None,
                confirmed_at: Some(now),
                notes: None,
                created_at: now,
            })
            .unwrap()
    }

    #[test]
    fn claim_records_settlement_reference() {
        let store = MemoryStore::new();
        let reward = confirmed_reward(&store);
        let now = Utc::now();

        let claimed =
            record_claim(&store, reward.id, &wallet(1), "0xfeed".into(), now).unwrap();
        assert_eq!(claimed.status, RewardStatus::Claimed);
        assert_eq!(claimed.claimed_at, Some(now));
        assert_eq!(claimed.settlement_tx.as_deref(), Some("0xfeed"));
    }

    #[test]
    fn claim_rejects_wrong_claimer() {
        let store = MemoryStore::new();
        let reward = confirmed_reward(&store);

        let err = record_claim(&store, reward.id, &wallet(2), "0xfeed".into(), Utc::now())
            .unwrap_err();
        assert_eq!(err, RewardError::NotRecipient(wallet(2)));
    }

    #[test]
    fn claim_rejects_double_claim() {
        let store = MemoryStore::new();
        let reward = confirmed_reward(&store);
        record_claim(&store, reward.id, &wallet(1), "0xfeed".into(), Utc::now()).unwrap();

        let err = record_claim(&store, reward.id, &wallet(1), "0xbeef".into(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            RewardError::NotClaimable {
                id: reward.id,
                status: RewardStatus::Claimed
            }
        );
    }

    #[test]
    fn claim_rejects_pending_reward() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let pending = store
            .create_reward(NewReward {
                recipient: wallet(1),
                source: wallet(9),
                trigger_level: 2,
                payout_depth: 2,
                amount_cents: 150_00,
                status: RewardStatus::Pending,
                requires_level: 2,
                expires_at: Some(now),
                confirmed_at: None,
                notes: None,
                created_at: now,
            })
            .unwrap();

        let err =
            record_claim(&store, pending.id, &wallet(1), "0xfeed".into(), now).unwrap_err();
        assert_eq!(
            err,
            RewardError::NotClaimable {
                id: pending.id,
                status: RewardStatus::Pending
            }
        );
    }

    #[test]
    fn claim_rejects_unknown_reward() {
        let store = MemoryStore::new();
        let err = record_claim(&store, RewardId(7), &wallet(1), "0xfeed".into(), Utc::now())
            .unwrap_err();
        assert_eq!(err, RewardError::RewardNotFound(RewardId(7)));
    }
}
