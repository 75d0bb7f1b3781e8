//! Error types for the Trellis engine.
use thiserror::Error;

use crate::types::{RewardId, RewardStatus, Slot, WalletAddress};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing 0x prefix")] MissingPrefix,
    #[error("invalid length: {0} hex chars, expected 40")] InvalidLength(usize),
    #[error("invalid hex character: {0}")] InvalidCharacter(char),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("wallet already placed: {0}")] DuplicatePlacement(WalletAddress),
    #[error("slot {slot} under {parent} already occupied")] SlotOccupied { parent: WalletAddress, slot: Slot },
    #[error("unknown member: {0}")] UnknownMember(WalletAddress),
    #[error("unknown reward: {0}")] UnknownReward(RewardId),
    #[error("illegal transition {from} -> {to}")] IllegalTransition { from: RewardStatus, to: RewardStatus },
    #[error("store unavailable: {0}")] Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("wallet already placed: {0}")] DuplicatePlacement(WalletAddress),
    #[error("referrer not found: {0}")] ReferrerNotFound(WalletAddress),
    #[error("matrix full: no open slot within {depth} layers under {sponsor}")] MatrixFull { sponsor: WalletAddress, depth: u8 },
    #[error("store: {0}")] Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("member not eligible: {0}")] MemberNotEligible(WalletAddress),
    #[error("invalid trigger level: {0}")] InvalidTriggerLevel(u8),
    #[error("reward not found: {0}")] RewardNotFound(RewardId),
    #[error("wallet {0} is not the reward recipient")] NotRecipient(WalletAddress),
    #[error("reward {id} is {status}, not claimable")] NotClaimable { id: RewardId, status: RewardStatus },
    #[error("store: {0}")] Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrellisError {
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] Placement(#[from] PlacementError),
    #[error(transparent)] Reward(#[from] RewardError),
    #[error(transparent)] Store(#[from] StoreError),
}
