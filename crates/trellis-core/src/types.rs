//! Core domain types: wallets, matrix nodes, members, rewards, revenue.
//!
//! All monetary values are in cents (100 cents = 1 unit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// A participant wallet address in normalized form: `0x` followed by
/// 40 lowercase hex characters.
///
/// Parsing accepts mixed-case input and normalizes it to lowercase, so
/// two spellings of the same address always compare equal. Serialized
/// as a plain string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize an address string.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_core::types::WalletAddress;
    /// let w: WalletAddress = "0xAB00000000000000000000000000000000000001".parse().unwrap();
    /// assert_eq!(w.as_str(), "0xab00000000000000000000000000000000000001");
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let hex_part = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if hex_part.len() != 40 {
            return Err(AddressError::InvalidLength(hex_part.len()));
        }
        if let Some(c) = hex_part.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacter(c));
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    /// The normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build an address from a raw 20-byte value.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A child position under a matrix node.
///
/// Slots fill in fixed order: left, then middle, then right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "M")]
    Middle,
    #[serde(rename = "R")]
    Right,
}

impl Slot {
    /// All slots in fill order (L, M, R).
    pub const ALL: [Slot; 3] = [Slot::Left, Slot::Middle, Slot::Right];

    /// Single-letter form used in logs and wire DTOs.
    pub fn letter(&self) -> char {
        match self {
            Slot::Left => 'L',
            Slot::Middle => 'M',
            Slot::Right => 'R',
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A member's permanent position in the placement tree.
///
/// Created exactly once at placement, never updated or deleted. `parent`
/// may differ from the member's sponsor when spillover occurred. `depth`
/// is relative to the tree root and capped at
/// [`MAX_DEPTH`](crate::constants::MAX_DEPTH). Tree roots themselves are
/// registered separately and have no node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixNode {
    /// The placed member.
    pub member: WalletAddress,
    /// Direct placement parent.
    pub parent: WalletAddress,
    /// Root of the tree this member landed in.
    pub root: WalletAddress,
    /// Distance from the root, in `[1, MAX_DEPTH]`.
    pub depth: u8,
    /// Position under the parent.
    pub slot: Slot,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
}

/// Member state as read from the external member directory.
///
/// The directory owns and mutates level/activation; this core only reads
/// them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Wallet identity.
    pub wallet: WalletAddress,
    /// Current membership level, `0..=19`.
    pub current_level: u8,
    /// Whether the member has activated (reached Level 1).
    pub is_activated: bool,
    /// Who invited this member. Distinct from the matrix parent.
    pub sponsor: Option<WalletAddress>,
}

impl MemberRecord {
    /// Whether this member can receive a reward requiring `level`.
    pub fn qualifies_for(&self, level: u8) -> bool {
        self.is_activated && self.current_level >= level
    }
}

/// One hop in a member's ancestor chain, nearest first.
///
/// `depth` is the hop count from the member (1 = direct parent); `slot`
/// is the leg of `ancestor` through which the walk ascended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// The ancestor wallet at this chain position.
    pub ancestor: WalletAddress,
    /// Hop count from the member, `1..=MAX_DEPTH`.
    pub depth: u8,
    /// Which slot of `ancestor` the path descends through.
    pub slot: Slot,
}

/// Opaque reward handle assigned by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RewardId(pub u64);

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque unallocated-revenue handle assigned by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevenueId(pub u64);

impl fmt::Display for RevenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reward lifecycle state.
///
/// Legal transitions: `Pending -> Confirmed`, `Pending -> Expired`,
/// `Confirmed -> Claimed`. `Claimed` and `Expired` are terminal. All
/// transitions are applied through conditional store writes guarded by
/// the expected source state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    /// Awaiting recipient qualification within the pending window.
    Pending,
    /// Settled to the recipient; claimable.
    Confirmed,
    /// Claimed by the recipient; settlement reference recorded.
    Claimed,
    /// Pending window elapsed without qualification.
    Expired,
}

impl RewardStatus {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: RewardStatus) -> bool {
        matches!(
            (self, next),
            (RewardStatus::Pending, RewardStatus::Confirmed)
                | (RewardStatus::Pending, RewardStatus::Expired)
                | (RewardStatus::Confirmed, RewardStatus::Claimed)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RewardStatus::Claimed | RewardStatus::Expired)
    }
}

impl fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewardStatus::Pending => "pending",
            RewardStatus::Confirmed => "confirmed",
            RewardStatus::Claimed => "claimed",
            RewardStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A layer reward fired by a level upgrade.
///
/// `amount_cents` is immutable after creation, including through
/// reallocation: the replacement reward created on expiry carries the
/// identical amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Store-assigned handle.
    pub id: RewardId,
    /// Wallet the reward is payable to.
    pub recipient: WalletAddress,
    /// Member whose upgrade fired the reward.
    pub source: WalletAddress,
    /// The level the source upgraded to.
    pub trigger_level: u8,
    /// Chain position of the recipient at creation time.
    pub payout_depth: u8,
    /// Reward amount in cents.
    pub amount_cents: u64,
    /// Lifecycle state.
    pub status: RewardStatus,
    /// Level the recipient must hold for the reward to confirm.
    pub requires_level: u8,
    /// End of the pending window; `None` for rewards created confirmed.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the reward confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the reward was claimed.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Settlement transaction reference recorded at claim time.
    pub settlement_tx: Option<String>,
    /// Free-form audit note (e.g. reallocation provenance).
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Reward fields supplied at creation; the store assigns the id.
///
/// `status` must be `Pending` or `Confirmed` — rewards are never born
/// claimed or expired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReward {
    pub recipient: WalletAddress,
    pub source: WalletAddress,
    pub trigger_level: u8,
    pub payout_depth: u8,
    pub amount_cents: u64,
    pub status: RewardStatus,
    pub requires_level: u8,
    pub expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Why an amount landed in the unallocated-revenue sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueReason {
    /// Fixed per-activation platform fee.
    PlatformFee,
    /// Reallocation search exhausted the chain without a qualified ancestor.
    NoQualifiedUpline,
}

impl fmt::Display for RevenueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RevenueReason::PlatformFee => "platform fee",
            RevenueReason::NoQualifiedUpline => "no qualified upline",
        };
        f.write_str(s)
    }
}

/// An entry in the append-only unallocated-revenue ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueEntry {
    /// Store-assigned handle.
    pub id: RevenueId,
    /// Member whose upgrade or expired reward produced this entry.
    pub source: WalletAddress,
    /// Amount in cents.
    pub amount_cents: u64,
    /// Why the amount was not paid out.
    pub reason: RevenueReason,
    /// Free-form audit note.
    pub notes: Option<String>,
    /// Recording time.
    pub recorded_at: DateTime<Utc>,
}

/// Revenue fields supplied at creation; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRevenue {
    pub source: WalletAddress,
    pub amount_cents: u64,
    pub reason: RevenueReason,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Idempotency record for one processed upgrade event, keyed by
/// `(member, trigger_level)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    /// The upgrading member.
    pub member: WalletAddress,
    /// Level reached.
    pub trigger_level: u8,
    /// Reward created by this event, if any.
    pub reward: Option<RewardId>,
    /// Platform fee entry written by this event, if any.
    pub fee: Option<RevenueId>,
    /// Processing time.
    pub processed_at: DateTime<Utc>,
}

/// Result of an idempotent upgrade write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The event was new; reward/fee were committed.
    Applied(UpgradeReceipt),
    /// The `(member, trigger_level)` event was already processed; nothing
    /// was written. Carries the original receipt.
    Duplicate(UpgradeReceipt),
}

impl UpgradeOutcome {
    /// The receipt, whether freshly applied or replayed.
    pub fn receipt(&self) -> &UpgradeReceipt {
        match self {
            UpgradeOutcome::Applied(r) | UpgradeOutcome::Duplicate(r) => r,
        }
    }
}
