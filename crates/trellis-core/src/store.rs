//! In-memory store implementing all three persistence seams.
//!
//! [`MemoryStore`] backs the shipped service and the test suites; a
//! persistent backend would implement the same traits
//! ([`MemberDirectory`], [`MatrixStore`], [`RewardLedger`]). The matrix
//! and ledger partitions each sit behind their own `RwLock`, making the
//! conditional writes (`claim_slot`, `transition`, `record_upgrade`)
//! atomic with respect to concurrent callers; the member directory is a
//! concurrent map mutated only through the external-directory helpers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::{
    MatrixNode, MemberRecord, NewReward, NewRevenue, Reward, RewardId, RewardStatus, RevenueEntry,
    RevenueId, Slot, UpgradeOutcome, UpgradeReceipt, WalletAddress,
};
use crate::traits::{MatrixStore, MemberDirectory, RewardLedger, TransitionAction};

/// Placement-tree partition: primary node table plus a per-parent slot
/// index and the registered-root set.
#[derive(Default)]
struct MatrixInner {
    /// Primary storage: member -> node.
    nodes: HashMap<WalletAddress, MatrixNode>,
    /// Slot index: parent -> occupied slots. `BTreeMap` keeps children
    /// iteration in L, M, R order.
    children: HashMap<WalletAddress, BTreeMap<Slot, WalletAddress>>,
    /// Registered tree roots (company seed wallets, no node of their own).
    roots: HashSet<WalletAddress>,
}

/// Reward/revenue partition. Reward ids are monotonic, so id order is
/// creation order and the `BTreeMap`/`BTreeSet` indexes iterate oldest
/// first.
#[derive(Default)]
struct LedgerInner {
    rewards: BTreeMap<RewardId, Reward>,
    by_status: HashMap<RewardStatus, BTreeSet<RewardId>>,
    by_recipient: HashMap<WalletAddress, Vec<RewardId>>,
    revenue: Vec<RevenueEntry>,
    /// Idempotency receipts keyed by `(member, trigger_level)`.
    upgrades: HashMap<(WalletAddress, u8), UpgradeReceipt>,
    next_reward_id: u64,
    next_revenue_id: u64,
}

impl LedgerInner {
    fn insert_reward(&mut self, new: NewReward) -> Reward {
        self.next_reward_id += 1;
        let reward = Reward {
            id: RewardId(self.next_reward_id),
            recipient: new.recipient,
            source: new.source,
            trigger_level: new.trigger_level,
            payout_depth: new.payout_depth,
            amount_cents: new.amount_cents,
            status: new.status,
            requires_level: new.requires_level,
            expires_at: new.expires_at,
            confirmed_at: new.confirmed_at,
            claimed_at: None,
            settlement_tx: None,
            notes: new.notes,
            created_at: new.created_at,
        };
        self.by_status.entry(reward.status).or_default().insert(reward.id);
        self.by_recipient
            .entry(reward.recipient.clone())
            .or_default()
            .push(reward.id);
        self.rewards.insert(reward.id, reward.clone());
        reward
    }

    fn insert_revenue(&mut self, new: NewRevenue) -> RevenueEntry {
        self.next_revenue_id += 1;
        let entry = RevenueEntry {
            id: RevenueId(self.next_revenue_id),
            source: new.source,
            amount_cents: new.amount_cents,
            reason: new.reason,
            notes: new.notes,
            recorded_at: new.recorded_at,
        };
        self.revenue.push(entry.clone());
        entry
    }
}

/// In-memory implementation of the member directory, matrix store, and
/// reward ledger.
#[derive(Default)]
pub struct MemoryStore {
    matrix: RwLock<MatrixInner>,
    ledger: RwLock<LedgerInner>,
    members: DashMap<WalletAddress, MemberRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a member record — the external-directory side
    /// of the seam (bootstrap, tests, RPC admin).
    pub fn upsert_member(&self, record: MemberRecord) {
        self.members.insert(record.wallet.clone(), record);
    }

    /// Set a member's current level.
    pub fn set_member_level(&self, wallet: &WalletAddress, level: u8) -> Result<(), StoreError> {
        let mut record = self
            .members
            .get_mut(wallet)
            .ok_or_else(|| StoreError::UnknownMember(wallet.clone()))?;
        record.current_level = level;
        Ok(())
    }

    /// Mark a member activated.
    pub fn activate_member(&self, wallet: &WalletAddress) -> Result<(), StoreError> {
        let mut record = self
            .members
            .get_mut(wallet)
            .ok_or_else(|| StoreError::UnknownMember(wallet.clone()))?;
        record.is_activated = true;
        Ok(())
    }

    /// Number of known members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of placed nodes (roots excluded).
    pub fn node_count(&self) -> usize {
        self.matrix.read().nodes.len()
    }

    /// Number of registered tree roots.
    pub fn root_count(&self) -> usize {
        self.matrix.read().roots.len()
    }

    /// Number of rewards currently in `status`.
    pub fn status_count(&self, status: RewardStatus) -> usize {
        self.ledger
            .read()
            .by_status
            .get(&status)
            .map_or(0, |set| set.len())
    }
}

impl MemberDirectory for MemoryStore {
    fn member(&self, wallet: &WalletAddress) -> Result<Option<MemberRecord>, StoreError> {
        Ok(self.members.get(wallet).map(|r| r.clone()))
    }
}

impl MatrixStore for MemoryStore {
    fn node(&self, wallet: &WalletAddress) -> Result<Option<MatrixNode>, StoreError> {
        Ok(self.matrix.read().nodes.get(wallet).cloned())
    }

    fn children(&self, parent: &WalletAddress) -> Result<Vec<MatrixNode>, StoreError> {
        let inner = self.matrix.read();
        let Some(slots) = inner.children.get(parent) else {
            return Ok(Vec::new());
        };
        Ok(slots
            .values()
            .filter_map(|member| inner.nodes.get(member).cloned())
            .collect())
    }

    fn is_root(&self, wallet: &WalletAddress) -> Result<bool, StoreError> {
        Ok(self.matrix.read().roots.contains(wallet))
    }

    fn register_root(&self, wallet: WalletAddress) -> Result<(), StoreError> {
        let mut inner = self.matrix.write();
        if inner.nodes.contains_key(&wallet) || inner.roots.contains(&wallet) {
            return Err(StoreError::DuplicatePlacement(wallet));
        }
        inner.roots.insert(wallet);
        Ok(())
    }

    fn claim_slot(&self, node: MatrixNode) -> Result<(), StoreError> {
        let mut inner = self.matrix.write();
        if inner.nodes.contains_key(&node.member) || inner.roots.contains(&node.member) {
            return Err(StoreError::DuplicatePlacement(node.member));
        }
        let slots = inner.children.entry(node.parent.clone()).or_default();
        if slots.contains_key(&node.slot) {
            return Err(StoreError::SlotOccupied {
                parent: node.parent,
                slot: node.slot,
            });
        }
        slots.insert(node.slot, node.member.clone());
        inner.nodes.insert(node.member.clone(), node);
        Ok(())
    }
}

impl RewardLedger for MemoryStore {
    fn record_upgrade(
        &self,
        member: &WalletAddress,
        trigger_level: u8,
        reward: Option<NewReward>,
        fee: Option<NewRevenue>,
    ) -> Result<UpgradeOutcome, StoreError> {
        let mut inner = self.ledger.write();
        let key = (member.clone(), trigger_level);
        if let Some(receipt) = inner.upgrades.get(&key) {
            return Ok(UpgradeOutcome::Duplicate(receipt.clone()));
        }

        let processed_at = reward
            .as_ref()
            .map(|r| r.created_at)
            .or_else(|| fee.as_ref().map(|f| f.recorded_at))
            .unwrap_or_else(Utc::now);
        let reward_id = reward.map(|r| inner.insert_reward(r).id);
        let fee_id = fee.map(|f| inner.insert_revenue(f).id);
        let receipt = UpgradeReceipt {
            member: member.clone(),
            trigger_level,
            reward: reward_id,
            fee: fee_id,
            processed_at,
        };
        inner.upgrades.insert(key, receipt.clone());
        Ok(UpgradeOutcome::Applied(receipt))
    }

    fn create_reward(&self, reward: NewReward) -> Result<Reward, StoreError> {
        Ok(self.ledger.write().insert_reward(reward))
    }

    fn credit_revenue(&self, entry: NewRevenue) -> Result<RevenueEntry, StoreError> {
        Ok(self.ledger.write().insert_revenue(entry))
    }

    fn reward(&self, id: RewardId) -> Result<Option<Reward>, StoreError> {
        Ok(self.ledger.read().rewards.get(&id).cloned())
    }

    fn rewards_by_status(
        &self,
        status: RewardStatus,
        limit: usize,
    ) -> Result<Vec<Reward>, StoreError> {
        let inner = self.ledger.read();
        let Some(ids) = inner.by_status.get(&status) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .take(limit)
            .filter_map(|id| inner.rewards.get(id).cloned())
            .collect())
    }

    fn rewards_for_recipient(&self, wallet: &WalletAddress) -> Result<Vec<Reward>, StoreError> {
        let inner = self.ledger.read();
        let Some(ids) = inner.by_recipient.get(wallet) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.rewards.get(id).cloned())
            .collect())
    }

    fn transition(
        &self,
        id: RewardId,
        expected: RewardStatus,
        action: TransitionAction,
    ) -> Result<bool, StoreError> {
        let target = action.target_status();
        if !expected.can_transition_to(target) {
            return Err(StoreError::IllegalTransition {
                from: expected,
                to: target,
            });
        }

        let mut inner = self.ledger.write();
        let reward = inner
            .rewards
            .get_mut(&id)
            .ok_or(StoreError::UnknownReward(id))?;
        if reward.status != expected {
            return Ok(false);
        }

        reward.status = target;
        match action {
            TransitionAction::Confirm { at } => reward.confirmed_at = Some(at),
            TransitionAction::Expire => {}
            TransitionAction::Claim { at, settlement_tx } => {
                reward.claimed_at = Some(at);
                reward.settlement_tx = Some(settlement_tx);
            }
        }

        if let Some(set) = inner.by_status.get_mut(&expected) {
            set.remove(&id);
        }
        inner.by_status.entry(target).or_default().insert(id);
        Ok(true)
    }

    fn revenue_entries(&self) -> Result<Vec<RevenueEntry>, StoreError> {
        Ok(self.ledger.read().revenue.clone())
    }
}
