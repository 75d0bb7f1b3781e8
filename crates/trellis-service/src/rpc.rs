//! JSON-RPC server for the Trellis service.
//!
//! Uses jsonrpsee 0.24 to expose placement, upgrade processing, chain
//! and stats queries, claim recording, the administrative reconciler
//! trigger, and the external-directory write path.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use trellis_core::error::{StoreError, TrellisError};
use trellis_core::types::{
    ChainLink, MatrixNode, MemberRecord, Reward, RewardId, RevenueEntry, WalletAddress,
};
use trellis_matrix::{Placement, ReferralStats};
use trellis_rewards::CycleReport;

use crate::service::{ServiceInfo, TrellisService};

/// JSON representation of a placement result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementJson {
    /// Parent the member was placed under.
    pub parent: String,
    /// Root of the tree the member landed in.
    pub root: String,
    /// Absolute depth of the new node.
    pub depth: u8,
    /// Claimed slot ("L", "M", or "R").
    pub slot: String,
    /// Whether spillover occurred.
    pub spillover: bool,
}

impl From<Placement> for PlacementJson {
    fn from(p: Placement) -> Self {
        Self {
            parent: p.parent.to_string(),
            root: p.root.to_string(),
            depth: p.depth,
            slot: p.slot.to_string(),
            spillover: p.spillover,
        }
    }
}

/// JSON representation of one ancestor-chain link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainLinkJson {
    /// Ancestor wallet.
    pub ancestor: String,
    /// Hop count from the member.
    pub depth: u8,
    /// Leg of the ancestor the path descends through.
    pub slot: String,
}

impl From<ChainLink> for ChainLinkJson {
    fn from(l: ChainLink) -> Self {
        Self {
            ancestor: l.ancestor.to_string(),
            depth: l.depth,
            slot: l.slot.to_string(),
        }
    }
}

/// JSON representation of a matrix node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeJson {
    /// The placed member.
    pub member: String,
    /// Direct placement parent.
    pub parent: String,
    /// Tree root.
    pub root: String,
    /// Absolute depth.
    pub depth: u8,
    /// Slot under the parent.
    pub slot: String,
    /// Placement time (RFC 3339).
    pub placed_at: String,
}

impl From<MatrixNode> for NodeJson {
    fn from(n: MatrixNode) -> Self {
        Self {
            member: n.member.to_string(),
            parent: n.parent.to_string(),
            root: n.root.to_string(),
            depth: n.depth,
            slot: n.slot.to_string(),
            placed_at: n.placed_at.to_rfc3339(),
        }
    }
}

/// JSON representation of a reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardJson {
    /// Reward id.
    pub id: u64,
    /// Recipient wallet.
    pub recipient: String,
    /// Source (upgrading) wallet.
    pub source: String,
    /// Trigger level.
    pub trigger_level: u8,
    /// Chain position targeted at creation.
    pub payout_depth: u8,
    /// Amount in cents.
    pub amount_cents: u64,
    /// Lifecycle state.
    pub status: String,
    /// Level required to confirm.
    pub requires_level: u8,
    /// Pending-window end (RFC 3339), if any.
    pub expires_at: Option<String>,
    /// Confirmation time (RFC 3339), if any.
    pub confirmed_at: Option<String>,
    /// Claim time (RFC 3339), if any.
    pub claimed_at: Option<String>,
    /// Settlement transaction reference, if claimed.
    pub settlement_tx: Option<String>,
    /// Audit note, if any.
    pub notes: Option<String>,
    /// Creation time (RFC 3339).
    pub created_at: String,
}

impl From<Reward> for RewardJson {
    fn from(r: Reward) -> Self {
        Self {
            id: r.id.0,
            recipient: r.recipient.to_string(),
            source: r.source.to_string(),
            trigger_level: r.trigger_level,
            payout_depth: r.payout_depth,
            amount_cents: r.amount_cents,
            status: r.status.to_string(),
            requires_level: r.requires_level,
            expires_at: r.expires_at.map(|t| t.to_rfc3339()),
            confirmed_at: r.confirmed_at.map(|t| t.to_rfc3339()),
            claimed_at: r.claimed_at.map(|t| t.to_rfc3339()),
            settlement_tx: r.settlement_tx,
            notes: r.notes,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// JSON representation of an unallocated-revenue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueJson {
    /// Entry id.
    pub id: u64,
    /// Source wallet.
    pub source: String,
    /// Amount in cents.
    pub amount_cents: u64,
    /// Sink reason.
    pub reason: String,
    /// Audit note, if any.
    pub notes: Option<String>,
    /// Recording time (RFC 3339).
    pub recorded_at: String,
}

impl From<RevenueEntry> for RevenueJson {
    fn from(e: RevenueEntry) -> Self {
        Self {
            id: e.id.0,
            source: e.source.to_string(),
            amount_cents: e.amount_cents,
            reason: e.reason.to_string(),
            notes: e.notes,
            recorded_at: e.recorded_at.to_rfc3339(),
        }
    }
}

/// Parse a wallet address parameter.
pub fn parse_wallet(s: &str) -> Result<WalletAddress, ErrorObjectOwned> {
    WalletAddress::parse(s).map_err(|e| rpc_error(-32602, &e.to_string()))
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

/// Map an engine error onto a JSON-RPC error.
fn map_error(e: TrellisError) -> ErrorObjectOwned {
    match &e {
        // Transient backend failures; everything else is a caller error.
        TrellisError::Store(StoreError::Unavailable(_)) => rpc_error(-32000, &e.to_string()),
        _ => rpc_error(-32001, &e.to_string()),
    }
}

/// The Trellis JSON-RPC interface.
#[rpc(server)]
pub trait TrellisRpc {
    /// Places a new member under a sponsor.
    #[method(name = "placemember")]
    async fn place_member(
        &self,
        member: String,
        sponsor: String,
    ) -> Result<PlacementJson, ErrorObjectOwned>;

    /// Processes a level-upgrade event; returns created reward ids.
    #[method(name = "processupgrade")]
    async fn process_upgrade(
        &self,
        member: String,
        trigger_level: u8,
    ) -> Result<Vec<u64>, ErrorObjectOwned>;

    /// Runs one reconciler cycle (administrative trigger).
    #[method(name = "runreconciler")]
    async fn run_reconciler(&self) -> Result<CycleReport, ErrorObjectOwned>;

    /// Returns a member's ancestor chain, nearest first.
    #[method(name = "getchain")]
    async fn get_chain(&self, wallet: String) -> Result<Vec<ChainLinkJson>, ErrorObjectOwned>;

    /// Returns team counts for a wallet's subtree.
    #[method(name = "getreferralstats")]
    async fn get_referral_stats(
        &self,
        wallet: String,
    ) -> Result<ReferralStats, ErrorObjectOwned>;

    /// Returns the members exactly `depth` layers below a wallet.
    #[method(name = "getlayermembers")]
    async fn get_layer_members(
        &self,
        wallet: String,
        depth: u8,
    ) -> Result<Vec<NodeJson>, ErrorObjectOwned>;

    /// Returns all rewards payable to a wallet.
    #[method(name = "getrewards")]
    async fn get_rewards(&self, wallet: String) -> Result<Vec<RewardJson>, ErrorObjectOwned>;

    /// Returns a reward by id.
    #[method(name = "getreward")]
    async fn get_reward(&self, id: u64) -> Result<RewardJson, ErrorObjectOwned>;

    /// Returns the unallocated-revenue ledger.
    #[method(name = "getrevenue")]
    async fn get_revenue(&self) -> Result<Vec<RevenueJson>, ErrorObjectOwned>;

    /// Records a claim settlement reference against a confirmed reward.
    #[method(name = "recordclaim")]
    async fn record_claim(
        &self,
        id: u64,
        claimer: String,
        settlement_tx: String,
    ) -> Result<RewardJson, ErrorObjectOwned>;

    /// Registers a tree root (bootstrap path).
    #[method(name = "registerroot")]
    async fn register_root(&self, wallet: String) -> Result<bool, ErrorObjectOwned>;

    /// Inserts or replaces a member record (external-directory side).
    #[method(name = "upsertmember")]
    async fn upsert_member(
        &self,
        wallet: String,
        current_level: u8,
        is_activated: bool,
        sponsor: Option<String>,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Sets a member's current level (external-directory side).
    #[method(name = "setmemberlevel")]
    async fn set_member_level(
        &self,
        wallet: String,
        level: u8,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Returns aggregate service counters.
    #[method(name = "getinfo")]
    async fn get_info(&self) -> Result<ServiceInfo, ErrorObjectOwned>;
}

/// Implementation of the Trellis JSON-RPC server.
pub struct RpcServerImpl {
    service: Arc<TrellisService>,
}

impl RpcServerImpl {
    /// Create an RPC server implementation wrapping the given service.
    pub fn new(service: Arc<TrellisService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TrellisRpcServer for RpcServerImpl {
    async fn place_member(
        &self,
        member: String,
        sponsor: String,
    ) -> Result<PlacementJson, ErrorObjectOwned> {
        let member = parse_wallet(&member)?;
        let sponsor = parse_wallet(&sponsor)?;
        self.service
            .place_member(&member, &sponsor)
            .map(PlacementJson::from)
            .map_err(map_error)
    }

    async fn process_upgrade(
        &self,
        member: String,
        trigger_level: u8,
    ) -> Result<Vec<u64>, ErrorObjectOwned> {
        let member = parse_wallet(&member)?;
        self.service
            .process_level_upgrade(&member, trigger_level)
            .map(|ids| ids.into_iter().map(|id| id.0).collect())
            .map_err(map_error)
    }

    async fn run_reconciler(&self) -> Result<CycleReport, ErrorObjectOwned> {
        self.service.run_reconciler_cycle().map_err(map_error)
    }

    async fn get_chain(&self, wallet: String) -> Result<Vec<ChainLinkJson>, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service
            .chain_of(&wallet)
            .map(|links| links.into_iter().map(ChainLinkJson::from).collect())
            .map_err(map_error)
    }

    async fn get_referral_stats(
        &self,
        wallet: String,
    ) -> Result<ReferralStats, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service.referral_stats(&wallet).map_err(map_error)
    }

    async fn get_layer_members(
        &self,
        wallet: String,
        depth: u8,
    ) -> Result<Vec<NodeJson>, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service
            .layer_members(&wallet, depth)
            .map(|nodes| nodes.into_iter().map(NodeJson::from).collect())
            .map_err(map_error)
    }

    async fn get_rewards(&self, wallet: String) -> Result<Vec<RewardJson>, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service
            .rewards_for(&wallet)
            .map(|rewards| rewards.into_iter().map(RewardJson::from).collect())
            .map_err(map_error)
    }

    async fn get_reward(&self, id: u64) -> Result<RewardJson, ErrorObjectOwned> {
        self.service
            .reward(RewardId(id))
            .map_err(map_error)?
            .map(RewardJson::from)
            .ok_or_else(|| rpc_error(-32001, "reward not found"))
    }

    async fn get_revenue(&self) -> Result<Vec<RevenueJson>, ErrorObjectOwned> {
        self.service
            .revenue_entries()
            .map(|entries| entries.into_iter().map(RevenueJson::from).collect())
            .map_err(map_error)
    }

    async fn record_claim(
        &self,
        id: u64,
        claimer: String,
        settlement_tx: String,
    ) -> Result<RewardJson, ErrorObjectOwned> {
        let claimer = parse_wallet(&claimer)?;
        self.service
            .record_claim(RewardId(id), &claimer, settlement_tx)
            .map(RewardJson::from)
            .map_err(map_error)
    }

    async fn register_root(&self, wallet: String) -> Result<bool, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service.register_root(wallet).map_err(map_error)?;
        Ok(true)
    }

    async fn upsert_member(
        &self,
        wallet: String,
        current_level: u8,
        is_activated: bool,
        sponsor: Option<String>,
    ) -> Result<bool, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        let sponsor = sponsor.as_deref().map(parse_wallet).transpose()?;
        self.service.upsert_member(MemberRecord {
            wallet,
            current_level,
            is_activated,
            sponsor,
        });
        Ok(true)
    }

    async fn set_member_level(
        &self,
        wallet: String,
        level: u8,
    ) -> Result<bool, ErrorObjectOwned> {
        let wallet = parse_wallet(&wallet)?;
        self.service
            .set_member_level(&wallet, level)
            .map_err(map_error)?;
        Ok(true)
    }

    async fn get_info(&self) -> Result<ServiceInfo, ErrorObjectOwned> {
        self.service.info().map_err(map_error)
    }
}

/// Start the JSON-RPC server on the given address.
pub async fn start_rpc_server(
    addr: &str,
    service: Arc<TrellisService>,
) -> Result<ServerHandle, TrellisError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| StoreError::Unavailable(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(service);
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}
