//! # trellis-matrix — placement-tree engine.
//!
//! Implements the width-3 placement tree over the
//! [`MatrixStore`](trellis_core::traits::MatrixStore) seam:
//! - **Ancestor chains**: parent-pointer walks, nearest first, hard-capped
//!   at 19 hops.
//! - **Placement**: direct-slot placement under the sponsor, or
//!   breadth-first spillover filling the shallowest, left-most open slot
//!   (L → M → R at every node). Contended slots are resolved by the
//!   store's conditional claim write with search retry.
//! - **Stats**: direct/total/per-depth team counts and exact-layer views.

pub mod chain;
pub mod placement;
pub mod stats;

pub use chain::ChainIndex;
pub use placement::{Placement, PlacementEngine};
pub use stats::{ReferralStats, layer_members, referral_stats};
