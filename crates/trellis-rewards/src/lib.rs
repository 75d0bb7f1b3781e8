//! # trellis-rewards — reward settlement engine.
//!
//! Settles the layer rewards fired by membership upgrades:
//! - **Distribution**: on a Level-N upgrade, pays `50 + 50·N` units to the
//!   N-th chain ancestor — `Confirmed` if the ancestor already qualifies,
//!   `Pending` with a 72-hour window otherwise. Level-1 upgrades
//!   additionally credit the fixed platform fee to unallocated revenue.
//! - **Reconciliation**: a batched, idempotent sweep that confirms
//!   qualifying pending rewards and expires timed-out ones. Every
//!   transition is a conditional write, so overlapping cycles are safe.
//! - **Reallocation**: an expired reward's amount moves up the same chain
//!   to the first qualifying ancestor, or into the unallocated-revenue
//!   sink when none exists.
//! - **Claim recording**: `Confirmed -> Claimed` with the settlement
//!   transaction reference; the transfer itself is the external payment
//!   executor's job.

pub mod claim;
pub mod distribution;
pub mod reallocation;
pub mod reconciler;

pub use claim::record_claim;
pub use distribution::DistributionEngine;
pub use reallocation::{ReallocationOutcome, Reallocator};
pub use reconciler::{CycleReport, Reconciler};
