//! Scheduled reconciler cycles.
//!
//! A single tokio task drives the reconciler on a fixed interval. The
//! administrative trigger (RPC `runreconciler`) calls the same service
//! method, so scheduled and manual invocations may overlap freely — the
//! conditional writes inside the reconciler make that safe.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::service::TrellisService;

/// Spawn the reconciler loop, running one cycle every `interval`.
///
/// The first cycle runs one full interval after startup. The returned
/// handle aborts the loop on drop via `JoinHandle::abort`.
pub fn spawn_reconciler(service: Arc<TrellisService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; consume the first tick so the
        // loop waits a full period before its first cycle.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match service.run_reconciler_cycle() {
                Ok(report) => info!(
                    confirmed = report.confirmed,
                    expired = report.expired,
                    reallocated = report.reallocated,
                    unallocated = report.unallocated,
                    failed = report.failed,
                    "scheduled reconciler cycle"
                ),
                Err(e) => warn!(error = %e, "scheduled reconciler cycle failed"),
            }
        }
    })
}
