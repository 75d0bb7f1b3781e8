//! # trellis-service-lib
//! Service composition for the Trellis engine: wires the in-memory store
//! and the three engines, schedules reconciler cycles, and exposes the
//! operations over JSON-RPC.

pub mod config;
pub mod rpc;
pub mod scheduler;
pub mod service;

pub use config::ServiceConfig;
pub use rpc::start_rpc_server;
pub use scheduler::spawn_reconciler;
pub use service::TrellisService;
