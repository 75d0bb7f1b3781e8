//! Service configuration.
//!
//! Provides [`ServiceConfig`] with defaults for RPC binding and
//! reconciler cadence. Customized programmatically or from CLI flags in
//! the service binary.

use trellis_core::constants::{
    DEFAULT_BATCH_LIMIT, DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_RPC_PORT,
};

/// Configuration for a service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Seconds between scheduled reconciler cycles.
    pub reconcile_interval_secs: u64,
    /// Pending rewards loaded per reconciler cycle.
    pub batch_limit: usize,
    /// Log level filter string (e.g. "info", "debug", "trellis_rewards=trace").
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            batch_limit: DEFAULT_BATCH_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rpc_port() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.rpc_port, DEFAULT_RPC_PORT);
    }

    #[test]
    fn default_rpc_bind_is_localhost() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.rpc_bind, "127.0.0.1");
    }

    #[test]
    fn default_cadence_is_hourly() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.reconcile_interval_secs, 3600);
        assert_eq!(cfg.batch_limit, 500);
    }

    #[test]
    fn rpc_addr_joins_bind_and_port() {
        let cfg = ServiceConfig {
            rpc_bind: "0.0.0.0".into(),
            rpc_port: 9000,
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.rpc_addr(), "0.0.0.0:9000");
    }
}
