//! Engine constants. All monetary values are in cents (100 cents = 1 unit).

/// Cents per whole unit.
pub const CENTS: u64 = 100;

/// Child slots per matrix node (L, M, R).
pub const MATRIX_WIDTH: usize = 3;

/// Hard cap on matrix depth and ancestor-chain length.
///
/// Ancestors beyond 19 hops are not represented; spillover search never
/// descends more than 19 layers below the sponsor.
pub const MAX_DEPTH: u8 = 19;

/// Highest membership level.
pub const MAX_LEVEL: u8 = 19;

/// Hours a pending reward may wait for the recipient to qualify before
/// it expires.
pub const PENDING_WINDOW_HOURS: i64 = 72;

/// Fixed platform fee charged on every Level-1 activation, in cents.
pub const PLATFORM_FEE_CENTS: u64 = 30 * CENTS;

/// Default number of pending rewards loaded per reconciler cycle.
pub const DEFAULT_BATCH_LIMIT: usize = 500;

/// Default seconds between scheduled reconciler cycles.
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

/// Consecutive slot-claim conflicts a placement attempt tolerates before
/// the conflict propagates as a transient store error.
pub const PLACEMENT_RETRY_LIMIT: usize = 8;

/// Default TCP port for the JSON-RPC server.
pub const DEFAULT_RPC_PORT: u16 = 18650;
