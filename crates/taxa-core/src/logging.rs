//! Structured logging schema and field name constants for taxa.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, batch operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-row iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "closure", "import", "query"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "reconciler", "scheme_cache"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "refresh_closure", "set_tag_list", "import"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Scheme name being operated on.
pub const SCHEME: &str = "scheme";

/// Tag name being operated on.
pub const TAG: &str = "tag";

/// Taggable entity type being operated on.
pub const TAGGABLE_TYPE: &str = "taggable_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of closure rows inserted by a refresh.
pub const EDGE_COUNT: &str = "edge_count";

/// Number of assignments added by a reconciliation.
pub const ADDED_COUNT: &str = "added_count";

/// Number of assignments removed by a reconciliation.
pub const REMOVED_COUNT: &str = "removed_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
