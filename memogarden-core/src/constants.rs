/// MemoGarden kernel version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current on-disk schema version for both databases.
pub const SCHEMA_VERSION: &str = "20260130";

/// Margin applied to access deltas when extending a time horizon.
pub const SAFETY_COEFFICIENT: f64 = 1.2;

/// Initial time horizon granted to a new user relation, in days.
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

/// Default LRU-N working-set size.
pub const DEFAULT_CONTEXT_SIZE: usize = 7;

/// Smallest permitted LRU-N size.
pub const CONTEXT_SIZE_MIN: usize = 3;

/// Largest permitted LRU-N size.
pub const CONTEXT_SIZE_MAX: usize = 20;

/// Idle window within which successive views of one actor coalesce.
pub const VIEW_COALESCENCE_TIMEOUT_SECS: i64 = 300;

/// Entity types that never enter a context frame on visit.
pub const PRIMITIVE_TYPES: &[&str] = &["Schema", "SystemConfig", "ContextFrame"];

/// Attempts made before giving up on a UUID collision during entity create.
pub const UUID_COLLISION_RETRIES: usize = 3;
