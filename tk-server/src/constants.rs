//! Constants governing deadlines, caps, and throttles used across the server.

use std::time::Duration;

// ============================================================================
// DEADLINES (cancellation / timeouts)
// ============================================================================

pub const HEALTH_PROBE_DEADLINE: Duration = Duration::from_secs(1);
pub const INGEST_DEADLINE: Duration = Duration::from_secs(5);
pub const SYNC_DEADLINE: Duration = Duration::from_secs(3);

// ============================================================================
// EVENT VALIDATION (wire form limits)
// ============================================================================

pub const MAX_METADATA_PAIRS: usize = 64;
pub const MAX_METADATA_KEY_BYTES: usize = 128;
pub const MAX_METADATA_VALUE_BYTES: usize = 1024;
pub const MAX_METADATA_TOTAL_BYTES: usize = 64 * 1024;
pub const RESERVED_METADATA_PREFIX: &str = "$";

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Minimum interval between `last_used_at` writes for a given API key.
pub const LAST_USED_THROTTLE: Duration = Duration::from_secs(60);

pub const API_KEY_PREFIX: &str = "tk-v1-";
pub const API_KEY_TOTAL_LEN: usize = 102;

// ============================================================================
// CONNECTION POOL
// ============================================================================

pub const DEFAULT_DB_POOL_SIZE: usize = 16;
