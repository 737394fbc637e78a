/// Owner recorded on every vacant room.
pub const UNKNOWN_OWNER: &str = "Unknown";

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 55;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

pub const MAX_OWNER_LEN: usize = 255;

pub const MAX_HOTELS: usize = 100_000;

/// Default ceiling on rooms per hotel when configuration does not say otherwise.
pub const DEFAULT_MAX_ROOMS: u32 = 1000;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Queue depth of the group-commit WAL writer.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
