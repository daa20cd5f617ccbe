/// Constants used throughout the metasync codebase
// Debounce defaults
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

// Store defaults
pub const DEFAULT_DATABASE_NAME: &str = "metasync";
pub const DEFAULT_STORE_FILENAME: &str = "metasync.json";

// Environment variable names
pub const METASYNC_REFRESH_INTERVAL_VAR: &str = "METASYNC_REFRESH_INTERVAL";
pub const METASYNC_STORE_PATH_VAR: &str = "METASYNC_STORE_PATH";
pub const METASYNC_CONFIG_VAR: &str = "METASYNC_CONFIG";

// Conflict backoff
pub const DEFAULT_BASE_DELAY_MS: u64 = 50;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;
pub const DEFAULT_DRAIN_ATTEMPTS: u32 = 5;
