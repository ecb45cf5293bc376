// =============================================================================
// Application Identity
// =============================================================================

/// Application name (for display, paths and log filters)
pub const APP_NAME: &str = "dynq";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "dynq.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "DYNQ_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "DYNQ_LOG";

// =============================================================================
// Environment Variables - Query
// =============================================================================

/// Environment variable for default page size
pub const ENV_PAGE_SIZE: &str = "DYNQ_PAGE_SIZE";

/// Environment variable for maximum page size
pub const ENV_MAX_PAGE_SIZE: &str = "DYNQ_MAX_PAGE_SIZE";

// =============================================================================
// Environment Variables - Cache
// =============================================================================

/// Environment variable to enable the compiled query cache
pub const ENV_CACHE_ENABLED: &str = "DYNQ_CACHE_ENABLED";

/// Environment variable for compiled query cache capacity
pub const ENV_CACHE_MAX_ENTRIES: &str = "DYNQ_CACHE_MAX_ENTRIES";

/// Environment variable for compiled query cache TTL in seconds
pub const ENV_CACHE_TTL_SECS: &str = "DYNQ_CACHE_TTL_SECS";

// =============================================================================
// Cache Defaults
// =============================================================================

/// Default compiled query cache capacity
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 1_000;

/// Default compiled query cache TTL (0 = entries never expire)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 0;
