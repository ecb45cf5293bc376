use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS};
use crate::data::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::query::{FieldType, MAX_FILTER_DEPTH, QueryLimits};

// =============================================================================
// File Config Structs (all fields optional for merging)
// =============================================================================

/// Query configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    /// Page size used when the caller does not give one (default: 10)
    pub default_page_size: Option<u32>,
    /// Largest page size a caller may request
    pub max_page_size: Option<u32>,
    /// Maximum filter nesting depth
    pub max_filter_depth: Option<usize>,
    /// Maximum number of sort keys
    pub max_sort_keys: Option<usize>,
    /// Maximum size of a query payload in bytes
    pub max_query_bytes: Option<usize>,
}

/// Compiled query cache section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub enabled: Option<bool>,
    /// Maximum number of cached compiled queries
    pub max_entries: Option<u64>,
    /// Entry time-to-live in seconds, 0 to disable
    pub ttl_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub query: Option<QueryFileConfig>,
    pub cache: Option<CacheFileConfig>,
    /// Field type overrides for JSON records, by field name
    pub schema: Option<HashMap<String, FieldType>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Query
        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            if query.default_page_size.is_some() {
                tracing::trace!(default_page_size = ?query.default_page_size, "Merging query.default_page_size");
                current.default_page_size = query.default_page_size;
            }
            if query.max_page_size.is_some() {
                tracing::trace!(max_page_size = ?query.max_page_size, "Merging query.max_page_size");
                current.max_page_size = query.max_page_size;
            }
            if query.max_filter_depth.is_some() {
                tracing::trace!(max_filter_depth = ?query.max_filter_depth, "Merging query.max_filter_depth");
                current.max_filter_depth = query.max_filter_depth;
            }
            if query.max_sort_keys.is_some() {
                tracing::trace!(max_sort_keys = ?query.max_sort_keys, "Merging query.max_sort_keys");
                current.max_sort_keys = query.max_sort_keys;
            }
            if query.max_query_bytes.is_some() {
                tracing::trace!(max_query_bytes = ?query.max_query_bytes, "Merging query.max_query_bytes");
                current.max_query_bytes = query.max_query_bytes;
            }
        }

        // Cache
        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.enabled.is_some() {
                tracing::trace!(enabled = ?cache.enabled, "Merging cache.enabled");
                current.enabled = cache.enabled;
            }
            if cache.max_entries.is_some() {
                tracing::trace!(max_entries = ?cache.max_entries, "Merging cache.max_entries");
                current.max_entries = cache.max_entries;
            }
            if cache.ttl_secs.is_some() {
                tracing::trace!(ttl_secs = ?cache.ttl_secs, "Merging cache.ttl_secs");
                current.ttl_secs = cache.ttl_secs;
            }
        }

        // Schema overrides merge per field
        if let Some(schema) = other.schema {
            tracing::trace!(fields = schema.len(), "Merging schema");
            self.schema.get_or_insert_with(HashMap::new).extend(schema);
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Query configuration (final/runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub limits: QueryLimits,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            limits: QueryLimits::default(),
        }
    }
}

/// Compiled query cache configuration (final/runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Disabled by default
    pub enabled: bool,
    pub max_entries: u64,
    /// 0 = entries never expire
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub schema: HashMap<String, FieldType>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();

        // 1. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            tracing::debug!(config = %path.display(), "Config file loaded");
        }

        // 2. Extract file config values with defaults
        let file_query = file_config.query.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let defaults = QueryLimits::default();

        // 3. Layer configs: defaults -> file config -> CLI/env overrides
        let query = QueryConfig {
            default_page_size: cli
                .page_size
                .or(file_query.default_page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_page_size: cli
                .max_page_size
                .or(file_query.max_page_size)
                .unwrap_or(MAX_PAGE_SIZE),
            limits: QueryLimits {
                max_query_bytes: file_query
                    .max_query_bytes
                    .unwrap_or(defaults.max_query_bytes),
                max_filter_depth: file_query
                    .max_filter_depth
                    .unwrap_or(defaults.max_filter_depth),
                max_sort_keys: file_query
                    .max_sort_keys
                    .unwrap_or(defaults.max_sort_keys),
            },
        };

        // cache: CLI/env overrides file config, disabled by default
        let cache = CacheConfig {
            enabled: cli.cache.or(file_cache.enabled).unwrap_or(false),
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            ttl_secs: cli
                .cache_ttl_secs
                .or(file_cache.ttl_secs)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        };

        let config = Self {
            query,
            cache,
            schema: file_config.schema.unwrap_or_default(),
        };

        // Validate configuration
        config.validate()?;

        tracing::debug!(
            default_page_size = config.query.default_page_size,
            max_page_size = config.query.max_page_size,
            max_filter_depth = config.query.limits.max_filter_depth,
            max_sort_keys = config.query.limits.max_sort_keys,
            max_query_bytes = config.query.limits.max_query_bytes,
            cache_enabled = config.cache.enabled,
            cache_max_entries = config.cache.max_entries,
            schema_overrides = config.schema.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        let query = &self.query;

        if query.max_page_size == 0 || query.max_page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "Configuration error: query.max_page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            );
        }
        if query.default_page_size == 0 || query.default_page_size > query.max_page_size {
            anyhow::bail!(
                "Configuration error: query.default_page_size must be between 1 and query.max_page_size ({})",
                query.max_page_size
            );
        }
        if query.limits.max_filter_depth == 0 || query.limits.max_filter_depth > MAX_FILTER_DEPTH {
            anyhow::bail!(
                "Configuration error: query.max_filter_depth must be between 1 and {}",
                MAX_FILTER_DEPTH
            );
        }
        if query.limits.max_query_bytes == 0 {
            anyhow::bail!("Configuration error: query.max_query_bytes must be greater than 0");
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            anyhow::bail!(
                "Configuration error: cache.max_entries must be greater than 0 when the cache is enabled"
            );
        }

        Ok(())
    }
}
