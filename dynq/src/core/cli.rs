use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CACHE_ENABLED, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TTL_SECS, ENV_CONFIG, ENV_MAX_PAGE_SIZE,
    ENV_PAGE_SIZE,
};
use crate::query::SortKey;

#[derive(Parser)]
#[command(name = "dynq")]
#[command(version, about = "Dynamic filter, sort and paging over JSON records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Page size used when --size is not given
    #[arg(long, global = true, env = ENV_PAGE_SIZE)]
    pub page_size: Option<u32>,

    /// Largest page size a query may request
    #[arg(long, global = true, env = ENV_MAX_PAGE_SIZE)]
    pub max_page_size: Option<u32>,

    // Cache options
    /// Enable or disable the compiled query cache
    #[arg(long, global = true, env = ENV_CACHE_ENABLED)]
    pub cache: Option<bool>,

    /// Maximum number of cached compiled queries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Compiled query TTL in seconds (0 = never expire)
    #[arg(long, global = true, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,
}

/// Parse a sort key from `field` or `field:dir`
fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    let (field, dir) = match s.split_once(':') {
        Some((field, dir)) => (field.trim(), dir.trim()),
        None => (s.trim(), "asc"),
    };
    if field.is_empty() {
        return Err(format!("Invalid sort key '{}'. Expected field[:asc|desc]", s));
    }
    match dir.to_lowercase().as_str() {
        "asc" | "desc" => Ok(SortKey::new(field, dir)),
        _ => Err(format!(
            "Invalid sort direction '{}'. Valid options: asc, desc",
            dir
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Filter, sort and page the records of a JSON file
    Query {
        /// JSON file holding an array of objects
        data: PathBuf,

        /// File holding a dynamic query document (filter and sort)
        #[arg(long, short = 'q', conflicts_with = "filter")]
        query: Option<PathBuf>,

        /// Inline filter node as JSON
        #[arg(long, short = 'f')]
        filter: Option<String>,

        /// Sort key as field[:asc|desc], repeatable; appended after the query's own keys
        #[arg(long, short = 's', value_parser = parse_sort_key)]
        sort: Vec<SortKey>,

        /// Zero-based page index
        #[arg(long, short = 'i', default_value_t = 0)]
        index: u32,

        /// Page size (defaults to the configured page size)
        #[arg(long, short = 'n')]
        size: Option<u32>,

        /// Pretty-print the resulting page
        #[arg(long)]
        pretty: bool,
    },
    /// Print the field names and inferred types of a JSON file
    Schema {
        /// JSON file holding an array of objects
        data: PathBuf,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub page_size: Option<u32>,
    pub max_page_size: Option<u32>,
    pub cache: Option<bool>,
    pub cache_max_entries: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        page_size: cli.page_size,
        max_page_size: cli.max_page_size,
        cache: cli.cache,
        cache_max_entries: cli.cache_max_entries,
        cache_ttl_secs: cli.cache_ttl_secs,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!(parse_sort_key("age").unwrap(), SortKey::asc("age"));
        assert_eq!(parse_sort_key("age:DESC").unwrap(), SortKey::new("age", "DESC"));
        assert_eq!(parse_sort_key(" name : asc ").unwrap(), SortKey::asc("name"));
        assert!(parse_sort_key(":desc").is_err());
        assert!(parse_sort_key("age:down").is_err());
    }

    #[test]
    fn test_query_command_args() {
        let cli = Cli::try_parse_from([
            "dynq",
            "--page-size",
            "5",
            "query",
            "people.json",
            "--filter",
            r#"{"field":"age","operator":"gt","value":"18"}"#,
            "-s",
            "age:desc",
            "-s",
            "id",
            "--index",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.page_size, Some(5));
        match cli.command {
            Commands::Query {
                data,
                filter,
                sort,
                index,
                size,
                ..
            } => {
                assert_eq!(data, PathBuf::from("people.json"));
                assert!(filter.is_some());
                assert_eq!(sort, vec![SortKey::desc("age"), SortKey::asc("id")]);
                assert_eq!(index, 2);
                assert_eq!(size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_query_file_conflicts_with_filter() {
        let result = Cli::try_parse_from([
            "dynq",
            "query",
            "people.json",
            "--query",
            "q.json",
            "--filter",
            "{}",
        ]);
        assert!(result.is_err());
    }
}
