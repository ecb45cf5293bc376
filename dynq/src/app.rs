//! Core application

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, ENV_LOG};
use crate::data::{
    AsyncDataSource, AsyncViewRepository, Include, JsonFileSource, JsonRecord, MemorySource, Page,
    PageQuery, Repository, infer_registry,
};
use crate::query::{
    DynamicQuery, FieldRegistry, QueryEngine, QueryLimits, SortKey, parse_dynamic_query,
    parse_filter_node,
};

/// Arguments of a single `query` run
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub data: PathBuf,
    pub query: Option<PathBuf>,
    pub filter: Option<String>,
    pub sort: Vec<SortKey>,
    pub index: u32,
    pub size: Option<u32>,
}

pub struct CoreApp {
    pub config: AppConfig,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;

        match command {
            Commands::Query {
                data,
                query,
                filter,
                sort,
                index,
                size,
                pretty,
            } => {
                let args = QueryArgs {
                    data,
                    query,
                    filter,
                    sort,
                    index,
                    size,
                };
                let page = app.query_with_interrupt(&args).await?;
                let output = if pretty {
                    serde_json::to_string_pretty(&page)?
                } else {
                    serde_json::to_string(&page)?
                };
                println!("{}", output);
                Ok(())
            }
            Commands::Schema { data } => {
                let records = load_records(&data).await?;
                let registry = infer_registry(&records, &app.config.schema);
                print!("{}", render_schema(&registry));
                Ok(())
            }
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        Ok(Self { config })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    /// Run a query, cancelling it on Ctrl+C
    async fn query_with_interrupt(&self, args: &QueryArgs) -> Result<Page<JsonRecord>> {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::debug!("Received Ctrl+C, cancelling query");
                    cancel.cancel();
                }
            }
        });

        let result = self.query(args, &cancel).await;
        watcher.abort();
        result
    }

    /// Load, filter, sort and page the records of `args.data`
    pub async fn query(
        &self,
        args: &QueryArgs,
        cancel: &CancellationToken,
    ) -> Result<Page<JsonRecord>> {
        let query_config = &self.config.query;
        let dynamic = build_query(
            args.query.as_deref(),
            args.filter.as_deref(),
            &args.sort,
            &query_config.limits,
        )
        .await?;

        let page = PageQuery {
            index: args.index,
            size: args.size.unwrap_or(query_config.default_page_size),
        }
        .resolve(query_config.max_page_size)?;

        let records = load_records(&args.data).await?;
        let registry = infer_registry(&records, &self.config.schema);
        tracing::debug!(
            records = records.len(),
            fields = registry.len(),
            "Records loaded"
        );

        let engine = QueryEngine::new(registry)
            .with_limits(query_config.limits)
            .with_cache(&self.config.cache);
        let repository = Repository::with_engine(MemorySource::new(records), engine);

        let page = repository
            .get_list_by_dynamic(&dynamic, None, &Include::none(), page, cancel)
            .await?;
        Ok(page)
    }
}

/// Read every record of a JSON array file
async fn load_records(path: &Path) -> Result<Vec<JsonRecord>> {
    let source = JsonFileSource::new(path);
    let include = Include::none();
    let records: Vec<JsonRecord> = source.rows(&include).try_collect().await?;
    Ok(records)
}

/// Assemble the dynamic query from a query file or an inline filter, then extra sort keys
async fn build_query(
    query_file: Option<&Path>,
    filter: Option<&str>,
    sort: &[SortKey],
    limits: &QueryLimits,
) -> Result<DynamicQuery> {
    let mut query = match (query_file, filter) {
        (Some(path), _) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read query file: {}", path.display()))?;
            parse_dynamic_query(&content, limits)?
        }
        (None, Some(filter)) => DynamicQuery::new().with_filter(parse_filter_node(filter, limits)?),
        (None, None) => DynamicQuery::new(),
    };
    query.sort.extend(sort.iter().cloned());
    limits.check(&query)?;
    Ok(query)
}

fn render_schema(registry: &FieldRegistry<JsonRecord>) -> String {
    registry
        .iter()
        .map(|field| format!("{:<24} {}\n", field.name(), field.field_type()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::query::QueryError;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    fn people_file() -> tempfile::NamedTempFile {
        write_file(
            r#"[
                {"id": 1, "name": "Ada", "age": 36, "joined": "2020-01-05"},
                {"id": 2, "name": "bob", "age": 17, "joined": "2021-03-10"},
                {"id": 3, "name": "Cara", "age": 25, "joined": "2019-07-21"},
                {"id": 4, "name": "dan", "age": 41, "joined": "2022-11-02"},
                {"id": 5, "name": "Eve", "age": 19, "joined": "2023-02-14"}
            ]"#,
        )
    }

    fn app() -> CoreApp {
        CoreApp {
            config: AppConfig::default(),
        }
    }

    fn ids(page: &Page<JsonRecord>) -> Vec<i64> {
        page.items()
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_i64()))
            .collect()
    }

    #[tokio::test]
    async fn test_query_inline_filter_and_sort() {
        let data = people_file();
        let args = QueryArgs {
            data: data.path().to_path_buf(),
            filter: Some(r#"{"field":"age","operator":"gte","value":"18"}"#.into()),
            sort: vec![SortKey::desc("age")],
            size: Some(2),
            ..Default::default()
        };
        let page = app().query(&args, &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&page), vec![4, 1]);
        assert_eq!(page.count(), 4);
        assert_eq!(page.pages(), 2);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_inline_filter_cannot_add_query_keys() {
        let limits = QueryLimits::default();
        let injected = r#"{"field":"age","operator":"gte","value":"18"}, "sort":[{"field":"id","dir":"desc"}]"#;
        let err = build_query(None, Some(injected), &[], &limits)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::InvalidJson(_))
        ));

        let query = build_query(
            None,
            Some(r#"{"field":"age","operator":"gte","value":"18"}"#),
            &[SortKey::desc("age")],
            &limits,
        )
        .await
        .unwrap();
        assert_eq!(query.filter.map(|f| f.field), Some("age".to_string()));
        assert_eq!(query.sort, vec![SortKey::desc("age")]);
    }

    #[tokio::test]
    async fn test_cli_sort_keys_count_against_limit() {
        let limits = QueryLimits {
            max_sort_keys: 1,
            ..Default::default()
        };
        let err = build_query(
            None,
            None,
            &[SortKey::asc("age"), SortKey::asc("id")],
            &limits,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::TooManySortKeys { max: 1, count: 2 })
        ));
    }

    #[tokio::test]
    async fn test_query_file_with_cached_engine() {
        let data = people_file();
        let query = write_file(
            r#"{"Filter": {"Field": "joined", "Operator": "lt", "Value": "2021-01-01"}, "Sort": [{"Field": "name", "Dir": "asc"}]}"#,
        );
        let mut app = app();
        app.config.cache = CacheConfig {
            enabled: true,
            ..Default::default()
        };
        let args = QueryArgs {
            data: data.path().to_path_buf(),
            query: Some(query.path().to_path_buf()),
            ..Default::default()
        };
        let page = app.query(&args, &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&page), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_query_unknown_field_reports_query_error() {
        let data = people_file();
        let args = QueryArgs {
            data: data.path().to_path_buf(),
            sort: vec![SortKey::asc("height")],
            ..Default::default()
        };
        let err = app()
            .query(&args, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Field 'height' not found on type record");
    }

    #[tokio::test]
    async fn test_query_page_size_above_max_rejected() {
        let data = people_file();
        let mut app = app();
        app.config.query.max_page_size = 3;
        let args = QueryArgs {
            data: data.path().to_path_buf(),
            size: Some(4),
            ..Default::default()
        };
        let err = app.query(&args, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::InvalidPage(_))
        ));
    }

    #[tokio::test]
    async fn test_query_cancelled_before_start() {
        let data = people_file();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let args = QueryArgs {
            data: data.path().to_path_buf(),
            ..Default::default()
        };
        let err = app().query(&args, &cancel).await.unwrap_err();
        assert_eq!(err.to_string(), "Operation cancelled");
    }

    #[tokio::test]
    async fn test_schema_rendering_applies_overrides() {
        let data = write_file(r#"[{"id": 1, "zip": "01234", "score": 1.5}]"#);
        let records = load_records(data.path()).await.unwrap();
        let mut app = app();
        app.config
            .schema
            .insert("ZIP".to_string(), crate::query::FieldType::Int);
        let rendered = render_schema(&infer_registry(&records, &app.config.schema));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id"));
        assert!(lines[1].starts_with("zip"));
        assert!(lines[1].ends_with(&crate::query::FieldType::Int.to_string()));
    }
}
