use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use redisearch_client::config::{Config, ObservabilityConfig};
use redisearch_client::metrics;
use redisearch_client::models::Record;
use redisearch_client::{ClientRegistry, SearchClient, SearchContext, SortOrder};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "redisearch-cli")]
#[command(about = "Store and search JSON records in a RediSearch-style index", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the compiled-in defaults
    #[arg(short, long, env = "REDISEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Print collected metrics to stderr before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop the index if present and create it from the configured schema
    RecreateIndex,

    /// Drop the index definition, keeping stored documents
    DropIndex,

    /// Count documents in the index
    Count,

    /// Store a record
    Put {
        #[arg(value_name = "KEY")]
        key: String,

        /// Record body as a JSON object
        #[arg(value_name = "JSON")]
        body: String,
    },

    /// Read a record by key
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Delete a record by key
    Delete {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Find records matching every field=value filter
    Find {
        #[arg(value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        #[arg(short, long)]
        offset: Option<usize>,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Sort field, optionally suffixed with :asc or :desc
        #[arg(short, long)]
        sort_by: Option<String>,
    },

    /// Stream every matching record, one JSON document per line
    Scan {
        #[arg(value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        /// Page with offset/limit queries instead of a server-side cursor
        #[arg(long)]
        client_side: bool,

        #[arg(short = 'p', long)]
        page_size: Option<usize>,

        /// Resolve each fetched page in parallel
        #[arg(long)]
        parallel: bool,

        /// Print keys only
        #[arg(short, long)]
        keys_only: bool,

        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);
    metrics::set_metrics_enabled(config.observability.metrics_enabled);
    if config.observability.metrics_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let entity = config
        .entity
        .as_ref()
        .ok_or_else(|| anyhow!("configuration has no [entity] section"))?;

    let mut registry = ClientRegistry::from_config(&config)?;
    let client = registry.register(Record::descriptor(entity)?)?;
    tracing::debug!(?registry, "Client ready");

    run(&client, cli.command)?;

    if cli.print_metrics {
        eprintln!("{}", metrics::gather_metrics());
    }
    Ok(())
}

fn run(client: &SearchClient<Record>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::RecreateIndex => {
            client.recreate_index()?;
            println!("{}", json!({ "index": client.index_name(), "recreated": true }));
        }

        Commands::DropIndex => {
            client.drop_index()?;
            println!("{}", json!({ "index": client.index_name(), "dropped": true }));
        }

        Commands::Count => {
            let count = client.key_count()?;
            println!("{}", json!({ "index": client.index_name(), "count": count }));
        }

        Commands::Put { key, body } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("record body is not valid JSON")?;
            let record = Record::new(key, body)?;
            client.save(&record)?;
            println!("{}", json!({ "key": record.key, "saved": true }));
        }

        Commands::Get { key } => match client.find_by_key(&key)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => {
                println!("{}", json!({ "key": key, "found": false }));
            }
        },

        Commands::Delete { key } => {
            let deleted = client.delete(&key)?;
            println!("{}", json!({ "key": key, "deleted": deleted }));
        }

        Commands::Find {
            filters,
            offset,
            limit,
            sort_by,
        } => {
            let mut context = client.paging_context_with_fields(parse_filters(&filters)?)?;
            if let Some(offset) = offset {
                context = context.offset(offset);
            }
            if let Some(limit) = limit {
                context = context.limit(limit);
            }
            if let Some(sort_by) = sort_by {
                let (field, order) = parse_sort(&sort_by)?;
                context = context.sort_by(field, order);
            }

            let results = client.find(&context)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Commands::Scan {
            filters,
            client_side,
            page_size,
            parallel,
            keys_only,
            limit,
        } => {
            let mut context = client
                .paging_context_with_fields(parse_filters(&filters)?)?
                .client_side_paging(client_side)
                .include_content(!keys_only);
            if let Some(page_size) = page_size {
                context = context.page_size(page_size);
            }
            if let Some(limit) = limit {
                context = context.limit(limit);
            }

            scan(client, &context, parallel, keys_only)?;
        }
    }

    Ok(())
}

fn scan(
    client: &SearchClient<Record>,
    context: &SearchContext,
    parallel: bool,
    keys_only: bool,
) -> anyhow::Result<()> {
    let pages = client.search(context)?;
    let total = pages.total_results();
    let cursor = pages.is_cursor();

    let mut stream = pages.result_stream(parallel);
    let mut yielded = 0u64;
    let mut failed = 0u64;

    for item in stream.by_ref() {
        let item = item?;
        if keys_only {
            println!("{}", json!({ "key": item.key() }));
            yielded += 1;
            continue;
        }

        let key = item.key().to_string();
        match item.result() {
            Ok(Some(record)) => {
                println!("{}", json!({ "key": key, "record": record.data }));
                yielded += 1;
            }
            Ok(None) => tracing::debug!(key = %key, "Record deleted during scan"),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to resolve record");
                failed += 1;
            }
        }
    }

    eprintln!(
        "{}",
        json!({
            "total": total,
            "yielded": yielded,
            "failed": failed,
            "pages": stream.pages_fetched(),
            "cursor": cursor,
        })
    );
    Ok(())
}

fn parse_filters(filters: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    filters
        .iter()
        .map(|filter| {
            filter
                .split_once('=')
                .map(|(field, value)| (field.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("filter '{}' is not of the form field=value", filter))
        })
        .collect()
}

fn parse_sort(sort_by: &str) -> anyhow::Result<(String, SortOrder)> {
    match sort_by.split_once(':') {
        Some((field, order)) => {
            let order = order
                .parse::<SortOrder>()
                .map_err(|_| anyhow!("unknown sort order '{}'", order))?;
            Ok((field.to_string(), order))
        }
        None => Ok((sort_by.to_string(), SortOrder::Ascending)),
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("redisearch_client={}", config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
