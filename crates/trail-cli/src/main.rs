//! Trail CLI - Command-line interface
//!
//! Usage:
//!   trail register-user [--guid <guid>]
//!   trail register-device <user> [--guid <guid>]
//!   trail ingest <file>
//!   trail update <id> <json>
//!   trail search --user <guid> --open-time <ms>
//!   trail normalize <url>
//!
//! The memory backend lives only for one invocation; point GRAPH_BACKEND at
//! surrealdb to keep data between commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use trail_core::{AppConfig, GraphBackend, SearchQuery};
use trail_graph::{normalize_domain, AccountService, PageViewService, SearchService};

#[derive(Parser)]
#[command(name = "trail")]
#[command(about = "Page-view browsing graph CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true, env = "TRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Graph store engine (memory or surrealdb)
    #[arg(long, global = true)]
    backend: Option<GraphBackend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    RegisterUser {
        /// GUID to use instead of a generated one
        #[arg(long)]
        guid: Option<String>,
    },
    /// Register a device owned by a user
    RegisterDevice {
        /// Owning user GUID
        user: String,
        /// GUID to use instead of a generated one
        #[arg(long)]
        guid: Option<String>,
    },
    /// Ingest page views from a JSON object, JSON array or JSON-lines file
    Ingest {
        /// Path to the file, `-` for stdin
        path: String,
    },
    /// Merge attributes onto a page view
    Update {
        /// Page view id
        id: String,
        /// Attribute object as JSON
        attributes: String,
    },
    /// Search a user's page views around a point in time
    Search {
        #[arg(long)]
        user: String,
        /// Window centre in epoch milliseconds
        #[arg(long)]
        open_time: String,
        #[arg(long)]
        range: Option<i64>,
        /// seconds, minutes or hours
        #[arg(long)]
        units: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        /// Follow navigation successors
        #[arg(long)]
        successors: bool,
        /// Follow child page views
        #[arg(long)]
        children: bool,
    },
    /// Print the domain a page URL is grouped under
    Normalize { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Normalize { url } = &cli.command {
        println!("{}", normalize_domain(url));
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(backend) = cli.backend {
        config.database.backend = backend;
    }
    if config.database.backend == GraphBackend::Memory {
        tracing::warn!("Using the in-memory graph; nothing is kept after this command");
    }

    let store = trail_graph::connect(&config.database).await?;

    match cli.command {
        Commands::RegisterUser { guid } => {
            let user = AccountService::new(store).register_user(guid.as_deref()).await?;
            print_json(&json!({ "id": user.id, "type": user.kind().to_string() }))?;
        }
        Commands::RegisterDevice { user, guid } => {
            let device = AccountService::new(store)
                .register_device(&user, guid.as_deref())
                .await?;
            print_json(&json!({ "id": device.id, "type": device.kind().to_string() }))?;
        }
        Commands::Ingest { path } => {
            let content = if path == "-" {
                tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin())).await??
            } else {
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {path}"))?
            };

            let service = PageViewService::new(store);
            let mut failed = 0usize;
            for (line, document) in parse_documents(&content)? {
                match service.ingest(&document).await {
                    Ok(outcome) => print_json(&serde_json::to_value(outcome)?)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}", json!({ "line": line, "error": e.to_string() }));
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} page view(s) were rejected");
            }
        }
        Commands::Update { id, attributes } => {
            let attributes: Value =
                serde_json::from_str(&attributes).context("attributes must be JSON")?;
            let message = PageViewService::new(store).update(&id, &attributes).await?;
            print_json(&json!({ "message": message }))?;
        }
        Commands::Search {
            user,
            open_time,
            range,
            units,
            domain,
            successors,
            children,
        } => {
            let query = SearchQuery {
                user_guid: user,
                domain,
                open_time,
                time_range: range,
                time_range_units: units,
                include_successors: successors,
                include_children: children,
            };
            let results = SearchService::new(store)
                .with_defaults(config.search.clone())
                .search(&query)
                .await?;
            print_json(&json!({ "results": results }))?;
        }
        Commands::Normalize { url } => println!("{}", normalize_domain(&url)),
    }

    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Split input into page view documents, numbered by source line.
///
/// Accepts one JSON object, a JSON array of objects, or one object per line.
fn parse_documents(content: &str) -> anyhow::Result<Vec<(usize, Value)>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(match value {
            Value::Array(items) => items.into_iter().map(|item| (1, item)).collect(),
            other => vec![(1, other)],
        });
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map(|value| (index + 1, value))
                .with_context(|| format!("line {} is not valid JSON", index + 1))
        })
        .collect()
}
