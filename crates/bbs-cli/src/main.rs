use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Target;
use commands::events::EventKind;
use commands::lrps::Format;

#[derive(Parser)]
#[command(
    name = "bbsctl",
    about = "BBS — inspect and drive the actual LRP bulletin board",
    version,
    propagate_version = true,
)]
struct Cli {
    /// BBS base URL. Overrides [client].url from the config file.
    #[arg(long, global = true)]
    url: Option<String>,
    /// Path to bbs.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the BBS is up and available
    Ping,
    /// List fresh domains
    Domains,
    /// Mark a domain fresh for `ttl` seconds (0 never expires)
    UpsertDomain {
        domain: String,
        #[arg(long, default_value = "0")]
        ttl: u64,
    },
    /// List actual LRP groups
    ActualLrps {
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        cell_id: Option<String>,
        /// Only this process guid (ignores --domain and --cell-id).
        #[arg(long)]
        process_guid: Option<String>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Stream events as JSON lines until interrupted
    Events {
        #[arg(long, value_enum, default_value = "lrp")]
        kind: EventKind,
        /// Only events for this cell; not available for task events.
        #[arg(long)]
        cell_id: Option<String>,
    },
    /// Create the SQL tables described by [sql] in the config file
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,bbs=debug"))?,
        )
        .init();

    let cli = Cli::parse();
    let target = Target::load(cli.url, cli.config.as_deref())?;

    match cli.command {
        Commands::Ping => commands::domains::ping(&target).await,
        Commands::Domains => commands::domains::list(&target).await,
        Commands::UpsertDomain { domain, ttl } => {
            commands::domains::upsert(&target, &domain, ttl).await
        }
        Commands::ActualLrps {
            domain,
            cell_id,
            process_guid,
            format,
        } => {
            commands::lrps::list(&target, domain, cell_id, process_guid.as_deref(), format).await
        }
        Commands::Events { kind, cell_id } => {
            commands::events::stream(&target, kind, cell_id.as_deref()).await
        }
        Commands::Migrate => commands::migrate::run(&target).await,
    }
}
