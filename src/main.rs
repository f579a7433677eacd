use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use graph_memory::config::AppConfig;
use graph_memory::gateway::GatewayConfig;
use graph_memory::{db, graph, server};

#[derive(Parser)]
#[command(name = "graph-memory", version, about = "Conversational graph memory API and tool-call gateway")]
struct Cli {
    /// Path to the TOML config (defaults to ~/.graph-memory/config.toml)
    #[arg(long, global = true, env = "GRAPH_MEMORY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the Graph Memory API
    Api,
    /// Serve the tool-call gateway
    Gateway {
        /// YAML tool map (overrides GATEWAY_CONFIG and the TOML setting)
        #[arg(long)]
        tools: Option<PathBuf>,
    },
    /// Insert a sample conversation into the database
    Seed,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Command::Api => {
            init_tracing(&config.server.log_level);
            server::serve_api(config).await?;
        }
        Command::Gateway { tools } => {
            let mut settings = config.gateway;
            if let Some(path) = tools {
                settings.tools_path = path.to_string_lossy().into_owned();
            }
            // Loaded before tracing exists: the tool map sets the log level.
            let gateway = GatewayConfig::load(&settings.tools_path)?;
            init_tracing(&gateway.middleware.logging.level);
            server::serve_gateway(gateway, settings).await?;
        }
        Command::Seed => {
            init_tracing(&config.server.log_level);
            let mut conn = db::open_database(config.resolved_db_path())?;
            let result = graph::seed::seed_sample_data(&mut conn)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
