use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use odata_access::observability::metrics::encode_metrics;
use odata_access::utils::config_loader;
use odata_access::utils::logging::{self, LogLevel};
use odata_access::RequestOrchestrator;
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "odata-access.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// print the Prometheus metrics after the command
    #[arg(long)]
    print_metrics: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET an absolute data path
    Read {
        path: String,
        /// allow structured values
        #[arg(long)]
        object: bool,
    },
    /// POST an entity to an absolute collection path
    Create {
        path: String,
        /// entity as JSON
        #[arg(long)]
        data: String,
    },
    /// Fetch a fresh security token
    RefreshToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let client_config = config_loader::run(&args.config).await?;
    logging::run(&client_config, args.log_level)?;

    // -------------------------------
    // 2. Create orchestrator
    // -------------------------------

    let model = RequestOrchestrator::from_config(&client_config)?;
    info!("service root: {}", model.service().url);

    // -------------------------------
    // 3. Run command
    // -------------------------------

    let output = match args.command {
        Command::Read { path, object } => model.read(&path, object).await?,
        Command::Create { path, data } => {
            let entity: Value =
                serde_json::from_str(&data).map_err(|e| anyhow!("--data is not JSON: {}", e))?;
            model.create(&path, &entity).await?
        }
        Command::RefreshToken => {
            model.refresh_security_token().await?;
            Value::String(model.token_store().current_token().await)
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    // -------------------------------
    // 4. Metrics
    // -------------------------------

    if args.print_metrics {
        print!("{}", encode_metrics().await?);
    }

    Ok(())
}
