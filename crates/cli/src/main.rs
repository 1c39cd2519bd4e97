mod codec_commands;
mod config_commands;
mod context;
mod doc_commands;
mod key_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::context::Context;

#[derive(Parser)]
#[command(name = "docscan", about = "docscan: client-side encryption vault for scanned documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/docscan/).
    #[arg(long, global = true, env = "DOCSCAN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Key lifecycle for an identity.
    Keys {
        #[command(subcommand)]
        action: key_commands::KeyAction,
    },
    /// Encrypt a JSON record and print its envelope.
    Seal {
        #[arg(long)]
        identity: String,
        /// JSON file to read, or stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Decrypt stored content (envelope or legacy record) and print the record.
    Open {
        #[arg(long)]
        identity: String,
        /// JSON file to read, or stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Encrypted document storage.
    Docs {
        #[command(subcommand)]
        action: doc_commands::DocAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays machine-readable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "docscan starting");

    match cli.command {
        Commands::Config { action } => config_commands::handle_config(cli.config.as_deref(), action),
        command => {
            let ctx = Context::load(cli.config.as_deref())?;
            run(&ctx, command).await
        },
    }
}

async fn run(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Keys { action } => key_commands::handle_keys(ctx, action).await,
        Commands::Seal { identity, file } => {
            let record = codec_commands::read_json(file.as_deref())?;
            let envelope = codec_commands::seal(ctx, &identity, &record).await?;
            println!("{}", serde_json::to_string(&envelope)?);
            Ok(())
        },
        Commands::Open { identity, file } => {
            let stored = codec_commands::read_json(file.as_deref())?;
            let record = codec_commands::open(ctx, &identity, stored).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        },
        Commands::Docs { action } => doc_commands::handle_docs(ctx, action).await,
        Commands::Config { action } => config_commands::handle_config(None, action),
    }
}
