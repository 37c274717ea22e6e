//! EduBridge CLI, the main entry point.
//!
//! Commands:
//! - `serve`: start the HTTP gateway
//! - `invoke`: run one orchestration turn from the terminal
//! - `session-id`: print the session id for a phone number
//! - `config`: show, locate, validate or initialize configuration
//! - `decode`: print the messages inside a saved inbound payload

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "edubridge",
    about = "EduBridge: multi-persona WhatsApp assistant for schools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one orchestration turn and print the response
    Invoke(commands::invoke::InvokeArgs),

    /// Print the session id for a phone number
    SessionId {
        /// Phone number in any common format
        phone: String,

        /// Instant to derive for (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Decode an inbound event batch or webhook payload
    Decode {
        /// JSON file to read; `-` reads stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
    /// Write a default config file
    Init {
        /// Destination; defaults to the standard config path
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Invoke(args) => commands::invoke::run(args).await?,
        Commands::SessionId { phone, at } => commands::session_id::run(&phone, at.as_deref())?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Init { path, force } => commands::config_cmd::init(path, force)?,
        },
        Commands::Decode { input } => commands::decode::run(&input)?,
    }

    Ok(())
}
