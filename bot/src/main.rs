//! `anthrax-bot` entry point.
//!
//! `serve` (the default) syncs the slash commands, opens the sheet (healing
//! its header row), then answers interactions until Ctrl+C. `register`
//! only syncs the commands.

use std::sync::Arc;

use anthrax_bot::commands::{RegistrationTarget, register_commands};
use anthrax_bot::config::BotConfig;
use anthrax_bot::interactions::Dispatcher;
use anthrax_bot::server::{self, AppState};
use anthrax_bot::verify::SignatureVerifier;
use anthrax_records::{CommandHandlers, RecordStore, StaffRole};
use anthrax_sheets::{ServiceAccountAuth, SheetsClient, SheetsEndpoints};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "anthrax-bot", version, about = "Staff infraction log for Discord")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register commands, then serve interactions.
    Serve {
        /// Do not touch the registered command list on startup.
        #[arg(long)]
        skip_register: bool,
    },
    /// Register commands and exit.
    Register,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BotConfig::from_env().context("failed to load configuration")?;
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("failed to build HTTP client")?;

    match cli.command.unwrap_or(Command::Serve {
        skip_register: false,
    }) {
        Command::Register => register(&http, &config).await,
        Command::Serve { skip_register } => {
            if !skip_register {
                register(&http, &config).await?;
            }
            serve(http, config).await
        }
    }
}

async fn register(http: &reqwest::Client, config: &BotConfig) -> anyhow::Result<()> {
    let target = RegistrationTarget {
        api_base: anthrax_bot::DISCORD_API_BASE,
        application_id: &config.application_id,
        guild_id: config.guild_id,
        bot_token: &config.discord_token,
    };
    register_commands(http, &target)
        .await
        .context("failed to register slash commands")?;
    Ok(())
}

async fn serve(http: reqwest::Client, config: BotConfig) -> anyhow::Result<()> {
    tracing::info!("anthrax-bot v{} starting", env!("CARGO_PKG_VERSION"));

    let key = config
        .credentials
        .load()
        .context("failed to decode Google credentials")?;
    let auth = ServiceAccountAuth::new(http.clone(), key).context("invalid service account key")?;
    tracing::info!(service_account = auth.client_email(), "using Google service account");

    let sheet = SheetsClient::open(
        http,
        Arc::new(auth),
        SheetsEndpoints::default(),
        config.spreadsheet.clone(),
        &config.tab,
    )
    .await
    .context("failed to open the infraction sheet")?;

    let store = RecordStore::open(sheet)
        .await
        .context("failed to prepare the sheet header row")?;
    let handlers = CommandHandlers::new(store, StaffRole::new(config.staff_role_id.clone()));

    let state = AppState {
        dispatcher: Arc::new(Dispatcher::new(handlers)),
        verifier: Arc::new(
            SignatureVerifier::from_hex(&config.public_key).context("invalid Discord public key")?,
        ),
    };

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("signal received, shutting down");
    })
    .await
    .context("interactions server failed")?;

    tracing::info!("anthrax-bot exiting cleanly");
    Ok(())
}
