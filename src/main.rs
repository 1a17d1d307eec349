//! channel-digest CLI entry point.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use channel_digest::channels::SlackClient;
use channel_digest::cli::{describe_outcome, expand_path, init_logging};
use channel_digest::gateway::{build_pipeline, AppConfig, Gateway};
use channel_digest::store::{self, MemoryReportStore, MySqlReportStore, ReportStore};

/// Daily Slack channel metrics.
#[derive(Parser)]
#[command(name = "channel-digest")]
#[command(about = "Counts a channel's words, reactions and joins every day and posts the summary.")]
#[command(version)]
struct Cli {
    /// Config file path (JSON). Environment variables override it.
    #[arg(short, long, env = "CHANNEL_DIGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve slash commands and events, and run the daily schedule
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one report now and post it
    Run {
        /// Channel to report on (defaults to REPORT_CHANNEL_ID)
        #[arg(long)]
        channel: Option<String>,

        /// Keep the row in memory instead of writing to the database
        #[arg(long)]
        no_db: bool,
    },

    /// Check the database connection
    CheckDb,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective config with secrets masked
    Show,

    /// Validate config
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.as_deref().map(expand_path);
    let mut config = AppConfig::resolve(path.as_deref()).context("loading configuration")?;

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }

            let store = store::open_configured(&config.database).await;
            let gateway = Gateway::new(config, store).context("starting channel-digest")?;

            tracing::info!(version = channel_digest::VERSION, "channel-digest starting");
            gateway
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Could not listen for shutdown signal");
                    }
                })
                .await?;
        }

        Commands::Run { channel, no_db } => {
            config.validate()?;

            let Some(channel) = channel.or_else(|| config.report_channel().map(str::to_string)) else {
                bail!("no channel given: pass --channel or set REPORT_CHANNEL_ID");
            };

            let store: Arc<dyn ReportStore> = if no_db {
                Arc::new(MemoryReportStore::new())
            } else {
                store::open_configured(&config.database).await
            };

            let client = Arc::new(SlackClient::new(config.slack.clone()).context("creating Slack client")?);
            let pipeline = build_pipeline(&config, client, store.clone())?;

            let outcome = pipeline.run_on_demand(&channel).await;
            store.close().await;

            let outcome = outcome.with_context(|| format!("report for {} failed", channel))?;
            println!("{}", describe_outcome(&channel, &outcome));
        }

        Commands::CheckDb => {
            let missing = config.database.missing_fields();
            if !missing.is_empty() {
                bail!("database is not configured, missing: {}", missing.join(", "));
            }

            let db = MySqlReportStore::open(&config.database)
                .await
                .context("connecting to database")?;
            db.ping().await.context("pinging database")?;

            println!("Connected to {}:{}/{}", config.database.host, config.database.port, config.database.name);
            for table in db.tables().await? {
                println!("  - {}", table);
            }
            db.close().await;
        }

        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
            ConfigCommands::Validate => {
                config.validate()?;
                println!("Configuration is valid.");

                if config.slack.validate().is_err() {
                    println!("  ! Slack bot token missing or malformed: serve and run will fail");
                }
                if !config.slack.has_signing_secret() {
                    println!("  ! No signing secret: slash commands and events are disabled");
                }
                if config.report_channel().is_none() {
                    println!("  ! No report channel: scheduled reports are disabled");
                }
                if !config.database.is_configured() {
                    println!("  ! Database not configured: reports will not be saved");
                }
            }
        },
    }

    Ok(())
}
