use amocrm_client::AmoCrmClient;
use clap::{Parser, Subcommand};
use gsheets_client::SheetsClient;
use leadsync_core::outbound::{OutboundReconciler, SweepOptions};
use leadsync_core::{Config, SheetGateway};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "leadsync",
    about = "Bidirectional sync bridge between amoCRM deals and Google Sheets rows",
    version
)]
struct Cli {
    /// YAML config file (default: read settings from the environment)
    #[arg(long, global = true, env = "LEADSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server and the periodic outbound sweep
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single outbound sweep (sheet -> CRM) and exit
    Sweep,

    /// Validate configuration and vendor connectivity
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    // A missing or incomplete configuration is fatal before any work starts.
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.sync.port = port;
            }
            leadsync_server::serve(config).await
        }
        Commands::Sweep => run_sweep(&config).await,
        Commands::Check => run_check(&config).await,
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run_sweep(config: &Config) -> anyhow::Result<()> {
    let crm = AmoCrmClient::new(&config.amocrm)?;
    let sheet = SheetsClient::new(&config.sheets)?;

    let reconciler = OutboundReconciler::new(&crm, &sheet, SweepOptions::from_config(config));
    let report = reconciler.sweep().await?;
    println!(
        "sweep finished: {} rows, {} created, {} updated, {} failed",
        report.rows, report.created, report.updated, report.failed
    );
    Ok(())
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let crm = AmoCrmClient::new(&config.amocrm)?;
    let sheet = SheetsClient::new(&config.sheets)?;

    let stages = crm.refresh_stages().await?;
    println!("amoCRM: ok ({stages} pipeline stages visible)");

    let header = sheet.header().await?;
    let identity = &config.sheets.identity_column;
    if header.iter().any(|h| h == identity) {
        println!(
            "sheet: ok ({} columns, identity column '{identity}' present)",
            header.len()
        );
    } else {
        anyhow::bail!(
            "sheet header has {} columns but no '{identity}' column",
            header.len()
        );
    }
    Ok(())
}
