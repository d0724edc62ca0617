mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use cv_core::config::Config;
use cv_server::scanner::{ScanSettings, Scanner};

fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load_or_default(cli.config.as_deref());
    cli.overrides.apply(&mut config);
    config
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting clipvault on {}:{} (videos: {})",
        config.server.host,
        config.server.port,
        config.library.video_dir.display()
    );
    cv_server::start(config).await?;
    Ok(())
}

async fn scan_once(config: Config) -> Result<()> {
    let db = cv_db::pool::init_pool(&config.server.db_path)?;
    let scanner = Arc::new(Scanner::new(db, ScanSettings::from_config(&config.library)));

    let summary = scanner.scan().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn validate_config(config_path: Option<&Path>, config: &Config) -> Result<()> {
    match config_path {
        Some(p) => println!("Validating config: {}", p.display()),
        None => println!("No config file specified, using defaults"),
    }

    println!("{}", serde_json::to_string_pretty(config)?);

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration has {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipvault=trace,cv_server=trace,cv_db=debug,tower_http=debug".to_string()
        } else {
            "clipvault=info,cv_server=info,cv_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = load_config(&cli);

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config, host, port))
        }
        Commands::Scan => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan_once(config))
        }
        Commands::Validate => validate_config(cli.config.as_deref(), &config),
        Commands::Version => {
            println!("clipvault {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
