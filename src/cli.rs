use clap::{Args, Parser, Subcommand};
use cv_core::config::{db_path_from_location, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipvault")]
#[command(author, version, about = "Catalog for downloaded video folders with seekable streaming")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that take precedence over the config file.
#[derive(Args, Default)]
pub struct Overrides {
    /// Root directory holding one folder per video
    #[arg(long, env = "VIDEO_DIR", global = true)]
    pub video_dir: Option<PathBuf>,

    /// Database location: a path or a sqlite:/// URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Directory with the frontend build
    #[arg(long, env = "STATIC_DIR", global = true)]
    pub static_dir: Option<PathBuf>,

    /// Scan the video directory when the server starts
    #[arg(
        long,
        env = "SCAN_ON_STARTUP",
        global = true,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub scan_on_startup: Option<bool>,

    /// Default number of videos per page
    #[arg(long, env = "PAGE_SIZE", global = true)]
    pub page_size: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.video_dir {
            config.library.video_dir = dir.clone();
        }
        if let Some(url) = &self.database_url {
            config.server.db_path = db_path_from_location(url);
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
        if let Some(scan) = self.scan_on_startup {
            config.library.scan_on_startup = scan;
        }
        if let Some(size) = self.page_size {
            config.api.page_size = size;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Run one reconciliation pass and print the summary
    Scan,

    /// Validate configuration and print the effective settings
    Validate,

    /// Display version information
    Version,
}
