//! Brang CLI
//!
//! Registers sites and runs change checks. Meant to be triggered on a
//! schedule (cron, systemd timer); every `check` is one batch.

use std::path::PathBuf;
use std::sync::Arc;

use brang::{
    error::Result,
    models::{Config, LoggingConfig, StrategyKind},
    pipeline::ChangeChecker,
    services::{HttpFetcher, build_notifier},
    storage::{LocalRepository, SiteRepository},
};
use clap::{Parser, Subcommand, ValueEnum};

/// Brang - Website Change Tracker
#[derive(Parser, Debug)]
#[command(name = "brang", version, about = "Website Change Tracker")]
struct Cli {
    /// Path to storage directory containing config.toml and sites.json
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start tracking a URL
    Add { url: String },

    /// Stop tracking a URL and drop its history
    Remove { url: String },

    /// List tracked sites
    List,

    /// Show stored observations of a site
    History { url: String },

    /// Check sites for changes and send a report
    Check {
        /// Override the configured strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Check only this site
        #[arg(long)]
        url: Option<String>,
    },

    /// Validate configuration file
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Naive,
    Invariance,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Naive => StrategyKind::Naive,
            StrategyArg::Invariance => StrategyKind::Invariance,
        }
    }
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load_optional(&config_path);

    // The logger must exist before a load failure is reported.
    let level = match &loaded {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => LoggingConfig::default().level,
    };
    init_logging(cli.verbose, &level);

    let mut config = match loaded {
        Ok(config) => config.unwrap_or_default(),
        Err(e) if matches!(cli.command, Command::Validate) => {
            log::error!("Config load failed from {}: {}", config_path.display(), e);
            return Err(e);
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            Config::default()
        }
    };

    let repo = Arc::new(LocalRepository::new(&cli.storage_dir));

    match cli.command {
        Command::Add { url } => {
            let site = repo.insert_site(&url).await?;
            println!("{}\t{}", site.id, site.url);
        }

        Command::Remove { url } => {
            if !repo.remove_site(&url).await? {
                log::warn!("{} was not tracked", url);
            }
        }

        Command::List => {
            for site in repo.list_sites().await? {
                println!("{}\t{}", site.id, site.url);
            }
        }

        Command::History { url } => {
            let site = repo.get_site(&url).await?;
            for change in repo.changes(&site).await? {
                println!(
                    "{}\t{}\t[{}]",
                    change.check_timestamp.to_rfc3339(),
                    change.fingerprint,
                    change.pattern
                );
            }
        }

        Command::Check { strategy, url } => {
            if let Some(strategy) = strategy {
                config.checker.strategy = strategy.into();
            }
            config.validate()?;

            let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
            let notifier = Arc::from(build_notifier(&config.notify, &config.fetch)?);
            let checker = ChangeChecker::from_config(&config.checker, repo, fetcher, notifier);

            let report = match url {
                Some(url) => checker.check_site(&url).await?,
                None => checker.check_all().await?,
            };

            for line in report.lines() {
                println!("{}", line);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if !config_path.exists() {
                log::warn!("{} not found, defaults validated", config_path.display());
            }
            log::info!("✓ Config OK (strategy: {})", config.checker.strategy);
        }
    }

    Ok(())
}
