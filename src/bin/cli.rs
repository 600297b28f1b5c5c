//! UMich Class Checker CLI
//!
//! Local execution entry point. For AWS Lambda, use `class-checker-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use class_checker::{
    error::Result,
    models::{Config, SectionId},
    pipeline::Checker,
    storage::LocalStore,
};
use tokio_util::sync::CancellationToken;

/// UMich Class Checker - course section seat watcher
#[derive(Parser, Debug)]
#[command(
    name = "class-checker",
    version,
    about = "Watches UMich course sections and mails subscribers when they open or fill"
)]
struct Cli {
    /// Path to the configuration file (default: {store}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the storage directory holding sections.json
    #[arg(short, long, default_value = "storage")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Catalog location of one section.
#[derive(Args, Debug)]
struct SectionArgs {
    /// Term code, e.g. 2010
    #[arg(long)]
    term: String,

    /// School code, e.g. ENG
    #[arg(long)]
    school: String,

    /// Subject code, e.g. EECS
    #[arg(long)]
    subject: String,

    /// Catalog number, e.g. 281
    #[arg(long)]
    number: String,

    /// Section number, e.g. 001
    #[arg(long)]
    section: String,
}

impl SectionArgs {
    fn id(&self) -> SectionId {
        SectionId::new(
            &self.term,
            &self.school,
            &self.subject,
            &self.number,
            &self.section,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation pass over every tracked section
    Check {
        /// Print the pass report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start tracking a section for a subscriber
    Add {
        #[command(flatten)]
        section: SectionArgs,

        /// Subscriber email address
        #[arg(long)]
        email: String,
    },

    /// List tracked sections
    List {
        /// Only sections of this subscriber
        #[arg(long)]
        email: Option<String>,
    },

    /// Query one section without storing anything
    Probe {
        #[command(flatten)]
        section: SectionArgs,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the token on Ctrl-C so in-flight sections can finish.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing in-flight sections...");
            token.cancel();
        }
    });
    cancel
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.store.join("config.toml"));
    let mut config = Config::load_or_default(&config_path);
    config.apply_env_overrides();

    if let Command::Validate = cli.command {
        log::info!("Validating {}...", config_path.display());
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK (catalog variant: {:?})", config.catalog.variant);
        return Ok(());
    }

    let store = Arc::new(LocalStore::new(&cli.store));
    let checker = Checker::from_config(&config, store)?;

    match cli.command {
        Command::Check { json } => {
            let report = checker.check(&cancel_on_ctrl_c()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
        }

        Command::Add { section, email } => {
            let tracked = checker.register(&section.id(), &email).await?;
            println!(
                "Now tracking {} for {} (currently {})",
                tracked.id,
                tracked.subscriber,
                if tracked.open { "open" } else { "closed" }
            );
        }

        Command::List { email } => {
            let sections = checker.list(email.as_deref()).await?;
            if sections.is_empty() {
                log::info!("No tracked sections.");
            }
            for s in sections {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    s.id.term,
                    s.id.school,
                    s.id,
                    s.subscriber,
                    if s.open { "open" } else { "closed" }
                );
            }
        }

        Command::Probe { section } => {
            let id = section.id();
            let status = checker.probe(&id).await?;
            println!(
                "{} is {}",
                id.normalized(),
                if status.open { "open" } else { "closed" }
            );
        }

        Command::Validate => {}
    }

    Ok(())
}
