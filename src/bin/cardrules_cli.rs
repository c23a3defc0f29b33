//! CardRules CLI - ingest card reward pages
//!
//! Commands: process, extract, validate, latest
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a ruleset needs review

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cardrules_core::{
    card_key, content_hash, extract,
    storage::{FsBlobStore, FsKeyValueStore},
    CardRuleSet, Clock, FetchedPage, HttpTextFetcher, IngestConfig, IngestionPipeline, PageFetcher,
    ProcessStatus, RulesetPublisher, SystemClock, Validator,
};

#[derive(Parser)]
#[command(name = "cardrules-cli")]
#[command(about = "CardRules CLI - card reward page ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long, env = "CARDRULES_CONFIG")]
    config: Option<PathBuf>,

    /// Storage root (overrides the config file)
    #[arg(short, long, env = "CARDRULES_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, extract, validate and publish a card page
    Process {
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        region: String,
    },

    /// Extract a ruleset from a saved page without storing anything
    Extract {
        /// Saved HTML file
        #[arg(short, long)]
        file: PathBuf,

        /// URL the page was saved from
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        region: String,
    },

    /// Validate a ruleset
    Validate {
        /// JSON payload (CardRuleSet)
        #[arg(short, long)]
        payload: String,
    },

    /// Show the latest published version pointer for a card
    Latest {
        #[arg(long)]
        card_name: String,

        #[arg(short, long)]
        region: String,
    },
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"error": "Failed to encode output: {}"}}"#, e),
    }
}

fn print_error(message: impl std::fmt::Display) -> ExitCode {
    println!("{}", serde_json::json!({ "error": message.to_string() }));
    ExitCode::FAILURE
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match IngestConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return print_error(e),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Process { url, region } => {
            if url.trim().is_empty() || region.trim().is_empty() {
                return print_error("url and region are required");
            }

            let source = match HttpTextFetcher::new(config.timeout(), &config.user_agent) {
                Ok(f) => f,
                Err(e) => return print_error(e),
            };
            let fetcher = PageFetcher::new(
                Arc::new(source),
                Arc::new(FsBlobStore::new(config.blob_dir())),
            );
            let publisher = RulesetPublisher::new(
                Arc::new(FsBlobStore::new(config.blob_dir())),
                Arc::new(FsKeyValueStore::new(config.pointer_dir())),
            );
            let pipeline = IngestionPipeline::new(fetcher, publisher);

            match pipeline.process(&url, &region).await {
                Ok(outcome) => {
                    print_json(&outcome);
                    match outcome.status {
                        ProcessStatus::Published => ExitCode::SUCCESS,
                        ProcessStatus::NeedsReview => ExitCode::from(2),
                    }
                }
                Err(e) => print_error(e),
            }
        }

        Commands::Extract { file, url, region } => {
            let content = match std::fs::read_to_string(&file) {
                Ok(c) => c,
                Err(e) => return print_error(format!("Failed to read {}: {}", file.display(), e)),
            };
            let hash = content_hash(&content);
            let page = FetchedPage {
                snapshot_key: cardrules_core::fetcher::snapshot_key(&region, &hash),
                url,
                content,
                content_hash: hash,
                fetched_at: SystemClock.now(),
            };

            let ruleset = extract(&page, &region);
            let validation = Validator::new().validate(&ruleset);
            let valid = validation.valid;
            print_json(&serde_json::json!({
                "ruleset": ruleset,
                "validation": validation,
            }));
            if valid { ExitCode::SUCCESS } else { ExitCode::from(2) }
        }

        Commands::Validate { payload } => {
            let ruleset: CardRuleSet = match serde_json::from_str(&payload) {
                Ok(r) => r,
                Err(e) => {
                    println!("{}", serde_json::json!({
                        "valid": false,
                        "error": format!("Invalid payload: {}", e),
                    }));
                    return ExitCode::FAILURE;
                }
            };

            let result = Validator::new().validate(&ruleset);
            print_json(&result);
            if result.valid { ExitCode::SUCCESS } else { ExitCode::from(2) }
        }

        Commands::Latest { card_name, region } => {
            let key = card_key(&card_name, &region);
            let publisher = RulesetPublisher::new(
                Arc::new(FsBlobStore::new(config.blob_dir())),
                Arc::new(FsKeyValueStore::new(config.pointer_dir())),
            );

            match publisher.latest(&key).await {
                Ok(Some(record)) => {
                    print_json(&serde_json::json!({ "cardKey": key, "pointer": record }));
                    ExitCode::SUCCESS
                }
                Ok(None) => print_error(format!("No published ruleset for {}", key)),
                Err(e) => print_error(e),
            }
        }
    }
}
