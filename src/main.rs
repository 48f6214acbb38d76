//! # Shop News Bot
//!
//! Scrapes a shop chain's news listing pages, stores each announcement once
//! in a per-target document store, and posts unpublished announcements to
//! X/Twitter.
//!
//! ## Usage
//!
//! ```sh
//! shop_news_bot <target> save_all_pages
//! shop_news_bot <target> save_new_page
//! shop_news_bot <target> tweet_new_docs [--debug]
//! ```
//!
//! ## Architecture
//!
//! Two independent pipelines, each run by its own command:
//! 1. **Ingestion**: fetch page, locate entries, normalize, insert new ones
//! 2. **Publication**: select unpublished, compose status, post, mark published
//!
//! Exits with status 1 when `target` has no configuration section.

use chrono::Local;
use clap::Parser;
use reqwest::Client;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod ingest;
mod models;
mod publish;
mod scrapers;
mod status;
mod store;
mod twitter;
mod utils;

use cli::{Cli, Command};
use config::TargetConfig;
use ingest::Ingestion;
use publish::Publisher;
use status::StatusComposer;
use store::AnnouncementStore;
use twitter::TwitterApi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let Some(config) = config::load_target(&args.config, &args.target)? else {
        error!(
            target_name = %args.target,
            path = %args.config.display(),
            "No configuration section for target"
        );
        std::process::exit(1);
    };
    info!(target_name = %args.target, command = ?args.command, "shop_news_bot starting");

    let http = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let store = AnnouncementStore::open(&args.data_dir, &config.target);
    let top_url = config.page_url()?.to_string();

    match args.command {
        Command::SaveAllPages => {
            let today = Local::now().date_naive();
            Ingestion::new(http, &config, store, today)
                .save_all_pages(&top_url)
                .await?;
        }
        Command::SaveNewPage => {
            let today = Local::now().date_naive();
            Ingestion::new(http, &config, store, today)
                .save_new_page(&top_url)
                .await?;
        }
        Command::TweetNewDocs => {
            tweet_new_docs(http, &config, &args, &store, top_url).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Post every unpublished announcement with the selected account.
#[instrument(level = "info", skip_all, fields(debug = args.debug))]
async fn tweet_new_docs(
    http: Client,
    config: &TargetConfig,
    args: &Cli,
    store: &AnnouncementStore,
    top_url: String,
) -> Result<(), Box<dyn Error>> {
    let account = config.account_name(args.debug);
    let credentials = config::load_credentials(&args.credentials, account)?;
    info!(%account, "Loaded credentials");

    let feed = TwitterApi::new(http.clone(), credentials.bearer_token);
    let composer = StatusComposer::new(&config.tweet_template, top_url);
    let publisher = Publisher::new(feed, composer, http, std::env::temp_dir());
    publisher.publish_pending(store).await?;
    Ok(())
}
