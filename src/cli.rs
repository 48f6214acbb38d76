//! Command-line interface definitions.
//!
//! The positional `target` selects a section of the config file and the
//! positional `command` selects which pipeline runs. File locations can also
//! be given through environment variables.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Pipeline step to run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum Command {
    /// Store entries from the top page and every backnumber page
    SaveAllPages,
    /// Store entries from the top page only
    SaveNewPage,
    /// Post every unpublished entry
    TweetNewDocs,
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// shop_news_bot prismstone_info save_new_page
/// shop_news_bot prismstone_info tweet_new_docs --debug
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Configuration section to use
    pub target: String,

    /// Pipeline step to run
    #[arg(value_enum)]
    pub command: Command,

    /// Post with the sandbox account instead of the real one
    #[arg(short, long)]
    pub debug: bool,

    /// Path to the per-target configuration file
    #[arg(short, long, env = "SHOP_NEWS_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the credential profiles file
    #[arg(long, env = "SHOP_NEWS_CREDENTIALS", default_value = "credentials.yaml")]
    pub credentials: PathBuf,

    /// Root directory of the announcement store
    #[arg(long, env = "SHOP_NEWS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}
