use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

/// Discover channels, spider their links and harvest listings.
#[derive(Debug, Parser)]
#[command(name = "channel-harvester", version)]
pub struct Cli {
    #[command(flatten)]
    pub gateway: GatewayArgs,

    /// RON file replacing the built-in locale catalog
    #[arg(long, global = true, env = "HARVESTER_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Args)]
pub struct GatewayArgs {
    /// Base URL of the messaging gateway
    #[arg(long = "gateway", global = true, env = "HARVESTER_GATEWAY_URL", hide_env_values = true)]
    pub url: Option<String>,

    /// Token of the authorized gateway session
    #[arg(long = "token", global = true, env = "HARVESTER_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search channels and messages by keyword or #hashtag
    Search(SearchArgs),
    /// Follow links breadth-first from a locale's seed channels
    Spider(SpiderArgs),
    /// List channels the session account is subscribed to
    List,
    /// Print relevant messages from one channel
    Extract(ExtractArgs),
    /// Harvest listings from a locale's channels
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Query; a leading `#` searches a hashtag
    #[arg(default_value = "#недвижимость", conflicts_with = "locale")]
    pub query: String,

    /// Run every discovery query of this locale instead
    #[arg(long)]
    pub locale: Option<String>,

    /// Results requested per query
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct SpiderArgs {
    /// Locale whose seed channels start the traversal
    #[arg(default_value = "kg")]
    pub locale: String,

    /// Number of link levels to follow
    #[arg(long, default_value_t = 2)]
    pub depth: usize,

    /// Messages scanned for links per channel
    #[arg(long, default_value_t = 200)]
    pub messages: usize,

    /// Maximum channel resolutions in this run
    #[arg(long, default_value_t = 100)]
    pub budget: u32,

    /// Maximum channel resolutions per level
    #[arg(long, default_value_t = 25)]
    pub ceiling: usize,

    /// Seconds to pause after each channel
    #[arg(long, default_value_t = 1)]
    pub pacing: u64,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Channel handle, with or without `@`
    pub channel: String,

    /// Messages to read
    #[arg(default_value_t = 20)]
    pub limit: usize,

    /// Keep messages without a price
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Locale whose seed channels and currencies are used
    #[arg(default_value = "kg")]
    pub locale: String,

    /// Fetch these channels instead of the locale seeds
    #[arg(long = "channel", value_name = "HANDLE")]
    pub channels: Vec<String>,

    /// Messages to read per channel
    #[arg(long, default_value_t = 50)]
    pub messages: usize,

    /// Write listings to this file as JSON Lines
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Skip photo downloads
    #[arg(long)]
    pub no_media: bool,
}
