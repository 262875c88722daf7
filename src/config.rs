use clap::{Parser, ValueEnum};
use std::{
    fmt::Display,
    path::{Path, PathBuf},
};
use tracing::Level;
use url::Url;

/// Dune query returning `contract_address,price` for priced assets.
pub const DEFAULT_PRICES_QUERY_ID: u64 = 3904744;

/// Which file set the pipeline runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Small curated address list; the list itself is never re-downloaded.
    Sample,
    /// Every candidate vault the analytics query returns.
    Full,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Sample => write!(f, "sample"),
            Mode::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Map ERC-4626 vaults to their underlying assets as a GraphML graph")]
pub struct Args {
    #[arg(short, long, env = "MODE", default_value = "sample")]
    pub mode: Mode,
    #[arg(long, env = "JSON_RPC_PROVIDER_URL", hide_env_values = true)]
    pub rpc_url: Option<String>,
    #[arg(long, env = "DUNE_API_KEY", hide_env_values = true)]
    pub dune_api_key: Option<String>,
    #[arg(long, env = "DUNE_QUERY_PRICES", default_value_t = DEFAULT_PRICES_QUERY_ID)]
    pub prices_query_id: u64,
    #[arg(long, env = "DUNE_QUERY_ADDRESSES")]
    pub addresses_query_id: Option<u64>,
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
    /// Number of vaults fetched at once.
    #[arg(short = 'c', long, default_value_t = 1)]
    pub concurrency: usize,
    /// Reuse the price and address files already on disk.
    #[arg(long)]
    pub skip_download: bool,
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JSON_RPC_PROVIDER_URL is not set")]
    MissingRpcUrl,
    #[error("Invalid JSON_RPC_PROVIDER_URL: {0}")]
    InvalidRpcUrl(String),
    #[error("DUNE_API_KEY is not set")]
    MissingDuneApiKey,
    #[error("DUNE_QUERY_ADDRESSES must be set in full mode")]
    MissingAddressesQuery,
}

///
/// FilePaths
///
/// Where each stage reads and writes, relative to the data directory.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePaths {
    pub addresses: PathBuf,
    pub vaults: PathBuf,
    pub output: PathBuf,
    pub prices: PathBuf,
}

impl FilePaths {
    pub fn for_mode(mode: Mode, data_dir: &Path) -> Self {
        let (addresses, vaults, output) = match mode {
            Mode::Sample => (
                "in/addresses-sample.csv",
                "process/vaults-sample.csv",
                "out/output-sample.graphml",
            ),
            Mode::Full => (
                "in/addresses.csv",
                "process/vaults.csv",
                "out/output.graphml",
            ),
        };

        Self {
            addresses: data_dir.join(addresses),
            vaults: data_dir.join(vaults),
            output: data_dir.join(output),
            prices: data_dir.join("reference/asset-prices.csv"),
        }
    }
}

/// Everything the pipeline needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub rpc_url: Url,
    /// Not needed when downloads are skipped.
    pub dune_api_key: Option<String>,
    pub prices_query_id: u64,
    pub addresses_query_id: Option<u64>,
    pub files: FilePaths,
    pub concurrency: usize,
    pub skip_download: bool,
    pub log_level: LogLevel,
}

impl Config {
    /// Validate CLI/environment input. Credentials are required unless their stage is skipped.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let rpc_url = args
            .rpc_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingRpcUrl)?;
        let rpc_url =
            Url::parse(rpc_url.trim()).map_err(|_| ConfigError::InvalidRpcUrl(rpc_url.clone()))?;

        let dune_api_key = args.dune_api_key.filter(|key| !key.trim().is_empty());
        if !args.skip_download {
            if dune_api_key.is_none() {
                return Err(ConfigError::MissingDuneApiKey);
            }
            if args.mode == Mode::Full && args.addresses_query_id.is_none() {
                return Err(ConfigError::MissingAddressesQuery);
            }
        }

        Ok(Self {
            mode: args.mode,
            rpc_url,
            dune_api_key,
            prices_query_id: args.prices_query_id,
            addresses_query_id: args.addresses_query_id,
            files: FilePaths::for_mode(args.mode, &args.data_dir),
            concurrency: args.concurrency.max(1),
            skip_download: args.skip_download,
            log_level: args.log_level,
        })
    }
}

pub fn setup_tracing(log_level: LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("vaultgraphs={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
