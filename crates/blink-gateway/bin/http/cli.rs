use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "BLINK_LISTEN_ADDR";
pub const PUBLIC_BASE_URL_ENV: &str = "BLINK_PUBLIC_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "BLINK_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "BLINK_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "BLINK_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "BLINK_REDIS_URL";
pub const MOKA_CAPACITY_ENV: &str = "BLINK_MOKA_CAPACITY";
pub const MAX_IDENTIFIER_RETRIES_ENV: &str = "BLINK_MAX_IDENTIFIER_RETRIES";
pub const CACHE_TTL_SECS_ENV: &str = "BLINK_CACHE_TTL_SECS";
pub const FLUSH_INTERVAL_MS_ENV: &str = "BLINK_METRICS_FLUSH_INTERVAL_MS";
pub const QUEUE_CAPACITY_ENV: &str = "BLINK_METRICS_QUEUE_CAPACITY";
pub const RECORD_TIMEOUT_MS_ENV: &str = "BLINK_RECORD_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "BLINK_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:8080/public/v1/short-urls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "moka")]
    Moka,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::Moka => write!(f, "moka"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "blink-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix short codes are appended to in create responses.
    #[arg(long, env = PUBLIC_BASE_URL_ENV, default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Moka
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = MOKA_CAPACITY_ENV, default_value_t = 10_000)]
    pub moka_capacity: u64,

    #[arg(long, env = MAX_IDENTIFIER_RETRIES_ENV, default_value_t = 10)]
    pub max_identifier_retries: u32,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = FLUSH_INTERVAL_MS_ENV, default_value_t = 1000)]
    pub metrics_flush_interval_ms: u64,

    #[arg(long, env = QUEUE_CAPACITY_ENV, default_value_t = 1000)]
    pub metrics_queue_capacity: usize,

    #[arg(long, env = RECORD_TIMEOUT_MS_ENV, default_value_t = 100)]
    pub record_timeout_ms: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}
