use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_AOF_PATH: &str = "resplog.aof";
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Server settings, read from the command line with environment variable fallbacks.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "RESPKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path of the append-only file replayed at startup
    #[arg(long, env = "RESPKV_AOF_PATH", default_value = DEFAULT_AOF_PATH)]
    pub aof_path: PathBuf,

    /// How often the append-only file is synced to disk, in milliseconds
    #[arg(
        long,
        env = "RESPKV_FLUSH_INTERVAL_MS",
        default_value_t = DEFAULT_FLUSH_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub flush_interval_ms: u64,

    /// Largest amount of buffered bytes accepted while waiting for a frame to complete
    #[arg(long, env = "RESPKV_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            aof_path: PathBuf::from(DEFAULT_AOF_PATH),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}
