use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("YTDL_API_", $v)
    };
}

/// HTTP API downloading web videos with `yt-dlp`, merging their streams
/// with `ffmpeg`, and serving the results.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The path to the configuration file, JSON or TOML.
    ///
    /// Any value can be overridden by an environment variable
    /// such as `YTDL_API_SERVER__PORT=9000`
    #[arg(long, default_value = "config.json", env = arg_env!("CONFIG"))]
    pub config: PathBuf,

    /// The maximum level of the logged events
    #[arg(long, default_value_t = Level::INFO, env = arg_env!("LOG_LEVEL"))]
    pub log_level: Level,
}
