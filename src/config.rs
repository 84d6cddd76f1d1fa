use std::{num::NonZeroU32, path::{Path, PathBuf}, time::Duration};

use config::{Config, Environment, File};
use miette::{miette, Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables overriding the configuration file
pub const ENV_PREFIX: &str = "YTDL_API";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub downloader: DownloaderSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Number of requests processed at the same time
    pub workers: usize,
    /// Directory holding the web client
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
            workers: 4,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// What to do when one of the stream downloads reports an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Log it and go on: the request only fails if the file cannot be found afterwards.
    /// The engine may have written a usable file before reporting an error.
    #[default]
    #[serde(alias = "continue")]
    ContinueToLocate,
    /// Fail the request right away
    FailFast,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloaderSettings {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Public URL the download directory is served under
    pub base_url: String,
    #[serde(default = "default_resolution")]
    pub default_resolution: NonZeroU32,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Upper bound on a whole request's engine calls, 0 to disable
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,
    #[serde(default)]
    pub fetch_failure_policy: FetchFailurePolicy,
}

impl DownloaderSettings {
    pub fn new(download_dir: PathBuf, temp_dir: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            download_dir,
            temp_dir,
            base_url: base_url.into(),
            default_resolution: default_resolution(),
            log_file: None,
            engine_timeout_secs: default_engine_timeout_secs(),
            fetch_failure_policy: FetchFailurePolicy::default(),
        }
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        (self.engine_timeout_secs > 0).then(|| Duration::from_secs(self.engine_timeout_secs))
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_resolution() -> NonZeroU32 {
    NonZeroU32::new(720).expect("720 is not zero")
}

fn default_engine_timeout_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub cors_origin: CorsOrigins,
    pub rate_limit: RateLimitSettings,
}

/// Allowed CORS origins, as one string or a list. `*` allows any origin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CorsOrigins {
    One(String),
    Many(Vec<String>),
}

impl Default for CorsOrigins {
    fn default() -> Self {
        Self::One("*".to_owned())
    }
}

impl CorsOrigins {
    pub fn is_any(&self) -> bool {
        self.origins().iter().any(|origin| origin == "*")
    }

    pub fn origins(&self) -> Vec<String> {
        match self {
            CorsOrigins::One(origin) => vec![origin.clone()],
            CorsOrigins::Many(origins) => origins.clone(),
        }
    }
}

/// Only reported by `/config`: no rate limiting is done.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
}

impl Settings {
    /// Read the configuration file, then apply `YTDL_API_<SECTION>__<KEY>` overrides.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(miette!("Configuration file not found: {}", path.display()));
        }

        let settings: Self = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read configuration file {}", path.display()))?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            return Err(miette!("server.workers must be at least 1"));
        }
        if self.downloader.base_url.trim().is_empty() {
            return Err(miette!("downloader.base_url must not be empty"));
        }
        Ok(())
    }

    /// Subset of the configuration that is safe to expose
    pub fn public_view(&self) -> PublicConfig {
        PublicConfig {
            server: PublicServer {
                host: self.server.host.clone(),
                port: self.server.port,
            },
            downloader: PublicDownloader {
                base_url: self.downloader.base_url.clone(),
                default_resolution: self.downloader.default_resolution.get(),
            },
            api: PublicApi {
                rate_limit: self.api.rate_limit.enabled,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicConfig {
    pub server: PublicServer,
    pub downloader: PublicDownloader,
    pub api: PublicApi,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicServer {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicDownloader {
    pub base_url: String,
    pub default_resolution: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicApi {
    pub rate_limit: bool,
}
