use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const DEFAULT_CONFIG_FILE: &str = "methylseq-fetch.json";
pub const DEFAULT_OUTPUT_DIR: &str = "./methylation_data";
pub const DEFAULT_MAX_PARALLEL: usize = 2;
pub const DEFAULT_THREADS: usize = 2;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub max_parallel: Option<usize>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<String>,
    pub max_parallel: Option<usize>,
    pub threads: Option<usize>,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_dir: Utf8PathBuf,
    pub max_parallel: usize,
    pub threads: usize,
    pub query_timeout: Duration,
    pub download_timeout: Duration,
    pub log_file: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<Settings, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| FetchError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(config: Config, overrides: Overrides) -> Result<Settings, FetchError> {
        let max_parallel = overrides
            .max_parallel
            .or(config.max_parallel)
            .unwrap_or(DEFAULT_MAX_PARALLEL);
        if max_parallel == 0 {
            return Err(FetchError::ConfigParse(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        let threads = overrides
            .threads
            .or(config.threads)
            .unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(FetchError::ConfigParse(
                "threads must be at least 1".to_string(),
            ));
        }

        Ok(Settings {
            output_dir: Utf8PathBuf::from(
                overrides
                    .output_dir
                    .or(config.output_dir)
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            max_parallel,
            threads,
            query_timeout: Duration::from_secs(
                config
                    .query_timeout_secs
                    .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
            ),
            download_timeout: Duration::from_secs(
                config
                    .download_timeout_secs
                    .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            ),
            log_file: overrides.log_file.or(config.log_file).map(Utf8PathBuf::from),
        })
    }
}
