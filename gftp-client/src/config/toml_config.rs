use std::convert::Into;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{Config, ConfigChanges};

use gftp::{CommandError, DataStructure, DataType, ListingOutput, TransferMode, TransferParams};
use log::LevelFilter;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct TomlConfig {
    server: Option<ServerConfig>,
    auth: Option<AuthConfig>,
    transfer: Option<TransferConfig>,
    #[serde(rename(deserialize = "log"))]
    log_opts: Option<LogOpts>,
}

impl FromStr for TomlConfig {
    type Err = toml::de::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config = toml::from_str(s)?;
        Ok(config)
    }
}

impl TomlConfig {
    /// Parses the `[transfer]` representation settings, which serde only
    /// sees as strings.
    pub fn transfer_params(&self) -> Result<TransferParams, CommandError> {
        let mut params = TransferParams::default();
        let transfer = match &self.transfer {
            Some(transfer) => transfer,
            None => return Ok(params),
        };
        let bad_value = |value: &str| CommandError::BadParam(value.to_owned());
        if let Some(data_type) = &transfer.data_type {
            let args: Vec<&str> = data_type.split_whitespace().collect();
            params.data_type = Some(DataType::parse_args(&args)?);
        }
        if let Some(mode) = &transfer.mode {
            params.transfer_mode = Some(TransferMode::from_str(mode).map_err(|_| bad_value(mode))?);
        }
        if let Some(stru) = &transfer.stru {
            params.data_structure =
                Some(DataStructure::from_str(stru).map_err(|_| bad_value(stru))?);
        }
        Ok(params)
    }
}

impl ConfigChanges for TomlConfig {
    fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            if let Some(host) = &server.host {
                config.client.host = host.clone();
            }
            if let Some(port) = server.port {
                config.client.port = port;
            }
            if let Some(timeout) = server.poll_timeout_ms {
                config.client.poll_timeout = Duration::from_millis(timeout);
            }
            if let Some(timeout) = server.connect_timeout {
                config.client.connect_timeout = Duration::from_secs(timeout);
            }
        }
        if let Some(auth) = &self.auth {
            if let Some(user) = &auth.user {
                config.client.user = Some(user.clone());
            }
            if let Some(password) = &auth.password {
                config.client.password = Some(password.clone());
            }
            if let Some(attempts) = auth.attempts {
                config.client.auth_attempts = attempts;
            }
        }
        if let Some(transfer) = &self.transfer {
            if let Ok(params) = self.transfer_params() {
                config.client.transfer = params;
            }
            if let Some(max_threads) = transfer.max_threads {
                config.client.max_data_threads = max_threads;
            }
            if let Some(dir) = &transfer.download_dir {
                config.client.download_dir = dir.clone();
            }
            if let Some(listing) = &transfer.listing {
                config.client.listing_output = if listing == "stdout" {
                    ListingOutput::Stdout
                } else {
                    ListingOutput::File(PathBuf::from(listing))
                };
            }
        }
        if let Some(log_opts) = &self.log_opts {
            if let Some(file_log_opts) = log_opts.file_log_opts.clone() {
                config.log.file = Some(super::FileLogOpts {
                    file_path: file_log_opts.path,
                    level: file_log_opts.level.into(),
                });
            }
            if let Some(console_log_opts) = log_opts.console_log_opts.clone() {
                config.log.console.level = console_log_opts.level.into();
            }
        }
    }
}

#[derive(Deserialize)]
struct ServerConfig {
    host: Option<String>,
    port: Option<u16>,
    poll_timeout_ms: Option<u64>,
    connect_timeout: Option<u64>,
}

#[derive(Deserialize)]
struct AuthConfig {
    user: Option<String>,
    password: Option<String>,
    attempts: Option<u32>,
}

#[derive(Deserialize)]
struct TransferConfig {
    #[serde(rename(deserialize = "type"))]
    data_type: Option<String>,
    mode: Option<String>,
    stru: Option<String>,
    max_threads: Option<usize>,
    download_dir: Option<PathBuf>,
    listing: Option<String>,
}

#[derive(Deserialize, Clone)]
enum LogLevel {
    #[serde(rename(deserialize = "off"))]
    Off,
    #[serde(rename(deserialize = "error"))]
    Error,
    #[serde(rename(deserialize = "warn"))]
    Warn,
    #[serde(rename(deserialize = "info"))]
    Info,
    #[serde(rename(deserialize = "debug"))]
    Debug,
    #[serde(rename(deserialize = "trace"))]
    Trace,
}

impl Into<LevelFilter> for LogLevel {
    fn into(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Deserialize, Clone)]
struct FileLogOpts {
    path: PathBuf,
    level: LogLevel,
}

#[derive(Deserialize, Clone)]
struct ConsoleLogOpts {
    level: LogLevel,
}

#[derive(Deserialize)]
struct LogOpts {
    #[serde(rename(deserialize = "file"))]
    file_log_opts: Option<FileLogOpts>,
    #[serde(rename(deserialize = "console"))]
    console_log_opts: Option<ConsoleLogOpts>,
}
