use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::DEFAULT_AUTH_ATTEMPTS;
use crate::data_repr::TransferParams;
use crate::pool::FTP_MAX_DATA_THREADS;

pub const FTP_CONTROL_PORT: u16 = 21;

/// Destination of `dir` listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutput {
    Stdout,
    File(PathBuf),
}

impl Default for ListingOutput {
    fn default() -> Self {
        ListingOutput::Stdout
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// How long a reply may stay silent before the exchange is considered
    /// finished.
    pub poll_timeout: Duration,
    pub connect_timeout: Duration,
    pub auth_attempts: u32,
    pub max_data_threads: usize,
    pub listing_output: ListingOutput,
    pub download_dir: PathBuf,
    pub transfer: TransferParams,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "localhost".to_owned(),
            port: FTP_CONTROL_PORT,
            poll_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            auth_attempts: DEFAULT_AUTH_ATTEMPTS,
            max_data_threads: FTP_MAX_DATA_THREADS,
            listing_output: ListingOutput::default(),
            download_dir: PathBuf::from("."),
            transfer: TransferParams::default(),
            user: None,
            password: None,
        }
    }
}
