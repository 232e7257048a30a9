use clap::Parser;
use log::LevelFilter;

use super::{Config, ConfigChanges};

#[derive(Parser)]
#[clap(version, author, about = "Interactive FTP client")]
pub struct CliConfig {
    /// Host name or address of the FTP server
    pub server_name: String,
    /// Control port of the server, required when a remote command follows
    pub server_port: Option<u16>,
    /// Command to run after logging in, e.g. `get notes.txt`; the session is
    /// closed afterwards
    pub remote_command: Vec<String>,

    /// Sets the path to toml configuration file
    #[clap(name = "config", short, long)]
    pub config_file: Option<String>,
    /// Login name offered on the first attempt
    #[clap(short, long)]
    pub user: Option<String>,
    /// Console log level (off, error, warn, info, debug, trace)
    #[clap(short, long)]
    pub log_level: Option<LevelFilter>,
}

impl ConfigChanges for CliConfig {
    fn apply(&self, config: &mut Config) {
        config.client.host = self.server_name.clone();
        if let Some(port) = self.server_port {
            config.client.port = port;
        }
        if !self.remote_command.is_empty() {
            config.remote_command = self.remote_command.clone();
        }
        if let Some(user) = &self.user {
            config.client.user = Some(user.clone());
        }
        if let Some(level) = self.log_level {
            config.log.console.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_arguments() {
        let cli = CliConfig::parse_from(["gftp", "ftp.example.org", "2121", "get", "notes.txt"]);
        let mut config = Config::default();
        config.merge(&cli);
        assert_eq!(config.client.host, "ftp.example.org");
        assert_eq!(config.client.port, 2121);
        assert_eq!(config.one_shot().as_deref(), Some("get notes.txt"));
    }

    #[test]
    fn test_cli_keeps_unset_values() {
        let cli = CliConfig::parse_from(["gftp", "localhost", "--log-level", "debug"]);
        let mut config = Config::default();
        config.client.port = 2121;
        config.merge(&cli);
        assert_eq!(config.client.port, 2121);
        assert_eq!(config.log.console.level, LevelFilter::Debug);
        assert!(config.one_shot().is_none());
    }
}
