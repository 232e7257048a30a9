use std::default::Default;
use std::path::PathBuf;

use gftp::ClientConfig;

use log::LevelFilter;

pub struct Config {
    pub client: ClientConfig,
    /// Command executed right after login instead of the interactive prompt.
    pub remote_command: Vec<String>,
    pub log: LogOpts,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client: ClientConfig::default(),
            remote_command: Vec::new(),
            log: LogOpts::default(),
        }
    }
}

impl Config {
    pub fn merge<C: ?Sized>(&mut self, changes: &C)
    where
        C: ConfigChanges,
    {
        changes.apply(self)
    }

    pub fn one_shot(&self) -> Option<String> {
        if self.remote_command.is_empty() {
            None
        } else {
            Some(self.remote_command.join(" "))
        }
    }
}

pub trait ConfigChanges {
    fn apply(&self, config: &mut Config);
}

#[derive(Default)]
pub struct LogOpts {
    pub file: Option<FileLogOpts>,
    pub console: ConsoleLogOpts,
}

pub struct FileLogOpts {
    pub file_path: PathBuf,
    pub level: LevelFilter,
}

pub struct ConsoleLogOpts {
    pub level: LevelFilter,
}

impl Default for ConsoleLogOpts {
    fn default() -> Self {
        ConsoleLogOpts {
            level: LevelFilter::Warn,
        }
    }
}
