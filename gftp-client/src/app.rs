use crate::config::{CliConfig, Config, LogOpts, TomlConfig};
use gftp::{error_code, AuthError, Flow, PromptCredentials, Session};

use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use user_error::UserFacingError;

use std::concat;
use std::fs::{read_to_string, File};
use std::io::{self, BufRead, ErrorKind, Write};
use std::str::FromStr;

pub struct App {}

impl App {
    pub fn run() -> Result<(), UserFacingError> {
        let mut config = Config::default();

        let cli_config = CliConfig::parse();

        let toml_config = if let Some(toml_path) = &cli_config.config_file {
            let toml_input = Self::fallible_config_read(toml_path)?;
            Some((toml_path.to_string(), toml_input))
        } else {
            Self::read_default_config()
        };

        if let Some((toml_path, toml_input)) = toml_config {
            let toml_config = Self::decode_toml(&toml_path, &toml_input)?;
            config.merge(&toml_config);
        }

        config.merge(&cli_config);

        Self::initialize_logger(&config.log)?;
        Self::run_client(config)
    }

    fn initialize_logger(log_opts: &LogOpts) -> Result<(), UserFacingError> {
        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            log_opts.console.level,
            simplelog::Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )];
        if let Some(file_opts) = &log_opts.file {
            let file = File::create(&file_opts.file_path).map_err(|err| {
                UserFacingError::new(format!(
                    "Could not open log file {}",
                    file_opts.file_path.display()
                ))
                .reason(err.to_string())
            })?;
            loggers.push(WriteLogger::new(
                file_opts.level,
                simplelog::Config::default(),
                file,
            ));
        }
        CombinedLogger::init(loggers).map_err(|err| {
            UserFacingError::new("Unable to initialize logging").reason(err.to_string())
        })
    }

    fn run_client(config: Config) -> Result<(), UserFacingError> {
        let client = &config.client;
        let mut session = match Session::connect(client) {
            Ok(session) => session,
            Err(err) => {
                let error = UserFacingError::new(format!(
                    "Failed to connect to {}:{}",
                    client.host, client.port
                ));
                let error = match err.kind() {
                    ErrorKind::ConnectionRefused => error
                        .reason("The server refused the connection")
                        .help("Check that an FTP server listens on the requested port"),
                    ErrorKind::TimedOut => error.reason("Connection attempt timed out").help(
                        concat!(
                            "The server may be unreachable from this network or ",
                            "a firewall may drop the packets"
                        )
                    ),
                    ErrorKind::AddrNotAvailable | ErrorKind::NotFound => error
                        .reason("The server name could not be resolved")
                        .help("Check the spelling of the server name"),
                    _ => error
                        .reason("Encountered unexpected error")
                        .help(format!("Action returned with error {}", err)),
                };
                return Err(error);
            }
        };

        {
            let stdin = io::stdin();
            let mut credentials = PromptCredentials::new(stdin.lock(), io::stdout())
                .with_preset(client.user.clone(), client.password.clone());
            if let Err(err) = session.authorize(&mut credentials) {
                let error = UserFacingError::new("Login failed");
                let error = match &err {
                    AuthError::MaxAttemptsReached { .. } => error
                        .reason(err.to_string())
                        .help("Check your user name and password"),
                    _ => error.reason(err.to_string()),
                };
                return Err(error);
            }
        }

        match config.one_shot() {
            Some(line) => {
                Self::execute(&mut session, &line);
            }
            None => Self::interactive(&mut session),
        }

        if let Err(err) = session.close() {
            log::warn!("Session did not close cleanly: {}", err);
        }
        Ok(())
    }

    fn interactive(session: &mut Session) {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        loop {
            print!("ftp> ");
            if let Err(err) = io::stdout().flush() {
                log::warn!("Could not flush prompt: {}", err);
            }
            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    log::error!("Could not read command: {}", err);
                    break;
                }
            }
            if Self::execute(session, &line) == Flow::Terminate {
                break;
            }
        }
    }

    fn execute(session: &mut Session, line: &str) -> Flow {
        match session.execute(line) {
            Ok(flow) => flow,
            Err(err) => {
                eprintln!("Error {}: {:#}", error_code(&err), err);
                Flow::after_error(&err)
            }
        }
    }

    fn fallible_config_read(path: &str) -> Result<String, UserFacingError> {
        match read_to_string(path) {
            Ok(config) => Ok(config),
            Err(err) => {
                let error = UserFacingError::new(format!("Could not read {} config file", path));
                let error = match err.kind() {
                    ErrorKind::NotFound => error.reason("File not found"),
                    ErrorKind::PermissionDenied => {
                        error.reason("Insufficient permissions to open the file")
                    }
                    ErrorKind::InvalidData => error.reason("Config file is probably invalid UTF-8"),
                    _ => error.reason("It is due to unexpected reasons"),
                };
                let error = error.help(err.to_string());
                Err(error)
            }
        }
    }

    fn read_default_config() -> Option<(String, String)> {
        static TOML_CONFIG_PATHS: &[&str] = &["gftp.toml"];

        for path in TOML_CONFIG_PATHS {
            if let Ok(config) = read_to_string(path) {
                return Some((path.to_string(), config));
            }
        }
        None
    }

    fn decode_toml(toml_path: &str, toml_input: &str) -> Result<TomlConfig, UserFacingError> {
        let toml_config = match TomlConfig::from_str(toml_input) {
            Ok(toml_config) => toml_config,
            Err(err) => {
                let error = UserFacingError::new(format!("Unable to decode {} file", toml_path))
                    .reason("Could not deserialize toml input");
                let error = match err.line_col() {
                    None => error,
                    Some((line, col)) => {
                        error.help(format!("The problem is on line {} column {}", line, col))
                    }
                };
                let error = error.help(err.to_string());
                return Err(error);
            }
        };
        if let Err(err) = toml_config.transfer_params() {
            return Err(
                UserFacingError::new(format!("Invalid [transfer] section in {}", toml_path))
                    .reason(err.to_string())
                    .help("Valid values are type = A|E|I|L <n>, mode = S|B|C, stru = F|R|P"),
            );
        }
        Ok(toml_config)
    }
}
