use std::io::Write;
use std::str::FromStr;

use crate::auth::AuthError;
use crate::command::{ArgHint, RawCommand, CRLF};
use crate::control_channel::{NetworkError, FTP_DEFAULT_BUFLEN};
use crate::data_repr::{DataStructure, DataType, TransferMode};
use crate::data_transfer::{self, DataCommand, TransferError};
use crate::hostport::ParseHostPortError;
use crate::pool::ResourceError;
use crate::thread::ThreadError;
use crate::Session;

use anyhow::{Error, Result};

pub const FTPUI_COMMAND_MAXPARAMS: usize = 5;
const COMMAND_BUFLEN: usize = FTP_DEFAULT_BUFLEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    Invalid(String),
    #[error("{0}: missing parameter")]
    MissingParam(&'static str),
    #[error("too many parameters, at most {0} allowed")]
    TooManyParams(usize),
    #[error("command does not fit in {capacity} bytes")]
    TooLong { capacity: usize },
    #[error("bad parameter: {0}")]
    BadParam(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

/// What the control loop does after a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

impl Flow {
    /// Lost connections and failed logins end the session; everything else is
    /// reported and the loop goes on.
    pub fn after_error(err: &Error) -> Flow {
        if err.is::<NetworkError>() || err.is::<AuthError>() {
            Flow::Terminate
        } else {
            Flow::Continue
        }
    }
}

/// Numeric status for an error: negative when the session cannot go on,
/// positive otherwise.
pub fn error_code(err: &Error) -> i32 {
    if let Some(err) = err.downcast_ref::<NetworkError>() {
        err.code()
    } else if err.is::<AuthError>() {
        -3
    } else if err.is::<CommandError>() {
        1
    } else if err.is::<TransferError>() || err.is::<ParseHostPortError>() {
        2
    } else if err.is::<ResourceError>() || err.is::<ThreadError>() {
        3
    } else if err.is::<std::io::Error>() {
        4
    } else {
        5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Passive,
    Type,
    Mode,
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Simple,
    Setting(Setting),
    DataConnection(DataCommand),
}

#[derive(Debug)]
pub struct UiCommand {
    pub name: &'static str,
    pub handler: Handler,
    pub raw: Option<RawCommand>,
    pub params: ArgHint,
    pub usage: &'static str,
    pub summary: &'static str,
}

impl UiCommand {
    pub fn is_complex(&self) -> bool {
        matches!(self.handler, Handler::DataConnection(_))
    }

    pub fn has_params(&self) -> bool {
        self.params != ArgHint::None
    }

    pub fn is_setting(&self) -> bool {
        matches!(self.handler, Handler::Setting(_))
    }
}

macro_rules! ui {
    ($name:literal, $handler:expr, $raw:expr, $params:ident, $usage:literal, $summary:literal) => {
        UiCommand {
            name: $name,
            handler: $handler,
            raw: $raw,
            params: ArgHint::$params,
            usage: $usage,
            summary: $summary,
        }
    };
}

pub static UI_COMMANDS: &[UiCommand] = &[
    ui!("system", Handler::Simple, Some(RawCommand::Syst), None, "system", "show the server's operating system"),
    ui!("cdup", Handler::Simple, Some(RawCommand::Cdup), None, "cdup", "change to the parent directory"),
    ui!("cd", Handler::Simple, Some(RawCommand::Cwd), Required, "cd <dir>", "change the remote directory"),
    ui!("pwd", Handler::Simple, Some(RawCommand::Pwd), None, "pwd", "print the remote directory"),
    ui!("shelp", Handler::Simple, Some(RawCommand::Help), Optional, "shelp [command]", "ask the server for help"),
    ui!("abort", Handler::Simple, Some(RawCommand::Abor), None, "abort", "abort the running transfer"),
    ui!("status", Handler::Simple, Some(RawCommand::Stat), Optional, "status [path]", "show server status"),
    ui!("quit", Handler::Simple, Some(RawCommand::Quit), None, "quit", "close the session and exit"),
    ui!("help", Handler::Simple, None, None, "help", "list the local commands"),
    ui!("get", Handler::DataConnection(DataCommand::Get), Some(RawCommand::Retr), Required, "get <file>", "download a file"),
    ui!("send", Handler::DataConnection(DataCommand::Send), Some(RawCommand::Stor), Required, "send <file>", "upload a file"),
    ui!("dir", Handler::DataConnection(DataCommand::Dir), Some(RawCommand::List), Optional, "dir [path]", "list a remote directory"),
    ui!("passive", Handler::Setting(Setting::Passive), None, Optional, "passive [on|off]", "show or set passive mode"),
    ui!("type", Handler::Setting(Setting::Type), Some(RawCommand::Type), Optional, "type [A|E|I|L|reset] [N|T|C|byte-size]", "set the transfer data type"),
    ui!("mode", Handler::Setting(Setting::Mode), Some(RawCommand::Mode), Optional, "mode [S|B|C|reset]", "set the transfer mode"),
    ui!("stru", Handler::Setting(Setting::Structure), Some(RawCommand::Stru), Optional, "stru [F|R|P|reset]", "set the file structure"),
];

/// Matches a typed token against the command table. Exact names win,
/// otherwise the first command the token abbreviates.
pub fn find_command(token: &str) -> Option<&'static UiCommand> {
    let token = token.to_lowercase();
    if token.is_empty() {
        return None;
    }
    UI_COMMANDS
        .iter()
        .find(|command| command.name == token)
        .or_else(|| UI_COMMANDS.iter().find(|command| command.name.starts_with(&token)))
}

#[derive(Debug)]
pub struct ParsedLine<'a> {
    pub command: &'static UiCommand,
    pub params: Vec<&'a str>,
}

pub fn parse_line(line: &str) -> Result<ParsedLine<'_>, CommandError> {
    let mut words = line.split_whitespace();
    let token = words.next().unwrap_or_default();
    let command = find_command(token).ok_or_else(|| CommandError::Invalid(token.to_owned()))?;
    let params: Vec<&str> = words.collect();
    if params.len() > FTPUI_COMMAND_MAXPARAMS {
        return Err(CommandError::TooManyParams(FTPUI_COMMAND_MAXPARAMS));
    }
    Ok(ParsedLine { command, params })
}

/// Runs one line typed by the user.
pub fn execute(line: &str, session: &mut Session) -> Result<Flow> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Flow::Continue);
    }
    if let Some(raw) = line.strip_prefix('#') {
        passthrough(raw, session)?;
        return Ok(Flow::Continue);
    }

    let ParsedLine { command, params } = parse_line(line)?;
    log::debug!("Dispatching {} {:?}", command.name, params);
    // `quit` ignores trailing words.
    if command.raw == Some(RawCommand::Quit) {
        return Ok(Flow::Terminate);
    }
    if command.params == ArgHint::None && !params.is_empty() {
        return Err(CommandError::TooManyParams(0).into());
    }
    match command.handler {
        Handler::Simple => simple(command, &params, session),
        Handler::Setting(setting) => {
            apply_setting(setting, &params, session)?;
            Ok(Flow::Continue)
        }
        Handler::DataConnection(data_command) => {
            data_transfer::begin(data_command, &params, session)?;
            Ok(Flow::Continue)
        }
    }
}

fn passthrough(raw: &str, session: &mut Session) -> Result<()> {
    let mut request = raw.trim_end_matches(&['\r', '\n'][..]).to_owned();
    request.push_str(CRLF);
    if request.len() > COMMAND_BUFLEN {
        return Err(CommandError::TooLong {
            capacity: COMMAND_BUFLEN,
        }
        .into());
    }
    let reply = session.request_to_output(&request)?;
    report_silence(reply.code, session)
}

fn simple(command: &UiCommand, params: &[&str], session: &mut Session) -> Result<Flow> {
    let raw = match command.raw {
        Some(raw) => raw,
        None => {
            print_help(session.output())?;
            return Ok(Flow::Continue);
        }
    };
    if command.params == ArgHint::Required && params.is_empty() {
        return Err(CommandError::MissingParam(command.name).into());
    }
    let request = raw.request(params);
    if request.len() > COMMAND_BUFLEN {
        return Err(CommandError::TooLong {
            capacity: COMMAND_BUFLEN,
        }
        .into());
    }
    let reply = session.request_to_output(&request)?;
    report_silence(reply.code, session)?;
    Ok(Flow::Continue)
}

fn report_silence(code: u32, session: &mut Session) -> Result<()> {
    if code == 0 {
        writeln!(session.output(), "No reply from the server")?;
    }
    Ok(())
}

fn print_help(output: &mut dyn Write) -> std::io::Result<()> {
    writeln!(output, "Commands may be abbreviated. Lines starting with # are sent to the server as is.")?;
    for command in UI_COMMANDS {
        writeln!(output, "  {:<40} {}", command.usage, command.summary)?;
    }
    Ok(())
}

fn parse_or_reset<T: FromStr>(params: &[&str]) -> Result<Option<T>, CommandError> {
    match params {
        [value] if value.eq_ignore_ascii_case("reset") => Ok(None),
        [value] => value
            .parse()
            .map(Some)
            .map_err(|_| CommandError::BadParam((*value).to_owned())),
        _ => Err(CommandError::TooManyParams(1)),
    }
}

fn apply_setting(setting: Setting, params: &[&str], session: &mut Session) -> Result<()> {
    match (setting, params) {
        (Setting::Passive, []) | (Setting::Passive, ["on"]) => {
            let state = if session.is_passive() { "on" } else { "off" };
            writeln!(session.output(), "Passive mode: {}", state)?;
        }
        (Setting::Passive, ["off"]) => return Err(CommandError::Unsupported("active mode").into()),
        (Setting::Passive, [other]) => return Err(CommandError::BadParam((*other).to_owned()).into()),
        (Setting::Passive, _) => return Err(CommandError::TooManyParams(1).into()),
        (_, []) => {}
        (Setting::Type, [reset]) if reset.eq_ignore_ascii_case("reset") => {
            session.defaults_mut().data_type = None;
        }
        (Setting::Type, params) => {
            session.defaults_mut().data_type = Some(DataType::parse_args(params)?);
        }
        (Setting::Mode, params) => {
            session.defaults_mut().transfer_mode = parse_or_reset::<TransferMode>(params)?;
        }
        (Setting::Structure, params) => {
            session.defaults_mut().data_structure = parse_or_reset::<DataStructure>(params)?;
        }
    }
    if setting != Setting::Passive {
        let defaults = *session.defaults();
        writeln!(session.output(), "Transfer parameters: {}", defaults)?;
    }
    Ok(())
}
