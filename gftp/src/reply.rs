use std::fmt::{Display, Formatter};

use strum::{EnumMessage, IntoEnumIterator};
use strum_macros::{EnumIter, EnumMessage};

/// A server reply as seen by the control channel. `code` is 0 when nothing
/// parseable arrived before the poll timeout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub code: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    None,
    Preliminary,
    Completion,
    Intermediate,
    TransientNegative,
    PermanentNegative,
}

impl Reply {
    pub fn new(code: u32, text: String) -> Reply {
        Reply { code, text }
    }

    pub fn none() -> Reply {
        Reply::default()
    }

    pub fn kind(&self) -> ReplyKind {
        match self.code / 100 {
            1 => ReplyKind::Preliminary,
            2 => ReplyKind::Completion,
            3 => ReplyKind::Intermediate,
            4 => ReplyKind::TransientNegative,
            5 => ReplyKind::PermanentNegative,
            _ => ReplyKind::None,
        }
    }

    /// 2xx and 3xx.
    pub fn is_positive(&self) -> bool {
        matches!(self.kind(), ReplyKind::Completion | ReplyKind::Intermediate)
    }

    /// 4xx and 5xx.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self.kind(),
            ReplyKind::TransientNegative | ReplyKind::PermanentNegative
        )
    }

    pub fn description(&self) -> Option<&'static str> {
        StatusCode::from_code(self.code).and_then(|status| status.get_message())
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = self.text.trim_end();
        if !text.is_empty() {
            write!(f, "{}", text)
        } else if let Some(description) = self.description() {
            write!(f, "{} {}", self.code, description)
        } else {
            write!(f, "{}", self.code)
        }
    }
}

/// Decodes the three leading ASCII digits of a reply. Anything shorter or
/// non-numeric yields 0.
pub fn parse_status_code(buf: &[u8]) -> u32 {
    match buf {
        [b0, b1, b2, ..] if b0.is_ascii_digit() && b1.is_ascii_digit() && b2.is_ascii_digit() => {
            (b0 - b'0') as u32 * 100 + (b1 - b'0') as u32 * 10 + (b2 - b'0') as u32
        }
        _ => 0,
    }
}

/// A status line is `DDD text` (final) or `DDD-text` (continued).
pub fn status_line_code(line: &str) -> Option<(u32, bool)> {
    let bytes = line.as_bytes();
    let code = parse_status_code(bytes);
    if code == 0 {
        return None;
    }
    match bytes.get(3) {
        Some(b' ') | None => Some((code, true)),
        Some(b'-') => Some((code, false)),
        _ => None,
    }
}

#[allow(dead_code)]
#[derive(EnumMessage, EnumIter, Debug, Clone, Copy, PartialEq)]
pub enum StatusCode {
    #[strum(message = "Restart marker reply")]
    RestartMarker,
    #[strum(message = "Service ready in a few minutes")]
    ServiceReadyLater,
    #[strum(message = "Data connection already open; transfer starting")]
    DataConnectionAlreadyOpen,
    #[strum(message = "Opening data connection")]
    OpeningDataConnection,

    #[strum(message = "Command okay")]
    CommandOk,
    #[strum(message = "Command not implemented, superfluous at this site")]
    CommandNotImplemented,
    #[strum(message = "System status, or system help reply")]
    SystemStatus,
    #[strum(message = "Directory status")]
    DirectoryStatus,
    #[strum(message = "File status")]
    FileStatus,
    #[strum(message = "Help message")]
    HelpMessage,
    #[strum(message = "System type")]
    SystemType,
    #[strum(message = "Service ready for new user")]
    ServiceReady,
    #[strum(message = "Service closing control connection")]
    ServiceClosing,
    #[strum(message = "Data connection open; no transfer in progress")]
    DataConnectionOpen,
    #[strum(message = "Closing data connection. Requested file action successful")]
    ClosingDataConnection,
    #[strum(message = "Entering passive mode")]
    EnteringPassiveMode,
    #[strum(message = "User logged in, proceed")]
    UserLoggedIn,
    #[strum(message = "Requested file action okay, completed")]
    FileActionOk,
    #[strum(message = "Pathname created")]
    PathnameCreated,

    #[strum(message = "User name okay, need password")]
    UsernameOk,
    #[strum(message = "Need account for login")]
    NeedAccount,
    #[strum(message = "Requested file action pending further information")]
    PendingFurtherInformation,

    #[strum(message = "Service not available, closing control connection")]
    ServiceNotAvailable,
    #[strum(message = "Can't open data connection")]
    CantOpenDataConnection,
    #[strum(message = "Connection closed; transfer aborted")]
    ConnectionClosed,
    #[strum(message = "Requested file action not taken. File unavailable")]
    FileActionNotTaken,
    #[strum(message = "Requested action aborted: local error in processing")]
    LocalProcessingError,
    #[strum(message = "Requested action not taken. Insufficient storage space in system")]
    InsufficientStorageSpace,

    #[strum(message = "Syntax error, command unrecognized")]
    SyntaxError,
    #[strum(message = "Syntax error in parameters or arguments")]
    SyntaxErrorArg,
    #[strum(message = "Command not implemented")]
    NotImplemented,
    #[strum(message = "Bad sequence of commands")]
    BadCommandSequence,
    #[strum(message = "Command not implemented for that parameter")]
    BadParameter,
    #[strum(message = "Not logged in")]
    NotLoggedIn,
    #[strum(message = "Need account for storing files")]
    NeedAccountForStoring,
    #[strum(message = "Requested action not taken. File unavailable")]
    FileUnavailable,
    #[strum(message = "Requested action aborted: page type unknown")]
    PageTypeUnknown,
    #[strum(message = "Requested file action aborted. Exceeded storage allocation")]
    ExceededStorageAllocation,
    #[strum(message = "Requested action not taken. File name not allowed")]
    FileNameNotAllowed,
}

impl StatusCode {
    pub fn status_code(&self) -> u32 {
        use StatusCode::*;
        match self {
            RestartMarker => 110,
            ServiceReadyLater => 120,
            DataConnectionAlreadyOpen => 125,
            OpeningDataConnection => 150,

            CommandOk => 200,
            CommandNotImplemented => 202,
            SystemStatus => 211,
            DirectoryStatus => 212,
            FileStatus => 213,
            HelpMessage => 214,
            SystemType => 215,
            ServiceReady => 220,
            ServiceClosing => 221,
            DataConnectionOpen => 225,
            ClosingDataConnection => 226,
            EnteringPassiveMode => 227,
            UserLoggedIn => 230,
            FileActionOk => 250,
            PathnameCreated => 257,

            UsernameOk => 331,
            NeedAccount => 332,
            PendingFurtherInformation => 350,

            ServiceNotAvailable => 421,
            CantOpenDataConnection => 425,
            ConnectionClosed => 426,
            FileActionNotTaken => 450,
            LocalProcessingError => 451,
            InsufficientStorageSpace => 452,

            SyntaxError => 500,
            SyntaxErrorArg => 501,
            NotImplemented => 502,
            BadCommandSequence => 503,
            BadParameter => 504,
            NotLoggedIn => 530,
            NeedAccountForStoring => 532,
            FileUnavailable => 550,
            PageTypeUnknown => 551,
            ExceededStorageAllocation => 552,
            FileNameNotAllowed => 553,
        }
    }

    pub fn from_code(code: u32) -> Option<StatusCode> {
        StatusCode::iter().find(|status| status.status_code() == code)
    }
}
