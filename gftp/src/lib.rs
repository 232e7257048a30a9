mod auth;
mod command;
mod config;
mod control_channel;
mod data_repr;
mod data_transfer;
mod dispatcher;
mod hostport;
mod pool;
mod reply;
mod session;
pub mod thread;

pub use auth::{
    AuthError, AuthNegotiator, AuthPhase, Credentials, PromptCredentials, StaticCredentials,
    DEFAULT_AUTH_ATTEMPTS,
};
pub use command::{lookup, lookup_verb, ArgHint, RawCommand, RawCommandInfo, CRLF, RAW_COMMANDS};
pub use config::{ClientConfig, ListingOutput, FTP_CONTROL_PORT};
pub use control_channel::{ControlChannel, Exchange, NetworkError, FTP_DEFAULT_BUFLEN};
pub use data_repr::{DataFormat, DataStructure, DataType, TransferMode, TransferParams};
pub use data_transfer::{
    receive_into, DataCommand, Direction, TransferError, TransferProgress, TransferState,
    TransferTarget,
};
pub use dispatcher::{
    error_code, find_command, parse_line, CommandError, Flow, UiCommand, FTPUI_COMMAND_MAXPARAMS,
    UI_COMMANDS,
};
pub use hostport::{HostPort, ParseHostPortError};
pub use pool::{DataThreadPool, ResourceError, TransferReport, FTP_MAX_DATA_THREADS};
pub use reply::{Reply, ReplyKind, StatusCode};
pub use session::Session;
