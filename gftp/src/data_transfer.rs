use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::command::RawCommand;
use crate::config::ListingOutput;
use crate::data_repr::TransferParams;
use crate::hostport::{HostPort, ParseHostPortError};
use crate::pool::SharedProgress;
use crate::reply::Reply;
use crate::thread::Mutex;
use crate::{CommandError, Session};

use anyhow::Result;

const DATA_BUFLEN: usize = 8192;

/// UI commands that need a data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCommand {
    Get,
    Send,
    Dir,
}

impl DataCommand {
    pub fn raw(self) -> RawCommand {
        match self {
            DataCommand::Get => RawCommand::Retr,
            DataCommand::Send => RawCommand::Stor,
            DataCommand::Dir => RawCommand::List,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataCommand::Get => "get",
            DataCommand::Send => "send",
            DataCommand::Dir => "dir",
        }
    }

    pub fn requires_file(self) -> bool {
        self != DataCommand::Dir
    }

    pub fn direction(self) -> Direction {
        match self {
            DataCommand::Send => Direction::Send,
            _ => Direction::Receive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TransferState {
    Negotiating,
    PassiveRequested,
    Connecting,
    Transferring,
    Closed,
}

impl Default for TransferState {
    fn default() -> Self {
        TransferState::Negotiating
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferProgress {
    pub state: TransferState,
    pub bytes: u64,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("server refused {command}: {reply}")]
    Refused { command: RawCommand, reply: Reply },
    #[error("malformed PASV reply: {0}")]
    MalformedPasv(#[from] ParseHostPortError),
    #[error("cannot open {target}: {source}")]
    Target {
        target: TransferTarget,
        #[source]
        source: io::Error,
    },
    #[error("could not connect to data endpoint {endpoint}: {source}")]
    Connect {
        endpoint: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("uploading files is not supported")]
    UploadUnsupported,
    #[error("data connection failed: {0}")]
    Io(#[from] io::Error),
}

/// Where received bytes end up.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferTarget {
    File(PathBuf),
    Stdout,
}

impl TransferTarget {
    fn open(&self) -> Result<Box<dyn Write + Send>, TransferError> {
        match self {
            TransferTarget::File(path) => {
                let file = File::create(path).map_err(|source| TransferError::Target {
                    target: self.clone(),
                    source,
                })?;
                Ok(Box::new(BufWriter::new(file)))
            }
            TransferTarget::Stdout => Ok(Box::new(io::stdout())),
        }
    }
}

impl Display for TransferTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferTarget::File(path) => write!(f, "{}", path.display()),
            TransferTarget::Stdout => write!(f, "standard output"),
        }
    }
}

/// Everything a worker needs for one transfer. Owned by the worker thread
/// once it is spawned.
pub struct DataTransferSlot {
    pub label: String,
    pub params: TransferParams,
    pub endpoint: HostPort,
    pub direction: Direction,
    pub target: TransferTarget,
    pub sink: Option<Box<dyn Write + Send>>,
    pub connect_timeout: Duration,
}

impl DataTransferSlot {
    pub fn run(mut self, progress: SharedProgress) {
        match self.transfer(&progress) {
            Ok(bytes) => log::info!("{}: received {} bytes into {}", self.label, bytes, self.target),
            Err(err) => {
                log::error!("{}: {}", self.label, err);
                if let Ok(mut progress) = progress.lock() {
                    progress.error = Some(err.to_string());
                }
            }
        }
        set_state(&progress, TransferState::Closed);
    }

    fn transfer(&mut self, progress: &SharedProgress) -> Result<u64, TransferError> {
        if self.direction == Direction::Send {
            // TODO: connect and stream the local file once STOR is supported.
            log::warn!("{}: upload skipped, data connection left unopened", self.label);
            return Err(TransferError::UploadUnsupported);
        }
        let endpoint = self.endpoint.socket_addr();
        set_state(progress, TransferState::Connecting);
        let mut stream = TcpStream::connect_timeout(&endpoint, self.connect_timeout)
            .map_err(|source| TransferError::Connect { endpoint, source })?;
        log::debug!("{}: data connection open to {} ({})", self.label, endpoint, self.params);
        set_state(progress, TransferState::Transferring);
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => self.target.open()?,
        };
        let mut sink = ProgressWriter {
            inner: sink,
            progress: progress.clone(),
        };
        let bytes = receive_into(&mut stream, &mut sink)?;
        sink.flush()?;
        Ok(bytes)
    }
}

fn set_state(progress: &SharedProgress, state: TransferState) {
    if let Ok(mut progress) = progress.lock() {
        progress.state = state;
    }
}

struct ProgressWriter<W> {
    inner: W,
    progress: SharedProgress,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Ok(mut progress) = self.progress.lock() {
            progress.bytes += n as u64;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copies everything `reader` yields into `sink` until the peer closes the
/// connection. Returns the number of bytes copied.
pub fn receive_into<R, W>(reader: &mut R, sink: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0;
    let mut buf = [0; DATA_BUFLEN];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        sink.write_all(&buf[0..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Negotiates a passive data connection for `command` and hands the transfer
/// to a worker thread. Returns as soon as the worker is running.
pub fn begin(command: DataCommand, params: &[&str], session: &mut Session) -> Result<()> {
    let file = params.first().copied();
    if command.requires_file() && file.is_none() {
        return Err(CommandError::MissingParam(command.name()).into());
    }

    let transfer_params = *session.defaults();
    log::debug!("{} {}: {}", command.name(), TransferState::Negotiating, transfer_params);
    if let Some(data_type) = transfer_params.data_type {
        session.negotiate(RawCommand::Type, &[data_type.argument().as_str()])?;
    }
    if let Some(mode) = transfer_params.transfer_mode {
        session.negotiate(RawCommand::Mode, &[mode.to_string().as_str()])?;
    }
    if let Some(structure) = transfer_params.data_structure {
        session.negotiate(RawCommand::Stru, &[structure.to_string().as_str()])?;
    }

    log::debug!("{} {}", command.name(), TransferState::PassiveRequested);
    let reply = session.negotiate(RawCommand::Pasv, &[])?;
    let endpoint = HostPort::from_pasv_reply(&reply.text).map_err(TransferError::from)?;
    log::debug!("Passive endpoint {}:{}", endpoint.host(), endpoint.port);

    let target = target_for(command, file, session)?;
    let reply = session.negotiate(command.raw(), params)?;
    if reply.code < 200 {
        session.expect_transfer_completion();
    }

    let index = session.pool_mut().acquire()?;
    let sink = match command.direction() {
        Direction::Receive => Some(target.open()?),
        Direction::Send => None,
    };
    let label = match file {
        Some(file) => format!("{} {}", command.raw(), file),
        None => command.raw().to_string(),
    };
    let slot = DataTransferSlot {
        label: label.clone(),
        params: transfer_params,
        endpoint,
        direction: command.direction(),
        target,
        sink,
        connect_timeout: session.connect_timeout(),
    };
    let progress: SharedProgress = Arc::new(Mutex::default());
    let worker_progress = progress.clone();
    session
        .pool_mut()
        .start(index, &label, progress, move || slot.run(worker_progress))?;
    writeln!(session.output(), "Transfer {} started in slot {}", label, index)?;
    Ok(())
}

fn target_for(command: DataCommand, file: Option<&str>, session: &Session) -> Result<TransferTarget> {
    match (command, file) {
        (DataCommand::Dir, _) => Ok(match session.listing_output() {
            ListingOutput::Stdout => TransferTarget::Stdout,
            ListingOutput::File(path) => TransferTarget::File(path.clone()),
        }),
        (DataCommand::Get, Some(file)) => {
            let name = Path::new(file)
                .file_name()
                .ok_or_else(|| CommandError::BadParam(file.to_owned()))?;
            Ok(TransferTarget::File(session.download_dir().join(name)))
        }
        (DataCommand::Send, Some(file)) => Ok(TransferTarget::File(PathBuf::from(file))),
        (_, None) => Err(CommandError::MissingParam(command.name()).into()),
    }
}
