use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::reply::{status_line_code, Reply};

pub const FTP_DEFAULT_BUFLEN: usize = 1500;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("connection closed by the server")]
    ConnectionClosed,
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}

impl NetworkError {
    pub fn code(&self) -> i32 {
        match self {
            NetworkError::ConnectionClosed => -1,
            NetworkError::Socket(_) => -2,
        }
    }
}

/// Which halves of a request/reply exchange to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    SendAndReceive,
    /// Only write the request.
    SendOnly,
    /// Only collect a reply, e.g. the greeting banner.
    ReceiveOnly,
}

impl Exchange {
    fn sends(self) -> bool {
        self != Exchange::ReceiveOnly
    }

    fn receives(self) -> bool {
        self != Exchange::SendOnly
    }
}

/// Owns the control connection. Exchanges are strictly sequential: a request
/// is never written before the previous reply has been collected.
///
/// A data command whose exchange ends on a preliminary reply (or on silence)
/// still owes the final transfer status. Those owed replies are counted and
/// consumed before the reply to any later request.
pub struct ControlChannel {
    stream: TcpStream,
    poll_timeout: Duration,
    owed_completions: u32,
}

impl ControlChannel {
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        connect_timeout: Duration,
        poll_timeout: Duration,
    ) -> io::Result<ControlChannel> {
        let mut last_error = None;
        for (n, addr) in addr.to_socket_addrs()?.enumerate() {
            log::debug!("Trying to connect to entity #{} ({})", n, addr);
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    log::info!("Connected to {}", addr);
                    return Ok(ControlChannel::new(stream, poll_timeout));
                }
                Err(err) => {
                    log::debug!("Could not connect to {}: {}", addr, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(ErrorKind::AddrNotAvailable, "server name resolved to no address")
        }))
    }

    pub fn new(stream: TcpStream, poll_timeout: Duration) -> ControlChannel {
        ControlChannel {
            stream,
            poll_timeout: poll_timeout.max(Duration::from_millis(1)),
            owed_completions: 0,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Marks that the server still owes a final reply (`226`, `250`, `425`,
    /// `426`, `451`...) for a transfer it has already answered with `1xx` or
    /// not at all. The next final line that arrives is taken as that reply.
    pub fn expect_completion(&mut self) {
        self.owed_completions += 1;
        log::debug!("{} transfer completion(s) owed", self.owed_completions);
    }

    pub fn owed_completions(&self) -> u32 {
        self.owed_completions
    }

    /// Sends a CRLF terminated request and collects the reply into
    /// `Reply::text`.
    ///
    /// Returns `Reply::none()` when the socket does not become writable within
    /// the poll timeout. When the reply stops arriving before it is complete,
    /// the last status code seen so far is returned.
    pub fn send_and_await_reply(
        &mut self,
        command: &str,
        exchange: Exchange,
    ) -> Result<Reply, NetworkError> {
        self.exchange(command, exchange, None)
    }

    /// Like `send_and_await_reply`, but streams the raw reply bytes into
    /// `sink` instead of buffering them. `Reply::text` then only holds the
    /// last status line.
    pub fn send_and_await_reply_to(
        &mut self,
        command: &str,
        exchange: Exchange,
        sink: &mut dyn Write,
    ) -> Result<Reply, NetworkError> {
        self.exchange(command, exchange, Some(sink))
    }

    fn exchange(
        &mut self,
        command: &str,
        exchange: Exchange,
        sink: Option<&mut dyn Write>,
    ) -> Result<Reply, NetworkError> {
        if exchange.sends() {
            self.drain_pending()?;
            if !self.send(command)? {
                return Ok(Reply::none());
            }
        }
        if !exchange.receives() {
            return Ok(Reply::none());
        }
        self.receive(sink)
    }

    fn send(&mut self, command: &str) -> Result<bool, NetworkError> {
        log::debug!("----> {}", loggable(command));
        self.stream.set_write_timeout(Some(self.poll_timeout))?;
        match self.stream.write_all(command.as_bytes()) {
            Ok(()) => Ok(true),
            Err(err) if is_timeout(&err) => {
                log::warn!(
                    "Control connection was not writable within {:?}",
                    self.poll_timeout
                );
                Ok(false)
            }
            Err(err) => Err(NetworkError::Socket(err)),
        }
    }

    fn receive(&mut self, mut sink: Option<&mut dyn Write>) -> Result<Reply, NetworkError> {
        self.stream.set_read_timeout(Some(self.poll_timeout))?;
        let mut tracker = ReplyTracker::new(sink.is_none(), self.owed_completions);
        let mut buf = [0u8; FTP_DEFAULT_BUFLEN];
        loop {
            let n = match self.stream.read(&mut buf) {
                Ok(0) => {
                    log::warn!("Control connection closed by the server");
                    return Err(NetworkError::ConnectionClosed);
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => break,
                Err(err) => return Err(NetworkError::Socket(err)),
            };
            tracker.feed(&buf[..n]);
            self.owed_completions = tracker.owed;
            if let Some(sink) = sink.as_mut() {
                if let Err(err) = sink.write_all(&buf[..n]) {
                    log::warn!("Reply sink rejected {} bytes: {}", n, err);
                }
            }
            if tracker.is_complete() {
                break;
            }
        }
        Ok(tracker.finish())
    }

    /// Consumes replies that arrived after an earlier exchange gave up
    /// waiting, e.g. `226` for a background transfer.
    fn drain_pending(&mut self) -> Result<(), NetworkError> {
        self.stream.set_nonblocking(true)?;
        let mut tracker = ReplyTracker::new(false, self.owed_completions);
        let mut buf = [0u8; FTP_DEFAULT_BUFLEN];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Err(NetworkError::ConnectionClosed),
                Ok(n) => {
                    tracker.feed(&buf[..n]);
                    self.owed_completions = tracker.owed;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(NetworkError::Socket(err)),
            }
        };
        self.stream.set_nonblocking(false)?;
        let late = tracker.finish();
        if late.code != 0 {
            log::info!("Late reply: {}", late);
        }
        result
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn loggable(command: &str) -> &str {
    let command = command.trim_end();
    match command.get(..5) {
        Some(verb) if verb.eq_ignore_ascii_case("PASS ") => "PASS ****",
        _ => command,
    }
}

/// Splits incoming bytes into lines and follows the status codes they carry.
struct ReplyTracker {
    code: u32,
    // Code of a multi-line reply still waiting for its `DDD ` terminator.
    open: Option<u32>,
    complete: bool,
    // Final replies to earlier transfers that come before the awaited one.
    owed: u32,
    in_completion: bool,
    line: Vec<u8>,
    last_line: String,
    text: Option<String>,
}

impl ReplyTracker {
    fn new(collect_text: bool, owed: u32) -> ReplyTracker {
        ReplyTracker {
            code: 0,
            open: None,
            complete: false,
            owed,
            in_completion: false,
            line: Vec::new(),
            last_line: String::new(),
            text: collect_text.then(String::new),
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.line.push(byte);
            if byte == b'\n' {
                self.end_line();
            }
        }
    }

    fn end_line(&mut self) {
        let raw = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        let line = raw.trim_end().to_owned();
        log::debug!("<---- {}", line);
        if let Some((code, last)) = status_line_code(&line) {
            match self.open {
                Some(open) if open != code => {}
                _ if self.in_completion
                    || (self.owed > 0 && self.open.is_none() && code >= 200) =>
                {
                    // Whatever came before belongs to the finished transfer.
                    self.code = 0;
                    self.last_line.clear();
                    if let Some(text) = self.text.as_mut() {
                        text.clear();
                    }
                    self.open = if last { None } else { Some(code) };
                    self.in_completion = !last;
                    if last {
                        self.owed -= 1;
                        log::info!("Transfer finished: {}", line);
                    }
                    return;
                }
                _ => {
                    self.code = code;
                    self.open = if last { None } else { Some(code) };
                    self.complete = last && code >= 200;
                }
            }
        }
        if self.in_completion {
            return;
        }
        if let Some(text) = self.text.as_mut() {
            text.push_str(&raw);
        }
        self.last_line = line;
    }

    /// A final reply line has been seen. Preliminary `1xx` replies keep the
    /// exchange open.
    fn is_complete(&self) -> bool {
        self.complete && self.line.is_empty()
    }

    fn finish(mut self) -> Reply {
        if !self.line.is_empty() {
            self.end_line();
        }
        let text = self.text.take().unwrap_or(self.last_line);
        Reply::new(self.code, text)
    }
}
