use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{AuthError, AuthNegotiator, Credentials};
use crate::command::RawCommand;
use crate::config::{ClientConfig, ListingOutput};
use crate::control_channel::{ControlChannel, Exchange, NetworkError};
use crate::data_repr::TransferParams;
use crate::data_transfer::TransferError;
use crate::dispatcher::{self, Flow};
use crate::pool::{DataThreadPool, TransferReport};
use crate::reply::Reply;

use anyhow::Result;

/// One logged in (or logging in) connection to a server. Owned by the
/// control loop; worker threads only see the slot they were handed.
pub struct Session {
    control: ControlChannel,
    defaults: TransferParams,
    passive: bool,
    pool: DataThreadPool,
    connect_timeout: Duration,
    download_dir: PathBuf,
    listing_output: ListingOutput,
    auth_attempts: u32,
    output: Box<dyn Write + Send>,
}

impl Session {
    pub fn connect(config: &ClientConfig) -> io::Result<Session> {
        let control = ControlChannel::connect(
            (config.host.as_str(), config.port),
            config.connect_timeout,
            config.poll_timeout,
        )?;
        Ok(Session::new(control, config))
    }

    pub fn new(control: ControlChannel, config: &ClientConfig) -> Session {
        Session {
            control,
            defaults: config.transfer,
            passive: true,
            pool: DataThreadPool::new(config.max_data_threads),
            connect_timeout: config.connect_timeout,
            download_dir: config.download_dir.clone(),
            listing_output: config.listing_output.clone(),
            auth_attempts: config.auth_attempts,
            output: Box::new(io::stdout()),
        }
    }

    /// Redirects everything the session prints for the user.
    pub fn with_output<W: Write + Send + 'static>(mut self, output: W) -> Session {
        self.output = Box::new(output);
        self
    }

    pub fn authorize(&mut self, credentials: &mut dyn Credentials) -> Result<(), AuthError> {
        AuthNegotiator::new(self.auth_attempts).authorize(&mut self.control, credentials)
    }

    pub fn execute(&mut self, line: &str) -> Result<Flow> {
        dispatcher::execute(line, self)
    }

    /// Sends one request and fails unless the server accepted it.
    pub fn negotiate(&mut self, command: RawCommand, params: &[&str]) -> Result<Reply> {
        let reply = self
            .control
            .send_and_await_reply(&command.request(params), Exchange::SendAndReceive)?;
        if reply.is_refusal() {
            return Err(TransferError::Refused { command, reply }.into());
        }
        if reply.code == 0 {
            log::warn!("No reply to {}", command);
        }
        Ok(reply)
    }

    /// The last data command was answered with `1xx` or not at all, so its
    /// final status is still to come.
    pub fn expect_transfer_completion(&mut self) {
        self.control.expect_completion();
    }

    /// Sends a request and copies the reply to the user's output as it
    /// arrives.
    pub fn request_to_output(&mut self, request: &str) -> Result<Reply, NetworkError> {
        let reply = self.control.send_and_await_reply_to(
            request,
            Exchange::SendAndReceive,
            &mut self.output,
        )?;
        if let Err(err) = self.output.flush() {
            log::warn!("Could not flush output: {}", err);
        }
        Ok(reply)
    }

    pub fn defaults(&self) -> &TransferParams {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut TransferParams {
        &mut self.defaults
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn output(&mut self) -> &mut (dyn Write + Send) {
        self.output.as_mut()
    }

    pub fn pool_mut(&mut self) -> &mut DataThreadPool {
        &mut self.pool
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn listing_output(&self) -> &ListingOutput {
        &self.listing_output
    }

    pub fn transfers(&self) -> Vec<TransferReport> {
        self.pool.reports()
    }

    /// Sends `QUIT` and waits for every running transfer.
    pub fn close(mut self) -> Result<(), NetworkError> {
        let result = self
            .control
            .send_and_await_reply(&RawCommand::Quit.request(&[]), Exchange::SendAndReceive);
        match &result {
            Ok(reply) => log::info!("Session closed: {}", reply),
            Err(err) => log::warn!("QUIT failed: {}", err),
        }
        self.pool.join_all();
        result.map(|_| ())
    }
}
