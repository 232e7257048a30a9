use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, ErrorKind, Write};

use crate::command::RawCommand;
use crate::control_channel::{ControlChannel, Exchange, NetworkError};
use crate::reply::{Reply, ReplyKind};

pub const DEFAULT_AUTH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Username,
    Password,
}

impl Display for AuthPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthPhase::Username => write!(f, "username"),
            AuthPhase::Password => write!(f, "password"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("server is not accepting logins: {0}")]
    ServiceUnavailable(String),
    #[error("maximum number of {phase} attempts ({attempts}) reached")]
    MaxAttemptsReached { phase: AuthPhase, attempts: u32 },
    #[error("could not read credentials: {0}")]
    Input(#[source] io::Error),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Source of login names and passwords, asked once per attempt.
pub trait Credentials {
    fn username(&mut self) -> io::Result<String>;
    fn password(&mut self) -> io::Result<String>;
}

pub struct StaticCredentials {
    pub username: String,
    pub password: String,
}

impl StaticCredentials {
    pub fn new(username: &str, password: &str) -> StaticCredentials {
        StaticCredentials {
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }
}

impl Credentials for StaticCredentials {
    fn username(&mut self) -> io::Result<String> {
        Ok(self.username.clone())
    }

    fn password(&mut self) -> io::Result<String> {
        Ok(self.password.clone())
    }
}

/// Prompts on `output` and reads answers line by line from `input`. Preset
/// values are offered on the first attempt only.
pub struct PromptCredentials<R, W> {
    input: R,
    output: W,
    username: Option<String>,
    password: Option<String>,
}

impl<R: BufRead, W: Write> PromptCredentials<R, W> {
    pub fn new(input: R, output: W) -> PromptCredentials<R, W> {
        PromptCredentials {
            input,
            output,
            username: None,
            password: None,
        }
    }

    pub fn with_preset(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    fn prompt(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_owned())
    }
}

impl<R: BufRead, W: Write> Credentials for PromptCredentials<R, W> {
    fn username(&mut self) -> io::Result<String> {
        match self.username.take() {
            Some(username) => Ok(username),
            None => self.prompt("Name"),
        }
    }

    fn password(&mut self) -> io::Result<String> {
        match self.password.take() {
            Some(password) => Ok(password),
            None => self.prompt("Password"),
        }
    }
}

/// Drives the USER/PASS login sequence. Each phase has its own attempt
/// budget.
pub struct AuthNegotiator {
    attempts: u32,
}

impl Default for AuthNegotiator {
    fn default() -> Self {
        AuthNegotiator::new(DEFAULT_AUTH_ATTEMPTS)
    }
}

impl AuthNegotiator {
    pub fn new(attempts: u32) -> AuthNegotiator {
        AuthNegotiator {
            attempts: attempts.max(1),
        }
    }

    pub fn authorize(
        &self,
        channel: &mut ControlChannel,
        credentials: &mut dyn Credentials,
    ) -> Result<(), AuthError> {
        let greeting = channel.send_and_await_reply("", Exchange::ReceiveOnly)?;
        if greeting.is_refusal() {
            return Err(AuthError::ServiceUnavailable(greeting.to_string()));
        }
        log::info!("Server greeting: {}", greeting);

        let (username, reply) = self.send_username(channel, credentials)?;
        if reply.kind() == ReplyKind::Completion {
            log::info!("Logged in as {} without a password", username);
            return Ok(());
        }
        self.send_password(channel, credentials, &username)?;
        log::info!("Logged in as {}", username);
        Ok(())
    }

    fn send_username(
        &self,
        channel: &mut ControlChannel,
        credentials: &mut dyn Credentials,
    ) -> Result<(String, Reply), AuthError> {
        for attempt in 1..=self.attempts {
            let username = credentials.username().map_err(AuthError::Input)?;
            let reply = channel.send_and_await_reply(
                &RawCommand::User.request(&[username.as_str()]),
                Exchange::SendAndReceive,
            )?;
            if reply.is_positive() {
                return Ok((username, reply));
            }
            log::warn!(
                "Username rejected (attempt {}/{}): {}",
                attempt,
                self.attempts,
                reply
            );
        }
        Err(AuthError::MaxAttemptsReached {
            phase: AuthPhase::Username,
            attempts: self.attempts,
        })
    }

    fn send_password(
        &self,
        channel: &mut ControlChannel,
        credentials: &mut dyn Credentials,
        username: &str,
    ) -> Result<(), AuthError> {
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                // A failed PASS resets the login sequence on the server.
                let reply = channel.send_and_await_reply(
                    &RawCommand::User.request(&[username]),
                    Exchange::SendAndReceive,
                )?;
                if reply.kind() == ReplyKind::Completion {
                    return Ok(());
                }
            }
            let password = credentials.password().map_err(AuthError::Input)?;
            let reply = channel.send_and_await_reply(
                &RawCommand::Pass.request(&[password.as_str()]),
                Exchange::SendAndReceive,
            )?;
            if reply.is_positive() {
                return Ok(());
            }
            log::warn!(
                "Password rejected (attempt {}/{}): {}",
                attempt,
                self.attempts,
                reply
            );
        }
        Err(AuthError::MaxAttemptsReached {
            phase: AuthPhase::Password,
            attempts: self.attempts,
        })
    }
}
