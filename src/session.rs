use std::io::{self, Write};

use thiserror::Error as ThisError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{Client, ClientError};
use crate::command::Command;
use crate::render::Renderer;
use crate::response::Response;

pub const PROMPT: &str = "redcli> ";

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error(
        "Command '{command}' is not allowed in read-only mode. Use --writable flag to enable write commands."
    )]
    ReadOnly { command: String },
    #[error("Error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Exiting,
}

/// The read-eval-print loop: one line in, one reply rendered, until `exit`, EOF or shutdown.
pub struct Session<'a> {
    client: &'a Client,
    renderer: Renderer,
    writable: bool,
}

impl<'a> Session<'a> {
    pub fn new(client: &'a Client, renderer: Renderer) -> Session<'a> {
        Session {
            client,
            renderer,
            writable: client.config().writable,
        }
    }

    pub fn greet(&self, out: &mut impl Write) -> io::Result<()> {
        let config = self.client.config();
        writeln!(out, "Connected to Redis at {}", config.address())?;
        if !self.writable {
            writeln!(out, "Running in READ-ONLY mode")?;
        }
        writeln!(out, "Type 'exit' or 'quit' to exit")
    }

    /// Reads lines from `input` until the user exits, input ends or `shutdown` is cancelled.
    ///
    /// Shutdown also abandons a command still waiting for its reply. The connection is left
    /// mid-exchange, so the client must not be used for further commands afterwards.
    pub async fn run<R, O, E>(
        &self,
        mut input: R,
        out: &mut O,
        err: &mut E,
        shutdown: CancellationToken,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        O: Write,
        E: Write,
    {
        let mut buf = Vec::new();

        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            buf.clear();
            let read = tokio::select! {
                _ = shutdown.cancelled() => None,
                read = input.read_until(b'\n', &mut buf) => Some(read?),
            };

            let line = match read {
                None => return interrupted(out),
                Some(0) => {
                    debug!("Input closed");
                    writeln!(out)?;
                    return Ok(());
                }
                Some(_) => String::from_utf8_lossy(&buf),
            };

            let state = tokio::select! {
                _ = shutdown.cancelled() => None,
                state = self.handle_line(&line, out, err) => Some(state?),
            };

            match state {
                None => {
                    debug!("Interrupted while waiting for a reply");
                    return interrupted(out);
                }
                Some(State::Exiting) => return Ok(()),
                Some(State::Running) => {}
            }
        }
    }

    pub async fn handle_line(
        &self,
        line: &str,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> io::Result<State> {
        let input = line.trim();
        if input.is_empty() {
            return Ok(State::Running);
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            writeln!(out, "Exiting...")?;
            return Ok(State::Exiting);
        }

        let command = Command::parse(input);
        if command.is_empty() {
            return Ok(State::Running);
        }

        match self.dispatch(&command).await {
            Ok(response) => self.renderer.render(&response, out)?,
            Err(e) => self.renderer.error(err, format_args!("{}\n", e))?,
        }

        Ok(State::Running)
    }

    async fn dispatch(&self, command: &Command) -> Result<Response, SessionError> {
        if !self.writable && command.is_write() {
            return Err(SessionError::ReadOnly {
                command: command.name.clone(),
            });
        }

        Ok(self.client.execute(&command.name, &command.args).await?)
    }
}

fn interrupted(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nExiting...")?;
    out.flush()
}
