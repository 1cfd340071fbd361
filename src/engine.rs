//! Engine actors: transports, the controller and its state tracker.
//!
//! An engine is an opaque GTP process. The only record of its board is the
//! list of board commands it has accepted, kept by [`EngineState`]. The
//! state is updated from accepted commands only, so it never claims more
//! than the engine acknowledged.
//!
//! Commands go out one at a time: [`EngineActor::send_command`] takes
//! `&mut self`, so a second command can't be issued before the first is
//! answered.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, warn};

use crate::board::{Color, Vertex};
use crate::constants::DEFAULT_BOARD_SIZE;
use crate::coord::decode_vertex;
use crate::error::TransportError;
use crate::gtp::{Command, ReplayEngine, Response};

/// One request/response exchange with an engine.
#[async_trait]
pub trait Transport: Send {
    async fn exchange(&mut self, line: &str) -> Result<Response, TransportError>;
}

#[async_trait]
impl Transport for ReplayEngine {
    async fn exchange(&mut self, line: &str) -> Result<Response, TransportError> {
        Ok(self.execute(line))
    }
}

/// A GTP engine running as a child process.
///
/// A command that times out leaves its answer unread, so the response
/// stream can't be trusted afterwards: the process is killed and every
/// later exchange fails with [`TransportError::Closed`].
pub struct ProcessTransport {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    timeout: Option<Duration>,
    poisoned: bool,
}

impl ProcessTransport {
    /// Spawn the engine with piped stdio.
    pub fn spawn(
        path: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut process = tokio::process::Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = process.stdin.take().ok_or(TransportError::Closed)?;
        let stdout = BufReader::new(process.stdout.take().ok_or(TransportError::Closed)?);

        Ok(Self {
            process,
            stdin,
            stdout,
            timeout,
            poisoned: false,
        })
    }

    async fn round_trip(&mut self, line: &str) -> Result<Response, TransportError> {
        self.stdin.write_all(format!("{line}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        let block = self.read_block().await?;
        Response::parse_block(&block)
    }

    /// Read one response: non-empty lines up to the closing empty line.
    async fn read_block(&mut self) -> Result<String, TransportError> {
        let mut block = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(TransportError::Closed);
            }
            let trimmed = line.trim_end();
            debug!(line = trimmed, "GTP >");
            if trimmed.is_empty() {
                if block.is_empty() {
                    continue;
                }
                return Ok(block);
            }
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(trimmed);
        }
    }

    /// Whether an earlier timeout left the response stream out of step.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Send `quit` and wait for the process to exit.
    pub async fn quit(&mut self) {
        if !self.poisoned {
            let _ = self.round_trip("quit").await;
        }
        let _ = self.process.wait().await;
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn exchange(&mut self, line: &str) -> Result<Response, TransportError> {
        if self.poisoned {
            return Err(TransportError::Closed);
        }
        let Some(limit) = self.timeout else {
            return self.round_trip(line).await;
        };
        match tokio::time::timeout(limit, self.round_trip(line)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(cmd = line, "engine timed out, closing it");
                self.poisoned = true;
                let _ = self.process.start_kill();
                Err(TransportError::Timeout(line.to_string()))
            }
        }
    }
}

/// What the engine is known to have accepted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineState {
    pub board_size: Option<usize>,
    pub komi: Option<f64>,
    /// Board commands since the board was last cleared
    pub history: Vec<Command>,
}

impl EngineState {
    /// Record an accepted command.
    pub fn observe(&mut self, command: &Command, response: &Response) {
        match command {
            Command::BoardSize(size) => {
                self.board_size = Some(*size);
                self.history.clear();
            }
            Command::ClearBoard => self.history.clear(),
            Command::Komi(komi) => self.komi = Some(*komi),
            Command::Play { .. } | Command::SetFreeHandicap(_) => {
                self.history.push(command.clone())
            }
            Command::Undo => {
                self.history.pop();
            }
            Command::GenMove(color) => {
                let size = self.board_size.unwrap_or(DEFAULT_BOARD_SIZE);
                if let Some(vertex) = parse_move(&response.content, size) {
                    self.history.push(Command::play(*color, vertex));
                }
            }
            _ => {}
        }
    }
}

/// Vertex from a `genmove` reply; `None` for resign or garbage.
fn parse_move(content: &str, size: usize) -> Option<Vertex> {
    let content = content.trim();
    if content.eq_ignore_ascii_case("resign") {
        return None;
    }
    decode_vertex(content, size, size).ok()
}

/// Commands that move an engine from `current` to `desired`.
///
/// Board size and komi are sent only when they differ. The history is
/// extended when the current one is a prefix of the desired one; otherwise
/// surplus moves are undone when allowed and cheaper, and the board is
/// cleared and replayed as a last resort.
pub fn state_commands(
    current: &EngineState,
    desired: &EngineState,
    can_undo: bool,
) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut history: &[Command] = &current.history;

    if let Some(size) = desired.board_size {
        if current.board_size != Some(size) {
            commands.push(Command::BoardSize(size));
            history = &[];
        }
    }
    if let Some(komi) = desired.komi {
        if current.komi != Some(komi) {
            commands.push(Command::Komi(komi));
        }
    }

    let common = history
        .iter()
        .zip(&desired.history)
        .take_while(|(a, b)| a == b)
        .count();
    let surplus = &history[common..];

    if surplus.is_empty() {
        commands.extend_from_slice(&desired.history[common..]);
    } else if can_undo
        && surplus.len() <= common
        && surplus.iter().all(|c| matches!(c, Command::Play { .. }))
    {
        commands.extend(std::iter::repeat_n(Command::Undo, surplus.len()));
        commands.extend_from_slice(&desired.history[common..]);
    } else {
        commands.push(Command::ClearBoard);
        commands.extend_from_slice(&desired.history);
    }
    commands
}

/// An engine reachable through serialized GTP commands.
#[async_trait]
pub trait EngineActor: Send {
    /// Send one command and wait for its answer. Rejections are errors.
    async fn send_command(&mut self, command: &Command) -> Result<Response, TransportError>;

    /// What the engine has accepted so far.
    fn state(&self) -> &EngineState;

    /// Whether the engine supports the named command.
    fn knows(&self, name: &str) -> bool;
}

/// [`EngineActor`] over any [`Transport`], tracking accepted commands.
pub struct EngineController<T> {
    transport: T,
    state: EngineState,
    commands: Vec<String>,
}

impl<T: Transport> EngineController<T> {
    /// Wrap a transport without asking for its command list.
    pub fn new(transport: T, commands: Vec<String>) -> Self {
        EngineController {
            transport,
            state: EngineState::default(),
            commands,
        }
    }

    /// Wrap a transport and learn its command list.
    pub async fn connect(transport: T) -> Result<Self, TransportError> {
        let mut controller = Self::new(transport, Vec::new());
        let list = controller.send_command(&Command::ListCommands).await?;
        controller.commands = list
            .content
            .lines()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        debug!(commands = controller.commands.len(), "engine connected");
        Ok(controller)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Ask the engine for a move.
    ///
    /// `None` means it resigned; a pass is [`PASS`](crate::constants::PASS).
    pub async fn genmove(&mut self, color: Color) -> Result<Option<Vertex>, TransportError> {
        let response = self.send_command(&Command::GenMove(color)).await?;
        let size = self.state.board_size.unwrap_or(DEFAULT_BOARD_SIZE);
        Ok(parse_move(&response.content, size))
    }
}

#[async_trait]
impl<T: Transport> EngineActor for EngineController<T> {
    async fn send_command(&mut self, command: &Command) -> Result<Response, TransportError> {
        let size = match command {
            Command::BoardSize(size) => *size,
            _ => self.state.board_size.unwrap_or(DEFAULT_BOARD_SIZE),
        };
        let line = command.encode(size);
        debug!(cmd = %line, "GTP <");

        let response = self.transport.exchange(&line).await?;
        if !response.success {
            return Err(TransportError::Rejected {
                command: line,
                message: response.content,
            });
        }
        self.state.observe(command, &response);
        Ok(response)
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn knows(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c == name)
    }
}
