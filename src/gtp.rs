//! Go Text Protocol (GTP) commands, responses and a reference engine.
//!
//! GTP is a text-based protocol for communicating with Go-playing programs.
//! Every command is one line; every response starts with `=` (success) or
//! `?` (failure), optionally followed by the command id, and ends with an
//! empty line.
//!
//! [`ReplayEngine`] is a small GTP engine that only keeps a board. It serves
//! GTP over any reader/writer pair (`goban-sync gtp`) and doubles as an
//! in-process transport for the synchronizer.
//!
//! ## Supported Commands
//!
//! - `name`, `version`, `protocol_version`, `list_commands`, `known_command`, `quit`
//! - `boardsize <size>`, `clear_board`, `komi <value>`
//! - `play <color> <vertex>`, `set_free_handicap <vertex>...`, `undo`
//! - `genmove <color>` - plays the first legal empty vertex, else passes

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::board::{Color, Vertex};
use crate::constants::{MAX_BOARD_SIZE, PASS};
use crate::coord::{decode_vertex, encode_vertex};
use crate::error::TransportError;
use crate::position::{MoveOptions, Position};

/// A GTP command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BoardSize(usize),
    ClearBoard,
    Komi(f64),
    Play { color: Color, vertex: Vertex },
    SetFreeHandicap(Vec<Vertex>),
    Undo,
    GenMove(Color),
    ListCommands,
    KnownCommand(String),
    Name,
    Version,
    ProtocolVersion,
    Quit,
}

impl Command {
    pub fn play(color: Color, vertex: Vertex) -> Self {
        Command::Play { color, vertex }
    }

    /// The GTP command name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::BoardSize(_) => "boardsize",
            Command::ClearBoard => "clear_board",
            Command::Komi(_) => "komi",
            Command::Play { .. } => "play",
            Command::SetFreeHandicap(_) => "set_free_handicap",
            Command::Undo => "undo",
            Command::GenMove(_) => "genmove",
            Command::ListCommands => "list_commands",
            Command::KnownCommand(_) => "known_command",
            Command::Name => "name",
            Command::Version => "version",
            Command::ProtocolVersion => "protocol_version",
            Command::Quit => "quit",
        }
    }

    /// Render the command line for a `size x size` board.
    pub fn encode(&self, size: usize) -> String {
        let coord = |v: Vertex| encode_vertex(v, size, size).unwrap_or_else(|| "pass".into());
        match self {
            Command::BoardSize(n) => format!("boardsize {n}"),
            Command::Komi(k) => format!("komi {k}"),
            Command::Play { color, vertex } => format!("play {color} {}", coord(*vertex)),
            Command::SetFreeHandicap(vertices) => {
                let coords: Vec<String> = vertices.iter().map(|&v| coord(v)).collect();
                format!("set_free_handicap {}", coords.join(" "))
            }
            Command::GenMove(color) => format!("genmove {color}"),
            Command::KnownCommand(name) => format!("known_command {name}"),
            other => other.name().to_string(),
        }
    }

    /// Parse a command line (without id) for a `size x size` board.
    pub fn decode(line: &str, size: usize) -> Result<Self, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = parts.split_first() else {
            return Err("empty command".into());
        };
        let arg = |i: usize| args.get(i).copied().ok_or("missing argument");
        let color = |i: usize| -> Result<Color, String> {
            Color::parse(arg(i)?).ok_or_else(|| "invalid color".to_string())
        };
        let vertex = |s: &str| decode_vertex(s, size, size).map_err(|e| e.to_string());

        let cmd = match command.to_lowercase().as_str() {
            "boardsize" => Command::BoardSize(arg(0)?.parse().map_err(|_| "invalid size")?),
            "clear_board" => Command::ClearBoard,
            "komi" => Command::Komi(arg(0)?.parse().map_err(|_| "invalid komi")?),
            "play" => Command::Play {
                color: color(0)?,
                vertex: vertex(arg(1)?)?,
            },
            "set_free_handicap" => {
                if args.is_empty() {
                    return Err("missing argument".into());
                }
                let vertices = args.iter().map(|s| vertex(*s)).collect::<Result<_, _>>()?;
                Command::SetFreeHandicap(vertices)
            }
            "undo" => Command::Undo,
            "genmove" => Command::GenMove(color(0)?),
            "list_commands" => Command::ListCommands,
            "known_command" => Command::KnownCommand(arg(0)?.to_lowercase()),
            "name" => Command::Name,
            "version" => Command::Version,
            "protocol_version" => Command::ProtocolVersion,
            "quit" => Command::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(cmd)
    }
}

/// A parsed GTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    pub content: String,
}

impl Response {
    pub fn ok(content: impl Into<String>) -> Self {
        Response {
            success: true,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Response {
            success: false,
            content: content.into(),
        }
    }

    /// Parse a response block (`=id payload` or `?id message`, possibly multi-line).
    pub fn parse_block(block: &str) -> Result<Self, TransportError> {
        let block = block.trim();
        let success = match block.chars().next() {
            Some('=') => true,
            Some('?') => false,
            _ => return Err(TransportError::Malformed(block.to_string())),
        };
        let content = block[1..]
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim()
            .to_string();
        Ok(Response { success, content })
    }

    /// The wire form, terminated by an empty line.
    pub fn to_block(&self, id: Option<u32>) -> String {
        let prefix = if self.success { '=' } else { '?' };
        let id_str = id.map(|i| i.to_string()).unwrap_or_default();
        format!("{prefix}{id_str} {}\n\n", self.content)
    }
}

/// The list of known GTP commands.
pub const KNOWN_COMMANDS: &[&str] = &[
    "boardsize",
    "clear_board",
    "genmove",
    "known_command",
    "komi",
    "list_commands",
    "name",
    "play",
    "protocol_version",
    "quit",
    "set_free_handicap",
    "undo",
    "version",
];

/// GTP engine that only tracks a board.
pub struct ReplayEngine {
    /// Current board
    pos: Position,
    /// Boards before each accepted move, for `undo`
    undo_stack: Vec<Position>,
    komi: f64,
    max_size: usize,
    /// Commands this engine answers to
    commands: Vec<&'static str>,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayEngine {
    pub fn new() -> Self {
        ReplayEngine {
            pos: Position::square(crate::constants::DEFAULT_BOARD_SIZE),
            undo_stack: Vec::new(),
            komi: 0.0,
            max_size: MAX_BOARD_SIZE,
            commands: KNOWN_COMMANDS.to_vec(),
        }
    }

    /// Reject `boardsize` above `max_size`.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Pretend not to know `name`.
    pub fn without_command(mut self, name: &str) -> Self {
        self.commands.retain(|c| *c != name);
        self
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    fn knows(&self, name: &str) -> bool {
        self.commands.iter().any(|c| *c == name)
    }

    pub fn komi(&self) -> f64 {
        self.komi
    }

    /// Run the GTP command loop until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;

            // Skip empty lines and comments
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, command_line) = Self::parse_id(line);
            let response = self.execute(command_line);
            output.write_all(response.to_block(id).as_bytes())?;
            output.flush()?;

            if command_line.split_whitespace().next() == Some("quit") {
                break;
            }
        }
        Ok(())
    }

    /// Parse an optional numeric command ID from the beginning of the line.
    fn parse_id(line: &str) -> (Option<u32>, &str) {
        let trimmed = line.trim();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        if end > 0 {
            if let Ok(id) = trimmed[..end].parse::<u32>() {
                return (Some(id), trimmed[end..].trim());
            }
        }
        (None, trimmed)
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str) -> Response {
        let name = line.split_whitespace().next().unwrap_or("").to_lowercase();
        if !self.knows(&name) {
            return Response::error(format!("unknown command: {name}"));
        }
        match Command::decode(line, self.pos.width()) {
            Ok(command) => self.apply(&command),
            Err(message) => Response::error(message),
        }
    }

    fn apply(&mut self, command: &Command) -> Response {
        match command {
            Command::Name => Response::ok(env!("CARGO_PKG_NAME")),
            Command::Version => Response::ok(env!("CARGO_PKG_VERSION")),
            Command::ProtocolVersion => Response::ok("2"),
            Command::ListCommands => Response::ok(self.commands.join("\n")),
            Command::KnownCommand(name) => {
                let known = self.knows(name);
                Response::ok(if known { "true" } else { "false" })
            }
            Command::Quit => Response::ok(""),

            Command::BoardSize(size) => {
                if *size < 2 || *size > self.max_size {
                    return Response::error("unacceptable size");
                }
                self.pos = Position::square(*size);
                self.undo_stack.clear();
                Response::ok("")
            }
            Command::ClearBoard => {
                self.pos = Position::square(self.pos.width());
                self.undo_stack.clear();
                Response::ok("")
            }
            Command::Komi(komi) => {
                self.komi = *komi;
                Response::ok("")
            }

            Command::Play { color, vertex } => self.play(*color, *vertex),
            Command::SetFreeHandicap(vertices) => {
                if !self.pos.is_empty() {
                    return Response::error("board not empty");
                }
                if vertices.len() < 2 || vertices.iter().any(|&v| !self.pos.has(v)) {
                    return Response::error("bad vertex list");
                }
                self.undo_stack.push(self.pos.clone());
                for &v in vertices {
                    self.pos.set(v, Color::Black.sign());
                }
                Response::ok("")
            }
            Command::Undo => match self.undo_stack.pop() {
                Some(prev) => {
                    self.pos = prev;
                    Response::ok("")
                }
                None => Response::error("cannot undo"),
            },

            Command::GenMove(color) => {
                let vertex = self.pick_move(*color);
                let size = self.pos.width();
                self.play(*color, vertex);
                Response::ok(encode_vertex(vertex, size, size).unwrap_or_else(|| "pass".into()))
            }
        }
    }

    fn play(&mut self, color: Color, vertex: Vertex) -> Response {
        if vertex == PASS {
            self.undo_stack.push(self.pos.clone());
            return Response::ok("");
        }
        let strict = MoveOptions {
            prevent_overwrite: true,
            prevent_suicide: true,
        };
        match self.pos.try_move(color.sign(), vertex, strict) {
            Ok(next) => {
                debug!(%color, ?vertex, "replay engine move");
                self.undo_stack.push(std::mem::replace(&mut self.pos, next));
                Response::ok("")
            }
            Err(e) => Response::error(format!("illegal move ({e})")),
        }
    }

    /// First empty vertex in scan order that is legal and doesn't retake a ko.
    fn pick_move(&self, color: Color) -> Vertex {
        let strict = MoveOptions {
            prevent_overwrite: true,
            prevent_suicide: true,
        };
        let size = self.pos.width() as i32;
        for y in 0..size {
            for x in 0..size {
                let Ok(next) = self.pos.try_move(color.sign(), (x, y), strict) else {
                    continue;
                };
                let repeats = self
                    .undo_stack
                    .last()
                    .is_some_and(|prev| prev.same_stones(&next));
                if !repeats {
                    return (x, y);
                }
            }
        }
        PASS
    }
}
