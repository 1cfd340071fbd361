//! Engine synchronization.
//!
//! A GTP engine can't be asked what its board looks like. The synchronizer
//! only knows the commands the engine accepted (its [`EngineState`]) and
//! has to bring that board in line with a target position. It tries three
//! strategies in order, each producing a [`SyncPlan`] that is replayed
//! locally first:
//!
//! 1. **Clean replay** of the target's ancestry, node by node.
//! 2. **Incremental rearrangement**: the engine's own history plus one
//!    `play` per stone the target has and the engine's board lacks.
//!    Removals are not handled; such targets fall through to tier 3.
//! 3. **Full rearrangement**: one `play` per stone, column by column.
//!
//! A plan is committed only if its replay has exactly the target's stones.
//! A plan the engine rejects while being committed escalates to the next
//! strategy. Each strategy runs at most once per call.

use std::fmt;

use tracing::{debug, info, warn};

use crate::board::{Color, Sign, Vertex};
use crate::config::SyncOptions;
use crate::constants::{MAX_BOARD_SIZE, PASS};
use crate::coord::decode_vertex;
use crate::engine::{EngineActor, EngineState, state_commands};
use crate::error::{PreconditionError, SyncError, TransportError};
use crate::gtp::Command;
use crate::position::Position;
use crate::record::{NodeData, NodeId, PositionProvider, setup_vertices};

/// A position to synchronize to, with the record path that leads there.
#[derive(Clone, Debug)]
pub struct SyncTarget {
    pub position: Position,
    pub komi: f64,
    /// Data and resulting position of every node from the root down
    pub nodes: Vec<(NodeData, Position)>,
}

impl SyncTarget {
    /// Collect the target for `node` from a provider.
    pub fn resolve<P: PositionProvider + ?Sized>(provider: &P, node: NodeId) -> Option<Self> {
        let position = provider.resolve(node)?;
        let nodes = provider
            .ancestry(node)
            .into_iter()
            .map(|id| Some((provider.data(id)?.clone(), provider.resolve(id)?)))
            .collect::<Option<Vec<_>>>()?;
        Some(SyncTarget {
            position,
            komi: provider.komi(),
            nodes,
        })
    }

    /// A target with no record behind it. Only the rearrangement strategies apply.
    pub fn from_position(position: Position, komi: f64) -> Self {
        SyncTarget {
            position,
            komi,
            nodes: Vec::new(),
        }
    }

    fn size(&self) -> usize {
        self.position.width()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    CleanReplay,
    IncrementalRearrangement,
    FullRearrangement,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::CleanReplay,
        Strategy::IncrementalRearrangement,
        Strategy::FullRearrangement,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CleanReplay => write!(f, "clean replay"),
            Strategy::IncrementalRearrangement => write!(f, "incremental rearrangement"),
            Strategy::FullRearrangement => write!(f, "full rearrangement"),
        }
    }
}

/// Candidate engine history and the board it produces.
#[derive(Clone, Debug)]
pub struct SyncPlan {
    pub history: Vec<Command>,
    pub board: Position,
}

impl SyncPlan {
    fn empty(size: usize) -> Self {
        SyncPlan {
            history: Vec::new(),
            board: Position::square(size),
        }
    }

    fn play(&mut self, sign: Sign, vertex: Vertex) {
        if let Some(color) = Color::from_sign(sign) {
            self.history.push(Command::play(color, vertex));
            self.board = self.board.make_move(sign, vertex);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub strategy: Strategy,
    /// Commands sent to the engine while committing
    pub commands_sent: usize,
}

/// Reject boards GTP can't express.
pub fn check_preconditions(position: &Position) -> Result<(), PreconditionError> {
    if !position.is_square() {
        return Err(PreconditionError::NotSquare {
            width: position.width(),
            height: position.height(),
        });
    }
    if position.width() > MAX_BOARD_SIZE {
        return Err(PreconditionError::Oversized {
            size: position.width(),
            max: MAX_BOARD_SIZE,
        });
    }
    if !position.is_valid() {
        return Err(PreconditionError::InvalidBoard);
    }
    Ok(())
}

/// Board an engine ends up with after `history`, starting from empty.
pub fn replay(history: &[Command], size: usize) -> Position {
    let mut board = Position::square(size);
    let mut previous = Vec::new();
    for command in history {
        match command {
            Command::Play { color, vertex } => {
                previous.push(board.clone());
                board = board.make_move(color.sign(), *vertex);
            }
            Command::SetFreeHandicap(vertices) => {
                previous.push(board.clone());
                for &v in vertices {
                    board.set(v, Color::Black.sign());
                }
            }
            Command::Undo => {
                if let Some(prev) = previous.pop() {
                    board = prev;
                }
            }
            Command::ClearBoard => {
                board = Position::square(size);
                previous.clear();
            }
            Command::BoardSize(n) => {
                board = Position::square(*n);
                previous.clear();
            }
            _ => {}
        }
    }
    board
}

/// Tier 1: translate the target's ancestry into commands.
///
/// `None` as soon as the replayed board disagrees with a node's position.
pub fn clean_replay(target: &SyncTarget, free_handicap: bool) -> Option<SyncPlan> {
    let size = target.size();
    let mut plan = SyncPlan::empty(size);

    for (data, node_position) in &target.nodes {
        let add_black = setup_vertices(&data.add_black, size, size);
        let placed_handicap = free_handicap && add_black.len() >= 2 && plan.board.is_empty();
        if placed_handicap {
            for &v in &add_black {
                plan.board.set(v, Color::Black.sign());
            }
            plan.history.push(Command::SetFreeHandicap(add_black.clone()));
        }

        let add_white = setup_vertices(&data.add_white, size, size);
        let setups = [
            (Color::Black, if placed_handicap { &[][..] } else { &add_black[..] }),
            (Color::White, &add_white[..]),
        ];
        for (color, vertices) in setups {
            for &v in vertices {
                if plan.board.get(v) == color.sign() {
                    continue;
                }
                plan.play(color.sign(), v);
            }
        }

        if let Some((color, coord)) = data.mv() {
            match decode_vertex(coord, size, size) {
                Ok(PASS) => plan.history.push(Command::play(color, PASS)),
                Ok(v) => plan.play(color.sign(), v),
                Err(_) => return None,
            }
        }

        if !plan.board.same_stones(node_position) {
            debug!(commands = plan.history.len(), "clean replay diverged from record");
            return None;
        }
    }
    Some(plan)
}

/// Tier 2: extend the engine's own history with the stones it is missing.
///
/// `None` when the engine's board has a different size.
pub fn incremental_rearrangement(target: &SyncTarget, state: &EngineState) -> Option<SyncPlan> {
    let size = target.size();
    if state.board_size != Some(size) {
        return None;
    }
    let mut plan = SyncPlan {
        history: state.history.clone(),
        board: replay(&state.history, size),
    };
    let missing: Vec<Vertex> = plan
        .board
        .diff(&target.position)?
        .into_iter()
        .filter(|&v| target.position.get(v) != 0)
        .collect();
    for v in missing {
        plan.play(target.position.get(v), v);
    }
    Some(plan)
}

/// Tier 3: place every stone of the target, column by column.
pub fn full_rearrangement(target: &SyncTarget) -> SyncPlan {
    let size = target.size();
    let mut plan = SyncPlan::empty(size);
    for x in 0..size as i32 {
        for y in 0..size as i32 {
            let sign = target.position.get((x, y));
            if sign != 0 {
                plan.play(sign, (x, y));
            }
        }
    }
    plan
}

/// Brings engines in line with target positions.
#[derive(Clone, Debug, Default)]
pub struct Synchronizer {
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        Synchronizer { options }
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Candidate plan for one strategy, or `None` if the strategy doesn't apply.
    pub fn plan<A: EngineActor + ?Sized>(
        &self,
        strategy: Strategy,
        actor: &A,
        target: &SyncTarget,
    ) -> Option<SyncPlan> {
        match strategy {
            Strategy::CleanReplay => {
                let free_handicap =
                    self.options.use_free_handicap && actor.knows("set_free_handicap");
                clean_replay(target, free_handicap)
            }
            Strategy::IncrementalRearrangement => {
                incremental_rearrangement(target, actor.state())
            }
            Strategy::FullRearrangement => Some(full_rearrangement(target)),
        }
    }

    /// Synchronize `actor` to `target`.
    pub async fn sync<A: EngineActor + ?Sized>(
        &self,
        actor: &mut A,
        target: &SyncTarget,
    ) -> Result<SyncOutcome, SyncError> {
        check_preconditions(&target.position)?;

        let mut last_error = None;
        for strategy in Strategy::ALL {
            let plan = self
                .plan(strategy, actor, target)
                .filter(|plan| plan.board.same_stones(&target.position));
            let Some(plan) = plan else {
                debug!(%strategy, "plan does not reproduce target");
                continue;
            };

            match self.commit(actor, target, plan.history).await {
                Ok(commands_sent) => {
                    info!(%strategy, commands_sent, "engine synchronized");
                    return Ok(SyncOutcome {
                        strategy,
                        commands_sent,
                    });
                }
                Err(e) => {
                    warn!(%strategy, error = %e, "engine refused plan, escalating");
                    last_error = Some(e);
                }
            }
        }
        Err(SyncError::Exhausted { last: last_error })
    }

    /// Send the commands that make the engine adopt size, komi and `history`.
    async fn commit<A: EngineActor + ?Sized>(
        &self,
        actor: &mut A,
        target: &SyncTarget,
        history: Vec<Command>,
    ) -> Result<usize, TransportError> {
        let desired = EngineState {
            board_size: Some(target.size()),
            komi: Some(target.komi),
            history,
        };
        let can_undo = self.options.allow_undo && actor.knows("undo");
        let commands = state_commands(actor.state(), &desired, can_undo);
        for command in &commands {
            actor.send_command(command).await?;
        }
        Ok(commands.len())
    }
}
