use crate::link::PeerLink;
use crate::protocol::MoveToken;
use crate::types::{Direction, Step};

#[derive(Clone, Copy, Debug)]
struct PendingWalk {
    direction: Direction,
    steps_left: u32,
}

/// One connected participant. Built by the session when the connection is
/// admitted; identifier and starting square are handed out when a game
/// claims the occupant.
pub struct Occupant {
    pub link: PeerLink,
    id: u8,
    row: usize,
    col: usize,
    pending: Option<PendingWalk>,
    step: Option<Step>,
    departed: bool,
}

impl Occupant {
    pub fn new(link: PeerLink) -> Self {
        Self {
            link,
            id: 0,
            row: 0,
            col: 0,
            pending: None,
            step: None,
            departed: false,
        }
    }

    /// Enter a game: identifier (1-based join order) and starting square.
    pub(crate) fn join(&mut self, id: u8, row: usize, col: usize) {
        self.id = id;
        self.row = row;
        self.col = col;
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn step(&self) -> Option<Step> {
        self.step
    }

    pub fn has_departed(&self) -> bool {
        self.departed
    }

    pub(crate) fn mark_departed(&mut self) {
        self.departed = true;
    }

    /// Send one line; dropped once the occupant has departed.
    pub fn send(&mut self, line: &str) {
        if !self.departed {
            self.link.send(line);
        }
    }

    pub(crate) fn greet(&mut self) {
        self.pending = None;
        self.step = None;
        let id = self.id;
        self.send(&format!("In this game, you are Player {id}."));
    }

    /// Open the occupant's turn. A pending multi-square walk resolves this
    /// turn's step by itself; otherwise the occupant is asked for input.
    pub(crate) fn begin_turn(&mut self) {
        self.step = None;
        let id = self.id;
        self.send(&format!("It is your turn to play, Player {id}."));

        match self.pending {
            Some(mut pending) => {
                let direction = pending.direction;
                self.send(&format!("You already decided to head {direction}."));
                self.step = Some(Step::Walk(direction));
                pending.steps_left -= 1;
                self.pending = (pending.steps_left > 0).then_some(pending);
            }
            None => self.send("Where do you go?"),
        }
    }

    /// Turn a validated token into this turn's step. A walk over several
    /// squares decides the first step now and queues the rest.
    pub(crate) fn accept_input(&mut self, token: MoveToken) {
        match token {
            MoveToken::Walk(direction) => self.step = Some(Step::Walk(direction)),
            MoveToken::WalkMany(direction, squares) => {
                self.step = Some(Step::Walk(direction));
                if squares > 1 {
                    self.pending = Some(PendingWalk {
                        direction,
                        steps_left: squares - 1,
                    });
                }
            }
            MoveToken::Pierce(direction) => self.step = Some(Step::Pierce(direction)),
            MoveToken::WallUp(direction) => self.step = Some(Step::WallUp(direction)),
        }
    }

    /// The square one step away in the given direction; may be out of bounds.
    pub(crate) fn step_towards(&self, direction: Direction) -> (isize, isize) {
        let (row_delta, col_delta) = direction.offset();
        (self.row as isize + row_delta, self.col as isize + col_delta)
    }

    pub(crate) fn relocate(&mut self, row: usize, col: usize) {
        self.row = row;
        self.col = col;
    }

    /// Drop the decided step and any queued walk, forcing fresh input.
    pub(crate) fn clear_step(&mut self) {
        self.step = None;
        self.pending = None;
    }
}
