//! The round arbiter: one game instance owning the maze and its occupants,
//! serializing moves from all connected peers into a single turn loop.

use tracing::{debug, info};

use crate::error::MoveRejection;
use crate::link::PeerLink;
use crate::maze::Maze;
use crate::occupant::Occupant;
use crate::protocol::{parse_player_token, PlayerToken, BLANK_LINE_FRAME, LEAVE_FRAME};
use crate::rng::Rng;
use crate::types::{Cell, Step};

pub const INSTRUCTIONS: &str = "\nThe commands at your disposal are the following:\n\
    - The four directions: N (north), S (south), E (east) and W (west);\n\
    - A direction followed by a number n > 0, to advance n squares;\n\
    - M plus a direction, to wall up a door;\n\
    - P plus a direction, to pierce a door through a wall.\n\
    - To see these instructions again, enter I.\n\
    - To leave the game, enter Q or Ctrl + C.\n";

/// One attempt to escape a maze. Turn order is fixed at construction (join
/// order); only the turn-holder's input is ever acted upon.
pub struct Game {
    maze: Maze,
    occupants: Vec<Occupant>,
    turn: usize,
    rounds_played: u32,
    finished: bool,
    winner: Option<u8>,
    gone_count: usize,
}

impl Game {
    /// Claim the occupants for this game: identifiers follow join order and
    /// every occupant draws a distinct random spawn square.
    pub fn new(maze: Maze, mut occupants: Vec<Occupant>, seed: u32) -> Self {
        let mut rng = Rng::new(seed);
        let mut spawns = maze.spawn_cells();
        for (index, occupant) in occupants.iter_mut().enumerate() {
            let pick = rng.pick_index(spawns.len());
            let (row, col) = spawns.swap_remove(pick);
            occupant.join(index as u8 + 1, row, col);
        }
        Self {
            maze,
            occupants,
            turn: 0,
            rounds_played: 0,
            finished: false,
            winner: None,
            gone_count: 0,
        }
    }

    pub fn winner(&self) -> Option<u8> {
        self.winner
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    /// Give the maze back (door edits and all) along with the occupants who
    /// are still connected.
    pub fn finish(self) -> (Maze, Vec<Occupant>) {
        let survivors = self
            .occupants
            .into_iter()
            .filter(|occupant| !occupant.has_departed())
            .collect();
        (self.maze, survivors)
    }

    /// Run the game to completion: a win, or every occupant gone.
    pub async fn play(&mut self, console: &mut PeerLink) {
        if self.occupants.is_empty() {
            self.finished = true;
            return;
        }
        self.launch(console);

        'game: while !self.finished {
            while self.occupants[self.turn].step().is_none() {
                self.poll_cycle(console).await;
                if self.gone_count == self.occupants.len() {
                    self.finished = true;
                    info!(rounds = self.rounds_played, "every player left the game");
                    break 'game;
                }
                if self.occupants[self.turn].has_departed() {
                    self.advance_turn(console);
                }
            }

            let index = self.turn;
            let Some(step) = self.occupants[index].step() else {
                continue;
            };
            match self.check_move(index, step) {
                Err(rejection) => {
                    self.occupants[index].send(&rejection.to_string());
                    self.occupants[index].clear_step();
                }
                Ok(()) => {
                    self.apply_move(index, step);
                    self.rounds_played += 1;
                    if self.check_win(index) {
                        self.finished = true;
                        self.winner = Some(self.occupants[index].id());
                    }
                    self.conclude_turn(index, step, console);
                }
            }
        }
    }

    /// Greet everyone, share the rules and the starting grid, open turn 0.
    fn launch(&mut self, console: &mut PeerLink) {
        info!(
            maze = self.maze.name(),
            occupants = self.occupants.len(),
            "game starting"
        );
        for occupant in &mut self.occupants {
            occupant.greet();
        }
        self.broadcast(
            "The game begins! You must escape the maze before the others do.",
            None,
            None,
        );
        self.broadcast(INSTRUCTIONS, None, None);
        let state = self.render_state();
        self.broadcast(&state, None, None);
        self.announce_turn(console);
    }

    /// One readiness sweep over every connected occupant. Departures are
    /// honored no matter whose turn it is; only the turn-holder's input can
    /// decide a step.
    async fn poll_cycle(&mut self, console: &mut PeerLink) {
        let current = self.turn;
        let mut ready = Vec::new();
        for index in 0..self.occupants.len() {
            let occupant = &mut self.occupants[index];
            if !occupant.has_departed() && occupant.link.poll(index == current).await {
                ready.push(index);
            }
        }

        for index in ready {
            if self.occupants[index].has_departed() {
                continue;
            }
            let frame = self.occupants[index].link.receive().await;
            if frame == LEAVE_FRAME {
                self.remove_occupant(index, console);
                continue;
            }
            if index != current {
                self.occupants[index].send("It is not your turn to play yet.");
                continue;
            }
            let Some(token) = parse_player_token(&frame) else {
                self.occupants[index].send("Invalid input. Enter I to see the instructions again.");
                continue;
            };
            match token {
                PlayerToken::Instructions => self.occupants[index].send(INSTRUCTIONS),
                PlayerToken::Quit => self.remove_occupant(index, console),
                PlayerToken::Move(token) => self.occupants[index].accept_input(token),
            }
        }
    }

    fn check_move(&self, index: usize, step: Step) -> Result<(), MoveRejection> {
        let (row, col) = self.occupants[index].step_towards(step.direction());
        if !self.maze.in_bounds(row, col) {
            return Err(MoveRejection::OutOfBounds);
        }
        let target = self.maze.cell(row as usize, col as usize);
        match step {
            Step::Pierce(_) if target != Cell::Wall => Err(MoveRejection::NoWallToPierce),
            Step::WallUp(_) if target != Cell::Door => Err(MoveRejection::NoDoorToWallUp),
            Step::Walk(_) if target == Cell::Wall => Err(MoveRejection::HitWall),
            Step::Walk(_) => {
                let occupied = self.occupants.iter().enumerate().any(|(other, occupant)| {
                    other != index
                        && !occupant.has_departed()
                        && occupant.position() == (row as usize, col as usize)
                });
                if occupied {
                    Err(MoveRejection::HitOccupant)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn apply_move(&mut self, index: usize, step: Step) {
        let (row, col) = self.occupants[index].step_towards(step.direction());
        let (row, col) = (row as usize, col as usize);
        match step {
            Step::Pierce(_) => self.maze.set_cell(row, col, Cell::Door),
            Step::WallUp(_) => self.maze.set_cell(row, col, Cell::Wall),
            Step::Walk(_) => self.occupants[index].relocate(row, col),
        }
        debug!(
            player = self.occupants[index].id(),
            %step,
            round = self.rounds_played,
            "move applied"
        );
    }

    fn check_win(&mut self, index: usize) -> bool {
        let (row, col) = self.occupants[index].position();
        if self.maze.cell(row, col) == Cell::Exit {
            self.occupants[index].send("Congratulations! You have escaped the maze.");
            true
        } else {
            false
        }
    }

    /// Close out an applied move: either crown the winner or broadcast the
    /// move and hand the turn to the next occupant still in play.
    fn conclude_turn(&mut self, index: usize, step: Step, console: &mut PeerLink) {
        let id = self.occupants[index].id();
        if self.finished {
            let line = format!("Player {id} has won the game.");
            self.broadcast(&line, None, Some(console));
            info!(winner = id, rounds = self.rounds_played, "game finished");
        } else {
            let line = format!("Player {id} played {step}.");
            self.broadcast(&line, None, Some(&mut *console));
            let state = self.render_state();
            self.broadcast(&state, None, None);
            self.advance_turn(console);
        }
    }

    /// Move the cursor to the next non-departed occupant and open their turn.
    /// At least one occupant must still be in play.
    fn advance_turn(&mut self, console: &mut PeerLink) {
        loop {
            self.turn = (self.turn + 1) % self.occupants.len();
            if !self.occupants[self.turn].has_departed() {
                break;
            }
        }
        self.announce_turn(console);
    }

    fn announce_turn(&mut self, console: &mut PeerLink) {
        self.broadcast(BLANK_LINE_FRAME, None, None);
        let id = self.occupants[self.turn].id();
        let line = format!("\nIt is Player {id}'s turn.");
        self.broadcast(&line, Some(self.turn), Some(console));
        self.occupants[self.turn].begin_turn();
    }

    /// Drop an occupant from play: tell the others, say goodbye, cut the
    /// connection.
    fn remove_occupant(&mut self, index: usize, console: &mut PeerLink) {
        if self.occupants[index].has_departed() {
            return;
        }
        let id = self.occupants[index].id();
        let line = format!("Player {id} has left the game.");
        self.broadcast(&line, Some(index), Some(console));
        let occupant = &mut self.occupants[index];
        occupant.send("You have left the game. Goodbye!");
        occupant.send(LEAVE_FRAME);
        occupant.link.close();
        occupant.mark_departed();
        self.gone_count += 1;
    }

    fn broadcast(&mut self, line: &str, except: Option<usize>, console: Option<&mut PeerLink>) {
        for (index, occupant) in self.occupants.iter_mut().enumerate() {
            if Some(index) == except {
                continue;
            }
            occupant.send(line);
        }
        if let Some(console) = console {
            console.send(line);
        }
    }

    /// The static maze with every occupant still in play drawn as their
    /// identifier.
    fn render_state(&self) -> String {
        let markers: Vec<(usize, usize, u8)> = self
            .occupants
            .iter()
            .filter(|occupant| !occupant.has_departed())
            .map(|occupant| {
                let (row, col) = occupant.position();
                (row, col, occupant.id())
            })
            .collect();
        self.maze.render(&markers)
    }
}
