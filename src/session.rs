//! The session orchestrator: the loop spanning multiple games. Admits
//! connections into a lobby, lets the operator pick a maze, runs a game,
//! reclaims the survivors and asks them whether to go again.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::game::Game;
use crate::link::{Acceptor, PeerLink};
use crate::maze::Maze;
use crate::occupant::Occupant;
use crate::protocol::{LEAVE_FRAME, NO_TOKEN, START_TOKEN, YES_TOKEN};
use crate::rng::Rng;

/// One line of the per-game history the session keeps.
#[derive(Clone, Debug)]
pub struct GameRecord {
    /// Occupants still connected when the game ended.
    pub occupant_count: usize,
    pub finished_at: DateTime<Utc>,
}

/// Everything the server owns between process start and operator shutdown.
/// Built once by the entry point and passed explicitly; there is no ambient
/// instance anywhere.
pub struct Session {
    acceptor: Acceptor,
    console: PeerLink,
    mazes: Vec<Maze>,
    waiting: Vec<Occupant>,
    games_played: u32,
    history: Vec<GameRecord>,
    rng: Rng,
    open: bool,
}

impl Session {
    pub fn new(acceptor: Acceptor, console: PeerLink, mazes: Vec<Maze>, seed: u32) -> Self {
        Self {
            acceptor,
            console,
            mazes,
            waiting: Vec::new(),
            games_played: 0,
            history: Vec::new(),
            rng: Rng::new(seed),
            open: true,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    pub fn history(&self) -> &[GameRecord] {
        &self.history
    }

    /// Run games until the operator closes the session.
    pub async fn run(&mut self) {
        while self.open {
            let Some(maze_index) = self.choose_maze().await else {
                break;
            };
            if !self.lobby(maze_index).await {
                break;
            }
            self.run_game(maze_index).await;
            self.post_game_vote().await;
        }
        self.shutdown();
    }

    /// Have the operator pick a maze large enough for everyone already
    /// waiting. `None` means the session is closing.
    async fn choose_maze(&mut self) -> Option<usize> {
        for occupant in &mut self.waiting {
            occupant.send("Waiting for the server to choose a maze.");
        }
        if self.mazes.is_empty() {
            self.console
                .send("No maze could be loaded. Closing the session.");
            self.open = false;
            return None;
        }

        self.console.send("\nLoaded mazes:");
        for (index, maze) in self.mazes.iter().enumerate() {
            self.console
                .send(&format!(" - {}: maze {}", index + 1, maze.name()));
        }

        let waiting_count = self.waiting.len();
        let allowed: Vec<String> = self
            .mazes
            .iter()
            .enumerate()
            .filter(|(_, maze)| maze.max_occupancy() >= waiting_count)
            .map(|(index, _)| (index + 1).to_string())
            .collect();

        loop {
            self.console
                .send("Choose a maze for the next game (0 closes the session):");
            let answer = self.console.receive().await;
            if answer == LEAVE_FRAME {
                self.open = false;
                return None;
            }
            if allowed.contains(&answer) {
                if let Ok(number) = answer.parse::<usize>() {
                    self.console.send(&format!("Maze chosen: {number}.\n"));
                    return Some(number - 1);
                }
            }
            self.console
                .send(&format!("Allowed choices: {}.", allowed.join(", ")));
        }
    }

    /// Admit connections up to the maze's capacity and wait for somebody to
    /// send the start token. Returns false when the session closed instead.
    async fn lobby(&mut self, maze_index: usize) -> bool {
        let capacity = self.mazes[maze_index].max_occupancy();
        let mut room_left = self.announce_capacity(capacity, true);

        loop {
            for mut link in self.acceptor.poll_accept().await {
                if room_left {
                    let mut occupant = Occupant::new(link);
                    occupant.send("Welcome to the maze escape game.");
                    occupant.send("Press C when everyone is ready to start the game.");
                    self.waiting.push(occupant);
                    self.console
                        .send(&format!("{} player(s) connected.", self.waiting.len()));
                    room_left = self.announce_capacity(capacity, false);
                } else {
                    link.send("The lobby is full for the chosen maze.");
                    link.send(LEAVE_FRAME);
                    link.close();
                }
            }

            let mut ready = Vec::new();
            for (index, occupant) in self.waiting.iter_mut().enumerate() {
                if occupant.link.poll(true).await {
                    ready.push(index);
                }
            }

            let mut start = false;
            let mut removed = false;
            for index in ready {
                let frame = self.waiting[index].link.receive().await;
                if frame == LEAVE_FRAME {
                    self.dismiss_waiting(index);
                    removed = true;
                } else if frame.eq_ignore_ascii_case(START_TOKEN) {
                    start = true;
                } else {
                    self.waiting[index].send("Only C starts the game.");
                }
            }

            if removed {
                self.waiting.retain(|occupant| !occupant.has_departed());
                self.console
                    .send(&format!("{} player(s) connected.", self.waiting.len()));
                room_left = self.waiting.len() < capacity;
                if self.waiting.is_empty() {
                    if self.ask_close_session().await {
                        self.open = false;
                        return false;
                    }
                    self.console.send("Waiting for players to connect.");
                }
            }
            if start {
                return true;
            }
        }
    }

    /// Delegate to a round arbiter, then take back the maze (edits persist
    /// for the rest of the session) and the surviving occupants.
    async fn run_game(&mut self, maze_index: usize) {
        let maze = self.mazes[maze_index].clone();
        let seed = self.rng.next_u32();
        let occupants = std::mem::take(&mut self.waiting);
        let mut game = Game::new(maze, occupants, seed);
        game.play(&mut self.console).await;

        let (maze, survivors) = game.finish();
        self.mazes[maze_index] = maze;
        self.waiting = survivors;
        self.games_played += 1;
        self.history.push(GameRecord {
            occupant_count: self.waiting.len(),
            finished_at: Utc::now(),
        });
        info!(
            games_played = self.games_played,
            survivors = self.waiting.len(),
            "game over"
        );
    }

    /// Ask every survivor whether to keep playing; drop the "no" voters.
    async fn post_game_vote(&mut self) {
        for occupant in &mut self.waiting {
            occupant.send("Do you want to keep playing? Y/N");
        }

        let mut pending: Vec<usize> = (0..self.waiting.len()).collect();
        while !pending.is_empty() {
            let mut ready = Vec::new();
            for &index in &pending {
                if self.waiting[index].link.poll(true).await {
                    ready.push(index);
                }
            }
            for index in ready {
                let frame = self.waiting[index].link.receive().await;
                if frame.eq_ignore_ascii_case(YES_TOKEN) {
                    pending.retain(|&value| value != index);
                } else if frame.eq_ignore_ascii_case(NO_TOKEN) || frame == LEAVE_FRAME {
                    self.dismiss_waiting(index);
                    pending.retain(|&value| value != index);
                } else {
                    self.waiting[index].send("Only Y or N are allowed.");
                }
            }
        }

        self.waiting.retain(|occupant| !occupant.has_departed());
        if self.waiting.is_empty() {
            self.console.send("There is no player connected anymore.");
            if self.ask_close_session().await {
                self.open = false;
            }
        }
    }

    async fn ask_close_session(&mut self) -> bool {
        self.console.send("Do you want to close this session? Y/N");
        loop {
            let answer = self.console.receive().await;
            if answer.eq_ignore_ascii_case(YES_TOKEN) || answer == LEAVE_FRAME {
                return true;
            }
            if answer.eq_ignore_ascii_case(NO_TOKEN) {
                return false;
            }
            self.console.send("Only Y and N are allowed.");
        }
    }

    /// Say goodbye to a waiting occupant and cut the connection.
    fn dismiss_waiting(&mut self, index: usize) {
        let occupant = &mut self.waiting[index];
        if occupant.has_departed() {
            return;
        }
        occupant.send("Goodbye!");
        occupant.send(LEAVE_FRAME);
        occupant.link.close();
        occupant.mark_departed();
    }

    /// Disconnect everyone and release the listening endpoint.
    fn shutdown(&mut self) {
        for index in 0..self.waiting.len() {
            self.dismiss_waiting(index);
        }
        self.waiting.clear();
        self.console.send("Closing the connection.");
        self.acceptor.close();
        info!(games_played = self.games_played, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ScriptedLink, Transcript};

    /// One spawn square, a corridor of doors, the exit four steps east.
    const CORRIDOR: &str = "OOOOOOOOOOOOOOOOOOOO\n\
                            OOOOOOOOOOOOOOOOOOOO\n\
                            O ...UOOOOOOOOOOOOOO\n\
                            OOOOOOOOOOOOOOOOOOOO\n\
                            OOOOOOOOOOOOOOOOOOOO";

    fn corridor() -> Maze {
        Maze::parse("corridor", CORRIDOR).expect("valid maze")
    }

    fn scripted_link(frames: &[&str]) -> (PeerLink, Transcript) {
        let link = ScriptedLink::new(frames);
        let transcript = link.transcript();
        (PeerLink::Scripted(link), transcript)
    }

    fn lines(transcript: &Transcript) -> Vec<String> {
        transcript.lock().expect("transcript lock").clone()
    }

    #[tokio::test]
    async fn full_session_plays_one_game_and_closes() {
        let (player, player_transcript) = scripted_link(&["C", "E4", "N"]);
        let (console, console_transcript) = scripted_link(&["1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player]);

        let mut session = Session::new(acceptor, console, vec![corridor()], 31);
        session.run().await;

        assert_eq!(session.games_played(), 1);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].occupant_count, 1);

        let sent = lines(&player_transcript);
        assert!(sent
            .iter()
            .any(|line| line == "Welcome to the maze escape game."));
        assert!(sent
            .iter()
            .any(|line| line == "Congratulations! You have escaped the maze."));
        assert!(sent.iter().any(|line| line == "Do you want to keep playing? Y/N"));
        assert!(sent.iter().any(|line| line == "Goodbye!"));
        assert_eq!(sent.last().map(String::as_str), Some(LEAVE_FRAME));

        let console_sent = lines(&console_transcript);
        assert!(console_sent.iter().any(|line| line == "Maze chosen: 1.\n"));
        assert!(console_sent
            .iter()
            .any(|line| line == "There is no player connected anymore."));
        assert!(console_sent.iter().any(|line| line == "Closing the connection."));
    }

    #[tokio::test]
    async fn overflow_connection_is_told_full_and_cut() {
        // The corridor holds a single occupant; the second connection
        // arriving in the same batch must be turned away.
        let (player, _) = scripted_link(&["C", "E4", "N"]);
        let (late, late_transcript) = scripted_link(&[]);
        let (console, _) = scripted_link(&["1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player, late]);

        let mut session = Session::new(acceptor, console, vec![corridor()], 37);
        session.run().await;

        assert_eq!(session.games_played(), 1);
        let sent = lines(&late_transcript);
        assert_eq!(
            sent,
            vec![
                "The lobby is full for the chosen maze.".to_string(),
                LEAVE_FRAME.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn empty_lobby_asks_the_operator_to_close() {
        let (player, player_transcript) = scripted_link(&["0"]);
        let (console, console_transcript) = scripted_link(&["1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player]);

        let mut session = Session::new(acceptor, console, vec![corridor()], 41);
        session.run().await;

        assert_eq!(session.games_played(), 0);
        assert!(lines(&console_transcript)
            .iter()
            .any(|line| line == "Do you want to close this session? Y/N"));
        assert!(lines(&player_transcript)
            .iter()
            .any(|line| line == "Goodbye!"));
    }

    #[tokio::test]
    async fn session_with_no_mazes_closes_cleanly() {
        let (console, console_transcript) = scripted_link(&[]);
        let acceptor = Acceptor::scripted(Vec::new());

        let mut session = Session::new(acceptor, console, Vec::new(), 43);
        session.run().await;

        assert_eq!(session.games_played(), 0);
        assert!(lines(&console_transcript)
            .iter()
            .any(|line| line == "No maze could be loaded. Closing the session."));
    }

    #[tokio::test]
    async fn invalid_maze_choice_is_reprompted() {
        let (player, _) = scripted_link(&["C", "E4", "N"]);
        let (console, console_transcript) = scripted_link(&["7", "1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player]);

        let mut session = Session::new(acceptor, console, vec![corridor()], 47);
        session.run().await;

        assert_eq!(session.games_played(), 1);
        assert!(lines(&console_transcript)
            .iter()
            .any(|line| line == "Allowed choices: 1."));
    }

    #[tokio::test]
    async fn stray_lobby_input_is_corrected() {
        let (player, player_transcript) = scripted_link(&["hello", "C", "E4", "N"]);
        let (console, _) = scripted_link(&["1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player]);

        let mut session = Session::new(acceptor, console, vec![corridor()], 53);
        session.run().await;

        assert_eq!(session.games_played(), 1);
        assert!(lines(&player_transcript)
            .iter()
            .any(|line| line == "Only C starts the game."));
    }

    #[tokio::test]
    async fn door_edits_persist_across_games_in_a_session() {
        // Two games on the same maze: the first pierces a door north of the
        // spawn and escapes east, the second walls that door back up. The
        // wall-up is only a valid move if the first game's edit survived.
        let content = "OOOOOOO\nOOOOOOO\nOOOOOOO\nOX..UOO\nOOOOOOO\nOOOOOOO";
        let maze = Maze::parse("shortcut", content).expect("valid maze");
        let (player, player_transcript) =
            scripted_link(&["C", "PN", "E3", "Y", "C", "MN", "E3", "N"]);
        let (console, _) = scripted_link(&["1", "1", "Y"]);
        let acceptor = Acceptor::scripted(vec![player]);

        let mut session = Session::new(acceptor, console, vec![maze], 59);
        session.run().await;

        assert_eq!(session.games_played(), 2);
        let sent = lines(&player_transcript);
        assert!(!sent
            .iter()
            .any(|line| line == "There is no door there to wall up!"));
        assert!(!sent
            .iter()
            .any(|line| line == "There is no wall there to pierce a door through!"));
        let wins = sent
            .iter()
            .filter(|line| *line == "Congratulations! You have escaped the maze.")
            .count();
        assert_eq!(wins, 2);
    }
}
