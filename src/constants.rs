pub const DEFAULT_PORT: u16 = 12800;
pub const DEFAULT_MAZE_DIR: &str = "mazes";

/// Timeout of one non-blocking readiness check, in milliseconds. The control
/// loop sweeps every connected peer once per cycle, so this bounds how long
/// one silent peer can hold the loop.
pub const POLL_INTERVAL_MS: u64 = 50;

/// How long the client waits between connection attempts, in seconds.
pub const CONNECT_RETRY_SECS: u64 = 5;

/// Minimum side length a maze must have to be playable.
pub const MAZE_MIN_SIZE: usize = 5;

/// Maximum side length of a maze.
pub const MAZE_MAX_SIZE: usize = 100;

/// Occupants are drawn on the grid as a single digit, so a maze can never
/// hold more than nine of them.
pub const MAX_OCCUPANTS: usize = 9;
