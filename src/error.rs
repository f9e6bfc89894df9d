use thiserror::Error;

/// Why a maze definition was refused. Checks run in this order and the first
/// failing one wins.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    #[error("the maze contains characters outside the allowed alphabet")]
    InvalidCharacter,

    #[error("the maze must contain exactly one exit")]
    ExitCount,

    #[error("the maze is not rectangular")]
    NotRectangular,

    #[error("the maze is too small")]
    TooSmall,

    #[error("the maze is too large")]
    TooLarge,
}

/// Why a move was refused. The message is sent to the player verbatim.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("You cannot leave the maze this way! The exit is the square marked U.")]
    OutOfBounds,

    #[error("There is no wall there to pierce a door through!")]
    NoWallToPierce,

    #[error("There is no door there to wall up!")]
    NoDoorToWallUp,

    #[error("Ouch, you walked into a wall!")]
    HitWall,

    #[error("Ouch, you bumped into another player!")]
    HitOccupant,
}
