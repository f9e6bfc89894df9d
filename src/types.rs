use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'N' => Some(Self::North),
            'S' => Some(Self::South),
            'E' => Some(Self::East),
            'W' => Some(Self::West),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
            Self::East => 'E',
            Self::West => 'W',
        }
    }

    /// Row/column delta of one step in this direction. Rows grow southwards.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Self::North => (-1, 0),
            Self::South => (1, 0),
            Self::East => (0, 1),
            Self::West => (0, -1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One square of the maze grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Wall,
    Floor,
    Door,
    Exit,
}

impl Cell {
    pub fn from_char(value: char) -> Option<Self> {
        match value {
            'O' => Some(Self::Wall),
            ' ' => Some(Self::Floor),
            '.' => Some(Self::Door),
            'U' => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Self::Wall => 'O',
            Self::Floor => ' ',
            Self::Door => '.',
            Self::Exit => 'U',
        }
    }
}

/// The action an occupant has decided for the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Walk(Direction),
    Pierce(Direction),
    WallUp(Direction),
}

impl Step {
    pub fn direction(self) -> Direction {
        match self {
            Self::Walk(direction) | Self::Pierce(direction) | Self::WallUp(direction) => direction,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walk(direction) => write!(f, "{direction}"),
            Self::Pierce(direction) => write!(f, "P{direction}"),
            Self::WallUp(direction) => write!(f, "M{direction}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_letters_round_trip() {
        for letter in ['N', 'S', 'E', 'W'] {
            let direction = Direction::from_letter(letter).expect("known letter");
            assert_eq!(direction.letter(), letter);
        }
        assert_eq!(Direction::from_letter('e'), Some(Direction::East));
        assert_eq!(Direction::from_letter('O'), None);
        assert_eq!(Direction::from_letter('Z'), None);
    }

    #[test]
    fn offsets_are_unit_steps() {
        for direction in [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ] {
            let (row, col) = direction.offset();
            assert_eq!(row.abs() + col.abs(), 1);
        }
    }

    #[test]
    fn step_displays_as_wire_token() {
        assert_eq!(Step::Walk(Direction::East).to_string(), "E");
        assert_eq!(Step::Pierce(Direction::North).to_string(), "PN");
        assert_eq!(Step::WallUp(Direction::West).to_string(), "MW");
    }
}
