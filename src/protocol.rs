//! Wire protocol: newline-delimited frames with a `$` escape, plus the
//! tokens players and the lobby exchange on top of them.

use crate::types::Direction;

/// Frames are the bytes between two delimiters; a frame can therefore never
/// contain a literal newline.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Reserved byte. Translated to a newline when an incoming frame is
/// assembled, so a frame whose whole payload is `$` displays as a blank line.
pub const ESCAPE_BYTE: u8 = b'$';

/// Payload of the blank-line frame.
pub const BLANK_LINE_FRAME: &str = "$";

/// The disconnect sentinel. Sent and honored in both directions; the
/// connection is closed right after.
pub const LEAVE_FRAME: &str = "0";

/// Lobby token that starts the game.
pub const START_TOKEN: &str = "C";

pub const YES_TOKEN: &str = "Y";
pub const NO_TOKEN: &str = "N";

/// A syntactically valid frame from a player during a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerToken {
    Move(MoveToken),
    Instructions,
    Quit,
}

/// A token that decides the turn-holder's step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveToken {
    Walk(Direction),
    /// Direction followed by a positive number of squares, e.g. `E4`.
    WalkMany(Direction, u32),
    /// `P` plus a direction: pierce a door through a wall.
    Pierce(Direction),
    /// `M` plus a direction: wall up a door.
    WallUp(Direction),
}

/// Translate one received frame payload into text. A single trailing `\r` is
/// dropped so CRLF clients work; every escape byte becomes a newline.
pub fn decode_frame(raw: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(raw).into_owned();
    if text.ends_with('\r') {
        text.pop();
    }
    text.replace(ESCAPE_BYTE as char, "\n")
}

/// Parse one in-game frame, case-insensitively. Returns `None` for anything
/// that is not a listed token.
pub fn parse_player_token(raw: &str) -> Option<PlayerToken> {
    let token = raw.to_ascii_uppercase();
    match token.as_bytes() {
        [b'I'] => Some(PlayerToken::Instructions),
        [b'Q'] => Some(PlayerToken::Quit),
        &[letter] => {
            Direction::from_letter(letter as char).map(|d| PlayerToken::Move(MoveToken::Walk(d)))
        }
        &[b'P', letter] => {
            Direction::from_letter(letter as char).map(|d| PlayerToken::Move(MoveToken::Pierce(d)))
        }
        &[b'M', letter] => {
            Direction::from_letter(letter as char).map(|d| PlayerToken::Move(MoveToken::WallUp(d)))
        }
        &[letter, ..] => {
            let direction = Direction::from_letter(letter as char)?;
            let squares: u32 = token[1..].parse().ok()?;
            if squares == 0 {
                return None;
            }
            Some(PlayerToken::Move(MoveToken::WalkMany(direction, squares)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_directions() {
        assert_eq!(
            parse_player_token("N"),
            Some(PlayerToken::Move(MoveToken::Walk(Direction::North)))
        );
        assert_eq!(
            parse_player_token("w"),
            Some(PlayerToken::Move(MoveToken::Walk(Direction::West)))
        );
    }

    #[test]
    fn parses_control_tokens() {
        assert_eq!(parse_player_token("I"), Some(PlayerToken::Instructions));
        assert_eq!(parse_player_token("q"), Some(PlayerToken::Quit));
    }

    #[test]
    fn parses_multi_step_walks() {
        assert_eq!(
            parse_player_token("E4"),
            Some(PlayerToken::Move(MoveToken::WalkMany(Direction::East, 4)))
        );
        assert_eq!(
            parse_player_token("s12"),
            Some(PlayerToken::Move(MoveToken::WalkMany(Direction::South, 12)))
        );
        assert_eq!(
            parse_player_token("N1"),
            Some(PlayerToken::Move(MoveToken::WalkMany(Direction::North, 1)))
        );
    }

    #[test]
    fn parses_door_and_wall_commands() {
        assert_eq!(
            parse_player_token("PN"),
            Some(PlayerToken::Move(MoveToken::Pierce(Direction::North)))
        );
        assert_eq!(
            parse_player_token("me"),
            Some(PlayerToken::Move(MoveToken::WallUp(Direction::East)))
        );
    }

    #[test]
    fn rejects_malformed_tokens() {
        for raw in ["", "A", "E0", "E-3", "NE", "P2", "M", "PNE", "X4", "4", "N N"] {
            assert_eq!(parse_player_token(raw), None, "token {raw:?}");
        }
    }

    #[test]
    fn decode_translates_escapes() {
        assert_eq!(decode_frame(b"$"), "\n");
        assert_eq!(decode_frame(b"a$b"), "a\nb");
        assert_eq!(decode_frame(b"plain"), "plain");
    }

    #[test]
    fn decode_strips_one_trailing_carriage_return() {
        assert_eq!(decode_frame(b"E4\r"), "E4");
        assert_eq!(decode_frame(b"\r"), "");
    }
}
