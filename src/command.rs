//! Maps free-form recognized speech onto the handful of intents the game understands.

use crate::game::Direction;

/// A normalized game intent derived from one utterance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Left,
    Right,
    Up,
    Down,
    StartGame,
    Quit,
    Unrecognized,
}

impl Command {
    /// Direction this command steers toward, if it steers at all.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Command::Left => Some(Direction::Left),
            Command::Right => Some(Direction::Right),
            Command::Up => Some(Direction::Up),
            Command::Down => Some(Direction::Down),
            Command::StartGame | Command::Quit | Command::Unrecognized => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::Left => "left",
            Command::Right => "right",
            Command::Up => "up",
            Command::Down => "down",
            Command::StartGame => "start game",
            Command::Quit => "quit",
            Command::Unrecognized => "unrecognized",
        }
    }
}

/// Intents in match priority order. Earlier rows win when an utterance
/// contains synonyms for more than one intent.
const COMMAND_TABLE: &[(Command, &[&str])] = &[
    (Command::Left, &["left"]),
    (Command::Right, &["right"]),
    (Command::Up, &["up"]),
    (Command::Down, &["down"]),
    (Command::Quit, &["quit", "exit"]),
    (Command::StartGame, &["start", "begin", "play"]),
];

/// Return the first intent with a synonym contained anywhere in `text`.
///
/// Matching is plain substring search on already lower-cased text, so
/// "setup" steers up just like "up" does.
pub fn normalize(text: &str) -> Command {
    COMMAND_TABLE
        .iter()
        .find(|(_, synonyms)| synonyms.iter().any(|word| text.contains(word)))
        .map(|(command, _)| *command)
        .unwrap_or(Command::Unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_intent_utterances_map_to_their_intent() {
        let cases = [
            ("left", Command::Left),
            ("turn right now", Command::Right),
            ("go up please", Command::Up),
            ("down", Command::Down),
            ("quit now", Command::Quit),
            ("exit", Command::Quit),
            ("start", Command::StartGame),
            ("please begin the game", Command::StartGame),
            ("let's play", Command::StartGame),
        ];
        for (text, expected) in cases {
            assert_eq!(normalize(text), expected, "utterance {text:?}");
        }
    }

    #[test]
    fn unmatched_text_is_unrecognized() {
        assert_eq!(normalize(""), Command::Unrecognized);
        assert_eq!(normalize("hello there"), Command::Unrecognized);
        assert_eq!(normalize("banana"), Command::Unrecognized);
    }

    #[test]
    fn earlier_table_entries_win_ties() {
        assert_eq!(normalize("up and exit"), Command::Up);
        assert_eq!(normalize("exit then go up"), Command::Up);
        assert_eq!(normalize("right left"), Command::Left);
        assert_eq!(normalize("down to play"), Command::Down);
        assert_eq!(normalize("quit before you start"), Command::Quit);
    }

    #[test]
    fn synonyms_match_inside_longer_words() {
        assert_eq!(normalize("setup"), Command::Up);
        assert_eq!(normalize("display"), Command::StartGame);
    }

    #[test]
    fn only_steering_commands_carry_a_direction() {
        assert_eq!(Command::Left.direction(), Some(Direction::Left));
        assert_eq!(Command::Down.direction(), Some(Direction::Down));
        assert_eq!(Command::Quit.direction(), None);
        assert_eq!(Command::StartGame.direction(), None);
        assert_eq!(Command::Unrecognized.direction(), None);
    }
}
