use crate::command::{normalize, Command};
use crate::config::AppConfig;
use crate::game::{CollisionKind, Direction, Grid, SnakeGame, StepOutcome};
use crate::log_debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Keyboard input already translated by the terminal layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Steer(Direction),
    Start,
    /// Esc, `q`, Ctrl+C or the terminal going away.
    Close,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// A spoken quit command.
    Quit,
    Closed,
    Collision(CollisionKind),
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            ExitReason::Quit => "quit by voice",
            ExitReason::Closed => "closed",
            ExitReason::Collision(kind) => kind.label(),
        }
    }
}

/// What the loop should do after a tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(ExitReason),
}

pub enum Screen {
    Menu,
    Playing(SnakeGame),
}

/// How the previous round ended, shown on the menu.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub score: usize,
    pub collision: CollisionKind,
}

/// Menu/Playing state machine. Owns the game; the voice worker never sees it.
pub struct App {
    grid: Grid,
    seed: Option<u64>,
    return_to_menu: bool,
    screen: Screen,
    rounds_started: u64,
    last_round: Option<RoundResult>,
    last_command: Option<Command>,
}

impl App {
    pub fn new(grid: Grid, seed: Option<u64>, return_to_menu: bool) -> Self {
        Self {
            grid,
            seed,
            return_to_menu,
            screen: Screen::Menu,
            rounds_started: 0,
            last_round: None,
            last_command: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.grid(), config.seed, config.return_to_menu)
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn game(&self) -> Option<&SnakeGame> {
        match &self.screen {
            Screen::Playing(game) => Some(game),
            Screen::Menu => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.screen, Screen::Playing(_))
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn last_round(&self) -> Option<RoundResult> {
        self.last_round
    }

    /// Most recent voice command that meant something.
    pub fn last_command(&self) -> Option<Command> {
        self.last_command
    }

    /// Score to report when the process exits.
    pub fn final_score(&self) -> usize {
        match (&self.screen, self.last_round) {
            (Screen::Playing(game), _) => game.score(),
            (Screen::Menu, Some(round)) => round.score,
            (Screen::Menu, None) => 0,
        }
    }

    /// Run one tick: apply keys, then queued utterances (so voice wins a
    /// same-tick conflict), then advance the simulation if a round is on.
    pub fn tick(&mut self, inputs: &[InputEvent], utterances: Vec<String>) -> Flow {
        let mut steer = None;
        let mut start = false;

        for input in inputs {
            match *input {
                InputEvent::Close => return Flow::Exit(ExitReason::Closed),
                InputEvent::Steer(direction) => steer = Some(direction),
                InputEvent::Start => start = true,
            }
        }

        for utterance in &utterances {
            let command = normalize(utterance);
            if command != Command::Unrecognized {
                self.last_command = Some(command);
            }
            match command {
                Command::Quit => {
                    log_debug("voice quit received");
                    return Flow::Exit(ExitReason::Quit);
                }
                Command::StartGame => start = true,
                Command::Unrecognized => {}
                other => steer = other.direction(),
            }
        }

        match &mut self.screen {
            Screen::Menu => {
                if start {
                    self.start_round();
                }
                Flow::Continue
            }
            Screen::Playing(game) => {
                if let Some(direction) = steer {
                    game.steer(direction);
                }
                match game.step() {
                    StepOutcome::Collision(collision) => {
                        let score = game.score();
                        self.end_round(score, collision)
                    }
                    StepOutcome::Ate => {
                        tracing::debug!(score = game.score(), "food_eaten");
                        Flow::Continue
                    }
                    StepOutcome::Idle | StepOutcome::Moved => Flow::Continue,
                }
            }
        }
    }

    fn start_round(&mut self) {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.rounds_started)),
            None => StdRng::from_os_rng(),
        };
        self.rounds_started += 1;
        self.screen = Screen::Playing(SnakeGame::new(self.grid, rng));
        log_debug(&format!("round {} started", self.rounds_started));
        tracing::info!(round = self.rounds_started, "round_started");
    }

    fn end_round(&mut self, score: usize, collision: CollisionKind) -> Flow {
        self.last_round = Some(RoundResult { score, collision });
        log_debug(&format!("round over: {} (score {score})", collision.label()));
        tracing::info!(score, collision = collision.label(), "round_over");
        if self.return_to_menu {
            self.screen = Screen::Menu;
            Flow::Continue
        } else {
            Flow::Exit(ExitReason::Collision(collision))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Point;

    fn said(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    fn playing_app(grid: Grid, return_to_menu: bool) -> App {
        let mut app = App::new(grid, Some(7), return_to_menu);
        assert_eq!(app.tick(&[InputEvent::Start], Vec::new()), Flow::Continue);
        assert!(app.is_playing());
        app
    }

    fn head(app: &App) -> Point {
        app.game().expect("round in progress").head()
    }

    #[test]
    fn voice_session_from_menu_to_quit() {
        let mut app = App::new(Grid::new(40, 30), Some(7), false);
        assert!(!app.is_playing());

        assert_eq!(app.tick(&[], said(&["please begin the game"])), Flow::Continue);
        assert!(app.is_playing());
        let start = head(&app);

        assert_eq!(app.tick(&[], said(&["go up please"])), Flow::Continue);
        assert_eq!(head(&app), Point::new(start.x, start.y - 1));

        assert_eq!(
            app.tick(&[], said(&["quit now"])),
            Flow::Exit(ExitReason::Quit)
        );
    }

    #[test]
    fn menu_ignores_directions() {
        let mut app = App::new(Grid::new(10, 10), Some(1), false);
        let flow = app.tick(&[InputEvent::Steer(Direction::Up)], said(&["left"]));
        assert_eq!(flow, Flow::Continue);
        assert!(!app.is_playing());
    }

    #[test]
    fn close_key_exits_from_menu_and_game() {
        let mut app = App::new(Grid::new(10, 10), Some(1), false);
        assert_eq!(
            app.tick(&[InputEvent::Close], Vec::new()),
            Flow::Exit(ExitReason::Closed)
        );
        let mut app = playing_app(Grid::new(10, 10), false);
        assert_eq!(
            app.tick(&[InputEvent::Close], said(&["up"])),
            Flow::Exit(ExitReason::Closed)
        );
    }

    #[test]
    fn voice_quit_exits_from_menu() {
        let mut app = App::new(Grid::new(10, 10), Some(1), false);
        assert_eq!(
            app.tick(&[], said(&["exit"])),
            Flow::Exit(ExitReason::Quit)
        );
    }

    #[test]
    fn voice_beats_keys_in_the_same_tick() {
        let mut app = playing_app(Grid::new(20, 20), false);
        let start = head(&app);
        app.tick(&[InputEvent::Steer(Direction::Left)], said(&["down"]));
        assert_eq!(head(&app), Point::new(start.x, start.y + 1));
    }

    #[test]
    fn last_direction_in_a_tick_wins() {
        let mut app = playing_app(Grid::new(20, 20), false);
        let start = head(&app);
        app.tick(
            &[
                InputEvent::Steer(Direction::Up),
                InputEvent::Steer(Direction::Left),
            ],
            said(&["right", "turn left", "hmm"]),
        );
        assert_eq!(head(&app), Point::new(start.x - 1, start.y));
        assert_eq!(app.last_command(), Some(Command::Left));
    }

    #[test]
    fn snake_waits_for_a_first_heading() {
        let mut app = playing_app(Grid::new(20, 20), false);
        let start = head(&app);
        for _ in 0..5 {
            assert_eq!(app.tick(&[], said(&["banana"])), Flow::Continue);
        }
        assert_eq!(head(&app), start);
    }

    #[test]
    fn heading_persists_between_ticks() {
        let mut app = playing_app(Grid::new(20, 20), false);
        let start = head(&app);
        app.tick(&[InputEvent::Steer(Direction::Right)], Vec::new());
        app.tick(&[], Vec::new());
        app.tick(&[], said(&["start"]));
        assert_eq!(head(&app), Point::new(start.x + 3, start.y));
    }

    #[test]
    fn wall_collision_exits_by_default() {
        let mut app = playing_app(Grid::new(5, 5), false);
        // Center of a 5x5 board is (2, 2); the third step left leaves the board.
        assert_eq!(app.tick(&[], said(&["left"])), Flow::Continue);
        assert_eq!(app.tick(&[], Vec::new()), Flow::Continue);
        assert_eq!(
            app.tick(&[], Vec::new()),
            Flow::Exit(ExitReason::Collision(CollisionKind::Wall))
        );
        assert!(app.last_round().is_some());
    }

    #[test]
    fn return_to_menu_keeps_the_last_score() {
        let mut app = playing_app(Grid::new(5, 5), true);
        app.tick(&[InputEvent::Steer(Direction::Up)], Vec::new());
        app.tick(&[], Vec::new());
        let score = app.game().map(SnakeGame::score).unwrap_or_default();
        assert_eq!(app.tick(&[], Vec::new()), Flow::Continue);
        assert!(!app.is_playing());
        let round = app.last_round().expect("round recorded");
        assert_eq!(round.collision, CollisionKind::Wall);
        assert_eq!(round.score, score);
        assert_eq!(app.final_score(), score);

        // A new round can start from the menu again.
        app.tick(&[], said(&["play"]));
        assert!(app.is_playing());
    }

    #[test]
    fn seeded_rounds_are_reproducible() {
        let mut first = App::new(Grid::new(30, 30), Some(42), false);
        let mut second = App::new(Grid::new(30, 30), Some(42), false);
        first.tick(&[InputEvent::Start], Vec::new());
        second.tick(&[InputEvent::Start], Vec::new());
        assert_eq!(
            first.game().map(SnakeGame::food),
            second.game().map(SnakeGame::food)
        );
    }

    #[test]
    fn exit_reasons_have_labels() {
        assert_eq!(ExitReason::Quit.label(), "quit by voice");
        assert_eq!(
            ExitReason::Collision(CollisionKind::SelfHit).label(),
            "ran into itself"
        );
    }
}
