use super::{Direction, Grid, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Why a round ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionKind {
    Wall,
    SelfHit,
}

impl CollisionKind {
    pub fn label(self) -> &'static str {
        match self {
            CollisionKind::Wall => "hit the wall",
            CollisionKind::SelfHit => "ran into itself",
        }
    }
}

/// Result of advancing the simulation by one tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// No heading yet, so nothing moved.
    Idle,
    Moved,
    /// Head reached the food; the snake grew by one cell.
    Ate,
    Collision(CollisionKind),
}

/// Authoritative game state: body, heading, food, and the food RNG.
pub struct SnakeGame {
    grid: Grid,
    // Front is the oldest tail cell, back is the head.
    body: VecDeque<Point>,
    direction: Direction,
    food: Point,
    rng: StdRng,
}

impl SnakeGame {
    /// Start a one-cell snake in the middle of the board.
    pub fn new(grid: Grid, mut rng: StdRng) -> Self {
        let food = random_cell(&grid, &mut rng);
        let mut body = VecDeque::new();
        body.push_back(grid.center());
        Self {
            grid,
            body,
            direction: Direction::None,
            food,
            rng,
        }
    }

    pub fn with_seed(grid: Grid, seed: u64) -> Self {
        Self::new(grid, StdRng::seed_from_u64(seed))
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn head(&self) -> Point {
        self.body.back().copied().unwrap_or_else(|| self.grid.center())
    }

    /// Body cells from tail to head.
    pub fn body(&self) -> impl Iterator<Item = Point> + '_ {
        self.body.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn score(&self) -> usize {
        self.body.len().saturating_sub(1)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn food(&self) -> Point {
        self.food
    }

    /// Change heading. No reverse check: turning back onto the neck is legal
    /// and the collision rules decide what happens.
    pub fn steer(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Advance one tick in the current heading.
    ///
    /// The new head is tested against every body cell except the oldest tail
    /// cell, which counts as vacated even on a tick where the snake grows.
    /// State is left untouched when a collision is reported.
    pub fn step(&mut self) -> StepOutcome {
        if self.direction == Direction::None {
            return StepOutcome::Idle;
        }
        let next = self.head().step(self.direction);
        if !self.grid.contains(next) {
            return StepOutcome::Collision(CollisionKind::Wall);
        }
        if self.body.iter().skip(1).any(|cell| *cell == next) {
            return StepOutcome::Collision(CollisionKind::SelfHit);
        }

        self.body.push_back(next);
        if next == self.food {
            self.food = random_cell(&self.grid, &mut self.rng);
            StepOutcome::Ate
        } else {
            self.body.pop_front();
            StepOutcome::Moved
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(grid: Grid, body: &[Point], food: Point, seed: u64) -> Self {
        Self {
            grid,
            body: body.iter().copied().collect(),
            direction: Direction::None,
            food,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// Uniform pick over every cell; the food may land where it just was.
fn random_cell(grid: &Grid, rng: &mut impl Rng) -> Point {
    Point::new(
        rng.random_range(0..i32::from(grid.width())),
        rng.random_range(0..i32::from(grid.height())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn new_game_starts_centered_and_idle() {
        let game = SnakeGame::with_seed(Grid::new(40, 30), 1);
        assert_eq!(game.head(), p(20, 15));
        assert_eq!(game.len(), 1);
        assert_eq!(game.score(), 0);
        assert_eq!(game.direction(), Direction::None);
        assert!(Grid::new(40, 30).contains(game.food()));
    }

    #[test]
    fn idle_snake_never_moves_or_collides() {
        let mut game = SnakeGame::from_parts(Grid::new(5, 5), &[p(0, 0)], p(4, 4), 1);
        for _ in 0..10 {
            assert_eq!(game.step(), StepOutcome::Idle);
        }
        assert_eq!(game.head(), p(0, 0));
    }

    #[test]
    fn moving_keeps_length_constant() {
        let mut game =
            SnakeGame::from_parts(Grid::new(10, 10), &[p(2, 5), p(3, 5), p(4, 5)], p(9, 9), 1);
        game.steer(Direction::Right);
        assert_eq!(game.step(), StepOutcome::Moved);
        assert_eq!(game.body().collect::<Vec<_>>(), vec![p(3, 5), p(4, 5), p(5, 5)]);
        assert_eq!(game.score(), 2);
    }

    #[test]
    fn eating_grows_by_exactly_one_and_relocates_food() {
        let grid = Grid::new(10, 10);
        let mut game = SnakeGame::from_parts(grid, &[p(5, 5)], p(5, 4), 42);
        game.steer(Direction::Up);
        assert_eq!(game.step(), StepOutcome::Ate);
        assert_eq!(game.len(), 2);
        assert_eq!(game.score(), 1);
        assert_eq!(game.head(), p(5, 4));
        assert!(grid.contains(game.food()));

        // Next plain move keeps the new length.
        game.steer(Direction::Left);
        let outcome = game.step();
        assert!(matches!(outcome, StepOutcome::Moved | StepOutcome::Ate));
        assert!(game.len() >= 2);
    }

    #[test]
    fn stepping_off_any_edge_is_a_wall_collision() {
        let cases = [
            (p(0, 2), Direction::Left),
            (p(4, 2), Direction::Right),
            (p(2, 0), Direction::Up),
            (p(2, 4), Direction::Down),
        ];
        for (start, heading) in cases {
            let mut game = SnakeGame::from_parts(Grid::new(5, 5), &[start], p(2, 2), 3);
            game.steer(heading);
            assert_eq!(
                game.step(),
                StepOutcome::Collision(CollisionKind::Wall),
                "{heading:?} from {start:?}"
            );
            assert_eq!(game.head(), start, "state is frozen on collision");
        }
    }

    #[test]
    fn walks_to_the_wall_then_collides() {
        let mut game = SnakeGame::from_parts(Grid::new(5, 5), &[p(2, 2)], p(4, 4), 3);
        game.steer(Direction::Up);
        assert_eq!(game.step(), StepOutcome::Moved);
        assert_eq!(game.step(), StepOutcome::Moved);
        assert_eq!(game.head(), p(2, 0));
        assert_eq!(game.step(), StepOutcome::Collision(CollisionKind::Wall));
    }

    #[test]
    fn head_may_follow_into_the_vacating_tail() {
        // Tail (1,1) -> (2,1) -> (2,2) -> head (1,2); moving up re-enters the tail cell.
        let body = [p(1, 1), p(2, 1), p(2, 2), p(1, 2)];
        let mut game = SnakeGame::from_parts(Grid::new(6, 6), &body, p(5, 5), 9);
        game.steer(Direction::Up);
        assert_eq!(game.step(), StepOutcome::Moved);
        assert_eq!(game.head(), p(1, 1));
        assert_eq!(game.len(), 4);
    }

    #[test]
    fn entering_any_other_body_cell_is_a_self_collision() {
        let body = [p(0, 1), p(1, 1), p(2, 1), p(2, 2), p(1, 2)];
        let mut game = SnakeGame::from_parts(Grid::new(6, 6), &body, p(5, 5), 9);
        game.steer(Direction::Up);
        assert_eq!(game.step(), StepOutcome::Collision(CollisionKind::SelfHit));

        let mut game = SnakeGame::from_parts(Grid::new(6, 6), &body, p(5, 5), 9);
        game.steer(Direction::Right);
        assert_eq!(game.step(), StepOutcome::Collision(CollisionKind::SelfHit));
    }

    #[test]
    fn reversing_a_two_cell_snake_swaps_ends() {
        let mut game = SnakeGame::from_parts(Grid::new(6, 6), &[p(2, 2), p(3, 2)], p(5, 5), 9);
        game.steer(Direction::Left);
        assert_eq!(game.step(), StepOutcome::Moved);
        assert_eq!(game.body().collect::<Vec<_>>(), vec![p(3, 2), p(2, 2)]);
    }

    #[test]
    fn seeded_games_place_food_identically() {
        let a = SnakeGame::with_seed(Grid::new(40, 30), 77);
        let b = SnakeGame::with_seed(Grid::new(40, 30), 77);
        assert_eq!(a.food(), b.food());
    }
}
