//! Grid-based snake simulation. Owned and mutated only by the game loop thread.

mod snake;

pub use snake::{CollisionKind, SnakeGame, StepOutcome};

/// Heading of the snake. `None` means the player has not steered yet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    /// One-cell step for this heading (y grows downward).
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::None => "idle",
        }
    }
}

/// A cell on the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Board dimensions in cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: u16,
    height: u16,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        (0..i32::from(self.width)).contains(&point.x)
            && (0..i32::from(self.height)).contains(&point.y)
    }

    pub fn center(&self) -> Point {
        Point::new(i32::from(self.width / 2), i32::from(self.height / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_contains_only_cells_inside_bounds() {
        let grid = Grid::new(4, 3);
        assert!(grid.contains(Point::new(0, 0)));
        assert!(grid.contains(Point::new(3, 2)));
        assert!(!grid.contains(Point::new(-1, 0)));
        assert!(!grid.contains(Point::new(0, -1)));
        assert!(!grid.contains(Point::new(4, 0)));
        assert!(!grid.contains(Point::new(0, 3)));
    }

    #[test]
    fn idle_direction_does_not_move() {
        let origin = Point::new(2, 2);
        assert_eq!(origin.step(Direction::None), origin);
        assert_eq!(origin.step(Direction::Up), Point::new(2, 1));
        assert_eq!(origin.step(Direction::Right), Point::new(3, 2));
    }

    #[test]
    fn grid_center_matches_half_dimensions() {
        assert_eq!(Grid::new(40, 30).center(), Point::new(20, 15));
    }
}
