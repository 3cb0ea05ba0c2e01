use std::collections::VecDeque;

use Direction::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right
}

/// A grid cell. Coordinates are 1-indexed; a head that has just left the
/// board sits at 0 or `size + 1`, so the axes are signed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i16,
    pub y: i16,
}

impl Position {
    pub const fn new(x: i16, y: i16) -> Self {
        Position { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Up => Position::new(self.x, self.y - 1),
            Down => Position::new(self.x, self.y + 1),
            Left => Position::new(self.x - 1, self.y),
            Right => Position::new(self.x + 1, self.y),
        }
    }

    pub fn manhattan_distance(self, other: Position) -> u16 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u16
    }

    pub fn is_within(self, size: i16) -> bool {
        (1..=size).contains(&self.x) && (1..=size).contains(&self.y)
    }
}

/// Segment chain with the head at the front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snake {
    body: VecDeque<Position>,
}

impl Snake {
    pub fn new(head: Position) -> Self {
        let mut body = VecDeque::new();
        body.push_back(head);
        Snake { body }
    }

    #[cfg(test)]
    pub fn from_segments(segments: &[(i16, i16)]) -> Self {
        assert!(!segments.is_empty(), "a snake needs at least a head");
        let body = segments.iter().map(|&(x, y)| Position::new(x, y)).collect();
        Snake { body }
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Position> {
        self.body.iter()
    }

    /// Moves one cell: the new head goes in front and the tail is dropped.
    pub fn advance(&mut self, new_head: Position) -> Option<Position> {
        self.body.push_front(new_head);
        self.body.pop_back()
    }

    pub fn grow(&mut self, new_head: Position) {
        self.body.push_front(new_head);
    }

    pub fn hits_itself(&self) -> bool {
        let head = self.head();
        self.body.iter().skip(1).any(|segment| *segment == head)
    }

    /// Whether any segment behind the neck lies within `distance` of the head.
    /// The neck is always one cell away, so it is never counted.
    pub fn body_within(&self, distance: u16) -> bool {
        let head = self.head();
        self.body.iter()
            .skip(2)
            .any(|segment| head.manhattan_distance(*segment) <= distance)
    }
}
