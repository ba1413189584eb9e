//! The playfield: our own fleet, and what we know about the opponent's.

use std::fmt::Write as _;

use crate::messages::{Facing, ShipSunk};

pub const FIELD_SIZE: i32 = 10;

/// The standard fleet in its base placement: `(x, y, length, facing)`.
const FLEET: [(i32, i32, i32, Facing); 5] = [
    (0, 0, 5, Facing::Horizontal),
    (0, 2, 4, Facing::Horizontal),
    (6, 0, 3, Facing::Vertical),
    (9, 5, 3, Facing::Vertical),
    (3, 7, 2, Facing::Horizontal),
];

fn in_bounds(x: i32, y: i32) -> bool {
    (0..FIELD_SIZE).contains(&x) && (0..FIELD_SIZE).contains(&y)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ship {
    pub x: i32,
    pub y: i32,
    pub length: i32,
    pub facing: Facing,
    hits: Vec<bool>,
}

impl Ship {
    fn new(x: i32, y: i32, length: i32, facing: Facing) -> Self {
        Self {
            x,
            y,
            length,
            facing,
            hits: vec![false; length as usize],
        }
    }

    /// The cells this ship covers, bow first.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (0..self.length).map(move |i| match self.facing {
            Facing::Horizontal => (self.x + i, self.y),
            Facing::Vertical => (self.x, self.y + i),
        })
    }

    fn part_at(&self, x: i32, y: i32) -> Option<usize> {
        self.cells().position(|cell| cell == (x, y))
    }

    pub fn is_sunk(&self) -> bool {
        self.hits.iter().all(|hit| *hit)
    }

    pub fn to_message(&self) -> ShipSunk {
        ShipSunk {
            x: self.x,
            y: self.y,
            length: self.length,
            facing: self.facing,
        }
    }

    /// Mirrors the ship across the vertical and/or horizontal center line.
    fn mirrored(&self, flip_x: bool, flip_y: bool) -> Self {
        let (span_x, span_y) = match self.facing {
            Facing::Horizontal => (self.length - 1, 0),
            Facing::Vertical => (0, self.length - 1),
        };
        let x = if flip_x { FIELD_SIZE - 1 - (self.x + span_x) } else { self.x };
        let y = if flip_y { FIELD_SIZE - 1 - (self.y + span_y) } else { self.y };
        Self::new(x, y, self.length, self.facing)
    }
}

/// What a bomb did to our fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shot {
    OutOfBounds,
    Miss,
    /// The cell was already hit.
    Repeat,
    Hit,
    Sunk(ShipSunk),
    /// The last afloat ship went down.
    Cleared(ShipSunk),
}

impl Shot {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit | Self::Sunk(_) | Self::Cleared(_))
    }
}

#[derive(Debug, Clone)]
pub struct Fleet {
    ships: Vec<Ship>,
    bombed: Vec<(i32, i32)>,
}

impl Fleet {
    /// One of four placements of the standard fleet, picked by `layout`
    /// (taken modulo 4).
    pub fn with_layout(layout: u8) -> Self {
        let flip_x = layout & 1 != 0;
        let flip_y = layout & 2 != 0;
        let ships = FLEET
            .iter()
            .map(|&(x, y, len, facing)| Ship::new(x, y, len, facing).mirrored(flip_x, flip_y))
            .collect();
        Self {
            ships,
            bombed: Vec::new(),
        }
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn bomb(&mut self, x: i32, y: i32) -> Shot {
        if !in_bounds(x, y) {
            return Shot::OutOfBounds;
        }
        if self.bombed.contains(&(x, y)) {
            return if self.ships.iter().any(|s| s.part_at(x, y).is_some()) {
                Shot::Repeat
            } else {
                Shot::Miss
            };
        }
        self.bombed.push((x, y));

        let Some((ship, part)) = self
            .ships
            .iter_mut()
            .find_map(|s| s.part_at(x, y).map(|part| (s, part)))
        else {
            return Shot::Miss;
        };

        ship.hits[part] = true;
        if !ship.is_sunk() {
            return Shot::Hit;
        }
        let sunk = ship.to_message();
        if self.unsunk_parts() == 0 {
            Shot::Cleared(sunk)
        } else {
            Shot::Sunk(sunk)
        }
    }

    pub fn unsunk_parts(&self) -> usize {
        self.ships
            .iter()
            .map(|s| s.hits.iter().filter(|hit| !**hit).count())
            .sum()
    }

    pub fn render(&self) -> String {
        render_grid(|x, y| {
            let part = self
                .ships
                .iter()
                .find_map(|s| s.part_at(x, y).map(|i| s.hits[i]));
            match part {
                Some(true) => 'X',
                Some(false) => '#',
                None if self.bombed.contains(&(x, y)) => 'o',
                None => '.',
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unknown,
    Water,
    Hit,
    Sunk,
}

/// Our picture of the opponent's field.
#[derive(Debug, Clone)]
pub struct Targets {
    marks: Vec<Mark>,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            marks: vec![Mark::Unknown; (FIELD_SIZE * FIELD_SIZE) as usize],
        }
    }
}

impl Targets {
    fn index(x: i32, y: i32) -> usize {
        (y * FIELD_SIZE + x) as usize
    }

    fn mark(&self, x: i32, y: i32) -> Mark {
        if in_bounds(x, y) {
            self.marks[Self::index(x, y)]
        } else {
            Mark::Water
        }
    }

    fn set(&mut self, x: i32, y: i32, mark: Mark) {
        if in_bounds(x, y) {
            self.marks[Self::index(x, y)] = mark;
        }
    }

    pub fn is_unknown(&self, x: i32, y: i32) -> bool {
        self.mark(x, y) == Mark::Unknown
    }

    pub fn record(&mut self, x: i32, y: i32, hit: bool) {
        if self.mark(x, y) != Mark::Sunk {
            self.set(x, y, if hit { Mark::Hit } else { Mark::Water });
        }
    }

    /// Marks a sunk ship and the water around it. Ships never touch, so
    /// none of those cells are worth a bomb.
    pub fn record_sunk(&mut self, sunk: &ShipSunk) {
        let ship = Ship::new(sunk.x, sunk.y, sunk.length, sunk.facing);
        for (x, y) in ship.cells() {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if self.mark(x + dx, y + dy) == Mark::Unknown {
                        self.set(x + dx, y + dy, Mark::Water);
                    }
                }
            }
        }
        for (x, y) in ship.cells() {
            self.set(x, y, Mark::Sunk);
        }
    }

    /// Next cell worth bombing: next to an unsunk hit if there is one,
    /// otherwise the first unknown cell on a checkerboard sweep.
    pub fn suggest(&self) -> Option<(i32, i32)> {
        let cells = || (0..FIELD_SIZE).flat_map(|y| (0..FIELD_SIZE).map(move |x| (x, y)));

        let follow_up = cells()
            .filter(|&(x, y)| self.mark(x, y) == Mark::Hit)
            .flat_map(|(x, y)| [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)])
            .find(|&(x, y)| self.is_unknown(x, y));

        follow_up
            .or_else(|| cells().find(|&(x, y)| (x + y) % 2 == 0 && self.is_unknown(x, y)))
            .or_else(|| cells().find(|&(x, y)| self.is_unknown(x, y)))
    }

    pub fn render(&self) -> String {
        render_grid(|x, y| match self.mark(x, y) {
            Mark::Unknown => '.',
            Mark::Water => 'o',
            Mark::Hit => 'X',
            Mark::Sunk => '#',
        })
    }
}

fn render_grid(cell: impl Fn(i32, i32) -> char) -> String {
    let mut out = String::from("   ");
    for x in 0..FIELD_SIZE {
        let _ = write!(out, "{x} ");
    }
    out.push('\n');
    for y in 0..FIELD_SIZE {
        let _ = write!(out, "{y:>2} ");
        for x in 0..FIELD_SIZE {
            out.push(cell(x, y));
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_layout_fits_without_touching() {
        for layout in 0..4 {
            let fleet = Fleet::with_layout(layout);
            let cells: Vec<_> = fleet.ships().iter().flat_map(|s| s.cells()).collect();
            assert!(cells.iter().all(|&(x, y)| in_bounds(x, y)), "layout {layout}");

            for (i, a) in fleet.ships().iter().enumerate() {
                for b in &fleet.ships()[i + 1..] {
                    let touching = a.cells().any(|(ax, ay)| {
                        b.cells().any(|(bx, by)| (ax - bx).abs() <= 1 && (ay - by).abs() <= 1)
                    });
                    assert!(!touching, "layout {layout}: {a:?} touches {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_bombing_a_ship_until_it_sinks() {
        let mut fleet = Fleet::with_layout(0);
        // The destroyer at (3, 7) and (4, 7).
        assert_eq!(fleet.bomb(3, 7), Shot::Hit);
        assert_eq!(fleet.bomb(3, 7), Shot::Repeat);
        assert!(matches!(fleet.bomb(4, 7), Shot::Sunk(s) if s.length == 2));
        assert_eq!(fleet.bomb(5, 7), Shot::Miss);
        assert_eq!(fleet.bomb(5, 7), Shot::Miss);
        assert_eq!(fleet.bomb(-1, 3), Shot::OutOfBounds);
        assert_eq!(fleet.bomb(0, FIELD_SIZE), Shot::OutOfBounds);
    }

    #[test]
    fn test_last_ship_clears_the_field() {
        let mut fleet = Fleet::with_layout(3);
        let cells: Vec<_> = fleet.ships().iter().flat_map(|s| s.cells()).collect();
        let (last, rest) = cells.split_last().unwrap();
        for &(x, y) in rest {
            assert!(fleet.bomb(x, y).is_hit());
        }
        assert_eq!(fleet.unsunk_parts(), 1);
        assert!(matches!(fleet.bomb(last.0, last.1), Shot::Cleared(_)));
        assert_eq!(fleet.unsunk_parts(), 0);
    }

    #[test]
    fn test_suggest_follows_up_on_hits() {
        let mut targets = Targets::default();
        assert_eq!(targets.suggest(), Some((0, 0)));

        targets.record(4, 4, true);
        assert_eq!(targets.suggest(), Some((5, 4)));
        targets.record(5, 4, false);
        assert_eq!(targets.suggest(), Some((3, 4)));
    }

    #[test]
    fn test_sunk_ship_surroundings_are_skipped() {
        let mut targets = Targets::default();
        targets.record(0, 0, true);
        targets.record(1, 0, true);
        targets.record_sunk(&ShipSunk {
            x: 0,
            y: 0,
            length: 2,
            facing: Facing::Horizontal,
        });

        for (x, y) in [(0, 1), (1, 1), (2, 0), (2, 1)] {
            assert!(!targets.is_unknown(x, y), "({x}, {y}) should be known");
        }
        // No follow-up around a sunk ship; back to the sweep.
        assert_eq!(targets.suggest(), Some((4, 0)));
    }

    #[test]
    fn test_suggest_exhausts() {
        let mut targets = Targets::default();
        for y in 0..FIELD_SIZE {
            for x in 0..FIELD_SIZE {
                targets.record(x, y, false);
            }
        }
        assert_eq!(targets.suggest(), None);
    }
}
