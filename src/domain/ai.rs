/// Bot AI primitives: archetype profiles, BFS pathfinding, danger sensing.
///
/// Everything here is a pure query over a `NavView`. Decisions and the
/// per-bot state machine live in `sim::bots`.
///
/// Traversable set for one path query:
///   walkable
///   - burning cells
///   - bomb cells       (except the start cell itself)
///   - soft blocks      (only while escaping)

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::entity::Bomb;
use super::grid::{Cell, Dir};

/// Chebyshev radius in which a freshly placed bomb wakes a bot up.
pub const NEW_BOMB_RADIUS: i32 = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BotArchetype {
    Hostile,
    Careful,
    Greedy,
}

/// How a bot picks a powerup to chase.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PowerupPolicy {
    /// Closest reachable powerup first (Manhattan ordering).
    Nearest,
    /// Shuffle the powerups within `radius` cells and take the first
    /// reachable one. Each attempt only happens `try_percent` % of the time.
    RandomWithin { radius: i32, try_percent: u32 },
}

/// How a bot picks an opponent to chase.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttackPolicy {
    /// Any reachable opponent, in shuffled order.
    RandomReachable,
    /// First reachable opponent (by id) within `radius` cells.
    FirstWithin { radius: i32 },
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Profile {
    pub interval_secs: f32,
    pub chance_percent: u32,
    pub danger_radius: i32,
    pub bomb_range: i32,
    pub powerup: PowerupPolicy,
    pub attack: AttackPolicy,
}

impl BotArchetype {
    pub const ALL: [BotArchetype; 3] =
        [BotArchetype::Hostile, BotArchetype::Careful, BotArchetype::Greedy];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hostile" => Some(BotArchetype::Hostile),
            "careful" => Some(BotArchetype::Careful),
            "greedy" => Some(BotArchetype::Greedy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BotArchetype::Hostile => "hostile",
            BotArchetype::Careful => "careful",
            BotArchetype::Greedy => "greedy",
        }
    }

    pub fn profile(self) -> Profile {
        match self {
            BotArchetype::Hostile => Profile {
                interval_secs: 0.5,
                chance_percent: 25,
                danger_radius: 0,
                bomb_range: 2,
                powerup: PowerupPolicy::RandomWithin { radius: 4, try_percent: 20 },
                attack: AttackPolicy::RandomReachable,
            },
            BotArchetype::Careful => Profile {
                interval_secs: 0.25,
                chance_percent: 100,
                danger_radius: 4,
                bomb_range: 4,
                powerup: PowerupPolicy::RandomWithin { radius: 4, try_percent: 100 },
                attack: AttackPolicy::FirstWithin { radius: 3 },
            },
            BotArchetype::Greedy => Profile {
                interval_secs: 1.0,
                chance_percent: 100,
                danger_radius: 2,
                bomb_range: 3,
                powerup: PowerupPolicy::Nearest,
                attack: AttackPolicy::FirstWithin { radius: 6 },
            },
        }
    }
}

impl Profile {
    /// Re-evaluation interval expressed in ticks (never zero).
    pub fn reeval_ticks(&self, fps: u32) -> u64 {
        ((fps as f32 * self.interval_secs).round() as u64).max(1)
    }
}

/// Read-only view of the world the AI queries run against.
pub struct NavView<'a> {
    pub walkable: &'a BTreeSet<Cell>,
    pub soft_blocks: &'a BTreeSet<Cell>,
    pub burning: &'a BTreeSet<Cell>,
    pub bombs: &'a BTreeMap<Cell, Bomb>,
    /// Burning cells plus every live bomb's future blast.
    pub hazard: &'a BTreeSet<Cell>,
}

impl<'a> NavView<'a> {
    /// Cells a path starting at `start` may use. See module table.
    pub fn traversable(&self, start: Cell, escaping: bool) -> BTreeSet<Cell> {
        self.walkable
            .iter()
            .copied()
            .filter(|c| !self.burning.contains(c))
            .filter(|c| *c == start || !self.bombs.contains_key(c))
            .filter(|c| !escaping || !self.soft_blocks.contains(c))
            .collect()
    }

    /// Does a bot with `radius` sense danger while standing on `cell`?
    ///
    /// radius 0: a bomb sits on the cell and the cell is not yet burning.
    /// radius > 0: some walkable cell within the Chebyshev radius is a
    /// hazard. Every cell in the square is scanned.
    pub fn senses_danger(&self, cell: Cell, radius: i32) -> bool {
        if radius <= 0 {
            return self.bombs.contains_key(&cell) && !self.burning.contains(&cell);
        }
        for col in cell.col - radius..=cell.col + radius {
            for row in cell.row - radius..=cell.row + radius {
                let c = Cell::new(col, row);
                if self.walkable.contains(&c) && self.hazard.contains(&c) {
                    return true;
                }
            }
        }
        false
    }

    /// Cells a wandering or escaping bot may aim for.
    pub fn safe_goals(&self) -> impl Iterator<Item = Cell> + '_ {
        self.walkable
            .iter()
            .copied()
            .filter(|c| !self.soft_blocks.contains(c) && !self.hazard.contains(c))
    }

    /// Is `cell` burning or holding a bomb right now?
    pub fn is_unsafe_step(&self, cell: Cell) -> bool {
        self.burning.contains(&cell) || self.bombs.contains_key(&cell)
    }
}

// ── BFS ──

/// Breadth-first search tree from one start cell over a traversable set.
/// One search answers any number of goal queries.
pub struct PathField {
    start: Cell,
    /// Reached cell → predecessor (`None` for the start).
    prev: BTreeMap<Cell, Option<Cell>>,
}

impl PathField {
    pub fn search(nav: &NavView, start: Cell, escaping: bool) -> Self {
        let open = nav.traversable(start, escaping);
        let mut prev = BTreeMap::new();
        if !open.contains(&start) {
            return PathField { start, prev };
        }

        prev.insert(start, None);
        let mut queue: VecDeque<Cell> = VecDeque::with_capacity(open.len());
        queue.push_back(start);

        while let Some(cur) = queue.pop_front() {
            for dir in Dir::ALL {
                let next = cur.offset(dir, 1);
                if open.contains(&next) && !prev.contains_key(&next) {
                    prev.insert(next, Some(cur));
                    queue.push_back(next);
                }
            }
        }
        PathField { start, prev }
    }

    pub fn reaches(&self, goal: Cell) -> bool {
        self.prev.contains_key(&goal)
    }

    /// Shortest path from start to `goal`, both ends included.
    /// Empty when there is none. `start == goal` yields `[start]`.
    pub fn path_to(&self, goal: Cell) -> Vec<Cell> {
        if !self.reaches(goal) {
            return Vec::new();
        }
        let mut path = vec![goal];
        let mut node = goal;
        while let Some(Some(p)) = self.prev.get(&node) {
            path.push(*p);
            node = *p;
        }
        path.reverse();
        if path.first() != Some(&self.start) {
            return Vec::new();
        }
        path
    }

    /// Every reached cell, in cell order.
    pub fn reachable(&self) -> impl Iterator<Item = Cell> + '_ {
        self.prev.keys().copied()
    }
}

/// One-shot path query.
pub fn find_path(nav: &NavView, start: Cell, goal: Cell, escaping: bool) -> Vec<Cell> {
    PathField::search(nav, start, escaping).path_to(goal)
}
