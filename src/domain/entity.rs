/// Entities: Actor, Bomb, Explosion, Powerup.
/// Positions are pixel-precise; everything else lives on grid cells.

use std::collections::BTreeSet;

use rand::Rng;

use super::grid::{Cell, BLOCK_LEN};

/// Pixel position, relative to the arena's top-left wall cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Pos { x, y }
    }

    pub fn of_cell(cell: Cell) -> Self {
        Pos::new(cell.col * BLOCK_LEN, cell.row * BLOCK_LEN)
    }

    /// Nearest grid-aligned cell on each axis.
    pub fn snapped(self) -> Cell {
        Cell::new(snap_axis(self.x), snap_axis(self.y))
    }

    pub fn is_aligned(self) -> bool {
        self.x % BLOCK_LEN == 0 && self.y % BLOCK_LEN == 0
    }
}

/// Round one pixel coordinate to its nearest cell index (half rounds up).
#[inline]
pub fn snap_axis(px: i32) -> i32 {
    (px + BLOCK_LEN / 2).div_euclid(BLOCK_LEN)
}

/// Per-round actor stats. Start at 1, only pickups raise them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Stats {
    pub blast_radius: u32,
    pub max_bombs: u32,
    pub speed: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Stats { blast_radius: 1, max_bombs: 1, speed: 1 }
    }
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub id: usize,
    pub pos: Pos,
    pub spawn: Cell,
    pub alive: bool,
    pub stats: Stats,
    pub active_bombs: u32,
}

impl Actor {
    pub fn new(id: usize, spawn: Cell) -> Self {
        Actor {
            id,
            pos: Pos::of_cell(spawn),
            spawn,
            alive: true,
            stats: Stats::default(),
            active_bombs: 0,
        }
    }

    #[inline]
    pub fn cell(&self) -> Cell {
        self.pos.snapped()
    }

    /// Back to spawn with fresh stats (round start).
    pub fn respawn(&mut self) {
        self.pos = Pos::of_cell(self.spawn);
        self.alive = true;
        self.stats = Stats::default();
        self.active_bombs = 0;
    }
}

/// A placed bomb. `blast` is the future explosion range computed at
/// placement; it is never recomputed while the bomb is live.
#[derive(Clone, Debug)]
pub struct Bomb {
    pub owner: usize,
    pub cell: Cell,
    pub fuse: i32,
    pub blast: BTreeSet<Cell>,
}

/// All burning cells share a single expiry, measured from the latest
/// detonation.
#[derive(Clone, Debug, Default)]
pub struct Explosion {
    pub cells: BTreeSet<Cell>,
    pub last_detonation_tick: u64,
}

impl Explosion {
    pub fn is_active(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Has the fire burned for `duration` ticks since the last detonation?
    pub fn expired(&self, now: u64, duration: u32) -> bool {
        now.saturating_sub(self.last_detonation_tick) >= duration as u64
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PowerupKind {
    Fire,  // +1 blast radius
    Bomb,  // +1 concurrent bomb
    Speed, // +1 pixel per tick
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 3] = [PowerupKind::Fire, PowerupKind::Bomb, PowerupKind::Speed];

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn apply(self, stats: &mut Stats) {
        match self {
            PowerupKind::Fire => stats.blast_radius += 1,
            PowerupKind::Bomb => stats.max_bombs += 1,
            PowerupKind::Speed => stats.speed += 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerupKind::Fire => "fire",
            PowerupKind::Bomb => "bomb",
            PowerupKind::Speed => "speed",
        }
    }
}

/// One tick of intent for a human-controlled actor.
/// Directions are held keys; `bomb` is edge-triggered.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ActorIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub bomb: bool,
}

impl ActorIntent {
    /// Both axes requested at once: perpendicular snapping is suppressed.
    pub fn is_diagonal(&self) -> bool {
        (self.up || self.down) && (self.left || self.right)
    }

    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.left || self.right || self.bomb)
    }
}
