/// Movement rules and blast rules, truth-table driven.
///
/// Pure functions over terrain with no side effects.
/// These encode "what is legal" without performing the action.
///
/// ## One-pixel Step Truth Table
///
/// `target` is the pixel point one full cell ahead of the actor in the
/// step direction. It only names a cell when the actor is grid-aligned.
///
/// ┌────────────────────────────────┬─────────┬──────────────────────┐
/// │ Condition                       │ Allow?  │ Notes                │
/// ├────────────────────────────────┼─────────┼──────────────────────┤
/// │ Up:    y <= 10                  │ DENY    │ top interior row     │
/// │ Down:  y >= (rows-2)*10         │ DENY    │ bottom interior row  │
/// │ Left:  x <= 10                  │ DENY    │ left interior column │
/// │ Right: x >= (cols-2)*10         │ DENY    │ right interior column│
/// │ perpendicular coord off-lane    │ DENY    │ between hard blocks  │
/// │ target is a soft block          │ DENY    │                      │
/// │ target holds a bomb             │ DENY    │                      │
/// │ target is burning               │ ALLOW   │ walking into fire    │
/// │ Otherwise                       │ ALLOW   │                      │
/// └────────────────────────────────┴─────────┴──────────────────────┘
///
/// A lane is an odd cell index: the only rows/columns that run between
/// two hard blocks.
///
/// ## Blast Walk
///
/// ┌────────────────────────────────┬──────────────────────────────────┐
/// │ Cell met while walking outward  │ Effect                           │
/// ├────────────────────────────────┼──────────────────────────────────┤
/// │ origin                          │ always burns                     │
/// │ wall / hard block               │ stop, cell excluded              │
/// │ soft block                      │ burns, stop, reported as hit     │
/// │ anything else                   │ burns, keep walking              │
/// │ radius reached                  │ stop                             │
/// └────────────────────────────────┴──────────────────────────────────┘

use std::collections::{BTreeMap, BTreeSet};

use super::entity::{Bomb, Pos};
use super::grid::{Arena, Cell, Dir, BLOCK_LEN};

/// Immutable view of everything that blocks movement.
pub struct MapView<'a> {
    pub arena: &'a Arena,
    pub soft_blocks: &'a BTreeSet<Cell>,
    pub bombs: &'a BTreeMap<Cell, Bomb>,
}

impl<'a> MapView<'a> {
    /// Is the pixel point the origin of an occupied (soft block / bomb) cell?
    fn occupied_at(&self, point: Pos) -> bool {
        if !point.is_aligned() {
            return false;
        }
        let cell = point.snapped();
        self.soft_blocks.contains(&cell) || self.bombs.contains_key(&cell)
    }
}

/// Is this pixel coordinate on a lane (odd cell index, interior)?
#[inline]
pub fn on_lane(px: i32, cells: i32) -> bool {
    px >= BLOCK_LEN && px <= (cells - 2) * BLOCK_LEN && px.rem_euclid(2 * BLOCK_LEN) == BLOCK_LEN
}

/// Is there room to keep going in `dir` before hitting the border?
/// The same bound also gates perpendicular snapping.
pub fn within_bounds(arena: &Arena, pos: Pos, dir: Dir) -> bool {
    match dir {
        Dir::Up => pos.y - BLOCK_LEN > 0,
        Dir::Down => pos.y + BLOCK_LEN < (arena.rows - 1) * BLOCK_LEN,
        Dir::Left => pos.x - BLOCK_LEN > 0,
        Dir::Right => pos.x + BLOCK_LEN < (arena.cols - 1) * BLOCK_LEN,
    }
}

/// Can an actor at `pos` move one pixel in `dir`? See truth table above.
pub fn can_step(map: &MapView, pos: Pos, dir: Dir) -> bool {
    if !within_bounds(map.arena, pos, dir) {
        return false;
    }
    let lane_ok = if dir.is_vertical() {
        on_lane(pos.x, map.arena.cols)
    } else {
        on_lane(pos.y, map.arena.rows)
    };
    if !lane_ok {
        return false;
    }
    let (dx, dy) = dir.delta();
    let target = Pos::new(pos.x + dx * BLOCK_LEN, pos.y + dy * BLOCK_LEN);
    !map.occupied_at(target)
}

/// The perpendicular coordinate an actor should be snapped to before
/// moving along `dir`, if any. `None` means leave it alone.
pub fn perpendicular_snap(arena: &Arena, pos: Pos, dir: Dir) -> Option<Pos> {
    if !within_bounds(arena, pos, dir) {
        return None;
    }
    if dir.is_vertical() {
        let x = pos.snapped().col * BLOCK_LEN;
        (x != pos.x && on_lane(x, arena.cols)).then(|| Pos::new(x, pos.y))
    } else {
        let y = pos.snapped().row * BLOCK_LEN;
        (y != pos.y && on_lane(y, arena.rows)).then(|| Pos::new(pos.x, y))
    }
}

/// Result of walking a blast outward from its origin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlastWalk {
    pub cells: BTreeSet<Cell>,
    /// Soft blocks the walk stopped on, in walk order.
    pub soft_hits: Vec<Cell>,
}

/// Walk `radius` cells in each of the four directions. See table above.
pub fn blast_walk(
    arena: &Arena,
    soft_blocks: &BTreeSet<Cell>,
    origin: Cell,
    radius: u32,
) -> BlastWalk {
    let mut walk = BlastWalk::default();
    walk.cells.insert(origin);

    for dir in Dir::ALL {
        for i in 1..=radius as i32 {
            let cell = origin.offset(dir, i);
            if arena.is_solid(cell) || !arena.is_interior(cell) {
                break;
            }
            walk.cells.insert(cell);
            if soft_blocks.contains(&cell) {
                walk.soft_hits.push(cell);
                break;
            }
        }
    }
    walk
}
