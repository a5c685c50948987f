/// Arena terrain: cells, directions, and per-round generation.
///
/// Three static layers, fixed once the arena is built:
///   - `walls`:       closed border ring.
///   - `hard_blocks`: indestructible lattice at every even interior (col, row).
///   - `walkable`:    every interior cell that is not a hard block.
///
/// Soft blocks are not part of `Arena`: they are regenerated each round
/// by `generate_soft_blocks()` and owned by the world.

use std::collections::BTreeSet;

use rand::Rng;

/// Edge length of one cell, in pixels.
pub const BLOCK_LEN: i32 = 10;
pub const ARENA_COLS: i32 = 15;
pub const ARENA_ROWS: i32 = 13;

/// A grid-aligned cell. Ordered so arena sets iterate deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Cell { col, row }
    }

    /// The cell `steps` cells away in `dir`.
    pub fn offset(self, dir: Dir, steps: i32) -> Cell {
        let (dc, dr) = dir.delta();
        Cell::new(self.col + dc * steps, self.row + dr * steps)
    }

    pub fn neighbors(self) -> [Cell; 4] {
        Dir::ALL.map(|d| self.offset(d, 1))
    }

    pub fn manhattan(self, other: Cell) -> i32 {
        (self.col - other.col).abs() + (self.row - other.row).abs()
    }

    pub fn chebyshev(self, other: Cell) -> i32 {
        (self.col - other.col).abs().max((self.row - other.row).abs())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    /// Blast and neighbor order: right, left, down, up.
    pub const ALL: [Dir; 4] = [Dir::Right, Dir::Left, Dir::Down, Dir::Up];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Dir::Up | Dir::Down)
    }
}

#[derive(Clone, Debug)]
pub struct Arena {
    pub cols: i32,
    pub rows: i32,
    pub walls: BTreeSet<Cell>,
    pub hard_blocks: BTreeSet<Cell>,
    pub walkable: BTreeSet<Cell>,
}

impl Arena {
    pub fn generate(cols: i32, rows: i32) -> Self {
        let mut walls = BTreeSet::new();
        let mut hard_blocks = BTreeSet::new();
        let mut walkable = BTreeSet::new();

        for col in 0..cols {
            for row in 0..rows {
                let cell = Cell::new(col, row);
                if col == 0 || row == 0 || col == cols - 1 || row == rows - 1 {
                    walls.insert(cell);
                } else if col % 2 == 0 && row % 2 == 0 {
                    hard_blocks.insert(cell);
                } else {
                    walkable.insert(cell);
                }
            }
        }

        Arena { cols, rows, walls, hard_blocks, walkable }
    }

    /// The 15 x 13 board every match is played on.
    pub fn standard() -> Self {
        Arena::generate(ARENA_COLS, ARENA_ROWS)
    }

    #[inline]
    pub fn is_interior(&self, cell: Cell) -> bool {
        cell.col > 0 && cell.row > 0 && cell.col < self.cols - 1 && cell.row < self.rows - 1
    }

    /// Wall or hard block: stops blasts and is never walkable.
    #[inline]
    pub fn is_solid(&self, cell: Cell) -> bool {
        self.walls.contains(&cell) || self.hard_blocks.contains(&cell)
    }

    #[inline]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.walkable.contains(&cell)
    }

    /// Spawn corners, indexed by actor id.
    pub fn spawn_points(&self) -> [Cell; 4] {
        [
            Cell::new(1, 1),
            Cell::new(self.cols - 2, 1),
            Cell::new(1, self.rows - 2),
            Cell::new(self.cols - 2, self.rows - 2),
        ]
    }

    /// Roll soft blocks over the walkable cells. `spawns` are the spawn
    /// cells of the actors in play; each and its four neighbors stay clear.
    pub fn generate_soft_blocks<R: Rng>(
        &self,
        rng: &mut R,
        percent: u8,
        spawns: &[Cell],
    ) -> BTreeSet<Cell> {
        let mut soft = BTreeSet::new();
        for &cell in &self.walkable {
            let near_spawn = spawns
                .iter()
                .any(|&s| s == cell || s.manhattan(cell) == 1);
            if near_spawn {
                continue;
            }
            if rng.gen_range(0..100) < percent as u32 {
                soft.insert(cell);
            }
        }
        soft
    }
}
