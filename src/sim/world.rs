/// WorldState: everything that changes during a match.
///
/// ## Layers
///
///   - `arena`        walls, hard blocks, walkable. Never mutated.
///   - `soft_blocks`  regenerated each round, destroyed by blasts.
///   - `actors`       dense, indexed by id. Elimination clears `alive`.
///   - `bombs`        keyed by cell, at most one per cell.
///   - `explosion`    burning cells with one shared expiry.
///   - `powerups`     keyed by cell.
///
/// Human input and bots change the world only through `move_actor()`,
/// `approach()` and `place_bomb()`. Detonation and round resets are
/// driven by `sim::step`.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{MatchSettings, TimingConfig};
use crate::domain::ai::NavView;
use crate::domain::entity::{Actor, Bomb, Explosion, Pos, PowerupKind};
use crate::domain::grid::{Arena, Cell, Dir};
use crate::domain::rules::{self, MapView};
use super::event::GameEvent;
use super::round::RoundState;

pub struct WorldState {
    pub arena: Arena,
    pub soft_blocks: BTreeSet<Cell>,
    pub actors: Vec<Actor>,
    pub bombs: BTreeMap<Cell, Bomb>,
    pub explosion: Explosion,
    pub powerups: BTreeMap<Cell, PowerupKind>,
    /// Soft blocks destroyed by the current fire, rolled when it clears.
    pub powerup_candidates: BTreeSet<Cell>,
    pub round: RoundState,
    pub settings: MatchSettings,
    pub timing: TimingConfig,
    pub tick: u64,
    pub debug_overlay: bool,
    pub rng: StdRng,
}

impl WorldState {
    pub fn new(settings: MatchSettings, timing: TimingConfig, seed: u64) -> Self {
        let arena = Arena::standard();
        let spawns = arena.spawn_points();
        let actors: Vec<Actor> = (0..settings.total_players)
            .map(|id| Actor::new(id, spawns[id % spawns.len()]))
            .collect();
        let round = RoundState::new(
            actors.len(),
            settings.rounds_to_win,
            settings.timer_seconds,
            timing,
        );

        let mut world = WorldState {
            arena,
            soft_blocks: BTreeSet::new(),
            actors,
            bombs: BTreeMap::new(),
            explosion: Explosion::default(),
            powerups: BTreeMap::new(),
            powerup_candidates: BTreeSet::new(),
            round,
            settings,
            timing,
            tick: 0,
            debug_overlay: false,
            rng: StdRng::seed_from_u64(seed),
        };
        world.regenerate_soft_blocks();
        world
    }

    fn regenerate_soft_blocks(&mut self) {
        let spawns: Vec<Cell> = self.actors.iter().map(|a| a.spawn).collect();
        self.soft_blocks =
            self.arena
                .generate_soft_blocks(&mut self.rng, self.settings.soft_block_percent, &spawns);
    }

    // ── Queries ──

    pub fn alive_ids(&self) -> Vec<usize> {
        self.actors.iter().filter(|a| a.alive).map(|a| a.id).collect()
    }

    pub fn is_alive(&self, id: usize) -> bool {
        self.actors.get(id).is_some_and(|a| a.alive)
    }

    pub fn burning(&self) -> &BTreeSet<Cell> {
        &self.explosion.cells
    }

    /// Burning cells plus every live bomb's future blast.
    pub fn hazard_cells(&self) -> BTreeSet<Cell> {
        let mut hazard = self.explosion.cells.clone();
        for bomb in self.bombs.values() {
            hazard.extend(bomb.blast.iter().copied());
        }
        hazard
    }

    /// AI view over the current state. `hazard` comes from `hazard_cells()`.
    pub fn nav<'a>(&'a self, hazard: &'a BTreeSet<Cell>) -> NavView<'a> {
        NavView {
            walkable: &self.arena.walkable,
            soft_blocks: &self.soft_blocks,
            burning: &self.explosion.cells,
            bombs: &self.bombs,
            hazard,
        }
    }

    // ── Mutation API (humans and bots alike) ──

    /// Move `id` by its speed along `dir`, one pixel at a time, stopping
    /// at the first blocked pixel. Unless `diagonal`, the perpendicular
    /// axis is snapped onto its lane first.
    pub fn move_actor(&mut self, id: usize, dir: Dir, diagonal: bool) {
        let map = MapView { arena: &self.arena, soft_blocks: &self.soft_blocks, bombs: &self.bombs };
        let Some(actor) = self.actors.get_mut(id) else { return };
        if !actor.alive {
            return;
        }

        if !diagonal {
            if let Some(snapped) = rules::perpendicular_snap(map.arena, actor.pos, dir) {
                actor.pos = snapped;
            }
        }

        let (dx, dy) = dir.delta();
        for _ in 0..actor.stats.speed {
            if !rules::can_step(&map, actor.pos, dir) {
                break;
            }
            actor.pos = Pos::new(actor.pos.x + dx, actor.pos.y + dy);
        }
    }

    /// One movement request toward an adjacent `target` cell.
    /// Settles exactly on it once within `speed` pixels on both axes.
    /// Returns true on arrival.
    pub fn approach(&mut self, id: usize, target: Cell) -> bool {
        let Some(actor) = self.actors.get_mut(id) else { return false };
        if !actor.alive {
            return false;
        }
        let goal = Pos::of_cell(target);
        let speed = actor.stats.speed as i32;
        let (dx, dy) = (goal.x - actor.pos.x, goal.y - actor.pos.y);

        if dx.abs() <= speed && dy.abs() <= speed {
            actor.pos = goal;
            return true;
        }

        let dir = if dx.abs() > dy.abs() {
            if dx < 0 { Dir::Left } else { Dir::Right }
        } else if dy < 0 {
            Dir::Up
        } else {
            Dir::Down
        };
        self.move_actor(id, dir, false);
        false
    }

    /// Drop a bomb on the actor's snapped cell. Silent no-op when the
    /// actor is at capacity or the cell already holds a bomb.
    pub fn place_bomb(&mut self, id: usize, events: &mut Vec<GameEvent>) -> bool {
        let Some(actor) = self.actors.get(id) else { return false };
        if !actor.alive || actor.active_bombs >= actor.stats.max_bombs {
            return false;
        }
        let cell = actor.cell();
        if self.bombs.contains_key(&cell) {
            return false;
        }

        let blast = rules::blast_walk(&self.arena, &self.soft_blocks, cell, actor.stats.blast_radius).cells;
        self.bombs.insert(
            cell,
            Bomb { owner: id, cell, fuse: self.timing.bomb_fuse_ticks as i32, blast },
        );
        self.actors[id].active_bombs += 1;
        tracing::debug!(actor = id, col = cell.col, row = cell.row, "bomb placed");
        events.push(GameEvent::BombPlaced { owner: id, cell });
        true
    }

    // ── Bombs & fire ──

    /// Detonate the bomb at `cell` against live terrain.
    pub fn detonate(&mut self, cell: Cell, events: &mut Vec<GameEvent>) {
        let Some(bomb) = self.bombs.remove(&cell) else { return };
        let owner = bomb.owner;
        let radius = self.actors.get(owner).map_or(1, |a| a.stats.blast_radius);
        if let Some(a) = self.actors.get_mut(owner) {
            a.active_bombs = a.active_bombs.saturating_sub(1);
        }

        let walk = rules::blast_walk(&self.arena, &self.soft_blocks, cell, radius);
        for hit in walk.soft_hits {
            self.soft_blocks.remove(&hit);
            self.powerup_candidates.insert(hit);
            events.push(GameEvent::SoftBlockDestroyed { cell: hit });
        }
        self.explosion.cells.extend(walk.cells);
        self.explosion.last_detonation_tick = self.tick;
        events.push(GameEvent::BombExploded { owner, cell });
    }

    /// Detonate every bomb sitting in fire, until no burning bomb is left.
    pub fn cascade_chain(&mut self, events: &mut Vec<GameEvent>) {
        loop {
            let lit: Vec<Cell> = self
                .bombs
                .keys()
                .copied()
                .filter(|c| self.explosion.cells.contains(c))
                .collect();
            if lit.is_empty() {
                break;
            }
            for cell in lit {
                self.detonate(cell, events);
            }
        }
    }

    /// Roll every pending candidate once and forget them.
    pub fn spawn_powerups(&mut self, events: &mut Vec<GameEvent>) {
        let candidates = std::mem::take(&mut self.powerup_candidates);
        for cell in candidates {
            if self.rng.gen_range(0..100u32) < self.settings.powerup_percent as u32 {
                let kind = PowerupKind::random(&mut self.rng);
                self.powerups.insert(cell, kind);
                events.push(GameEvent::PowerupSpawned { cell, kind });
            }
        }
    }

    // ── Round reset ──

    /// Fresh terrain, actors back at spawn, no bombs, fire or powerups.
    /// Round wins live in `round` and are untouched.
    pub fn reset_round(&mut self) {
        for actor in &mut self.actors {
            actor.respawn();
        }
        self.bombs.clear();
        self.explosion.clear();
        self.powerups.clear();
        self.powerup_candidates.clear();
        self.regenerate_soft_blocks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel_settings() -> MatchSettings {
        MatchSettings {
            soft_block_percent: 0,
            powerup_percent: 0,
            timer_seconds: 180,
            human_players: 2,
            total_players: 2,
            bot_types: vec![],
            rounds_to_win: 2,
        }
    }

    fn world() -> WorldState {
        WorldState::new(duel_settings(), TimingConfig::default(), 7)
    }

    fn c(col: i32, row: i32) -> Cell {
        Cell::new(col, row)
    }

    // ── Movement ──

    #[test]
    fn actors_start_on_their_spawns() {
        let w = world();
        assert_eq!(w.actors[0].pos, Pos::new(10, 10));
        assert_eq!(w.actors[1].pos, Pos::new(130, 10));
        assert_eq!(w.alive_ids(), vec![0, 1]);
    }

    #[test]
    fn move_one_pixel_per_speed_unit() {
        let mut w = world();
        w.move_actor(0, Dir::Right, false);
        assert_eq!(w.actors[0].pos, Pos::new(11, 10));
        w.actors[0].stats.speed = 3;
        w.move_actor(0, Dir::Right, false);
        assert_eq!(w.actors[0].pos, Pos::new(14, 10));
    }

    #[test]
    fn move_stops_at_soft_block() {
        let mut w = world();
        w.soft_blocks.insert(c(2, 1));
        w.actors[0].stats.speed = 4;
        w.move_actor(0, Dir::Right, false);
        assert_eq!(w.actors[0].pos, Pos::new(10, 10));
    }

    #[test]
    fn perpendicular_snap_unless_diagonal() {
        let mut w = world();
        w.actors[0].pos = Pos::new(12, 10);
        w.move_actor(0, Dir::Down, true);
        // Off-lane and not snapped: blocked.
        assert_eq!(w.actors[0].pos, Pos::new(12, 10));
        w.move_actor(0, Dir::Down, false);
        assert_eq!(w.actors[0].pos, Pos::new(10, 11));
    }

    #[test]
    fn dead_actors_do_not_move() {
        let mut w = world();
        w.actors[0].alive = false;
        w.move_actor(0, Dir::Right, false);
        assert_eq!(w.actors[0].pos, Pos::new(10, 10));
    }

    #[test]
    fn approach_walks_then_settles() {
        let mut w = world();
        let mut arrived = false;
        for _ in 0..20 {
            if w.approach(0, c(2, 1)) {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        assert_eq!(w.actors[0].pos, Pos::new(20, 10));
    }

    // ── Bombs ──

    #[test]
    fn bomb_at_capacity_is_noop() {
        let mut w = world();
        let mut ev = vec![];
        assert!(w.place_bomb(0, &mut ev));
        w.actors[0].pos = Pos::new(30, 10);
        assert!(!w.place_bomb(0, &mut ev));
        assert_eq!(w.bombs.len(), 1);
        assert_eq!(w.actors[0].active_bombs, 1);
        assert_eq!(ev.len(), 1);
    }

    #[test]
    fn bomb_on_occupied_cell_is_noop() {
        let mut w = world();
        let mut ev = vec![];
        w.actors[0].stats.max_bombs = 2;
        assert!(w.place_bomb(0, &mut ev));
        assert!(!w.place_bomb(0, &mut ev));
        assert_eq!(w.bombs.len(), 1);
        assert_eq!(w.actors[0].active_bombs, 1);
    }

    #[test]
    fn future_blast_is_stored_on_placement() {
        let mut w = world();
        let mut ev = vec![];
        w.actors[0].pos = Pos::new(30, 10);
        w.place_bomb(0, &mut ev);
        let expected: BTreeSet<Cell> = [c(2, 1), c(3, 1), c(4, 1), c(3, 2)].into_iter().collect();
        assert_eq!(w.bombs[&c(3, 1)].blast, expected);
        assert!(w.hazard_cells().contains(&c(3, 2)));
    }

    #[test]
    fn detonation_burns_exact_cells_and_marks_candidate() {
        let mut w = world();
        let mut ev = vec![];
        w.soft_blocks.insert(c(5, 1));
        w.soft_blocks.insert(c(6, 1));
        w.actors[0].pos = Pos::new(30, 10);
        w.actors[0].stats.blast_radius = 3;
        w.place_bomb(0, &mut ev);
        w.tick = 50;
        w.detonate(c(3, 1), &mut ev);

        let expected: BTreeSet<Cell> =
            [c(1, 1), c(2, 1), c(3, 1), c(4, 1), c(5, 1), c(3, 2), c(3, 3), c(3, 4)].into_iter().collect();
        assert_eq!(w.explosion.cells, expected);
        assert!(!w.soft_blocks.contains(&c(5, 1)));
        assert!(w.soft_blocks.contains(&c(6, 1)));
        assert!(w.powerup_candidates.contains(&c(5, 1)));
        assert_eq!(w.actors[0].active_bombs, 0);
        assert_eq!(w.explosion.last_detonation_tick, 50);
        assert!(w.bombs.is_empty());
    }

    #[test]
    fn cascade_detonates_bomb_in_fire() {
        let mut w = world();
        let mut ev = vec![];
        w.actors[0].pos = Pos::new(30, 10);
        w.actors[0].stats.blast_radius = 2;
        w.place_bomb(0, &mut ev);
        w.actors[1].pos = Pos::new(50, 10);
        w.place_bomb(1, &mut ev);

        w.detonate(c(3, 1), &mut ev);
        w.cascade_chain(&mut ev);
        assert!(w.bombs.is_empty());
        assert!(w.explosion.cells.contains(&c(6, 1)));
        let exploded = ev.iter().filter(|e| matches!(e, GameEvent::BombExploded { .. })).count();
        assert_eq!(exploded, 2);
    }

    #[test]
    fn hazard_keeps_overlapping_range_of_other_bomb() {
        let mut w = world();
        let mut ev = vec![];
        w.actors[0].pos = Pos::new(30, 10);
        w.place_bomb(0, &mut ev);
        w.actors[1].pos = Pos::new(50, 10);
        w.place_bomb(1, &mut ev);
        // (4,1) is in both ranges; removing one bomb keeps it hazardous.
        w.bombs.remove(&c(3, 1));
        assert!(w.hazard_cells().contains(&c(4, 1)));
    }

    #[test]
    fn powerups_spawn_on_candidates_at_full_chance() {
        let mut w = world();
        w.settings.powerup_percent = 100;
        w.powerup_candidates.insert(c(5, 1));
        let mut ev = vec![];
        w.spawn_powerups(&mut ev);
        assert!(w.powerups.contains_key(&c(5, 1)));
        assert!(w.powerup_candidates.is_empty());
    }

    #[test]
    fn reset_round_restores_start_state() {
        let mut w = world();
        let mut ev = vec![];
        w.actors[0].stats.blast_radius = 4;
        w.place_bomb(0, &mut ev);
        w.actors[1].alive = false;
        w.powerups.insert(c(3, 3), PowerupKind::Speed);
        w.explosion.cells.insert(c(1, 1));
        w.reset_round();
        assert!(w.bombs.is_empty());
        assert!(w.powerups.is_empty());
        assert!(!w.explosion.is_active());
        assert_eq!(w.alive_ids(), vec![0, 1]);
        assert_eq!(w.actors[0].stats.blast_radius, 1);
    }
}
