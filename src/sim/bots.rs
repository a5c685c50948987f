/// Bot controller: per-bot decision state and policies.
///
/// Bots never touch world structure directly. Every action goes through
/// `WorldState::approach()` / `place_bomb()`, the same entry points
/// human input uses.
///
/// ## Per-tick order
///
///   1. Clear `escaping` once the archetype no longer senses danger.
///   2. Re-evaluate when woken (interval + chance + fire ended / new bomb
///      nearby) or when danger is sensed and not already escaping.
///   3. Next path cell turned unsafe → recover.
///   4. Next path cell is an adjacent soft block → bomb it, then escape.
///   5. Step toward the next path cell; pop it on arrival.
///
/// ## Re-evaluation (first match wins)
///
///   danger && !escaping   → escape
///   powerup policy hits   → get_powerup
///   attack policy hits    → attack
///   otherwise             → wander

use std::collections::{BTreeSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::ai::{AttackPolicy, BotArchetype, PathField, PowerupPolicy, Profile, NEW_BOMB_RADIUS};
use crate::domain::grid::Cell;
use super::event::GameEvent;
use super::world::WorldState;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BotTag {
    Wander,
    Escape,
    GetPowerup,
    Attack,
}

impl BotTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BotTag::Wander => "wander",
            BotTag::Escape => "escape",
            BotTag::GetPowerup => "get_powerup",
            BotTag::Attack => "attack",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BotState {
    pub id: usize,
    pub archetype: BotArchetype,
    pub profile: Profile,
    pub tag: BotTag,
    pub goal: Option<Cell>,
    /// Cells still to visit; the front is the next step.
    pub path: VecDeque<Cell>,
    /// Set by escape, cleared once danger is no longer sensed.
    pub escaping: bool,
}

impl BotState {
    pub fn new(id: usize, archetype: BotArchetype) -> Self {
        BotState {
            id,
            archetype,
            profile: archetype.profile(),
            tag: BotTag::Wander,
            goal: None,
            path: VecDeque::new(),
            escaping: false,
        }
    }

    fn clear(&mut self) {
        self.tag = BotTag::Wander;
        self.goal = None;
        self.path.clear();
        self.escaping = false;
    }

    fn set_route(&mut self, goal: Cell, path: Vec<Cell>) {
        self.goal = Some(goal);
        self.path = path.into();
    }
}

pub struct Bots {
    pub bots: Vec<BotState>,
    rng: StdRng,
    fps: u32,
    /// Fire and bomb layout as of the last once-per-second sample.
    prev_fire: bool,
    prev_bombs: BTreeSet<Cell>,
}

impl Bots {
    /// Bots take actor ids `first_id..`, one per archetype.
    pub fn new(first_id: usize, archetypes: &[BotArchetype], fps: u32, seed: u64) -> Self {
        let bots = archetypes
            .iter()
            .enumerate()
            .map(|(i, &a)| BotState::new(first_id + i, a))
            .collect();
        Bots {
            bots,
            rng: StdRng::seed_from_u64(seed),
            fps: fps.max(1),
            prev_fire: false,
            prev_bombs: BTreeSet::new(),
        }
    }

    pub fn is_bot(&self, id: usize) -> bool {
        self.bots.iter().any(|b| b.id == id)
    }

    pub fn get(&self, id: usize) -> Option<&BotState> {
        self.bots.iter().find(|b| b.id == id)
    }

    /// Round start: every bot back to a blank wander.
    pub fn reset(&mut self) {
        for bot in &mut self.bots {
            bot.clear();
        }
        self.prev_fire = false;
        self.prev_bombs.clear();
    }

    pub fn update(&mut self, world: &mut WorldState, events: &mut Vec<GameEvent>) {
        for i in 0..self.bots.len() {
            if !world.is_alive(self.bots[i].id) {
                self.bots[i].path.clear();
                continue;
            }
            self.tick_bot(i, world, events);
        }

        if world.tick % self.fps as u64 == 1 {
            self.prev_fire = world.explosion.is_active();
            self.prev_bombs = world.bombs.keys().copied().collect();
        }
    }

    fn tick_bot(&mut self, i: usize, world: &mut WorldState, events: &mut Vec<GameEvent>) {
        let id = self.bots[i].id;
        let cell = world.actors[id].cell();
        let radius = self.bots[i].profile.danger_radius;

        let hazard = world.hazard_cells();
        let danger = world.nav(&hazard).senses_danger(cell, radius);
        if self.bots[i].escaping && !danger {
            self.bots[i].escaping = false;
        }

        if self.woken(i, world, cell) || (danger && !self.bots[i].escaping) {
            self.reevaluate(i, world, events);
        }

        if let Some(&next) = self.bots[i].path.front() {
            let unsafe_next = {
                let hazard = world.hazard_cells();
                next != cell && world.nav(&hazard).is_unsafe_step(next)
            };
            if unsafe_next {
                self.recover(i, world);
            }
        }

        if let Some(&next) = self.bots[i].path.front() {
            if world.soft_blocks.contains(&next) && next.manhattan(cell) == 1 {
                world.place_bomb(id, events);
                if world.bombs.contains_key(&cell) {
                    self.escape(i, world);
                }
            }
        }

        if let Some(&next) = self.bots[i].path.front() {
            if world.approach(id, next) {
                self.bots[i].path.pop_front();
            }
        }

        if self.bots[i].goal.is_none() {
            self.wander(i, world);
        }
    }

    /// Interval roll plus a reason to look again.
    fn woken(&mut self, i: usize, world: &WorldState, cell: Cell) -> bool {
        let profile = self.bots[i].profile;
        if world.tick % profile.reeval_ticks(self.fps) != 0 {
            return false;
        }
        if self.rng.gen_range(0..100u32) >= profile.chance_percent {
            return false;
        }
        if self.bots[i].path.is_empty() {
            self.wander(i, world);
        }

        let fire_ended = self.prev_fire && !world.explosion.is_active();
        let new_bomb_near = world
            .bombs
            .keys()
            .any(|b| !self.prev_bombs.contains(b) && b.chebyshev(cell) <= NEW_BOMB_RADIUS);
        fire_ended || new_bomb_near
    }

    pub fn reevaluate(&mut self, i: usize, world: &mut WorldState, events: &mut Vec<GameEvent>) {
        let id = self.bots[i].id;
        let cell = world.actors[id].cell();
        let hazard = world.hazard_cells();
        let danger = world.nav(&hazard).senses_danger(cell, self.bots[i].profile.danger_radius);

        if danger && !self.bots[i].escaping {
            self.escape(i, world);
        } else if self.must_obtain_powerup(i, world) {
            self.get_powerup(i, world);
        } else if self.must_attack(i, world) {
            self.attack(i, world, events);
        } else {
            self.wander(i, world);
        }
        tracing::debug!(
            bot = id,
            archetype = self.bots[i].archetype.as_str(),
            state = self.bots[i].tag.as_str(),
            goal = ?self.bots[i].goal,
            "bot re-evaluated"
        );
    }

    /// The next step just became unsafe.
    fn recover(&mut self, i: usize, world: &WorldState) {
        let bot = &self.bots[i];
        if bot.escaping {
            self.escape(i, world);
            return;
        }
        match (bot.tag, bot.goal) {
            (BotTag::GetPowerup | BotTag::Attack, Some(goal)) => {
                let cell = world.actors[bot.id].cell();
                let hazard = world.hazard_cells();
                let path = PathField::search(&world.nav(&hazard), cell, false).path_to(goal);
                if path.is_empty() {
                    self.wander(i, world);
                } else {
                    self.bots[i].set_route(goal, path);
                }
            }
            _ => self.wander(i, world),
        }
    }

    // ── Actions ──

    /// Random reachable safe goal.
    fn wander(&mut self, i: usize, world: &WorldState) {
        let bot = &self.bots[i];
        let cell = world.actors[bot.id].cell();
        let hazard = world.hazard_cells();
        let nav = world.nav(&hazard);
        let field = PathField::search(&nav, cell, bot.escaping);

        let mut goals: Vec<Cell> = nav.safe_goals().filter(|g| field.reaches(*g)).collect();
        goals.shuffle(&mut self.rng);

        let bot = &mut self.bots[i];
        bot.tag = BotTag::Wander;
        match goals.first() {
            Some(&goal) => bot.set_route(goal, field.path_to(goal)),
            None => {
                // Nowhere to go: hold position until the next wake-up.
                bot.goal = Some(cell);
                bot.path.clear();
            }
        }
    }

    /// Run for a reachable safe cell, avoiding soft blocks.
    fn escape(&mut self, i: usize, world: &WorldState) {
        self.bots[i].escaping = true;
        let bot = &self.bots[i];
        let radius = bot.profile.danger_radius;
        let cell = world.actors[bot.id].cell();
        let hazard = world.hazard_cells();
        let nav = world.nav(&hazard);
        let field = PathField::search(&nav, cell, true);

        let mut goals: Vec<Cell> = nav.safe_goals().filter(|g| field.reaches(*g)).collect();
        goals.shuffle(&mut self.rng);
        // Cells the archetype itself would call calm come first.
        goals.sort_by_key(|g| nav.senses_danger(*g, radius));

        match goals.first() {
            Some(&goal) => {
                let path = field.path_to(goal);
                let bot = &mut self.bots[i];
                bot.tag = BotTag::Escape;
                bot.set_route(goal, path);
                tracing::debug!(bot = bot.id, col = goal.col, row = goal.row, "bot escaping");
            }
            None => self.wander(i, world),
        }
    }

    fn get_powerup(&mut self, i: usize, world: &WorldState) {
        let bot = &mut self.bots[i];
        bot.tag = BotTag::GetPowerup;
        let cell = world.actors[bot.id].cell();
        if bot.path.is_empty() || bot.goal == Some(cell) {
            self.wander(i, world);
        }
    }

    /// Bomb when an opponent is within range; escape if it landed.
    fn attack(&mut self, i: usize, world: &mut WorldState, events: &mut Vec<GameEvent>) {
        self.bots[i].tag = BotTag::Attack;
        if self.bots[i].path.is_empty() {
            self.wander(i, world);
            return;
        }

        let id = self.bots[i].id;
        let cell = world.actors[id].cell();
        let range = self.bots[i].profile.bomb_range;
        let in_range = world
            .actors
            .iter()
            .filter(|a| a.alive && a.id != id)
            .any(|a| a.cell().manhattan(cell) <= range);
        if in_range {
            world.place_bomb(id, events);
            if world.bombs.contains_key(&cell) {
                tracing::debug!(bot = id, "attack bomb placed");
                self.escape(i, world);
            }
        }
    }

    // ── Policies ──

    /// Powerup worth chasing? Sets goal and path when it is.
    fn must_obtain_powerup(&mut self, i: usize, world: &WorldState) -> bool {
        if world.powerups.is_empty() {
            return false;
        }
        let bot = &self.bots[i];
        let cell = world.actors[bot.id].cell();
        let hazard = world.hazard_cells();
        let field = PathField::search(&world.nav(&hazard), cell, bot.escaping);

        let mut candidates: Vec<Cell> = world.powerups.keys().copied().collect();
        match bot.profile.powerup {
            PowerupPolicy::Nearest => {
                candidates.sort_by_key(|c| c.manhattan(cell));
            }
            PowerupPolicy::RandomWithin { radius, try_percent } => {
                if self.rng.gen_range(0..100u32) >= try_percent {
                    return false;
                }
                candidates.retain(|c| c.manhattan(cell) <= radius);
                candidates.shuffle(&mut self.rng);
            }
        }

        match candidates.into_iter().find(|c| field.reaches(*c)) {
            Some(goal) => {
                self.bots[i].set_route(goal, field.path_to(goal));
                true
            }
            None => false,
        }
    }

    /// Opponent worth chasing? Sets goal and path when it is.
    fn must_attack(&mut self, i: usize, world: &WorldState) -> bool {
        let bot = &self.bots[i];
        let cell = world.actors[bot.id].cell();
        let mut targets: Vec<Cell> = world
            .actors
            .iter()
            .filter(|a| a.alive && a.id != bot.id)
            .map(|a| a.cell())
            .collect();
        if targets.is_empty() {
            return false;
        }

        let hazard = world.hazard_cells();
        let field = PathField::search(&world.nav(&hazard), cell, bot.escaping);
        match bot.profile.attack {
            AttackPolicy::FirstWithin { radius } => {
                targets.retain(|t| t.manhattan(cell) <= radius);
            }
            AttackPolicy::RandomReachable => {
                targets.shuffle(&mut self.rng);
            }
        }

        match targets.into_iter().find(|t| field.reaches(*t)) {
            Some(goal) => {
                self.bots[i].set_route(goal, field.path_to(goal));
                true
            }
            None => false,
        }
    }
}
