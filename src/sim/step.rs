/// The step function: advances the world by one tick.
///
/// Phase dispatch:
///   Countdown  → count down (or skip), then go live
///   Active     → the pipeline below
///   RoundEnd   → hold the result (or skip), then reset or end the match
///   MatchOver  → nothing, ever again
///
/// Active processing order:
///   1. Human intents (up, down, left, right, bomb)
///   2. Bots
///   3. Explosions (chain detonations, victims, powerups in fire, expiry)
///   4. Fuses
///   5. Powerup pickups
///   6. Round-end check

use crate::domain::entity::ActorIntent;
use crate::domain::grid::{Cell, Dir};
use super::bots::Bots;
use super::event::GameEvent;
use super::round::{Advance, Phase};
use super::world::WorldState;

/// Everything the driver feeds into one tick.
#[derive(Clone, Debug, Default)]
pub struct TickInput {
    /// Indexed by actor id; only human ids are read.
    pub intents: Vec<ActorIntent>,
    pub skip: bool,
    pub toggle_debug: bool,
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, bots: &mut Bots, input: &TickInput) -> Vec<GameEvent> {
    if world.round.phase == Phase::MatchOver {
        return vec![];
    }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    match world.round.phase {
        Phase::Countdown => resolve_countdown(world, input.skip, &mut events),
        Phase::Active => {
            if input.toggle_debug {
                world.debug_overlay = !world.debug_overlay;
            }
            world.round.tick_active();
            resolve_human_intents(world, bots, &input.intents, &mut events);
            bots.update(world, &mut events);
            resolve_explosions(world, &mut events);
            resolve_fuses(world, &mut events);
            resolve_pickups(world, &mut events);
            resolve_round_end(world, &mut events);
        }
        Phase::RoundEnd => resolve_transition(world, bots, input.skip, &mut events),
        Phase::MatchOver => {}
    }

    events
}

// ══════════════════════════════════════════════════════════════
// Countdown / transition
// ══════════════════════════════════════════════════════════════

fn resolve_countdown(world: &mut WorldState, skip: bool, events: &mut Vec<GameEvent>) {
    let live = if skip {
        world.round.skip_countdown();
        true
    } else {
        world.round.tick_countdown()
    };
    if live {
        let round = world.round.round_number;
        tracing::info!(round, "round started");
        events.push(GameEvent::RoundStarted { round });
    }
}

fn resolve_transition(world: &mut WorldState, bots: &mut Bots, skip: bool, events: &mut Vec<GameEvent>) {
    let skipped = if skip { world.round.skip_transition() } else { None };
    let advance = match skipped {
        Some(a) => Some(a),
        None => world.round.tick_transition(),
    };

    match advance {
        Some(Advance::NextRound) => {
            world.reset_round();
            bots.reset();
            world.round.start_next_round();
            tracing::info!(round = world.round.round_number, "next round");
        }
        Some(Advance::MatchOver) => {
            if let Some(winner) = world.round.match_winner {
                tracing::info!(winner = winner + 1, wins = ?world.round.wins, "match over");
                events.push(GameEvent::MatchWon { winner });
            }
        }
        None => {}
    }
}

// ══════════════════════════════════════════════════════════════
// 1. Human intents
// ══════════════════════════════════════════════════════════════

fn resolve_human_intents(
    world: &mut WorldState,
    bots: &Bots,
    intents: &[ActorIntent],
    events: &mut Vec<GameEvent>,
) {
    for (id, intent) in intents.iter().enumerate().take(world.settings.human_players) {
        if bots.is_bot(id) || !world.is_alive(id) {
            continue;
        }
        let diagonal = intent.is_diagonal();
        let held = [
            (intent.up, Dir::Up),
            (intent.down, Dir::Down),
            (intent.left, Dir::Left),
            (intent.right, Dir::Right),
        ];
        for (pressed, dir) in held {
            if pressed {
                world.move_actor(id, dir, diagonal);
            }
        }
        if intent.bomb {
            world.place_bomb(id, events);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// 3. Explosions
// ══════════════════════════════════════════════════════════════

fn resolve_explosions(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if !world.explosion.is_active() {
        return;
    }

    world.cascade_chain(events);

    for actor in world.actors.iter_mut().filter(|a| a.alive) {
        let cell = actor.cell();
        if world.explosion.cells.contains(&cell) {
            actor.alive = false;
            tracing::info!(actor = actor.id, col = cell.col, row = cell.row, "actor eliminated");
            events.push(GameEvent::ActorEliminated { id: actor.id, cell });
        }
    }

    let burnt: Vec<Cell> = world
        .powerups
        .keys()
        .copied()
        .filter(|c| world.explosion.cells.contains(c))
        .collect();
    for cell in burnt {
        world.powerups.remove(&cell);
        events.push(GameEvent::PowerupDestroyed { cell });
    }

    if world.explosion.expired(world.tick, world.timing.explosion_ticks) {
        world.explosion.clear();
        world.spawn_powerups(events);
    }
}

// ══════════════════════════════════════════════════════════════
// 4. Fuses
// ══════════════════════════════════════════════════════════════

fn resolve_fuses(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let due: Vec<Cell> = world
        .bombs
        .values()
        .filter(|b| b.fuse <= 0)
        .map(|b| b.cell)
        .collect();
    if !due.is_empty() {
        for cell in due {
            world.detonate(cell, events);
        }
        // Bombs caught by these blasts go off this tick too.
        world.cascade_chain(events);
    }

    for bomb in world.bombs.values_mut() {
        bomb.fuse -= 1;
    }
}

// ══════════════════════════════════════════════════════════════
// 5. Pickups
// ══════════════════════════════════════════════════════════════

fn resolve_pickups(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    for actor in world.actors.iter_mut().filter(|a| a.alive) {
        if let Some(kind) = world.powerups.remove(&actor.cell()) {
            kind.apply(&mut actor.stats);
            tracing::info!(actor = actor.id, powerup = kind.as_str(), "powerup collected");
            events.push(GameEvent::PowerupCollected { id: actor.id, kind });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// 6. Round end
// ══════════════════════════════════════════════════════════════

fn resolve_round_end(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let alive = world.alive_ids();
    let Some(result) = world.round.check_round_end(&alive) else { return };

    world.round.begin_transition(result);
    let round = world.round.round_number;
    tracing::info!(round, result = %world.round.result_text(), "round over");
    events.push(GameEvent::RoundEnded { round, result });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchSettings, TimingConfig};
    use crate::domain::entity::Pos;
    use crate::sim::round::RoundResult;

    fn duel(powerup_percent: u8) -> (WorldState, Bots) {
        let settings = MatchSettings {
            soft_block_percent: 0,
            powerup_percent,
            timer_seconds: 180,
            human_players: 2,
            total_players: 2,
            bot_types: vec![],
            rounds_to_win: 2,
        };
        let timing = TimingConfig::default();
        (WorldState::new(settings, timing, 3), Bots::new(2, &[], timing.fps, 3))
    }

    fn idle() -> TickInput {
        TickInput::default()
    }

    fn skip() -> TickInput {
        TickInput { skip: true, ..Default::default() }
    }

    fn bomb_for(id: usize) -> TickInput {
        let mut intents = vec![ActorIntent::default(); 2];
        intents[id].bomb = true;
        TickInput { intents, ..Default::default() }
    }

    fn c(col: i32, row: i32) -> Cell {
        Cell::new(col, row)
    }

    /// Run idle ticks until `phase` is reached; returns all events seen.
    fn run_until(world: &mut WorldState, bots: &mut Bots, phase: Phase, limit: usize) -> Vec<GameEvent> {
        let mut all = vec![];
        for _ in 0..limit {
            if world.round.phase == phase {
                break;
            }
            all.extend(step(world, bots, &idle()));
        }
        assert_eq!(world.round.phase, phase, "phase not reached in {limit} ticks");
        all
    }

    /// Player 1 bombs player 2 in place and steps back to safety.
    fn p1_bombs_p2(world: &mut WorldState, bots: &mut Bots) -> Vec<GameEvent> {
        world.actors[0].pos = Pos::of_cell(c(12, 1));
        let mut ev = step(world, bots, &bomb_for(0));
        assert!(world.bombs.contains_key(&c(12, 1)));
        world.actors[0].pos = Pos::of_cell(c(1, 1));
        ev.extend(run_until(world, bots, Phase::RoundEnd, 300));
        ev
    }

    #[test]
    fn countdown_blocks_movement() {
        let (mut world, mut bots) = duel(0);
        let mut intents = vec![ActorIntent::default(); 2];
        intents[0].right = true;
        step(&mut world, &mut bots, &TickInput { intents, ..Default::default() });
        assert_eq!(world.round.phase, Phase::Countdown);
        assert_eq!(world.actors[0].pos, Pos::new(10, 10));
    }

    #[test]
    fn countdown_expires_into_active() {
        let (mut world, mut bots) = duel(0);
        let ev = run_until(&mut world, &mut bots, Phase::Active, 200);
        assert!(ev.contains(&GameEvent::RoundStarted { round: 1 }));
        assert!(world.tick >= world.timing.countdown_ticks as u64);
    }

    #[test]
    fn humans_move_while_active() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        let mut intents = vec![ActorIntent::default(); 2];
        intents[0].right = true;
        intents[1].down = true;
        step(&mut world, &mut bots, &TickInput { intents, ..Default::default() });
        assert_eq!(world.actors[0].pos, Pos::new(11, 10));
        assert_eq!(world.actors[1].pos, Pos::new(130, 11));
    }

    #[test]
    fn two_round_sweep_ends_the_match() {
        let (mut world, mut bots) = duel(0);

        // Round 1.
        step(&mut world, &mut bots, &skip());
        let ev = p1_bombs_p2(&mut world, &mut bots);
        assert!(ev.contains(&GameEvent::ActorEliminated { id: 1, cell: c(13, 1) }));
        assert!(ev.contains(&GameEvent::RoundEnded { round: 1, result: RoundResult::Winner(0) }));
        assert_eq!(world.round.result_text(), "Player 1 wins the round");
        assert_eq!(world.round.wins, vec![1, 0]);

        // Skip the hold: fresh round, wins kept.
        step(&mut world, &mut bots, &skip());
        assert_eq!(world.round.phase, Phase::Countdown);
        assert_eq!(world.round.round_number, 2);
        assert_eq!(world.round.wins, vec![1, 0]);
        assert_eq!(world.alive_ids(), vec![0, 1]);
        assert!(world.bombs.is_empty());
        assert!(!world.explosion.is_active());

        // Round 2.
        step(&mut world, &mut bots, &skip());
        p1_bombs_p2(&mut world, &mut bots);
        assert_eq!(world.round.wins, vec![2, 0]);
        assert_eq!(world.round.result_text(), "Player 1 wins the match");

        // Skip no longer advances; the hold runs out into MatchOver.
        step(&mut world, &mut bots, &skip());
        assert_eq!(world.round.phase, Phase::RoundEnd);
        let ev = run_until(&mut world, &mut bots, Phase::MatchOver, 200);
        assert!(ev.contains(&GameEvent::MatchWon { winner: 0 }));

        // Terminal: no round 3, nothing moves.
        let tick = world.tick;
        for _ in 0..50 {
            assert!(step(&mut world, &mut bots, &skip()).is_empty());
        }
        assert_eq!(world.round.round_number, 2);
        assert_eq!(world.tick, tick);
    }

    #[test]
    fn simultaneous_elimination_is_a_draw() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        world.explosion.cells.insert(c(1, 1));
        world.explosion.cells.insert(c(13, 1));
        world.explosion.last_detonation_tick = world.tick;
        let ev = step(&mut world, &mut bots, &idle());
        assert_eq!(world.alive_ids(), Vec::<usize>::new());
        assert!(ev.contains(&GameEvent::RoundEnded { round: 1, result: RoundResult::Draw }));
        assert_eq!(world.round.result_text(), "Draw");
    }

    #[test]
    fn chain_reaction_in_same_tick() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        let mut ev = vec![];
        world.actors[0].pos = Pos::of_cell(c(3, 1));
        world.actors[0].stats.blast_radius = 2;
        world.place_bomb(0, &mut ev);
        world.actors[1].pos = Pos::of_cell(c(5, 1));
        world.place_bomb(1, &mut ev);
        world.actors[0].pos = Pos::of_cell(c(1, 11));
        world.actors[1].pos = Pos::of_cell(c(13, 11));

        if let Some(b) = world.bombs.get_mut(&c(3, 1)) {
            b.fuse = 0;
        }
        let ev = step(&mut world, &mut bots, &idle());
        assert!(world.bombs.is_empty());
        let exploded = ev.iter().filter(|e| matches!(e, GameEvent::BombExploded { .. })).count();
        assert_eq!(exploded, 2);
        assert!(world.explosion.cells.contains(&c(6, 1)));
    }

    #[test]
    fn fuse_runs_its_full_length() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        step(&mut world, &mut bots, &bomb_for(0));
        world.actors[0].pos = Pos::of_cell(c(1, 5));
        // The placement tick already burned one unit of fuse.
        let fuse = world.timing.bomb_fuse_ticks;
        for _ in 0..fuse - 1 {
            step(&mut world, &mut bots, &idle());
            assert!(world.bombs.contains_key(&c(1, 1)));
        }
        let ev = step(&mut world, &mut bots, &idle());
        assert!(ev.contains(&GameEvent::BombExploded { owner: 0, cell: c(1, 1) }));
        assert_eq!(world.actors[0].active_bombs, 0);
    }

    #[test]
    fn destroyed_soft_block_yields_powerup_at_full_chance() {
        let (mut world, mut bots) = duel(100);
        step(&mut world, &mut bots, &skip());
        world.soft_blocks.insert(c(3, 1));
        world.actors[0].pos = Pos::of_cell(c(2, 1));
        step(&mut world, &mut bots, &bomb_for(0));
        world.actors[0].pos = Pos::of_cell(c(1, 11));

        let mut spawned = None;
        for _ in 0..200 {
            for e in step(&mut world, &mut bots, &idle()) {
                if let GameEvent::PowerupSpawned { cell, kind } = e {
                    spawned = Some((cell, kind));
                }
            }
            if spawned.is_some() {
                break;
            }
        }
        let (cell, kind) = spawned.unwrap_or((c(0, 0), crate::domain::entity::PowerupKind::Fire));
        assert_eq!(cell, c(3, 1));
        assert_eq!(world.powerups.get(&c(3, 1)), Some(&kind));
        assert!(!world.soft_blocks.contains(&c(3, 1)));
        assert!(!world.explosion.is_active());
    }

    #[test]
    fn walking_onto_powerup_applies_it() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        world.powerups.insert(c(1, 1), crate::domain::entity::PowerupKind::Bomb);
        let ev = step(&mut world, &mut bots, &idle());
        assert!(world.powerups.is_empty());
        assert_eq!(world.actors[0].stats.max_bombs, 2);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::PowerupCollected { id: 0, .. })));
    }

    #[test]
    fn fire_destroys_powerups() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        world.powerups.insert(c(5, 5), crate::domain::entity::PowerupKind::Speed);
        world.explosion.cells.insert(c(5, 5));
        world.explosion.last_detonation_tick = world.tick;
        step(&mut world, &mut bots, &idle());
        assert!(world.powerups.is_empty());
    }

    #[test]
    fn debug_toggle_flips_overlay() {
        let (mut world, mut bots) = duel(0);
        step(&mut world, &mut bots, &skip());
        step(&mut world, &mut bots, &TickInput { toggle_debug: true, ..Default::default() });
        assert!(world.debug_overlay);
    }

    #[test]
    fn bots_play_a_whole_match_without_panicking() {
        use crate::domain::ai::BotArchetype;
        let settings = MatchSettings {
            soft_block_percent: 50,
            powerup_percent: 50,
            timer_seconds: 30,
            human_players: 1,
            total_players: 4,
            bot_types: vec![BotArchetype::Hostile, BotArchetype::Careful, BotArchetype::Greedy],
            rounds_to_win: 1,
        };
        let timing = TimingConfig::default();
        let mut world = WorldState::new(settings, timing, 99);
        let mut bots = Bots::new(1, &[BotArchetype::Hostile, BotArchetype::Careful, BotArchetype::Greedy], timing.fps, 99);
        let mut over = false;
        // 30 s round + countdown + grace + hold, with margin.
        for _ in 0..(30 * 30 + 400) {
            step(&mut world, &mut bots, &idle());
            if world.round.phase == Phase::MatchOver || world.round.phase == Phase::RoundEnd {
                over = true;
            }
        }
        assert!(over);
        for a in &world.actors {
            assert!(a.pos.x >= 10 && a.pos.y >= 10);
            assert!(a.pos.x <= 130 && a.pos.y <= 110);
        }
    }
}
