/// Read-only picture of one tick, handed to the presentation layer.
/// Owns its data so the renderer never borrows the live world.

use std::collections::BTreeSet;

use crate::domain::entity::{Pos, PowerupKind, Stats};
use crate::domain::grid::Cell;
use super::bots::Bots;
use super::round::Phase;
use super::world::WorldState;

#[derive(Clone, Debug)]
pub struct ActorView {
    pub id: usize,
    pub pos: Pos,
    pub cell: Cell,
    pub alive: bool,
    pub stats: Stats,
    pub is_bot: bool,
}

/// Diagnostic overlay line for one bot.
#[derive(Clone, Debug)]
pub struct BotView {
    pub id: usize,
    pub archetype: &'static str,
    pub state: &'static str,
    pub danger_radius: i32,
    pub escaping: bool,
    pub path: Vec<Cell>,
}

#[derive(Clone, Debug)]
pub struct Snapshot {
    pub cols: i32,
    pub rows: i32,
    pub walls: BTreeSet<Cell>,
    pub hard_blocks: BTreeSet<Cell>,
    pub soft_blocks: BTreeSet<Cell>,
    pub actors: Vec<ActorView>,
    pub bombs: Vec<Cell>,
    pub burning: BTreeSet<Cell>,
    pub powerups: Vec<(Cell, PowerupKind)>,
    pub phase: Phase,
    pub round_number: u32,
    pub wins: Vec<u32>,
    pub remaining_secs: u32,
    /// Whole seconds left on the pre-round countdown (rounded up).
    pub countdown_secs: u32,
    /// Round result or match result text; empty while playing.
    pub banner: String,
    /// Present only while the debug overlay is on.
    pub debug: Option<Vec<BotView>>,
}

pub fn capture(world: &WorldState, bots: &Bots) -> Snapshot {
    let fps = world.timing.fps.max(1);
    let actors = world
        .actors
        .iter()
        .map(|a| ActorView {
            id: a.id,
            pos: a.pos,
            cell: a.cell(),
            alive: a.alive,
            stats: a.stats,
            is_bot: bots.is_bot(a.id),
        })
        .collect();

    let debug = world.debug_overlay.then(|| {
        bots.bots
            .iter()
            .map(|b| BotView {
                id: b.id,
                archetype: b.archetype.as_str(),
                state: b.tag.as_str(),
                danger_radius: b.profile.danger_radius,
                escaping: b.escaping,
                path: b.path.iter().copied().collect(),
            })
            .collect()
    });

    Snapshot {
        cols: world.arena.cols,
        rows: world.arena.rows,
        walls: world.arena.walls.clone(),
        hard_blocks: world.arena.hard_blocks.clone(),
        soft_blocks: world.soft_blocks.clone(),
        actors,
        bombs: world.bombs.keys().copied().collect(),
        burning: world.explosion.cells.clone(),
        powerups: world.powerups.iter().map(|(c, k)| (*c, *k)).collect(),
        phase: world.round.phase,
        round_number: world.round.round_number,
        wins: world.round.wins.clone(),
        remaining_secs: world.round.remaining_secs(),
        countdown_secs: world.round.countdown_left.div_ceil(fps),
        banner: world.round.result_text(),
        debug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchSettings, TimingConfig};
    use crate::domain::ai::BotArchetype;

    #[test]
    fn snapshot_mirrors_world() {
        let settings = MatchSettings {
            soft_block_percent: 0,
            powerup_percent: 0,
            timer_seconds: 60,
            human_players: 1,
            total_players: 2,
            bot_types: vec![BotArchetype::Careful],
            rounds_to_win: 1,
        };
        let mut world = WorldState::new(settings, TimingConfig::default(), 1);
        let bots = Bots::new(1, &[BotArchetype::Careful], 30, 1);
        world.powerups.insert(Cell::new(3, 3), PowerupKind::Fire);

        let snap = capture(&world, &bots);
        assert_eq!((snap.cols, snap.rows), (15, 13));
        assert_eq!(snap.actors.len(), 2);
        assert!(!snap.actors[0].is_bot);
        assert!(snap.actors[1].is_bot);
        assert_eq!(snap.powerups, vec![(Cell::new(3, 3), PowerupKind::Fire)]);
        assert_eq!(snap.phase, Phase::Countdown);
        assert_eq!(snap.countdown_secs, 3);
        assert_eq!(snap.remaining_secs, 60);
        assert!(snap.banner.is_empty());
        assert!(snap.debug.is_none());

        world.debug_overlay = true;
        let snap = capture(&world, &bots);
        let debug = snap.debug.unwrap_or_default();
        assert_eq!(debug.len(), 1);
        assert_eq!(debug[0].archetype, "careful");
        assert_eq!(debug[0].danger_radius, 4);
    }
}
