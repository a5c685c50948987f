/// Events emitted during a simulation step.
/// Returned from every step. The renderer reads the snapshot instead.

use crate::domain::entity::PowerupKind;
use crate::domain::grid::Cell;
use super::round::RoundResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    BombPlaced { owner: usize, cell: Cell },
    BombExploded { owner: usize, cell: Cell },
    SoftBlockDestroyed { cell: Cell },
    ActorEliminated { id: usize, cell: Cell },
    PowerupSpawned { cell: Cell, kind: PowerupKind },
    PowerupDestroyed { cell: Cell },
    PowerupCollected { id: usize, kind: PowerupKind },
    RoundStarted { round: u32 },
    RoundEnded { round: u32, result: RoundResult },
    MatchWon { winner: usize },
}
