/// Round / match lifecycle.
///
/// ```text
///   Countdown ──(timer | skip)──▶ Active ──(round over)──▶ RoundEnd
///       ▲                                                    │
///       └──────────(timer | skip, match not won)─────────────┤
///                                                            ▼
///                                          (timer, match won) MatchOver
/// ```
///
/// All timers are tick counters. MatchOver is terminal.

use crate::config::TimingConfig;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Countdown,
    Active,
    RoundEnd,
    MatchOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoundResult {
    Winner(usize),
    Draw,
}

/// What the end of a transition leads to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Advance {
    NextRound,
    MatchOver,
}

#[derive(Clone, Debug)]
pub struct RoundState {
    pub phase: Phase,
    pub round_number: u32,
    /// Round wins per actor id. Survives round resets.
    pub wins: Vec<u32>,
    pub rounds_to_win: u32,
    pub result: Option<RoundResult>,
    pub match_winner: Option<usize>,
    pub countdown_left: u32,
    pub transition_left: u32,
    pub grace_left: u32,
    pub active_ticks: u64,
    starting_actors: usize,
    timer_seconds: u32,
    timing: TimingConfig,
}

impl RoundState {
    pub fn new(players: usize, rounds_to_win: u32, timer_seconds: u32, timing: TimingConfig) -> Self {
        RoundState {
            phase: Phase::Countdown,
            round_number: 1,
            wins: vec![0; players],
            rounds_to_win,
            result: None,
            match_winner: None,
            countdown_left: timing.countdown_ticks,
            transition_left: 0,
            grace_left: timing.grace_ticks,
            active_ticks: 0,
            starting_actors: players,
            timer_seconds,
            timing,
        }
    }

    // ── Countdown ──

    /// One countdown tick. Returns true when the round just went live.
    pub fn tick_countdown(&mut self) -> bool {
        if self.phase != Phase::Countdown {
            return false;
        }
        self.countdown_left = self.countdown_left.saturating_sub(1);
        if self.countdown_left == 0 {
            self.phase = Phase::Active;
            return true;
        }
        false
    }

    pub fn skip_countdown(&mut self) {
        if self.phase == Phase::Countdown {
            self.countdown_left = 0;
            self.phase = Phase::Active;
        }
    }

    // ── Active ──

    pub fn tick_active(&mut self) {
        self.active_ticks += 1;
    }

    /// Whole seconds left on the round clock.
    pub fn remaining_secs(&self) -> u32 {
        let elapsed = self.active_ticks / self.timing.fps.max(1) as u64;
        (self.timer_seconds as u64).saturating_sub(elapsed) as u32
    }

    /// Decide whether the round is over given the ids still alive.
    ///
    /// ┌──────────────────────────────┬────────────────────────────────┐
    /// │ time up, one alive           │ that actor wins                │
    /// │ time up, otherwise           │ draw                           │
    /// │ nobody alive                 │ draw, immediately              │
    /// │ one alive, grace running     │ keep going, grace - 1          │
    /// │ one alive, grace spent       │ that actor wins                │
    /// └──────────────────────────────┴────────────────────────────────┘
    pub fn check_round_end(&mut self, alive: &[usize]) -> Option<RoundResult> {
        let last_standing = alive.len() == 1 && self.starting_actors > 1;

        if self.remaining_secs() == 0 || alive.is_empty() {
            return Some(if last_standing { RoundResult::Winner(alive[0]) } else { RoundResult::Draw });
        }
        if last_standing {
            if self.grace_left > 0 {
                self.grace_left -= 1;
                return None;
            }
            return Some(RoundResult::Winner(alive[0]));
        }
        None
    }

    // ── Transition ──

    /// Record the result, bump the winner's count, start the hold.
    pub fn begin_transition(&mut self, result: RoundResult) {
        self.result = Some(result);
        if let RoundResult::Winner(id) = result {
            if let Some(w) = self.wins.get_mut(id) {
                *w += 1;
                if *w >= self.rounds_to_win {
                    self.match_winner = Some(id);
                }
            }
        }
        self.transition_left = self.timing.transition_ticks;
        self.phase = Phase::RoundEnd;
    }

    /// One transition tick. `Some` once the hold is over.
    pub fn tick_transition(&mut self) -> Option<Advance> {
        if self.phase != Phase::RoundEnd {
            return None;
        }
        self.transition_left = self.transition_left.saturating_sub(1);
        if self.transition_left == 0 {
            return Some(self.advance());
        }
        None
    }

    /// Manual skip of the hold. A no-op once the match is decided.
    pub fn skip_transition(&mut self) -> Option<Advance> {
        if self.phase != Phase::RoundEnd || self.match_winner.is_some() {
            return None;
        }
        self.transition_left = 0;
        Some(self.advance())
    }

    fn advance(&mut self) -> Advance {
        if self.match_winner.is_some() {
            self.phase = Phase::MatchOver;
            Advance::MatchOver
        } else {
            Advance::NextRound
        }
    }

    /// Per-round counters back to start; wins are kept.
    pub fn start_next_round(&mut self) {
        self.round_number += 1;
        self.result = None;
        self.countdown_left = self.timing.countdown_ticks;
        self.grace_left = self.timing.grace_ticks;
        self.active_ticks = 0;
        self.phase = Phase::Countdown;
    }

    /// Banner text for the transition / match-over screens.
    pub fn result_text(&self) -> String {
        if let Some(id) = self.match_winner {
            return format!("Player {} wins the match", id + 1);
        }
        match self.result {
            Some(RoundResult::Winner(id)) => format!("Player {} wins the round", id + 1),
            Some(RoundResult::Draw) => "Draw".to_string(),
            None => String::new(),
        }
    }
}
