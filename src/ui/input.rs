/// Input state tracker and key bindings.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement while a key is held
///   - Edge-triggered bombs (only fire on initial press)
///   - Two players sharing one keyboard
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};

use crate::domain::entity::ActorIntent;
use crate::sim::step::TickInput;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// One human player's keys.
#[derive(Clone, Debug)]
pub struct KeyBindings {
    pub up: Vec<KeyCode>,
    pub down: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub bomb: Vec<KeyCode>,
}

impl KeyBindings {
    /// Player 1: arrows + Space.
    pub fn player_one() -> Self {
        KeyBindings {
            up: vec![KeyCode::Up],
            down: vec![KeyCode::Down],
            left: vec![KeyCode::Left],
            right: vec![KeyCode::Right],
            bomb: vec![KeyCode::Char(' ')],
        }
    }

    /// Player 2: WASD + X.
    pub fn player_two() -> Self {
        KeyBindings {
            up: vec![KeyCode::Char('w'), KeyCode::Char('W')],
            down: vec![KeyCode::Char('s'), KeyCode::Char('S')],
            left: vec![KeyCode::Char('a'), KeyCode::Char('A')],
            right: vec![KeyCode::Char('d'), KeyCode::Char('D')],
            bomb: vec![KeyCode::Char('x'), KeyCode::Char('X')],
        }
    }
}

const SKIP_KEYS: [KeyCode; 2] = [KeyCode::Esc, KeyCode::Enter];
const DEBUG_KEYS: [KeyCode; 1] = [KeyCode::Tab];
const QUIT_KEYS: [KeyCode; 2] = [KeyCode::Char('q'), KeyCode::Char('Q')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call. Used for edge-triggered actions (bomb, skip).
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,

    bindings: Vec<KeyBindings>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
            bindings: vec![KeyBindings::player_one(), KeyBindings::player_two()],
        }
    }

    /// Ask the terminal for Release events. Call after raw mode is on.
    pub fn enable_release_events(&mut self) {
        if matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            self.honor_release = execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        }
        tracing::debug!(honor_release = self.honor_release, "keyboard enhancement");
    }

    pub fn disable_release_events(&mut self) -> io::Result<()> {
        if self.honor_release {
            self.honor_release = false;
            execute!(io::stdout(), PopKeyboardEnhancementFlags)?;
        }
        Ok(())
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key);
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without confirmed enhancement, rely on timeout-based expiry.
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, Instant::now());
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    pub fn quit_requested(&self) -> bool {
        self.ctrl_c_pressed() || self.any_pressed(&QUIT_KEYS)
    }

    /// Intent for human player `player` (0-based).
    pub fn intent(&self, player: usize) -> ActorIntent {
        let Some(b) = self.bindings.get(player) else { return ActorIntent::default() };
        ActorIntent {
            up: self.any_held(&b.up),
            down: self.any_held(&b.down),
            left: self.any_held(&b.left),
            right: self.any_held(&b.right),
            bomb: self.any_pressed(&b.bomb),
        }
    }

    /// Everything the simulation needs for one tick.
    pub fn tick_input(&self, human_players: usize) -> TickInput {
        TickInput {
            intents: (0..human_players).map(|p| self.intent(p)).collect(),
            skip: self.any_pressed(&SKIP_KEYS),
            toggle_debug: self.any_pressed(&DEBUG_KEYS),
        }
    }

    /// Fold this frame into `pending`. Edge-triggered presses stick until the
    /// next simulation tick takes them; held directions are always current.
    pub fn latch(&self, pending: &mut TickInput, human_players: usize) {
        let now = self.tick_input(human_players);
        pending.intents.resize(human_players, ActorIntent::default());
        for (p, i) in pending.intents.iter_mut().zip(now.intents) {
            let bomb = p.bomb || i.bomb;
            *p = ActorIntent { bomb, ..i };
        }
        pending.skip |= now.skip;
        pending.toggle_debug |= now.toggle_debug;
    }
}
