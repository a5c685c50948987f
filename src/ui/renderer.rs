/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Glyph)
///   2. Compare each glyph with `back` buffer (previous frame)
///   3. Only emit terminal commands for glyphs that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The renderer only ever sees a `Snapshot`; it never touches the world.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::PowerupKind;
use crate::domain::grid::Cell;
use crate::sim::round::Phase;
use crate::sim::snapshot::{ActorView, BotView, Snapshot};

// ── Glyph: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Glyph {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Glyph {
    /// Explicit dark background for all "empty" terminal cells. Using the
    /// same RGB for `Clear(ClearType::All)` and every glyph keeps VTE
    /// terminals from showing gap lines between rows.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Glyph = Glyph { ch: ' ', fg: Color::White, bg: Glyph::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Glyph = Glyph { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Glyph { ch, fg, bg: Self::norm_bg(bg) }
    }
}

// ── FrameBuffer: a 2D grid of Glyphs ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Glyph>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Glyph::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Glyph::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Glyph::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, g: Glyph) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = g;
        }
    }

    fn get(&self, x: usize, y: usize) -> Glyph {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Glyph::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Glyph::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Glyph::new(' ', Color::White, bg));
        }
    }
}

// ── Palette ──

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const WALL: (Color, Color) = (Color::Rgb { r: 120, g: 120, b: 120 }, Color::Rgb { r: 70, g: 70, b: 70 });
const SOFT: (Color, Color) = (Color::Rgb { r: 180, g: 120, b: 60 }, Color::Rgb { r: 100, g: 65, b: 30 });
const FIRE: (Color, Color) = (Color::Rgb { r: 255, g: 220, b: 80 }, Color::Rgb { r: 200, g: 70, b: 0 });
const BOMB_FG: Color = Color::Rgb { r: 230, g: 230, b: 230 };
const BANNER: Color = Color::Rgb { r: 255, g: 220, b: 50 };

const PLAYER_COLORS: [Color; 4] = [
    Color::Rgb { r: 255, g: 255, b: 255 },
    Color::Rgb { r: 80, g: 255, b: 80 },
    Color::Rgb { r: 100, g: 200, b: 255 },
    Color::Rgb { r: 255, g: 100, b: 200 },
];

fn player_color(id: usize) -> Color {
    PLAYER_COLORS[id % PLAYER_COLORS.len()]
}

fn powerup_glyph(kind: PowerupKind) -> (char, Color) {
    match kind {
        PowerupKind::Fire => ('F', Color::Rgb { r: 255, g: 120, b: 40 }),
        PowerupKind::Bomb => ('B', Color::Rgb { r: 200, g: 200, b: 255 }),
        PowerupKind::Speed => ('S', Color::Rgb { r: 80, g: 255, b: 200 }),
    }
}

// ── Renderer ──

/// Each arena cell is 2 terminal columns wide.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Glyph::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.cells.fill(Glyph::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, snap: &Snapshot) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
        }

        // Phase change: clear for a clean transition
        if self.last_phase != Some(snap.phase) {
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(snap.phase);
        }

        self.compose(snap);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed glyphs ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Glyph::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors. ResetColor would fall back to the terminal's
        // own default, which may differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Glyph::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let g = self.front.get(x, y);
                if g == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if g.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(g.fg))?;
                    last_fg = g.fg;
                }
                if g.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(g.bg))?;
                    last_bg = g.bg;
                }
                queue!(self.writer, Print(g.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose(&mut self, snap: &Snapshot) {
        self.front.clear();
        self.compose_hud(snap);
        self.compose_board(snap);

        let below = MAP_ROW + snap.rows as usize + 1;
        self.compose_players(snap, below);

        if let Some(debug) = &snap.debug {
            self.compose_debug_paths(debug);
            let mut row = below + snap.actors.len() + 1;
            for b in debug {
                let path: Vec<String> = b.path.iter().map(|c| format!("{},{}", c.col, c.row)).collect();
                let line = format!(
                    " P{} {:<8} {:<11} r={} {} [{}]",
                    b.id + 1,
                    b.archetype,
                    b.state,
                    b.danger_radius,
                    if b.escaping { "esc" } else { "   " },
                    path.join(" "),
                );
                self.front.put_str(0, row, &line, player_color(b.id), Color::Reset);
                row += 1;
            }
        }

        match snap.phase {
            Phase::Countdown => {
                let label = format!(" {} ", snap.countdown_secs.max(1));
                self.compose_banner(snap, &[label.as_str()]);
            }
            Phase::Active => {}
            Phase::RoundEnd => {
                let wins = self.wins_line(snap);
                self.compose_banner(snap, &[snap.banner.as_str(), wins.as_str(), "ENTER: next round"]);
            }
            Phase::MatchOver => {
                let wins = self.wins_line(snap);
                self.compose_banner(snap, &[snap.banner.as_str(), wins.as_str(), "Q: quit"]);
            }
        }

        if let Some(help_row) = self.front.height.checked_sub(1) {
            let help = " P1: Arrows+Space  P2: WASD+X  │  Tab: debug  Enter: skip  Q: quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_hud(&mut self, snap: &Snapshot) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        let hud = format!(
            " Round {:<2}  Time {:>3}s  Wins {} ",
            snap.round_number,
            snap.remaining_secs,
            self.wins_line(snap),
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn wins_line(&self, snap: &Snapshot) -> String {
        snap.wins
            .iter()
            .enumerate()
            .map(|(i, w)| format!("P{}:{}", i + 1, w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compose_board(&mut self, snap: &Snapshot) {
        for row in 0..snap.rows {
            for col in 0..snap.cols {
                let c = Cell::new(col, row);
                let (c0, c1, fg, bg) = if snap.walls.contains(&c) || snap.hard_blocks.contains(&c) {
                    ('█', '█', WALL.0, WALL.1)
                } else if snap.soft_blocks.contains(&c) {
                    ('░', '░', SOFT.0, SOFT.1)
                } else if snap.burning.contains(&c) {
                    ('▒', '▒', FIRE.0, FIRE.1)
                } else if snap.bombs.contains(&c) {
                    ('(', ')', BOMB_FG, Color::Reset)
                } else if let Some((_, kind)) = snap.powerups.iter().find(|(p, _)| *p == c) {
                    let (ch, fg) = powerup_glyph(*kind);
                    ('[', ch, fg, Color::Reset)
                } else {
                    (' ', ' ', Color::White, Color::Reset)
                };
                self.set_cell(c, c0, c1, fg, bg);
            }
        }

        for a in snap.actors.iter().filter(|a| a.alive) {
            let bg = if snap.bombs.contains(&a.cell) { Color::DarkGrey } else { Color::Reset };
            let tag = if a.is_bot { 'B' } else { 'P' };
            let digit = char::from_digit((a.id + 1) as u32 % 10, 10).unwrap_or('?');
            self.set_cell(a.cell, tag, digit, player_color(a.id), bg);
        }
    }

    fn compose_debug_paths(&mut self, debug: &[BotView]) {
        for b in debug {
            for c in &b.path {
                let x = c.col as usize * CELL_W;
                let y = MAP_ROW + c.row as usize;
                let under = self.front.get(x, y);
                if under.ch == ' ' {
                    self.set_cell(*c, '·', '·', player_color(b.id), Color::Reset);
                }
            }
        }
    }

    fn compose_players(&mut self, snap: &Snapshot, row: usize) {
        for (i, a) in snap.actors.iter().enumerate() {
            self.front.put_str(0, row + i, &Self::player_line(a), player_color(a.id), Color::Reset);
        }
    }

    fn player_line(a: &ActorView) -> String {
        let who = if a.is_bot { "bot" } else { "you" };
        if !a.alive {
            return format!(" P{} {}  ✕", a.id + 1, who);
        }
        format!(
            " P{} {}  fire {}  bombs {}  speed {}",
            a.id + 1,
            who,
            a.stats.blast_radius,
            a.stats.max_bombs,
            a.stats.speed,
        )
    }

    /// Centered box over the board.
    fn compose_banner(&mut self, snap: &Snapshot, lines: &[&str]) {
        let board_w = snap.cols as usize * CELL_W;
        let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 2;
        let box_w = inner + 2;
        let x = board_w.saturating_sub(box_w) / 2;
        let y = MAP_ROW + (snap.rows as usize).saturating_sub(lines.len() + 2) / 2;
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };

        let bar = "═".repeat(inner);
        self.front.put_str(x, y, &format!("╔{}╗", bar), BANNER, bg);
        for (i, l) in lines.iter().enumerate() {
            let pad = inner - l.chars().count();
            let text = format!("║{}{}{}║", " ".repeat(pad / 2), l, " ".repeat(pad - pad / 2));
            self.front.put_str(x, y + 1 + i, &text, BANNER, bg);
        }
        self.front.put_str(x, y + 1 + lines.len(), &format!("╚{}╝", bar), BANNER, bg);
    }

    fn set_cell(&mut self, c: Cell, c0: char, c1: char, fg: Color, bg: Color) {
        let x = c.col as usize * CELL_W;
        let y = MAP_ROW + c.row as usize;
        self.front.set(x, y, Glyph::new(c0, fg, bg));
        self.front.set(x + 1, y, Glyph::new(c1, fg, bg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchSettings, TimingConfig};
    use crate::domain::ai::BotArchetype;
    use crate::sim::bots::Bots;
    use crate::sim::snapshot::capture;
    use crate::sim::world::WorldState;

    fn snapshot(debug: bool) -> Snapshot {
        let settings = MatchSettings {
            soft_block_percent: 0,
            powerup_percent: 0,
            timer_seconds: 60,
            human_players: 1,
            total_players: 2,
            bot_types: vec![BotArchetype::Greedy],
            rounds_to_win: 2,
        };
        let mut world = WorldState::new(settings, TimingConfig::default(), 3);
        world.debug_overlay = debug;
        world.powerups.insert(Cell::new(3, 1), PowerupKind::Speed);
        let bots = Bots::new(1, &[BotArchetype::Greedy], 30, 3);
        capture(&world, &bots)
    }

    fn composed(snap: &Snapshot) -> Renderer {
        let mut r = Renderer::new();
        r.front.resize(80, 30);
        r.compose(snap);
        r
    }

    fn text_at(r: &Renderer, x: usize, y: usize, len: usize) -> String {
        (x..x + len).map(|i| r.front.get(i, y).ch).collect()
    }

    #[test]
    fn board_layout() {
        let snap = snapshot(false);
        let r = composed(&snap);
        // Corner wall, both columns.
        assert_eq!(text_at(&r, 0, MAP_ROW, 2), "██");
        // Player 1 at (1,1), bot player 2 at (13,1).
        assert_eq!(text_at(&r, 2, MAP_ROW + 1, 2), "P1");
        assert_eq!(text_at(&r, 26, MAP_ROW + 1, 2), "B2");
        assert_eq!(text_at(&r, 6, MAP_ROW + 1, 2), "[S");
        // Interior pillar at (2,2).
        assert_eq!(text_at(&r, 4, MAP_ROW + 2, 2), "██");
    }

    #[test]
    fn hud_shows_round_and_timer() {
        let r = composed(&snapshot(false));
        let hud = text_at(&r, 0, HUD_ROW, 40);
        assert!(hud.contains("Round 1"), "{hud}");
        assert!(hud.contains("60s"), "{hud}");
        assert!(hud.contains("P1:0 P2:0"), "{hud}");
    }

    #[test]
    fn countdown_banner_is_centered_on_board() {
        let snap = snapshot(false);
        let r = composed(&snap);
        let rows: Vec<String> = (MAP_ROW..MAP_ROW + 13).map(|y| text_at(&r, 0, y, 30)).collect();
        assert!(rows.iter().any(|l| l.contains("║  3  ║")), "{rows:?}");
    }

    #[test]
    fn debug_overlay_lists_bots() {
        let snap = snapshot(true);
        let r = composed(&snap);
        let below = MAP_ROW + 13 + 1 + snap.actors.len() + 1;
        let line = text_at(&r, 0, below, 30);
        assert!(line.contains("greedy"), "{line}");
    }

    #[test]
    fn dead_player_line() {
        let mut snap = snapshot(false);
        snap.actors[1].alive = false;
        assert!(Renderer::player_line(&snap.actors[1]).ends_with('✕'));
        let r = composed(&snap);
        assert_eq!(text_at(&r, 26, MAP_ROW + 1, 2), "  ");
    }
}
