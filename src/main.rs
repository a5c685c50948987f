/// Entry point and game loop.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use blast_arena::config::GameConfig;
use blast_arena::sim::bots::Bots;
use blast_arena::sim::snapshot::capture;
use blast_arena::sim::step::{self, TickInput};
use blast_arena::sim::world::WorldState;
use blast_arena::ui::input::InputState;
use blast_arena::ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const LOG_FILE: &str = "blast-arena.log";

fn main() {
    let config = match GameConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // Held until exit; dropping it stops the log writer.
    let _log_guard = match init_logging(&config.log_dir) {
        Ok(g) => Some(g),
        Err(e) => {
            eprintln!("Logging disabled: {e}");
            None
        }
    };

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::info!(
        seed,
        players = config.settings.total_players,
        humans = config.settings.human_players,
        "match starting"
    );

    let human_players = config.settings.human_players;
    let mut bots = Bots::new(
        human_players,
        &config.settings.bot_types,
        config.timing.fps,
        seed.wrapping_add(1),
    );
    let mut world = WorldState::new(config.settings.clone(), config.timing, seed);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }
    let mut kb = InputState::new();
    kb.enable_release_events();

    let result = game_loop(&mut world, &mut bots, &mut renderer, &mut kb);

    if let Err(e) = kb.disable_release_events() {
        eprintln!("Keyboard reset failed: {e}");
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        tracing::error!(error = %e, "game loop failed");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Blast Arena!");
    let text = world.round.result_text();
    if !text.is_empty() {
        println!("{text}");
    }
    let wins: Vec<String> = world
        .round
        .wins
        .iter()
        .enumerate()
        .map(|(i, w)| format!("P{}: {}", i + 1, w))
        .collect();
    println!("Wins  {}", wins.join("  "));
}

fn init_logging(dir: &Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    // File only: stderr belongs to the terminal UI.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    tracing::info!("Log file: {}", dir.join(LOG_FILE).display());
    Ok(guard)
}

/// `RUST_LOG` directives when given and valid, otherwise `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn game_loop(
    world: &mut WorldState,
    bots: &mut Bots,
    renderer: &mut Renderer,
    kb: &mut InputState,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(world.timing.tick_ms());
    let human_players = world.settings.human_players;
    let mut pending = TickInput::default();
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        kb.drain_events();
        if kb.quit_requested() {
            break;
        }
        kb.latch(&mut pending, human_players);

        if last_tick.elapsed() >= tick_rate {
            let input = std::mem::take(&mut pending);
            step::step(world, bots, &input);
            last_tick = Instant::now();
            dirty = true;
        }

        if dirty {
            renderer.render(&capture(world, bots))?;
            dirty = false;
        }
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("blast_arena=loud")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn log_filter_can_raise_verbosity() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("blast_arena=trace")).max_level_hint(), Some(LevelFilter::TRACE));
    }
}
