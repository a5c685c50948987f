/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// A missing file or missing keys fall back to defaults; anything present
/// but invalid is a `ConfigError`, reported before the simulation exists.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::ai::BotArchetype;

// ── Errors ──

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config.toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{key} = {value} is out of range ({min}..={max})")]
    OutOfRange { key: &'static str, value: i64, min: i64, max: i64 },
    #[error("unknown bot type {0:?} (expected hostile, careful or greedy)")]
    UnknownArchetype(String),
    #[error("bot_types lists {found} bots but {expected} are needed (total_players - human_players)")]
    BotCount { expected: usize, found: usize },
}

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub settings: MatchSettings,
    pub timing: TimingConfig,
    pub log_dir: PathBuf,
    /// Fixed RNG seed for reproducible matches.
    pub seed: Option<u64>,
}

/// Validated match rules.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSettings {
    pub soft_block_percent: u8,
    pub powerup_percent: u8,
    pub timer_seconds: u32,
    pub human_players: usize,
    pub total_players: usize,
    /// One archetype per bot, for actor ids `human_players..total_players`.
    pub bot_types: Vec<BotArchetype>,
    pub rounds_to_win: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub fps: u32,
    pub bomb_fuse_ticks: u32,
    pub explosion_ticks: u32,
    pub countdown_ticks: u32,
    pub transition_ticks: u32,
    pub grace_ticks: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        MatchSettings {
            soft_block_percent: default_soft_block_percent() as u8,
            powerup_percent: default_powerup_percent() as u8,
            timer_seconds: default_timer_seconds() as u32,
            human_players: default_human_players() as usize,
            total_players: default_total_players() as usize,
            bot_types: vec![BotArchetype::Hostile, BotArchetype::Careful, BotArchetype::Greedy],
            rounds_to_win: default_rounds_to_win() as u32,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            fps: default_fps(),
            bomb_fuse_ticks: default_bomb_fuse(),
            explosion_ticks: default_explosion(),
            countdown_ticks: default_round_delay(),
            transition_ticks: default_round_delay(),
            grace_ticks: default_grace(),
        }
    }
}

impl TimingConfig {
    /// Milliseconds per tick for the driver loop.
    pub fn tick_ms(&self) -> u64 {
        1000 / self.fps.max(1) as u64
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default, rename = "match")]
    match_rules: TomlMatch,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    general: TomlGeneral,
}

// Integers are read wide so out-of-range values get a range error
// instead of a type error.
#[derive(Deserialize, Debug)]
struct TomlMatch {
    #[serde(default = "default_soft_block_percent")]
    soft_block_percent: i64,
    #[serde(default = "default_powerup_percent")]
    powerup_percent: i64,
    #[serde(default = "default_timer_seconds")]
    timer_seconds: i64,
    #[serde(default = "default_human_players")]
    human_players: i64,
    #[serde(default = "default_total_players")]
    total_players: i64,
    #[serde(default = "default_bot_types")]
    bot_types: Vec<String>,
    #[serde(default = "default_rounds_to_win")]
    rounds_to_win: i64,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_fps")]
    fps: u32,
    #[serde(default = "default_bomb_fuse")]
    bomb_fuse_ticks: u32,
    #[serde(default = "default_explosion")]
    explosion_ticks: u32,
    #[serde(default = "default_round_delay")]
    countdown_ticks: u32,
    #[serde(default = "default_round_delay")]
    transition_ticks: u32,
    #[serde(default = "default_grace")]
    grace_ticks: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_log_dir")]
    log_dir: String,
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_soft_block_percent() -> i64 { 70 }
fn default_powerup_percent() -> i64 { 30 }
fn default_timer_seconds() -> i64 { 180 }
fn default_human_players() -> i64 { 1 }
fn default_total_players() -> i64 { 4 }
fn default_bot_types() -> Vec<String> {
    vec!["hostile".into(), "careful".into(), "greedy".into()]
}
fn default_rounds_to_win() -> i64 { 2 }

fn default_fps() -> u32 { 30 }
fn default_bomb_fuse() -> u32 { 90 }   // 3 s at 30 fps
fn default_explosion() -> u32 { 30 }   // fire lingers 1 s after the latest blast
fn default_round_delay() -> u32 { 90 }
fn default_grace() -> u32 { 30 }
fn default_log_dir() -> String { "logs".into() }

impl Default for TomlMatch {
    fn default() -> Self {
        TomlMatch {
            soft_block_percent: default_soft_block_percent(),
            powerup_percent: default_powerup_percent(),
            timer_seconds: default_timer_seconds(),
            human_players: default_human_players(),
            total_players: default_total_players(),
            bot_types: default_bot_types(),
            rounds_to_win: default_rounds_to_win(),
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            fps: default_fps(),
            bomb_fuse_ticks: default_bomb_fuse(),
            explosion_ticks: default_explosion(),
            countdown_ticks: default_round_delay(),
            transition_ticks: default_round_delay(),
            grace_ticks: default_grace(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { log_dir: default_log_dir(), seed: None }
    }
}

// ── Validation ──

fn in_range(key: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { key, value, min, max })
    }
}

impl TomlMatch {
    fn validate(self) -> Result<MatchSettings, ConfigError> {
        let soft_block_percent = in_range("soft_block_percent", self.soft_block_percent, 0, 100)?;
        let powerup_percent = in_range("powerup_percent", self.powerup_percent, 0, 100)?;
        let timer_seconds = in_range("timer_seconds", self.timer_seconds, 30, 600)?;
        let human_players = in_range("human_players", self.human_players, 1, 2)?;
        let total_players = in_range("total_players", self.total_players, 2, 4)?;
        let rounds_to_win = in_range("rounds_to_win", self.rounds_to_win, 1, 4)?;

        let bot_types = self
            .bot_types
            .iter()
            .map(|name| {
                BotArchetype::from_name(name).ok_or_else(|| ConfigError::UnknownArchetype(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // total_players >= 2 >= human_players, so this never underflows.
        let expected = (total_players - human_players) as usize;
        if bot_types.len() != expected {
            return Err(ConfigError::BotCount { expected, found: bot_types.len() });
        }

        Ok(MatchSettings {
            soft_block_percent: soft_block_percent as u8,
            powerup_percent: powerup_percent as u8,
            timer_seconds: timer_seconds as u32,
            human_players: human_players as usize,
            total_players: total_players as usize,
            bot_types,
            rounds_to_win: rounds_to_win as u32,
        })
    }
}

impl TomlTiming {
    fn validate(self) -> Result<TimingConfig, ConfigError> {
        let positive = |key: &'static str, v: u32| {
            in_range(key, v as i64, 1, u32::MAX as i64).map(|v| v as u32)
        };
        Ok(TimingConfig {
            fps: in_range("fps", self.fps as i64, 1, 240)? as u32,
            bomb_fuse_ticks: positive("bomb_fuse_ticks", self.bomb_fuse_ticks)?,
            explosion_ticks: positive("explosion_ticks", self.explosion_ticks)?,
            countdown_ticks: self.countdown_ticks,
            transition_ticks: self.transition_ticks,
            grace_ticks: self.grace_ticks,
        })
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs)?;
        Self::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse and validate config text. Relative paths resolve against CWD.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let toml_cfg: TomlConfig = toml::from_str(text)?;
        Self::from_toml(toml_cfg, &[])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let settings = toml_cfg.match_rules.validate()?;
        let timing = toml_cfg.timing.validate()?;

        // Logs go next to the config file's directory when one was searched.
        let log_dir_str = &toml_cfg.general.log_dir;
        let log_dir = if Path::new(log_dir_str).is_absolute() || search_dirs.is_empty() {
            PathBuf::from(log_dir_str)
        } else {
            search_dirs
                .iter()
                .find(|d| d.join("config.toml").exists())
                .map(|d| d.join(log_dir_str))
                .unwrap_or_else(|| PathBuf::from(log_dir_str))
        };

        Ok(GameConfig { settings, timing, log_dir, seed: toml_cfg.general.seed })
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// First config.toml found wins; none at all means defaults.
fn load_toml(search_dirs: &[PathBuf]) -> Result<TomlConfig, ConfigError> {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            return Ok(toml::from_str::<TomlConfig>(&text)?);
        }
    }
    Ok(TomlConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.settings, MatchSettings::default());
        assert_eq!(cfg.timing, TimingConfig::default());
        assert_eq!(cfg.log_dir, PathBuf::from("logs"));
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn full_file_parses() {
        let cfg = GameConfig::from_toml_str(
            r#"
            [match]
            soft_block_percent = 0
            powerup_percent = 100
            timer_seconds = 30
            human_players = 2
            total_players = 3
            bot_types = ["Greedy"]
            rounds_to_win = 4

            [timing]
            fps = 60

            [general]
            log_dir = "/tmp/arena"
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(cfg.settings.human_players, 2);
        assert_eq!(cfg.settings.bot_types, vec![BotArchetype::Greedy]);
        assert_eq!(cfg.settings.powerup_percent, 100);
        assert_eq!(cfg.timing.fps, 60);
        assert_eq!(cfg.timing.bomb_fuse_ticks, 90);
        assert_eq!(cfg.log_dir, PathBuf::from("/tmp/arena"));
        assert_eq!(cfg.seed, Some(42));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = GameConfig::from_toml_str("[match]\ntimer_seconds = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "timer_seconds", value: 10, .. }));

        let err = GameConfig::from_toml_str("[match]\nsoft_block_percent = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "soft_block_percent", .. }));

        let err = GameConfig::from_toml_str(
            "[match]\ntotal_players = 5\nbot_types = [\"hostile\",\"hostile\",\"hostile\",\"hostile\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "total_players", .. }));

        let err = GameConfig::from_toml_str("[timing]\nfps = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "fps", .. }));
    }

    #[test]
    fn bot_list_must_match_player_counts() {
        let err = GameConfig::from_toml_str(
            "[match]\nhuman_players = 1\ntotal_players = 2\nbot_types = [\"hostile\", \"careful\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::BotCount { expected: 1, found: 2 }));
    }

    #[test]
    fn unknown_archetype_is_rejected() {
        let err = GameConfig::from_toml_str(
            "[match]\ntotal_players = 2\nbot_types = [\"sneaky\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownArchetype(ref n) if n == "sneaky"));
        assert!(err.to_string().contains("sneaky"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = GameConfig::from_toml_str("[match\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn tick_duration_from_fps() {
        assert_eq!(TimingConfig::default().tick_ms(), 33);
    }
}
