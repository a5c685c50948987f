/// Blast Arena: a grid arena bomber for the terminal, with autonomous bots.
///
/// Layers:
///   - `domain`: arena geometry, entities, movement rules, pathfinding
///   - `sim`: world state, round lifecycle, bot brains, the tick function
///   - `ui`: keyboard input and the crossterm renderer
///   - `config`: TOML settings

pub mod config;
pub mod domain;
pub mod sim;
pub mod ui;
