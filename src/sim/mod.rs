pub mod bots;
pub mod event;
pub mod round;
pub mod snapshot;
pub mod step;
pub mod world;
