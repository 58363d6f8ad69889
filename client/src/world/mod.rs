mod config;
mod entities;
mod generation;
mod map_change;
mod status;
mod tile_map;
mod world_store;

pub use config::WorldConfig;
pub use entities::{EntityDiff, EntityDirectory};
pub use generation::{fnv1a, generate_town, seed_for, GenerationParams};
pub use map_change::MapChangeEvent;
pub use status::ConnectionStatus;
pub use tile_map::TileMap;
pub use world_store::WorldStore;
