mod resolver;
mod strategy;

pub use resolver::{pick_winner, resolve_entity_state, resolve_map_edit, Contested};
pub use strategy::{ConflictStrategy, ResolveContext, Winner};
