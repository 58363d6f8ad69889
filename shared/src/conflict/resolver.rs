use std::cmp::Ordering;

use log::debug;

use crate::{
    types::Millis,
    wire::{BehaviorState, EntityState, MapEditEvent},
};

use super::strategy::{ConflictStrategy, ResolveContext, Winner};

/// Something two participants may write concurrently.
pub trait Contested {
    fn authored_at(&self) -> Millis;

    fn author(&self) -> Option<&str>;

    /// Total order used to break timestamp ties. Equal only for equal values.
    fn canonical_cmp(&self, other: &Self) -> Ordering;
}

impl Contested for EntityState {
    fn authored_at(&self) -> Millis {
        self.transform.timestamp
    }

    fn author(&self) -> Option<&str> {
        self.authored_by.as_deref()
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id).then_with(|| {
            let ours = serde_json::to_string(self).ok();
            let theirs = serde_json::to_string(other).ok();
            ours.cmp(&theirs)
        })
    }
}

impl Contested for MapEditEvent {
    fn authored_at(&self) -> Millis {
        self.timestamp
    }

    fn author(&self) -> Option<&str> {
        Some(self.edited_by.as_str())
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        (&self.edited_by, self.tile, self.x, self.y).cmp(&(
            &other.edited_by,
            other.tile,
            other.x,
            other.y,
        ))
    }
}

fn chronological<T: Contested>(current: &T, incoming: &T) -> Ordering {
    current
        .authored_at()
        .cmp(&incoming.authored_at())
        .then_with(|| current.canonical_cmp(incoming))
}

fn last_wins<T: Contested>(current: &T, incoming: &T) -> Winner {
    match chronological(current, incoming) {
        Ordering::Less => Winner::Incoming,
        _ => Winner::Current,
    }
}

fn first_wins<T: Contested>(current: &T, incoming: &T) -> Winner {
    match chronological(current, incoming) {
        Ordering::Greater => Winner::Incoming,
        _ => Winner::Current,
    }
}

fn host_wins<T: Contested>(current: &T, incoming: &T, context: &ResolveContext) -> Winner {
    let Some(host_id) = context.host_id else {
        return last_wins(current, incoming);
    };
    let current_is_host = current.author() == Some(host_id);
    let incoming_is_host = incoming.author() == Some(host_id);
    match (current_is_host, incoming_is_host) {
        (true, false) => Winner::Current,
        (false, true) => Winner::Incoming,
        _ => last_wins(current, incoming),
    }
}

/// Picks between two writes. Strategies that only make sense for entity
/// states (`HighestHealthWins`, `Merge`) behave as `LastWins` here.
pub fn pick_winner<T: Contested>(
    current: &T,
    incoming: &T,
    strategy: ConflictStrategy,
    context: &ResolveContext,
) -> Winner {
    match strategy {
        ConflictStrategy::FirstWins => first_wins(current, incoming),
        ConflictStrategy::LastWins
        | ConflictStrategy::HighestHealthWins
        | ConflictStrategy::Merge => last_wins(current, incoming),
        ConflictStrategy::HostWins => host_wins(current, incoming, context),
    }
}

pub fn resolve_map_edit(
    current: &MapEditEvent,
    incoming: &MapEditEvent,
    strategy: ConflictStrategy,
    context: &ResolveContext,
) -> Winner {
    let winner = pick_winner(current, incoming, strategy, context);
    debug!(
        "Tile ({}, {}) conflict between `{}` and `{}` under {:?}: {:?} wins",
        incoming.x, incoming.y, current.edited_by, incoming.edited_by, strategy, winner
    );
    winner
}

/// Resolves two states of the same entity into the state to keep.
pub fn resolve_entity_state(
    current: &EntityState,
    incoming: &EntityState,
    strategy: ConflictStrategy,
    context: &ResolveContext,
) -> EntityState {
    let resolved = match strategy {
        ConflictStrategy::HighestHealthWins => {
            match current.health.total_cmp(&incoming.health) {
                Ordering::Less => current.clone(),
                Ordering::Greater => incoming.clone(),
                Ordering::Equal => take(current, incoming, last_wins(current, incoming)),
            }
        }
        ConflictStrategy::Merge => merge(current, incoming),
        _ => take(
            current,
            incoming,
            pick_winner(current, incoming, strategy, context),
        ),
    };
    debug!("Entity `{}` conflict resolved under {:?}", resolved.id, strategy);
    resolved
}

fn take(current: &EntityState, incoming: &EntityState, winner: Winner) -> EntityState {
    match winner {
        Winner::Current => current.clone(),
        Winner::Incoming => incoming.clone(),
    }
}

fn merge(current: &EntityState, incoming: &EntityState) -> EntityState {
    let mut merged = take(current, incoming, last_wins(current, incoming));
    merged.health = current.health.min(incoming.health);
    if current.is_terminal() || incoming.is_terminal() {
        merged.is_dead = true;
        merged.set_behavior(BehaviorState::Dead);
    }
    merged
}
