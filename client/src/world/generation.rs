use serde::{Deserialize, Serialize};

use townsync_shared::{
    wire::{Tile, TileType},
    SessionDescriptor,
};

use super::tile_map::TileMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Content knobs of the town generator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParams {
    /// Roads are two tiles wide and repeat every `road_period` tiles
    pub road_period: i32,
    /// Percent chance (out of 100) of a building inside a block
    pub building_chance: u8,
    /// Cumulative percent threshold for trees
    pub tree_threshold: u8,
    /// Cumulative percent threshold for water
    pub water_threshold: u8,
    /// Spawn positions attempted; only passable picks become spawn tiles
    pub npc_spawn_count: u32,
    /// Distance from the border that spawn positions keep
    pub spawn_margin: i32,
    /// Side of the square safe zone in each corner
    pub safe_zone_size: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            road_period: 16,
            building_chance: 30,
            tree_threshold: 40,
            water_threshold: 42,
            npc_spawn_count: 20,
            spawn_margin: 10,
            safe_zone_size: 8,
        }
    }
}

/// Seed used for a session's town: the explicit one, or a stable hash of
/// the session id so every participant derives the same value.
pub fn seed_for(descriptor: &SessionDescriptor) -> u64 {
    descriptor
        .seed
        .unwrap_or_else(|| fnv1a(descriptor.session_id.as_bytes()))
}

pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Generates a town grid. The result depends only on the arguments.
pub fn generate_town(width: i32, height: i32, seed: u64, params: &GenerationParams) -> TileMap {
    let mut map = TileMap::new(width, height);
    let mut rng = fastrand::Rng::with_seed(seed);
    let period = params.road_period.max(1);
    let block_interior = 3..(period - 2);

    for y in 0..map.height() {
        for x in 0..map.width() {
            let roll = rng.u8(0..=100);
            let variant = rng.u8(0..=3);
            let (bx, by) = (x % period, y % period);

            let on_road = bx < 2 || by < 2;
            let in_block = block_interior.contains(&bx) && block_interior.contains(&by);
            let tile_type = if on_road {
                TileType::Road
            } else if in_block && roll < params.building_chance {
                TileType::Building
            } else if roll < params.tree_threshold {
                TileType::Tree
            } else if roll < params.water_threshold {
                TileType::Water
            } else {
                TileType::Ground
            };
            map.set(x, y, Tile::new(tile_type).with_variant(variant));
        }
    }

    let margin = params.spawn_margin.max(0);
    if map.width() > 2 * margin && map.height() > 2 * margin {
        for _ in 0..params.npc_spawn_count {
            let x = rng.i32(margin..map.width() - margin);
            let y = rng.i32(margin..map.height() - margin);
            if map.get(x, y).passable {
                map.set(x, y, Tile::new(TileType::NpcSpawn));
            }
        }
    }

    let size = params.safe_zone_size.max(0);
    let corners = [
        (0, 0),
        (map.width() - size, 0),
        (0, map.height() - size),
        (map.width() - size, map.height() - size),
    ];
    for (left, top) in corners {
        for y in top.max(0)..(top + size).min(map.height()) {
            for x in left.max(0)..(left + size).min(map.width()) {
                map.set(x, y, Tile::new(TileType::SafeZone).with_cleared(true));
            }
        }
    }

    map.clear_dirty();
    map
}
