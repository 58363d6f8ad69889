use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{Millis, ParticipantId};

use super::{
    error::WireError,
    record::{require_key, WireRecord},
};

const FLAG_PASSABLE: u8 = 0b01;
const FLAG_CLEARED: u8 = 0b10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TileType {
    #[default]
    Empty = 0,
    Ground = 1,
    Road = 2,
    Building = 3,
    Tree = 4,
    Water = 5,
    NpcSpawn = 6,
    SafeZone = 7,
}

impl TileType {
    /// Whether a freshly placed tile of this type can be walked on
    pub fn default_passable(self) -> bool {
        !matches!(self, TileType::Empty | TileType::Building | TileType::Tree | TileType::Water)
    }
}

impl From<TileType> for u8 {
    fn from(tile_type: TileType) -> u8 {
        tile_type as u8
    }
}

impl TryFrom<u8> for TileType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TileType::Empty,
            1 => TileType::Ground,
            2 => TileType::Road,
            3 => TileType::Building,
            4 => TileType::Tree,
            5 => TileType::Water,
            6 => TileType::NpcSpawn,
            7 => TileType::SafeZone,
            other => {
                return Err(WireError::UnknownTag {
                    field: "type",
                    value: other.to_string(),
                })
            }
        })
    }
}

/// One cell of the world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tile {
    #[serde(rename = "type")]
    pub tile_type: TileType,
    pub variant: u8,
    pub elevation: u8,
    pub metadata: u8,
    pub passable: bool,
    pub cleared: bool,
}

impl Default for Tile {
    fn default() -> Self {
        Tile::new(TileType::Ground)
    }
}

impl Tile {
    /// Returned for coordinates outside the grid
    pub const EMPTY: Tile = Tile {
        tile_type: TileType::Empty,
        variant: 0,
        elevation: 0,
        metadata: 0,
        passable: false,
        cleared: false,
    };

    pub fn new(tile_type: TileType) -> Self {
        Self {
            tile_type,
            variant: 0,
            elevation: 0,
            metadata: 0,
            passable: tile_type.default_passable(),
            cleared: false,
        }
    }

    pub fn with_variant(mut self, variant: u8) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_cleared(mut self, cleared: bool) -> Self {
        self.cleared = cleared;
        self
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.passable {
            flags |= FLAG_PASSABLE;
        }
        if self.cleared {
            flags |= FLAG_CLEARED;
        }
        flags
    }

    /// Grid-storage form: `[type, variant, elevation, metadata, flags]`
    pub fn to_compact(&self) -> Value {
        json!([
            u8::from(self.tile_type),
            self.variant,
            self.elevation,
            self.metadata,
            self.flags()
        ])
    }

    pub fn from_compact(value: &Value) -> Result<Tile, WireError> {
        let fields = value.as_array().ok_or_else(|| WireError::InvalidField {
            field: "tiles",
            reason: "tile is not an array".to_string(),
        })?;
        if fields.len() != 5 {
            return Err(WireError::InvalidField {
                field: "tiles",
                reason: format!("tile has {} fields, expected 5", fields.len()),
            });
        }

        let mut bytes = [0u8; 5];
        for (byte, field) in bytes.iter_mut().zip(fields.iter()) {
            *byte = field
                .as_u64()
                .and_then(|number| u8::try_from(number).ok())
                .ok_or_else(|| WireError::InvalidField {
                    field: "tiles",
                    reason: format!("`{}` is not a byte", field),
                })?;
        }

        Ok(Tile {
            tile_type: TileType::try_from(bytes[0])?,
            variant: bytes[1],
            elevation: bytes[2],
            metadata: bytes[3],
            passable: bytes[4] & FLAG_PASSABLE != 0,
            cleared: bytes[4] & FLAG_CLEARED != 0,
        })
    }
}

/// A single grid edit published under `map/changes/{x}_{y}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEditEvent {
    pub x: i32,
    pub y: i32,
    pub tile: Tile,
    pub edited_by: ParticipantId,
    #[serde(default)]
    pub timestamp: Millis,
}

impl WireRecord for MapEditEvent {
    fn validate(&self) -> Result<(), WireError> {
        require_key("editedBy", &self.edited_by)
    }
}
