use std::collections::HashSet;

use serde_json::{json, Map, Value};

use townsync_shared::wire::{Tile, WireError};

/// Fixed-size, row-major grid of tiles with a list of cells changed since
/// the last flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    dirty: Vec<(i32, i32)>,
    dirty_set: HashSet<(i32, i32)>,
}

impl TileMap {
    /// A `width` x `height` grid of default tiles. Negative sizes are
    /// treated as zero.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let cells = usize::try_from(width).unwrap_or(0) * usize::try_from(height).unwrap_or(0);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); cells],
            dirty: Vec::new(),
            dirty_set: HashSet::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        usize::try_from(y * self.width + x).ok()
    }

    /// Tile at `(x, y)`, or [`Tile::EMPTY`] outside the grid.
    pub fn get(&self, x: i32, y: i32) -> Tile {
        self.index(x, y)
            .and_then(|index| self.tiles.get(index))
            .copied()
            .unwrap_or(Tile::EMPTY)
    }

    /// Writes a tile and marks it dirty. Returns the previous tile, or `None`
    /// outside the grid.
    pub fn set(&mut self, x: i32, y: i32, tile: Tile) -> Option<Tile> {
        let previous = self.set_clean(x, y, tile)?;
        if self.dirty_set.insert((x, y)) {
            self.dirty.push((x, y));
        }
        Some(previous)
    }

    /// Writes a tile without marking it dirty.
    pub fn set_clean(&mut self, x: i32, y: i32, tile: Tile) -> Option<Tile> {
        let index = self.index(x, y)?;
        let slot = self.tiles.get_mut(index)?;
        Some(std::mem::replace(slot, tile))
    }

    pub fn dirty(&self) -> &[(i32, i32)] {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
        self.dirty_set.clear();
    }

    /// Tiles in row-major order
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Fields written by a full flush: `width`, `height` and `tiles` as rows
    /// of compact tiles.
    pub fn to_fields(&self) -> Map<String, Value> {
        let row_len = usize::try_from(self.width).unwrap_or(0).max(1);
        let rows: Vec<Value> = self
            .tiles
            .chunks(row_len)
            .map(|row| Value::Array(row.iter().map(Tile::to_compact).collect()))
            .collect();

        let mut fields = Map::new();
        fields.insert("width".to_string(), json!(self.width));
        fields.insert("height".to_string(), json!(self.height));
        fields.insert("tiles".to_string(), Value::Array(rows));
        fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_fields())
    }

    /// Parses a stored grid. Any shape mismatch rejects the whole grid.
    pub fn from_value(value: &Value) -> Result<TileMap, WireError> {
        let dimension = |field: &'static str| -> Result<i32, WireError> {
            value
                .get(field)
                .and_then(Value::as_i64)
                .and_then(|number| i32::try_from(number).ok())
                .filter(|number| *number > 0)
                .ok_or_else(|| WireError::InvalidField {
                    field,
                    reason: "missing or not a positive integer".to_string(),
                })
        };
        let width = dimension("width")?;
        let height = dimension("height")?;

        let rows = value
            .get("tiles")
            .and_then(Value::as_array)
            .ok_or_else(|| WireError::InvalidField {
                field: "tiles",
                reason: "missing rows".to_string(),
            })?;
        if rows.len() != usize::try_from(height).unwrap_or(0) {
            return Err(WireError::InvalidField {
                field: "tiles",
                reason: format!("{} rows for height {}", rows.len(), height),
            });
        }

        // Rows are checked before anything is sized from the claimed
        // dimensions.
        let row_len = usize::try_from(width).unwrap_or(0);
        let mut tiles = Vec::new();
        for row in rows {
            let row = row.as_array().ok_or_else(|| WireError::InvalidField {
                field: "tiles",
                reason: "row is not an array".to_string(),
            })?;
            if row.len() != row_len {
                return Err(WireError::InvalidField {
                    field: "tiles",
                    reason: format!("row of {} tiles for width {}", row.len(), width),
                });
            }
            for tile in row {
                tiles.push(Tile::from_compact(tile)?);
            }
        }

        Ok(TileMap {
            width,
            height,
            tiles,
            dirty: Vec::new(),
            dirty_set: HashSet::new(),
        })
    }
}
