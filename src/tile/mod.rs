//! Tile coordinate algebra (C2) and tile lifecycle (C6).

pub mod fetch;
pub mod store;

use crate::mercator;
use smallvec::SmallVec;
use std::fmt;

/// Max zoom levels supported by `TileCoord::z` plus one for the chain itself;
/// sized so `ancestors()` never spills to the heap in practice.
type AncestorChain = SmallVec<[TileCoord; 24]>;

/// A slippy-map tile address. `0 <= x, y < 2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        let span = 1u32 << z;
        Self {
            x: x.min(span.saturating_sub(1)),
            y: y.min(span.saturating_sub(1)),
            z,
        }
    }

    /// The tile at zoom `z` containing (lng, lat), via the standard slippy-map
    /// formula.
    pub fn from_lnglat(lng: f64, lat: f64, z: u8) -> Self {
        let (mx, my) = mercator::from_lnglat(lng, lat);
        let span = (1u64 << z) as f64;
        let x = (mx * span).floor().clamp(0.0, span - 1.0) as u32;
        let y = (my * span).floor().clamp(0.0, span - 1.0) as u32;
        Self::new(x, y, z)
    }

    /// Parent tile at `z - 1`, or `None` at `z == 0`.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord::new(self.x / 2, self.y / 2, self.z - 1))
    }

    /// The four children at `z + 1`.
    pub fn children(&self) -> [TileCoord; 4] {
        let z = self.z + 1;
        [
            TileCoord::new(2 * self.x, 2 * self.y, z),
            TileCoord::new(2 * self.x + 1, 2 * self.y, z),
            TileCoord::new(2 * self.x, 2 * self.y + 1, z),
            TileCoord::new(2 * self.x + 1, 2 * self.y + 1, z),
        ]
    }

    /// The lng/lat bounding box of this tile.
    pub fn to_bbox(&self) -> TileBounds {
        TileBounds::from_tile_coord(*self)
    }

    /// The mercator-space origin (top-left corner, [0,1]^2) of this tile.
    pub fn mercator_origin(&self) -> (f64, f64) {
        let span = (1u64 << self.z) as f64;
        (self.x as f64 / span, self.y as f64 / span)
    }

    /// Length of one tile edge in mercator units ([0,1] world).
    pub fn mercator_size(&self) -> f64 {
        1.0 / (1u64 << self.z) as f64
    }

    /// The ancestor chain starting at self (inclusive) up to and including z=0.
    pub fn ancestors(&self) -> AncestorChain {
        let mut out: AncestorChain = SmallVec::new();
        out.push(*self);
        let mut cur = *self;
        while let Some(p) = cur.parent() {
            out.push(p);
            cur = p;
        }
        out
    }
}

impl fmt::Display for TileCoord {
    /// Matches the tile-store key format: `"x/y/z"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x, self.y, self.z)
    }
}

/// Lng/lat bounding box. `min_lng` may legitimately exceed `max_lng` only across
/// the antimeridian, which this core does not support — values are clamped instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl TileBounds {
    pub fn from_tile_coord(coord: TileCoord) -> Self {
        let span = (1u64 << coord.z) as f64;
        let (min_lng, max_lat) = mercator::to_lnglat(coord.x as f64 / span, coord.y as f64 / span);
        let (max_lng, min_lat) =
            mercator::to_lnglat((coord.x + 1) as f64 / span, (coord.y + 1) as f64 / span);
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }
}

/// Enumerate every tile at zoom `z` whose bbox intersects `bounds`, plus a buffer
/// ring of the given width (in tile units) around that span.
pub fn tiles_in_bounds(bounds: &TileBounds, z: u8, buffer: i64) -> Vec<TileCoord> {
    let span = 1i64 << z;
    let top_left = TileCoord::from_lnglat(bounds.min_lng, bounds.max_lat, z);
    let bottom_right = TileCoord::from_lnglat(bounds.max_lng, bounds.min_lat, z);

    let min_x = top_left.x as i64 - buffer;
    let max_x = bottom_right.x as i64 + buffer;
    let min_y = top_left.y as i64 - buffer;
    let max_y = bottom_right.y as i64 + buffer;

    let mut out = Vec::new();
    for x in min_x..=max_x {
        if x < 0 || x >= span {
            continue;
        }
        for y in min_y..=max_y {
            if y < 0 || y >= span {
                continue;
            }
            out.push(TileCoord::new(x as u32, y as u32, z));
        }
    }
    out
}
