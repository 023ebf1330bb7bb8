//! Layer batcher (C8): cross-tile grouping by layer, ordered indexed draw
//! submission.
//!
//! Walks a fixed collection of layer names in paint order, producing zero or
//! more draws per layer; buckets are rebuilt fresh every frame rather than
//! held in a persistent registry.

use std::collections::HashMap;

use palette::Srgba;

use crate::camera::{Camera, TileTransform};
use crate::mvt::{FeatureSet, GeometryKind};
use crate::tile::store::TileData;

/// Bottom-to-top paint order. Any layer not named here is drawn after these,
/// in stable first-seen order.
const GLOBAL_LAYER_ORDER: &[&str] = &[
    "background",
    "landcover",
    "park",
    "landuse",
    "water",
    "boundary",
    "transportation",
    "building",
    "housenumber",
    "label",
];

/// Depth step between consecutive layers' `uDepth` uniform. There is no
/// hardware depth test; this is a monotonic guard only, enforced alongside
/// insertion-order paint order.
const DEPTH_STEP: f32 = 1.0 / 4096.0;

/// One GPU-ready vertex: camera-relative position plus the layer's fill
/// color, baked per-vertex so the draw needs no per-feature uniform switch.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// One indexed (or index-free, for points) draw: a single layer/kind bucket.
#[derive(Debug, Clone)]
pub struct LayerDraw {
    pub layer: String,
    pub kind: GeometryKind,
    pub vertices: Vec<BatchVertex>,
    /// Empty for `GeometryKind::Point`, which draws unindexed.
    pub indices: Vec<u32>,
    pub depth: f32,
}

/// Per-layer appearance. Falls back to a built-in default when a layer name
/// is absent from the caller's palette, per `MapOptions.layer_colors`.
#[derive(Debug, Clone)]
pub struct LayerStyle {
    pub colors: HashMap<String, Srgba>,
}

impl LayerStyle {
    pub fn new(colors: HashMap<String, Srgba>) -> Self {
        Self { colors }
    }

    fn color_for(&self, layer: &str) -> Srgba {
        self.colors
            .get(layer)
            .copied()
            .unwrap_or_else(|| default_color_for(layer))
    }
}

/// Muted built-in palette, keyed by well-known layer name; anything else
/// falls through to a neutral gray so unknown layers remain visible.
fn default_color_for(layer: &str) -> Srgba {
    match layer {
        "background" => Srgba::new(0.95, 0.95, 0.92, 1.0),
        "landcover" => Srgba::new(0.85, 0.90, 0.80, 1.0),
        "park" => Srgba::new(0.76, 0.87, 0.71, 1.0),
        "landuse" => Srgba::new(0.90, 0.88, 0.84, 1.0),
        "water" => Srgba::new(0.68, 0.80, 0.90, 1.0),
        "boundary" => Srgba::new(0.60, 0.55, 0.55, 1.0),
        "transportation" => Srgba::new(0.80, 0.80, 0.78, 1.0),
        "building" => Srgba::new(0.82, 0.78, 0.72, 1.0),
        "housenumber" => Srgba::new(0.30, 0.30, 0.30, 1.0),
        "label" => Srgba::new(0.10, 0.10, 0.10, 1.0),
        _ => Srgba::new(0.6, 0.6, 0.6, 1.0),
    }
}

/// Batches the renderable tile set into ordered, indexed per-layer draws.
///
/// Holds no state across frames -- the Tile store exclusively owns the
/// underlying `TileData`; this call takes a borrow for the duration of one
/// frame only.
pub struct LayerBatcher;

impl LayerBatcher {
    /// Aggregates `tiles` into the fixed global paint order, applying each
    /// tile's camera-relative transform (`Camera::tile_transform`) to its
    /// tile-local `[0,1]` vertices before merging into shared per-layer/kind
    /// buckets, re-offsetting indices by the running vertex count.
    pub fn batch(camera: &Camera, tiles: &[std::sync::Arc<TileData>], style: &LayerStyle) -> Vec<LayerDraw> {
        let mut by_layer: HashMap<&str, Vec<&FeatureSet>> = HashMap::new();
        let mut insertion_order: Vec<&str> = Vec::new();

        for tile in tiles {
            for fs in &tile.feature_sets {
                let bucket = by_layer.entry(fs.layer.as_str()).or_insert_with(|| {
                    insertion_order.push(fs.layer.as_str());
                    Vec::new()
                });
                bucket.push(fs);
            }
        }

        let ordered_layers = ordered_layer_names(&insertion_order);

        let mut draws = Vec::new();
        let mut depth = 0.0f32;

        for layer in ordered_layers {
            let Some(feature_sets) = by_layer.get(layer) else {
                continue;
            };
            let color = style.color_for(layer).into_components();
            let rgba = [color.0, color.1, color.2, color.3];

            // Polygon -> line -> point tie-break within one layer, so outlines
            // and points stay visible over their fills.
            for kind in [GeometryKind::Polygon, GeometryKind::Line, GeometryKind::Point] {
                let draw = build_bucket(layer, kind, feature_sets, camera, rgba, depth);
                if let Some(draw) = draw {
                    draws.push(draw);
                    depth += DEPTH_STEP;
                }
            }
        }

        draws
    }
}

fn ordered_layer_names<'a>(insertion_order: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for &name in GLOBAL_LAYER_ORDER {
        if insertion_order.contains(&name) {
            out.push(name);
        }
    }
    for &name in insertion_order {
        if !GLOBAL_LAYER_ORDER.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn build_bucket(
    layer: &str,
    kind: GeometryKind,
    feature_sets: &[&FeatureSet],
    camera: &Camera,
    color: [f32; 4],
    depth: f32,
) -> Option<LayerDraw> {
    let mut vertices: Vec<BatchVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for fs in feature_sets.iter().filter(|fs| fs.kind == kind) {
        let (origin_mx, origin_my) = fs.tile.mercator_origin();
        let tile_size = fs.tile.mercator_size();
        let transform: TileTransform = camera.tile_transform(origin_mx, origin_my, tile_size);

        let base = vertices.len() as u32;
        vertices.extend(fs.mesh.vertices.iter().map(|&[u, v]| {
            let pos = transform.apply(u, v);
            BatchVertex { position: pos, color }
        }));
        indices.extend(fs.mesh.indices.iter().map(|&i| i + base));
    }

    if vertices.is_empty() {
        return None;
    }

    Some(LayerDraw {
        layer: layer.to_string(),
        kind,
        vertices,
        indices,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvt::geometry::MeshData;
    use crate::tile::TileCoord;
    use std::sync::Arc;

    fn tile_data_with(layer: &str, kind: GeometryKind, mesh: MeshData, coord: TileCoord) -> Arc<TileData> {
        Arc::new(TileData {
            coord,
            feature_sets: vec![FeatureSet {
                tile: coord,
                layer: layer.to_string(),
                kind,
                mesh,
            }],
            labels: Vec::new(),
            loaded_at: std::time::Instant::now(),
        })
    }

    #[test]
    fn test_batch_respects_global_layer_order() {
        let camera = Camera::new(0.5, 0.5, 5.0, 1024.0, 768.0);
        let style = LayerStyle::new(HashMap::new());

        let building = tile_data_with(
            "building",
            GeometryKind::Polygon,
            MeshData {
                vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                indices: vec![0, 1, 2],
            },
            TileCoord::new(0, 0, 1),
        );
        let water = tile_data_with(
            "water",
            GeometryKind::Polygon,
            MeshData {
                vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                indices: vec![0, 1, 2],
            },
            TileCoord::new(0, 0, 1),
        );

        let draws = LayerBatcher::batch(&camera, &[building, water], &style);
        let water_idx = draws.iter().position(|d| d.layer == "water").unwrap();
        let building_idx = draws.iter().position(|d| d.layer == "building").unwrap();
        assert!(water_idx < building_idx, "water must paint before building");
    }

    #[test]
    fn test_unknown_layer_trails_known_layers() {
        let camera = Camera::new(0.5, 0.5, 5.0, 1024.0, 768.0);
        let style = LayerStyle::new(HashMap::new());

        let mystery = tile_data_with(
            "mystery",
            GeometryKind::Polygon,
            MeshData {
                vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                indices: vec![0, 1, 2],
            },
            TileCoord::new(0, 0, 1),
        );
        let water = tile_data_with(
            "water",
            GeometryKind::Polygon,
            MeshData {
                vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                indices: vec![0, 1, 2],
            },
            TileCoord::new(0, 0, 1),
        );

        let draws = LayerBatcher::batch(&camera, &[mystery, water], &style);
        let water_idx = draws.iter().position(|d| d.layer == "water").unwrap();
        let mystery_idx = draws.iter().position(|d| d.layer == "mystery").unwrap();
        assert!(water_idx < mystery_idx);
    }

    #[test]
    fn test_indices_reoffset_across_tiles() {
        let camera = Camera::new(0.5, 0.5, 5.0, 1024.0, 768.0);
        let style = LayerStyle::new(HashMap::new());

        let tri = || MeshData {
            vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            indices: vec![0, 1, 2],
        };
        let a = tile_data_with("building", GeometryKind::Polygon, tri(), TileCoord::new(0, 0, 1));
        let b = tile_data_with("building", GeometryKind::Polygon, tri(), TileCoord::new(1, 0, 1));

        let draws = LayerBatcher::batch(&camera, &[a, b], &style);
        let draw = draws.iter().find(|d| d.layer == "building").unwrap();
        assert_eq!(draw.vertices.len(), 6);
        assert_eq!(draw.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_depth_increases_monotonically() {
        let camera = Camera::new(0.5, 0.5, 5.0, 1024.0, 768.0);
        let style = LayerStyle::new(HashMap::new());
        let tri = || MeshData {
            vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            indices: vec![0, 1, 2],
        };
        let water = tile_data_with("water", GeometryKind::Polygon, tri(), TileCoord::new(0, 0, 1));
        let building = tile_data_with("building", GeometryKind::Polygon, tri(), TileCoord::new(0, 0, 1));

        let draws = LayerBatcher::batch(&camera, &[water, building], &style);
        for pair in draws.windows(2) {
            assert!(pair[1].depth > pair[0].depth);
        }
    }
}
