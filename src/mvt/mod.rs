//! MVT parser (C4): layer/feature stream decode, geometry command stream,
//! label extraction.

pub mod geometry;
pub mod pbf;

use std::collections::{HashMap, HashSet};
use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Result, TessError};
use crate::tile::TileCoord;
use pbf::{PbfReader, WireType};

/// MVT geometry type, per the `Tile.GeomType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    fn from_mvt_type(v: u64) -> Option<Self> {
        match v {
            1 => Some(GeometryKind::Point),
            2 => Some(GeometryKind::Line),
            3 => Some(GeometryKind::Polygon),
            _ => None,
        }
    }
}

/// A typed MVT attribute value (the `Tile.Value` union).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl Value {
    /// Best-effort string rendering, used for label text extraction.
    pub fn as_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(f) => f.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::SInt(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::SInt(i) => Some(*i as f64),
            _ => None,
        }
    }
}

/// A decoded (layer, geometry-kind) feature set, ready for the layer batcher.
/// Vertices are tile-local `[0,1]`, transformed to world space by the camera
/// per-tile at draw time rather than stored in global mercator units.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub tile: TileCoord,
    pub layer: String,
    pub kind: GeometryKind,
    pub mesh: geometry::MeshData,
}

/// A label extracted during parsing, discarded with its owning tile.
#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub text: String,
    /// Global mercator position (not tile-local -- needed directly by the
    /// camera's world-to-screen projection each frame).
    pub mx: f64,
    pub my: f64,
    pub layer: String,
    pub priority: f32,
}

/// Parse configuration: which layers to retain, which layers produce labels,
/// and a fallback priority table for layers lacking an explicit priority
/// attribute. Mirrors `MapOptions`' separation of config from engine state.
pub struct ParseConfig {
    pub layer_allowlist: HashSet<String>,
    pub label_layers: HashSet<String>,
    pub label_attribute_keys: Vec<String>,
    pub priority_attribute_key: String,
    pub default_layer_priority: HashMap<String, f32>,
}

impl ParseConfig {
    fn is_allowed(&self, layer: &str) -> bool {
        self.layer_allowlist.is_empty() || self.layer_allowlist.contains(layer)
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

fn maybe_decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[0] == GZIP_MAGIC[0] && bytes[1] == GZIP_MAGIC[1] {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| TessError::Decompress(e.to_string()))?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Parses a raw (optionally gzipped) MVT payload for one tile into feature
/// sets and labels. Malformed input aborts this tile's parse and returns an
/// error the caller treats as `Failed`, per the error taxonomy.
pub fn parse_tile(
    bytes: &[u8],
    tile: TileCoord,
    config: &ParseConfig,
) -> Result<(Vec<FeatureSet>, Vec<LabelInfo>)> {
    let raw = maybe_decompress(bytes)?;
    let mut reader = PbfReader::new(&raw);

    let mut feature_sets = Vec::new();
    let mut labels = Vec::new();

    while let Some((field, wire_type)) = reader.next_field()? {
        if field == 3 && wire_type == WireType::LengthDelimited {
            let layer_bytes = reader.read_bytes()?;
            parse_layer(layer_bytes, tile, config, &mut feature_sets, &mut labels)?;
        } else {
            reader.skip(wire_type)?;
        }
    }

    Ok((feature_sets, labels))
}

struct RawFeature {
    kind: GeometryKind,
    tags: Vec<u64>,
    geometry: Vec<u64>,
}

fn parse_layer(
    bytes: &[u8],
    tile: TileCoord,
    config: &ParseConfig,
    feature_sets: &mut Vec<FeatureSet>,
    labels: &mut Vec<LabelInfo>,
) -> Result<()> {
    let mut reader = PbfReader::new(bytes);

    let mut name: Option<String> = None;
    let mut extent: u32 = 4096;
    let mut keys: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    let mut raw_features: Vec<RawFeature> = Vec::new();

    while let Some((field, wire_type)) = reader.next_field()? {
        match field {
            1 => name = Some(reader.read_string()?),
            2 => {
                let feature_bytes = reader.read_bytes()?;
                raw_features.push(parse_feature(feature_bytes)?);
            }
            3 => keys.push(reader.read_string()?),
            4 => {
                let value_bytes = reader.read_bytes()?;
                values.push(parse_value(value_bytes)?);
            }
            5 => extent = reader.read_varint()? as u32,
            15 => {
                reader.read_varint()?;
            }
            _ => reader.skip(wire_type)?,
        }
    }

    let layer_name = match name {
        Some(n) => n,
        None => return Err(TessError::MalformedTile("layer missing name".into())),
    };

    if !config.is_allowed(&layer_name) {
        debug!("skipping unallowed layer {layer_name}");
        return Ok(());
    }

    let mut point_rings = Vec::new();
    let mut line_rings = Vec::new();
    let mut polygon_rings = Vec::new();

    let is_label_layer = config.label_layers.contains(&layer_name);

    for feature in &raw_features {
        let rings = geometry::decode_command_stream(&feature.geometry, extent)?;
        match feature.kind {
            GeometryKind::Point => point_rings.extend(rings.clone()),
            GeometryKind::Line => line_rings.extend(rings.clone()),
            GeometryKind::Polygon => polygon_rings.extend(rings.clone()),
        }

        if is_label_layer && feature.kind == GeometryKind::Point {
            if let Some(first_ring) = rings.first() {
                if let Some(&(u, v)) = first_ring.first() {
                    let attrs = resolve_tags(&feature.tags, &keys, &values);
                    if let Some(text) = extract_label_text(&attrs, &config.label_attribute_keys) {
                        let priority = attrs
                            .get(config.priority_attribute_key.as_str())
                            .and_then(|v| v.as_f64())
                            .map(|v| v as f32)
                            .unwrap_or_else(|| {
                                *config
                                    .default_layer_priority
                                    .get(&layer_name)
                                    .unwrap_or(&0.0)
                            });
                        let span = (1u64 << tile.z) as f64;
                        let mx = (tile.x as f64 + u) / span;
                        let my = (tile.y as f64 + v) / span;
                        labels.push(LabelInfo {
                            text,
                            mx,
                            my,
                            layer: layer_name.clone(),
                            priority,
                        });
                    }
                }
            }
        }
    }

    if !point_rings.is_empty() {
        let mesh = geometry::build_points(&point_rings.iter().flatten().copied().collect::<Vec<_>>());
        feature_sets.push(FeatureSet {
            tile,
            layer: layer_name.clone(),
            kind: GeometryKind::Point,
            mesh,
        });
    }
    for ring in &line_rings {
        let mesh = geometry::build_line(ring);
        if !mesh.vertices.is_empty() {
            feature_sets.push(FeatureSet {
                tile,
                layer: layer_name.clone(),
                kind: GeometryKind::Line,
                mesh,
            });
        }
    }
    if !polygon_rings.is_empty() {
        let mesh = geometry::tessellate_polygon(&polygon_rings);
        if !mesh.vertices.is_empty() {
            feature_sets.push(FeatureSet {
                tile,
                layer: layer_name,
                kind: GeometryKind::Polygon,
                mesh,
            });
        }
    }

    Ok(())
}

fn resolve_tags(tags: &[u64], keys: &[String], values: &[Value]) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    let mut i = 0;
    while i + 1 < tags.len() {
        let key_idx = tags[i] as usize;
        let val_idx = tags[i + 1] as usize;
        if let (Some(k), Some(v)) = (keys.get(key_idx), values.get(val_idx)) {
            out.insert(k.clone(), v.clone());
        }
        i += 2;
    }
    out
}

fn extract_label_text(attrs: &HashMap<String, Value>, keys: &[String]) -> Option<String> {
    for key in keys {
        if let Some(v) = attrs.get(key) {
            return Some(v.as_text());
        }
    }
    None
}

fn parse_feature(bytes: &[u8]) -> Result<RawFeature> {
    let mut reader = PbfReader::new(bytes);
    let mut kind = GeometryKind::Point;
    let mut tags = Vec::new();
    let mut geometry_cmds = Vec::new();

    while let Some((field, wire_type)) = reader.next_field()? {
        match field {
            1 => {
                reader.read_varint()?;
            }
            2 => tags = reader.read_packed_varints()?,
            3 => {
                let v = reader.read_varint()?;
                kind = GeometryKind::from_mvt_type(v)
                    .ok_or_else(|| TessError::MalformedTile(format!("unknown geometry type {v}")))?;
            }
            4 => geometry_cmds = reader.read_packed_varints()?,
            _ => reader.skip(wire_type)?,
        }
    }

    Ok(RawFeature {
        kind,
        tags,
        geometry: geometry_cmds,
    })
}

fn parse_value(bytes: &[u8]) -> Result<Value> {
    let mut reader = PbfReader::new(bytes);
    while let Some((field, wire_type)) = reader.next_field()? {
        let value = match field {
            1 => Value::String(reader.read_string()?),
            2 => Value::Float(reader.read_float()?),
            3 => Value::Double(reader.read_double()?),
            4 => Value::Int(reader.read_varint()? as i64),
            5 => Value::UInt(reader.read_varint()?),
            6 => Value::SInt(reader.read_zigzag()?),
            7 => Value::Bool(reader.read_varint()? != 0),
            _ => {
                reader.skip(wire_type)?;
                continue;
            }
        };
        return Ok(value);
    }
    Err(TessError::MalformedTile("empty Value message".into()))
}
