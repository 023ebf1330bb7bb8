//! Geometry converter (C5): ring cleaning, polygon tessellation, line/point
//! conversion.
//!
//! All three pipelines consume points in tile-local `[0,1]` space and hand
//! back flat vertex/index pools suitable for a single indexed draw call.

use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers,
};
use tracing::warn;

use crate::error::{Result, TessError};

/// Dedup epsilon for ring cleaning, in tile-local `[0,1]` units.
const DEDUP_EPSILON: f64 = 1e-9;

/// Decodes an MVT geometry command stream (already unpacked into individual
/// varint values) into tile-local `[0,1]` rings.
///
/// Commands: `MoveTo=1` (starts a new ring, consumes `2*count` zigzag deltas),
/// `LineTo=2` (appends to the current ring, same encoding), `ClosePath=7`
/// (appends a copy of the ring's first vertex; carries no parameters). A
/// cursor `(cx, cy)` starts at `(0, 0)` and accumulates every delta; each
/// point is normalized by `extent` to tile-local `[0,1]`.
pub fn decode_command_stream(commands: &[u64], extent: u32) -> Result<Vec<Vec<(f64, f64)>>> {
    let extent = extent.max(1) as f64;
    let mut rings: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut cx: i64 = 0;
    let mut cy: i64 = 0;
    let mut i = 0usize;

    while i < commands.len() {
        let cmd_integer = commands[i];
        i += 1;
        let cmd_id = cmd_integer & 0x7;
        let count = cmd_integer >> 3;

        match cmd_id {
            1 => {
                // MoveTo: starts a new ring.
                if !current.is_empty() {
                    rings.push(std::mem::take(&mut current));
                }
                for _ in 0..count {
                    if i + 1 >= commands.len() {
                        return Err(TessError::MalformedTile(
                            "geometry command stream truncated in MoveTo".into(),
                        ));
                    }
                    let dx = zigzag_decode(commands[i]);
                    let dy = zigzag_decode(commands[i + 1]);
                    i += 2;
                    cx += dx;
                    cy += dy;
                    current.push((cx as f64 / extent, cy as f64 / extent));
                }
            }
            2 => {
                // LineTo: appends to the current ring.
                for _ in 0..count {
                    if i + 1 >= commands.len() {
                        return Err(TessError::MalformedTile(
                            "geometry command stream truncated in LineTo".into(),
                        ));
                    }
                    let dx = zigzag_decode(commands[i]);
                    let dy = zigzag_decode(commands[i + 1]);
                    i += 2;
                    cx += dx;
                    cy += dy;
                    current.push((cx as f64 / extent, cy as f64 / extent));
                }
            }
            7 => {
                // ClosePath: no parameters; append a copy of the first vertex.
                if let Some(&first) = current.first() {
                    current.push(first);
                }
            }
            other => {
                return Err(TessError::MalformedTile(format!(
                    "unknown geometry command id {other}"
                )));
            }
        }
    }

    if !current.is_empty() {
        rings.push(current);
    }
    Ok(rings)
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// A flat, indexed vertex pool ready for one draw call.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Tile-local `[0,1]` positions.
    pub vertices: Vec<[f32; 2]>,
    /// Triangle (polygon) or line-pair (line) indices into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// True if every index addresses a vertex actually present.
    pub fn indices_in_bounds(&self) -> bool {
        let len = self.vertices.len() as u32;
        self.indices.iter().all(|&i| i < len)
    }
}

/// Drops consecutive duplicate points (within [`DEDUP_EPSILON`]), then drops a
/// closing point that coincides with the first, per spec step 1-2.
fn clean_ring(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if let Some(&last) = out.last() {
            if dist(last, p) < DEDUP_EPSILON {
                continue;
            }
        }
        out.push(p);
    }
    if out.len() > 1 {
        let first = out[0];
        let last = *out.last().unwrap();
        if dist(first, last) < DEDUP_EPSILON {
            out.pop();
        }
    }
    out
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

struct VertexCtor;

impl FillVertexConstructor<[f32; 2]> for VertexCtor {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        let p = vertex.position();
        [p.x, p.y]
    }
}

/// Polygon pipeline: clean every ring, then tessellate the surviving rings with
/// even-odd winding. Self-intersections are tolerated (lyon's fill tessellator
/// synthesizes intersection vertices and includes them in the output pool).
///
/// On tessellator failure the ring group yields an empty mesh (logged, not
/// fatal), per the error taxonomy's `TessellatorFailure` handling.
pub fn tessellate_polygon(rings: &[Vec<(f64, f64)>]) -> MeshData {
    let cleaned: Vec<Vec<(f64, f64)>> = rings
        .iter()
        .map(|r| clean_ring(r))
        .filter(|r| r.len() >= 3)
        .collect();

    if cleaned.is_empty() {
        return MeshData::default();
    }

    let mut path_builder = Path::builder();
    for ring in &cleaned {
        let mut iter = ring.iter();
        let first = iter.next().unwrap();
        path_builder.begin(point(first.0 as f32, first.1 as f32));
        for p in iter {
            path_builder.line_to(point(p.0 as f32, p.1 as f32));
        }
        path_builder.end(true);
    }
    let path = path_builder.build();

    let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    let options = FillOptions::default().with_fill_rule(FillRule::EvenOdd);
    let result = tessellator.tessellate_path(
        &path,
        &options,
        &mut BuffersBuilder::new(&mut buffers, VertexCtor),
    );

    match result {
        Ok(_) => MeshData {
            vertices: buffers.vertices,
            indices: buffers.indices,
        },
        Err(e) => {
            warn!("polygon tessellation failed: {e:?}");
            MeshData::default()
        }
    }
}

/// Line pipeline: drop consecutive duplicates, emit `(i, i+1)` index pairs per
/// segment for a `GL_LINES`-style draw.
pub fn build_line(points: &[(f64, f64)]) -> MeshData {
    let cleaned = clean_consecutive_duplicates(points);
    let vertices: Vec<[f32; 2]> = cleaned
        .iter()
        .map(|&(x, y)| [x as f32, y as f32])
        .collect();
    let mut indices = Vec::new();
    for i in 0..vertices.len().saturating_sub(1) {
        indices.push(i as u32);
        indices.push((i + 1) as u32);
    }
    MeshData { vertices, indices }
}

fn clean_consecutive_duplicates(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if let Some(&last) = out.last() {
            if dist(last, p) < DEDUP_EPSILON {
                continue;
            }
        }
        out.push(p);
    }
    out
}

/// Point pipeline: emit one `(x, y)` per input point, no indices.
pub fn build_points(points: &[(f64, f64)]) -> MeshData {
    let vertices = points.iter().map(|&(x, y)| [x as f32, y as f32]).collect();
    MeshData {
        vertices,
        indices: Vec::new(),
    }
}

/// Sanity check that every index in a mesh addresses a vertex actually
/// present, catching a malformed tessellation before it reaches the GPU.
pub fn validate_mesh(mesh: &MeshData) -> Result<()> {
    if !mesh.indices_in_bounds() {
        return Err(crate::error::TessError::TessellatorFailure(
            "index out of vertex bounds".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_cleaning_scenario() {
        // duplicate point + close -> single triangle of 3 unique vertices
        // and 3 indices.
        let ring = vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ];
        let mesh = tessellate_polygon(&[ring]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert!(mesh.indices_in_bounds());
    }

    #[test]
    fn test_degenerate_ring_skipped() {
        let ring = vec![(0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        let mesh = tessellate_polygon(&[ring]);
        assert!(mesh.vertices.is_empty());
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn test_square_tessellates_to_two_triangles() {
        let ring = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let mesh = tessellate_polygon(&[ring]);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.indices_in_bounds());
    }

    #[test]
    fn test_line_emits_consecutive_pairs() {
        let points = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)];
        let mesh = build_line(&points);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_line_drops_consecutive_duplicates() {
        let points = vec![(0.0, 0.0), (0.0, 0.0), (1.0, 0.0)];
        let mesh = build_line(&points);
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, vec![0, 1]);
    }

    #[test]
    fn test_decode_command_stream_move_line_close() {
        // MoveTo(dx=2,dy=3), LineTo(dx=-1,dy=0), ClosePath — cursor trace
        // (0,0) -> (2,3) -> (1,3) -> back to (2,3).
        let commands = vec![
            (1 << 3) | 1, // MoveTo, count=1
            4,            // zigzag(2)
            6,            // zigzag(3)
            (1 << 3) | 2, // LineTo, count=1
            1,            // zigzag(-1)
            0,            // zigzag(0)
            (1 << 3) | 7, // ClosePath, count=1
        ];
        let rings = decode_command_stream(&commands, 1).unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0], vec![(2.0, 3.0), (1.0, 3.0), (2.0, 3.0)]);
    }

    #[test]
    fn test_decode_command_stream_truncated_is_malformed() {
        let commands = vec![(1 << 3) | 1, 4]; // MoveTo count=1 but missing dy
        assert!(matches!(
            decode_command_stream(&commands, 1),
            Err(TessError::MalformedTile(_))
        ));
    }

    #[test]
    fn test_decode_command_stream_normalizes_by_extent() {
        let commands = vec![(1 << 3) | 1, 8192, 0]; // MoveTo dx=4096
        let rings = decode_command_stream(&commands, 4096).unwrap();
        assert_eq!(rings[0][0], (1.0, 0.0));
    }

    #[test]
    fn test_points_passthrough() {
        let points = vec![(0.1, 0.2), (0.3, 0.4)];
        let mesh = build_points(&points);
        assert_eq!(mesh.vertices.len(), 2);
        assert!(mesh.indices.is_empty());
    }
}
