//! Map configuration surface: `MapOptions`, a plain `serde`-derived struct
//! with `Default` filling in the ambient knobs left to "reasonable
//! defaults" by callers that only care about the host-facing fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Construction and runtime options for a [`crate::Map`]: the host-facing
/// viewport/camera/style fields plus defaulted ambient fields
/// (`tile_cache_ttl_secs`, `max_concurrent_fetches`, `fetch_timeout_secs`,
/// `max_labels_processed`) that callers rarely need to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapOptions {
    pub viewport_w: f64,
    pub viewport_h: f64,
    pub center_lng: f64,
    pub center_lat: f64,
    pub zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_max_tile_zoom")]
    pub max_tile_zoom: u8,
    #[serde(default = "default_tile_buffer")]
    pub tile_buffer: i64,
    pub tile_url: String,
    #[serde(default)]
    pub layer_colors: HashMap<String, [f32; 4]>,
    #[serde(default)]
    pub disabled_layers: Vec<String>,

    /// Per-entry TTL for cached tiles, in seconds.
    #[serde(default = "default_tile_cache_ttl_secs")]
    pub tile_cache_ttl_secs: u64,
    /// Bound on in-flight tile fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_labels_processed")]
    pub max_labels_processed: usize,
}

fn default_min_zoom() -> f64 {
    0.0
}
fn default_max_zoom() -> f64 {
    22.0
}
fn default_max_tile_zoom() -> u8 {
    18
}
fn default_tile_buffer() -> i64 {
    1
}
fn default_tile_cache_ttl_secs() -> u64 {
    300
}
fn default_max_concurrent_fetches() -> usize {
    6
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_max_labels_processed() -> usize {
    2000
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            viewport_w: 1024.0,
            viewport_h: 768.0,
            center_lng: 0.0,
            center_lat: 0.0,
            zoom: 2.0,
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            max_tile_zoom: default_max_tile_zoom(),
            tile_buffer: default_tile_buffer(),
            tile_url: String::new(),
            layer_colors: HashMap::new(),
            disabled_layers: Vec::new(),
            tile_cache_ttl_secs: default_tile_cache_ttl_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_labels_processed: default_max_labels_processed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_fills_in_defaults() {
        let json = r#"{
            "viewport_w": 800.0,
            "viewport_h": 600.0,
            "center_lng": -122.4,
            "center_lat": 37.8,
            "zoom": 10.0,
            "tile_url": "https://host/{z}/{x}/{y}.pbf"
        }"#;
        let opts: MapOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.min_zoom, 0.0);
        assert_eq!(opts.max_zoom, 22.0);
        assert_eq!(opts.max_tile_zoom, 18);
        assert_eq!(opts.tile_buffer, 1);
        assert_eq!(opts.tile_cache_ttl_secs, 300);
        assert_eq!(opts.max_concurrent_fetches, 6);
        assert_eq!(opts.fetch_timeout_secs, 30);
        assert_eq!(opts.max_labels_processed, 2000);
    }

    #[test]
    fn test_explicit_fields_override_defaults() {
        let json = r#"{
            "viewport_w": 800.0,
            "viewport_h": 600.0,
            "center_lng": 0.0,
            "center_lat": 0.0,
            "zoom": 5.0,
            "tile_url": "https://host/{z}/{x}/{y}.pbf",
            "max_concurrent_fetches": 2,
            "disabled_layers": ["water"]
        }"#;
        let opts: MapOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.max_concurrent_fetches, 2);
        assert_eq!(opts.disabled_layers, vec!["water".to_string()]);
    }
}
