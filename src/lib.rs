//! # tessera-map
//!
//! Real-time vector-tile map renderer: MVT decoding, camera/projection math,
//! tile lifecycle, draw-batching and label placement. The crate owns none of
//! the GPU API binding, windowing, or HTTP client -- a host drives those and
//! calls into [`Map`] for everything above that seam.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tessera_map::{Map, MapOptions};
//!
//! let options = MapOptions {
//!     viewport_w: 1024.0,
//!     viewport_h: 768.0,
//!     center_lng: -122.42,
//!     center_lat: 37.77,
//!     zoom: 12.0,
//!     tile_url: "https://host/data/v3/{z}/{x}/{y}.pbf".to_string(),
//!     ..MapOptions::default()
//! };
//! let map = Map::new(options);
//! ```

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod camera;
pub mod config;
pub mod error;
pub mod interaction;
pub mod labels;
pub mod layers;
pub mod mercator;
pub mod mvt;
pub mod renderer;
pub mod tile;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use palette::Srgba;

pub use config::MapOptions;
pub use error::{Result, TessError};

use camera::Camera;
use interaction::debounce::DebounceState;
use interaction::{InputEvent, InteractionState};
use labels::atlas::GlyphAtlas;
use labels::{LabelCache, LabelEngine, LabelFrame};
use layers::{LayerBatcher, LayerDraw, LayerStyle};
use mvt::ParseConfig;
use renderer::FrameClock;
use tile::fetch::TileFetcher;
use tile::store::{TileStore, TileStoreConfig};
use tile::{tiles_in_bounds, TileCoord};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Zoom-delta-per-event threshold above which planning runs immediately
/// rather than waiting for the debounce window.
const IMMEDIATE_ZOOM_DELTA: f64 = 0.5;

/// Per-frame output: the ordered layer draws and placed labels, ready for a
/// host to upload and issue draw calls against.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub draws: Vec<LayerDraw>,
    pub labels: LabelFrame,
}

/// Top-level map host API. Owns the camera, tile store, layer
/// style, label engine/cache, and interaction/debounce state; a host drives
/// it with [`Map::on_input`], [`Map::on_resize`], and [`Map::render`].
pub struct Map {
    camera: Camera,
    tile_store: Arc<TileStore>,
    parse_config: Arc<ParseConfig>,
    layer_style: LayerStyle,
    disabled_layers: HashSet<String>,
    label_engine: LabelEngine,
    label_cache: LabelCache,
    /// Set via [`Map::load_glyph_atlas`]; until then, `render()` places
    /// labels but emits no glyph quads (`Frame.labels.quads` stays empty).
    glyph_atlas: Option<Arc<GlyphAtlas>>,
    interaction: InteractionState,
    debounce: DebounceState,
    /// Set by pan or large-zoom input; consumed (and cleared) by the next
    /// [`Map::render`] regardless of the debounce phase, which otherwise
    /// only gates rotation/pitch.
    immediate_replan: bool,
    frame_clock: FrameClock,
    tile_url: String,
    max_tile_zoom: u8,
}

impl Map {
    /// Constructs a new map from [`MapOptions`]. Does not fetch any tiles --
    /// the first [`Map::render`] call triggers planning once the debounce
    /// state settles to `Idle`.
    pub fn new(options: MapOptions) -> Self {
        let (center_mx, center_my) = mercator::from_lnglat(options.center_lng, options.center_lat);
        let mut camera = Camera::new(center_mx, center_my, options.zoom, options.viewport_w, options.viewport_h);
        camera.min_zoom = options.min_zoom;
        camera.max_zoom = options.max_zoom;

        let layer_style = LayerStyle::new(
            options
                .layer_colors
                .iter()
                .map(|(name, &[r, g, b, a])| (name.clone(), Srgba::new(r, g, b, a)))
                .collect(),
        );

        let tile_store_config = TileStoreConfig {
            max_concurrent_fetches: options.max_concurrent_fetches,
            fetch_timeout: std::time::Duration::from_secs(options.fetch_timeout_secs),
            tile_ttl: std::time::Duration::from_secs(options.tile_cache_ttl_secs),
            tile_buffer: options.tile_buffer,
            max_tile_zoom: options.max_tile_zoom,
        };

        Self {
            camera,
            tile_store: Arc::new(TileStore::new(tile_store_config)),
            parse_config: Arc::new(default_parse_config()),
            layer_style,
            disabled_layers: options.disabled_layers.into_iter().collect(),
            label_engine: LabelEngine::new(options.max_labels_processed),
            label_cache: LabelCache::new(),
            glyph_atlas: None,
            interaction: InteractionState::new(),
            debounce: DebounceState::new(),
            immediate_replan: false,
            frame_clock: FrameClock::new(),
            tile_url: options.tile_url,
            max_tile_zoom: options.max_tile_zoom,
        }
    }

    /// Feeds one input event to the interaction/debounce state machines and
    /// applies its effect to the camera (pan on drag, zoom-at-anchor on
    /// wheel/pinch).
    pub fn on_input(&mut self, event: InputEvent) {
        let now = Instant::now();
        match event {
            InputEvent::PointerMove { .. } if self.interaction.pointer_down => {
                let before = self.interaction.drag_delta();
                self.interaction.handle_event(event);
                if let (Some(before), Some(after)) = (before, self.interaction.drag_delta()) {
                    let step = after - before;
                    if step.length() > 0.0 {
                        self.camera.pan(-step.x, -step.y);
                        // Panning always plans immediately -- it never waits
                        // on the rotate/pitch debounce window.
                        self.immediate_replan = true;
                    }
                }
                self.debounce.notify_activity(now);
            }
            InputEvent::PointerDown { .. } => {
                self.interaction.handle_event(event);
                self.debounce.notify_activity(now);
            }
            InputEvent::PointerUp { .. } => {
                self.interaction.handle_event(event);
                self.debounce.notify_settled(now);
            }
            InputEvent::Wheel { delta } => {
                let (sx, sy) = self
                    .interaction
                    .pointer_position
                    .map(|p| (p.x, p.y))
                    .unwrap_or((self.camera.viewport_w / 2.0, self.camera.viewport_h / 2.0));
                self.camera.zoom_at(delta, sx, sy);
                if delta.abs() > IMMEDIATE_ZOOM_DELTA {
                    self.immediate_replan = true;
                }
                self.debounce.notify_activity(now);
                self.debounce.notify_settled(now);
            }
            InputEvent::Pinch { scale, center } => {
                let delta = scale.ln();
                self.camera.zoom_at(delta, center.x, center.y);
                if delta.abs() > IMMEDIATE_ZOOM_DELTA {
                    self.immediate_replan = true;
                }
                self.debounce.notify_activity(now);
                self.debounce.notify_settled(now);
            }
            InputEvent::Rotate { angle_degrees, .. } => {
                // Rotation is the one interaction that genuinely wants to be
                // deferred: tile bboxes shift less under bearing change than
                // under translation, so planning waits for
                // `DebounceState::should_replan` to clear the 500ms window
                // instead of setting `immediate_replan`.
                self.camera.set_bearing(self.camera.bearing + angle_degrees);
                self.debounce.notify_activity(now);
                self.debounce.notify_settled(now);
            }
            InputEvent::Pitch { delta_degrees } => {
                // Pitch defers the same as rotation: it tilts the view rather
                // than translating it, so tile bboxes move less than under a
                // pan.
                self.camera.set_pitch(self.camera.pitch + delta_degrees);
                self.debounce.notify_activity(now);
                self.debounce.notify_settled(now);
            }
            _ => {
                self.interaction.handle_event(event);
            }
        }
    }

    /// Updates the viewport size on both the camera and future tile plans.
    pub fn on_resize(&mut self, w: f64, h: f64) {
        self.camera.resize(w, h);
    }

    /// Overrides a layer's fill color at runtime.
    pub fn set_layer_color(&mut self, name: &str, rgba: [f32; 4]) {
        self.layer_style
            .colors
            .insert(name.to_string(), Srgba::new(rgba[0], rgba[1], rgba[2], rgba[3]));
    }

    /// Hides a layer from the batched output without affecting its fetch or
    /// parse (disabled layers are still decoded; they are just not drawn).
    pub fn disable_layer(&mut self, name: &str) {
        self.disabled_layers.insert(name.to_string());
    }

    /// Rasterizes `font_bytes` into a glyph atlas and switches future
    /// [`Map::render`] calls to emit text quads against it. Without calling
    /// this, labels still place but `Frame.labels.quads` stays empty.
    pub fn load_glyph_atlas(&mut self, font_bytes: &[u8], px: f32) -> Result<()> {
        self.glyph_atlas = Some(Arc::new(GlyphAtlas::build(font_bytes, px)?));
        Ok(())
    }

    /// Advances the frame clock, plans/prunes tiles once the camera has
    /// settled (or immediately, for pan/large-zoom input), and returns the
    /// batched draws and placed labels for this frame. `fetcher` is the
    /// host-supplied async-HTTP transport.
    pub async fn render<F: TileFetcher + 'static>(&mut self, dt: f32, fetcher: Arc<F>) -> Frame {
        self.frame_clock.begin_frame(dt);
        self.debounce.tick(Instant::now());

        let bounds = self.camera.bounds();
        let viewport_tiles = tiles_in_bounds(&bounds, self.viewport_zoom(), 0);

        // Pan and large zoom steps plan immediately regardless of debounce
        // phase; rotation/pitch only plan once the debounce window has
        // elapsed.
        if self.immediate_replan || self.debounce.should_replan() {
            self.immediate_replan = false;
            self.tile_store
                .plan(
                    &bounds,
                    self.camera.zoom,
                    Arc::clone(&fetcher),
                    Arc::clone(&self.parse_config),
                    Arc::clone(&self.tile_store),
                )
                .await;
            self.tile_store.prune(&viewport_tiles);
        }

        let renderable = self.tile_store.renderable_tiles(&viewport_tiles);
        let mut draws = LayerBatcher::batch(&self.camera, &renderable, &self.layer_style);
        draws.retain(|draw| !self.disabled_layers.contains(&draw.layer));

        let labels = renderable.iter().flat_map(|t| t.labels.iter());
        let label_frame = self.label_engine.place(
            &self.camera,
            labels,
            renderable.len(),
            self.glyph_atlas.as_deref(),
            &mut self.label_cache,
        );

        Frame { draws, labels: label_frame }
    }

    /// Camera-tile zoom to plan/render at: the floor of the continuous zoom,
    /// clamped to `max_tile_zoom`.
    fn viewport_zoom(&self) -> u8 {
        (self.camera.zoom.floor() as i64).clamp(0, self.max_tile_zoom as i64) as u8
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The tile URL template this map was constructed with, for a host that
    /// wants to build its own [`TileFetcher`] against it.
    pub fn tile_url(&self) -> &str {
        &self.tile_url
    }
}

/// Built-in parse configuration: accepts every layer (empty allowlist),
/// treats `place` and `housenumber` layers as label sources, matching the
/// common MVT schema (e.g. OpenMapTiles) this crate targets.
fn default_parse_config() -> ParseConfig {
    let mut default_layer_priority = std::collections::HashMap::new();
    default_layer_priority.insert("place".to_string(), 10.0);
    default_layer_priority.insert("housenumber".to_string(), 1.0);

    ParseConfig {
        layer_allowlist: HashSet::new(),
        label_layers: ["place", "housenumber"].iter().map(|s| s.to_string()).collect(),
        label_attribute_keys: vec!["name".to_string(), "name:en".to_string(), "housenumber".to_string()],
        priority_attribute_key: "rank".to_string(),
        default_layer_priority,
    }
}

/// Builds a fetch URL for `coord` against `tile_url`'s `{z}/{x}/{y}` template.
pub fn tile_url_for(tile_url: &str, coord: TileCoord) -> String {
    tile::fetch::format_tile_url(tile_url, coord)
}

/// Re-exports of the handful of types a host actually touches.
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::config::MapOptions;
    pub use crate::error::{Result, TessError};
    pub use crate::interaction::{InputEvent, PointerButton};
    pub use crate::tile::fetch::TileFetcher;
    pub use crate::{Frame, Map};
}
