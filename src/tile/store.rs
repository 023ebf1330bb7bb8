//! Tile store (C6): keyed cache, async fetch planner, fallback lookup.
//!
//! `prune()` sweeps every entry rather than only peeking a bounded
//! structure's stale end, since eviction here needs to remove any Ready
//! entry past its TTL that also falls outside the current viewport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, TessError};
use crate::mvt::{self, FeatureSet, LabelInfo, ParseConfig};
use crate::tile::fetch::TileFetcher;
use crate::tile::{tiles_in_bounds, TileBounds, TileCoord};

/// Lifecycle state of one tile-store entry.
#[derive(Debug, Clone)]
pub enum TileState {
    Loading,
    Ready(Arc<TileData>),
    Failed,
}

/// Decoded contents of a `Ready` tile.
#[derive(Debug)]
pub struct TileData {
    pub coord: TileCoord,
    pub feature_sets: Vec<FeatureSet>,
    pub labels: Vec<LabelInfo>,
    pub loaded_at: Instant,
}

struct Entry {
    state: TileState,
    inserted_at: Instant,
}

/// Tuning knobs for the store.
#[derive(Debug, Clone)]
pub struct TileStoreConfig {
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: Duration,
    pub tile_ttl: Duration,
    pub tile_buffer: i64,
    pub max_tile_zoom: u8,
}

impl Default for TileStoreConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 6,
            fetch_timeout: Duration::from_secs(30),
            tile_ttl: Duration::from_secs(300),
            tile_buffer: 1,
            max_tile_zoom: 18,
        }
    }
}

/// The process-wide tile map. Mutations are serialized under a single mutex;
/// readers take the same mutex briefly to snapshot handles to `Ready` tiles.
pub struct TileStore {
    entries: Mutex<HashMap<String, Entry>>,
    config: TileStoreConfig,
}

impl TileStore {
    pub fn new(config: TileStoreConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Given the viewport bbox and continuous camera zoom, enumerates tiles
    /// to plan (target span + buffer ring, plus parent/grandparent
    /// fallbacks), inserts `Loading` placeholders for any key not already
    /// present, and dispatches a fetch task for each newly-inserted key.
    ///
    /// Inserting a `Loading` placeholder before dispatch guarantees at most
    /// one in-flight fetch per key: a second planning pass observes the
    /// `Loading` entry and does not redispatch.
    pub async fn plan<F: TileFetcher + 'static>(
        &self,
        bounds: &TileBounds,
        z_cam: f64,
        fetcher: Arc<F>,
        parse_config: Arc<ParseConfig>,
        store: Arc<TileStore>,
    ) {
        let z = (z_cam.floor() as i64).clamp(0, self.config.max_tile_zoom as i64) as u8;
        let target_tiles = tiles_in_bounds(bounds, z, self.config.tile_buffer);

        let mut to_fetch: Vec<TileCoord> = Vec::new();
        for &coord in &target_tiles {
            to_fetch.push(coord);
            if let Some(parent) = coord.parent() {
                to_fetch.push(parent);
                if let Some(grandparent) = parent.parent() {
                    to_fetch.push(grandparent);
                }
            }
        }
        to_fetch.sort_by_key(|c| (c.z, c.x, c.y));
        to_fetch.dedup();

        let newly_planned: Vec<TileCoord> = {
            let mut entries = self.entries.lock();
            to_fetch
                .into_iter()
                .filter(|coord| {
                    let key = coord.to_string();
                    if entries.contains_key(&key) {
                        false
                    } else {
                        entries.insert(
                            key,
                            Entry {
                                state: TileState::Loading,
                                inserted_at: Instant::now(),
                            },
                        );
                        true
                    }
                })
                .collect()
        };

        stream::iter(newly_planned.into_iter().map(|coord| {
            let fetcher = Arc::clone(&fetcher);
            let parse_config = Arc::clone(&parse_config);
            let store = Arc::clone(&store);
            async move {
                store.dispatch_fetch(coord, fetcher, parse_config).await;
            }
        }))
        .buffer_unordered(self.config.max_concurrent_fetches)
        .collect::<Vec<()>>()
        .await;
    }

    async fn dispatch_fetch<F: TileFetcher>(
        &self,
        coord: TileCoord,
        fetcher: Arc<F>,
        parse_config: Arc<ParseConfig>,
    ) {
        let key = coord.to_string();
        let result = tokio::time::timeout(self.config.fetch_timeout, fetcher.fetch(coord)).await;

        // 404/410 (`NotFound`) is a legitimate empty tile, not a failure: it
        // becomes `Ready` with zero feature sets rather than dropping the
        // entry for retry. Every other error (network, timeout, malformed
        // payload) drops the entry so the next viewport update retries it.
        let outcome = match result {
            Ok(Ok(bytes)) => Some(self.finish_fetch(coord, &bytes, &parse_config)),
            Ok(Err(TessError::NotFound { .. })) => Some(Some(empty_tile_data(coord))),
            Ok(Err(e)) => {
                warn!("tile fetch failed for {key}: {e}");
                None
            }
            Err(_) => {
                warn!("tile fetch timed out for {key}");
                None
            }
        };

        let mut entries = self.entries.lock();
        match outcome {
            Some(Some(data)) => {
                entries.insert(
                    key,
                    Entry {
                        state: TileState::Ready(Arc::new(data)),
                        inserted_at: Instant::now(),
                    },
                );
            }
            Some(None) | None => {
                // Remove rather than mark Failed-forever, permitting retry on
                // the next viewport update.
                entries.remove(&key);
            }
        }
    }

    fn finish_fetch(&self, coord: TileCoord, bytes: &[u8], parse_config: &ParseConfig) -> Option<TileData> {
        match mvt::parse_tile(bytes, coord, parse_config) {
            Ok((feature_sets, labels)) => Some(TileData {
                coord,
                feature_sets,
                labels,
                loaded_at: Instant::now(),
            }),
            Err(e) => {
                debug!("tile {coord} malformed, treating as Failed: {e}");
                None
            }
        }
    }

    /// For each viewport tile, returns the first `Ready` ancestor on the
    /// chain (self, parent, grandparent, ..., up to z=0), deduplicated.
    /// Implements overzoom fallback: a coarser ancestor stands in while the
    /// requested tile is still loading, with no popping holes.
    pub fn renderable_tiles(&self, viewport_tiles: &[TileCoord]) -> Vec<Arc<TileData>> {
        let entries = self.entries.lock();
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for &vt in viewport_tiles {
            for ancestor in vt.ancestors() {
                let key = ancestor.to_string();
                if let Some(Entry {
                    state: TileState::Ready(data),
                    ..
                }) = entries.get(&key)
                {
                    if seen.insert(ancestor) {
                        out.push(Arc::clone(data));
                    }
                    break;
                }
            }
        }
        out
    }

    /// Removes `Ready` entries older than `self.config.tile_ttl` and not in
    /// `current_viewport`.
    pub fn prune(&self, current_viewport: &[TileCoord]) {
        let keep: std::collections::HashSet<String> =
            current_viewport.iter().map(|c| c.to_string()).collect();
        let ttl = self.config.tile_ttl;
        let now = Instant::now();

        let mut entries = self.entries.lock();
        entries.retain(|key, entry| {
            let is_stale_ready = matches!(entry.state, TileState::Ready(_))
                && now.duration_since(entry.inserted_at) > ttl;
            !(is_stale_ready && !keep.contains(key))
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_of(&self, coord: TileCoord) -> Option<TileStateKind> {
        self.entries.lock().get(&coord.to_string()).map(|e| match e.state {
            TileState::Loading => TileStateKind::Loading,
            TileState::Ready(_) => TileStateKind::Ready,
            TileState::Failed => TileStateKind::Failed,
        })
    }

    #[cfg(test)]
    fn insert_ready_for_test(&self, coord: TileCoord, data: TileData) {
        self.entries.lock().insert(
            coord.to_string(),
            Entry {
                state: TileState::Ready(Arc::new(data)),
                inserted_at: Instant::now(),
            },
        );
    }
}

/// A `Ready` tile with no content, per §6's 404/410 handling.
fn empty_tile_data(coord: TileCoord) -> TileData {
    TileData {
        coord,
        feature_sets: Vec::new(),
        labels: Vec::new(),
        loaded_at: Instant::now(),
    }
}

/// Public snapshot of entry state, for host/test introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStateKind {
    Loading,
    Ready,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::fetch::FetchFuture;

    struct NotFoundFetcher;
    impl TileFetcher for NotFoundFetcher {
        fn fetch(&self, coord: TileCoord) -> FetchFuture<'_> {
            Box::pin(async move {
                Err(TessError::NotFound {
                    x: coord.x,
                    y: coord.y,
                    z: coord.z,
                })
            })
        }
    }

    struct AlwaysFailFetcher;
    impl TileFetcher for AlwaysFailFetcher {
        fn fetch(&self, coord: TileCoord) -> FetchFuture<'_> {
            Box::pin(async move {
                Err(TessError::Network {
                    x: coord.x,
                    y: coord.y,
                    z: coord.z,
                    message: "connection reset".into(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_not_found_becomes_ready_empty_tile() {
        let store = TileStore::new(TileStoreConfig::default());
        let coord = TileCoord::new(0, 0, 0);
        store
            .dispatch_fetch(coord, Arc::new(NotFoundFetcher), Arc::new(test_parse_config()))
            .await;
        assert_eq!(store.state_of(coord), Some(TileStateKind::Ready));
        let renderable = store.renderable_tiles(&[coord]);
        assert_eq!(renderable.len(), 1);
        assert!(renderable[0].feature_sets.is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_drops_entry_for_retry() {
        let store = TileStore::new(TileStoreConfig::default());
        let coord = TileCoord::new(0, 0, 0);
        store
            .entries
            .lock()
            .insert(coord.to_string(), Entry { state: TileState::Loading, inserted_at: Instant::now() });
        store
            .dispatch_fetch(coord, Arc::new(AlwaysFailFetcher), Arc::new(test_parse_config()))
            .await;
        assert_eq!(store.state_of(coord), None);
    }

    fn test_parse_config() -> ParseConfig {
        ParseConfig {
            layer_allowlist: std::collections::HashSet::new(),
            label_layers: std::collections::HashSet::new(),
            label_attribute_keys: Vec::new(),
            priority_attribute_key: "rank".to_string(),
            default_layer_priority: HashMap::new(),
        }
    }

    fn empty_tile_data(coord: TileCoord) -> TileData {
        TileData {
            coord,
            feature_sets: Vec::new(),
            labels: Vec::new(),
            loaded_at: Instant::now(),
        }
    }

    #[test]
    fn test_renderable_tiles_overzoom_fallback() {
        // Only (2,1,2) is Ready; viewport wants (8,4,4), a descendant four
        // levels down. renderable_tiles must return exactly {(2,1,2)}.
        let store = TileStore::new(TileStoreConfig::default());
        let ancestor = TileCoord::new(2, 1, 2);
        store.insert_ready_for_test(ancestor, empty_tile_data(ancestor));

        let viewport_tile = TileCoord::new(8, 4, 4);
        assert!(viewport_tile.ancestors().contains(&ancestor));

        let renderable = store.renderable_tiles(&[viewport_tile]);
        assert_eq!(renderable.len(), 1);
        assert_eq!(renderable[0].coord, ancestor);
    }

    #[test]
    fn test_renderable_tiles_dedups_shared_ancestor() {
        let store = TileStore::new(TileStoreConfig::default());
        let ancestor = TileCoord::new(0, 0, 1);
        store.insert_ready_for_test(ancestor, empty_tile_data(ancestor));

        let children = ancestor.children();
        let renderable = store.renderable_tiles(&[children[0], children[1]]);
        assert_eq!(renderable.len(), 1);
    }

    #[test]
    fn test_renderable_tiles_empty_when_no_ancestor_ready() {
        let store = TileStore::new(TileStoreConfig::default());
        let renderable = store.renderable_tiles(&[TileCoord::new(1, 1, 3)]);
        assert!(renderable.is_empty());
    }

    #[test]
    fn test_prune_keeps_viewport_tiles_regardless_of_age() {
        let store = TileStore::new(TileStoreConfig {
            tile_ttl: Duration::from_secs(0),
            ..TileStoreConfig::default()
        });
        let coord = TileCoord::new(1, 1, 2);
        store.insert_ready_for_test(coord, empty_tile_data(coord));
        std::thread::sleep(Duration::from_millis(5));
        store.prune(&[coord]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prune_removes_stale_entries_outside_viewport() {
        let store = TileStore::new(TileStoreConfig {
            tile_ttl: Duration::from_millis(1),
            ..TileStoreConfig::default()
        });
        let coord = TileCoord::new(1, 1, 2);
        store.insert_ready_for_test(coord, empty_tile_data(coord));
        std::thread::sleep(Duration::from_millis(10));
        store.prune(&[]);
        assert_eq!(store.len(), 0);
    }
}
