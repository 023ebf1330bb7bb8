//! Tile fetch transport (C6). The HTTP client is out of scope for this core;
//! hosts inject their own transport by implementing [`TileFetcher`].

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::tile::TileCoord;

/// Future returned by [`TileFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Fetches the raw (optionally gzipped) MVT bytes for one tile.
pub trait TileFetcher: Send + Sync {
    fn fetch(&self, coord: TileCoord) -> FetchFuture<'_>;
}

/// Builds a URL from a `{z}/{x}/{y}` template.
pub fn format_tile_url(template: &str, coord: TileCoord) -> String {
    template
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tile_url_substitutes_all_placeholders() {
        let coord = TileCoord::new(1, 2, 3);
        let url = format_tile_url("https://host/data/v3/{z}/{x}/{y}.pbf", coord);
        assert_eq!(url, "https://host/data/v3/3/1/2.pbf");
    }
}
