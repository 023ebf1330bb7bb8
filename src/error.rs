//! Error types for the map renderer.

use thiserror::Error;

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, TessError>;

/// Errors that can occur across the renderer core.
#[derive(Error, Debug)]
pub enum TessError {
    /// Tile fetch failed (network, timeout, 5xx).
    #[error("network error fetching tile {x}/{y}/{z}: {message}")]
    Network {
        x: u32,
        y: u32,
        z: u8,
        message: String,
    },

    /// Tile server returned 404/410: the tile legitimately has no content at
    /// this coordinate. Handled as a `Ready` tile with zero feature sets,
    /// not a retry-eligible failure.
    #[error("tile {x}/{y}/{z} not found")]
    NotFound { x: u32, y: u32, z: u8 },

    /// Gzip decompression of a tile payload failed.
    #[error("failed to decompress tile payload: {0}")]
    Decompress(String),

    /// The PBF/MVT byte stream was malformed or truncated.
    #[error("malformed tile payload: {0}")]
    MalformedTile(String),

    /// A polygon or line ring failed cleanup (degenerate after dedup).
    #[error("malformed geometry ring: {0}")]
    MalformedRing(String),

    /// The polygon tessellator rejected a ring group.
    #[error("tessellation failed: {0}")]
    TessellatorFailure(String),

    /// A layer name not present in the caller's allowlist.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// Shader compilation failed at startup. Fatal.
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    /// The host's GPU context was lost (device removed, surface lost).
    #[error("GPU host context lost: {0}")]
    HostContextLost(String),

    /// Invalid `MapOptions` at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (config loading, local asset reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (config deserialization).
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TessError {
    /// Whether the map can recover by retrying or simply continuing to render.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TessError::Network { .. }
                | TessError::NotFound { .. }
                | TessError::Decompress(_)
                | TessError::MalformedTile(_)
                | TessError::MalformedRing(_)
                | TessError::TessellatorFailure(_)
                | TessError::UnknownLayer(_)
                | TessError::HostContextLost(_)
        )
    }

    /// Whether the error requires aborting startup. Per the error taxonomy, only
    /// shader compilation failure (and a missing viewport, surfaced as
    /// `InvalidConfig`) is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TessError::ShaderCompile(_) | TessError::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recoverability() {
        let recoverable = TessError::Network {
            x: 0,
            y: 0,
            z: 0,
            message: "timeout".into(),
        };
        assert!(recoverable.is_recoverable());
        assert!(!recoverable.is_fatal());

        let fatal = TessError::ShaderCompile("link error".into());
        assert!(!fatal.is_recoverable());
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_malformed_tile_is_recoverable() {
        let e = TessError::MalformedTile("truncated varint".into());
        assert!(e.is_recoverable());
    }
}
