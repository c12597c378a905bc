use std::path::PathBuf;

use thiserror::Error;

/// Failures of the asset collaborator.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no asset matches '{name}'")]
    NotFound { name: String },
    #[error("failed to decode '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("strip '{name}' declares zero frames")]
    EmptyStrip { name: String },
}

/// Errors surfaced while assembling a game from configuration or assets.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("failed to parse manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("unknown sprite '{name}'")]
    UnknownSprite { name: String },
}
