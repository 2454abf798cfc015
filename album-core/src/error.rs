use thiserror::Error;

use crate::catalog::PhotoIndex;

/// Errors surfaced by gallery operations. Everything else is logged and
/// treated as a local no-op.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("position {position} is outside the navigable set of {len} photos")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("photo {0} is not part of the catalog")]
    UnknownPhoto(PhotoIndex),
}

pub type GalleryResult<T> = std::result::Result<T, GalleryError>;
