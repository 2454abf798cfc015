pub mod auth;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod gallery;
pub mod page;
pub mod storage;
pub mod view_mode;
pub mod viewport;

pub use auth::{AuthGate, AuthOutcome, DigestGate, OpenGate};
pub use catalog::{
    AlbumSource, AssetNaming, CatalogProvider, NavigableSet, PhotoCard, PhotoCatalog, PhotoIndex,
    PhotoItem,
};
pub use config::GalleryConfig;
pub use error::{GalleryError, GalleryResult};
pub use events::{EventBus, GalleryEvent, Subscription};
pub use filter::{DateRangeFilterEngine, FilterRange, ResultsSummary, Severity};
pub use gallery::{Command, Gallery};
pub use page::{LightboxView, PageFeatures, PageState, PageSurface, SelectOption, Selector};
pub use storage::{origin_for_path, FileLocalStore, LocalStore, MemoryLocalStore, OriginId};
pub use view_mode::{ViewMode, ViewModeToggle};
pub use viewport::{Direction, GalleryViewportController, LightboxKey, ViewportState};
