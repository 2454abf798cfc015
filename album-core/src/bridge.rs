use tracing::debug;

use crate::catalog::{NavigableSet, PhotoCatalog};
use crate::events::{EventBus, GalleryEvent, Subscription};
use crate::page::PageSurface;
use crate::viewport::{GalleryViewportController, Retarget};

/// Keeps the lightbox's navigable set in step with what the grid shows.
///
/// The bridge listens on the gallery bus instead of being called by the
/// filter, so any producer of visibility or layout changes is picked up.
pub struct MutationSyncBridge {
    subscription: Subscription,
    navigable: NavigableSet,
}

impl MutationSyncBridge {
    pub fn new(bus: &EventBus, catalog: &PhotoCatalog) -> Self {
        Self {
            subscription: bus.subscribe(),
            navigable: NavigableSet::from_catalog(catalog),
        }
    }

    pub fn navigable(&self) -> &NavigableSet {
        &self.navigable
    }

    /// Processes pending events. Returns whether the navigable set was
    /// rebuilt.
    pub fn sync(
        &mut self,
        catalog: &PhotoCatalog,
        viewport: &mut GalleryViewportController,
        page: &mut dyn PageSurface,
    ) -> bool {
        let stale = self.subscription.drain().iter().any(|event| {
            matches!(
                event,
                GalleryEvent::VisibilityChanged { .. }
                    | GalleryEvent::ViewModeChanged(_)
                    | GalleryEvent::CatalogReady { .. }
            )
        });
        if !stale {
            return false;
        }

        self.navigable = NavigableSet::from_catalog(catalog);
        let retarget = viewport.retarget(&self.navigable, page);
        if retarget != Retarget::Idle {
            debug!(?retarget, len = self.navigable.len(), "lightbox retargeted");
        }
        true
    }
}
