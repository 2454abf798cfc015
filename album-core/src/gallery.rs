use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::bridge::MutationSyncBridge;
use crate::catalog::{NavigableSet, PhotoCatalog, PhotoIndex};
use crate::error::GalleryResult;
use crate::events::{EventBus, GalleryEvent, Subscription};
use crate::filter::{DateRangeFilterEngine, FilterOutcome, FilterRange};
use crate::page::{PageSurface, Selector};
use crate::storage::LocalStore;
use crate::view_mode::{ViewMode, ViewModeToggle};
use crate::viewport::{Activation, Direction, GalleryViewportController, LightboxKey, ViewportState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A selector changed; the filter re-applies and saves immediately.
    SetSelector { selector: Selector, value: String },
    ApplyFilter,
    ClearFilter,
    ToggleViewMode,
    SetViewMode(ViewMode),
    ActivateCard { photo: PhotoIndex },
    HoverCard { photo: PhotoIndex },
    OpenAt { position: usize },
    Navigate(Direction),
    CloseLightbox,
    LightboxKey(LightboxKey),
    BackdropClick,
}

/// One page session: the catalog, every feature working on it, and the page
/// they draw into.
pub struct Gallery<P: PageSurface> {
    catalog: PhotoCatalog,
    page: P,
    filter: DateRangeFilterEngine,
    view: ViewModeToggle,
    viewport: GalleryViewportController,
    bridge: MutationSyncBridge,
    bus: EventBus,
    lifecycle: Subscription,
}

impl<P: PageSurface> Gallery<P> {
    pub fn new(
        catalog: PhotoCatalog,
        page: P,
        store: Arc<dyn LocalStore>,
        detail_marker: impl Into<String>,
    ) -> Self {
        let bus = EventBus::new();
        let bridge = MutationSyncBridge::new(&bus, &catalog);
        let lifecycle = bus.subscribe();
        Self {
            catalog,
            page,
            filter: DateRangeFilterEngine::new(store.clone()),
            view: ViewModeToggle::new(store),
            viewport: GalleryViewportController::new(detail_marker),
            bridge,
            bus,
            lifecycle,
        }
    }

    /// Populates the filter panel, restores saved preferences and announces
    /// the catalog. Page parts that are missing switch off their feature
    /// only.
    #[instrument(skip(self))]
    pub fn init(&mut self) -> GalleryResult<()> {
        let features = self.page.features();
        if features.filter_panel {
            self.filter.populate(&self.catalog);
            for selector in Selector::ALL {
                let options = self.filter.options(selector);
                self.page.set_options(selector, &options);
            }
            self.page.set_selector_values(self.filter.range());
            let mode = self.view.restore();
            self.page.set_view_mode(mode);
        } else {
            warn!("filter panel missing; date filter and view toggle disabled");
        }
        if !features.photo_grid {
            warn!("photo grid missing");
        }
        if !features.lightbox {
            warn!("lightbox missing; cards will not open");
        }

        let total = self.catalog.len();
        let dated = self
            .catalog
            .iter()
            .filter(|item| item.year_month().is_some())
            .count();
        info!(
            total,
            dated,
            years = ?DateRangeFilterEngine::extract_years(&self.catalog),
            "catalog ready"
        );
        self.bus.publish(GalleryEvent::CatalogReady { total });
        self.settle()
    }

    pub fn apply(&mut self, command: Command) -> GalleryResult<()> {
        let features = self.page.features();
        debug!(?command, "apply");
        match command {
            Command::SetSelector { selector, value } if features.filter_panel => {
                self.filter.set_selector(selector, &value);
                self.page.set_selector_values(self.filter.range());
                self.run_filter();
            }
            Command::ApplyFilter if features.filter_panel => {
                self.run_filter();
            }
            Command::ClearFilter if features.filter_panel => {
                self.clear_filter();
            }
            Command::ToggleViewMode if features.filter_panel => {
                self.set_view_mode(self.view.mode().toggled());
            }
            Command::SetViewMode(mode) if features.filter_panel => {
                self.set_view_mode(mode);
            }
            Command::ActivateCard { photo } => {
                let activation = match self.viewport.detail_link(photo, &self.catalog)? {
                    Some(href) => Activation::FollowLink { href },
                    None if features.lightbox => self.viewport.activate(
                        photo,
                        self.bridge.navigable(),
                        &self.catalog,
                        &mut self.page,
                    )?,
                    None => Activation::Ignored,
                };
                match activation {
                    Activation::Opened { position } => {
                        self.bus
                            .publish(GalleryEvent::LightboxOpened { photo, position });
                    }
                    Activation::FollowLink { href } => {
                        self.bus.publish(GalleryEvent::FollowLink { href });
                    }
                    Activation::Ignored => {}
                }
            }
            Command::HoverCard { photo } if features.lightbox => {
                self.viewport
                    .hover(photo, self.bridge.navigable(), &self.catalog, &mut self.page);
            }
            Command::OpenAt { position } if features.lightbox => {
                self.viewport.open(
                    self.bridge.navigable(),
                    &self.catalog,
                    position,
                    &mut self.page,
                )?;
                self.publish_viewport(true);
            }
            Command::Navigate(direction) => {
                let moved = self.viewport.navigate(
                    direction,
                    self.bridge.navigable(),
                    &self.catalog,
                    &mut self.page,
                )?;
                if moved {
                    self.publish_viewport(false);
                }
            }
            Command::LightboxKey(key) => {
                let was_open = self.viewport.is_open();
                let changed = self.viewport.handle_key(
                    key,
                    self.bridge.navigable(),
                    &self.catalog,
                    &mut self.page,
                )?;
                if changed {
                    self.publish_viewport(!was_open);
                }
            }
            Command::CloseLightbox | Command::BackdropClick => {
                if self.viewport.close(&mut self.page) {
                    self.bus.publish(GalleryEvent::LightboxClosed);
                }
            }
            other => {
                debug!(command = ?other, "feature disabled, command ignored");
            }
        }
        self.settle()
    }

    pub fn catalog(&self) -> &PhotoCatalog {
        &self.catalog
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn navigable(&self) -> &NavigableSet {
        self.bridge.navigable()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.viewport.state()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn filter_range(&self) -> &FilterRange {
        self.filter.range()
    }

    pub fn years(&self) -> &[i32] {
        self.filter.years()
    }

    /// Event feed for the host, starting now.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn run_filter(&mut self) -> FilterOutcome {
        let outcome = self.filter.apply(&mut self.catalog);
        self.push_visibility();
        if self.page.features().results_slot {
            self.page.show_results(&outcome.summary);
        }
        self.bus.publish(GalleryEvent::VisibilityChanged {
            visible: outcome.navigable.clone(),
        });
        self.bus.publish(GalleryEvent::ResultsChanged(Some(outcome.summary)));
        if let Err(err) = self.filter.save() {
            warn!(?err, "failed to save filter");
        }
        outcome
    }

    fn clear_filter(&mut self) {
        self.filter.clear(&mut self.catalog);
        self.page.set_selector_values(self.filter.range());
        self.push_visibility();
        self.page.hide_results();
        self.bus.publish(GalleryEvent::VisibilityChanged {
            visible: self.catalog.iter().map(|item| item.index).collect(),
        });
        self.bus.publish(GalleryEvent::ResultsChanged(None));
        if let Err(err) = self.filter.forget() {
            warn!(?err, "failed to remove saved filter");
        }
    }

    fn restore_filter(&mut self) {
        if !self.page.features().filter_panel {
            return;
        }
        let Some(range) = self.filter.load() else {
            return;
        };
        debug!(?range, "restoring saved filter");
        self.filter.set_range(range);
        self.page.set_selector_values(self.filter.range());
        self.run_filter();
    }

    fn set_view_mode(&mut self, mode: ViewMode) {
        if let Err(err) = self.view.set(mode) {
            warn!(?err, "failed to save view mode");
        }
        self.page.set_view_mode(mode);
        self.bus.publish(GalleryEvent::ViewModeChanged(mode));
    }

    fn push_visibility(&mut self) {
        for item in self.catalog.iter() {
            self.page.set_card_visible(item.index, item.is_visible());
        }
    }

    fn publish_viewport(&self, opened: bool) {
        let event = match self.viewport.state() {
            ViewportState::Open { position, photo } if opened => {
                GalleryEvent::LightboxOpened { photo, position }
            }
            ViewportState::Open { position, photo } => GalleryEvent::LightboxMoved { photo, position },
            ViewportState::Closed => GalleryEvent::LightboxClosed,
        };
        self.bus.publish(event);
    }

    /// Runs lifecycle handlers and lets the bridge catch up until no event
    /// is pending.
    fn settle(&mut self) -> GalleryResult<()> {
        loop {
            let events = self.lifecycle.drain();
            if events.is_empty() {
                break;
            }
            for event in events {
                if let GalleryEvent::CatalogReady { .. } = event {
                    self.restore_filter();
                }
            }
            let was_open = self.viewport.is_open();
            self.bridge
                .sync(&self.catalog, &mut self.viewport, &mut self.page);
            if was_open && !self.viewport.is_open() {
                self.bus.publish(GalleryEvent::LightboxClosed);
            }
        }
        Ok(())
    }
}
