use tracing::debug;

use crate::catalog::{NavigableSet, PhotoCatalog, PhotoIndex};
use crate::error::{GalleryError, GalleryResult};
use crate::page::PageSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Keys the lightbox reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightboxKey {
    Escape,
    ArrowLeft,
    ArrowRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportState {
    Closed,
    /// `position` indexes the navigable set; `photo` is the catalog entry it
    /// pointed at when the viewport last moved.
    Open { position: usize, photo: PhotoIndex },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Opened { position: usize },
    FollowLink { href: String },
    Ignored,
}

/// What a navigable-set change did to an open viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retarget {
    Idle,
    Kept,
    Moved { from: usize, to: usize },
    Closed,
}

pub struct GalleryViewportController {
    state: ViewportState,
    detail_marker: String,
}

impl GalleryViewportController {
    pub fn new(detail_marker: impl Into<String>) -> Self {
        Self {
            state: ViewportState::Closed,
            detail_marker: detail_marker.into(),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ViewportState::Open { .. })
    }

    pub fn position(&self) -> Option<usize> {
        match self.state {
            ViewportState::Open { position, .. } => Some(position),
            ViewportState::Closed => None,
        }
    }

    pub fn open(
        &mut self,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        position: usize,
        page: &mut dyn PageSurface,
    ) -> GalleryResult<()> {
        let photo = set
            .photo_at(position)
            .ok_or(GalleryError::PositionOutOfRange {
                position,
                len: set.len(),
            })?;
        self.show(set, catalog, position, photo, page)?;
        page.set_scroll_locked(true);
        debug!(position, photo, "lightbox opened");
        Ok(())
    }

    /// Returns whether the viewport was open.
    pub fn close(&mut self, page: &mut dyn PageSurface) -> bool {
        if !self.is_open() {
            return false;
        }
        self.state = ViewportState::Closed;
        page.hide_lightbox();
        page.set_scroll_locked(false);
        debug!("lightbox closed");
        true
    }

    /// Moves one step, clamped to the ends of the set. Returns whether the
    /// displayed photo changed.
    pub fn navigate(
        &mut self,
        direction: Direction,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        page: &mut dyn PageSurface,
    ) -> GalleryResult<bool> {
        let ViewportState::Open { position, .. } = self.state else {
            return Ok(false);
        };
        let target = match direction {
            Direction::Prev if position > 0 => position - 1,
            Direction::Next if position + 1 < set.len() => position + 1,
            _ => return Ok(false),
        };
        let photo = set
            .photo_at(target)
            .ok_or(GalleryError::PositionOutOfRange {
                position: target,
                len: set.len(),
            })?;
        self.show(set, catalog, target, photo, page)?;
        Ok(true)
    }

    /// Target of the card's detail-page link, if it has one.
    pub fn detail_link(
        &self,
        photo: PhotoIndex,
        catalog: &PhotoCatalog,
    ) -> GalleryResult<Option<String>> {
        let item = catalog.get(photo).ok_or(GalleryError::UnknownPhoto(photo))?;
        Ok(item
            .is_detail_link(&self.detail_marker)
            .then(|| item.href.clone().unwrap_or_default()))
    }

    /// Card activation: detail-page links bypass the lightbox, other cards
    /// open it at their position in the current set.
    pub fn activate(
        &mut self,
        photo: PhotoIndex,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        page: &mut dyn PageSurface,
    ) -> GalleryResult<Activation> {
        if let Some(href) = self.detail_link(photo, catalog)? {
            return Ok(Activation::FollowLink { href });
        }
        let Some(position) = set.position_of(photo) else {
            return Ok(Activation::Ignored);
        };
        self.open(set, catalog, position, page)?;
        Ok(Activation::Opened { position })
    }

    /// Key bindings are only live while the viewport is open.
    pub fn handle_key(
        &mut self,
        key: LightboxKey,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        page: &mut dyn PageSurface,
    ) -> GalleryResult<bool> {
        if !self.is_open() {
            return Ok(false);
        }
        match key {
            LightboxKey::Escape => Ok(self.close(page)),
            LightboxKey::ArrowLeft => self.navigate(Direction::Prev, set, catalog, page),
            LightboxKey::ArrowRight => self.navigate(Direction::Next, set, catalog, page),
        }
    }

    /// Hovering a thumbnail warms the next photo's full asset.
    pub fn hover(
        &self,
        photo: PhotoIndex,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        page: &mut dyn PageSurface,
    ) -> Option<PhotoIndex> {
        let next = set
            .position_of(photo)
            .and_then(|position| set.photo_at(position + 1))?;
        let item = catalog.get(next)?;
        page.preload(&item.full);
        Some(next)
    }

    /// Re-anchors an open viewport after the navigable set changed.
    pub fn retarget(&mut self, set: &NavigableSet, page: &mut dyn PageSurface) -> Retarget {
        let ViewportState::Open { position, photo } = self.state else {
            return Retarget::Idle;
        };
        match set.position_of(photo) {
            None => {
                self.close(page);
                Retarget::Closed
            }
            Some(next) => {
                self.state = ViewportState::Open {
                    position: next,
                    photo,
                };
                update_controls(next, set, page);
                if next == position {
                    Retarget::Kept
                } else {
                    Retarget::Moved {
                        from: position,
                        to: next,
                    }
                }
            }
        }
    }

    fn show(
        &mut self,
        set: &NavigableSet,
        catalog: &PhotoCatalog,
        position: usize,
        photo: PhotoIndex,
        page: &mut dyn PageSurface,
    ) -> GalleryResult<()> {
        let item = catalog.get(photo).ok_or(GalleryError::UnknownPhoto(photo))?;
        update_controls(position, set, page);
        page.show_lightbox(&item.full, &item.title);
        self.state = ViewportState::Open { position, photo };
        Ok(())
    }
}

fn update_controls(position: usize, set: &NavigableSet, page: &mut dyn PageSurface) {
    page.set_nav_controls(position > 0, position + 1 < set.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::card;
    use crate::catalog::AssetNaming;
    use crate::page::{PageFeatures, PageState};

    fn fixture(count: usize) -> (PhotoCatalog, NavigableSet, PageState) {
        let cards = (0..count)
            .map(|idx| card("2020", "1", &format!("P{idx}")))
            .collect();
        let catalog = PhotoCatalog::from_cards(cards, &AssetNaming::default());
        let set = NavigableSet::from_catalog(&catalog);
        (catalog, set, PageState::new(PageFeatures::ALL))
    }

    #[test]
    fn open_shows_full_asset_and_locks_scroll() {
        let (catalog, set, mut page) = fixture(3);
        let mut viewport = GalleryViewportController::new("/fotos/");

        viewport.open(&set, &catalog, 1, &mut page).unwrap();

        let view = page.lightbox().unwrap();
        assert_eq!(view.asset, "img/p1_full.jpg");
        assert_eq!(view.caption, "P1");
        assert!(view.prev_visible && view.next_visible);
        assert!(page.scroll_locked());
        assert_eq!(viewport.state(), ViewportState::Open { position: 1, photo: 1 });
    }

    #[test]
    fn open_rejects_out_of_range_position() {
        let (catalog, set, mut page) = fixture(2);
        let mut viewport = GalleryViewportController::new("/fotos/");

        let err = viewport.open(&set, &catalog, 2, &mut page).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::PositionOutOfRange { position: 2, len: 2 }
        ));
        assert!(!viewport.is_open());
        assert!(page.lightbox().is_none());
    }

    #[test]
    fn next_clamps_at_last_position() {
        let (catalog, set, mut page) = fixture(5);
        let mut viewport = GalleryViewportController::new("/fotos/");
        viewport.open(&set, &catalog, 4, &mut page).unwrap();

        for _ in 0..3 {
            let moved = viewport
                .navigate(Direction::Next, &set, &catalog, &mut page)
                .unwrap();
            assert!(!moved);
            assert_eq!(viewport.position(), Some(4));
            assert!(!page.lightbox().unwrap().next_visible);
        }
        assert!(page.lightbox().unwrap().prev_visible);
    }

    #[test]
    fn prev_clamps_at_first_position_without_wrapping() {
        let (catalog, set, mut page) = fixture(3);
        let mut viewport = GalleryViewportController::new("/fotos/");
        viewport.open(&set, &catalog, 1, &mut page).unwrap();

        assert!(viewport
            .navigate(Direction::Prev, &set, &catalog, &mut page)
            .unwrap());
        assert!(!viewport
            .navigate(Direction::Prev, &set, &catalog, &mut page)
            .unwrap());
        assert_eq!(viewport.position(), Some(0));
        let view = page.lightbox().unwrap();
        assert_eq!(view.caption, "P0");
        assert!(!view.prev_visible);
        assert!(view.next_visible);
    }

    #[test]
    fn navigate_is_noop_while_closed() {
        let (catalog, set, mut page) = fixture(3);
        let mut viewport = GalleryViewportController::new("/fotos/");
        assert!(!viewport
            .navigate(Direction::Next, &set, &catalog, &mut page)
            .unwrap());
        assert!(!viewport.close(&mut page));
    }

    #[test]
    fn keys_only_act_while_open() {
        let (catalog, set, mut page) = fixture(3);
        let mut viewport = GalleryViewportController::new("/fotos/");
        assert!(!viewport
            .handle_key(LightboxKey::ArrowRight, &set, &catalog, &mut page)
            .unwrap());

        viewport.open(&set, &catalog, 0, &mut page).unwrap();
        assert!(viewport
            .handle_key(LightboxKey::ArrowRight, &set, &catalog, &mut page)
            .unwrap());
        assert_eq!(viewport.position(), Some(1));
        assert!(viewport
            .handle_key(LightboxKey::ArrowLeft, &set, &catalog, &mut page)
            .unwrap());
        assert!(viewport
            .handle_key(LightboxKey::Escape, &set, &catalog, &mut page)
            .unwrap());
        assert!(!viewport.is_open());
        assert!(!page.scroll_locked());
        assert!(page.lightbox().is_none());
    }

    #[test]
    fn detail_links_bypass_lightbox() {
        let mut linked = card("2020", "1", "Linked");
        linked.href = Some("/fotos/linked.html".to_string());
        let mut plain = card("2020", "2", "Plain");
        plain.href = Some("#".to_string());
        let catalog = PhotoCatalog::from_cards(vec![linked, plain], &AssetNaming::default());
        let set = NavigableSet::from_catalog(&catalog);
        let mut page = PageState::default();
        let mut viewport = GalleryViewportController::new("/fotos/");

        assert_eq!(
            viewport.activate(0, &set, &catalog, &mut page).unwrap(),
            Activation::FollowLink {
                href: "/fotos/linked.html".to_string()
            }
        );
        assert!(!viewport.is_open());
        assert_eq!(
            viewport.activate(1, &set, &catalog, &mut page).unwrap(),
            Activation::Opened { position: 1 }
        );
    }

    #[test]
    fn hover_preloads_next_and_tolerates_last() {
        let (catalog, set, mut page) = fixture(2);
        let viewport = GalleryViewportController::new("/fotos/");

        assert_eq!(viewport.hover(0, &set, &catalog, &mut page), Some(1));
        assert_eq!(viewport.hover(1, &set, &catalog, &mut page), None);
        assert_eq!(page.preloads(), &["img/p1_full.jpg".to_string()]);
    }

    #[test]
    fn retarget_remaps_or_closes() {
        let (mut catalog, set, mut page) = fixture(4);
        let mut viewport = GalleryViewportController::new("/fotos/");
        viewport.open(&set, &catalog, 2, &mut page).unwrap();

        catalog.set_visibility(&[false, true, true, true]);
        let shrunk = NavigableSet::from_catalog(&catalog);
        assert_eq!(
            viewport.retarget(&shrunk, &mut page),
            Retarget::Moved { from: 2, to: 1 }
        );
        assert_eq!(viewport.state(), ViewportState::Open { position: 1, photo: 2 });

        catalog.set_visibility(&[true, true, false, true]);
        let without = NavigableSet::from_catalog(&catalog);
        assert_eq!(viewport.retarget(&without, &mut page), Retarget::Closed);
        assert!(page.lightbox().is_none());
        assert_eq!(viewport.retarget(&without, &mut page), Retarget::Idle);
    }
}
