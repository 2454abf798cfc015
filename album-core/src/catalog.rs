use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::page::PageFeatures;

/// Position of a photo in the page's original card order.
pub type PhotoIndex = usize;

/// A photo card as it appears in the album markup, before any parsing of
/// its date attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoCard {
    pub year: Option<String>,
    pub month: Option<String>,
    pub thumbnail: String,
    pub title: String,
    pub href: Option<String>,
}

/// Everything a catalog provider extracts from an album page.
#[derive(Debug, Clone)]
pub struct AlbumSource {
    pub path: PathBuf,
    pub title: Option<String>,
    pub cards: Vec<PhotoCard>,
    pub features: PageFeatures,
}

impl AlbumSource {
    /// Directory that relative asset references resolve against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn load(&self, path: &Path) -> Result<AlbumSource>;
}

/// Maps thumbnail asset references to their full-resolution counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNaming {
    pub thumb_suffix: String,
    pub full_suffix: String,
}

impl Default for AssetNaming {
    fn default() -> Self {
        Self {
            thumb_suffix: "_thumb.jpg".to_string(),
            full_suffix: "_full.jpg".to_string(),
        }
    }
}

impl AssetNaming {
    pub fn new(thumb_suffix: impl Into<String>, full_suffix: impl Into<String>) -> Self {
        Self {
            thumb_suffix: thumb_suffix.into(),
            full_suffix: full_suffix.into(),
        }
    }

    /// Replaces the first occurrence of the thumbnail suffix. References that
    /// do not carry the suffix are returned unchanged.
    pub fn full_ref(&self, thumbnail: &str) -> String {
        if self.thumb_suffix.is_empty() {
            return thumbnail.to_string();
        }
        thumbnail.replacen(&self.thumb_suffix, &self.full_suffix, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoItem {
    pub index: PhotoIndex,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub thumbnail: String,
    pub full: String,
    pub title: String,
    pub href: Option<String>,
    visible: bool,
}

impl PhotoItem {
    pub fn from_card(index: PhotoIndex, card: PhotoCard, naming: &AssetNaming) -> Self {
        let full = naming.full_ref(&card.thumbnail);
        Self {
            index,
            year: card.year.as_deref().and_then(parse_year),
            month: card.month.as_deref().and_then(parse_month),
            thumbnail: card.thumbnail,
            full,
            title: card.title,
            href: card.href,
            visible: true,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Year and month, only when both are present.
    pub fn year_month(&self) -> Option<(i32, u32)> {
        Some((self.year?, self.month?))
    }

    /// True when the card links to a dedicated detail page instead of the
    /// lightbox.
    pub fn is_detail_link(&self, marker: &str) -> bool {
        !marker.is_empty()
            && self
                .href
                .as_deref()
                .is_some_and(|href| href.contains(marker))
    }
}

pub(crate) fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

pub(crate) fn parse_month(raw: &str) -> Option<u32> {
    raw.trim()
        .parse()
        .ok()
        .filter(|month| (1..=12).contains(month))
}

/// The fixed set of photos for a page session. Visibility is the only
/// mutable attribute and is written by the filter engine alone.
#[derive(Debug, Clone, Default)]
pub struct PhotoCatalog {
    items: Vec<PhotoItem>,
}

impl PhotoCatalog {
    pub fn from_cards(cards: Vec<PhotoCard>, naming: &AssetNaming) -> Self {
        let items = cards
            .into_iter()
            .enumerate()
            .map(|(index, card)| PhotoItem::from_card(index, card, naming))
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: PhotoIndex) -> Option<&PhotoItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoItem> {
        self.items.iter()
    }

    pub fn visible_count(&self) -> usize {
        self.items.iter().filter(|item| item.visible).count()
    }

    /// Writes every visibility decision in one pass. `decisions` is indexed
    /// by [`PhotoIndex`]; missing entries hide the photo.
    pub(crate) fn set_visibility(&mut self, decisions: &[bool]) {
        for item in &mut self.items {
            item.visible = decisions.get(item.index).copied().unwrap_or(false);
        }
    }

    pub(crate) fn show_all(&mut self) {
        for item in &mut self.items {
            item.visible = true;
        }
    }
}

/// Ordered visible photos; the lightbox's index space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigableSet {
    photos: Vec<PhotoIndex>,
}

impl NavigableSet {
    pub fn from_catalog(catalog: &PhotoCatalog) -> Self {
        Self {
            photos: catalog
                .iter()
                .filter(|item| item.is_visible())
                .map(|item| item.index)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photo_at(&self, position: usize) -> Option<PhotoIndex> {
        self.photos.get(position).copied()
    }

    pub fn position_of(&self, photo: PhotoIndex) -> Option<usize> {
        self.photos.iter().position(|&candidate| candidate == photo)
    }

    pub fn photos(&self) -> &[PhotoIndex] {
        &self.photos
    }

    pub fn last_position(&self) -> Option<usize> {
        self.photos.len().checked_sub(1)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn card(year: &str, month: &str, title: &str) -> PhotoCard {
        PhotoCard {
            year: (!year.is_empty()).then(|| year.to_string()),
            month: (!month.is_empty()).then(|| month.to_string()),
            thumbnail: format!("img/{}_thumb.jpg", title.to_lowercase()),
            title: title.to_string(),
            href: None,
        }
    }

    #[test]
    fn full_ref_swaps_thumbnail_suffix() {
        let naming = AssetNaming::default();
        assert_eq!(naming.full_ref("img/beach_thumb.jpg"), "img/beach_full.jpg");
    }

    #[test]
    fn full_ref_only_replaces_first_suffix() {
        let naming = AssetNaming::default();
        assert_eq!(
            naming.full_ref("a_thumb.jpg/b_thumb.jpg"),
            "a_full.jpg/b_thumb.jpg"
        );
    }

    #[test]
    fn full_ref_leaves_unrelated_names_alone() {
        let naming = AssetNaming::default();
        assert_eq!(naming.full_ref("img/beach.png"), "img/beach.png");
        let empty = AssetNaming::new("", "_full.jpg");
        assert_eq!(empty.full_ref("img/beach_thumb.jpg"), "img/beach_thumb.jpg");
    }

    #[test]
    fn catalog_parses_date_attributes() {
        let catalog = PhotoCatalog::from_cards(
            vec![
                card("2020", "6", "Beach"),
                card(" 2019 ", "13", "Snow"),
                card("soon", "", "Party"),
            ],
            &AssetNaming::default(),
        );

        let beach = catalog.get(0).unwrap();
        assert_eq!(beach.year_month(), Some((2020, 6)));
        assert_eq!(beach.full, "img/beach_full.jpg");

        let snow = catalog.get(1).unwrap();
        assert_eq!(snow.year, Some(2019));
        assert_eq!(snow.month, None);
        assert_eq!(snow.year_month(), None);

        let party = catalog.get(2).unwrap();
        assert_eq!(party.year, None);
        assert!(party.is_visible());
    }

    #[test]
    fn detail_links_are_recognised_by_marker() {
        let mut item = PhotoItem::from_card(0, card("2020", "1", "A"), &AssetNaming::default());
        assert!(!item.is_detail_link("/fotos/"));
        item.href = Some("https://example.org/fotos/a.html".to_string());
        assert!(item.is_detail_link("/fotos/"));
        assert!(!item.is_detail_link(""));
    }

    #[test]
    fn navigable_set_follows_visibility() {
        let mut catalog = PhotoCatalog::from_cards(
            vec![card("2020", "1", "A"), card("2020", "2", "B"), card("2020", "3", "C")],
            &AssetNaming::default(),
        );
        catalog.set_visibility(&[true, false, true]);

        let set = NavigableSet::from_catalog(&catalog);
        assert_eq!(set.photos(), &[0, 2]);
        assert_eq!(set.position_of(2), Some(1));
        assert_eq!(set.position_of(1), None);
        assert_eq!(set.last_position(), Some(1));
        assert_eq!(catalog.visible_count(), 2);
    }
}
