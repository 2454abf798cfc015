use std::collections::{BTreeSet, HashMap};

use crate::catalog::PhotoIndex;
use crate::filter::{FilterRange, ResultsSummary};
use crate::view_mode::ViewMode;

/// Which parts of the page markup exist. A missing part disables only the
/// feature that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFeatures {
    pub filter_panel: bool,
    pub results_slot: bool,
    pub photo_grid: bool,
    pub lightbox: bool,
}

impl PageFeatures {
    pub const ALL: PageFeatures = PageFeatures {
        filter_panel: true,
        results_slot: true,
        photo_grid: true,
        lightbox: true,
    };
}

impl Default for PageFeatures {
    fn default() -> Self {
        Self::ALL
    }
}

/// The four selectors of the filter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    YearFrom,
    MonthFrom,
    YearTo,
    MonthTo,
}

impl Selector {
    pub const ALL: [Selector; 4] = [
        Selector::YearFrom,
        Selector::MonthFrom,
        Selector::YearTo,
        Selector::MonthTo,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Selector::YearFrom => "year-from",
            Selector::MonthFrom => "month-from",
            Selector::YearTo => "year-to",
            Selector::MonthTo => "month-to",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|selector| selector.id() == id)
    }

    pub fn is_year(self) -> bool {
        matches!(self, Selector::YearFrom | Selector::YearTo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Empty for the "any" option.
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Write side of the page the gallery runs in. The gallery never reads
/// card visibility back from the page; its catalog is the source of truth.
pub trait PageSurface {
    fn features(&self) -> PageFeatures;
    fn set_options(&mut self, selector: Selector, options: &[SelectOption]);
    fn set_selector_values(&mut self, range: &FilterRange);
    fn set_card_visible(&mut self, photo: PhotoIndex, visible: bool);
    fn show_results(&mut self, summary: &ResultsSummary);
    fn hide_results(&mut self);
    fn show_lightbox(&mut self, asset: &str, caption: &str);
    fn hide_lightbox(&mut self);
    fn set_nav_controls(&mut self, prev_visible: bool, next_visible: bool);
    fn set_scroll_locked(&mut self, locked: bool);
    fn preload(&mut self, asset: &str);
    fn set_view_mode(&mut self, mode: ViewMode);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightboxView {
    pub asset: String,
    pub caption: String,
    pub prev_visible: bool,
    pub next_visible: bool,
}

/// A retained model of the page: every write is kept so a front end can
/// draw from it and tests can assert on it.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    features: PageFeatures,
    options: HashMap<Selector, Vec<SelectOption>>,
    selector_values: HashMap<Selector, String>,
    hidden_cards: BTreeSet<PhotoIndex>,
    results: Option<ResultsSummary>,
    lightbox: Option<LightboxView>,
    nav_controls: (bool, bool),
    scroll_locked: bool,
    preloads: Vec<String>,
    view_mode: ViewMode,
}

impl PageState {
    pub fn new(features: PageFeatures) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    pub fn options(&self, selector: Selector) -> &[SelectOption] {
        self.options
            .get(&selector)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Current value of a selector; empty means "any".
    pub fn selector_value(&self, selector: Selector) -> &str {
        self.selector_values
            .get(&selector)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_card_visible(&self, photo: PhotoIndex) -> bool {
        !self.hidden_cards.contains(&photo)
    }

    pub fn results(&self) -> Option<&ResultsSummary> {
        self.results.as_ref()
    }

    pub fn lightbox(&self) -> Option<&LightboxView> {
        self.lightbox.as_ref()
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    /// Hands pending preload requests to the caller.
    pub fn take_preloads(&mut self) -> Vec<String> {
        std::mem::take(&mut self.preloads)
    }
}

impl PageSurface for PageState {
    fn features(&self) -> PageFeatures {
        self.features
    }

    fn set_options(&mut self, selector: Selector, options: &[SelectOption]) {
        self.options.insert(selector, options.to_vec());
    }

    fn set_selector_values(&mut self, range: &FilterRange) {
        for selector in Selector::ALL {
            self.selector_values
                .insert(selector, range.value(selector).unwrap_or_default());
        }
    }

    fn set_card_visible(&mut self, photo: PhotoIndex, visible: bool) {
        if visible {
            self.hidden_cards.remove(&photo);
        } else {
            self.hidden_cards.insert(photo);
        }
    }

    fn show_results(&mut self, summary: &ResultsSummary) {
        self.results = Some(*summary);
    }

    fn hide_results(&mut self) {
        self.results = None;
    }

    fn show_lightbox(&mut self, asset: &str, caption: &str) {
        let (prev_visible, next_visible) = self.nav_controls;
        self.lightbox = Some(LightboxView {
            asset: asset.to_string(),
            caption: caption.to_string(),
            prev_visible,
            next_visible,
        });
    }

    fn hide_lightbox(&mut self) {
        self.lightbox = None;
    }

    fn set_nav_controls(&mut self, prev_visible: bool, next_visible: bool) {
        self.nav_controls = (prev_visible, next_visible);
        if let Some(view) = self.lightbox.as_mut() {
            view.prev_visible = prev_visible;
            view.next_visible = next_visible;
        }
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }

    fn preload(&mut self, asset: &str) {
        self.preloads.push(asset.to_string());
    }

    fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_ids_round_trip() {
        for selector in Selector::ALL {
            assert_eq!(Selector::from_id(selector.id()), Some(selector));
        }
        assert_eq!(Selector::from_id("apply-filter"), None);
    }

    #[test]
    fn nav_controls_follow_open_lightbox() {
        let mut page = PageState::new(PageFeatures::ALL);
        page.set_nav_controls(false, true);
        page.show_lightbox("a_full.jpg", "A");
        assert_eq!(
            page.lightbox().map(|view| (view.prev_visible, view.next_visible)),
            Some((false, true))
        );

        page.set_nav_controls(true, false);
        let view = page.lightbox().unwrap();
        assert!(view.prev_visible);
        assert!(!view.next_visible);
    }

    #[test]
    fn preloads_are_drained_once() {
        let mut page = PageState::default();
        page.preload("b_full.jpg");
        assert_eq!(page.take_preloads(), vec!["b_full.jpg".to_string()]);
        assert!(page.preloads().is_empty());
    }
}
