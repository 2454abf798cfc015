use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::Month;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use tracing::{debug, warn};

use crate::catalog::{parse_month, parse_year, PhotoCatalog, PhotoIndex, PhotoItem};
use crate::page::{SelectOption, Selector};
use crate::storage::LocalStore;

pub const FILTER_KEY: &str = "album_filter";

/// Inclusive calendar window chosen in the filter panel. Every bound is
/// optional; a month without its year is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterRange {
    pub from_year: Option<i32>,
    pub from_month: Option<u32>,
    pub to_year: Option<i32>,
    pub to_month: Option<u32>,
}

impl FilterRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.from_year.is_none() && self.to_year.is_none()
    }

    /// Selector value as the page shows it.
    pub fn value(&self, selector: Selector) -> Option<String> {
        match selector {
            Selector::YearFrom => self.from_year.map(|v| v.to_string()),
            Selector::MonthFrom => self.from_month.map(|v| v.to_string()),
            Selector::YearTo => self.to_year.map(|v| v.to_string()),
            Selector::MonthTo => self.to_month.map(|v| v.to_string()),
        }
    }

    /// Updates one bound from a raw selector value. Values that do not parse
    /// (including the empty "any" option) clear the bound.
    pub fn set(&mut self, selector: Selector, raw: &str) {
        match selector {
            Selector::YearFrom => self.from_year = parse_year(raw),
            Selector::MonthFrom => self.from_month = parse_month(raw),
            Selector::YearTo => self.to_year = parse_year(raw),
            Selector::MonthTo => self.to_month = parse_month(raw),
        }
    }

    /// Turns the selector values into month bounds: `from` starts on the
    /// first day of its month, `to` ends on the last day of its month.
    pub fn resolve(&self) -> DateWindow {
        DateWindow {
            from: self
                .from_year
                .map(|year| MonthStamp::new(year, self.from_month.unwrap_or(1))),
            to: self
                .to_year
                .map(|year| MonthStamp::new(year, self.to_month.unwrap_or(12))),
        }
    }
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthStamp {
    pub year: i32,
    pub month: u32,
}

impl MonthStamp {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

/// Inclusive window of whole months. A photo counts as the 15th of its
/// month, which lies inside the window exactly when its month does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<MonthStamp>,
    pub to: Option<MonthStamp>,
}

impl DateWindow {
    pub fn contains(&self, at: MonthStamp) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Visibility decision for a single photo. Undated photos never pass.
pub fn is_visible(item: &PhotoItem, window: &DateWindow) -> bool {
    item.year_month()
        .is_some_and(|(year, month)| window.contains(MonthStamp::new(year, month)))
}

/// Raw selector values as written to local storage.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFilter {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub month_from: Option<u32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub month_to: Option<u32>,
}

impl From<FilterRange> for PersistedFilter {
    fn from(range: FilterRange) -> Self {
        Self {
            year_from: range.from_year,
            month_from: range.from_month,
            year_to: range.to_year,
            month_to: range.to_month,
        }
    }
}

impl From<PersistedFilter> for FilterRange {
    fn from(saved: PersistedFilter) -> Self {
        let valid_month = |month: Option<u32>| month.filter(|m| (1..=12).contains(m));
        Self {
            from_year: saved.year_from,
            from_month: valid_month(saved.month_from),
            to_year: saved.year_to,
            to_month: valid_month(saved.month_to),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultsSummary {
    pub match_count: usize,
    pub total: usize,
    pub severity: Severity,
}

impl ResultsSummary {
    pub fn new(match_count: usize, total: usize) -> Self {
        let severity = if match_count == 0 {
            Severity::Error
        } else if match_count == total {
            Severity::Success
        } else {
            Severity::Info
        };
        Self {
            match_count,
            total,
            severity,
        }
    }
}

impl fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "No photos found in the selected range"),
            Severity::Success => write!(f, "Showing all photos ({})", self.match_count),
            Severity::Info => write!(f, "Showing {} of {} photos", self.match_count, self.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub navigable: Vec<PhotoIndex>,
    pub match_count: usize,
    pub total: usize,
    pub summary: ResultsSummary,
}

/// Owns the filter panel's range and the `album_filter` storage key.
pub struct DateRangeFilterEngine {
    range: FilterRange,
    years: Vec<i32>,
    store: Arc<dyn LocalStore>,
}

impl DateRangeFilterEngine {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            range: FilterRange::unbounded(),
            years: Vec::new(),
            store,
        }
    }

    /// Distinct years of photos with a usable year, ascending.
    pub fn extract_years(catalog: &PhotoCatalog) -> Vec<i32> {
        catalog
            .iter()
            .filter_map(|item| item.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Collects the catalog's years; the "to" year starts on the latest one.
    pub fn populate(&mut self, catalog: &PhotoCatalog) -> &[i32] {
        self.years = Self::extract_years(catalog);
        self.range.to_year = self.years.last().copied();
        &self.years
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn range(&self) -> &FilterRange {
        &self.range
    }

    pub fn set_range(&mut self, range: FilterRange) {
        self.range = range;
    }

    pub fn set_selector(&mut self, selector: Selector, raw: &str) {
        self.range.set(selector, raw);
    }

    pub fn options(&self, selector: Selector) -> Vec<SelectOption> {
        if selector.is_year() {
            year_options(&self.years)
        } else {
            month_options()
        }
    }

    /// Decides visibility for every photo and writes the decisions to the
    /// catalog in a single batch.
    pub fn apply(&self, catalog: &mut PhotoCatalog) -> FilterOutcome {
        let window = self.range.resolve();
        let decisions: Vec<bool> = catalog.iter().map(|item| is_visible(item, &window)).collect();
        catalog.set_visibility(&decisions);

        let navigable: Vec<PhotoIndex> = catalog
            .iter()
            .filter(|item| item.is_visible())
            .map(|item| item.index)
            .collect();
        let match_count = navigable.len();
        let total = catalog.len();
        debug!(range = ?self.range, match_count, total, "applied date filter");

        FilterOutcome {
            navigable,
            match_count,
            total,
            summary: ResultsSummary::new(match_count, total),
        }
    }

    /// Drops every bound and shows every photo, undated ones included.
    pub fn clear(&mut self, catalog: &mut PhotoCatalog) {
        self.range = FilterRange::unbounded();
        catalog.show_all();
    }

    pub fn save(&self) -> Result<()> {
        let payload = serde_json::to_string(&PersistedFilter::from(self.range))?;
        self.store.set(FILTER_KEY, &payload)
    }

    pub fn forget(&self) -> Result<()> {
        self.store.remove(FILTER_KEY)
    }

    /// Reads the persisted range. Missing, unreadable or malformed data all
    /// mean "no saved filter".
    pub fn load(&self) -> Option<FilterRange> {
        let raw = match self.store.get(FILTER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(?err, "failed to read saved filter");
                return None;
            }
        };
        match serde_json::from_str::<PersistedFilter>(&raw) {
            Ok(saved) => Some(saved.into()),
            Err(err) => {
                warn!(%err, "ignoring malformed saved filter");
                None
            }
        }
    }
}

pub fn year_options(years: &[i32]) -> Vec<SelectOption> {
    std::iter::once(SelectOption::new("", "Any year"))
        .chain(
            years
                .iter()
                .map(|year| SelectOption::new(year.to_string(), year.to_string())),
        )
        .collect()
}

pub fn month_options() -> Vec<SelectOption> {
    std::iter::once(SelectOption::new("", "Any month"))
        .chain(
            (1..=12u8)
                .filter_map(|number| Month::try_from(number).ok())
                .map(|month| SelectOption::new(month.number_from_month().to_string(), month.name())),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::card;
    use crate::catalog::AssetNaming;
    use crate::storage::MemoryLocalStore;

    fn catalog(dates: &[(&str, &str)]) -> PhotoCatalog {
        let cards = dates
            .iter()
            .enumerate()
            .map(|(idx, (year, month))| card(year, month, &format!("P{idx}")))
            .collect();
        PhotoCatalog::from_cards(cards, &AssetNaming::default())
    }

    fn engine() -> (DateRangeFilterEngine, Arc<MemoryLocalStore>) {
        let store = Arc::new(MemoryLocalStore::new());
        (DateRangeFilterEngine::new(store.clone()), store)
    }

    fn range(from: Option<(i32, Option<u32>)>, to: Option<(i32, Option<u32>)>) -> FilterRange {
        FilterRange {
            from_year: from.map(|(y, _)| y),
            from_month: from.and_then(|(_, m)| m),
            to_year: to.map(|(y, _)| y),
            to_month: to.and_then(|(_, m)| m),
        }
    }

    #[test]
    fn extract_years_is_sorted_and_distinct() {
        let catalog = catalog(&[("2021", "3"), ("2019", ""), ("2021", "9"), ("", "4")]);
        assert_eq!(DateRangeFilterEngine::extract_years(&catalog), vec![2019, 2021]);
    }

    #[test]
    fn populate_defaults_to_year_to_latest() {
        let (mut engine, _) = engine();
        let catalog = catalog(&[("2018", "1"), ("2022", "5")]);
        assert_eq!(engine.populate(&catalog), &[2018, 2022]);
        assert_eq!(engine.range().to_year, Some(2022));
        assert_eq!(engine.range().from_year, None);
    }

    #[test]
    fn from_year_only_sets_lower_bound() {
        let (mut engine, _) = engine();
        let mut catalog = catalog(&[("2019", "12"), ("2020", "1"), ("2035", "7"), ("2020", "")]);
        engine.set_range(range(Some((2020, None)), None));

        let outcome = engine.apply(&mut catalog);
        assert_eq!(outcome.navigable, vec![1, 2]);
        assert_eq!(outcome.match_count, 2);
        assert_eq!(outcome.total, 4);
    }

    #[test]
    fn undated_photos_are_hidden_for_every_range() {
        let (mut engine, _) = engine();
        let mut catalog = catalog(&[("", "5"), ("2020", ""), ("x", "y"), ("2020", "5")]);
        for candidate in [
            FilterRange::unbounded(),
            range(Some((1900, None)), None),
            range(None, Some((2100, Some(12)))),
            range(Some((2020, Some(5))), Some((2020, Some(5)))),
        ] {
            engine.set_range(candidate);
            let outcome = engine.apply(&mut catalog);
            assert_eq!(outcome.navigable, vec![3], "range {:?}", candidate);
            assert_eq!(outcome.total, 4);
        }
    }

    #[test]
    fn single_month_window_includes_only_that_month() {
        let (mut engine, _) = engine();
        let mut catalog = catalog(&[("2020", "5"), ("2020", "6"), ("2020", "7")]);
        engine.set_range(range(Some((2020, Some(6))), Some((2020, Some(6)))));

        let outcome = engine.apply(&mut catalog);
        assert_eq!(outcome.navigable, vec![1]);
        assert!(!catalog.get(0).unwrap().is_visible());
        assert!(catalog.get(1).unwrap().is_visible());
        assert!(!catalog.get(2).unwrap().is_visible());
    }

    #[test]
    fn to_bound_defaults_to_december_and_from_to_january() {
        let window = range(Some((2019, None)), Some((2020, None))).resolve();
        assert_eq!(window.from, Some(MonthStamp::new(2019, 1)));
        assert_eq!(window.to, Some(MonthStamp::new(2020, 12)));
        assert!(window.contains(MonthStamp::new(2020, 12)));
        assert!(!window.contains(MonthStamp::new(2021, 1)));
    }

    #[test]
    fn far_out_years_still_bound_the_window() {
        let (mut engine, _) = engine();
        let mut catalog = catalog(&[("2019", "12"), ("2020", "6"), ("300000", "1")]);

        engine.set_range(range(Some((300_001, None)), None));
        assert!(engine.apply(&mut catalog).navigable.is_empty());

        engine.set_range(range(None, Some((-5, None))));
        assert!(engine.apply(&mut catalog).navigable.is_empty());

        engine.set_range(range(Some((2020, None)), None));
        assert_eq!(engine.apply(&mut catalog).navigable, vec![1, 2]);

        engine.set_selector(Selector::YearFrom, "300000");
        assert_eq!(engine.apply(&mut catalog).navigable, vec![2]);
    }

    #[test]
    fn month_without_year_is_ignored() {
        let bounded = FilterRange {
            from_month: Some(6),
            to_month: Some(2),
            ..FilterRange::default()
        };
        assert!(bounded.is_unbounded());
        assert_eq!(bounded.resolve(), FilterRange::unbounded().resolve());
    }

    #[test]
    fn apply_is_idempotent() {
        let (mut engine, _) = engine();
        let mut catalog = catalog(&[("2018", "4"), ("2020", "2"), ("2021", "11"), ("", "")]);
        engine.set_range(range(Some((2019, Some(3))), Some((2021, Some(10)))));

        let first = engine.apply(&mut catalog);
        let second = engine.apply(&mut catalog);
        assert_eq!(first, second);
        assert_eq!(first.navigable, vec![1]);
    }

    #[test]
    fn summary_mapping() {
        let none = ResultsSummary::new(0, 10);
        assert_eq!(none.severity, Severity::Error);
        assert_eq!(none.to_string(), "No photos found in the selected range");

        let all = ResultsSummary::new(10, 10);
        assert_eq!(all.severity, Severity::Success);
        assert_eq!(all.to_string(), "Showing all photos (10)");

        let some = ResultsSummary::new(4, 10);
        assert_eq!(some.severity, Severity::Info);
        assert_eq!(some.to_string(), "Showing 4 of 10 photos");

        assert_eq!(ResultsSummary::new(0, 0).severity, Severity::Error);
    }

    #[test]
    fn save_then_load_reapplies_to_same_set() {
        let (mut engine, store) = engine();
        let mut catalog = catalog(&[("2018", "4"), ("2020", "2"), ("2021", "11"), ("2022", "")]);
        engine.set_range(range(Some((2019, None)), Some((2021, Some(11)))));
        let before = engine.apply(&mut catalog);
        engine.save().unwrap();

        let mut reloaded = DateRangeFilterEngine::new(store);
        let restored = reloaded.load().expect("saved filter");
        assert_eq!(&restored, engine.range());

        let mut fresh = catalog.clone();
        fresh.show_all();
        reloaded.set_range(restored);
        assert_eq!(reloaded.apply(&mut fresh).navigable, before.navigable);
    }

    #[test]
    fn persisted_format_uses_string_values() {
        let (mut engine, store) = engine();
        engine.set_range(range(Some((2020, Some(6))), None));
        engine.save().unwrap();

        let raw = store.get(FILTER_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["yearFrom"], "2020");
        assert_eq!(json["monthFrom"], "6");
        assert_eq!(json["yearTo"], "");
        assert_eq!(json["monthTo"], "");
    }

    #[test]
    fn load_accepts_partial_records() {
        let (engine, store) = engine();
        store
            .set(FILTER_KEY, r#"{"yearTo":"2021","monthTo":""}"#)
            .unwrap();
        assert_eq!(
            engine.load(),
            Some(FilterRange {
                to_year: Some(2021),
                ..FilterRange::default()
            })
        );
    }

    #[test]
    fn malformed_saved_filter_is_ignored() {
        let (engine, store) = engine();
        store.set(FILTER_KEY, "{not json").unwrap();
        assert_eq!(engine.load(), None);

        store.set(FILTER_KEY, r#"{"yearFrom":"soon"}"#).unwrap();
        assert_eq!(engine.load(), None);
    }

    #[test]
    fn clear_shows_everything_and_forget_removes_key() {
        let (mut engine, store) = engine();
        let mut catalog = catalog(&[("2018", "4"), ("", "")]);
        engine.set_range(range(Some((2019, None)), None));
        engine.apply(&mut catalog);
        engine.save().unwrap();
        assert_eq!(catalog.visible_count(), 0);

        engine.clear(&mut catalog);
        engine.forget().unwrap();
        assert!(engine.range().is_unbounded());
        assert_eq!(catalog.visible_count(), 2);
        assert_eq!(store.get(FILTER_KEY).unwrap(), None);
    }

    #[test]
    fn selector_values_parse_or_clear() {
        let mut range = FilterRange::default();
        range.set(Selector::YearFrom, "2020");
        range.set(Selector::MonthFrom, "13");
        range.set(Selector::MonthTo, "4");
        assert_eq!(range.from_year, Some(2020));
        assert_eq!(range.from_month, None);
        assert_eq!(range.value(Selector::MonthTo).as_deref(), Some("4"));

        range.set(Selector::YearFrom, "");
        assert_eq!(range.from_year, None);
    }

    #[test]
    fn options_start_with_any() {
        let options = year_options(&[2019, 2020]);
        assert_eq!(options[0], SelectOption::new("", "Any year"));
        assert_eq!(options[2].value, "2020");

        let months = month_options();
        assert_eq!(months.len(), 13);
        assert_eq!(months[6], SelectOption::new("6", "June"));
    }
}
