use std::borrow::Cow;
use std::path::Path;

use album_core::{AlbumSource, CatalogProvider, PageFeatures, PhotoCard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const CARD_CLASS: &str = "photo-card";
const FILTER_PANEL_CLASS: &str = "filter-panel";
const GRID_CLASS: &str = "photo-grid";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Reads a generated album page and extracts its photo cards.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlPageProvider;

#[async_trait]
impl CatalogProvider for HtmlPageProvider {
    #[instrument(skip(self))]
    async fn load(&self, path: &Path) -> Result<AlbumSource> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let html = tokio::fs::read_to_string(&absolute)
            .await
            .with_context(|| format!("failed to read album page {:?}", absolute))?;
        let page = parse_page(&html);
        debug!(cards = page.cards.len(), "parsed album page");
        Ok(AlbumSource {
            path: absolute,
            title: page.title,
            cards: page.cards,
            features: page.features,
        })
    }
}

/// Reads a JSON manifest listing the album's photos.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestProvider;

#[async_trait]
impl CatalogProvider for ManifestProvider {
    #[instrument(skip(self))]
    async fn load(&self, path: &Path) -> Result<AlbumSource> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let raw = tokio::fs::read_to_string(&absolute)
            .await
            .with_context(|| format!("failed to read manifest {:?}", absolute))?;
        let manifest = parse_manifest(&raw)
            .with_context(|| format!("failed to decode manifest {:?}", absolute))?;
        Ok(AlbumSource {
            path: absolute,
            title: manifest.title,
            cards: manifest.photos.into_iter().map(PhotoCard::from).collect(),
            features: PageFeatures::ALL,
        })
    }
}

/// Picks a provider from the file extension; anything that is not `.json`
/// is treated as an HTML page.
pub fn provider_for(path: &Path) -> Box<dyn CatalogProvider> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Box::new(ManifestProvider)
    } else {
        Box::new(HtmlPageProvider)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub cards: Vec<PhotoCard>,
    pub features: PageFeatures,
}

#[derive(Default)]
struct CardBuilder {
    depth: usize,
    card: PhotoCard,
    has_thumbnail: bool,
    in_heading: bool,
    heading_seen: bool,
}

/// Extracts cards and page features. The parser is lenient: unknown
/// markup is skipped and a parse error ends the scan with whatever was
/// collected so far.
pub fn parse_page(html: &str) -> ParsedPage {
    let cleaned = strip_raw_text(html);
    let mut reader = Reader::from_str(&cleaned);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut page = ParsedPage {
        features: PageFeatures {
            filter_panel: false,
            results_slot: false,
            photo_grid: false,
            lightbox: true,
        },
        ..ParsedPage::default()
    };
    let mut depth = 0usize;
    let mut current: Option<CardBuilder> = None;
    let mut in_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = tag_name(e);
                open_element(&name, e, depth, &mut current, &mut page);
                if name == "title" && page.title.is_none() {
                    in_title = true;
                }
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    depth += 1;
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = tag_name(e);
                open_element(&name, e, depth, &mut current, &mut page);
            }
            Ok(Event::Text(ref e)) => {
                let text = text_of(e);
                if in_title {
                    page.title = Some(text.trim().to_string());
                } else if let Some(builder) = current.as_mut().filter(|b| b.in_heading) {
                    let text = text.trim();
                    if !text.is_empty() {
                        if !builder.card.title.is_empty() {
                            builder.card.title.push(' ');
                        }
                        builder.card.title.push_str(text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                depth = depth.saturating_sub(1);
                if name == "title" {
                    in_title = false;
                }
                if let Some(builder) = current.as_mut() {
                    if name == "h3" && builder.in_heading {
                        builder.in_heading = false;
                        builder.heading_seen = true;
                    }
                    if depth <= builder.depth {
                        if let Some(done) = current.take() {
                            page.cards.push(done.card);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!(%err, position = reader.buffer_position(), "stopped parsing album page");
                break;
            }
            _ => {}
        }
    }
    if let Some(open) = current.take() {
        page.cards.push(open.card);
    }
    page.features.results_slot = page.features.filter_panel;
    page
}

fn open_element(
    name: &str,
    element: &BytesStart<'_>,
    depth: usize,
    current: &mut Option<CardBuilder>,
    page: &mut ParsedPage,
) {
    let classes = attribute(element, "class").unwrap_or_default();
    let has_class = |wanted: &str| classes.split_whitespace().any(|class| class == wanted);
    if has_class(FILTER_PANEL_CLASS) {
        page.features.filter_panel = true;
    }
    if has_class(GRID_CLASS) {
        page.features.photo_grid = true;
    }

    if let Some(builder) = current.as_mut() {
        match name {
            "a" if builder.card.href.is_none() => {
                builder.card.href = attribute(element, "href");
            }
            "img" if !builder.has_thumbnail => {
                if let Some(src) = attribute(element, "data-src").or_else(|| attribute(element, "src")) {
                    builder.card.thumbnail = src;
                    builder.has_thumbnail = true;
                }
            }
            "h3" if !builder.heading_seen => builder.in_heading = true,
            _ => {}
        }
        return;
    }

    if has_class(CARD_CLASS) {
        *current = Some(CardBuilder {
            depth,
            card: PhotoCard {
                year: attribute(element, "data-year"),
                month: attribute(element, "data-month"),
                ..PhotoCard::default()
            },
            ..CardBuilder::default()
        });
    }
}

fn tag_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).to_ascii_lowercase()
}

fn attribute(element: &BytesStart<'_>, wanted: &str) -> Option<String> {
    element
        .html_attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(wanted.as_bytes()))
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

fn text_of<'a>(text: &'a BytesText<'a>) -> Cow<'a, str> {
    match text.unescape() {
        Ok(value) => value,
        Err(_) => String::from_utf8_lossy(text.as_ref()),
    }
}

/// Drops `<script>` and `<style>` blocks, whose bodies are not markup.
fn strip_raw_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    while cursor < html.len() {
        let next = ["<script", "<style"]
            .iter()
            .filter_map(|open| lower[cursor..].find(open).map(|at| (cursor + at, *open)))
            .min_by_key(|(at, _)| *at);
        let Some((start, open)) = next else {
            break;
        };
        out.push_str(&html[cursor..start]);
        let close = format!("</{}", &open[1..]);
        cursor = match lower[start..].find(&close) {
            Some(at) => {
                let end = start + at;
                lower[end..]
                    .find('>')
                    .map_or(html.len(), |gt| end + gt + 1)
            }
            None => html.len(),
        };
    }
    if cursor < html.len() {
        out.push_str(&html[cursor..]);
    }
    out
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    photos: Vec<ManifestPhoto>,
}

#[derive(Debug, Deserialize)]
struct ManifestPhoto {
    #[serde(default)]
    year: Option<NumberOrText>,
    #[serde(default)]
    month: Option<NumberOrText>,
    thumbnail: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn into_string(self) -> String {
        match self {
            NumberOrText::Number(value) => value.to_string(),
            NumberOrText::Text(value) => value,
        }
    }
}

impl From<ManifestPhoto> for PhotoCard {
    fn from(photo: ManifestPhoto) -> Self {
        PhotoCard {
            year: photo.year.map(NumberOrText::into_string),
            month: photo.month.map(NumberOrText::into_string),
            thumbnail: photo.thumbnail,
            title: photo.title,
            href: photo.href,
        }
    }
}

fn parse_manifest(raw: &str) -> Result<Manifest> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Family &amp; Friends</title>
  <script>if (a < b && c > d) { document.write("<div class='photo-card'>"); }</script>
  <style>.photo-card > img { width: 100%; }</style>
</head>
<body>
  <div class="filter-panel"><select id="year-from"></select></div>
  <div class="photo-grid">
    <div class="photo-card" data-year="2020" data-month="6">
      <a href="#"><img src="img/beach_thumb.jpg" loading="lazy" alt="Beach"></a>
      <div class="info"><h3>Beach day</h3><p>Sunny</p></div>
    </div>
    <div class="photo-card" data-year="2019" data-month="12">
      <a href="/fotos/snow.html">
        <img data-src="img/snow_thumb.jpg" src="img/placeholder.gif">
      </a>
      <h3>Snow</h3>
    </div>
    <div class="photo-card featured">
      <img src="img/party_thumb.jpg"/>
      <h3>Party<br>night</h3>
    </div>
  </div>
</body>
</html>"##;

    #[test]
    fn extracts_cards_in_order() {
        let page = parse_page(PAGE);
        assert_eq!(page.title.as_deref(), Some("Family & Friends"));
        assert_eq!(page.cards.len(), 3);

        let beach = &page.cards[0];
        assert_eq!(beach.year.as_deref(), Some("2020"));
        assert_eq!(beach.month.as_deref(), Some("6"));
        assert_eq!(beach.thumbnail, "img/beach_thumb.jpg");
        assert_eq!(beach.title, "Beach day");
        assert_eq!(beach.href.as_deref(), Some("#"));

        let snow = &page.cards[1];
        assert_eq!(snow.thumbnail, "img/snow_thumb.jpg");
        assert_eq!(snow.href.as_deref(), Some("/fotos/snow.html"));

        let party = &page.cards[2];
        assert_eq!(party.year, None);
        assert_eq!(party.thumbnail, "img/party_thumb.jpg");
        assert_eq!(party.title, "Party night");
    }

    #[test]
    fn detects_page_features() {
        let page = parse_page(PAGE);
        assert!(page.features.filter_panel);
        assert!(page.features.results_slot);
        assert!(page.features.photo_grid);

        let bare = parse_page(r#"<div class="photo-card" data-year="2020"><h3>A</h3></div>"#);
        assert!(!bare.features.filter_panel);
        assert!(!bare.features.results_slot);
        assert_eq!(bare.cards.len(), 1);
    }

    #[test]
    fn raw_text_blocks_are_removed() {
        let stripped = strip_raw_text("a<SCRIPT>x<y</script>b<style>p{}</style>c");
        assert_eq!(stripped, "abc");
        assert_eq!(strip_raw_text("a<script>never closed"), "a");
    }

    #[test]
    fn manifest_accepts_numbers_and_strings() {
        let manifest = parse_manifest(
            r#"{"title":"Trips","photos":[
                {"year":2021,"month":"3","thumbnail":"a_thumb.jpg","title":"A"},
                {"thumbnail":"b_thumb.jpg"}
            ]}"#,
        )
        .unwrap();
        let cards: Vec<PhotoCard> = manifest.photos.into_iter().map(PhotoCard::from).collect();
        assert_eq!(cards[0].year.as_deref(), Some("2021"));
        assert_eq!(cards[0].month.as_deref(), Some("3"));
        assert_eq!(cards[1].year, None);
        assert_eq!(manifest.title.as_deref(), Some("Trips"));
    }

    #[tokio::test]
    async fn html_provider_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, PAGE).unwrap();

        let source = provider_for(&path).load(&path).await.unwrap();
        assert_eq!(source.cards.len(), 3);
        assert!(source.features.filter_panel);
        assert_eq!(source.base_dir(), path.canonicalize().unwrap().parent().unwrap());
    }

    #[tokio::test]
    async fn manifest_provider_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("album.json");
        std::fs::write(
            &path,
            r#"{"photos":[{"year":"2020","month":"1","thumbnail":"a_thumb.jpg","title":"A"}]}"#,
        )
        .unwrap();

        let source = provider_for(&path).load(&path).await.unwrap();
        assert_eq!(source.cards.len(), 1);
        assert_eq!(source.features, PageFeatures::ALL);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.html");
        assert!(HtmlPageProvider.load(&path).await.is_err());
    }
}
