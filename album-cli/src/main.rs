use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use album_core::{
    origin_for_path, AuthGate, AuthOutcome, Command, DigestGate, Direction, FileLocalStore,
    Gallery, GalleryConfig, GalleryEvent, LightboxView, LocalStore, MemoryLocalStore, OpenGate,
    PageState, PageSurface, PhotoCatalog, PhotoIndex, PhotoItem, Selector, Subscription,
    ViewMode,
};
use album_markup::provider_for;
use album_tty::{
    cycle_option, write_status_line, AssetCache, DrawParams, EventMapper, HitMap, InputMode,
    KittyRenderer, Rect, UiEvent,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const MAX_IMAGE_EDGE: u32 = 2048;
const CACHE_CAPACITY: usize = 16;
const MAX_PASSWORD_ATTEMPTS: usize = 3;
const CELL_WIDTH: u16 = 26;
const CELL_HEIGHT: u16 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "album",
    version,
    about = "Terminal viewer for generated family photo albums"
)]
struct Args {
    /// Album page (.html) or manifest (.json); defaults to `source` from the config
    source: Option<PathBuf>,

    /// Config file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for saved preferences and logs
    #[arg(long = "state-dir")]
    state_dir: Option<PathBuf>,

    /// Print the visible photos and exit
    #[arg(long)]
    list: bool,

    /// Lower bound of the date filter
    #[arg(long, value_name = "YYYY[-MM]")]
    from: Option<String>,

    /// Upper bound of the date filter
    #[arg(long, value_name = "YYYY[-MM]")]
    to: Option<String>,

    /// Drop the saved date filter
    #[arg(long)]
    clear: bool,

    /// Album password, when the album is protected
    #[arg(long)]
    password: Option<String>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let project_dirs = ProjectDirs::from("net", "album", "album");

    let data_root = match (&args.state_dir, &project_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.data_local_dir().to_path_buf(),
        (None, None) => return Err(anyhow!("unable to resolve platform data directories")),
    };
    let _log_guard = init_logging(&data_root.join("logs"))?;

    let config = match (&args.config, &project_dirs) {
        (Some(path), _) => GalleryConfig::load_or_default(path),
        (None, Some(dirs)) => GalleryConfig::load_or_default(&dirs.config_dir().join("config.toml")),
        (None, None) => GalleryConfig::default(),
    };

    let source_path = args
        .source
        .clone()
        .or_else(|| config.source.clone())
        .ok_or_else(|| anyhow!("no album given and no `source` in the config"))?;
    let source = provider_for(&source_path)
        .load(&source_path)
        .await
        .with_context(|| format!("failed to open {:?}", source_path))?;
    info!(path = %source.path.display(), cards = source.cards.len(), "album loaded");

    let gate = build_gate(&config);
    let origin = origin_for_path(&source.path);
    let store: Arc<dyn LocalStore> =
        Arc::new(FileLocalStore::new(data_root.join("state"), origin)?);
    let title = source
        .title
        .clone()
        .unwrap_or_else(|| source_path.display().to_string());
    let base_dir = source.base_dir().to_path_buf();
    let catalog = PhotoCatalog::from_cards(source.cards, &config.naming());

    if args.list {
        if !gate.is_authenticated() {
            let password = args
                .password
                .as_deref()
                .ok_or_else(|| anyhow!("album is password protected; pass --password"))?;
            if gate.authenticate(password)? == AuthOutcome::Denied {
                bail!("incorrect password");
            }
        }
        let mut gallery = Gallery::new(
            catalog,
            PageState::new(source.features),
            store,
            config.detail_marker.clone(),
        );
        gallery.init()?;
        apply_cli_filter(&mut gallery, &args)?;
        let mut stdout = io::stdout();
        print_listing(&mut stdout, &title, &gallery)?;
        return Ok(());
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);

    if !unlock(&mut renderer, gate.as_ref(), args.password.as_deref())? {
        renderer.clear_all()?;
        return Ok(());
    }

    let mut gallery = Gallery::new(
        catalog,
        PageState::new(source.features),
        store,
        config.detail_marker.clone(),
    );
    gallery.init()?;
    apply_cli_filter(&mut gallery, &args)?;
    let events = gallery.subscribe();
    let mut app = App::new(gallery, events, title, base_dir);
    let mut event_mapper = EventMapper::new();
    let mut dirty = true;

    loop {
        let mode = app.input_mode();
        if event_mapper.mode() != mode {
            event_mapper.set_mode(mode);
        }

        if dirty {
            let pending = event_mapper.pending_input();
            redraw(&mut renderer, &mut app, pending.as_deref())?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            if matches!(ev, Event::Resize(..)) {
                dirty = true;
                continue;
            }
            let ui_event = event_mapper.map_event(ev);
            match handle_event(ui_event, &mut app)? {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Logout => {
                    gate.logout()?;
                    if !gate.is_authenticated() {
                        info!("logged out");
                        if !unlock(&mut renderer, gate.as_ref(), None)? {
                            break;
                        }
                    }
                    dirty = true;
                }
                LoopAction::Quit => break,
            }
        }
    }

    renderer.clear_images()?;
    renderer.clear_all()?;
    Ok(())
}

fn build_gate(config: &GalleryConfig) -> Box<dyn AuthGate> {
    match &config.password_sha256 {
        Some(digest) => Box::new(DigestGate::new(
            digest.clone(),
            Arc::new(MemoryLocalStore::new()),
        )),
        None => Box::new(OpenGate),
    }
}

/// Runs the password prompt until the gate admits the user. Returns false
/// when the user gives up.
fn unlock(
    renderer: &mut KittyRenderer<io::Stdout>,
    gate: &dyn AuthGate,
    preset: Option<&str>,
) -> Result<bool> {
    if gate.is_authenticated() {
        return Ok(true);
    }
    if let Some(password) = preset {
        if gate.authenticate(password)? == AuthOutcome::Session {
            return Ok(true);
        }
    }
    let mut error = None;
    for _ in 0..MAX_PASSWORD_ATTEMPTS {
        let Some(password) = read_password(renderer, error)? else {
            return Ok(false);
        };
        if gate.authenticate(&password)? == AuthOutcome::Session {
            return Ok(true);
        }
        error = Some("Incorrect password");
    }
    Ok(false)
}

fn read_password(
    renderer: &mut KittyRenderer<io::Stdout>,
    error: Option<&str>,
) -> Result<Option<String>> {
    let mut password = String::new();
    loop {
        {
            let writer = renderer.writer();
            crossterm::queue!(
                writer,
                Clear(ClearType::All),
                cursor::MoveTo(2, 1),
                SetAttribute(Attribute::Bold),
                Print("This album is password protected."),
                SetAttribute(Attribute::Reset),
                cursor::MoveTo(2, 3),
                Print(format!("Password: {}", "*".repeat(password.chars().count()))),
            )?;
            if let Some(error) = error {
                crossterm::queue!(writer, cursor::MoveTo(2, 5), Print(error))?;
            }
            writer.flush()?;
        }
        if let Event::Key(key) = event::read()? {
            match (key.code, key.modifiers) {
                (KeyCode::Enter, _) => return Ok(Some(password)),
                (KeyCode::Esc, _) => return Ok(None),
                (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None)
                }
                (KeyCode::Backspace, _) => {
                    password.pop();
                }
                (KeyCode::Char(c), _) => password.push(c),
                _ => {}
            }
        }
    }
}

fn apply_cli_filter(gallery: &mut Gallery<PageState>, args: &Args) -> Result<()> {
    if args.clear {
        gallery.apply(Command::ClearFilter)?;
    }
    let bounds = [
        (&args.from, Selector::YearFrom, Selector::MonthFrom),
        (&args.to, Selector::YearTo, Selector::MonthTo),
    ];
    for (raw, year_selector, month_selector) in bounds {
        let Some(raw) = raw else {
            continue;
        };
        let (year, month) = parse_bound(raw)?;
        gallery.apply(Command::SetSelector {
            selector: year_selector,
            value: year,
        })?;
        gallery.apply(Command::SetSelector {
            selector: month_selector,
            value: month,
        })?;
    }
    Ok(())
}

/// Splits `YYYY` or `YYYY-MM` into selector values.
fn parse_bound(raw: &str) -> Result<(String, String)> {
    let (year, month) = raw.trim().split_once('-').unwrap_or((raw.trim(), ""));
    let year: i32 = year
        .parse()
        .with_context(|| format!("invalid year in {:?}", raw))?;
    if month.is_empty() {
        return Ok((year.to_string(), String::new()));
    }
    match month.parse::<u32>() {
        Ok(month @ 1..=12) => Ok((year.to_string(), month.to_string())),
        _ => bail!("invalid month in {:?}", raw),
    }
}

fn print_listing<W: Write>(out: &mut W, title: &str, gallery: &Gallery<PageState>) -> Result<()> {
    writeln!(out, "{}", title)?;
    match gallery.page().results() {
        Some(results) => writeln!(out, "{}", results)?,
        None => writeln!(out, "{} photos", gallery.catalog().visible_count())?,
    }
    for (position, photo) in gallery.navigable().photos().iter().enumerate() {
        if let Some(item) = gallery.catalog().get(*photo) {
            writeln!(
                out,
                "{:>3}. {:<8} {}",
                position + 1,
                date_label(item),
                card_title(item)
            )?;
        }
    }
    Ok(())
}

fn date_label(item: &PhotoItem) -> String {
    match (item.year, item.month) {
        (Some(year), Some(month)) => format!("{}-{:02}", year, month),
        (Some(year), None) => year.to_string(),
        _ => "undated".to_string(),
    }
}

fn card_title(item: &PhotoItem) -> &str {
    if item.title.is_empty() {
        "(untitled)"
    } else {
        &item.title
    }
}

/// Maps an asset reference from the page to a local file. Remote URLs have
/// no local counterpart.
fn resolve_asset(base_dir: &Path, asset: &str) -> Option<PathBuf> {
    let asset = asset.trim();
    if asset.is_empty() || asset.contains("://") || asset.starts_with("data:") {
        return None;
    }
    Some(base_dir.join(asset.trim_start_matches('/')))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Card(PhotoIndex),
    Selector(Selector),
    Apply,
    Clear,
    ViewToggle,
    Backdrop,
    Image,
    Prev,
    Next,
    Close,
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Logout,
    Quit,
}

struct App {
    gallery: Gallery<PageState>,
    events: Subscription,
    title: String,
    base_dir: PathBuf,
    cursor: usize,
    scroll: usize,
    filter_focus: Option<usize>,
    status: Option<String>,
    hits: HitMap<Target>,
    cache: Arc<AssetCache>,
}

impl App {
    fn new(
        gallery: Gallery<PageState>,
        events: Subscription,
        title: String,
        base_dir: PathBuf,
    ) -> Self {
        Self {
            gallery,
            events,
            title,
            base_dir,
            cursor: 0,
            scroll: 0,
            filter_focus: None,
            status: None,
            hits: HitMap::new(),
            cache: Arc::new(AssetCache::new(CACHE_CAPACITY)),
        }
    }

    fn input_mode(&self) -> InputMode {
        if self.gallery.page().lightbox().is_some() {
            InputMode::Lightbox
        } else if self.filter_focus.is_some() {
            InputMode::Filter
        } else {
            InputMode::Grid
        }
    }

    fn dispatch(&mut self, command: Command) {
        if let Err(err) = self.gallery.apply(command) {
            warn!(%err, "command failed");
            self.status = Some(err.to_string());
        }
        for event in self.events.drain() {
            match event {
                GalleryEvent::FollowLink { href } => {
                    self.status = Some(format!("Detail page: {}", href));
                }
                GalleryEvent::LightboxOpened { position, .. }
                | GalleryEvent::LightboxMoved { position, .. } => self.cursor = position,
                _ => {}
            }
        }
        self.clamp_cursor();
        self.warm_preloads();
    }

    fn clamp_cursor(&mut self) {
        let last = self.gallery.navigable().last_position().unwrap_or(0);
        self.cursor = self.cursor.min(last);
    }

    fn move_cursor(&mut self, delta: isize) -> bool {
        let Some(last) = self.gallery.navigable().last_position() else {
            return false;
        };
        let next = self.cursor.saturating_add_signed(delta).min(last);
        let moved = next != self.cursor;
        self.cursor = next;
        moved
    }

    fn focused_selector(&self) -> Option<Selector> {
        self.filter_focus.map(|idx| Selector::ALL[idx % Selector::ALL.len()])
    }

    fn cycle_selector(&mut self, selector: Selector, delta: isize) {
        let page = self.gallery.page();
        let value = cycle_option(page.options(selector), page.selector_value(selector), delta);
        if let Some(value) = value {
            self.dispatch(Command::SetSelector { selector, value });
        }
    }

    /// Decodes assets the gallery asked to preload on blocking workers.
    fn warm_preloads(&mut self) {
        for asset in self.gallery.page_mut().take_preloads() {
            let Some(path) = resolve_asset(&self.base_dir, &asset) else {
                continue;
            };
            if self.cache.contains(&path) {
                continue;
            }
            let cache = Arc::clone(&self.cache);
            tokio::task::spawn_blocking(move || {
                if let Err(err) = cache.load(&path, MAX_IMAGE_EDGE) {
                    debug!(?err, "preload failed");
                }
            });
        }
    }
}

fn handle_event(event: UiEvent, app: &mut App) -> Result<LoopAction> {
    app.status = None;
    match event {
        UiEvent::Command(command) => {
            app.dispatch(command);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::MoveCursor { delta } => {
            if app.move_cursor(delta) {
                Ok(LoopAction::ContinueRedraw)
            } else {
                Ok(LoopAction::Continue)
            }
        }
        UiEvent::CursorHome => {
            app.cursor = 0;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::CursorEnd => {
            app.cursor = app.gallery.navigable().last_position().unwrap_or(0);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::ActivateCursor => {
            if let Some(photo) = app.gallery.navigable().photo_at(app.cursor) {
                app.dispatch(Command::ActivateCard { photo });
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::EnterFilter => {
            if app.gallery.page().features().filter_panel {
                app.filter_focus = Some(0);
                Ok(LoopAction::ContinueRedraw)
            } else {
                app.status = Some("This album has no date filter".to_string());
                Ok(LoopAction::ContinueRedraw)
            }
        }
        UiEvent::LeaveFilter => {
            app.filter_focus = None;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::FocusSelector { delta } => {
            let len = Selector::ALL.len() as isize;
            let current = app.filter_focus.unwrap_or(0) as isize;
            app.filter_focus = Some((current + delta).rem_euclid(len) as usize);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::CycleOption { delta } => {
            if let Some(selector) = app.focused_selector() {
                app.cycle_selector(selector, delta);
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::Click { column, row } => {
            let Some(target) = app.hits.at(column, row) else {
                return Ok(LoopAction::Continue);
            };
            handle_click(target, app);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::Hover { column, row } => {
            if let Some(Target::Card(photo)) = app.hits.at(column, row) {
                app.dispatch(Command::HoverCard { photo });
            }
            Ok(LoopAction::Continue)
        }
        UiEvent::Logout => Ok(LoopAction::Logout),
        UiEvent::Quit => Ok(LoopAction::Quit),
        UiEvent::None => Ok(LoopAction::Continue),
    }
}

fn handle_click(target: Target, app: &mut App) {
    match target {
        Target::Card(photo) => {
            if let Some(position) = app.gallery.navigable().position_of(photo) {
                app.cursor = position;
            }
            app.dispatch(Command::ActivateCard { photo });
        }
        Target::Selector(selector) => {
            app.filter_focus = Selector::ALL.iter().position(|s| *s == selector);
            app.cycle_selector(selector, 1);
        }
        Target::Apply => app.dispatch(Command::ApplyFilter),
        Target::Clear => app.dispatch(Command::ClearFilter),
        Target::ViewToggle => app.dispatch(Command::ToggleViewMode),
        Target::Prev => app.dispatch(Command::Navigate(Direction::Prev)),
        Target::Next => app.dispatch(Command::Navigate(Direction::Next)),
        Target::Close => app.dispatch(Command::CloseLightbox),
        Target::Backdrop => app.dispatch(Command::BackdropClick),
        Target::Image => {}
    }
}

fn redraw(
    renderer: &mut KittyRenderer<io::Stdout>,
    app: &mut App,
    pending_input: Option<&str>,
) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    app.hits.clear();
    renderer.begin_sync_update()?;
    renderer.clear_images()?;
    {
        let writer = renderer.writer();
        crossterm::queue!(writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    }

    match app.gallery.page().lightbox().cloned() {
        Some(view) => draw_lightbox(renderer, app, &view, cols, rows)?,
        None => draw_gallery(renderer.writer(), app, cols, rows)?,
    }

    let hint = match app.input_mode() {
        InputMode::Lightbox => "h/l or arrows navigate | esc close",
        InputMode::Filter => "tab next | h/l change | enter apply | c clear | esc back",
        InputMode::Grid => "j/k move | enter open | f filter | v view | c clear | L logout | q quit",
    };
    let status = app.status.clone().unwrap_or_else(|| hint.to_string());
    if let Some(status) = combine_status(Some(status), pending_input) {
        draw_status_line(renderer, &status, cols, rows)?;
    }
    renderer.end_sync_update()?;
    Ok(())
}

fn draw_gallery(writer: &mut io::Stdout, app: &mut App, cols: u16, rows: u16) -> Result<()> {
    put(writer, 0, 0, &truncate(&app.title, cols as usize), Style::Bold)?;
    let mut row = 2;

    let page = app.gallery.page();
    if page.features().filter_panel {
        let focused = app.filter_focus.map(|idx| Selector::ALL[idx]);
        let mut x = 0;
        for selector in Selector::ALL {
            let prefix = match selector {
                Selector::YearFrom => "From ",
                Selector::YearTo => "  To ",
                _ => " ",
            };
            x = put(writer, x, row, prefix, Style::Plain)?.right();
            let value = page.selector_value(selector);
            let label = page
                .options(selector)
                .iter()
                .find(|option| option.value == value)
                .map(|option| option.label.clone())
                .unwrap_or_else(|| value.to_string());
            let style = if focused == Some(selector) {
                Style::Reverse
            } else {
                Style::Plain
            };
            let rect = put(writer, x, row, &format!("[{}]", label), style)?;
            app.hits.push(rect, Target::Selector(selector));
            x = rect.right();
        }
        x = put(writer, x, row, "  ", Style::Plain)?.right();
        let rect = put(writer, x, row, "[Apply]", Style::Plain)?;
        app.hits.push(rect, Target::Apply);
        let rect = put(writer, rect.right() + 1, row, "[Clear]", Style::Plain)?;
        app.hits.push(rect, Target::Clear);
        let view_label = match page.view_mode() {
            ViewMode::Grid => "[*Grid | List]",
            ViewMode::List => "[Grid | *List]",
        };
        let rect = put(writer, rect.right() + 2, row, view_label, Style::Plain)?;
        app.hits.push(rect, Target::ViewToggle);
        row += 1;
    }
    if let Some(results) = page.results() {
        put(writer, 0, row, &results.to_string(), Style::Bold)?;
        row += 1;
    }
    row += 1;

    let area_rows = rows.saturating_sub(row + 1);
    let photos = app.gallery.navigable().photos().to_vec();
    if photos.is_empty() {
        put(writer, 0, row, "No photos to show", Style::Plain)?;
        return Ok(());
    }

    let (per_line, line_height) = match app.gallery.page().view_mode() {
        ViewMode::Grid => ((cols / CELL_WIDTH).max(1) as usize, CELL_HEIGHT),
        ViewMode::List => (1, 1),
    };
    let visible_lines = (area_rows / line_height).max(1) as usize;
    let cursor_line = app.cursor / per_line;
    if cursor_line < app.scroll {
        app.scroll = cursor_line;
    } else if cursor_line >= app.scroll + visible_lines {
        app.scroll = cursor_line + 1 - visible_lines;
    }

    let first = app.scroll * per_line;
    let last = (first + visible_lines * per_line).min(photos.len());
    for (offset, photo) in photos[first..last].iter().enumerate() {
        let Some(item) = app.gallery.catalog().get(*photo) else {
            continue;
        };
        let selected = first + offset == app.cursor;
        let style = if selected { Style::Reverse } else { Style::Plain };
        let line = (offset / per_line) as u16;
        let column = (offset % per_line) as u16;
        let rect = match app.gallery.page().view_mode() {
            ViewMode::Grid => {
                let x = column * CELL_WIDTH;
                let y = row + line * CELL_HEIGHT;
                let width = (CELL_WIDTH - 2) as usize;
                put(writer, x, y, &pad(&date_label(item), width), Style::Dim)?;
                put(writer, x, y + 1, &pad(card_title(item), width), style)?;
                Rect::new(x, y, CELL_WIDTH - 2, CELL_HEIGHT - 1)
            }
            ViewMode::List => {
                let text = format!("{:<8} {}", date_label(item), card_title(item));
                put(writer, 0, row + line, &pad(&text, cols as usize), style)?
            }
        };
        app.hits.push(rect, Target::Card(*photo));
    }
    Ok(())
}

fn draw_lightbox(
    renderer: &mut KittyRenderer<io::Stdout>,
    app: &mut App,
    view: &LightboxView,
    cols: u16,
    rows: u16,
) -> Result<()> {
    app.hits.push(Rect::new(0, 0, cols, rows), Target::Backdrop);

    let area_cols = u32::from(cols.saturating_sub(16)).max(1);
    let area_rows = u32::from(rows.saturating_sub(4)).max(1);
    let mid_row = rows / 2;

    match resolve_asset(&app.base_dir, &view.asset).map(|path| app.cache.load(&path, MAX_IMAGE_EDGE)) {
        Some(Ok(image)) => {
            let (cell_width, cell_height) = match terminal::window_size() {
                Ok(window) => cell_size(window.width, window.height, cols, rows),
                Err(_) => cell_size(0, 0, cols, rows),
            };
            let (draw_cols, draw_rows) = fit_cells(
                image.width,
                image.height,
                area_cols,
                area_rows,
                cell_width,
                cell_height,
            );
            let start_col = (u32::from(cols).saturating_sub(draw_cols) / 2) as u16;
            let start_row = 1 + (area_rows.saturating_sub(draw_rows) / 2) as u16;
            crossterm::queue!(renderer.writer(), cursor::MoveTo(start_col, start_row))?;
            renderer.draw(&image, DrawParams::clamped(draw_cols, draw_rows))?;
            app.hits.push(
                Rect::new(start_col, start_row, draw_cols as u16, draw_rows as u16),
                Target::Image,
            );
        }
        Some(Err(err)) => {
            warn!(?err, asset = %view.asset, "failed to load full-size image");
            put(renderer.writer(), 8, mid_row, "(image unavailable)", Style::Dim)?;
        }
        None => {
            put(renderer.writer(), 8, mid_row, &truncate(&view.asset, area_cols as usize), Style::Dim)?;
        }
    }

    let writer = renderer.writer();
    let caption = truncate(&view.caption, cols as usize);
    let caption_col = (cols as usize).saturating_sub(caption.chars().count()) / 2;
    put(writer, caption_col as u16, rows.saturating_sub(3), &caption, Style::Bold)?;
    let rect = put(writer, cols.saturating_sub(4), 0, "[x]", Style::Plain)?;
    app.hits.push(rect, Target::Close);
    if view.prev_visible {
        let rect = put(writer, 1, mid_row, "< Prev", Style::Reverse)?;
        app.hits.push(rect, Target::Prev);
    }
    if view.next_visible {
        let rect = put(writer, cols.saturating_sub(7), mid_row, "Next >", Style::Reverse)?;
        app.hits.push(rect, Target::Next);
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Style {
    Plain,
    Bold,
    Dim,
    Reverse,
}

trait RectExt {
    fn right(&self) -> u16;
}

impl RectExt for Rect {
    fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }
}

/// Prints `text` at a cell and returns the cells it covers.
fn put(writer: &mut impl Write, col: u16, row: u16, text: &str, style: Style) -> Result<Rect> {
    let attribute = match style {
        Style::Plain => Attribute::Reset,
        Style::Bold => Attribute::Bold,
        Style::Dim => Attribute::Dim,
        Style::Reverse => Attribute::Reverse,
    };
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(attribute),
        Print(text),
        SetAttribute(Attribute::Reset)
    )?;
    let width = u16::try_from(text.chars().count()).unwrap_or(u16::MAX);
    Ok(Rect::new(col, row, width, 1))
}

fn cell_size(pixel_width: u16, pixel_height: u16, cols: u16, rows: u16) -> (f32, f32) {
    if pixel_width == 0 || pixel_height == 0 || cols == 0 || rows == 0 {
        return (8.0, 16.0);
    }
    (
        f32::from(pixel_width) / f32::from(cols),
        f32::from(pixel_height) / f32::from(rows),
    )
}

/// Largest cell box that keeps the image's aspect ratio inside the area.
fn fit_cells(
    image_width: u32,
    image_height: u32,
    max_cols: u32,
    max_rows: u32,
    cell_width: f32,
    cell_height: f32,
) -> (u32, u32) {
    let max_cols = max_cols.max(1);
    let max_rows = max_rows.max(1);
    if image_width == 0 || image_height == 0 || cell_width <= 0.0 || cell_height <= 0.0 {
        return (max_cols, max_rows);
    }
    let available_width = max_cols as f32 * cell_width;
    let available_height = max_rows as f32 * cell_height;
    let scale = (available_width / image_width as f32).min(available_height / image_height as f32);
    let cols = (image_width as f32 * scale / cell_width)
        .floor()
        .clamp(1.0, max_cols as f32) as u32;
    let rows = (image_height as f32 * scale / cell_height)
        .floor()
        .clamp(1.0, max_rows as f32) as u32;
    (cols, rows)
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn draw_status_line(
    renderer: &mut KittyRenderer<io::Stdout>,
    status: &str,
    cols: u16,
    rows: u16,
) -> Result<()> {
    let status_row = rows.saturating_sub(1);
    let writer = renderer.writer();
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, status_row),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(writer, &truncate(status, cols as usize))?;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 3 {
        return text.chars().take(width).collect();
    }
    let mut truncated = text.chars().take(width - 3).collect::<String>();
    truncated.push_str("...");
    truncated
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate(text, width), width = width)
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "album.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
