use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use album_core::{Command, LightboxKey, SelectOption};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind},
    terminal::{Clear, ClearType},
};
use parking_lot::Mutex;
use png::{BitDepth, ColorType, Encoder};

/// Decoded RGBA pixels ready for the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightboxImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl LightboxImage {
    /// Decodes an image file, shrinking it so neither edge exceeds
    /// `max_edge`. Aspect ratio is kept.
    pub fn load(path: &Path, max_edge: u32) -> Result<Self> {
        let decoded =
            image::open(path).with_context(|| format!("failed to decode image {:?}", path))?;
        let max_edge = max_edge.max(1);
        let fitted = if decoded.width() > max_edge || decoded.height() > max_edge {
            decoded.thumbnail(max_edge, max_edge)
        } else {
            decoded
        };
        let rgba = fitted.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

/// Recently decoded full-size assets, shared with preload workers. Oldest
/// entries are evicted first.
pub struct AssetCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    order: VecDeque<PathBuf>,
    images: HashMap<PathBuf, Arc<LightboxImage>>,
}

impl AssetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<LightboxImage>> {
        self.inner.lock().images.get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().images.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, path: PathBuf, image: LightboxImage) -> Arc<LightboxImage> {
        let image = Arc::new(image);
        let mut inner = self.inner.lock();
        if inner.images.insert(path.clone(), Arc::clone(&image)).is_none() {
            inner.order.push_back(path);
        }
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.images.remove(&evicted);
            }
        }
        image
    }

    /// Returns the cached image or decodes and caches it.
    pub fn load(&self, path: &Path, max_edge: u32) -> Result<Arc<LightboxImage>> {
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }
        let image = LightboxImage::load(path, max_edge)?;
        Ok(self.insert(path.to_path_buf(), image))
    }
}

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Transmits and places the image at the cursor, scaled into
    /// `params` cells.
    pub fn draw(&mut self, image: &LightboxImage, params: DrawParams) -> Result<()> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.pixels)?;
        writer.finish()?;

        let encoded = BASE64.encode(&buffer);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={}",
                    self.image_id,
                    self.placement_id,
                    params.columns,
                    params.rows,
                    image.width,
                    image.height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Removes every placement this renderer made.
    pub fn clear_images(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=A,q=2\u{1b}\\")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// The terminal renders everything buffered since `begin_sync_update`.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

/// Screen cells, in terminal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.x
            && row >= self.y
            && u32::from(column) < u32::from(self.x) + u32::from(self.width)
            && u32::from(row) < u32::from(self.y) + u32::from(self.height)
    }
}

/// Click targets of the last frame. Later entries sit on top.
#[derive(Debug, Clone)]
pub struct HitMap<T> {
    regions: Vec<(Rect, T)>,
}

impl<T> Default for HitMap<T> {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
        }
    }
}

impl<T: Clone> HitMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn push(&mut self, rect: Rect, target: T) {
        self.regions.push((rect, target));
    }

    pub fn at(&self, column: u16, row: u16) -> Option<T> {
        self.regions
            .iter()
            .rev()
            .find(|(rect, _)| rect.contains(column, row))
            .map(|(_, target)| target.clone())
    }
}

/// Value `delta` steps away from `current` in `options`, wrapping around.
/// An unknown current value counts as the first option.
pub fn cycle_option(options: &[SelectOption], current: &str, delta: isize) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let len = options.len() as isize;
    let at = options
        .iter()
        .position(|option| option.value == current)
        .unwrap_or(0) as isize;
    let next = (at + delta).rem_euclid(len) as usize;
    Some(options[next].value.clone())
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Command(Command),
    MoveCursor { delta: isize },
    CursorHome,
    CursorEnd,
    ActivateCursor,
    EnterFilter,
    LeaveFilter,
    FocusSelector { delta: isize },
    CycleOption { delta: isize },
    Click { column: u16, row: u16 },
    Hover { column: u16, row: u16 },
    Logout,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Grid,
    Filter,
    Lightbox,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(key) => match self.mode {
                InputMode::Grid => self.map_key_grid(key),
                InputMode::Filter => self.map_key_filter(key),
                InputMode::Lightbox => self.map_key_lightbox(key),
            },
            Event::Mouse(mouse) => self.map_mouse(mouse),
            _ => UiEvent::None,
        }
    }

    fn map_key_grid(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                let count = self.take_count() as isize;
                UiEvent::MoveCursor { delta: count }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                let count = self.take_count() as isize;
                UiEvent::MoveCursor { delta: -count }
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                self.reset_count();
                UiEvent::CursorHome
            }
            (KeyCode::Char('G'), KeyModifiers::SHIFT) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::CursorEnd
            }
            (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::ActivateCursor
            }
            (KeyCode::Char('f'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::EnterFilter
            }
            (KeyCode::Char('v'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::ToggleViewMode)
            }
            (KeyCode::Char('c'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::ClearFilter)
            }
            (KeyCode::Char('L'), KeyModifiers::SHIFT) => {
                self.reset_count();
                UiEvent::Logout
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_filter(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('f'), KeyModifiers::NONE) => UiEvent::LeaveFilter,
            (KeyCode::Tab, _) | (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                UiEvent::FocusSelector { delta: 1 }
            }
            (KeyCode::BackTab, _) | (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                UiEvent::FocusSelector { delta: -1 }
            }
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => {
                UiEvent::CycleOption { delta: -1 }
            }
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, _) => {
                UiEvent::CycleOption { delta: 1 }
            }
            (KeyCode::Enter, _) => UiEvent::Command(Command::ApplyFilter),
            (KeyCode::Char('c'), KeyModifiers::NONE) => UiEvent::Command(Command::ClearFilter),
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_key_lightbox(&mut self, key: KeyEvent) -> UiEvent {
        let key = match key.code {
            KeyCode::Esc => LightboxKey::Escape,
            KeyCode::Left | KeyCode::Char('h') => LightboxKey::ArrowLeft,
            KeyCode::Right | KeyCode::Char('l') => LightboxKey::ArrowRight,
            KeyCode::Char('q') => return UiEvent::Quit,
            _ => return UiEvent::None,
        };
        UiEvent::Command(Command::LightboxKey(key))
    }

    fn map_mouse(&mut self, mouse: MouseEvent) -> UiEvent {
        let MouseEvent {
            kind, column, row, ..
        } = mouse;
        match kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.reset_count();
                UiEvent::Click { column, row }
            }
            MouseEventKind::Moved => UiEvent::Hover { column, row },
            MouseEventKind::ScrollDown if self.mode == InputMode::Grid => {
                UiEvent::MoveCursor { delta: 1 }
            }
            MouseEventKind::ScrollUp if self.mode == InputMode::Grid => {
                UiEvent::MoveCursor { delta: -1 }
            }
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
