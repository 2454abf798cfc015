use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::storage::LocalStore;

pub const VIEW_KEY: &str = "album_view";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grid/list preference, owner of the `album_view` key.
pub struct ViewModeToggle {
    mode: ViewMode,
    store: Arc<dyn LocalStore>,
}

impl ViewModeToggle {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            mode: ViewMode::Grid,
            store,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Only a stored `"list"` selects the list view.
    pub fn restore(&mut self) -> ViewMode {
        self.mode = match self.store.get(VIEW_KEY) {
            Ok(Some(raw)) if raw == ViewMode::List.as_str() => ViewMode::List,
            Ok(_) => ViewMode::Grid,
            Err(err) => {
                warn!(?err, "failed to read saved view mode");
                ViewMode::Grid
            }
        };
        self.mode
    }

    pub fn set(&mut self, mode: ViewMode) -> Result<()> {
        self.mode = mode;
        self.store.set(VIEW_KEY, mode.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLocalStore;

    #[test]
    fn defaults_to_grid() {
        let mut toggle = ViewModeToggle::new(Arc::new(MemoryLocalStore::new()));
        assert_eq!(toggle.restore(), ViewMode::Grid);
    }

    #[test]
    fn toggle_persists_each_change() {
        let store = Arc::new(MemoryLocalStore::new());
        let mut toggle = ViewModeToggle::new(store.clone());

        toggle.set(toggle.mode().toggled()).unwrap();
        assert_eq!(toggle.mode(), ViewMode::List);
        assert_eq!(store.get(VIEW_KEY).unwrap().as_deref(), Some("list"));
        toggle.set(toggle.mode().toggled()).unwrap();
        assert_eq!(toggle.mode(), ViewMode::Grid);
        assert_eq!(store.get(VIEW_KEY).unwrap().as_deref(), Some("grid"));
    }

    #[test]
    fn restore_reads_list_and_ignores_garbage() {
        let store = Arc::new(MemoryLocalStore::new());
        store.set(VIEW_KEY, "list").unwrap();
        let mut toggle = ViewModeToggle::new(store.clone());
        assert_eq!(toggle.restore(), ViewMode::List);

        store.set(VIEW_KEY, "mosaic").unwrap();
        assert_eq!(toggle.restore(), ViewMode::Grid);
    }
}
