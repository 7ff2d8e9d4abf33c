//! Result grid: per-tile display state, prompt editing and downloads.

use crate::error::{PlatesError, Result};
use crate::session::{Session, Slot};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// What a tile's image area shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileDisplay {
    /// No image yet: generation pending or failed.
    Placeholder,
    /// The generated image.
    Image,
}

/// Asks the orchestrator to regenerate one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateCommand {
    /// Slot to regenerate.
    pub index: usize,
    /// Prompt to use and commit.
    pub prompt: String,
}

/// Local UI state of one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileView {
    index: usize,
    is_editing: bool,
    is_prompt_visible: bool,
    edited_prompt: String,
}

impl TileView {
    /// Creates the view for `slot` at `index`.
    pub fn new(index: usize, slot: &Slot) -> Self {
        Self {
            index,
            is_editing: false,
            is_prompt_visible: false,
            edited_prompt: slot.prompt.clone(),
        }
    }

    /// Position in the grid.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The first tile spans the full grid width.
    pub fn is_hero(&self) -> bool {
        self.index == 0
    }

    /// Whether the prompt editor is open.
    pub fn is_editing(&self) -> bool {
        self.is_editing
    }

    /// Whether the prompt panel is shown.
    pub fn is_prompt_visible(&self) -> bool {
        self.is_prompt_visible
    }

    /// The prompt draft.
    pub fn edited_prompt(&self) -> &str {
        &self.edited_prompt
    }

    /// Shows or hides the prompt panel.
    pub fn toggle_prompt(&mut self) {
        self.is_prompt_visible = !self.is_prompt_visible;
    }

    /// Opens the editor. The prompt panel is shown with it.
    pub fn begin_edit(&mut self) {
        self.is_editing = true;
        self.is_prompt_visible = true;
    }

    /// Replaces the draft.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.edited_prompt = text.into();
    }

    /// Leaves edit mode and returns the regeneration to run.
    pub fn save(&mut self) -> RegenerateCommand {
        self.is_editing = false;
        RegenerateCommand {
            index: self.index,
            prompt: self.edited_prompt.clone(),
        }
    }

    /// Leaves edit mode, reverting the draft to the slot's committed prompt.
    pub fn cancel(&mut self, slot: &Slot) {
        self.edited_prompt = slot.prompt.clone();
        self.is_editing = false;
    }
}

/// Image area state of a slot.
pub fn display(slot: &Slot) -> TileDisplay {
    if slot.has_image() {
        TileDisplay::Image
    } else {
        TileDisplay::Placeholder
    }
}

/// Downloads are offered only for finished slots with an image.
pub fn can_download(slot: &Slot) -> bool {
    slot.has_image() && !slot.is_loading
}

/// File name for a downloaded plate: `<Shot_Name>_<lens>.png`.
pub fn download_filename(name: &str, lens: &str) -> String {
    let name = name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{name}_{lens}.png")
}

/// Writes the slot's image into `dir` and returns the file path.
pub async fn download(slot: &Slot, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let image = match &slot.image {
        Some(image) if !slot.is_loading => image,
        _ => {
            return Err(PlatesError::InvalidRequest(format!(
                "{} has no image to download",
                slot.profile.name
            )))
        }
    };
    // Shot names such as "Desk/Surface Detail" must not create directories.
    let filename = download_filename(slot.profile.name, slot.profile.lens).replace('/', "-");
    let path = dir.as_ref().join(filename);
    image.save(&path).await?;
    tracing::debug!(path = %path.display(), "saved plate");
    Ok(path)
}

/// One [`TileView`] per slot of the session.
#[derive(Debug, Clone, Default)]
pub struct ResultGrid {
    tiles: Vec<TileView>,
    batch: u64,
}

impl ResultGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the tiles when the session's slot sequence was replaced.
    ///
    /// Tiles survive in-place slot updates, so open editors keep their drafts.
    pub fn sync(&mut self, session: &Session) {
        let slots = session.slots();
        if self.batch != session.batch_id() || self.tiles.len() != slots.len() {
            self.batch = session.batch_id();
            self.tiles = slots
                .iter()
                .enumerate()
                .map(|(index, slot)| TileView::new(index, slot))
                .collect();
        }
    }

    /// The tiles, in slot order.
    pub fn tiles(&self) -> &[TileView] {
        &self.tiles
    }

    /// Mutable access to one tile.
    pub fn tile_mut(&mut self, index: usize) -> Option<&mut TileView> {
        self.tiles.get_mut(index)
    }

    /// Plain-text rendering of the grid.
    pub fn render(&self, session: &Session) -> String {
        let mut out = String::new();
        if let Some(error) = session.error() {
            let _ = writeln!(out, "Error: {error}");
        }
        for (tile, slot) in self.tiles.iter().zip(session.slots()) {
            let state = match (slot.is_loading, display(slot)) {
                (true, _) => "generating",
                (false, TileDisplay::Image) => "ready",
                (false, TileDisplay::Placeholder) => "no image",
            };
            let marker = if tile.is_hero() { "*" } else { " " };
            let _ = writeln!(
                out,
                "{marker}[{}] {} ({}): {state}",
                tile.index + 1,
                slot.profile.name,
                slot.profile.lens
            );
            let _ = writeln!(out, "      {}", slot.profile.description);
            if tile.is_prompt_visible {
                let prompt = if tile.is_editing {
                    tile.edited_prompt.as_str()
                } else {
                    slot.prompt.as_str()
                };
                let label = if tile.is_editing { "draft" } else { "prompt" };
                let _ = writeln!(out, "      {label}: {prompt}");
            }
        }
        out
    }
}
