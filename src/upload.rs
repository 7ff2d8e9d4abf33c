//! Source image intake: file picker and drag-and-drop.
//!
//! Both entry points hand their first file to the same acceptance path, so
//! picking and dropping behave identically. Nothing here validates the file;
//! the accept filter is only a hint for pickers.

use crate::error::Result;
use crate::image::{DataUrl, ImageFormat};
use std::path::{Path, PathBuf};

/// MIME types offered to file pickers.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// MIME type used when a file's type cannot be determined.
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A source image read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// `data:<mime>;base64,<payload>` form of the file.
    pub data_url: String,
    /// MIME type of the file.
    pub mime_type: String,
}

/// Drag-and-drop events delivered to the drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    /// The pointer entered the zone carrying data.
    Enter,
    /// The pointer moves over the zone.
    Over,
    /// The pointer left the zone.
    Leave,
    /// Files were dropped on the zone.
    Drop(Vec<PathBuf>),
}

/// What the host should do after a drag event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome {
    /// The host's default handling (navigating to the file) must be suppressed.
    pub prevent_default: bool,
    /// A file to upload, for drops.
    pub file: Option<PathBuf>,
}

/// State of the upload drop zone.
#[derive(Debug, Clone, Default)]
pub struct UploadSurface {
    is_dragging: bool,
}

impl UploadSurface {
    /// Creates an idle drop zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a drag is hovering the zone.
    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    /// Accept filter for pickers, e.g. `image/png, image/jpeg, image/webp`.
    pub fn accept_filter() -> String {
        ACCEPTED_MIME_TYPES.join(", ")
    }

    /// Handles a picker change event.
    pub fn pick(&self, files: Vec<PathBuf>) -> Option<PathBuf> {
        self.accept(files)
    }

    /// Handles a drag event on the drop zone.
    pub fn drag(&mut self, event: DragEvent) -> DragOutcome {
        let file = match event {
            DragEvent::Enter => {
                self.is_dragging = true;
                None
            }
            DragEvent::Over => None,
            DragEvent::Leave => {
                self.is_dragging = false;
                None
            }
            DragEvent::Drop(files) => {
                self.is_dragging = false;
                self.accept(files)
            }
        };
        DragOutcome {
            prevent_default: true,
            file,
        }
    }

    fn accept(&self, files: Vec<PathBuf>) -> Option<PathBuf> {
        files.into_iter().next()
    }
}

/// Reads a file into a [`SourceImage`].
pub async fn read_source(path: impl AsRef<Path>) -> Result<SourceImage> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let mime_type = detect_mime_type(path, &data);
    tracing::debug!(path = %path.display(), mime_type, size_bytes = data.len(), "read source image");
    Ok(SourceImage {
        data_url: DataUrl::from_bytes(mime_type, &data).to_string(),
        mime_type: mime_type.to_string(),
    })
}

fn detect_mime_type(path: &Path, data: &[u8]) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .or_else(|| ImageFormat::from_magic_bytes(data))
        .map(|f| f.mime_type())
        .unwrap_or(FALLBACK_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_drag_toggles_dragging() {
        let mut zone = UploadSurface::new();
        assert!(!zone.is_dragging());

        assert!(zone.drag(DragEvent::Enter).prevent_default);
        assert!(zone.is_dragging());

        let over = zone.drag(DragEvent::Over);
        assert!(over.prevent_default);
        assert!(over.file.is_none());
        assert!(zone.is_dragging());

        zone.drag(DragEvent::Leave);
        assert!(!zone.is_dragging());
    }

    #[test]
    fn test_drop_and_pick_converge() {
        let files = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];

        let mut zone = UploadSurface::new();
        zone.drag(DragEvent::Enter);
        let dropped = zone.drag(DragEvent::Drop(files.clone()));
        assert!(dropped.prevent_default);
        assert!(!zone.is_dragging());

        let picked = UploadSurface::new().pick(files);
        assert_eq!(dropped.file, picked);
        assert_eq!(picked, Some(PathBuf::from("a.png")));

        assert_eq!(UploadSurface::new().pick(Vec::new()), None);
    }

    #[test]
    fn test_pick_leaves_drag_state_alone() {
        let mut zone = UploadSurface::new();
        zone.drag(DragEvent::Enter);
        assert_eq!(
            zone.pick(vec![PathBuf::from("c.webp")]),
            Some(PathBuf::from("c.webp"))
        );
        assert!(zone.is_dragging());
    }

    #[test]
    fn test_accept_filter() {
        assert_eq!(
            UploadSurface::accept_filter(),
            "image/png, image/jpeg, image/webp"
        );
    }

    #[tokio::test]
    async fn test_read_source_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.JPG");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let source = read_source(&path).await.unwrap();
        assert_eq!(source.mime_type, "image/jpeg");
        assert!(source.data_url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_read_source_by_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene");
        std::fs::write(&path, PNG_BYTES).unwrap();

        let source = read_source(&path).await.unwrap();
        assert_eq!(source.mime_type, "image/png");
        let url = DataUrl::parse(&source.data_url).unwrap();
        assert_eq!(url.decode().unwrap(), PNG_BYTES.to_vec());
    }

    #[tokio::test]
    async fn test_non_image_is_still_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello there, this is text").unwrap();

        let source = read_source(&path).await.unwrap();
        assert_eq!(source.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        assert!(read_source("/definitely/not/here.png").await.is_err());
    }
}
