//! Enlarged view of a single plate.
//!
//! While the view is open the host captures keys (for Escape) and locks
//! background scrolling. Both are held by a [`ModalScope`] and released when
//! it drops, whichever way the view closes.

use crate::image::DataUrl;
use crate::session::Slot;

/// Host resources the enlarged view borrows while open.
pub trait Viewport {
    /// Starts or stops delivering key presses to the view.
    fn set_key_capture(&mut self, enabled: bool);

    /// Locks or unlocks scrolling of the content behind the view.
    fn set_scroll_locked(&mut self, locked: bool);
}

/// Holds the viewport's key capture and scroll lock for the view's lifetime.
pub struct ModalScope<'v, V: Viewport + ?Sized> {
    viewport: &'v mut V,
}

impl<'v, V: Viewport + ?Sized> ModalScope<'v, V> {
    /// Acquires key capture and the scroll lock.
    pub fn enter(viewport: &'v mut V) -> Self {
        viewport.set_key_capture(true);
        viewport.set_scroll_locked(true);
        Self { viewport }
    }
}

impl<V: Viewport + ?Sized> Drop for ModalScope<'_, V> {
    fn drop(&mut self) {
        self.viewport.set_key_capture(false);
        self.viewport.set_scroll_locked(false);
    }
}

/// Keys the view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// The Escape key.
    Escape,
    /// Any other key.
    Other,
}

/// Where a click landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The dimmed area around the content.
    Backdrop,
    /// The content panel itself.
    Content,
    /// The explicit close control.
    CloseButton,
}

/// Result of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    /// Keep the view open.
    Stay,
    /// Close the view.
    Close,
}

/// The enlarged view of one slot.
#[derive(Debug)]
pub struct ImageModal<'a> {
    slot: &'a Slot,
    image: &'a DataUrl,
}

impl<'a> ImageModal<'a> {
    /// Creates the view. Returns `None` when the slot has no image.
    pub fn new(slot: &'a Slot) -> Option<Self> {
        let image = slot.image.as_ref()?;
        Some(Self { slot, image })
    }

    /// Shot name, shown as the title.
    pub fn title(&self) -> &str {
        self.slot.profile.name
    }

    /// Lens label, shown above the title.
    pub fn lens(&self) -> &str {
        self.slot.profile.lens
    }

    /// Shot description, shown in the footer.
    pub fn caption(&self) -> &str {
        self.slot.profile.description
    }

    /// The full-size image.
    pub fn image(&self) -> &DataUrl {
        self.image
    }

    /// Handles a key press.
    pub fn on_key(&self, key: Key) -> ModalAction {
        match key {
            Key::Escape => ModalAction::Close,
            Key::Other => ModalAction::Stay,
        }
    }

    /// Handles a click. Clicks on the content do not reach the backdrop.
    pub fn on_click(&self, target: ClickTarget) -> ModalAction {
        match target {
            ClickTarget::Backdrop | ClickTarget::CloseButton => ModalAction::Close,
            ClickTarget::Content => ModalAction::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::upload::SourceImage;

    #[derive(Default)]
    struct RecordingViewport {
        key_capture: bool,
        scroll_locked: bool,
        transitions: usize,
    }

    impl Viewport for RecordingViewport {
        fn set_key_capture(&mut self, enabled: bool) {
            self.key_capture = enabled;
            self.transitions += 1;
        }

        fn set_scroll_locked(&mut self, locked: bool) {
            self.scroll_locked = locked;
            self.transitions += 1;
        }
    }

    fn session_with_selection() -> Session {
        let mut session = Session::new();
        session.load_source(SourceImage {
            data_url: "data:image/png;base64,iVBORw0KGgo=".into(),
            mime_type: "image/png".into(),
        });
        let ticket = session.begin_batch().unwrap();
        let mut results = vec![None; 5];
        results[0] = Some(DataUrl::new("image/png", "iVBORw0KGgo="));
        session.settle_batch(&ticket, results);
        session.end_batch(&ticket);
        assert!(session.select(0));
        session
    }

    /// Opens the view, feeds one event, and closes the session's selection
    /// the way a host would.
    fn close_via(event: impl Fn(&ImageModal<'_>) -> ModalAction) -> (Session, RecordingViewport) {
        let mut session = session_with_selection();
        let mut viewport = RecordingViewport::default();
        {
            let selected = session.selected().cloned().unwrap();
            let modal = ImageModal::new(&selected).unwrap();
            let _scope = ModalScope::enter(&mut viewport);
            if event(&modal) == ModalAction::Close {
                session.deselect();
            }
        }
        (session, viewport)
    }

    #[test]
    fn test_scope_acquires_and_releases() {
        let mut viewport = RecordingViewport::default();
        {
            let _scope = ModalScope::enter(&mut viewport);
        }
        assert!(!viewport.key_capture);
        assert!(!viewport.scroll_locked);
        assert_eq!(viewport.transitions, 4);
    }

    #[test]
    fn test_scope_held_while_open() {
        let mut viewport = RecordingViewport::default();
        let scope = ModalScope::enter(&mut viewport);
        assert!(scope.viewport.key_capture);
        assert!(scope.viewport.scroll_locked);
        drop(scope);
        assert!(!viewport.scroll_locked);
    }

    #[test]
    fn test_every_close_path_restores_scrolling() {
        let paths: [fn(&ImageModal<'_>) -> ModalAction; 3] = [
            |m| m.on_key(Key::Escape),
            |m| m.on_click(ClickTarget::Backdrop),
            |m| m.on_click(ClickTarget::CloseButton),
        ];
        for path in paths {
            let (session, viewport) = close_via(path);
            assert!(session.selected().is_none());
            assert!(!viewport.scroll_locked);
            assert!(!viewport.key_capture);
        }
    }

    #[test]
    fn test_content_click_and_other_keys_stay_open() {
        let (session, viewport) = close_via(|m| m.on_click(ClickTarget::Content));
        assert!(session.selected().is_some());
        assert!(!viewport.scroll_locked);

        let (session, _) = close_via(|m| m.on_key(Key::Other));
        assert!(session.selected().is_some());
    }

    #[test]
    fn test_scope_released_on_unwind() {
        let mut viewport = RecordingViewport::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ModalScope::enter(&mut viewport);
            panic!("host torn down");
        }));
        assert!(result.is_err());
        assert!(!viewport.scroll_locked);
        assert!(!viewport.key_capture);
    }

    #[test]
    fn test_no_image_renders_nothing() {
        let session = session_with_selection();
        assert!(ImageModal::new(session.slot(1).unwrap()).is_none());

        let modal = ImageModal::new(session.slot(0).unwrap()).unwrap();
        assert_eq!(modal.title(), "Wide Establishing Shot");
        assert_eq!(modal.lens(), "24mm");
        assert_eq!(modal.image().mime_type(), "image/png");
        assert!(modal.caption().starts_with("An overall view"));
    }
}
