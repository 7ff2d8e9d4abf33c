//! Session state for one source image and its five plates.
//!
//! [`Session`] is a plain value; its methods are the only ways to change it.
//! The orchestrator owns the live copy and applies these methods as it
//! dispatches and settles generation calls.
//!
//! Every dispatch stamps its target slots with a fresh epoch. A completion
//! carries the epoch it was issued under and is dropped if the slot has been
//! re-stamped since (new upload, new batch, or a newer regeneration).

use crate::error::{PlatesError, Result};
use crate::image::DataUrl;
use crate::shots::{self, ShotProfile};
use crate::upload::SourceImage;

/// Shown when generation is requested before any upload.
pub const NO_SOURCE_MESSAGE: &str = "Please upload an image first.";

/// Shown when regeneration is requested without a source image.
pub const MISSING_SOURCE_MESSAGE: &str = "Source image is missing.";

/// One shot's generated plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// The registry shot this slot renders.
    pub profile: &'static ShotProfile,
    /// Prompt last committed for this slot. Starts as the profile's prompt.
    pub prompt: String,
    /// The generated image, if any.
    pub image: Option<DataUrl>,
    /// Whether this slot's own request is outstanding.
    pub is_loading: bool,
    epoch: u64,
}

impl Slot {
    fn pending(profile: &'static ShotProfile, epoch: u64) -> Self {
        Self {
            profile,
            prompt: profile.prompt.to_string(),
            image: None,
            is_loading: true,
            epoch,
        }
    }

    /// Whether an image is present.
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Coarse phase of the session, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing generated yet.
    Idle,
    /// The bulk batch is outstanding.
    Generating,
    /// Plates are on screen.
    Ready,
    /// An error message is showing and there are no plates.
    Error,
}

/// Issued by [`Session::begin_batch`]; settles the batch it started.
#[derive(Debug, Clone)]
pub struct BatchTicket {
    epoch: u64,
    source_image: String,
    mime_type: String,
}

impl BatchTicket {
    /// The source data URL captured at dispatch.
    pub fn source_image(&self) -> &str {
        &self.source_image
    }

    /// The source MIME type captured at dispatch.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Issued by [`Session::begin_regenerate`]; settles one slot.
#[derive(Debug, Clone)]
pub struct SlotTicket {
    index: usize,
    epoch: u64,
    source_image: String,
    mime_type: String,
}

impl SlotTicket {
    /// Index of the slot being regenerated.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The source data URL captured at dispatch.
    pub fn source_image(&self) -> &str {
        &self.source_image
    }

    /// The source MIME type captured at dispatch.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// The whole user-visible state of a session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    source_image: Option<String>,
    source_mime_type: Option<String>,
    slots: Vec<Slot>,
    is_loading: bool,
    error: Option<String>,
    selected: Option<Slot>,
    // Last epoch handed out.
    epoch: u64,
    // Epoch of the current batch; also advanced by uploads.
    batch_epoch: u64,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The source image as a data URL.
    pub fn source_image(&self) -> Option<&str> {
        self.source_image.as_deref()
    }

    /// The source image's MIME type.
    pub fn source_mime_type(&self) -> Option<&str> {
        self.source_mime_type.as_deref()
    }

    /// Either empty or one slot per shot, in registry order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns the slot at `index`.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// True only while the bulk batch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// The message currently shown to the user.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The slot shown in the enlarged view.
    pub fn selected(&self) -> Option<&Slot> {
        self.selected.as_ref()
    }

    /// Identifies the current slot sequence; changes on every upload and batch.
    pub fn batch_id(&self) -> u64 {
        self.batch_epoch
    }

    /// Derives the coarse phase.
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Generating
        } else if !self.slots.is_empty() {
            Phase::Ready
        } else if self.error.is_some() {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn captured_source(&self) -> Option<(String, String)> {
        match (&self.source_image, &self.source_mime_type) {
            (Some(image), Some(mime)) => Some((image.clone(), mime.clone())),
            _ => None,
        }
    }

    /// Installs a new source image. Prior plates, errors and any in-flight
    /// work are invalidated.
    pub fn load_source(&mut self, source: SourceImage) {
        self.source_image = Some(source.data_url);
        self.source_mime_type = Some(source.mime_type);
        self.slots.clear();
        self.error = None;
        self.is_loading = false;
        self.batch_epoch = self.next_epoch();
    }

    /// Shows an error message without touching anything else.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Starts a bulk batch: clears the error and seeds every slot as loading.
    ///
    /// Without a source image only the error message changes.
    pub fn begin_batch(&mut self) -> Result<BatchTicket> {
        let Some((source_image, mime_type)) = self.captured_source() else {
            self.fail(NO_SOURCE_MESSAGE);
            return Err(PlatesError::MissingSource(NO_SOURCE_MESSAGE));
        };

        let epoch = self.next_epoch();
        self.batch_epoch = epoch;
        self.is_loading = true;
        self.error = None;
        self.slots = shots::all()
            .iter()
            .map(|profile| Slot::pending(profile, epoch))
            .collect();

        Ok(BatchTicket {
            epoch,
            source_image,
            mime_type,
        })
    }

    /// Applies the settled batch results, one per shot in registry order.
    ///
    /// Returns how many slots were updated.
    pub fn settle_batch(&mut self, ticket: &BatchTicket, results: Vec<Option<DataUrl>>) -> usize {
        let mut applied = 0;
        for (slot, image) in self.slots.iter_mut().zip(results) {
            if slot.epoch != ticket.epoch {
                continue;
            }
            slot.image = image;
            slot.is_loading = false;
            applied += 1;
        }
        applied
    }

    /// Records a batch that failed before dispatch: plates are cleared.
    pub fn fail_batch(&mut self, ticket: &BatchTicket, message: impl Into<String>) {
        if self.batch_epoch != ticket.epoch {
            return;
        }
        self.slots.clear();
        self.error = Some(message.into());
    }

    /// Stops the loading indicator of every slot still owned by an abandoned
    /// batch. Returns how many slots were released.
    pub fn abandon_batch(&mut self, ticket: &BatchTicket) -> usize {
        let mut released = 0;
        for slot in &mut self.slots {
            if slot.epoch == ticket.epoch && slot.is_loading {
                slot.is_loading = false;
                released += 1;
            }
        }
        released
    }

    /// Ends the batch, clearing the global loading flag if it is still current.
    pub fn end_batch(&mut self, ticket: &BatchTicket) {
        if self.batch_epoch == ticket.epoch {
            self.is_loading = false;
        }
    }

    /// Marks one slot as loading for a regeneration.
    pub fn begin_regenerate(&mut self, index: usize) -> Result<SlotTicket> {
        let Some((source_image, mime_type)) = self.captured_source() else {
            self.fail(MISSING_SOURCE_MESSAGE);
            return Err(PlatesError::MissingSource(MISSING_SOURCE_MESSAGE));
        };
        if index >= self.slots.len() {
            let err = PlatesError::InvalidSlot {
                index,
                len: self.slots.len(),
            };
            self.fail(err.to_string());
            return Err(err);
        }

        let epoch = self.next_epoch();
        let slot = &mut self.slots[index];
        slot.epoch = epoch;
        slot.is_loading = true;

        Ok(SlotTicket {
            index,
            epoch,
            source_image,
            mime_type,
        })
    }

    fn current_slot(&mut self, ticket: &SlotTicket) -> Option<&mut Slot> {
        self.slots
            .get_mut(ticket.index)
            .filter(|slot| slot.epoch == ticket.epoch)
    }

    /// Writes a regeneration result into its slot. Returns false if stale.
    pub fn settle_regenerate(
        &mut self,
        ticket: &SlotTicket,
        prompt: String,
        image: Option<DataUrl>,
    ) -> bool {
        let Some(slot) = self.current_slot(ticket) else {
            return false;
        };
        slot.image = image;
        slot.prompt = prompt;
        slot.is_loading = false;
        true
    }

    /// Records a failed regeneration. Returns false if stale.
    pub fn fail_regenerate(&mut self, ticket: &SlotTicket, message: impl Into<String>) -> bool {
        let Some(slot) = self.current_slot(ticket) else {
            return false;
        };
        slot.is_loading = false;
        self.error = Some(message.into());
        true
    }

    /// Stops the loading indicator of an abandoned regeneration. The slot
    /// keeps its previous image and prompt. Returns false if stale.
    pub fn abandon_regenerate(&mut self, ticket: &SlotTicket) -> bool {
        match self.current_slot(ticket) {
            Some(slot) if slot.is_loading => {
                slot.is_loading = false;
                true
            }
            _ => false,
        }
    }

    /// Opens the enlarged view on a slot that has an image.
    pub fn select(&mut self, index: usize) -> bool {
        match self.slots.get(index) {
            Some(slot) if slot.has_image() => {
                self.selected = Some(slot.clone());
                true
            }
            _ => false,
        }
    }

    /// Closes the enlarged view.
    pub fn deselect(&mut self) {
        self.selected = None;
    }
}
