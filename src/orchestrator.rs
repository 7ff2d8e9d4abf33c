//! Drives a [`Session`] through uploads, bulk generation and regeneration.

use crate::error::Result;
use crate::image::{DataUrl, EditRequest, ImageGenerator, ImageGeneratorExt};
use crate::session::{BatchTicket, Session, SlotTicket};
use crate::shots;
use crate::upload::{self, SourceImage};
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome counts of one bulk batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Slots that received an image.
    pub succeeded: usize,
    /// Slots whose call failed or returned no image.
    pub failed: usize,
}

/// Owns the live session and is its only writer.
///
/// Cheap to clone; clones share the same session and generator.
#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<dyn ImageGenerator>,
    state: Arc<watch::Sender<Session>>,
    retries: u32,
}

impl Orchestrator {
    /// Creates an orchestrator with an empty session.
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        let (state, _) = watch::channel(Session::new());
        Self {
            generator,
            state: Arc::new(state),
            retries: 0,
        }
    }

    /// Retries transient failures of each call up to `retries` times.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Name of the backing generator.
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut out = None;
        self.state.send_modify(|session| out = Some(f(session)));
        out.expect("send_modify always runs its closure")
    }

    /// Reads `path` and makes it the session's source image.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<()> {
        match upload::read_source(path).await {
            Ok(source) => {
                self.load_source(source);
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to read source image: {e}");
                self.update(|s| s.fail(format!("Failed to read image. {e}")));
                Err(e)
            }
        }
    }

    /// Installs an already-read source image.
    pub fn load_source(&self, source: SourceImage) {
        tracing::debug!(mime_type = %source.mime_type, "source image loaded");
        self.update(|s| s.load_source(source));
    }

    /// Generates every shot concurrently and waits for all of them.
    ///
    /// A failing shot leaves its slot empty and does not affect the others.
    /// Errors are returned only for a missing source or a failed dispatch;
    /// both are also recorded in the session.
    pub async fn generate_all(&self) -> Result<BatchSummary> {
        let ticket = self.update(Session::begin_batch)?;
        let _loading = LoadingGuard {
            state: &self.state,
            ticket: &ticket,
        };

        match self.dispatch_batch(&ticket).await {
            Ok(results) => {
                let succeeded = results.iter().filter(|r| r.is_some()).count();
                let summary = BatchSummary {
                    succeeded,
                    failed: results.len() - succeeded,
                };
                let applied = self.update(|s| s.settle_batch(&ticket, results));
                if applied == 0 {
                    tracing::debug!("batch superseded; results discarded");
                }
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("error generating images: {e}");
                self.update(|s| s.fail_batch(&ticket, format!("Failed to generate images. {e}")));
                Err(e)
            }
        }
    }

    async fn dispatch_batch(&self, ticket: &BatchTicket) -> Result<Vec<Option<DataUrl>>> {
        let source = DataUrl::parse(ticket.source_image())?;

        let calls = shots::all().iter().enumerate().map(|(index, profile)| {
            let request = EditRequest {
                image: source.payload(),
                mime_type: ticket.mime_type(),
                prompt: profile.prompt,
            };
            async move {
                tracing::debug!(index, shot = profile.name, "dispatching");
                let result = self
                    .generator
                    .generate_with_retries(&request, self.retries)
                    .await;
                match result {
                    Ok(Some(image)) => Some(image),
                    Ok(None) => {
                        tracing::warn!(index, shot = profile.name, "no image returned");
                        None
                    }
                    Err(e) => {
                        tracing::error!(
                            index,
                            shot = profile.name,
                            "failed to generate image: {e}"
                        );
                        None
                    }
                }
            }
        });

        Ok(join_all(calls).await)
    }

    /// Re-renders one slot under a new prompt.
    pub async fn regenerate(&self, index: usize, prompt: impl Into<String>) -> Result<()> {
        let prompt = prompt.into();
        let ticket = self.update(|s| s.begin_regenerate(index))?;
        let _loading = SlotGuard {
            state: &self.state,
            ticket: &ticket,
        };

        let result = match DataUrl::parse(ticket.source_image()) {
            Ok(source) => {
                let request = EditRequest {
                    image: source.payload(),
                    mime_type: ticket.mime_type(),
                    prompt: &prompt,
                };
                self.generator
                    .generate_with_retries(&request, self.retries)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(image) => {
                if image.is_none() {
                    tracing::warn!(index, "no image returned for regeneration");
                }
                if !self.update(|s| s.settle_regenerate(&ticket, prompt, image)) {
                    tracing::debug!(index, "regeneration superseded; result discarded");
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(index, "error regenerating image: {e}");
                self.update(|s| {
                    s.fail_regenerate(&ticket, format!("Failed to regenerate image: {e}"))
                });
                Err(e)
            }
        }
    }

    /// Opens the enlarged view on `index` if it has an image.
    pub fn select(&self, index: usize) -> bool {
        self.update(|s| s.select(index))
    }

    /// Closes the enlarged view.
    pub fn close_modal(&self) {
        self.update(Session::deselect);
    }
}

/// Clears the batch's loading flags when it ends, however it ends.
///
/// If the batch future is dropped before its results land, the slots it
/// still owns stop loading too.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<Session>,
    ticket: &'a BatchTicket,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.state.send_modify(|s| {
            let released = s.abandon_batch(ticket);
            if released > 0 {
                tracing::debug!(released, "batch abandoned before completion");
            }
            s.end_batch(ticket);
        });
    }
}

/// Stops a slot's loading indicator if its regeneration is abandoned.
struct SlotGuard<'a> {
    state: &'a watch::Sender<Session>,
    ticket: &'a SlotTicket,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.state.send_if_modified(|s| {
            let released = s.abandon_regenerate(ticket);
            if released {
                tracing::debug!(index = ticket.index(), "regeneration abandoned");
            }
            released
        });
    }
}
