#![warn(missing_docs)]
//! Plates - five camera perspectives from one photograph.
//!
//! Upload a photo of a scene and get back five "master plates" of the same
//! space, from a wide establishing shot down to an extreme macro, each
//! rendered by a multimodal image model that re-shoots the source under a
//! lens-specific prompt.
//!
//! # Quick Start
//!
//! ```no_run
//! use plates::{GeminiClient, Orchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> plates::Result<()> {
//!     let client = GeminiClient::builder().build()?;
//!     let orchestrator = Orchestrator::new(Arc::new(client));
//!
//!     orchestrator.upload("scene.jpg").await?;
//!     let summary = orchestrator.generate_all().await?;
//!     println!("{} of 5 plates generated", summary.succeeded);
//!
//!     let session = orchestrator.snapshot();
//!     for slot in session.slots().iter().filter(|s| plates::grid::can_download(s)) {
//!         plates::grid::download(slot, ".").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! - [`shots`]: the five shot profiles and their prompts.
//! - [`image`]: the [`ImageGenerator`] trait and the Gemini client.
//! - [`upload`]: the picker / drag-and-drop surface and file reading.
//! - [`session`]: session state and its named mutations.
//! - [`orchestrator`]: bulk fan-out, regeneration and selection.
//! - [`grid`] and [`modal`]: headless state for the result tiles and the
//!   enlarged view.
//!
//! # Features
//!
//! - `gemini` (default): the Gemini client.
//! - `cli`: the `plates` command-line interface.

mod error;

pub mod grid;
pub mod image;
pub mod modal;
pub mod orchestrator;
pub mod session;
pub mod shots;
pub mod upload;

// Re-export error types at crate root
pub use error::{PlatesError, Result};

pub use image::{DataUrl, EditRequest, ImageFormat, ImageGenerator, ImageGeneratorExt};
pub use orchestrator::{BatchSummary, Orchestrator};
pub use session::{Phase, Session, Slot};
pub use shots::{ShotProfile, SHOT_PROFILES, STYLE_PROMPT_SUFFIX};

#[cfg(feature = "gemini")]
pub use image::providers::{GeminiClient, GeminiClientBuilder, GeminiModel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{PlatesError, Result};
    pub use crate::image::{DataUrl, ImageGenerator, ImageGeneratorExt};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::session::{Session, Slot};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiClient;
}
