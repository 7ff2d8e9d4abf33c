//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::{ImageGenerator, ImageGeneratorExt};
pub use types::{DataUrl, EditRequest, ImageFormat};
