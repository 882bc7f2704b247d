//! Request gateway: the narrow interface between the panels and the
//! generative AI provider.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiClientBuilder};

use async_trait::async_trait;

use crate::error::Result;
use crate::image::EncodedImage;

/// Result of an image edit that reached the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The provider returned an edited image
    Edited(EncodedImage),
    /// The call succeeded but no image came back. `reason` carries whatever
    /// text the provider sent instead, or the block reason.
    Absent { reason: Option<String> },
}

impl ImageOutcome {
    pub fn image(&self) -> Option<&EncodedImage> {
        match self {
            ImageOutcome::Edited(image) => Some(image),
            ImageOutcome::Absent { .. } => None,
        }
    }
}

/// Text generation and image editing against a generative AI provider.
///
/// Implementations validate their inputs before touching the network and
/// report every failure through `Err`; callers decide what the user sees.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a single prompt and return the model's reply as plain text.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Ask the model to edit `image` according to `instruction`.
    async fn edit_image(&self, image: &EncodedImage, instruction: &str) -> Result<ImageOutcome>;
}
