use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::RequestState;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, ImageOutcome};
use crate::image::EncodedImage;

pub const MISSING_INPUT: &str = "Please upload an image and provide a prompt.";
pub const NO_IMAGE_RETURNED: &str = "Failed to edit image. The API returned no image data.";
pub const EDIT_FAILED: &str = "An error occurred while editing the image.";

/// The image the user picked, already encoded for sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub image: EncodedImage,
}

impl LoadedImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Payload for one edit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditJob {
    pub image: EncodedImage,
    pub instruction: String,
}

/// Before/after image pair plus the instruction being applied
#[derive(Debug, Clone, Default)]
pub struct ImageEditor {
    original: Option<LoadedImage>,
    edited: Option<EncodedImage>,
    instruction: String,
    request: RequestState,
    message: Option<String>,
    provider_note: Option<String>,
    saved_path: Option<PathBuf>,
}

impl ImageEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original(&self) -> Option<&LoadedImage> {
        self.original.as_ref()
    }

    pub fn edited(&self) -> Option<&EncodedImage> {
        self.edited.as_ref()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }

    pub fn is_loading(&self) -> bool {
        self.request.is_in_flight()
    }

    /// Inline message for the user (validation, absent result or failure)
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Text the provider sent back instead of an image, if any
    pub fn provider_note(&self) -> Option<&str> {
        self.provider_note.as_deref()
    }

    pub fn saved_path(&self) -> Option<&Path> {
        self.saved_path.as_deref()
    }

    /// Read and encode the file at `path`. An unsupported or unreadable file
    /// leaves the current image in place and shows the reason inline.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if self.is_loading() {
            return Err(Error::InvalidInput(
                "wait for the current edit to finish".to_string(),
            ));
        }

        match EncodedImage::from_path(path) {
            Ok(image) => {
                info!(path = %path.display(), mime = %image.mime_type, "Loaded image");
                self.original = Some(LoadedImage {
                    path: path.to_path_buf(),
                    image,
                });
                self.edited = None;
                self.message = None;
                self.provider_note = None;
                self.saved_path = None;
                self.request = RequestState::Idle;
                Ok(())
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Rejected image");
                self.message = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.instruction = instruction.into();
    }

    /// Validate and enter the loading state. Returns `None` while an edit is
    /// pending, or when the image or instruction is missing (the inline
    /// message is set in that case).
    pub fn begin_edit(&mut self) -> Option<EditJob> {
        if self.is_loading() {
            return None;
        }

        let instruction = self.instruction.trim();
        let original = match &self.original {
            Some(original) if !instruction.is_empty() => original,
            _ => {
                self.message = Some(MISSING_INPUT.to_string());
                return None;
            }
        };

        let job = EditJob {
            image: original.image.clone(),
            instruction: instruction.to_string(),
        };
        self.request = RequestState::InFlight;
        self.message = None;
        self.provider_note = None;
        self.edited = None;
        self.saved_path = None;
        Some(job)
    }

    /// Apply the gateway result and leave the loading state. Returns false
    /// if nothing was pending.
    pub fn complete(&mut self, result: Result<ImageOutcome>) -> bool {
        if !self.is_loading() {
            return false;
        }

        match result {
            Ok(ImageOutcome::Edited(image)) => {
                self.edited = Some(image);
                self.request = RequestState::Succeeded;
            }
            Ok(ImageOutcome::Absent { reason }) => {
                self.message = Some(NO_IMAGE_RETURNED.to_string());
                self.provider_note = reason;
                self.request = RequestState::Failed(NO_IMAGE_RETURNED.to_string());
            }
            Err(e) => {
                error!(error = %e, "Image edit failed");
                self.message = Some(EDIT_FAILED.to_string());
                self.request = RequestState::Failed(e.to_string());
            }
        }
        true
    }

    /// `begin_edit`, call the gateway, `complete`.
    pub async fn edit(&mut self, gateway: &dyn Gateway) -> bool {
        let Some(job) = self.begin_edit() else {
            return false;
        };
        let result = gateway.edit_image(&job.image, &job.instruction).await;
        self.complete(result)
    }

    /// Write the edited image into `dir` as `<original stem>-edited.<ext>`,
    /// numbering the name if it is already taken. A failure is also shown as
    /// the inline message.
    pub fn save_edited(&mut self, dir: &Path) -> Result<PathBuf> {
        match self.write_edited(dir) {
            Ok(path) => {
                info!(path = %path.display(), "Saved edited image");
                self.message = None;
                self.saved_path = Some(path.clone());
                Ok(path)
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Could not save edited image");
                self.message = Some(format!("Could not save the edited image: {}", e));
                Err(e)
            }
        }
    }

    fn write_edited(&self, dir: &Path) -> Result<PathBuf> {
        let edited = self
            .edited
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("there is no edited image to save".to_string()))?;

        let stem = self
            .original
            .as_ref()
            .and_then(|o| o.path.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let path = unique_path(dir, &stem, edited.extension());
        edited.save(&path)?;
        Ok(path)
    }
}

fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{}-edited.{}", stem, ext));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{}-edited-{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
