//! In-memory gateway for panel tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, ImageOutcome};
use crate::image::EncodedImage;

enum Behaviour {
    Reply(String),
    Image(ImageOutcome),
    Fail,
}

pub struct FakeGateway {
    behaviour: Behaviour,
    text_calls: Mutex<Vec<String>>,
    image_calls: Mutex<Vec<(EncodedImage, String)>>,
}

impl FakeGateway {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            text_calls: Mutex::new(Vec::new()),
            image_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with(Behaviour::Reply(text.to_string()))
    }

    pub fn editing(outcome: ImageOutcome) -> Self {
        Self::with(Behaviour::Image(outcome))
    }

    pub fn failing() -> Self {
        Self::with(Behaviour::Fail)
    }

    pub fn text_calls(&self) -> Vec<String> {
        self.text_calls.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> Vec<(EncodedImage, String)> {
        self.image_calls.lock().unwrap().clone()
    }

    fn failure() -> Error {
        Error::ApiError {
            status: 500,
            message: "internal error".to_string(),
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.text_calls.lock().unwrap().push(prompt.to_string());
        match &self.behaviour {
            Behaviour::Reply(text) => Ok(text.clone()),
            Behaviour::Image(_) => Err(Error::InvalidResponse("no text".to_string())),
            Behaviour::Fail => Err(Self::failure()),
        }
    }

    async fn edit_image(&self, image: &EncodedImage, instruction: &str) -> Result<ImageOutcome> {
        self.image_calls
            .lock()
            .unwrap()
            .push((image.clone(), instruction.to_string()));
        match &self.behaviour {
            Behaviour::Image(outcome) => Ok(outcome.clone()),
            Behaviour::Reply(_) => Ok(ImageOutcome::Absent { reason: None }),
            Behaviour::Fail => Err(Self::failure()),
        }
    }
}
