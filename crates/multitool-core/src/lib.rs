pub mod config;
pub mod error;
pub mod gateway;
pub mod image;
pub mod panels;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{Gateway, GeminiClient, GeminiClientBuilder, ImageOutcome};
pub use image::EncodedImage;
pub use panels::{
    ChatMessage, ChatPanel, ChatRole, EditJob, ImageEditor, LoadedImage, RequestState, Task,
    TaskList,
};
