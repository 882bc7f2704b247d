//! Gemini client for the `generateContent` REST endpoint
//!
//! Text generation sends a single user turn. Image editing sends the image as
//! inline data next to the instruction and asks for `IMAGE` and `TEXT`
//! response modalities.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Gateway, ImageOutcome};
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::image::EncodedImage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    text_model: Option<String>,
    image_model: Option<String>,
    timeout_secs: Option<u64>,
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = Some(model.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::ApiKeyMissing)?;

        let timeout =
            Duration::from_secs(self.timeout_secs.unwrap_or(config::DEFAULT_TIMEOUT_SECS));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(GeminiClient {
            client,
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| config::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            text_model: self
                .text_model
                .unwrap_or_else(|| config::DEFAULT_TEXT_MODEL.to_string()),
            image_model: self
                .image_model
                .unwrap_or_else(|| config::DEFAULT_IMAGE_MODEL.to_string()),
        })
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or(Error::ApiKeyMissing)?;
        Self::builder()
            .api_key(api_key)
            .base_url(config.base_url())
            .text_model(config.text_model())
            .image_model(config.image_model())
            .timeout_secs(config.timeout_secs())
            .build()
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Same client pointed at another text model.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.5-flash-lite".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::InvalidResponse(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl Gateway for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let start = Instant::now();
        let request = text_request(prompt);
        debug!(model = %self.text_model, chars = prompt.len(), "Sending text generation request");

        let response = self.generate_content(&self.text_model, &request).await?;
        let text = extract_text(response)?;

        info!(
            model = %self.text_model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Text generation finished"
        );
        Ok(text)
    }

    async fn edit_image(&self, image: &EncodedImage, instruction: &str) -> Result<ImageOutcome> {
        if instruction.trim().is_empty() {
            return Err(Error::InvalidInput("instruction must not be empty".to_string()));
        }
        image.validate()?;

        let start = Instant::now();
        let request = image_edit_request(image, instruction);
        debug!(
            model = %self.image_model,
            mime = %image.mime_type,
            bytes = image.byte_len(),
            "Sending image edit request"
        );

        let response = self.generate_content(&self.image_model, &request).await?;
        let outcome = extract_image(response)?;

        match &outcome {
            ImageOutcome::Edited(edited) => info!(
                model = %self.image_model,
                mime = %edited.mime_type,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Image edit finished"
            ),
            ImageOutcome::Absent { reason } => warn!(
                model = %self.image_model,
                reason = reason.as_deref().unwrap_or("none"),
                "Image edit returned no image"
            ),
        }
        Ok(outcome)
    }
}

fn text_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(prompt.to_string()),
                ..Part::default()
            }],
        }],
        generation_config: None,
    }
}

fn image_edit_request(image: &EncodedImage, instruction: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    }),
                    ..Part::default()
                },
                Part {
                    text: Some(instruction.to_string()),
                    ..Part::default()
                },
            ],
        }],
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
        }),
    }
}

fn block_reason(response: &GenerateContentResponse) -> Option<String> {
    response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
}

fn first_candidate_parts(response: GenerateContentResponse) -> Vec<Part> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default()
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = block_reason(&response) {
        return Err(Error::Blocked(reason));
    }

    let finish_reason = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.clone());

    let text: String = first_candidate_parts(response)
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return match finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => {
                Err(Error::Blocked(reason.to_string()))
            }
            Some(reason) => Err(Error::InvalidResponse(format!(
                "no text in response (finish reason {})",
                reason
            ))),
            None => Err(Error::InvalidResponse("no text in response".to_string())),
        };
    }

    Ok(text)
}

/// First inline image in the reply. Image data that does not decode is an
/// error, not an absent result.
fn extract_image(response: GenerateContentResponse) -> Result<ImageOutcome> {
    if let Some(reason) = block_reason(&response) {
        return Ok(ImageOutcome::Absent {
            reason: Some(format!("blocked: {}", reason)),
        });
    }

    let mut notes = Vec::new();
    for part in first_candidate_parts(response) {
        if let Some(inline) = part.inline_data {
            if inline.mime_type.starts_with("image/") && !inline.data.is_empty() {
                let image = EncodedImage::new(inline.data, inline.mime_type);
                image.decode().map_err(|e| {
                    Error::InvalidResponse(format!("returned image is unreadable: {}", e))
                })?;
                return Ok(ImageOutcome::Edited(image));
            }
        }
        if let Some(text) = part.text {
            if !text.trim().is_empty() {
                notes.push(text.trim().to_string());
            }
        }
    }

    Ok(ImageOutcome::Absent {
        reason: (!notes.is_empty()).then(|| notes.join("\n")),
    })
}

fn api_error(status: StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) if !envelope.error.message.is_empty() => {
                format!("{} ({})", envelope.error.message, code)
            }
            _ => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };

    Error::ApiError {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn builder_requires_api_key() {
        assert!(matches!(
            GeminiClientBuilder::new().build(),
            Err(Error::ApiKeyMissing)
        ));
        assert!(matches!(
            GeminiClientBuilder::new().api_key("   ").build(),
            Err(Error::ApiKeyMissing)
        ));
    }

    #[test]
    fn builder_applies_defaults() {
        let client = GeminiClient::new("test-key").unwrap();
        assert_eq!(client.text_model(), config::DEFAULT_TEXT_MODEL);
        assert_eq!(client.image_model(), config::DEFAULT_IMAGE_MODEL);

        let debug = format!("{:?}", client);
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let client = GeminiClient::builder()
            .api_key("k")
            .base_url("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1beta");
    }

    #[test]
    fn text_request_shape() {
        let body = serde_json::to_value(text_request("Hello")).unwrap();
        assert_eq!(
            body,
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }] })
        );
    }

    #[test]
    fn image_request_shape() {
        let image = EncodedImage::new("AAAA", "image/png");
        let body = serde_json::to_value(image_edit_request(&image, "Add a retro filter")).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
                        { "text": "Add a retro filter" }
                    ]
                }],
                "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] }
            })
        );
    }

    #[test]
    fn extract_text_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello" }, { "text": ", world" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(response).unwrap(), "Hello, world");
    }

    #[test]
    fn extract_text_reports_blocked_prompt() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(extract_text(response), Err(Error::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn extract_text_without_text_is_an_error() {
        let response = parse(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        }));
        assert!(matches!(extract_text(response), Err(Error::InvalidResponse(_))));

        let empty = parse(json!({}));
        assert!(matches!(extract_text(empty), Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn extract_image_returns_first_inline_image() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                ] }
            }]
        }));
        assert_eq!(
            extract_image(response).unwrap(),
            ImageOutcome::Edited(EncodedImage::new("iVBORw0KGgo=", "image/png"))
        );
    }

    #[test]
    fn extract_image_accepts_snake_case_inline_data() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inline_data": { "mime_type": "image/png", "data": "iVBORw0KGgo=" } }
                ] }
            }]
        }));
        assert!(extract_image(response).unwrap().image().is_some());
    }

    #[test]
    fn extract_image_without_image_is_absent_with_text() {
        let response = parse(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't edit that image." }] } }]
        }));
        assert_eq!(
            extract_image(response).unwrap(),
            ImageOutcome::Absent {
                reason: Some("I can't edit that image.".to_string())
            }
        );

        assert_eq!(
            extract_image(parse(json!({ "candidates": [] }))).unwrap(),
            ImageOutcome::Absent { reason: None }
        );
    }

    #[test]
    fn extract_image_blocked_is_absent() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "OTHER" } }));
        assert_eq!(
            extract_image(response).unwrap(),
            ImageOutcome::Absent {
                reason: Some("blocked: OTHER".to_string())
            }
        );
    }

    #[test]
    fn extract_image_rejects_undecodable_data() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "%%%not-b64%%%" } }
                ] }
            }]
        }));
        assert!(matches!(
            extract_image(response),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn api_error_uses_envelope_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(
            err,
            Error::ApiError { status: 400, ref message } if message == "API key not valid. (INVALID_ARGUMENT)"
        ));
    }

    #[test]
    fn api_error_falls_back_to_body_or_reason() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream broke");
        assert!(matches!(err, Error::ApiError { status: 502, ref message } if message == "upstream broke"));

        let err = api_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(matches!(err, Error::ApiError { status: 503, ref message } if message == "Service Unavailable"));
    }

    /// Serve one HTTP exchange on a local port. Returns the base URL to point
    /// the client at and a handle resolving to the raw request text.
    async fn serve_once(
        status: u16,
        body: serde_json::Value,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            // Read headers, then as much body as content-length says
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }

            let payload = body.to_string();
            let response = format!(
                "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                payload.len(),
                payload
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{}/v1beta", addr), handle)
    }

    fn local_client(base_url: &str) -> GeminiClient {
        GeminiClient::builder()
            .api_key("test-key")
            .base_url(base_url)
            .timeout_secs(10)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn generate_text_round_trip() {
        let (base_url, request) = serve_once(
            200,
            json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hi there!" }] },
                    "finishReason": "STOP"
                }]
            }),
        )
        .await;

        let reply = local_client(&base_url).generate_text("Hello").await.unwrap();
        assert_eq!(reply, "Hi there!");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(raw.contains(r#""text":"Hello""#));
    }

    #[tokio::test]
    async fn edit_image_round_trip() {
        let (base_url, request) = serve_once(
            200,
            json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": "Here is the edited image" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                    ] }
                }]
            }),
        )
        .await;

        let source = EncodedImage::new("iVBORw0KGgo=", "image/png");
        let outcome = local_client(&base_url)
            .edit_image(&source, "Add a retro filter")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ImageOutcome::Edited(EncodedImage::new("iVBORw0KGgo=", "image/png"))
        );

        let raw = request.await.unwrap();
        assert!(raw.starts_with(
            "POST /v1beta/models/gemini-2.5-flash-image-preview:generateContent HTTP/1.1"
        ));
        assert!(raw.contains(r#""responseModalities":["IMAGE","TEXT"]"#));
        assert!(raw.contains(r#""mimeType":"image/png""#));
    }

    #[tokio::test]
    async fn error_status_maps_to_api_error() {
        let (base_url, request) = serve_once(
            400,
            json!({
                "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
            }),
        )
        .await;

        let err = local_client(&base_url).generate_text("Hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ApiError { status: 400, ref message } if message.contains("API key not valid.")
        ));
        request.await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_image_reply_is_an_error() {
        let (base_url, request) = serve_once(
            200,
            json!({
                "candidates": [{
                    "content": { "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "%%%not-b64%%%" } }
                    ] }
                }]
            }),
        )
        .await;

        let source = EncodedImage::new("iVBORw0KGgo=", "image/png");
        let err = local_client(&base_url)
            .edit_image(&source, "Add a hat")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        request.await.unwrap();
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_network() {
        let client = GeminiClient::builder()
            .api_key("k")
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let err = client.generate_text("   ").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn invalid_image_is_rejected_before_network() {
        let client = GeminiClient::builder()
            .api_key("k")
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();

        let gif = EncodedImage::new("R0lGODlh", "image/gif");
        let err = client.edit_image(&gif, "make it blue").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(_)));

        let png = EncodedImage::new("iVBORw0KGgo=", "image/png");
        let err = client.edit_image(&png, "  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let client = GeminiClient::builder()
            .api_key("k")
            .base_url("http://127.0.0.1:1")
            .timeout_secs(5)
            .build()
            .unwrap();
        let err = client.generate_text("Hello").await.unwrap_err();
        assert!(matches!(err, Error::NetworkError(_)));
        assert!(!err.is_validation());
    }
}
