//! HTTP inference backends.
//!
//! Captioning talks to an OpenAI-compatible vision chat server. Editing talks
//! to a diffusion sidecar exposing `/health`, `/load`, `/edit` and `/unload`.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{CaptionConfig, EditConfig};
use crate::imaging;

use super::error::StageError;
use super::model::{CaptionLoader, CaptionModel, CaptionRequest, EditLoader, EditModel, EditRequest};
use super::{CAPTION_STAGE, EDIT_STAGE};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path)
}

fn build_client(stage: &'static str, timeout_secs: u64) -> Result<Client, StageError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StageError::Unavailable {
            stage,
            reason: format!("failed to build HTTP client: {}", e),
        })
}

fn png_data(image: &DynamicImage) -> Result<String, StageError> {
    let bytes = imaging::encode_png(image).map_err(StageError::Encode)?;
    Ok(BASE64.encode(bytes))
}

/// Non-2xx responses become an error carrying the body text.
fn check_status(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(format!("HTTP {}: {}", status.as_u16(), body.trim()))
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    image: String,
}

// ── Caption ──

pub struct RemoteCaptionLoader {
    client: Client,
    endpoint: String,
    model: String,
}

impl RemoteCaptionLoader {
    /// Checks that the server answers and serves the configured model.
    pub fn probe(config: &CaptionConfig) -> Result<Self, StageError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| StageError::Unavailable {
                stage: CAPTION_STAGE,
                reason: "no caption endpoint configured".to_string(),
            })?;
        let loader = Self {
            client: build_client(CAPTION_STAGE, config.timeout_secs)?,
            endpoint,
            model: config.model.clone(),
        };
        loader
            .served_model(PROBE_TIMEOUT)
            .map_err(|reason| StageError::Unavailable {
                stage: CAPTION_STAGE,
                reason,
            })?;
        Ok(loader)
    }

    fn served_model(&self, timeout: Duration) -> Result<(), String> {
        let response = self
            .client
            .get(url(&self.endpoint, "v1/models"))
            .timeout(timeout)
            .send()
            .map_err(|e| format!("{} unreachable: {}", self.endpoint, e))?;
        let list: ModelList = check_status(response)?
            .json()
            .map_err(|e| format!("unexpected model list: {}", e))?;
        if list.data.iter().any(|m| m.id == self.model) {
            Ok(())
        } else {
            Err(format!("model '{}' is not served", self.model))
        }
    }
}

impl CaptionLoader for RemoteCaptionLoader {
    type Model = RemoteCaptionModel;

    fn name(&self) -> &str {
        "JoyCaption"
    }

    fn load(&self) -> Result<Self::Model, StageError> {
        self.served_model(PROBE_TIMEOUT)
            .map_err(|message| StageError::ModelLoad {
                stage: CAPTION_STAGE,
                message,
            })?;
        Ok(RemoteCaptionModel {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
        })
    }
}

pub struct RemoteCaptionModel {
    client: Client,
    endpoint: String,
    model: String,
}

impl CaptionModel for RemoteCaptionModel {
    fn generate(&self, request: &CaptionRequest<'_>) -> Result<String, StageError> {
        let inference = |message: String| StageError::Inference {
            stage: CAPTION_STAGE,
            message,
        };

        let data_url = format!("data:image/png;base64,{}", png_data(request.image)?);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "image_url", "image_url": { "url": data_url } },
                        { "type": "text", "text": request.user_prompt }
                    ]
                }
            ],
            "max_tokens": request.settings.max_new_tokens,
            "temperature": request.settings.temperature,
            "top_p": request.settings.top_p,
        });

        let response = self
            .client
            .post(url(&self.endpoint, "v1/chat/completions"))
            .json(&body)
            .send()
            .map_err(|e| inference(e.to_string()))?;
        let parsed: ChatResponse = check_status(response)
            .map_err(inference)?
            .json()
            .map_err(|e| inference(format!("unexpected response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(chars = content.len(), "Caption response received");
        Ok(content)
    }
}

// ── Edit ──

pub struct RemoteEditLoader {
    client: Client,
    endpoint: String,
    model: String,
}

impl RemoteEditLoader {
    pub fn probe(config: &EditConfig) -> Result<Self, StageError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| StageError::Unavailable {
                stage: EDIT_STAGE,
                reason: "no edit endpoint configured".to_string(),
            })?;
        let client = build_client(EDIT_STAGE, config.timeout_secs)?;

        let unavailable = |reason: String| StageError::Unavailable {
            stage: EDIT_STAGE,
            reason,
        };
        let response = client
            .get(url(&endpoint, "health"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .map_err(|e| unavailable(format!("{} unreachable: {}", endpoint, e)))?;
        check_status(response).map_err(unavailable)?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
        })
    }
}

impl EditLoader for RemoteEditLoader {
    type Model = RemoteEditModel;

    fn name(&self) -> &str {
        "QWEN-Image-Edit"
    }

    fn load(&self) -> Result<Self::Model, StageError> {
        let model_load = |message: String| StageError::ModelLoad {
            stage: EDIT_STAGE,
            message,
        };
        let response = self
            .client
            .post(url(&self.endpoint, "load"))
            .json(&json!({ "model": self.model }))
            .send()
            .map_err(|e| model_load(e.to_string()))?;
        check_status(response).map_err(model_load)?;

        Ok(RemoteEditModel {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
        })
    }
}

pub struct RemoteEditModel {
    client: Client,
    endpoint: String,
    model: String,
}

impl EditModel for RemoteEditModel {
    fn edit(&self, request: &EditRequest<'_>) -> Result<DynamicImage, StageError> {
        let inference = |message: String| StageError::Inference {
            stage: EDIT_STAGE,
            message,
        };

        let body = json!({
            "model": self.model,
            "image": png_data(request.image)?,
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "seed": request.settings.seed,
            "true_cfg_scale": request.settings.true_cfg_scale,
            "num_inference_steps": request.settings.num_inference_steps,
        });

        let response = self
            .client
            .post(url(&self.endpoint, "edit"))
            .json(&body)
            .send()
            .map_err(|e| inference(e.to_string()))?;
        let parsed: EditResponse = check_status(response)
            .map_err(inference)?
            .json()
            .map_err(|e| inference(format!("unexpected response: {}", e)))?;

        let bytes = BASE64
            .decode(parsed.image.as_bytes())
            .map_err(|e| inference(format!("image base64 decode failed: {}", e)))?;
        imaging::decode(&bytes).map_err(StageError::Decode)
    }

    fn unload(&self) {
        let result = self
            .client
            .post(url(&self.endpoint, "unload"))
            .json(&json!({ "model": self.model }))
            .timeout(PROBE_TIMEOUT)
            .send();
        match result.map_err(|e| e.to_string()).and_then(check_status) {
            Ok(_) => debug!(model = %self.model, "Edit model unloaded"),
            Err(e) => warn!(model = %self.model, "Failed to unload edit model: {}", e),
        }
    }
}
