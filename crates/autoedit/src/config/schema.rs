use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessingMode;

pub const DEFAULT_CAPTION_MODEL: &str = "fancyfeast/llama-joycaption-beta-one-hf-llava";
pub const DEFAULT_EDIT_MODEL: &str = "dimitribarbot/Qwen-Image-Edit-int8wo";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default)]
    pub default_mode: ProcessingMode,
    #[serde(default = "default_true")]
    pub persist_results: bool,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub edit: EditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            output_directory: default_output_directory(),
            default_mode: ProcessingMode::default(),
            persist_results: true,
            caption: CaptionConfig::default(),
            edit: EditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// `<data dir>/autoedit/output`, or `./output` when the platform has no data dir.
fn default_output_directory() -> String {
    dirs::data_dir()
        .map(|d| d.join("autoedit").join("output"))
        .unwrap_or_else(|| PathBuf::from("output"))
        .to_string_lossy()
        .into_owned()
}

/// Location the CLI looks for a config file when none is given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autoedit").join("config.json"))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Base URL of an OpenAI-compatible vision chat server.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_caption_model")]
    pub model: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_caption_timeout")]
    pub timeout_secs: u64,
}

fn default_caption_model() -> String {
    DEFAULT_CAPTION_MODEL.to_string()
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.6
}

fn default_top_p() -> f32 {
    0.9
}

fn default_caption_timeout() -> u64 {
    120
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_caption_model(),
            max_new_tokens: 256,
            temperature: 0.6,
            top_p: 0.9,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfig {
    /// Base URL of the diffusion edit sidecar.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_edit_model")]
    pub model: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_true_cfg_scale")]
    pub true_cfg_scale: f32,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    /// Keep the edit model resident between casual-mode runs as well.
    #[serde(default)]
    pub keep_warm: bool,
    #[serde(default = "default_edit_timeout")]
    pub timeout_secs: u64,
}

fn default_edit_model() -> String {
    DEFAULT_EDIT_MODEL.to_string()
}

fn default_true_cfg_scale() -> f32 {
    4.0
}

fn default_num_inference_steps() -> u32 {
    20
}

fn default_edit_timeout() -> u64 {
    600
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_edit_model(),
            seed: 0,
            true_cfg_scale: 4.0,
            num_inference_steps: 20,
            keep_warm: false,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
