pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_or_default, validate_config};
pub use schema::{
    default_config_path, CaptionConfig, Config, EditConfig, LoggingConfig, DEFAULT_CAPTION_MODEL,
    DEFAULT_EDIT_MODEL,
};
