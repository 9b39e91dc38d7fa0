use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Largest display edge accepted from configuration.
pub const MAX_DISPLAY_EDGE: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LabConfig {
    pub version: u32,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Display {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Values the host falls back to when the command line leaves them out.
/// Target and mode tokens are checked by the consumer, which owns the menus.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_mode")]
    pub preview_mode: String,
    #[serde(default = "default_background_mode")]
    pub background_mode: String,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            target: default_target(),
            preview_mode: default_mode(),
            background_mode: default_background_mode(),
            clear_color: default_clear_color(),
        }
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_target() -> String {
    "glsl450".to_string()
}

fn default_mode() -> String {
    "fit".to_string()
}

fn default_background_mode() -> String {
    "stretch".to_string()
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            version: 1,
            display: Display::default(),
            defaults: Defaults::default(),
        }
    }
}

impl LabConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: LabConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, or returns the defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported configuration version {}",
                self.version
            )));
        }
        let Display { width, height } = self.display;
        if width == 0 || height == 0 || width > MAX_DISPLAY_EDGE || height > MAX_DISPLAY_EDGE {
            return Err(ConfigError::Invalid(format!(
                "display size {width}x{height} must be between 1 and {MAX_DISPLAY_EDGE} on each edge"
            )));
        }
        if self
            .defaults
            .clear_color
            .iter()
            .any(|channel| !(0.0..=1.0).contains(channel))
        {
            return Err(ConfigError::Invalid(
                "clear_color channels must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}
