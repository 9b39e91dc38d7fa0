use anyhow::{Context, Result};
use labconfig::LabConfig;
use previews::{DisplayMode, ShaderTarget};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::{check, paths, render};

/// Configuration values after parsing the tokens in the settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub display: (u32, u32),
    pub target: ShaderTarget,
    pub preview_mode: DisplayMode,
    pub background_mode: DisplayMode,
    pub clear_color: [f32; 4],
}

impl Settings {
    pub fn from_config(config: &LabConfig) -> Result<Self> {
        let defaults = &config.defaults;
        Ok(Self {
            display: (config.display.width, config.display.height),
            target: defaults
                .target
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid [defaults] target")?,
            preview_mode: defaults
                .preview_mode
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid [defaults] preview_mode")?,
            background_mode: defaults
                .background_mode
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid [defaults] background_mode")?,
            clear_color: defaults.clear_color,
        })
    }
}

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let config_path = paths::config_file(cli.config.as_deref())?;
    let config = LabConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    let settings = Settings::from_config(&config)?;
    tracing::debug!(config = %config_path.display(), ?settings, "resolved settings");

    match cli.command {
        Command::Check(args) => check::run(&args, &settings),
        Command::Render(args) => render::run(&args, &settings),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
