use std::path::PathBuf;

use clap::{Parser, Subcommand};
use previews::{DisplayMode, ShaderTarget};

#[derive(Parser, Debug)]
#[command(
    name = "shaderlab",
    author,
    version,
    about = "Compile pixel shaders and preview them over images"
)]
pub struct Cli {
    /// Settings file; defaults to `shaderlab.toml` in the user config directory.
    #[arg(long, global = true, env = "SHADERLAB_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile shader files and print compiler diagnostics.
    Check(CheckArgs),
    /// Composite images and shaders into a single frame and write it as PNG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Shader source files.
    #[arg(value_name = "SHADER", required = true)]
    pub shaders: Vec<PathBuf>,

    /// Target profile (`glsl450` or `wgsl`); guessed from the extension when omitted.
    #[arg(long, value_name = "TARGET", value_parser = parse_target)]
    pub target: Option<ShaderTarget>,
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Where to write the rendered frame.
    #[arg(long, short, value_name = "PNG")]
    pub output: PathBuf,

    /// Frame size (e.g. `1280x720`); overrides the configured display size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Image drawn full-frame beneath the previews.
    #[arg(long, value_name = "IMAGE")]
    pub background: Option<PathBuf>,

    /// Shader applied to the background image.
    #[arg(long, value_name = "SHADER", requires = "background")]
    pub background_shader: Option<PathBuf>,

    /// Layout of the background image: `stretch`, `fit`, or `tile`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub background_mode: Option<DisplayMode>,

    /// Preview image, optionally filtered by a shader: `IMAGE` or `IMAGE=SHADER`.
    #[arg(long = "preview", value_name = "IMAGE[=SHADER]", value_parser = parse_preview)]
    pub previews: Vec<PreviewArg>,

    /// Layout of preview images inside their cells: `stretch`, `fit`, or `tile`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<DisplayMode>,

    /// Target profile for every shader, overriding extension-based detection.
    #[arg(long, value_name = "TARGET", value_parser = parse_target)]
    pub target: Option<ShaderTarget>,

    /// Write the recorded draw stream as JSON (`-` for stdout).
    #[arg(long, value_name = "PATH")]
    pub dump_commands: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArg {
    pub image: PathBuf,
    pub shader: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_target(value: &str) -> Result<ShaderTarget, String> {
    value.parse()
}

fn parse_mode(value: &str) -> Result<DisplayMode, String> {
    value.parse()
}

pub fn parse_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("frame dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

fn parse_preview(spec: &str) -> Result<PreviewArg, String> {
    let (image, shader) = match spec.split_once('=') {
        Some((image, shader)) if !shader.trim().is_empty() => (image, Some(PathBuf::from(shader.trim()))),
        Some((image, _)) => (image, None),
        None => (spec, None),
    };
    if image.trim().is_empty() {
        return Err("preview needs an image path".to_string());
    }
    Ok(PreviewArg {
        image: PathBuf::from(image.trim()),
        shader,
    })
}
