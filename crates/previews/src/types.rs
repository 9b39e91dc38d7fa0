use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

/// Target profile a pixel shader is compiled against.
///
/// The set is a fixed menu rather than free text; each variant selects the
/// front-end the compiler binding runs the source through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderTarget {
    /// Vulkan-flavoured GLSL 4.50 fragment shader.
    #[default]
    Glsl450,
    /// WGSL fragment shader.
    Wgsl,
}

impl ShaderTarget {
    pub const ALL: [ShaderTarget; 2] = [ShaderTarget::Glsl450, ShaderTarget::Wgsl];

    pub fn token(self) -> &'static str {
        match self {
            ShaderTarget::Glsl450 => "glsl450",
            ShaderTarget::Wgsl => "wgsl",
        }
    }

    /// Target implied by a shader file extension, if the extension names one.
    pub fn from_extension(extension: Option<&str>) -> Option<Self> {
        match extension?.to_ascii_lowercase().as_str() {
            "wgsl" => Some(ShaderTarget::Wgsl),
            "glsl" | "frag" | "fs" => Some(ShaderTarget::Glsl450),
            _ => None,
        }
    }

    /// Target for the file at `path`, or `fallback` for unrecognised extensions.
    pub fn from_path(path: &Path, fallback: ShaderTarget) -> Self {
        Self::from_extension(path.extension().and_then(|ext| ext.to_str())).unwrap_or(fallback)
    }
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ShaderTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ShaderTarget::ALL
            .into_iter()
            .find(|target| target.token() == normalized)
            .ok_or_else(|| {
                format!("unknown shader target '{value}'; expected glsl450 or wgsl")
            })
    }
}
