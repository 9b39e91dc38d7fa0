use std::borrow::Cow;

use wgpu::naga::{self, front, valid, ShaderStage};

use crate::types::ShaderTarget;

/// Entry point every pixel shader must expose.
pub const ENTRY_POINT: &str = "main";

/// Pass-through pixel shader used when a shader is created without source.
///
/// Follows the binding contract shared by every program: interpolated `uv`
/// at location 0 and vertex colour at location 1, the preview texture at
/// group 0 binding 0 and its sampler at binding 1.
pub const DEFAULT_PIXEL_SHADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 1) in vec4 v_color;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D preview_texture;
layout(set = 0, binding = 1) uniform sampler preview_sampler;

void main() {
    vec4 sampled = texture(sampler2D(preview_texture, preview_sampler), v_uv);
    outColor = v_color * sampled;
}
";

/// Output of a successful compile: validated IR plus the normalised source
/// handed to the device when the program object is created.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    target: ShaderTarget,
    entry_point: String,
    source: String,
    module: naga::Module,
}

impl CompiledProgram {
    pub fn target(&self) -> ShaderTarget {
        self.target
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn shader_source(&self) -> wgpu::ShaderSource<'_> {
        match self.target {
            ShaderTarget::Glsl450 => wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(&self.source),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
            ShaderTarget::Wgsl => wgpu::ShaderSource::Wgsl(Cow::Borrowed(&self.source)),
        }
    }
}

/// Runs `source` through the compiler front-end for `target`.
///
/// On failure the error string is the compiler's own diagnostic, rendered
/// against the source so it carries line/column context.
pub fn compile_pixel_shader(
    source: &str,
    entry_point: &str,
    target: ShaderTarget,
) -> Result<CompiledProgram, String> {
    let source = match target {
        ShaderTarget::Glsl450 => ensure_glsl_version(source),
        ShaderTarget::Wgsl => source.to_string(),
    };

    let module = match target {
        ShaderTarget::Glsl450 => {
            let options = front::glsl::Options::from(ShaderStage::Fragment);
            front::glsl::Frontend::default()
                .parse(&options, &source)
                .map_err(|err| err.emit_to_string(&source))?
        }
        ShaderTarget::Wgsl => {
            front::wgsl::parse_str(&source).map_err(|err| err.emit_to_string(&source))?
        }
    };

    valid::Validator::new(valid::ValidationFlags::all(), valid::Capabilities::all())
        .validate(&module)
        .map_err(|err| err.emit_to_string(&source))?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|entry| entry.name == entry_point && entry.stage == ShaderStage::Fragment);
    if !has_entry {
        return Err(format!(
            "no fragment entry point named '{entry_point}' found"
        ));
    }

    Ok(CompiledProgram {
        target,
        entry_point: entry_point.to_string(),
        source,
        module,
    })
}

/// Prepends `#version 450` unless the author already declared a version.
fn ensure_glsl_version(source: &str) -> String {
    if leading_code(source).starts_with("#version") {
        source.to_string()
    } else {
        format!("#version 450\n{source}")
    }
}

/// `source` with leading whitespace and comments stripped.
fn leading_code(mut source: &str) -> &str {
    loop {
        source = source.trim_start();
        if let Some(rest) = source.strip_prefix("//") {
            source = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = source.strip_prefix("/*") {
            source = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return source;
        }
    }
}

/// Compiles the shared quad vertex stage feeding every pixel shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("preview quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Quad vertex shader; positions arrive already in clip space.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_color;

layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec4 v_color;

void main() {
    v_uv = a_uv;
    v_color = a_color;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WGSL_INVERT;

    #[test]
    fn default_shader_compiles_as_glsl() {
        let program = compile_pixel_shader(DEFAULT_PIXEL_SHADER, ENTRY_POINT, ShaderTarget::Glsl450)
            .expect("default shader compiles");
        assert_eq!(program.target(), ShaderTarget::Glsl450);
        assert_eq!(program.entry_point(), "main");
        assert!(!program.module().entry_points.is_empty());
    }

    #[test]
    fn wgsl_shader_compiles() {
        let program = compile_pixel_shader(WGSL_INVERT, ENTRY_POINT, ShaderTarget::Wgsl)
            .expect("wgsl shader compiles");
        assert_eq!(program.target(), ShaderTarget::Wgsl);
    }

    #[test]
    fn syntax_error_reports_diagnostic() {
        let err = compile_pixel_shader("@fragment fn main( {", ENTRY_POINT, ShaderTarget::Wgsl)
            .unwrap_err();
        assert!(!err.trim().is_empty());
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let err = compile_pixel_shader(WGSL_INVERT, "shade", ShaderTarget::Wgsl).unwrap_err();
        assert!(err.contains("shade"));
    }

    #[test]
    fn glsl_version_is_added_once() {
        let body = "void main() {}";
        assert!(ensure_glsl_version(body).starts_with("#version 450\n"));
        let declared = "// header\n#version 450\nvoid main() {}";
        assert_eq!(ensure_glsl_version(declared), declared);
        let licensed = "/* MIT License\n * header */\n  #version 450\nvoid main() {}";
        assert_eq!(ensure_glsl_version(licensed), licensed);
    }

    #[test]
    fn block_comment_header_before_version_compiles() {
        let source = format!("/* shared header\n   second line */\n{DEFAULT_PIXEL_SHADER}");
        let program = compile_pixel_shader(&source, ENTRY_POINT, ShaderTarget::Glsl450)
            .expect("commented shader compiles");
        assert_eq!(program.target(), ShaderTarget::Glsl450);
    }

    #[test]
    fn glsl_diagnostic_points_into_source() {
        let source = "#version 450\nlayout(location = 0) out vec4 outColor;\nvoid main() {\n    outColor = undefined_name;\n}\n";
        let err = compile_pixel_shader(source, ENTRY_POINT, ShaderTarget::Glsl450).unwrap_err();
        assert!(err.contains("undefined_name"), "{err}");
        assert!(!err.starts_with("Error {"), "{err}");
    }
}
