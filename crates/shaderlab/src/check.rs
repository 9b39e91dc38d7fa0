use anyhow::{Context, Result};
use previews::{compile_pixel_shader, Shader, ShaderTarget, ENTRY_POINT};

use crate::cli::CheckArgs;
use crate::run::Settings;

/// Compiles every shader in `args`; fails when any of them does not compile.
pub fn run(args: &CheckArgs, settings: &Settings) -> Result<()> {
    let mut failed = 0usize;
    for path in &args.shaders {
        let mut shader = Shader::from_file(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;
        shader.target = args
            .target
            .unwrap_or_else(|| ShaderTarget::from_path(path, settings.target));

        match compile_pixel_shader(&shader.source, ENTRY_POINT, shader.target) {
            Ok(_) => println!("ok     {} ({})", path.display(), shader.target),
            Err(diagnostic) => {
                failed += 1;
                println!("error  {} ({})", path.display(), shader.target);
                eprintln!("{diagnostic}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} shaders failed to compile", args.shaders.len());
    }
    Ok(())
}
