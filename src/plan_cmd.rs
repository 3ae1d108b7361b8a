use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::output::Printer;
use crate::pipeline::Compiler;

/// `svc plan`: run the whole pipeline and emit the plan JSON.
pub fn run(
    manifest_path: &Path,
    environment: &str,
    out: Option<&Path>,
    printer: &Printer,
) -> Result<i32> {
    let compiler = Compiler::new()?;
    let plan = compiler.compile(manifest_path, environment)?;

    for warning in &plan.warnings {
        printer.warn(warning);
    }

    let rendered = plan.to_pretty_json()?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            printer.success(&format!(
                "Plan for `{environment}` written to {} ({})",
                path.display(),
                plan.digest()?
            ));
        }
        None => {
            println!("{rendered}");
        }
    }
    Ok(0)
}
