use std::path::Path;

use anyhow::Result;

use crate::output::Printer;
use crate::pipeline::Compiler;

/// `svc validate`: stages 1-2 only.
pub fn run(manifest_path: &Path, printer: &Printer) -> Result<i32> {
    let compiler = Compiler::new()?;
    let manifest = compiler.validate(manifest_path)?;
    printer.success(&format!(
        "{} is valid: service `{}` with {} component{} ({})",
        manifest_path.display(),
        manifest.service,
        manifest.components.len(),
        if manifest.components.len() == 1 { "" } else { "s" },
        manifest.compliance_framework
    ));
    Ok(0)
}
