use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::diff_cmd::snapshot_path;
use crate::output::Printer;
use crate::pipeline::Compiler;

/// `svc up` / `svc deploy`: compile and record the deployment. Emission
/// of the provider template is the backend's job; the record is what
/// `svc diff` compares against.
pub fn run(manifest_path: &Path, environment: &str, printer: &Printer) -> Result<i32> {
    let compiler = Compiler::new()?;
    let plan = compiler.compile(manifest_path, environment)?;

    for warning in &plan.warnings {
        printer.warn(warning);
    }

    let digest = plan.digest()?;
    let record = json!({
        "environment": environment,
        "digest": digest,
        "recordedAt": OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into()),
        "plan": serde_json::to_value(&plan)?,
    });

    let snapshot = snapshot_path(manifest_path, environment, None);
    if let Some(parent) = snapshot.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&snapshot, serde_json::to_string_pretty(&record)?)
        .with_context(|| format!("failed to write {}", snapshot.display()))?;

    printer.success(&format!(
        "deployment for `{environment}` recorded at {} ({digest})",
        snapshot.display()
    ));
    printer.info("template emission is delegated to the configured backend");
    Ok(0)
}
