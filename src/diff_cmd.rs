use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::output::Printer;
use crate::pipeline::Compiler;

/// `svc diff`: compare the current plan digest with the deployment
/// recorded by `svc up`. Exit 0 when identical, 3 when they differ.
pub fn run(
    manifest_path: &Path,
    environment: &str,
    region: Option<&str>,
    printer: &Printer,
) -> Result<i32> {
    let compiler = Compiler::new()?;
    let plan = compiler.compile(manifest_path, environment)?;
    let digest = plan.digest()?;

    let snapshot = snapshot_path(manifest_path, environment, region);
    if !snapshot.exists() {
        printer.info(&format!(
            "no recorded deployment for `{environment}`; everything is new"
        ));
        return Ok(3);
    }

    let raw = fs::read_to_string(&snapshot)
        .with_context(|| format!("failed to read {}", snapshot.display()))?;
    let recorded: DeploymentRecord = serde_json::from_str(&raw)
        .with_context(|| format!("corrupt deployment record {}", snapshot.display()))?;

    if recorded.digest == digest {
        printer.success(&format!("no changes for `{environment}`"));
        Ok(0)
    } else {
        printer.info(&format!(
            "plan for `{environment}` differs from the recorded deployment ({} -> {})",
            recorded.digest, digest
        ));
        Ok(3)
    }
}

#[derive(Debug, Deserialize)]
pub struct DeploymentRecord {
    pub environment: String,
    #[serde(default)]
    pub region: Option<String>,
    pub digest: String,
    #[serde(rename = "recordedAt")]
    pub recorded_at: String,
}

/// `.svc/deployed/<env>[.<region>].json` next to the manifest.
pub fn snapshot_path(manifest_path: &Path, environment: &str, region: Option<&str>) -> PathBuf {
    let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let file = match region {
        Some(region) => format!("{environment}.{region}.json"),
        None => format!("{environment}.json"),
    };
    root.join(".svc").join("deployed").join(file)
}
