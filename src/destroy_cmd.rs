use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::diff_cmd::snapshot_path;
use crate::output::Printer;

/// `svc destroy`: drop the recorded deployment for an environment.
pub fn run(
    manifest_path: &Path,
    environment: &str,
    assume_yes: bool,
    emit_json: bool,
    printer: &Printer,
) -> Result<i32> {
    let snapshot = snapshot_path(manifest_path, environment, None);
    if !snapshot.exists() {
        if emit_json {
            println!("{}", json!({ "environment": environment, "destroyed": false }));
        } else {
            printer.info(&format!("no recorded deployment for `{environment}`"));
        }
        return Ok(0);
    }

    if !assume_yes && !confirm(environment)? {
        printer.info("aborted");
        return Ok(0);
    }

    fs::remove_file(&snapshot)
        .with_context(|| format!("failed to remove {}", snapshot.display()))?;

    if emit_json {
        println!("{}", json!({ "environment": environment, "destroyed": true }));
    } else {
        printer.success(&format!("deployment record for `{environment}` removed"));
    }
    Ok(0)
}

fn confirm(environment: &str) -> Result<bool> {
    print!("Remove the recorded deployment for `{environment}`? [y/N] ");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
