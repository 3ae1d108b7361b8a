use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const MANIFEST_FILE: &str = "service.yml";

/// Locate the manifest: an explicit `--file` wins, otherwise walk upward
/// from the working directory until the repository root.
pub fn find_manifest(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("manifest not found at {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let mut dir: Option<&Path> = Some(cwd.as_path());
    while let Some(current) = dir {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        // A .git directory marks the repository root; nothing above it
        // belongs to this project.
        if current.join(".git").exists() {
            break;
        }
        dir = current.parent();
    }
    bail!("No service.yml found in this directory or any parent directories.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_path_must_exist() {
        let err = find_manifest(Some(Path::new("/definitely/not/here.yml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn explicit_path_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "service: checkout\n").unwrap();
        let found = find_manifest(Some(&path)).unwrap();
        assert_eq!(found, path);
    }
}
