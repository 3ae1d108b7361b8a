#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Scratch project directory for one CLI test.
pub struct Workspace {
    pub root: PathBuf,
    _tempdir: TempDir,
}

impl Workspace {
    pub fn new(prefix: &str) -> Result<Self> {
        let tmp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .context("failed to create temp workspace")?;
        let root = tmp.path().to_path_buf();
        Ok(Self {
            root,
            _tempdir: tmp,
        })
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn manifest(&self, contents: &str) -> Result<PathBuf> {
        self.write("service.yml", contents)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// A `svc` invocation rooted in the workspace, colors off for stable
/// assertions.
pub fn svc(workspace: &Workspace) -> Command {
    let mut cmd = cargo_bin_cmd!("svc");
    cmd.current_dir(&workspace.root);
    cmd.env("NO_COLOR", "1");
    cmd
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(path).unwrap_or_else(|err| panic!("{}: {err}", path.display()));
    serde_json::from_str(&raw).unwrap_or_else(|err| panic!("{}: {err}", path.display()))
}

pub fn plan_json(workspace: &Workspace, env: &str) -> serde_json::Value {
    let output = svc(workspace)
        .args(["plan", "--env", env])
        .output()
        .expect("svc plan runs");
    assert!(
        output.status.success(),
        "plan failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("plan emits JSON")
}
