use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// User-level tool preferences. Looked up via `SVC_CONFIG`, then the
/// first existing file among the candidate locations; a missing config
/// is not an error.
#[derive(Debug, Default, Deserialize)]
pub struct SvcConfig {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    /// "auto" (default) or "never".
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DefaultsSection {
    /// Environment assumed when this installation configures one.
    pub environment: Option<String>,
}

impl SvcConfig {
    pub fn load() -> Result<Self> {
        match resolve_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }
}

fn resolve_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("SVC_CONFIG") {
        return Some(PathBuf::from(explicit));
    }
    candidate_paths().into_iter().find(|path| path.is_file())
}

/// Recognized config locations, most specific first: the XDG config
/// directory, then the legacy `~/.svc` dotfile.
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("svc").join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".svc").join("config.toml"));
    }
    candidates
}
