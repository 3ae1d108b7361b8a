use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{CompileError, io_error};
use crate::path_safety::normalize_under_root;

/// Maximum `$ref` include depth before the loader gives up.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Side-channel facts about a load, surfaced as plan warnings.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub entrypoint: PathBuf,
    pub included_files: Vec<PathBuf>,
}

/// Read the manifest entrypoint, parse YAML or JSON, and splice every
/// `$ref` inclusion in place. The returned document contains no `$ref`
/// keys; peer keys of a `$ref` shallow-override the referenced content.
pub fn load(entrypoint: &Path) -> Result<(Value, LoadReport), CompileError> {
    let root = entrypoint
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let root = root.canonicalize().unwrap_or(root);

    let mut report = LoadReport {
        entrypoint: entrypoint.to_path_buf(),
        included_files: Vec::new(),
    };
    let mut visiting = HashSet::new();

    let document = load_file(entrypoint)?;
    let resolved = resolve_refs(
        document,
        &root,
        &root,
        entrypoint,
        0,
        &mut visiting,
        &mut report,
    )?;
    Ok((resolved, report))
}

/// Parse a single YAML or JSON document into a JSON value.
pub fn load_file(path: &Path) -> Result<Value, CompileError> {
    let raw = fs::read_to_string(path).map_err(|source| io_error(path.display().to_string(), source))?;
    parse_document(&raw, path)
}

fn parse_document(raw: &str, path: &Path) -> Result<Value, CompileError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(raw).map_err(|source| CompileError::JsonSyntax {
            path: path.display().to_string(),
            source,
        })
    } else {
        serde_yaml_bw::from_str(raw).map_err(|source| CompileError::YamlSyntax {
            path: path.display().to_string(),
            source,
        })
    }
}

fn resolve_refs(
    value: Value,
    root: &Path,
    base: &Path,
    referrer: &Path,
    depth: usize,
    visiting: &mut HashSet<PathBuf>,
    report: &mut LoadReport,
) -> Result<Value, CompileError> {
    match value {
        Value::Object(mut object) => {
            if let Some(reference) = object.remove("$ref") {
                let Some(reference) = reference.as_str().map(str::to_string) else {
                    return Err(CompileError::InvalidInterpolation {
                        token: "$ref".into(),
                        reason: "$ref must be a relative file path string".into(),
                        pointer: String::new(),
                    });
                };
                let included = include_file(
                    root, base, referrer, &reference, depth, visiting, report,
                )?;
                // Peer keys shallow-override the referenced content.
                let mut merged = match included {
                    Value::Object(map) => map,
                    other if object.is_empty() => return Ok(other),
                    _ => {
                        return Err(CompileError::ConfigMerge {
                            component: String::new(),
                            reason: format!(
                                "$ref `{reference}` resolves to a non-mapping but has peer keys"
                            ),
                            pointer: String::new(),
                        });
                    }
                };
                for (key, peer) in object {
                    let resolved =
                        resolve_refs(peer, root, base, referrer, depth, visiting, report)?;
                    merged.insert(key, resolved);
                }
                Ok(Value::Object(merged))
            } else {
                let mut out = serde_json::Map::with_capacity(object.len());
                for (key, entry) in object {
                    out.insert(
                        key,
                        resolve_refs(entry, root, base, referrer, depth, visiting, report)?,
                    );
                }
                Ok(Value::Object(out))
            }
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_refs(
                    item, root, base, referrer, depth, visiting, report,
                )?);
            }
            Ok(Value::Array(out))
        }
        scalar => Ok(scalar),
    }
}

fn include_file(
    root: &Path,
    base: &Path,
    referrer: &Path,
    reference: &str,
    depth: usize,
    visiting: &mut HashSet<PathBuf>,
    report: &mut LoadReport,
) -> Result<Value, CompileError> {
    if depth >= MAX_INCLUDE_DEPTH {
        return Err(CompileError::MaxDepth {
            reference: reference.to_string(),
            limit: MAX_INCLUDE_DEPTH,
        });
    }

    let target = normalize_under_root(root, base, reference)?;
    if !target.exists() {
        return Err(CompileError::RefNotFound {
            reference: reference.to_string(),
            referrer: referrer.display().to_string(),
        });
    }

    if !visiting.insert(target.clone()) {
        let mut chain: Vec<String> = visiting
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        chain.sort();
        chain.push(target.display().to_string());
        return Err(CompileError::RefCycle {
            reference: reference.to_string(),
            chain,
        });
    }

    debug!(reference, target = %target.display(), depth, "splicing $ref");
    report.included_files.push(target.clone());

    let document = load_file(&target)?;
    let next_base = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let resolved = resolve_refs(
        document,
        root,
        &next_base,
        &target,
        depth + 1,
        visiting,
        report,
    );
    visiting.remove(&target);
    resolved
}
