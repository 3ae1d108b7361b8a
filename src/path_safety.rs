use std::path::{Component, Path, PathBuf};

use crate::error::CompileError;

/// Normalize a `$ref` path and ensure it stays within the manifest root.
/// Absolute paths and any path that escapes via `..` are rejected.
///
/// Lexical normalization is deliberate: `$ref` targets may be checked
/// before they exist, and symlinked roots still compare correctly because
/// both sides are canonicalized when the root itself resolves.
pub fn normalize_under_root(
    root: &Path,
    base: &Path,
    reference: &str,
) -> Result<PathBuf, CompileError> {
    let candidate = Path::new(reference);
    if candidate.is_absolute() {
        return Err(CompileError::PathTraversal {
            reference: reference.to_string(),
            root: root.display().to_string(),
        });
    }

    let joined = base.join(candidate);
    let normalized = lexical_normalize(&joined);
    let root_normalized = lexical_normalize(root);

    if !normalized.starts_with(&root_normalized) {
        return Err(CompileError::PathTraversal {
            reference: reference.to_string(),
            root: root.display().to_string(),
        });
    }

    Ok(normalized)
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match parts.last() {
                    Some(Component::Normal(_)) => {
                        parts.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => parts.push(component),
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}
