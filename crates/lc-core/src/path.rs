// path.rs — workspace-relative path canonicalization and boundary checks.
//
// Every FileChange path and every policy pattern is checked against the
// workspace root through these helpers so "does this path escape the
// workspace" is answered in exactly one place.

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;

/// A canonical, workspace-relative path: no `..`, no leading `/`, non-empty.
///
/// Construction rejects traversal outright rather than normalizing it away,
/// since a path that *needed* normalizing is exactly the kind of input a
/// hostile or buggy plan would submit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelPath(String);

impl RelPath {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(CoreError::InvalidPath {
                path: raw.to_string(),
                reason: "empty path".into(),
            });
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            return Err(CoreError::InvalidPath {
                path: raw.to_string(),
                reason: "absolute paths are not workspace-relative".into(),
            });
        }
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(CoreError::InvalidPath {
                        path: raw.to_string(),
                        reason: "path traversal (`..`) is not allowed".into(),
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(CoreError::InvalidPath {
                        path: raw.to_string(),
                        reason: "path must be workspace-relative".into(),
                    });
                }
            }
        }
        Ok(Self(normalize(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this path against a workspace root, verifying the result
    /// still canonicalizes under the root (defends against symlink escapes
    /// for paths that already exist on disk).
    pub fn resolve_checked(&self, workspace_root: &Path) -> Result<PathBuf, CoreError> {
        let joined = workspace_root.join(&self.0);
        if let Ok(canon) = joined.canonicalize() {
            let canon_root = workspace_root
                .canonicalize()
                .unwrap_or_else(|_| workspace_root.to_path_buf());
            if !canon.starts_with(&canon_root) {
                return Err(CoreError::PathEscape {
                    path: self.0.clone(),
                });
            }
        }
        Ok(joined)
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for RelPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for RelPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RelPath::new(raw).map_err(serde::de::Error::custom)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim_start_matches("./").replace('\\', "/")
}
