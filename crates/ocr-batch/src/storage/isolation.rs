//! Per-session root directories.
//!
//! Every session id maps to `<base>/sessions/<sha256(id)>`. The mapping is
//! fixed at construction and every path handed out is checked to stay
//! under the resolved root.

use std::path::{Component, Path, PathBuf};

use crate::error::{IsolationViolation, ValidationError};
use crate::sanitize::{session_fingerprint, sha256_hex};

const SESSIONS_DIR: &str = "sessions";
const UPLOADS_DIR: &str = "uploads";
const OUTPUTS_DIR: &str = "outputs";
const SUMMARY_DIR: &str = "summary";
const SUMMARY_FILE: &str = "latest.json";

#[derive(Debug, Clone)]
pub struct SessionRoots {
    base: PathBuf,
}

impl SessionRoots {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            base: data_directory.as_ref().join(SESSIONS_DIR),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn resolve(&self, session_id: &str) -> Result<SessionRoot, ValidationError> {
        if session_id.trim().is_empty() {
            return Err(ValidationError::EmptySession);
        }

        Ok(SessionRoot {
            root: self.base.join(sha256_hex(session_id.as_bytes())),
            fingerprint: session_fingerprint(session_id),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRoot {
    root: PathBuf,
    fingerprint: String,
}

impl SessionRoot {
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Short id for log fields; never the raw session id.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn join<P: AsRef<Path>>(&self, relative: P) -> Result<PathBuf, IsolationViolation> {
        contained_join(&self.root, relative.as_ref())
    }

    pub fn uploads_dir(&self, batch_id: &str) -> Result<PathBuf, IsolationViolation> {
        self.join(Path::new(UPLOADS_DIR).join(batch_id))
    }

    pub fn outputs_dir(&self, batch_id: &str) -> Result<PathBuf, IsolationViolation> {
        self.join(Path::new(OUTPUTS_DIR).join(batch_id))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_DIR).join(SUMMARY_FILE)
    }

    /// Lexical containment check for absolute paths.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && !path.components().any(|c| matches!(c, Component::ParentDir))
    }
}

/// Joins `relative` onto `root`, rejecting anything that could resolve
/// outside it: parent references, absolute paths and drive prefixes.
pub fn contained_join(root: &Path, relative: &Path) -> Result<PathBuf, IsolationViolation> {
    let violation = || IsolationViolation {
        path: relative.to_path_buf(),
        root: root.to_path_buf(),
    };

    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(violation());
            }
        }
    }

    if !joined.starts_with(root) {
        return Err(violation());
    }

    Ok(joined)
}
