//! Verified dependency artifacts
//!
//! Downloading is owned by the platform; this side only needs a verified
//! local file for a dependency. The local cache is laid out as
//! `<root>/<sha256>/<file name from uri>`.

use crate::dependency::Dependency;
use crate::error::{JvmError, JvmResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Returns a verified local archive for a dependency
pub trait DependencyCache {
    fn artifact(&self, dependency: &Dependency) -> JvmResult<PathBuf>;
}

/// Dependency cache backed by a directory of pre-fetched artifacts
#[derive(Debug, Clone)]
pub struct LocalDependencyCache {
    root: PathBuf,
}

impl LocalDependencyCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for a dependency is expected to live
    pub fn artifact_path(&self, dependency: &Dependency) -> PathBuf {
        self.root
            .join(&dependency.sha256)
            .join(artifact_file_name(&dependency.uri))
    }
}

impl DependencyCache for LocalDependencyCache {
    fn artifact(&self, dependency: &Dependency) -> JvmResult<PathBuf> {
        if dependency.sha256.trim().is_empty() {
            debug!(
                "Refusing {} {}: no sha256 in the dependency catalog",
                dependency.id, dependency.version
            );
            return Err(JvmError::ChecksumMissing {
                id: dependency.id.clone(),
                version: dependency.version.clone(),
            });
        }

        let path = self.artifact_path(dependency);
        if !path.is_file() {
            return Err(JvmError::ArtifactNotCached {
                id: dependency.id.clone(),
                version: dependency.version.clone(),
                path,
            });
        }

        let actual = sha256_file(&path)?;
        if !actual.eq_ignore_ascii_case(&dependency.sha256) {
            return Err(JvmError::ChecksumMismatch {
                path,
                expected: dependency.sha256.clone(),
                actual,
            });
        }

        debug!(
            "Using cached {} {} from {}",
            dependency.id,
            dependency.version,
            path.display()
        );
        Ok(path)
    }
}

/// Last path segment of a URI, without query or fragment
pub fn artifact_file_name(uri: &str) -> String {
    let uri = uri.split(['?', '#']).next().unwrap_or_default();
    match uri.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "artifact".to_string(),
    }
}

/// Hex-encoded SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> JvmResult<String> {
    let mut file = File::open(path)
        .map_err(|e| JvmError::io(format!("opening {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| JvmError::io(format!("hashing {}", path.display()), e))?;

    Ok(hex::encode(hasher.finalize()))
}
