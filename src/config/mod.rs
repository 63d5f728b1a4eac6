//! Configuration resolution
//!
//! The process environment is captured once at the CLI boundary and
//! threaded through as an immutable snapshot, so every decision below
//! can be exercised without touching process-global state.

pub mod schema;

pub use schema::{BuildpackDescriptor, BuildpackInfo, BuildpackMetadata, Configuration, NativeImage};

use crate::error::{JvmError, JvmResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Snapshot of environment variables visible to a build
pub type Env = BTreeMap<String, String>;

/// Descriptor file name inside the buildpack directory
pub const BUILDPACK_TOML: &str = "buildpack.toml";

/// Capture the current process environment
pub fn process_env() -> Env {
    std::env::vars().collect()
}

impl BuildpackDescriptor {
    /// Parse `buildpack.toml` from the buildpack directory
    pub fn from_dir(buildpack_dir: &Path) -> JvmResult<Self> {
        Self::from_file(&buildpack_dir.join(BUILDPACK_TOML))
    }

    /// Parse a descriptor from a TOML file on disk
    pub fn from_file(path: &Path) -> JvmResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| JvmError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// A resolved configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,

    /// True when the value came from the environment rather than a default
    pub explicit: bool,
}

/// Resolves configuration names against the environment, then defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigurationResolver {
    configurations: Vec<Configuration>,
    env: Env,
}

impl ConfigurationResolver {
    pub fn new(configurations: Vec<Configuration>, env: Env) -> Self {
        Self {
            configurations,
            env,
        }
    }

    /// Resolve a configuration value.
    ///
    /// An environment variable that is set (even to an empty string) wins
    /// over the configured default.
    pub fn resolve(&self, name: &str) -> Resolved {
        if let Some(value) = self.env.get(name) {
            return Resolved {
                value: value.clone(),
                explicit: true,
            };
        }

        let value = self
            .configurations
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.default.clone())
            .unwrap_or_default();

        Resolved {
            value,
            explicit: false,
        }
    }

    /// Resolve a configuration value, ignoring whether it was explicit
    pub fn value(&self, name: &str) -> String {
        self.resolve(name).value
    }

    /// Raw environment lookup, without configuration defaults
    pub fn env(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Log every configuration that is relevant to a build
    pub fn log_build_configuration(&self) {
        for c in self.configurations.iter().filter(|c| c.build) {
            let resolved = self.resolve(&c.name);
            debug!(
                "{}={} ({})",
                c.name,
                resolved.value,
                if resolved.explicit { "set" } else { "default" }
            );
        }
    }
}
