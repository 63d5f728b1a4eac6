//! Buildpack descriptor schema
//!
//! Mirrors the parts of `buildpack.toml` this buildpack consumes. Entries
//! under `[metadata]` are strict: unknown keys are rejected at load time
//! instead of surfacing deep inside dependency resolution.

use crate::dependency::Dependency;
use serde::{Deserialize, Serialize};

/// Root of `buildpack.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildpackDescriptor {
    /// Buildpack API version (e.g. "0.10")
    #[serde(default)]
    pub api: String,

    /// Buildpack identity
    #[serde(default)]
    pub buildpack: BuildpackInfo,

    /// Configuration surface, dependency catalog and native-image options
    #[serde(default)]
    pub metadata: BuildpackMetadata,
}

/// `[buildpack]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub homepage: Option<String>,
    pub description: Option<String>,
}

/// `[metadata]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildpackMetadata {
    /// Configuration variables with their defaults
    #[serde(default)]
    pub configurations: Vec<Configuration>,

    /// Dependency catalog
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Native image bundling options
    #[serde(default)]
    pub native_image: Option<NativeImage>,

    /// Files included when packaging the buildpack
    #[serde(default)]
    pub include_files: Vec<String>,

    /// Script run before packaging
    #[serde(default)]
    pub pre_package: Option<String>,
}

/// A single `[[metadata.configurations]]` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Environment variable name
    pub name: String,

    /// Value used when the variable is not set
    #[serde(default)]
    pub default: String,

    #[serde(default)]
    pub description: String,

    /// Whether the variable is consulted at build time
    #[serde(default)]
    pub build: bool,

    /// Whether the variable is consulted at launch time
    #[serde(default)]
    pub launch: bool,
}

impl Configuration {
    /// Create a configuration entry with a default value
    pub fn new(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            ..Self::default()
        }
    }
}

/// How the native-image toolchain is delivered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct NativeImage {
    /// The vendor ships native-image inside its JDK distribution
    #[serde(default)]
    pub bundled_with_jdk: bool,

    /// Installer path, relative to the JDK home (e.g. `/bin/gu`)
    #[serde(default)]
    pub custom_command: String,

    /// Arguments passed to the installer before the artifact path
    #[serde(default)]
    pub custom_args: Vec<String>,
}
