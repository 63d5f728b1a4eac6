//! Error types for jvm-vendors
//!
//! All modules use `JvmResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for jvm-vendors operations
pub type JvmResult<T> = Result<T, JvmError>;

/// All errors that can occur while detecting or building
#[derive(Error, Debug)]
pub enum JvmError {
    // Configuration errors
    #[error("BP_JVM_VENDORS is empty")]
    VendorsEmpty,

    #[error("requested JVM vendor {vendor} is not supported, buildpack supports {supported:?}")]
    VendorUnsupported {
        vendor: String,
        supported: Vec<String>,
    },

    #[error("unable to create NIK, custom command has not been supplied by buildpack")]
    CustomCommandMissing,

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid value for {name}: {reason}")]
    ConfigValue { name: String, reason: String },

    // Resolution errors
    #[error("no valid dependencies for {id}, {version}, and {stack} in {candidates:?}")]
    NoValidDependencies {
        id: String,
        version: String,
        stack: String,
        candidates: Vec<String>,
    },

    // Cache and archive errors
    #[error("dependency {id} {version} not found in cache at {path}")]
    ArtifactNotCached {
        id: String,
        version: String,
        path: PathBuf,
    },

    #[error("dependency {id} {version} has no sha256 to verify against")]
    ChecksumMissing { id: String, version: String },

    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unable to expand {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("unable to determine archive format of {0}")]
    ArchiveFormat(PathBuf),

    // Certificate errors
    #[error("certificate alias {alias} from {path} collides with a different certificate")]
    CertConflict { alias: String, path: PathBuf },

    #[error("invalid certificate {path}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    #[error("invalid keystore {path}: {reason}")]
    Keystore { path: PathBuf, reason: String },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A failure wrapped with the stage that produced it
    #[error("{context}\n{source}")]
    Context {
        context: String,
        #[source]
        source: Box<JvmError>,
    },
}

impl JvmError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap this error with the name of the failing stage
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error of a context chain
    pub fn root_cause(&self) -> &JvmError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if no catalog entry satisfied a resolution request
    pub fn is_no_valid_dependencies(&self) -> bool {
        matches!(self.root_cause(), Self::NoValidDependencies { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::VendorsEmpty => {
                Some("Set BP_JVM_VENDORS to a comma-separated list of supported vendors")
            }
            Self::VendorUnsupported { .. } => {
                Some("Set BP_JVM_VENDOR to one of the vendors listed in BP_JVM_VENDORS")
            }
            Self::CustomCommandMissing => {
                Some("Configure native-image.custom-command in buildpack.toml")
            }
            Self::NoValidDependencies { .. } => {
                Some("Check BP_JVM_VERSION and BP_JVM_TYPE against the available dependencies")
            }
            Self::ChecksumMissing { .. } => {
                Some("Add the artifact's sha256 to the dependency entry in buildpack.toml")
            }
            _ => None,
        }
    }
}

/// Attach stage context to fallible results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> JvmResult<T>;
}

impl<T> ResultExt<T> for JvmResult<T> {
    fn context(self, context: impl Into<String>) -> JvmResult<T> {
        self.map_err(|e| e.context(context))
    }
}
