//! Layer management
//!
//! A layer is a directory under the layers root plus a `<name>.toml`
//! descriptor holding its type flags and metadata. Contributions are gated
//! on that metadata: when the persisted value equals the expected one the
//! expensive work is skipped entirely.

pub mod env;
pub mod extract;

pub use env::Environment;
pub use extract::{extract, ArchiveFormat};

use crate::error::{JvmError, JvmResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata persisted alongside a layer
pub type LayerMetadata = toml::Table;

/// Where a layer is visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTypes {
    pub build: bool,
    pub cache: bool,
    pub launch: bool,
}

/// On-disk shape of `<name>.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
struct LayerDescriptor {
    #[serde(default)]
    types: LayerTypes,

    #[serde(default)]
    metadata: LayerMetadata,
}

/// A layer as seen by a contributor
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub path: PathBuf,
    pub types: LayerTypes,
    pub metadata: LayerMetadata,

    /// Environment applied during the build phase only
    pub build_env: Environment,

    /// Environment applied at launch only
    pub launch_env: Environment,

    /// Environment applied in both phases
    pub shared_env: Environment,

    /// Whether a descriptor from a previous build was found
    pub cached: bool,
}

impl Layer {
    /// Empty the layer directory and forget all previous state
    pub fn reset(&mut self) -> JvmResult<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)
                .map_err(|e| JvmError::io(format!("removing {}", self.path.display()), e))?;
        }
        fs::create_dir_all(&self.path)
            .map_err(|e| JvmError::io(format!("creating {}", self.path.display()), e))?;

        self.types = LayerTypes::default();
        self.metadata = LayerMetadata::new();
        self.build_env = Environment::new();
        self.launch_env = Environment::new();
        self.shared_env = Environment::new();
        Ok(())
    }
}

/// The layers root directory
#[derive(Debug, Clone)]
pub struct Layers {
    root: PathBuf,
}

impl Layers {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.toml", name))
    }

    /// Load a layer, including any state persisted by a previous build
    pub fn layer(&self, name: &str) -> JvmResult<Layer> {
        let path = self.root.join(name);
        let descriptor_path = self.descriptor_path(name);

        let (descriptor, cached) = if descriptor_path.is_file() {
            let content = fs::read_to_string(&descriptor_path).map_err(|e| {
                JvmError::io(format!("reading {}", descriptor_path.display()), e)
            })?;
            (toml::from_str::<LayerDescriptor>(&content)?, true)
        } else {
            (LayerDescriptor::default(), false)
        };

        Ok(Layer {
            name: name.to_string(),
            build_env: Environment::read(&path.join("env.build"))?,
            launch_env: Environment::read(&path.join("env.launch"))?,
            shared_env: Environment::read(&path.join("env"))?,
            path,
            types: descriptor.types,
            metadata: descriptor.metadata,
            cached,
        })
    }

    /// Persist the descriptor and environment files of a layer
    pub fn write(&self, layer: &Layer) -> JvmResult<()> {
        self.write_descriptor(layer)?;

        fs::create_dir_all(&layer.path)
            .map_err(|e| JvmError::io(format!("creating {}", layer.path.display()), e))?;
        layer.build_env.write(&layer.path.join("env.build"))?;
        layer.launch_env.write(&layer.path.join("env.launch"))?;
        layer.shared_env.write(&layer.path.join("env"))?;
        Ok(())
    }

    /// Forget the persisted state of a layer, leaving its directory alone
    fn remove_descriptor(&self, name: &str) -> JvmResult<()> {
        let path = self.descriptor_path(name);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(JvmError::io(format!("removing {}", path.display()), e))
            }
            _ => Ok(()),
        }
    }

    fn write_descriptor(&self, layer: &Layer) -> JvmResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| JvmError::io(format!("creating {}", self.root.display()), e))?;

        let descriptor = LayerDescriptor {
            types: layer.types,
            metadata: layer.metadata.clone(),
        };
        let path = self.descriptor_path(&layer.name);
        fs::write(&path, toml::to_string(&descriptor)?)
            .map_err(|e| JvmError::io(format!("writing {}", path.display()), e))
    }
}

/// What happened to a layer during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionOutcome {
    /// The contribution function ran and the layer was rewritten
    Contributed,

    /// Persisted metadata matched; the layer was reused as-is
    Skipped,
}

impl fmt::Display for ContributionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contributed => write!(f, "contributed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Contributes one layer, gated on its expected metadata
#[derive(Debug, Clone)]
pub struct LayerContributor {
    pub name: String,
    pub expected_metadata: LayerMetadata,
    pub types: LayerTypes,
}

impl LayerContributor {
    pub fn new(name: impl Into<String>, expected_metadata: LayerMetadata, types: LayerTypes) -> Self {
        Self {
            name: name.into(),
            expected_metadata,
            types,
        }
    }

    /// Run `f` against a freshly reset layer unless the persisted metadata
    /// already equals the expected metadata.
    pub fn contribute<F>(&self, layers: &Layers, f: F) -> JvmResult<(Layer, ContributionOutcome)>
    where
        F: FnOnce(&mut Layer) -> JvmResult<()>,
    {
        let mut layer = layers.layer(&self.name)?;

        if layer.cached && layer.metadata == self.expected_metadata && layer.path.is_dir() {
            info!("Reusing cached layer {}", layer.path.display());
            if layer.types != self.types {
                layer.types = self.types;
                layers.write_descriptor(&layer)?;
            }
            return Ok((layer, ContributionOutcome::Skipped));
        }

        debug!("Contributing layer {}", layer.path.display());
        // A failed contribution must not leave the old descriptor next to an emptied layer
        layers.remove_descriptor(&layer.name)?;
        layer.reset()?;
        f(&mut layer)?;

        layer.metadata = self.expected_metadata.clone();
        layer.types = self.types;
        layers.write(&layer)?;

        Ok((layer, ContributionOutcome::Contributed))
    }
}
