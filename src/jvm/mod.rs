//! Runtime contributors
//!
//! Each variant owns one layer. The planner produces them as an ordered
//! list; callers match on the variant instead of probing concrete types.

pub mod contributions;
pub mod helper;
pub mod jdk;
pub mod jre;
pub mod nik;
pub mod security_properties;

pub use contributions::{is_build_contribution, is_launch_contribution, Contribution};
pub use helper::{helper_names, HelperContributor};
pub use jdk::JdkContributor;
pub use jre::{DistributionType, JreContributor};
pub use nik::NikContributor;
pub use security_properties::JavaSecurityPropertiesContributor;

use crate::certs::CertificateLoader;
use crate::dependency::{Dependency, DependencyCache};
use crate::error::{JvmResult, ResultExt};
use crate::layer::{
    extract, ArchiveFormat, ContributionOutcome, Layer, LayerMetadata, LayerTypes, Layers,
};
use crate::version::is_before_java9;
use std::path::{Path, PathBuf};
use tracing::info;

/// Metadata key holding the serialized dependency
pub const DEPENDENCY_METADATA_KEY: &str = "dependency";

/// A contributor together with its runtime variant
#[derive(Debug, Clone)]
pub enum Contributor {
    Jdk(JdkContributor),
    Jre(JreContributor),
    Nik(NikContributor),
    Helper(HelperContributor),
    JavaSecurityProperties(JavaSecurityPropertiesContributor),
}

/// Result of contributing one layer
#[derive(Debug, Clone)]
pub struct ContributedLayer {
    pub layer: Layer,
    pub outcome: ContributionOutcome,
}

impl Contributor {
    /// Layer name, which is also how contributors are reported
    pub fn name(&self) -> &str {
        match self {
            Self::Jdk(c) => c.name(),
            Self::Jre(c) => c.name(),
            Self::Nik(c) => c.name(),
            Self::Helper(c) => c.name(),
            Self::JavaSecurityProperties(c) => c.name(),
        }
    }

    /// The runtime dependency this contributor installs, if any
    pub fn dependency(&self) -> Option<&Dependency> {
        match self {
            Self::Jdk(c) => Some(&c.dependency),
            Self::Jre(c) => Some(&c.dependency),
            Self::Nik(c) => Some(&c.native_dependency),
            Self::Helper(_) | Self::JavaSecurityProperties(_) => None,
        }
    }

    /// Where the contributed layer is visible
    pub fn layer_types(&self) -> LayerTypes {
        match self {
            Self::Jdk(_) | Self::Nik(_) => LayerTypes {
                build: true,
                cache: true,
                launch: false,
            },
            Self::Jre(c) => c.layer_types(),
            Self::Helper(_) | Self::JavaSecurityProperties(_) => LayerTypes {
                build: false,
                cache: false,
                launch: true,
            },
        }
    }

    pub fn contribute(
        &self,
        layers: &Layers,
        cache: &dyn DependencyCache,
    ) -> JvmResult<ContributedLayer> {
        let (layer, outcome) = match self {
            Self::Jdk(c) => c.contribute(layers, cache)?,
            Self::Jre(c) => c.contribute(layers, cache)?,
            Self::Nik(c) => c.contribute(layers, cache)?,
            Self::Helper(c) => c.contribute(layers)?,
            Self::JavaSecurityProperties(c) => c.contribute(layers)?,
        };
        Ok(ContributedLayer { layer, outcome })
    }
}

/// `{dependency, cert-dir}`: changes to either invalidate the layer
pub(crate) fn runtime_metadata(
    dependency: &Dependency,
    certificate_loader: &CertificateLoader,
) -> JvmResult<LayerMetadata> {
    let mut metadata = LayerMetadata::new();
    metadata.insert(
        DEPENDENCY_METADATA_KEY.to_string(),
        toml::Value::try_from(dependency)?,
    );
    metadata.extend(
        certificate_loader
            .metadata()
            .context("unable to generate certificate loader metadata")?,
    );
    Ok(metadata)
}

/// Expand a runtime distribution into its layer, dropping the top-level directory
pub(crate) fn expand_dependency(
    dependency: &Dependency,
    cache: &dyn DependencyCache,
    layer: &Layer,
) -> JvmResult<()> {
    let artifact = cache.artifact(dependency)?;
    let format = ArchiveFormat::detect(&dependency.uri, &artifact)?;

    info!(
        "Expanding {} {} to {}",
        dependency.display_name(),
        dependency.version,
        layer.path.display()
    );
    extract(&artifact, format, &layer.path, 1)
}

/// Directory holding `lib/security` for a runtime home.
///
/// Only a pre-9 JDK nests its runtime under `jre/`.
pub(crate) fn security_root(home: &Path, version: &str, distribution: DistributionType) -> PathBuf {
    if is_before_java9(version) && distribution == DistributionType::Jdk {
        home.join("jre")
    } else {
        home.to_path_buf()
    }
}

/// Trust-store location inside a security root
pub(crate) fn cacerts_path(security_root: &Path) -> PathBuf {
    security_root.join("lib").join("security").join("cacerts")
}
