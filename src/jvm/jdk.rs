//! JDK contributor
//!
//! A JDK is a build-time tool: the layer is always build+cache and
//! `JAVA_HOME`/`JDK_HOME` override anything set earlier in the build.

use super::{cacerts_path, expand_dependency, runtime_metadata, security_root, DistributionType};
use crate::certs::{CertificateLoader, DEFAULT_KEYSTORE_PASSWORD};
use crate::dependency::{Dependency, DependencyCache};
use crate::error::{JvmResult, ResultExt};
use crate::layer::{ContributionOutcome, Layer, LayerContributor, LayerTypes, Layers};

const JDK_LAYER_TYPES: LayerTypes = LayerTypes {
    build: true,
    cache: true,
    launch: false,
};

#[derive(Debug, Clone)]
pub struct JdkContributor {
    pub dependency: Dependency,
    pub certificate_loader: CertificateLoader,
}

impl JdkContributor {
    pub fn new(dependency: Dependency, certificate_loader: CertificateLoader) -> Self {
        Self {
            dependency,
            certificate_loader,
        }
    }

    pub fn name(&self) -> &str {
        &self.dependency.id
    }

    pub fn layer_contributor(&self) -> JvmResult<LayerContributor> {
        Ok(LayerContributor::new(
            self.name(),
            runtime_metadata(&self.dependency, &self.certificate_loader)?,
            JDK_LAYER_TYPES,
        ))
    }

    pub fn contribute(
        &self,
        layers: &Layers,
        cache: &dyn DependencyCache,
    ) -> JvmResult<(Layer, ContributionOutcome)> {
        self.layer_contributor()?.contribute(layers, |layer| {
            expand_dependency(&self.dependency, cache, layer).context("unable to expand JDK")?;

            let home = layer.path.to_string_lossy().into_owned();
            layer.build_env.override_value("JAVA_HOME", home.as_str());
            layer.build_env.override_value("JDK_HOME", home);

            let root = security_root(&layer.path, &self.dependency.version, DistributionType::Jdk);
            self.certificate_loader
                .load(&cacerts_path(&root), DEFAULT_KEYSTORE_PASSWORD)
                .context("unable to load certificates")?;
            Ok(())
        })
    }
}
