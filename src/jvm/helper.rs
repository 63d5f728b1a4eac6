//! Launch-time helper layer
//!
//! The buildpack ships one `bin/helper` binary that dispatches on the name
//! it is invoked as. This layer installs it once and links an `exec.d`
//! entry per enabled helper, in order.

use crate::dependency::cache::sha256_file;
use crate::error::{JvmError, JvmResult};
use crate::layer::{ContributionOutcome, Layer, LayerContributor, LayerMetadata, LayerTypes, Layers};
use crate::version::is_before_java9;
use std::fs;
use std::path::{Path, PathBuf};

pub const HELPER_LAYER: &str = "helper";

const HELPER_BINARY: &str = "helper";

const HELPER_LAYER_TYPES: LayerTypes = LayerTypes {
    build: false,
    cache: false,
    launch: true,
};

/// Helper names enabled for a runtime version, in execution order
pub fn helper_names(version: &str) -> Vec<String> {
    let mut names = vec![
        "active-processor-count",
        "java-opts",
        "jvm-heap",
        "link-local-dns",
        "memory-calculator",
        "security-providers-configurer",
        "jmx",
        "jfr",
        "openssl-certificate-loader",
    ];

    if is_before_java9(version) {
        names.extend(["security-providers-classpath-8", "debug-8"]);
    } else {
        names.extend(["security-providers-classpath-9", "debug-9", "nmt"]);
    }

    names.into_iter().map(String::from).collect()
}

#[derive(Debug, Clone)]
pub struct HelperContributor {
    /// Directory the buildpack is installed in; `bin/helper` lives under it
    pub buildpack_path: PathBuf,
    pub names: Vec<String>,
}

impl HelperContributor {
    pub fn new(buildpack_path: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            buildpack_path: buildpack_path.into(),
            names,
        }
    }

    pub fn name(&self) -> &str {
        HELPER_LAYER
    }

    fn helper_binary(&self) -> PathBuf {
        self.buildpack_path.join("bin").join(HELPER_BINARY)
    }

    pub fn layer_contributor(&self) -> JvmResult<LayerContributor> {
        let mut metadata = LayerMetadata::new();
        metadata.insert(
            "names".to_string(),
            toml::Value::Array(self.names.iter().map(|n| n.as_str().into()).collect()),
        );
        metadata.insert(
            "sha256".to_string(),
            sha256_file(&self.helper_binary())?.into(),
        );
        Ok(LayerContributor::new(
            HELPER_LAYER,
            metadata,
            HELPER_LAYER_TYPES,
        ))
    }

    pub fn contribute(&self, layers: &Layers) -> JvmResult<(Layer, ContributionOutcome)> {
        self.layer_contributor()?.contribute(layers, |layer| {
            let bin = layer.path.join("bin");
            fs::create_dir_all(&bin)
                .map_err(|e| JvmError::io(format!("creating {}", bin.display()), e))?;

            let source = self.helper_binary();
            let target = bin.join(HELPER_BINARY);
            fs::copy(&source, &target).map_err(|e| {
                JvmError::io(
                    format!("copying {} to {}", source.display(), target.display()),
                    e,
                )
            })?;

            let exec_d = layer.path.join("exec.d");
            fs::create_dir_all(&exec_d)
                .map_err(|e| JvmError::io(format!("creating {}", exec_d.display()), e))?;
            for (i, name) in self.names.iter().enumerate() {
                link(&target, &exec_d.join(format!("{:02}-{}", i, name)))?;
            }
            Ok(())
        })
    }
}

#[cfg(unix)]
fn link(target: &Path, link: &Path) -> JvmResult<()> {
    std::os::unix::fs::symlink(target, link)
        .map_err(|e| JvmError::io(format!("linking {}", link.display()), e))
}

#[cfg(not(unix))]
fn link(target: &Path, link: &Path) -> JvmResult<()> {
    fs::copy(target, link)
        .map(|_| ())
        .map_err(|e| JvmError::io(format!("copying {}", link.display()), e))
}
