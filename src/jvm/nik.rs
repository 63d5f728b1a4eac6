//! Native-image toolchain installed separately from the JDK
//!
//! The vendor's installer lives inside the JDK home and is run against the
//! native-image artifact, e.g. `<jdk>/bin/gu install --local-file <jar>`.

use super::runtime_metadata;
use crate::certs::CertificateLoader;
use crate::dependency::cache::artifact_file_name;
use crate::dependency::{Dependency, DependencyCache};
use crate::error::{JvmError, JvmResult, ResultExt};
use crate::layer::{
    extract, ArchiveFormat, ContributionOutcome, Layer, LayerContributor, LayerTypes, Layers,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const NIK_LAYER: &str = "nik";

#[derive(Debug, Clone)]
pub struct NikContributor {
    pub native_dependency: Dependency,

    /// JDK the installer runs from
    pub jdk_dependency: Dependency,

    /// Installed location of the JDK
    pub jdk_home: PathBuf,

    /// Installer path relative to the JDK home
    pub custom_command: String,
    pub custom_args: Vec<String>,

    pub certificate_loader: CertificateLoader,
}

impl NikContributor {
    /// Fails when no installer command is configured
    pub fn new(
        native_dependency: Dependency,
        jdk_dependency: Dependency,
        jdk_home: impl Into<PathBuf>,
        custom_command: impl Into<String>,
        custom_args: Vec<String>,
        certificate_loader: CertificateLoader,
    ) -> JvmResult<Self> {
        let custom_command = custom_command.into();
        if custom_command.trim().is_empty() {
            return Err(JvmError::CustomCommandMissing);
        }

        Ok(Self {
            native_dependency,
            jdk_dependency,
            jdk_home: jdk_home.into(),
            custom_command,
            custom_args,
            certificate_loader,
        })
    }

    pub fn name(&self) -> &str {
        NIK_LAYER
    }

    /// The JDK's own fingerprint plus the native dependency and installer
    /// invocation, so a change to either layer invalidates this one.
    pub fn layer_contributor(&self) -> JvmResult<LayerContributor> {
        let mut metadata = runtime_metadata(&self.jdk_dependency, &self.certificate_loader)?;
        metadata.insert(
            "native-dependency".to_string(),
            toml::Value::try_from(&self.native_dependency)?,
        );
        metadata.insert(
            "custom-command".to_string(),
            self.custom_command.as_str().into(),
        );
        metadata.insert(
            "custom-args".to_string(),
            toml::Value::Array(
                self.custom_args
                    .iter()
                    .map(|a| a.as_str().into())
                    .collect(),
            ),
        );

        Ok(LayerContributor::new(
            NIK_LAYER,
            metadata,
            LayerTypes {
                build: true,
                cache: true,
                launch: false,
            },
        ))
    }

    pub fn contribute(
        &self,
        layers: &Layers,
        cache: &dyn DependencyCache,
    ) -> JvmResult<(Layer, ContributionOutcome)> {
        self.layer_contributor()?.contribute(layers, |layer| {
            let artifact = cache.artifact(&self.native_dependency)?;
            let installable = self
                .stage(&artifact, &layer.path)
                .context("unable to stage native image")?;
            self.install(&installable)
                .context("unable to install native image")
        })
    }

    /// Expand archives into the layer; copy anything else as-is
    fn stage(&self, artifact: &Path, dest: &Path) -> JvmResult<PathBuf> {
        if let Some(format) = ArchiveFormat::from_uri(&self.native_dependency.uri) {
            extract(artifact, format, dest, 1)?;
            return Ok(dest.to_path_buf());
        }

        let target = dest.join(artifact_file_name(&self.native_dependency.uri));
        fs::copy(artifact, &target).map_err(|e| {
            JvmError::io(
                format!("copying {} to {}", artifact.display(), target.display()),
                e,
            )
        })?;
        Ok(target)
    }

    fn install(&self, installable: &Path) -> JvmResult<()> {
        let program = self
            .jdk_home
            .join(self.custom_command.trim().trim_start_matches('/'));
        let invocation = format!(
            "{} {} {}",
            program.display(),
            self.custom_args.join(" "),
            installable.display()
        );

        info!("Installing native image: {}", invocation);
        let output = Command::new(&program)
            .args(&self.custom_args)
            .arg(installable)
            .output()
            .map_err(|e| JvmError::command_failed(&invocation, e))?;

        debug!("{}", String::from_utf8_lossy(&output.stdout).trim_end());
        if !output.status.success() {
            return Err(JvmError::command_exec(
                invocation,
                String::from_utf8_lossy(&output.stderr).trim_end(),
            ));
        }
        Ok(())
    }
}
