//! `java-security-properties` layer
//!
//! Provides a writable properties file that launch-time helpers append
//! security overrides to.

use crate::error::{JvmError, JvmResult};
use crate::layer::{ContributionOutcome, Layer, LayerContributor, LayerMetadata, LayerTypes, Layers};
use std::fs;

pub const JAVA_SECURITY_PROPERTIES_LAYER: &str = "java-security-properties";

const PROPERTIES_FILE: &str = "java-security.properties";

#[derive(Debug, Clone, Default)]
pub struct JavaSecurityPropertiesContributor;

impl JavaSecurityPropertiesContributor {
    pub fn name(&self) -> &str {
        JAVA_SECURITY_PROPERTIES_LAYER
    }

    pub fn contribute(&self, layers: &Layers) -> JvmResult<(Layer, ContributionOutcome)> {
        let contributor = LayerContributor::new(
            JAVA_SECURITY_PROPERTIES_LAYER,
            LayerMetadata::new(),
            LayerTypes {
                build: false,
                cache: false,
                launch: true,
            },
        );

        contributor.contribute(layers, |layer| {
            let file = layer.path.join(PROPERTIES_FILE);
            fs::write(&file, "")
                .map_err(|e| JvmError::io(format!("writing {}", file.display()), e))?;

            let file = file.to_string_lossy().into_owned();
            layer
                .launch_env
                .default_value("JAVA_SECURITY_PROPERTIES", file.as_str());
            layer.launch_env.append(
                "JAVA_TOOL_OPTIONS",
                " ",
                format!("-Djava.security.properties={}", file),
            );
            Ok(())
        })
    }
}
