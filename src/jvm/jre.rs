//! JRE contributor
//!
//! Installs the runtime an application launches with. The same contributor
//! also serves when a JDK distribution stands in for a missing JRE, in which
//! case it may additionally satisfy the build-time JDK slot.

use super::{
    cacerts_path, expand_dependency, runtime_metadata, security_root, Contribution,
};
use crate::certs::{CertificateLoader, DEFAULT_KEYSTORE_PASSWORD};
use crate::dependency::{Dependency, DependencyCache};
use crate::error::{JvmError, JvmResult, ResultExt};
use crate::layer::{ContributionOutcome, Layer, LayerContributor, LayerTypes, Layers};
use crate::version::is_before_java9;
use std::fs;
use std::path::{Path, PathBuf};

/// Which distribution is installed in the JRE role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionType {
    Jdk,
    Jre,
}

#[derive(Debug, Clone)]
pub struct JreContributor {
    pub application_path: PathBuf,
    pub dependency: Dependency,
    pub distribution: DistributionType,
    pub contribution: Contribution,

    /// The runtime also serves as the build-time JDK
    pub provides_jdk: bool,

    pub certificate_loader: CertificateLoader,
}

impl JreContributor {
    pub fn new(
        application_path: impl Into<PathBuf>,
        dependency: Dependency,
        distribution: DistributionType,
        contribution: Contribution,
        certificate_loader: CertificateLoader,
    ) -> Self {
        Self {
            application_path: application_path.into(),
            dependency,
            distribution,
            contribution,
            provides_jdk: false,
            certificate_loader,
        }
    }

    /// Mark this runtime as also satisfying the JDK slot
    pub fn providing_jdk(mut self) -> Self {
        self.provides_jdk = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.dependency.id
    }

    pub fn layer_types(&self) -> LayerTypes {
        let build = self.contribution.build || self.provides_jdk;
        LayerTypes {
            build,
            cache: build,
            launch: self.contribution.launch,
        }
    }

    pub fn layer_contributor(&self) -> JvmResult<LayerContributor> {
        Ok(LayerContributor::new(
            self.name(),
            runtime_metadata(&self.dependency, &self.certificate_loader)?,
            self.layer_types(),
        ))
    }

    pub fn contribute(
        &self,
        layers: &Layers,
        cache: &dyn DependencyCache,
    ) -> JvmResult<(Layer, ContributionOutcome)> {
        self.layer_contributor()?.contribute(layers, |layer| {
            expand_dependency(&self.dependency, cache, layer).context("unable to expand JRE")?;

            let version = &self.dependency.version;
            let home = layer.path.to_string_lossy().into_owned();
            let root = security_root(&layer.path, version, self.distribution);
            let cacerts = cacerts_path(&root);

            self.certificate_loader
                .load(&cacerts, DEFAULT_KEYSTORE_PASSWORD)
                .context("unable to load certificates")?;

            if self.provides_jdk {
                layer.build_env.override_value("JAVA_HOME", home.as_str());
                layer.build_env.override_value("JDK_HOME", home.as_str());
            } else if self.contribution.build {
                layer.build_env.default_value("JAVA_HOME", home.as_str());
            }

            if self.contribution.launch {
                let env = &mut layer.launch_env;
                env.default_value(
                    "BPI_APPLICATION_PATH",
                    self.application_path.to_string_lossy(),
                );
                env.default_value("BPI_JVM_CACERTS", cacerts.to_string_lossy());
                env.default_value("BPI_JVM_CLASS_COUNT", "0");

                if is_before_java9(version) {
                    let ext = root.join("lib").join("ext");
                    env.default_value("BPI_JVM_EXT_DIR", ext.to_string_lossy());
                }

                let providers = read_security_providers(&java_security_path(
                    &layer.path,
                    &root,
                    version,
                ))?;
                env.default_value("BPI_JVM_SECURITY_PROVIDERS", providers);

                env.default_value("JAVA_HOME", home.as_str());
                env.default_value("MALLOC_ARENA_MAX", "2");
                env.append("JAVA_TOOL_OPTIONS", " ", "-XX:+ExitOnOutOfMemoryError");
            }
            Ok(())
        })
    }
}

/// `java.security` moved from `lib/security` to `conf/security` in Java 9
fn java_security_path(home: &Path, security_root: &Path, version: &str) -> PathBuf {
    if is_before_java9(version) {
        security_root.join("lib").join("security").join("java.security")
    } else {
        home.join("conf").join("security").join("java.security")
    }
}

fn read_security_providers(path: &Path) -> JvmResult<String> {
    let content = fs::read_to_string(path)
        .map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
    Ok(security_providers(&content))
}

/// Format `security.provider.N=Name` properties as `N|Name`, ordered by N
pub fn security_providers(properties: &str) -> String {
    let mut providers: Vec<(u32, &str)> = properties
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let (key, value) = line.split_once(['=', ':'])?;
            let index = key.trim().strip_prefix("security.provider.")?.parse().ok()?;
            Some((index, value.trim()))
        })
        .collect();
    providers.sort_by_key(|(index, _)| *index);

    providers
        .iter()
        .map(|(index, name)| format!("{}|{}", index, name))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::{Keystore, CERT_DIR_METADATA_KEY};
    use crate::dependency::LocalDependencyCache;
    use crate::test_support::{cache_runtime, write_cert_dir};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        cache: LocalDependencyCache,
        layers: Layers,
        loader: CertificateLoader,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let certs = write_cert_dir(temp.path(), &["one", "two"]);
            Self {
                cache: LocalDependencyCache::new(temp.path().join("cache")),
                layers: Layers::new(temp.path().join("layers")),
                loader: CertificateLoader::new(vec![certs]),
                temp,
            }
        }

        fn app(&self) -> PathBuf {
            self.temp.path().join("application")
        }

        fn jre(
            &self,
            id: &str,
            version: &str,
            security: &str,
            distribution: DistributionType,
            contribution: Contribution,
        ) -> JreContributor {
            let dep = cache_runtime(&self.temp.path().join("cache"), id, version, security);
            JreContributor::new(self.app(), dep, distribution, contribution, self.loader.clone())
        }
    }

    fn path(p: &Path) -> String {
        p.to_string_lossy().into_owned()
    }

    #[test]
    fn contributes_jre_without_contribution() {
        let f = Fixture::new();
        let jre = f.jre("jre-corretto", "11.0.0", "", DistributionType::Jre, Contribution::default());

        let expected = jre.layer_contributor().unwrap().expected_metadata;
        assert_eq!(expected[CERT_DIR_METADATA_KEY].as_array().unwrap().len(), 2);

        let (layer, _) = jre.contribute(&f.layers, &f.cache).unwrap();
        assert!(layer.path.join("fixture-marker").is_file());
        assert_eq!(layer.types, LayerTypes::default());
        assert!(layer.launch_env.is_empty());
    }

    #[test]
    fn updates_jre_certificates() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jre-corretto", "11.0.0", "", DistributionType::Jre, Contribution::default())
            .contribute(&f.layers, &f.cache)
            .unwrap();

        let ks = Keystore::load(&layer.path.join("lib/security/cacerts"), "changeit").unwrap();
        assert_eq!(ks.len(), 3);
    }

    #[test]
    fn updates_pre_java9_jdk_certificates() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jdk-corretto", "8.0.0", "jre", DistributionType::Jdk, Contribution::default())
            .contribute(&f.layers, &f.cache)
            .unwrap();

        let ks =
            Keystore::load(&layer.path.join("jre/lib/security/cacerts"), "changeit").unwrap();
        assert_eq!(ks.len(), 3);
    }

    #[test]
    fn marks_layer_for_build() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jre-corretto", "11.0.0", "", DistributionType::Jre, Contribution::BUILD)
            .contribute(&f.layers, &f.cache)
            .unwrap();

        assert!(layer.types.build);
        assert!(layer.types.cache);
        assert_eq!(
            layer.build_env.get("JAVA_HOME.default"),
            Some(path(&layer.path).as_str())
        );
        assert_eq!(layer.build_env.get("JDK_HOME.override"), None);
    }

    #[test]
    fn marks_pre_java9_jre_for_launch() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jre-corretto", "8.0.0", "", DistributionType::Jre, Contribution::LAUNCH)
            .contribute(&f.layers, &f.cache)
            .unwrap();

        let env = &layer.launch_env;
        assert!(layer.types.launch);
        assert_eq!(
            env.get("BPI_APPLICATION_PATH.default"),
            Some(path(&f.app()).as_str())
        );
        assert_eq!(
            env.get("BPI_JVM_CACERTS.default"),
            Some(path(&layer.path.join("lib/security/cacerts")).as_str())
        );
        assert_eq!(env.get("BPI_JVM_CLASS_COUNT.default"), Some("0"));
        assert_eq!(
            env.get("BPI_JVM_EXT_DIR.default"),
            Some(path(&layer.path.join("lib/ext")).as_str())
        );
        assert_eq!(env.get("BPI_JVM_SECURITY_PROVIDERS.default"), Some("1|ALPHA"));
        assert_eq!(env.get("JAVA_HOME.default"), Some(path(&layer.path).as_str()));
        assert_eq!(env.get("MALLOC_ARENA_MAX.default"), Some("2"));
        assert_eq!(env.get("JAVA_TOOL_OPTIONS.delim"), Some(" "));
        assert_eq!(
            env.get("JAVA_TOOL_OPTIONS.append"),
            Some("-XX:+ExitOnOutOfMemoryError")
        );
    }

    #[test]
    fn marks_post_java9_jre_for_launch() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jre-corretto", "11.0.0", "", DistributionType::Jre, Contribution::LAUNCH)
            .contribute(&f.layers, &f.cache)
            .unwrap();

        let env = &layer.launch_env;
        assert_eq!(
            env.get("BPI_JVM_CACERTS.default"),
            Some(path(&layer.path.join("lib/security/cacerts")).as_str())
        );
        assert_eq!(env.get("BPI_JVM_EXT_DIR.default"), None);
        assert_eq!(env.get("BPI_JVM_SECURITY_PROVIDERS.default"), Some("1|ALPHA"));
        assert_eq!(env.get("JAVA_HOME.default"), Some(path(&layer.path).as_str()));
    }

    #[test]
    fn marks_pre_java9_jdk_for_launch() {
        let f = Fixture::new();
        let (layer, _) = f
            .jre("jdk-corretto", "8.0.0", "jre", DistributionType::Jdk, Contribution::LAUNCH)
            .contribute(&f.layers, &f.cache)
            .unwrap();

        let env = &layer.launch_env;
        assert_eq!(
            env.get("BPI_JVM_CACERTS.default"),
            Some(path(&layer.path.join("jre/lib/security/cacerts")).as_str())
        );
        assert_eq!(
            env.get("BPI_JVM_EXT_DIR.default"),
            Some(path(&layer.path.join("jre/lib/ext")).as_str())
        );
        assert_eq!(env.get("BPI_JVM_SECURITY_PROVIDERS.default"), Some("1|ALPHA"));
    }

    #[test]
    fn jdk_standing_in_for_both_roles() {
        let f = Fixture::new();
        let jre = f
            .jre("jdk-corretto", "17.0.2", "", DistributionType::Jdk, Contribution::LAUNCH)
            .providing_jdk();

        let (layer, _) = jre.contribute(&f.layers, &f.cache).unwrap();
        assert_eq!(
            layer.types,
            LayerTypes {
                build: true,
                cache: true,
                launch: true
            }
        );
        let home = path(&layer.path);
        assert_eq!(layer.build_env.get("JAVA_HOME.override"), Some(home.as_str()));
        assert_eq!(layer.build_env.get("JDK_HOME.override"), Some(home.as_str()));
        assert_eq!(layer.launch_env.get("JAVA_HOME.default"), Some(home.as_str()));
    }

    #[test]
    fn parses_security_providers() {
        let properties = "\
# comment
security.provider.2=SunRsaSign
security.provider.1 = SUN
security.provider.10=SunPKCS11
securerandom.source=file:/dev/random
";
        assert_eq!(
            security_providers(properties),
            "1|SUN 2|SunRsaSign 10|SunPKCS11"
        );
        assert_eq!(security_providers(""), "");
    }
}
