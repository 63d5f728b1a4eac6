//! Build phase planning
//!
//! Turns the resolved build plan, the buildpack descriptor and the
//! environment snapshot into an ordered list of [`Contributor`]s:
//! runtime contributors first, then `helper` and `java-security-properties`
//! when a JRE is contributed for launch.

use crate::certs::{CertificateLoader, SSL_CERT_DIR};
use crate::config::{BuildpackDescriptor, ConfigurationResolver, Env, NativeImage};
use crate::dependency::{Dependency, DependencyCache, DependencyResolver};
use crate::error::{JvmError, JvmResult, ResultExt};
use crate::jvm::{
    helper_names, Contribution, ContributedLayer, Contributor, DistributionType, HelperContributor,
    JavaSecurityPropertiesContributor, JdkContributor, JreContributor, NikContributor,
};
use crate::layer::Layers;
use crate::vendor::{load_jvm_vendors, JvmType, VendorSelection};
use crate::version::lenient_semver;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PLAN_ENTRY_JDK: &str = "jdk";
pub const PLAN_ENTRY_JRE: &str = "jre";
pub const PLAN_ENTRY_NATIVE_IMAGE_BUILDER: &str = "native-image-builder";

/// One entry of the resolved buildpack plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlanEntry {
    pub name: String,

    #[serde(default)]
    pub metadata: toml::Table,
}

impl BuildPlanEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: toml::Table::new(),
        }
    }

    /// Set a metadata flag such as `build` or `launch`
    pub fn with(mut self, key: &str, value: bool) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Entries the platform resolved for this buildpack (`plan.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub entries: Vec<BuildPlanEntry>,
}

impl BuildPlan {
    pub fn new(entries: Vec<BuildPlanEntry>) -> Self {
        Self { entries }
    }

    pub fn parse(content: &str) -> JvmResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> JvmResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content).context(format!("unable to parse {}", path.display()))
    }

    /// Merge every entry with `name`; boolean flags are or'ed together
    pub fn resolve(&self, name: &str) -> Option<BuildPlanEntry> {
        let mut matching = self.entries.iter().filter(|e| e.name == name);
        let mut merged = matching.next()?.clone();

        for entry in matching {
            for (key, value) in &entry.metadata {
                match (merged.metadata.get(key), value) {
                    (Some(toml::Value::Boolean(a)), toml::Value::Boolean(b)) => {
                        let combined = *a || *b;
                        merged.metadata.insert(key.clone(), combined.into());
                    }
                    _ => {
                        merged.metadata.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Some(merged)
    }
}

/// Everything a build needs, passed explicitly instead of read from the process
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub application_path: PathBuf,
    pub buildpack: BuildpackDescriptor,

    /// Installed buildpack; `bin/helper` is read from here
    pub buildpack_path: PathBuf,

    pub layers_path: PathBuf,
    pub plan: BuildPlan,
    pub stack_id: String,
    pub env: Env,
}

/// Software bill of materials entry for a contributed runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BomEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpes: Vec<String>,
    pub build: bool,
    pub launch: bool,
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Ordered; consumers rely on positions
    pub contributors: Vec<Contributor>,
    pub bom: Vec<BomEntry>,
}

impl BuildResult {
    /// Contribute every layer in order, stopping at the first failure
    pub fn contribute(
        &self,
        layers: &Layers,
        cache: &dyn DependencyCache,
    ) -> JvmResult<Vec<ContributedLayer>> {
        self.contributors
            .iter()
            .map(|c| {
                c.contribute(layers, cache)
                    .context(format!("unable to contribute {}", c.name()))
            })
            .collect()
    }
}

/// Buildpack API 0.7 introduced JDK-as-JRE substitution; an unversioned
/// descriptor gets current behaviour.
pub fn supports_jre_fallback(api: &str) -> bool {
    lenient_semver(api).is_none_or(|v| v >= semver::Version::new(0, 7, 0))
}

/// Plan the contributors for one build
pub fn build(ctx: &BuildContext) -> JvmResult<BuildResult> {
    let metadata = &ctx.buildpack.metadata;
    let cr = ConfigurationResolver::new(metadata.configurations.clone(), ctx.env.clone());
    cr.log_build_configuration();

    let selection = load_jvm_vendors(&cr)
        .and_then(|candidates| VendorSelection::load(candidates, &cr, &ctx.application_path))
        .context("unable to load JVM vendors")?;

    let planner = Planner {
        ctx,
        selection: &selection,
        resolver: DependencyResolver::new(&metadata.dependencies, ctx.stack_id.as_str()),
        certificate_loader: CertificateLoader::from_env(cr.env(SSL_CERT_DIR)),
    };
    let contributors = planner.plan(PlanRequest::from_plan(&ctx.plan))?;

    let bom = contributors
        .iter()
        .filter_map(|c| c.dependency().map(|d| bom_entry(d, c)))
        .collect();

    debug!(
        "Planned contributors: {}",
        contributors
            .iter()
            .map(Contributor::name)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(BuildResult { contributors, bom })
}

fn bom_entry(dependency: &Dependency, contributor: &Contributor) -> BomEntry {
    let types = contributor.layer_types();
    BomEntry {
        id: dependency.id.clone(),
        name: dependency.display_name().to_string(),
        version: dependency.version.clone(),
        purl: dependency.purl.clone(),
        cpes: dependency.cpes.clone(),
        build: types.build,
        launch: types.launch,
    }
}

/// The slots a plan asks for, with their contribution intent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlanRequest {
    jdk: Option<Contribution>,
    jre: Option<Contribution>,
    native_image: bool,
}

impl PlanRequest {
    fn from_plan(plan: &BuildPlan) -> Self {
        let contribution =
            |name: &str| plan.resolve(name).map(|e| Contribution::from_metadata(&e.metadata));
        Self {
            jdk: contribution(PLAN_ENTRY_JDK),
            jre: contribution(PLAN_ENTRY_JRE),
            native_image: plan.resolve(PLAN_ENTRY_NATIVE_IMAGE_BUILDER).is_some(),
        }
    }
}

struct Planner<'a> {
    ctx: &'a BuildContext,
    selection: &'a VendorSelection,
    resolver: DependencyResolver<'a>,
    certificate_loader: CertificateLoader,
}

impl Planner<'_> {
    fn resolve(&self, id: &str) -> JvmResult<Dependency> {
        self.resolver.resolve(id, self.selection.version.as_deref())
    }

    fn plan(&self, request: PlanRequest) -> JvmResult<Vec<Contributor>> {
        let native_image = self
            .ctx
            .buildpack
            .metadata
            .native_image
            .clone()
            .unwrap_or_default();

        if request.native_image && native_image.bundled_with_jdk {
            let dependency = self.resolve(&self.selection.native_image_id())?;
            info!("Native image is bundled with {}", dependency.id);
            return Ok(vec![Contributor::Jdk(JdkContributor::new(
                dependency,
                self.certificate_loader.clone(),
            ))]);
        }

        let separate_native_image = request.native_image;
        if separate_native_image && native_image.custom_command.trim().is_empty() {
            return Err(JvmError::CustomCommandMissing);
        }

        let requested_type = self.selection.requested_type;
        let jdk = request.jdk.or_else(|| {
            (requested_type == Some(JvmType::Jdk) || separate_native_image)
                .then_some(Contribution::BUILD)
        });
        let jre = request
            .jre
            .or_else(|| (requested_type == Some(JvmType::Jre)).then_some(Contribution::LAUNCH));

        let mut contributors = self.runtime_contributors(jdk, jre, requested_type)?;

        if separate_native_image {
            contributors.push(self.nik_contributor(&contributors, &native_image)?);
        }

        let launch_version = contributors.iter().find_map(|c| match c {
            Contributor::Jre(j) if j.contribution.launch => Some(j.dependency.version.clone()),
            _ => None,
        });
        if let Some(version) = launch_version {
            contributors.push(Contributor::Helper(HelperContributor::new(
                &self.ctx.buildpack_path,
                helper_names(&version),
            )));
            contributors.push(Contributor::JavaSecurityProperties(
                JavaSecurityPropertiesContributor,
            ));
        }

        Ok(contributors)
    }

    fn runtime_contributors(
        &self,
        jdk: Option<Contribution>,
        jre: Option<Contribution>,
        requested_type: Option<JvmType>,
    ) -> JvmResult<Vec<Contributor>> {
        let mut contributors = Vec::new();

        let Some(jre) = jre else {
            if jdk.is_some() {
                contributors.push(self.jdk_contributor()?);
            }
            return Ok(contributors);
        };

        if requested_type == Some(JvmType::Jdk) {
            let dependency = self.resolve(&self.selection.jdk_id())?;
            contributors.push(self.jdk_as_jre(dependency, jre, jdk));
            return Ok(contributors);
        }

        match self.resolve(&self.selection.jre_id()) {
            Ok(dependency) => {
                if jdk.is_some() {
                    contributors.push(self.jdk_contributor()?);
                }
                contributors.push(Contributor::Jre(JreContributor::new(
                    &self.ctx.application_path,
                    dependency,
                    DistributionType::Jre,
                    jre,
                    self.certificate_loader.clone(),
                )));
            }
            Err(e)
                if e.is_no_valid_dependencies()
                    && requested_type.is_none()
                    && supports_jre_fallback(&self.ctx.buildpack.api) =>
            {
                let dependency = self.resolve(&self.selection.jdk_id())?;
                info!(
                    "No JRE available for {}, using {} {} instead",
                    self.selection.vendor, dependency.id, dependency.version
                );
                contributors.push(self.jdk_as_jre(dependency, jre, jdk));
            }
            Err(e) => return Err(e),
        }
        Ok(contributors)
    }

    fn jdk_contributor(&self) -> JvmResult<Contributor> {
        let dependency = self.resolve(&self.selection.jdk_id())?;
        Ok(Contributor::Jdk(JdkContributor::new(
            dependency,
            self.certificate_loader.clone(),
        )))
    }

    /// A JDK installed in the JRE role; also covers the JDK slot when requested
    fn jdk_as_jre(
        &self,
        dependency: Dependency,
        jre: Contribution,
        jdk: Option<Contribution>,
    ) -> Contributor {
        let contribution = jdk.map_or(jre, |jdk| jre.union(jdk));
        let contributor = JreContributor::new(
            &self.ctx.application_path,
            dependency,
            DistributionType::Jdk,
            contribution,
            self.certificate_loader.clone(),
        );

        Contributor::Jre(if jdk.is_some() {
            contributor.providing_jdk()
        } else {
            contributor
        })
    }

    fn nik_contributor(
        &self,
        runtime: &[Contributor],
        native_image: &NativeImage,
    ) -> JvmResult<Contributor> {
        let jdk = runtime.iter().find_map(|c| match c {
            Contributor::Jdk(j) => Some(j.dependency.clone()),
            Contributor::Jre(j) if j.provides_jdk => Some(j.dependency.clone()),
            _ => None,
        });
        let jdk = match jdk {
            Some(dependency) => dependency,
            None => self.resolve(&self.selection.jdk_id())?,
        };
        let native = self.resolve(&self.selection.native_image_id())?;
        let jdk_home = self.ctx.layers_path.join(&jdk.id);

        Ok(Contributor::Nik(NikContributor::new(
            native,
            jdk,
            jdk_home,
            native_image.custom_command.as_str(),
            native_image.custom_args.clone(),
            self.certificate_loader.clone(),
        )?))
    }
}
