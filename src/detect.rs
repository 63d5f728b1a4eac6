//! Detect phase
//!
//! Offers the fixed set of build plan alternatives. Order matters: the
//! lifecycle picks the first alternative whose requirements are met.

use crate::build::{PLAN_ENTRY_JDK, PLAN_ENTRY_JRE, PLAN_ENTRY_NATIVE_IMAGE_BUILDER};
use crate::config::{Configuration, ConfigurationResolver, Env};
use crate::error::{JvmResult, ResultExt};
use crate::vendor::{load_jvm_vendors, BP_JVM_VENDOR};
use serde::Serialize;
use tracing::info;

/// Exit code the lifecycle treats as "did not detect"
pub const DETECT_FAIL_EXIT_CODE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provide {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Require {
    pub name: String,
}

/// One provides/requires alternative
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildPlanAlternative {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provide>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
}

impl BuildPlanAlternative {
    fn new(provides: &[&str], requires: &[&str]) -> Self {
        Self {
            provides: provides
                .iter()
                .map(|n| Provide {
                    name: n.to_string(),
                })
                .collect(),
            requires: requires
                .iter()
                .map(|n| Require {
                    name: n.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectResult {
    pub pass: bool,
    pub plans: Vec<BuildPlanAlternative>,
}

/// `plan.toml` layout: the first alternative at the top level, the rest under `or`
#[derive(Serialize)]
struct PlanDocument<'a> {
    #[serde(flatten)]
    primary: &'a BuildPlanAlternative,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    or: Vec<&'a BuildPlanAlternative>,
}

impl DetectResult {
    pub fn fail() -> Self {
        Self::default()
    }

    /// Render the plan alternatives as build plan TOML
    pub fn to_toml(&self) -> JvmResult<String> {
        let Some((primary, or)) = self.plans.split_first() else {
            return Ok(String::new());
        };
        Ok(toml::to_string(&PlanDocument {
            primary,
            or: or.iter().collect(),
        })?)
    }
}

/// Alternatives offered when detection passes, most capable first
pub fn plan_alternatives() -> Vec<BuildPlanAlternative> {
    vec![
        BuildPlanAlternative::new(
            &[PLAN_ENTRY_JDK, PLAN_ENTRY_NATIVE_IMAGE_BUILDER, PLAN_ENTRY_JRE],
            &[PLAN_ENTRY_JDK],
        ),
        BuildPlanAlternative::new(
            &[PLAN_ENTRY_JDK, PLAN_ENTRY_NATIVE_IMAGE_BUILDER],
            &[PLAN_ENTRY_JDK],
        ),
        BuildPlanAlternative::new(&[PLAN_ENTRY_JDK, PLAN_ENTRY_JRE], &[]),
        BuildPlanAlternative::new(&[PLAN_ENTRY_JDK], &[]),
        BuildPlanAlternative::new(&[PLAN_ENTRY_JRE], &[]),
    ]
}

pub fn detect(configurations: &[Configuration], env: &Env) -> JvmResult<DetectResult> {
    let cr = ConfigurationResolver::new(configurations.to_vec(), env.clone());
    let vendors = load_jvm_vendors(&cr).context("unable to load JVM vendors")?;

    let vendor = cr.value(BP_JVM_VENDOR);
    let vendor = vendor.trim();
    if !vendor.is_empty() && !vendors.iter().any(|v| v == vendor) {
        info!(
            "{} {} is not one of the supported vendors: {}",
            BP_JVM_VENDOR,
            vendor,
            vendors.join(", ")
        );
        return Ok(DetectResult::fail());
    }

    Ok(DetectResult {
        pass: true,
        plans: plan_alternatives(),
    })
}
