//! Dependency catalog and resolution
//!
//! The catalog comes from `[[metadata.dependencies]]` in `buildpack.toml`.
//! Resolution picks exactly one entry for an id, a stack and an optional
//! version constraint.

pub mod cache;

pub use cache::{DependencyCache, LocalDependencyCache};

use crate::error::{JvmError, JvmResult};
use crate::version::{compare_versions, matches_constraint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Stack wildcard accepted by every platform
pub const ANY_STACK: &str = "*";

/// A downloadable dependency from the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Dependency {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub sha256: String,

    #[serde(default)]
    pub stacks: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,

    #[serde(
        default,
        rename = "deprecation_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecation_date: Option<toml::value::Datetime>,
}

/// License of a dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Dependency {
    /// Create a catalog entry with the fields resolution cares about
    pub fn new(id: impl Into<String>, version: impl Into<String>, stacks: &[&str]) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            stacks: stacks.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Whether this dependency can be installed on a stack
    pub fn supports_stack(&self, stack: &str) -> bool {
        stack.is_empty() || self.stacks.iter().any(|s| s == stack || s == ANY_STACK)
    }

    /// Human-readable name, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Resolves catalog entries for one stack
#[derive(Debug, Clone)]
pub struct DependencyResolver<'a> {
    dependencies: &'a [Dependency],
    stack: String,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(dependencies: &'a [Dependency], stack: impl Into<String>) -> Self {
        Self {
            dependencies,
            stack: stack.into(),
        }
    }

    /// Select the best matching dependency.
    ///
    /// Filters by id and stack, then by `version` when given, and returns
    /// the highest remaining version. Exact ties keep catalog order.
    pub fn resolve(&self, id: &str, version: Option<&str>) -> JvmResult<Dependency> {
        let mut best: Option<&Dependency> = None;

        for candidate in self
            .dependencies
            .iter()
            .filter(|d| d.id == id && d.supports_stack(&self.stack))
            .filter(|d| version.is_none_or(|v| matches_constraint(&d.version, v)))
        {
            best = match best {
                Some(current)
                    if compare_versions(&candidate.version, &current.version)
                        != Ordering::Greater =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }

        match best {
            Some(dependency) => {
                debug!(
                    "Resolved {} {} for stack {:?}",
                    dependency.id, dependency.version, self.stack
                );
                Ok(dependency.clone())
            }
            None => Err(JvmError::NoValidDependencies {
                id: id.to_string(),
                version: version.unwrap_or("*").to_string(),
                stack: self.stack.clone(),
                candidates: self
                    .dependencies
                    .iter()
                    .map(|d| format!("({}, {}, {:?})", d.id, d.version, d.stacks))
                    .collect(),
            }),
        }
    }
}
