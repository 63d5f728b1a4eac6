//! Java version policy
//!
//! Catalog versions are loosely formatted (`8.0.392`, `1.8.0_292`, `17`,
//! `21.0.1+12`). Everything here is total: malformed input never fails,
//! it just falls into the "modern" bucket.

use semver::Version;
use std::cmp::Ordering;

/// Major version at which the installation layout changed
pub const JAVA_9: u64 = 9;

/// Extract the normalized major version from a version string.
///
/// Legacy `1.x` versions report `x` (`1.8.0_292` is Java 8).
pub fn major_version(version: &str) -> Option<u64> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    let mut components = version.split(|c: char| !c.is_ascii_digit());

    let major: u64 = components.next()?.parse().ok()?;
    if major == 1 {
        if let Some(minor) = components.next().and_then(|m| m.parse::<u64>().ok()) {
            if minor > 1 && minor < JAVA_9 {
                return Some(minor);
            }
        }
    }
    Some(major)
}

/// Whether the runtime predates the Java 9 module system layout
pub fn is_before_java9(version: &str) -> bool {
    major_version(version).is_some_and(|major| major < JAVA_9)
}

/// Parse a catalog version as semver, padding missing components.
///
/// `17` becomes `17.0.0`, `1.8.0_292` becomes `1.8.0+292`.
pub fn lenient_semver(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    if version.is_empty() {
        return None;
    }

    let normalized = version.replacen('_', "+", 1);
    let split = normalized.find(['-', '+']).unwrap_or(normalized.len());
    let (core, rest) = normalized.split_at(split);

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), rest)).ok()
}

/// Order two catalog versions: semver where both parse, lexical otherwise
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (lenient_semver(a), lenient_semver(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Whether `version` satisfies an explicit version constraint.
///
/// A complete version (three components) must match exactly; a partial
/// one (`17`, `17.0`) matches every version sharing its leading components.
pub fn matches_constraint(version: &str, constraint: &str) -> bool {
    let constraint = constraint.trim();
    if version == constraint {
        return true;
    }

    let components: Vec<&str> = constraint.split('.').collect();
    if components.len() >= 3 || components.iter().any(|c| c.parse::<u64>().is_err()) {
        return false;
    }

    match lenient_semver(version) {
        Some(v) => {
            let actual = [v.major, v.minor];
            components
                .iter()
                .zip(actual.iter())
                .all(|(c, a)| c.parse::<u64>().ok() == Some(*a))
        }
        None => false,
    }
}
