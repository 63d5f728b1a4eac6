//! jvm-vendors - Java runtime buildpack
//!
//! Selects a JDK, JRE or native-image toolchain for a build, installs it
//! into cacheable layers and merges operator certificates into its
//! trust-store.

pub mod build;
pub mod certs;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod detect;
pub mod error;
pub mod helper;
pub mod jvm;
pub mod layer;
pub mod vendor;
pub mod version;

#[cfg(test)]
mod test_support;

pub use error::{JvmError, JvmResult};
