//! Trust-store format dispatch
//!
//! Runtimes up to Java 17 ship `cacerts` as JKS, later ones as PKCS#12.
//! A store is always written back in the format it was read in.

use super::keystore::{Certificate, Keystore, KeystoreEntry};
use super::pkcs12::{Pkcs12Entry, Pkcs12Store};
use crate::error::{JvmError, JvmResult};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Jks,
    Pkcs12,
}

impl StoreFormat {
    /// PKCS#12 files open with a DER SEQUENCE, anything else is read as JKS
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.first() {
            Some(0x30) => Self::Pkcs12,
            _ => Self::Jks,
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jks => write!(f, "JKS"),
            Self::Pkcs12 => write!(f, "PKCS#12"),
        }
    }
}

/// What an alias currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredEntry<'a> {
    TrustedCertificate(&'a [u8]),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustStore {
    Jks(Keystore),
    Pkcs12(Pkcs12Store),
}

impl TrustStore {
    pub fn load(path: &Path, password: &str) -> JvmResult<Self> {
        let bytes =
            fs::read(path).map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
        Self::decode(&bytes, password).map_err(|reason| JvmError::Keystore {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn decode(bytes: &[u8], password: &str) -> Result<Self, String> {
        match StoreFormat::detect(bytes) {
            StoreFormat::Jks => Keystore::decode(bytes, password).map(Self::Jks),
            StoreFormat::Pkcs12 => Pkcs12Store::decode(bytes, password).map(Self::Pkcs12),
        }
    }

    pub fn format(&self) -> StoreFormat {
        match self {
            Self::Jks(_) => StoreFormat::Jks,
            Self::Pkcs12(_) => StoreFormat::Pkcs12,
        }
    }

    pub fn aliases(&self) -> Vec<&str> {
        match self {
            Self::Jks(ks) => ks.aliases().collect(),
            Self::Pkcs12(ks) => ks.aliases().collect(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<StoredEntry<'_>> {
        match self {
            Self::Jks(ks) => ks.get(alias).map(|entry| match entry {
                KeystoreEntry::TrustedCertificate { certificate, .. } => {
                    StoredEntry::TrustedCertificate(&certificate.encoded)
                }
                KeystoreEntry::PrivateKey { .. } => StoredEntry::Other,
            }),
            Self::Pkcs12(ks) => ks.get(alias).map(|entry| match entry {
                Pkcs12Entry::TrustedCertificate(encoded) => StoredEntry::TrustedCertificate(encoded),
                Pkcs12Entry::Other => StoredEntry::Other,
            }),
        }
    }

    /// Add an X.509 certificate under a new alias
    pub fn add_trusted_certificate(
        &mut self,
        alias: &str,
        encoded: Vec<u8>,
        created_millis: u64,
    ) -> Result<(), String> {
        match self {
            Self::Jks(ks) => {
                if ks.get(alias).is_some() {
                    return Err(format!("alias {} is already present", alias.to_lowercase()));
                }
                ks.insert_trusted_certificate(alias, Certificate::x509(encoded), created_millis);
                Ok(())
            }
            Self::Pkcs12(ks) => ks.add_trusted_certificate(alias, encoded),
        }
    }

    pub fn encode(&self, password: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Jks(ks) => Ok(ks.encode(password)),
            Self::Pkcs12(ks) => ks.encode(password),
        }
    }

    /// Write the store to `path` in its own format, replacing the file contents
    pub fn store(&self, path: &Path, password: &str) -> JvmResult<()> {
        let bytes = self.encode(password).map_err(|reason| JvmError::Keystore {
            path: path.to_path_buf(),
            reason,
        })?;
        fs::write(path, bytes).map_err(|e| JvmError::io(format!("writing {}", path.display()), e))
    }
}
