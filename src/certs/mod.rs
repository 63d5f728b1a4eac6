//! Certificate loading
//!
//! Operator-supplied PEM certificates are merged into a runtime's trust-store.
//! The merge only ever adds entries: an alias that already holds the same
//! certificate is left alone, and an alias that holds a different one is an
//! error rather than an overwrite.

mod der;
pub mod keystore;
pub mod pem;
pub mod pkcs12;
pub mod truststore;

pub use keystore::{Certificate, Keystore, KeystoreEntry};
pub use pkcs12::{Pkcs12Entry, Pkcs12Store};
pub use truststore::{StoreFormat, StoredEntry, TrustStore};

use crate::error::{JvmError, JvmResult};
use crate::layer::LayerMetadata;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Password of the trust-store shipped with every runtime
pub const DEFAULT_KEYSTORE_PASSWORD: &str = "changeit";

/// Metadata key holding the certificate fingerprint
pub const CERT_DIR_METADATA_KEY: &str = "cert-dir";

/// Environment variable listing certificate directories
pub const SSL_CERT_DIR: &str = "SSL_CERT_DIR";

/// Counts from one trust-store merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub unchanged: usize,
}

/// A certificate read from disk, with the alias it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
struct PemCertificate {
    alias: String,
    encoded: Vec<u8>,
    path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateLoader {
    cert_dirs: Vec<PathBuf>,
}

impl CertificateLoader {
    pub fn new(cert_dirs: Vec<PathBuf>) -> Self {
        Self { cert_dirs }
    }

    /// Directories from an `SSL_CERT_DIR` style path list
    pub fn from_env(value: Option<&str>) -> Self {
        let cert_dirs = value
            .map(|v| {
                std::env::split_paths(v)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self::new(cert_dirs)
    }

    pub fn cert_dirs(&self) -> &[PathBuf] {
        &self.cert_dirs
    }

    /// Fingerprint of the certificate files: path, size and modification
    /// time of each, in the order they are merged.
    pub fn metadata(&self) -> JvmResult<LayerMetadata> {
        let mut records = Vec::new();
        for path in self.cert_files()? {
            let meta = fs::metadata(&path)
                .map_err(|e| JvmError::io(format!("inspecting {}", path.display()), e))?;
            let modified = meta
                .modified()
                .map_err(|e| JvmError::io(format!("inspecting {}", path.display()), e))?;

            let mut record = toml::Table::new();
            record.insert(
                "path".to_string(),
                path.to_string_lossy().into_owned().into(),
            );
            record.insert("size".to_string(), toml::Value::Integer(meta.len() as i64));
            record.insert(
                "modified".to_string(),
                DateTime::<Utc>::from(modified)
                    .to_rfc3339_opts(SecondsFormat::Nanos, true)
                    .into(),
            );
            records.push(toml::Value::Table(record));
        }

        let mut metadata = LayerMetadata::new();
        metadata.insert(
            CERT_DIR_METADATA_KEY.to_string(),
            toml::Value::Array(records),
        );
        Ok(metadata)
    }

    /// Merge every configured certificate into the trust-store at `keystore_path`
    pub fn load(&self, keystore_path: &Path, password: &str) -> JvmResult<MergeSummary> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(keystore_path, fs::Permissions::from_mode(0o664)).map_err(|e| {
                JvmError::io(
                    format!("setting permissions on {}", keystore_path.display()),
                    e,
                )
            })?;
        }

        let mut store = TrustStore::load(keystore_path, password)?;
        let created_millis = Utc::now().timestamp_millis().max(0) as u64;
        let mut summary = MergeSummary::default();

        for pem in self.certificates()? {
            match store.get(&pem.alias) {
                None => {
                    store
                        .add_trusted_certificate(&pem.alias, pem.encoded, created_millis)
                        .map_err(|reason| JvmError::Keystore {
                            path: keystore_path.to_path_buf(),
                            reason,
                        })?;
                    summary.added += 1;
                }
                Some(StoredEntry::TrustedCertificate(encoded)) if encoded == pem.encoded => {
                    summary.unchanged += 1;
                }
                Some(_) => {
                    return Err(JvmError::CertConflict {
                        alias: pem.alias,
                        path: pem.path,
                    })
                }
            }
        }

        if summary.added > 0 {
            store.store(keystore_path, password)?;
        }
        info!(
            "Added {} certificates to {} {} ({} already present)",
            summary.added,
            store.format(),
            keystore_path.display(),
            summary.unchanged
        );
        Ok(summary)
    }

    /// Candidate files in merge order: directories as configured, files
    /// sorted by name, hidden files and subdirectories excluded.
    fn cert_files(&self) -> JvmResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for dir in &self.cert_dirs {
            if !dir.is_dir() {
                debug!("Skipping missing certificate directory {}", dir.display());
                continue;
            }

            let entries = fs::read_dir(dir)
                .map_err(|e| JvmError::io(format!("reading {}", dir.display()), e))?;
            let mut paths = Vec::new();
            for entry in entries {
                let entry =
                    entry.map_err(|e| JvmError::io(format!("reading {}", dir.display()), e))?;
                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with('.') || !path.is_file() {
                    continue;
                }
                paths.push(path);
            }
            paths.sort();
            files.extend(paths);
        }
        Ok(files)
    }

    fn certificates(&self) -> JvmResult<Vec<PemCertificate>> {
        let mut certificates = Vec::new();
        for path in self.cert_files()? {
            let bytes =
                fs::read(&path).map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
            let Ok(content) = String::from_utf8(bytes) else {
                debug!("Skipping non-PEM file {}", path.display());
                continue;
            };

            let decoded = pem::decode_certificates(&content).map_err(|reason| {
                JvmError::Certificate {
                    path: path.clone(),
                    reason,
                }
            })?;
            if decoded.is_empty() {
                debug!("Skipping non-PEM file {}", path.display());
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let single = decoded.len() == 1;
            for (i, encoded) in decoded.into_iter().enumerate() {
                let alias = if single {
                    stem.clone()
                } else {
                    format!("{}-{}", stem, i)
                };
                certificates.push(PemCertificate {
                    alias,
                    encoded,
                    path: path.clone(),
                });
            }
        }
        Ok(certificates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_der, fixture, write_cert_dir, write_keystore};
    use std::process::Command;
    use tempfile::TempDir;

    /// A keytool-written store plus a certificate directory holding the
    /// store's own CA and one new one
    fn keytool_store(root: &Path, name: &str) -> (PathBuf, CertificateLoader) {
        let keystore = root.join("cacerts");
        fs::write(&keystore, fixture(name)).unwrap();

        let dir = root.join("certificates");
        fs::create_dir_all(&dir).unwrap();
        for pem in ["corp.pem", "fixture-ca.pem"] {
            fs::write(dir.join(pem), fixture(pem)).unwrap();
        }
        (keystore, CertificateLoader::new(vec![dir]))
    }

    #[test]
    fn from_env_splits_path_list() {
        let loader = CertificateLoader::from_env(Some("/a:/b::"));
        assert_eq!(
            loader.cert_dirs(),
            &[PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(CertificateLoader::from_env(None).cert_dirs().is_empty());
    }

    #[test]
    fn metadata_lists_certificate_files() {
        let temp = TempDir::new().unwrap();
        let dir = write_cert_dir(temp.path(), &["one", "two"]);
        fs::write(dir.join(".hidden"), "x").unwrap();

        let loader = CertificateLoader::new(vec![dir, temp.path().join("missing")]);
        let metadata = loader.metadata().unwrap();
        let records = metadata[CERT_DIR_METADATA_KEY].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0]["path"].as_str().unwrap().ends_with("one.pem"));
        assert!(records[0]["size"].as_integer().unwrap() > 0);
    }

    #[test]
    fn metadata_changes_when_certificate_added() {
        let temp = TempDir::new().unwrap();
        let dir = write_cert_dir(temp.path(), &["one"]);
        let loader = CertificateLoader::new(vec![dir.clone()]);

        let before = loader.metadata().unwrap();
        assert_eq!(before, loader.metadata().unwrap());

        fs::write(dir.join("two.pem"), pem::encode_certificate(&fake_der(9))).unwrap();
        assert_ne!(before, loader.metadata().unwrap());
    }

    #[test]
    fn merges_certificates() {
        let temp = TempDir::new().unwrap();
        let keystore = temp.path().join("cacerts");
        write_keystore(&keystore, &[("existing", fake_der(0))]);
        let dir = write_cert_dir(temp.path(), &["One", "two"]);

        let loader = CertificateLoader::new(vec![dir]);
        let summary = loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        assert_eq!(summary, MergeSummary { added: 2, unchanged: 0 });

        let ks = Keystore::load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        assert_eq!(ks.aliases().collect::<Vec<_>>(), vec!["existing", "one", "two"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let keystore = temp.path().join("cacerts");
        write_keystore(&keystore, &[]);
        let loader = CertificateLoader::new(vec![write_cert_dir(temp.path(), &["one", "two"])]);

        loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        let first = fs::read(&keystore).unwrap();

        let summary = loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        assert_eq!(summary, MergeSummary { added: 0, unchanged: 2 });
        assert_eq!(fs::read(&keystore).unwrap(), first);
    }

    #[test]
    fn differing_alias_conflicts() {
        let temp = TempDir::new().unwrap();
        let keystore = temp.path().join("cacerts");
        write_keystore(&keystore, &[("one", fake_der(7))]);
        let loader = CertificateLoader::new(vec![write_cert_dir(temp.path(), &["one"])]);

        let err = loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap_err();
        assert!(matches!(err, JvmError::CertConflict { ref alias, .. } if alias == "one"));

        let ks = Keystore::load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        assert_eq!(ks.trusted_certificate("one").unwrap().encoded, fake_der(7));
    }

    #[test]
    fn bundle_files_get_indexed_aliases() {
        let temp = TempDir::new().unwrap();
        let keystore = temp.path().join("cacerts");
        write_keystore(&keystore, &[]);

        let dir = temp.path().join("bundle");
        fs::create_dir_all(&dir).unwrap();
        let bundle = format!(
            "{}{}",
            pem::encode_certificate(&fake_der(1)),
            pem::encode_certificate(&fake_der(2))
        );
        fs::write(dir.join("ca-bundle.crt"), bundle).unwrap();
        fs::write(dir.join("README"), "not a certificate").unwrap();

        CertificateLoader::new(vec![dir])
            .load(&keystore, DEFAULT_KEYSTORE_PASSWORD)
            .unwrap();
        let ks = Keystore::load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
        assert_eq!(
            ks.aliases().collect::<Vec<_>>(),
            vec!["ca-bundle-0", "ca-bundle-1"]
        );
    }

    #[test]
    fn merges_into_pkcs12_stores() {
        for (name, protected) in [("cacerts.p12", true), ("cacerts-passwordless.p12", false)] {
            let temp = TempDir::new().unwrap();
            let (keystore, loader) = keytool_store(temp.path(), name);

            let summary = loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
            assert_eq!(summary, MergeSummary { added: 1, unchanged: 1 });

            let store = TrustStore::load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
            assert_eq!(store.aliases(), vec!["fixture-ca", "corp"]);
            match &store {
                TrustStore::Pkcs12(p12) => assert_eq!(p12.is_password_protected(), protected),
                other => panic!("{} rewritten as {}", name, other.format()),
            }

            let merged = fs::read(&keystore).unwrap();
            let summary = loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();
            assert_eq!(summary, MergeSummary { added: 0, unchanged: 2 });
            assert_eq!(fs::read(&keystore).unwrap(), merged);
        }
    }

    #[test]
    fn pkcs12_key_alias_conflicts() {
        let temp = TempDir::new().unwrap();
        let (keystore, _) = keytool_store(temp.path(), "cacerts-with-key.p12");
        let dir = temp.path().join("server-certs");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("server.pem"), fixture("corp.pem")).unwrap();

        let before = fs::read(&keystore).unwrap();
        let err = CertificateLoader::new(vec![dir])
            .load(&keystore, DEFAULT_KEYSTORE_PASSWORD)
            .unwrap_err();
        assert!(matches!(err, JvmError::CertConflict { ref alias, .. } if alias == "server"));
        assert_eq!(fs::read(&keystore).unwrap(), before);
    }

    #[test]
    fn merged_stores_are_readable_by_keytool() {
        if Command::new("keytool").arg("-help").output().is_err() {
            return;
        }

        for name in ["cacerts.jks", "cacerts.p12", "cacerts-passwordless.p12"] {
            let temp = TempDir::new().unwrap();
            let (keystore, loader) = keytool_store(temp.path(), name);
            loader.load(&keystore, DEFAULT_KEYSTORE_PASSWORD).unwrap();

            let output = Command::new("keytool")
                .args(["-list", "-keystore"])
                .arg(&keystore)
                .args(["-storepass", DEFAULT_KEYSTORE_PASSWORD])
                .output()
                .unwrap();
            let stdout = String::from_utf8_lossy(&output.stdout);
            assert!(output.status.success(), "{}: {}", name, stdout);
            assert!(stdout.contains("corp,"), "{}: {}", name, stdout);
            assert!(stdout.contains("fixture-ca,"), "{}: {}", name, stdout);
        }
    }

    #[cfg(unix)]
    #[test]
    fn sets_keystore_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let keystore = temp.path().join("cacerts");
        write_keystore(&keystore, &[]);
        fs::set_permissions(&keystore, fs::Permissions::from_mode(0o444)).unwrap();

        CertificateLoader::new(vec![write_cert_dir(temp.path(), &["one"])])
            .load(&keystore, DEFAULT_KEYSTORE_PASSWORD)
            .unwrap();
        let mode = fs::metadata(&keystore).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
    }
}
