//! JKS trust-store codec
//!
//! Reads versions 1 and 2 of the Java KeyStore format and writes version 2.
//! Private-key entries are carried through untouched so a merge never
//! disturbs anything it did not add.

use crate::error::{JvmError, JvmResult};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

const MAGIC: u32 = 0xFEED_FEED;
const JCEKS_MAGIC: u32 = 0xCECE_CECE;
const VERSION_1: u32 = 1;
const VERSION_2: u32 = 2;

const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERTIFICATE: u32 = 2;

const DIGEST_LEN: usize = 20;
const WHITENER: &[u8] = b"Mighty Aphrodite";

/// Certificate type written for new entries
pub const X509: &str = "X.509";

/// An encoded certificate and its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub kind: String,
    pub encoded: Vec<u8>,
}

impl Certificate {
    pub fn x509(encoded: Vec<u8>) -> Self {
        Self {
            kind: X509.to_string(),
            encoded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystoreEntry {
    TrustedCertificate {
        created_millis: u64,
        certificate: Certificate,
    },
    PrivateKey {
        created_millis: u64,
        protected_key: Vec<u8>,
        chain: Vec<Certificate>,
    },
}

/// In-memory JKS keystore, entries kept in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keystore {
    entries: Vec<(String, KeystoreEntry)>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and verify a keystore file
    pub fn load(path: &Path, password: &str) -> JvmResult<Self> {
        let bytes =
            fs::read(path).map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
        Self::decode(&bytes, password).map_err(|reason| JvmError::Keystore {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Write the keystore to `path`, replacing the file contents
    pub fn store(&self, path: &Path, password: &str) -> JvmResult<()> {
        fs::write(path, self.encode(password))
            .map_err(|e| JvmError::io(format!("writing {}", path.display()), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(alias, _)| alias.as_str())
    }

    pub fn get(&self, alias: &str) -> Option<&KeystoreEntry> {
        let alias = alias.to_lowercase();
        self.entries
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, entry)| entry)
    }

    /// The certificate stored under `alias`, if it is a trusted-certificate entry
    pub fn trusted_certificate(&self, alias: &str) -> Option<&Certificate> {
        match self.get(alias) {
            Some(KeystoreEntry::TrustedCertificate { certificate, .. }) => Some(certificate),
            _ => None,
        }
    }

    /// Add a trusted certificate, replacing any entry with the same alias
    pub fn insert_trusted_certificate(
        &mut self,
        alias: &str,
        certificate: Certificate,
        created_millis: u64,
    ) {
        let alias = alias.to_lowercase();
        let entry = KeystoreEntry::TrustedCertificate {
            created_millis,
            certificate,
        };

        match self.entries.iter_mut().find(|(a, _)| *a == alias) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((alias, entry)),
        }
    }

    /// Parse keystore bytes, verifying the integrity digest with `password`
    pub fn decode(bytes: &[u8], password: &str) -> Result<Self, String> {
        if bytes.len() < 12 + DIGEST_LEN {
            return Err("file is too short to be a keystore".to_string());
        }

        let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        let mut reader = Reader::new(body);

        match reader.u32()? {
            MAGIC => {}
            JCEKS_MAGIC => return Err("JCEKS keystores are not supported".to_string()),
            other => return Err(format!("invalid magic {:#010x}", other)),
        }

        let version = reader.u32()?;
        if version != VERSION_1 && version != VERSION_2 {
            return Err(format!("unsupported version {}", version));
        }

        if integrity_digest(password, body).as_slice() != digest {
            return Err("keystore password was incorrect or the file is corrupt".to_string());
        }

        let count = reader.u32()?;
        let mut keystore = Self::new();
        for _ in 0..count {
            let tag = reader.u32()?;
            let alias = reader.utf()?.to_lowercase();
            let created_millis = reader.u64()?;

            let entry = match tag {
                TAG_PRIVATE_KEY => {
                    let protected_key = reader.bytes()?;
                    let chain_len = reader.u32()?;
                    let chain = (0..chain_len)
                        .map(|_| reader.certificate(version))
                        .collect::<Result<Vec<_>, _>>()?;
                    KeystoreEntry::PrivateKey {
                        created_millis,
                        protected_key,
                        chain,
                    }
                }
                TAG_TRUSTED_CERTIFICATE => KeystoreEntry::TrustedCertificate {
                    created_millis,
                    certificate: reader.certificate(version)?,
                },
                other => return Err(format!("unknown entry tag {} for {}", other, alias)),
            };
            keystore.entries.push((alias, entry));
        }

        if !reader.is_empty() {
            return Err("trailing data after entries".to_string());
        }
        Ok(keystore)
    }

    /// Serialize as a version 2 JKS keystore protected by `password`
    pub fn encode(&self, password: &str) -> Vec<u8> {
        let mut w = Writer::default();
        w.u32(MAGIC);
        w.u32(VERSION_2);
        w.u32(self.entries.len() as u32);

        for (alias, entry) in &self.entries {
            match entry {
                KeystoreEntry::PrivateKey {
                    created_millis,
                    protected_key,
                    chain,
                } => {
                    w.u32(TAG_PRIVATE_KEY);
                    w.utf(alias);
                    w.u64(*created_millis);
                    w.bytes(protected_key);
                    w.u32(chain.len() as u32);
                    for certificate in chain {
                        w.certificate(certificate);
                    }
                }
                KeystoreEntry::TrustedCertificate {
                    created_millis,
                    certificate,
                } => {
                    w.u32(TAG_TRUSTED_CERTIFICATE);
                    w.utf(alias);
                    w.u64(*created_millis);
                    w.certificate(certificate);
                }
            }
        }

        let digest = integrity_digest(password, &w.buf);
        w.buf.extend_from_slice(&digest);
        w.buf
    }
}

/// SHA-1 over the UTF-16BE password, the whitener and the keystore body
fn integrity_digest(password: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(WHITENER);
    hasher.update(body);

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.buf.len() < n {
            return Err("unexpected end of keystore".to_string());
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    fn utf(&mut self) -> Result<String, String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| format!("invalid alias: {}", e))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, String> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn certificate(&mut self, version: u32) -> Result<Certificate, String> {
        let kind = if version == VERSION_2 {
            self.utf()?
        } else {
            X509.to_string()
        };
        Ok(Certificate {
            kind,
            encoded: self.bytes()?,
        })
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn utf(&mut self, s: &str) {
        self.buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
    }

    fn certificate(&mut self, certificate: &Certificate) {
        self.utf(&certificate.kind);
        self.bytes(&certificate.encoded);
    }
}
