//! PKCS#12 trust-store codec
//!
//! Reads both password-protected stores (as written by `keytool`) and the
//! password-less stores shipped as `cacerts` since Java 18. Existing safes
//! are carried through byte for byte, so key entries and anything else the
//! codec does not model survive a merge. Added certificates go into one
//! unencrypted safe and the integrity MAC, if the store has one, is
//! recomputed with the store's own parameters.

use super::der::{
    self, DerReader, TAG_BMP_STRING, TAG_CONTEXT_0, TAG_CONTEXT_0_CONSTRUCTED, TAG_NULL,
    TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE, TAG_SET,
};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

const PFX_VERSION: u32 = 3;

// Object identifiers, DER content octets
const OID_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
const OID_ENCRYPTED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x06];
const OID_PBES2: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x05, 0x0D];
const OID_PBKDF2: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x05, 0x0C];
const OID_HMAC_SHA1: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x07];
const OID_HMAC_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x09];
const OID_AES128_CBC: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x02];
const OID_AES192_CBC: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x16];
const OID_AES256_CBC: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2A];
const OID_SHA1: &[u8] = &[0x2B, 0x0E, 0x03, 0x02, 0x1A];
const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
const OID_CERT_BAG: &[u8] = &[
    0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x0A, 0x01, 0x03,
];
const OID_X509_CERTIFICATE: &[u8] = &[
    0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x16, 0x01,
];
const OID_FRIENDLY_NAME: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x14];
const OID_LOCAL_KEY_ID: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x15];
/// Oracle's "trusted key usage" attribute, marks a trusted-certificate entry for Java
const OID_JAVA_TRUSTED_KEY_USAGE: &[u8] = &[
    0x60, 0x86, 0x48, 0x01, 0x86, 0xF9, 0x66, 0xAD, 0xCA, 0x7B, 0x01, 0x01,
];
const OID_ANY_EXTENDED_KEY_USAGE: &[u8] = &[0x55, 0x1D, 0x25, 0x00];

/// Block size of both supported MAC digests
const KDF_BLOCK: usize = 64;
const KDF_ID_MAC: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pkcs12Entry {
    TrustedCertificate(Vec<u8>),
    /// A key, secret or anything else stored under an alias
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacDigest {
    Sha1,
    Sha256,
}

impl MacDigest {
    fn from_oid(oid: &[u8]) -> Result<Self, String> {
        match oid {
            OID_SHA1 => Ok(Self::Sha1),
            OID_SHA256 => Ok(Self::Sha256),
            other => Err(format!("unsupported MAC digest {}", hex::encode(other))),
        }
    }

    fn oid(self) -> &'static [u8] {
        match self {
            Self::Sha1 => OID_SHA1,
            Self::Sha256 => OID_SHA256,
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            Self::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|e| e.to_string())?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            Self::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| e.to_string())?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MacParams {
    digest: MacDigest,
    salt: Vec<u8>,
    iterations: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pkcs12Store {
    /// `ContentInfo` elements of the authenticated safe, as read
    safes: Vec<Vec<u8>>,
    entries: Vec<(String, Pkcs12Entry)>,
    added: Vec<(String, Vec<u8>)>,
    mac: Option<MacParams>,
}

impl Pkcs12Store {
    /// An empty password-less store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the store carries an integrity MAC keyed by the password
    pub fn is_password_protected(&self) -> bool {
        self.mac.is_some()
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

    pub fn get(&self, alias: &str) -> Option<&Pkcs12Entry> {
        let alias = alias.to_lowercase();
        self.entries
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, entry)| entry)
    }

    pub fn trusted_certificate(&self, alias: &str) -> Option<&[u8]> {
        match self.get(alias) {
            Some(Pkcs12Entry::TrustedCertificate(encoded)) => Some(encoded),
            _ => None,
        }
    }

    /// Add a trusted certificate under an alias the store does not hold yet
    pub fn add_trusted_certificate(
        &mut self,
        alias: &str,
        encoded: Vec<u8>,
    ) -> Result<(), String> {
        let alias = alias.to_lowercase();
        if self.get(&alias).is_some() {
            return Err(format!("alias {} is already present", alias));
        }
        self.entries
            .push((alias.clone(), Pkcs12Entry::TrustedCertificate(encoded.clone())));
        self.added.push((alias, encoded));
        Ok(())
    }

    /// Parse a PFX, verifying its MAC with `password` when it has one
    pub fn decode(bytes: &[u8], password: &str) -> Result<Self, String> {
        let mut outer = DerReader::new(bytes);
        let mut pfx = outer.nested(TAG_SEQUENCE)?;
        if !outer.is_empty() {
            return Err("trailing data after PFX".to_string());
        }

        let version = pfx.uint()?;
        if version != PFX_VERSION {
            return Err(format!("unsupported PFX version {}", version));
        }

        let mut auth_safe = pfx.nested(TAG_SEQUENCE)?;
        if auth_safe.expect(TAG_OID)? != OID_DATA {
            return Err("only password-integrity PFX files are supported".to_string());
        }
        let auth_safe = auth_safe
            .nested(TAG_CONTEXT_0_CONSTRUCTED)?
            .expect(TAG_OCTET_STRING)?;

        let mac = if pfx.is_empty() {
            None
        } else {
            Some(read_mac(&mut pfx.nested(TAG_SEQUENCE)?, auth_safe, password)?)
        };

        let mut store = Self {
            mac,
            ..Self::default()
        };

        let mut contents = DerReader::new(auth_safe).nested(TAG_SEQUENCE)?;
        while !contents.is_empty() {
            let content_info = contents.read()?;
            store.safes.push(content_info.raw.to_vec());

            let mut reader = DerReader::new(content_info.value);
            let safe = match reader.expect(TAG_OID)? {
                OID_DATA => reader
                    .nested(TAG_CONTEXT_0_CONSTRUCTED)?
                    .expect(TAG_OCTET_STRING)?
                    .to_vec(),
                OID_ENCRYPTED_DATA => {
                    decrypt_safe(&mut reader.nested(TAG_CONTEXT_0_CONSTRUCTED)?, password)?
                }
                _ => continue,
            };
            store.read_bags(&safe)?;
        }
        Ok(store)
    }

    /// Serialize, protecting with `password` only if the store was protected when read
    pub fn encode(&self, password: &str) -> Result<Vec<u8>, String> {
        let mut safes = self.safes.concat();
        if !self.added.is_empty() {
            let bags: Vec<Vec<u8>> = self
                .added
                .iter()
                .map(|(alias, encoded)| certificate_bag(alias, encoded))
                .collect();
            safes.extend(data_content_info(&der::tlv(TAG_SEQUENCE, &bags.concat())));
        }
        let auth_safe = der::tlv(TAG_SEQUENCE, &safes);

        let mut pfx = der::integer(PFX_VERSION);
        pfx.extend(data_content_info(&auth_safe));
        if let Some(mac) = &self.mac {
            let key = derive_mac_key(mac.digest, password, &mac.salt, mac.iterations);
            let digest = mac.digest.hmac(&key, &auth_safe)?;
            pfx.extend(der::sequence(&[
                der::sequence(&[
                    der::sequence(&[der::oid(mac.digest.oid()), der::tlv(TAG_NULL, &[])]),
                    der::octet_string(&digest),
                ]),
                der::octet_string(&mac.salt),
                der::integer(mac.iterations),
            ]));
        }
        Ok(der::tlv(TAG_SEQUENCE, &pfx))
    }

    fn read_bags(&mut self, safe: &[u8]) -> Result<(), String> {
        let mut bags = DerReader::new(safe).nested(TAG_SEQUENCE)?;
        while !bags.is_empty() {
            let mut bag = bags.nested(TAG_SEQUENCE)?;
            let kind = bag.expect(TAG_OID)?;
            let mut value = bag.nested(TAG_CONTEXT_0_CONSTRUCTED)?;

            let mut alias = None;
            let mut key_id = false;
            if let Some(attributes) = bag.optional(TAG_SET)? {
                let mut attributes = DerReader::new(attributes);
                while !attributes.is_empty() {
                    let mut attribute = attributes.nested(TAG_SEQUENCE)?;
                    let kind = attribute.expect(TAG_OID)?;
                    let mut values = attribute.nested(TAG_SET)?;
                    match kind {
                        OID_FRIENDLY_NAME => {
                            alias = Some(der::parse_bmp(values.expect(TAG_BMP_STRING)?)?)
                        }
                        OID_LOCAL_KEY_ID => key_id = true,
                        _ => {}
                    }
                }
            }

            // Nameless bags and certificates chained to a key have no alias of their own
            let Some(alias) = alias.map(|a| a.to_lowercase()) else {
                continue;
            };
            let entry = if kind == OID_CERT_BAG {
                if key_id {
                    continue;
                }
                let mut certificate = value.nested(TAG_SEQUENCE)?;
                if certificate.expect(TAG_OID)? != OID_X509_CERTIFICATE {
                    continue;
                }
                let encoded = certificate
                    .nested(TAG_CONTEXT_0_CONSTRUCTED)?
                    .expect(TAG_OCTET_STRING)?;
                Pkcs12Entry::TrustedCertificate(encoded.to_vec())
            } else {
                Pkcs12Entry::Other
            };
            self.entries.push((alias, entry));
        }
        Ok(())
    }
}

fn read_mac(
    mac_data: &mut DerReader<'_>,
    auth_safe: &[u8],
    password: &str,
) -> Result<MacParams, String> {
    let mut digest_info = mac_data.nested(TAG_SEQUENCE)?;
    let mut algorithm = digest_info.nested(TAG_SEQUENCE)?;
    let digest = MacDigest::from_oid(algorithm.expect(TAG_OID)?)?;
    let expected = digest_info.expect(TAG_OCTET_STRING)?;

    let salt = mac_data.expect(TAG_OCTET_STRING)?.to_vec();
    let iterations = if mac_data.is_empty() {
        1
    } else {
        mac_data.uint()?
    };

    let key = derive_mac_key(digest, password, &salt, iterations);
    if digest.hmac(&key, auth_safe)? != expected {
        return Err("keystore password was incorrect or the file is corrupt".to_string());
    }
    Ok(MacParams {
        digest,
        salt,
        iterations,
    })
}

/// Decrypt an `EncryptedData` safe protected with PBES2 (PBKDF2 + AES-CBC)
fn decrypt_safe(encrypted_data: &mut DerReader<'_>, password: &str) -> Result<Vec<u8>, String> {
    let mut encrypted_data = encrypted_data.nested(TAG_SEQUENCE)?;
    encrypted_data.uint()?;
    let mut content = encrypted_data.nested(TAG_SEQUENCE)?;
    content.expect(TAG_OID)?;

    let mut algorithm = content.nested(TAG_SEQUENCE)?;
    let scheme = algorithm.expect(TAG_OID)?;
    if scheme != OID_PBES2 {
        return Err(format!(
            "unsupported safe encryption {}, only PBES2 is supported",
            hex::encode(scheme)
        ));
    }
    let mut params = algorithm.nested(TAG_SEQUENCE)?;

    let mut kdf = params.nested(TAG_SEQUENCE)?;
    if kdf.expect(TAG_OID)? != OID_PBKDF2 {
        return Err("unsupported PBES2 key derivation".to_string());
    }
    let mut kdf_params = kdf.nested(TAG_SEQUENCE)?;
    let salt = kdf_params.expect(TAG_OCTET_STRING)?;
    let iterations = kdf_params.uint()?;
    if kdf_params.peek_tag() == Some(der::TAG_INTEGER) {
        kdf_params.uint()?;
    }
    let prf = match kdf_params.optional(TAG_SEQUENCE)? {
        Some(prf) => DerReader::new(prf).expect(TAG_OID)?,
        None => OID_HMAC_SHA1,
    };

    let mut cipher = params.nested(TAG_SEQUENCE)?;
    let key_len = match cipher.expect(TAG_OID)? {
        OID_AES128_CBC => 16,
        OID_AES192_CBC => 24,
        OID_AES256_CBC => 32,
        other => return Err(format!("unsupported PBES2 cipher {}", hex::encode(other))),
    };
    let iv = cipher.expect(TAG_OCTET_STRING)?;

    let mut key = vec![0u8; key_len];
    match prf {
        OID_HMAC_SHA1 => pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key),
        OID_HMAC_SHA256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
        other => return Err(format!("unsupported PBKDF2 function {}", hex::encode(other))),
    }

    let mut ciphertext = Vec::new();
    let element = content.read()?;
    match element.tag {
        TAG_CONTEXT_0 => ciphertext.extend_from_slice(element.value),
        TAG_CONTEXT_0_CONSTRUCTED => {
            let mut chunks = DerReader::new(element.value);
            while !chunks.is_empty() {
                ciphertext.extend_from_slice(chunks.expect(TAG_OCTET_STRING)?);
            }
        }
        other => return Err(format!("unexpected encrypted content tag {:#04x}", other)),
    }

    aes_cbc_decrypt(&key, iv, ciphertext)
}

fn aes_cbc_decrypt(key: &[u8], iv: &[u8], mut buf: Vec<u8>) -> Result<Vec<u8>, String> {
    const BAD_PADDING: &str = "unable to decrypt safe contents";
    let len = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|e| e.to_string())?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| BAD_PADDING)?
            .len(),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|e| e.to_string())?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| BAD_PADDING)?
            .len(),
        _ => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|e| e.to_string())?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| BAD_PADDING)?
            .len(),
    };
    buf.truncate(len);
    Ok(buf)
}

/// PKCS#12 key derivation (RFC 7292 appendix B.2) for the integrity key
fn derive_mac_key(digest: MacDigest, password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut password = der::bmp_bytes(password);
    password.extend_from_slice(&[0, 0]);

    let mut input = [fill(salt), fill(&password)].concat();
    let diversifier = [KDF_ID_MAC; KDF_BLOCK];
    let len = digest.output_len();

    let mut key = Vec::with_capacity(len);
    loop {
        let mut block = digest.digest(&[&diversifier[..], &input].concat());
        for _ in 1..iterations {
            block = digest.digest(&block);
        }
        key.extend_from_slice(&block);
        if key.len() >= len {
            break;
        }

        let addend: Vec<u8> = block.iter().copied().cycle().take(KDF_BLOCK).collect();
        for chunk in input.chunks_mut(KDF_BLOCK) {
            let mut carry = 1u16;
            for (x, y) in chunk.iter_mut().rev().zip(addend.iter().rev()) {
                let sum = *x as u16 + *y as u16 + carry;
                *x = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    key.truncate(len);
    key
}

/// `source` repeated to a whole number of KDF blocks
fn fill(source: &[u8]) -> Vec<u8> {
    if source.is_empty() {
        return Vec::new();
    }
    let len = KDF_BLOCK * source.len().div_ceil(KDF_BLOCK);
    source.iter().copied().cycle().take(len).collect()
}

fn data_content_info(content: &[u8]) -> Vec<u8> {
    der::sequence(&[
        der::oid(OID_DATA),
        der::tlv(TAG_CONTEXT_0_CONSTRUCTED, &der::octet_string(content)),
    ])
}

/// A certificate bag Java reads back as a trusted-certificate entry
fn certificate_bag(alias: &str, encoded: &[u8]) -> Vec<u8> {
    let certificate = der::sequence(&[
        der::oid(OID_X509_CERTIFICATE),
        der::tlv(TAG_CONTEXT_0_CONSTRUCTED, &der::octet_string(encoded)),
    ]);
    let friendly_name = der::sequence(&[
        der::oid(OID_FRIENDLY_NAME),
        der::tlv(TAG_SET, &der::tlv(TAG_BMP_STRING, &der::bmp_bytes(alias))),
    ]);
    let trusted_usage = der::sequence(&[
        der::oid(OID_JAVA_TRUSTED_KEY_USAGE),
        der::tlv(TAG_SET, &der::oid(OID_ANY_EXTENDED_KEY_USAGE)),
    ]);

    der::sequence(&[
        der::oid(OID_CERT_BAG),
        der::tlv(TAG_CONTEXT_0_CONSTRUCTED, &certificate),
        der::tlv(TAG_SET, &[friendly_name, trusted_usage].concat()),
    ])
}
