//! Fixture builders shared by unit tests

use crate::certs::{pem, Certificate, Keystore, DEFAULT_KEYSTORE_PASSWORD};
use crate::dependency::Dependency;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);

    for (name, data) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Contents of a file under `tests/fixtures`
pub fn fixture(name: &str) -> Vec<u8> {
    fs::read(fixture_path(name)).unwrap()
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// DER encoding of a PEM certificate fixture
pub fn fixture_certificate(name: &str) -> Vec<u8> {
    let pem = String::from_utf8(fixture(name)).unwrap();
    pem::decode_certificates(&pem).unwrap().remove(0)
}

/// Minimal DER sequence, unique per `seed`
pub fn fake_der(seed: u8) -> Vec<u8> {
    vec![0x30, 0x03, 0x02, 0x01, seed]
}

/// A `certificates/` directory with one PEM file per name
pub fn write_cert_dir(root: &Path, names: &[&str]) -> PathBuf {
    let dir = root.join("certificates");
    fs::create_dir_all(&dir).unwrap();
    for (i, name) in names.iter().enumerate() {
        fs::write(
            dir.join(format!("{}.pem", name)),
            pem::encode_certificate(&fake_der(i as u8 + 1)),
        )
        .unwrap();
    }
    dir
}

pub fn keystore_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut ks = Keystore::new();
    for (alias, der) in entries {
        ks.insert_trusted_certificate(alias, Certificate::x509(der.clone()), 0);
    }
    ks.encode(DEFAULT_KEYSTORE_PASSWORD)
}

pub fn write_keystore(path: &Path, entries: &[(&str, Vec<u8>)]) {
    fs::write(path, keystore_bytes(entries)).unwrap();
}

/// Place `contents` in a local dependency cache and point `dependency` at it
pub fn cache_artifact(cache_root: &Path, dependency: &mut Dependency, file_name: &str, contents: &[u8]) {
    dependency.uri = format!("https://localhost/{}", file_name);
    dependency.sha256 = hex::encode(Sha256::digest(contents));

    let dir = cache_root.join(&dependency.sha256);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file_name), contents).unwrap();
}

/// A cached runtime archive with a marker file, a trust-store holding one
/// certificate and `java.security` files (legacy and modern locations)
/// declaring one provider.
///
/// `security_root` is the directory holding `lib/security` inside the
/// distribution, `""` for the modern layout and `"jre"` for a legacy JDK.
pub fn cache_runtime(
    cache_root: &Path,
    id: &str,
    version: &str,
    security_root: &str,
) -> Dependency {
    let prefix = if security_root.is_empty() {
        "runtime".to_string()
    } else {
        format!("runtime/{}", security_root)
    };
    let cacerts = format!("{}/lib/security/cacerts", prefix);
    let legacy_security = format!("{}/lib/security/java.security", prefix);
    let keystore = keystore_bytes(&[("fixture", fake_der(0))]);
    let providers = b"# providers\nsecurity.provider.1=ALPHA\n".as_slice();

    let archive_dir = tempfile::TempDir::new().unwrap();
    let archive = archive_dir.path().join("runtime.tar.gz");
    write_tar_gz(
        &archive,
        &[
            ("runtime/fixture-marker", b"".as_slice()),
            (cacerts.as_str(), keystore.as_slice()),
            (legacy_security.as_str(), providers),
            ("runtime/conf/security/java.security", providers),
        ],
    );

    let mut dependency = Dependency::new(id, version, &["test-stack-id"]);
    cache_artifact(
        cache_root,
        &mut dependency,
        &format!("stub-{}-{}.tar.gz", id, version),
        &fs::read(&archive).unwrap(),
    );
    dependency
}
