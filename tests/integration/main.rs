//! Integration tests for jvm-vendors

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn jvm_vendors() -> Command {
        cargo_bin_cmd!("jvm-vendors")
    }

    #[test]
    fn help_displays() {
        jvm_vendors()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Java runtime buildpack"));
    }

    #[test]
    fn version_displays() {
        jvm_vendors()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("jvm-vendors"));
    }

    #[test]
    fn unknown_command_fails() {
        jvm_vendors().arg("launch").assert().failure();
    }

    #[test]
    fn heap_dump_disabled_prints_nothing() {
        jvm_vendors()
            .arg("heap-dump")
            .env_remove("BPL_HEAP_DUMP_PATH")
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn heap_dump_enabled() {
        jvm_vendors()
            .arg("heap-dump")
            .env("BPL_HEAP_DUMP_PATH", "/tmp/dumps")
            .env("JAVA_TOOL_OPTIONS", "-Xmx2G")
            .assert()
            .success()
            .stdout(predicate::str::contains("JAVA_TOOL_OPTIONS = \"-Xmx2G -XX:+HeapDumpOnOutOfMemoryError -XX:HeapDumpPath=/tmp/dumps/java_"));
    }
}

mod detect_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_buildpack(dir: &Path, vendors: &str) {
        fs::write(
            dir.join("buildpack.toml"),
            format!(
                r#"
api = "0.10"

[buildpack]
id = "jvm-vendors"
name = "JVM Vendors"
version = "0.0.1"

[[metadata.configurations]]
name = "BP_JVM_VENDORS"
default = "{}"
build = true

[[metadata.configurations]]
name = "BP_JVM_VENDOR"
default = "corretto"
build = true
"#,
                vendors
            ),
        )
        .unwrap();
    }

    fn detect(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("jvm-vendors");
        cmd.arg("detect")
            .arg("--buildpack-dir")
            .arg(dir)
            .env_remove("BP_JVM_VENDOR")
            .env_remove("BP_JVM_VENDORS")
            .env_remove("CNB_BUILD_PLAN_PATH");
        cmd
    }

    #[test]
    fn prints_plan_alternatives() {
        let temp = TempDir::new().unwrap();
        write_buildpack(temp.path(), "bellsoft-liberica,corretto");

        detect(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("[[provides]]"))
            .stdout(predicate::str::contains("native-image-builder"))
            .stdout(predicate::str::contains("[[or]]"));
    }

    #[test]
    fn writes_plan_to_file() {
        let temp = TempDir::new().unwrap();
        write_buildpack(temp.path(), "corretto");
        let output = temp.path().join("plan.toml");

        detect(temp.path())
            .arg("--output")
            .arg(&output)
            .assert()
            .success();

        let plan: toml::Table = toml::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(plan["requires"][0]["name"].as_str(), Some("jdk"));
        assert_eq!(plan["or"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn unsupported_vendor_exits_100() {
        let temp = TempDir::new().unwrap();
        write_buildpack(temp.path(), "bellsoft-liberica,corretto");

        detect(temp.path())
            .env("BP_JVM_VENDOR", "zulu")
            .assert()
            .code(100)
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn empty_vendors_reports_error() {
        let temp = TempDir::new().unwrap();
        write_buildpack(temp.path(), "");

        detect(temp.path())
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("unable to load JVM vendors"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn missing_buildpack_toml_fails() {
        let temp = TempDir::new().unwrap();
        detect(temp.path()).assert().failure();
    }
}

mod build_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use jvm_vendors::certs::{
        pem, Certificate, Keystore, StoreFormat, TrustStore, DEFAULT_KEYSTORE_PASSWORD,
    };
    use predicates::prelude::*;
    use sha2::{Digest, Sha256};
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const STACK: &str = "test-stack-id";

    struct Fixture {
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                temp: TempDir::new().unwrap(),
            };
            for dir in ["app", "buildpack/bin", "cache", "layers", "certificates"] {
                fs::create_dir_all(fixture.path(dir)).unwrap();
            }
            fs::write(fixture.path("buildpack/bin/helper"), "#!/bin/sh\n").unwrap();
            fixture
        }

        fn path(&self, name: &str) -> PathBuf {
            self.temp.path().join(name)
        }

        /// Cache a JRE archive with a one-entry JKS trust-store and return its `(uri, sha256)`
        fn cache_jre(&self) -> (String, String) {
            let mut keystore = Keystore::new();
            keystore.insert_trusted_certificate(
                "fixture",
                Certificate::x509(vec![0x30, 0x03, 0x02, 0x01, 0x00]),
                0,
            );
            self.cache_jre_with(&keystore.encode(DEFAULT_KEYSTORE_PASSWORD))
        }

        fn cache_jre_with(&self, cacerts: &[u8]) -> (String, String) {
            let providers = b"security.provider.1=SUN\nsecurity.provider.2=SunRsaSign\n";

            let archive = self.path("jre.tar.gz");
            let encoder = flate2::write::GzEncoder::new(
                File::create(&archive).unwrap(),
                flate2::Compression::default(),
            );
            let mut builder = tar::Builder::new(encoder);
            for (name, data) in [
                ("jre/release", b"JAVA_VERSION=\"17.0.2\"\n".as_slice()),
                ("jre/lib/security/cacerts", cacerts),
                ("jre/conf/security/java.security", providers.as_slice()),
            ] {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, data).unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();

            let contents = fs::read(&archive).unwrap();
            let sha256 = hex::encode(Sha256::digest(&contents));
            let dir = self.path("cache").join(&sha256);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("jre-17.0.2.tar.gz"), &contents).unwrap();

            ("https://localhost/jre-17.0.2.tar.gz".to_string(), sha256)
        }

        fn write_buildpack(&self, uri: &str, sha256: &str) {
            fs::write(
                self.path("buildpack/buildpack.toml"),
                format!(
                    r#"
api = "0.10"

[buildpack]
id = "jvm-vendors"
version = "0.0.1"

[[metadata.configurations]]
name = "BP_JVM_VENDORS"
default = "corretto"
build = true

[[metadata.dependencies]]
id = "jre-corretto"
name = "Amazon Corretto JRE"
version = "17.0.2"
uri = "{}"
sha256 = "{}"
stacks = ["{}"]
purl = "pkg:generic/corretto@17.0.2"
"#,
                    uri, sha256, STACK
                ),
            )
            .unwrap();
        }

        fn write_plan(&self) {
            fs::write(
                self.path("plan.toml"),
                "[[entries]]\nname = \"jre\"\n\n[entries.metadata]\nlaunch = true\n",
            )
            .unwrap();
        }

        fn build(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("jvm-vendors");
            cmd.arg("build")
                .arg("--layers")
                .arg(self.path("layers"))
                .arg("--plan")
                .arg(self.path("plan.toml"))
                .arg("--cache")
                .arg(self.path("cache"))
                .arg("--app")
                .arg(self.path("app"))
                .arg("--buildpack-dir")
                .arg(self.path("buildpack"))
                .arg("--stack")
                .arg(STACK)
                .env("SSL_CERT_DIR", self.path("certificates"))
                .env_remove("BP_JVM_VENDOR")
                .env_remove("BP_JVM_VENDORS")
                .env_remove("BP_JVM_VERSION")
                .env_remove("BP_JVM_TYPE");
            cmd
        }

        fn layer(&self, path: &str) -> PathBuf {
            self.path("layers").join(path)
        }
    }

    fn summary(output: &[u8]) -> serde_json::Value {
        serde_json::from_slice(output).unwrap()
    }

    fn outcomes(summary: &serde_json::Value) -> Vec<(String, String)> {
        summary["layers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| {
                (
                    l["name"].as_str().unwrap().to_string(),
                    l["outcome"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    fn fixture_file(name: &str) -> Vec<u8> {
        fs::read(
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("tests/fixtures")
                .join(name),
        )
        .unwrap()
    }

    fn write_certificate(dir: &Path, name: &str, seed: u8) {
        fs::write(
            dir.join(format!("{}.pem", name)),
            pem::encode_certificate(&[0x30, 0x03, 0x02, 0x01, seed]),
        )
        .unwrap();
    }

    #[test]
    fn contributes_jre_with_helpers() {
        let fixture = Fixture::new();
        let (uri, sha256) = fixture.cache_jre();
        fixture.write_buildpack(&uri, &sha256);
        fixture.write_plan();
        write_certificate(&fixture.path("certificates"), "Corporate-Root", 1);

        let output = fixture.build().assert().success().get_output().stdout.clone();
        let summary = summary(&output);
        assert_eq!(
            outcomes(&summary),
            vec![
                ("jre-corretto".to_string(), "contributed".to_string()),
                ("helper".to_string(), "contributed".to_string()),
                ("java-security-properties".to_string(), "contributed".to_string()),
            ]
        );
        assert_eq!(summary["bom"][0]["id"].as_str(), Some("jre-corretto"));
        assert_eq!(summary["bom"][0]["launch"].as_bool(), Some(true));

        assert!(fixture.layer("jre-corretto/release").is_file());
        assert!(fixture.layer("jre-corretto.toml").is_file());
        assert_eq!(
            fs::read_to_string(fixture.layer("jre-corretto/env.launch/BPI_JVM_SECURITY_PROVIDERS.default"))
                .unwrap(),
            "1|SUN 2|SunRsaSign"
        );
        assert_eq!(
            fs::read_to_string(fixture.layer("jre-corretto/env.launch/MALLOC_ARENA_MAX.default"))
                .unwrap(),
            "2"
        );
        assert!(fixture.layer("helper/bin/helper").is_file());

        let keystore = Keystore::load(
            &fixture.layer("jre-corretto/lib/security/cacerts"),
            DEFAULT_KEYSTORE_PASSWORD,
        )
        .unwrap();
        assert_eq!(keystore.len(), 2);
        assert!(keystore.trusted_certificate("corporate-root").is_some());
    }

    #[test]
    fn merges_into_passwordless_pkcs12_trust_store() {
        let fixture = Fixture::new();
        let (uri, sha256) = fixture.cache_jre_with(&fixture_file("cacerts-passwordless.p12"));
        fixture.write_buildpack(&uri, &sha256);
        fixture.write_plan();
        fs::write(
            fixture.path("certificates").join("corp.pem"),
            fixture_file("corp.pem"),
        )
        .unwrap();

        fixture.build().assert().success();

        let store = TrustStore::load(
            &fixture.layer("jre-corretto/lib/security/cacerts"),
            DEFAULT_KEYSTORE_PASSWORD,
        )
        .unwrap();
        assert_eq!(store.format(), StoreFormat::Pkcs12);
        assert_eq!(store.aliases(), vec!["fixture-ca", "corp"]);
    }

    #[test]
    fn second_build_reuses_layers() {
        let fixture = Fixture::new();
        let (uri, sha256) = fixture.cache_jre();
        fixture.write_buildpack(&uri, &sha256);
        fixture.write_plan();

        fixture.build().assert().success();
        let output = fixture.build().assert().success().get_output().stdout.clone();
        assert!(outcomes(&summary(&output))
            .iter()
            .all(|(_, outcome)| outcome == "skipped"));

        write_certificate(&fixture.path("certificates"), "late", 7);
        let output = fixture.build().assert().success().get_output().stdout.clone();
        assert_eq!(
            outcomes(&summary(&output))[0],
            ("jre-corretto".to_string(), "contributed".to_string())
        );
    }

    #[test]
    fn text_summary() {
        let fixture = Fixture::new();
        let (uri, sha256) = fixture.cache_jre();
        fixture.write_buildpack(&uri, &sha256);
        fixture.write_plan();

        fixture
            .build()
            .args(["--format", "text"])
            .assert()
            .success()
            .stdout(predicate::str::contains("jre-corretto"))
            .stdout(predicate::str::contains("java-security-properties"));
    }

    #[test]
    fn missing_artifact_fails() {
        let fixture = Fixture::new();
        fixture.write_buildpack(
            "https://localhost/jre-17.0.2.tar.gz",
            "0000000000000000000000000000000000000000000000000000000000000000",
        );
        fixture.write_plan();

        fixture
            .build()
            .assert()
            .failure()
            .stderr(predicate::str::contains("unable to contribute jre-corretto"));
    }

    #[test]
    fn unknown_vendor_fails_with_hint() {
        let fixture = Fixture::new();
        let (uri, sha256) = fixture.cache_jre();
        fixture.write_buildpack(&uri, &sha256);
        fixture.write_plan();

        fixture
            .build()
            .env("BP_JVM_VENDOR", "zulu")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unable to load JVM vendors"))
            .stderr(predicate::str::contains("Hint:"));
    }
}
