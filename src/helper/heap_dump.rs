//! `jvm-heap-dump` helper
//!
//! When `BPL_HEAP_DUMP_PATH` is set, makes the JVM write a heap dump into
//! that directory on `OutOfMemoryError`.

use crate::config::Env;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const BPL_HEAP_DUMP_PATH: &str = "BPL_HEAP_DUMP_PATH";

const JAVA_TOOL_OPTIONS: &str = "JAVA_TOOL_OPTIONS";
const HEAP_DUMP_ON_OOM: &str = "-XX:+HeapDumpOnOutOfMemoryError";
const HEAP_DUMP_PATH_FLAG: &str = "-XX:HeapDumpPath=";

/// Environment to export, or `None` when heap dumps are not configured.
///
/// Flags already present in `JAVA_TOOL_OPTIONS` are left alone, so the
/// helper can run repeatedly without duplicating options.
pub fn heap_dump_env(env: &Env, now: DateTime<Utc>) -> Option<BTreeMap<String, String>> {
    let dir = env.get(BPL_HEAP_DUMP_PATH).map(|p| p.trim()).filter(|p| !p.is_empty())?;

    let mut options: Vec<String> = env
        .get(JAVA_TOOL_OPTIONS)
        .map(|o| o.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    if !options.iter().any(|o| o == HEAP_DUMP_ON_OOM) {
        options.push(HEAP_DUMP_ON_OOM.to_string());
    }

    if !options.iter().any(|o| o.starts_with(HEAP_DUMP_PATH_FLAG)) {
        let file = format!("java_{}.hprof", now.format("%Y-%m-%dT%H-%M-%S%z"));
        let path = Path::new(dir).join(file);
        info!("Enabling Java heap dumps to {}", path.display());
        options.push(format!("{}{}", HEAP_DUMP_PATH_FLAG, path.display()));
    }

    let mut exported = BTreeMap::new();
    exported.insert(JAVA_TOOL_OPTIONS.to_string(), options.join(" "));
    Some(exported)
}
