//! Heap dump command - launch-time helper output

use crate::config::Env;
use crate::error::JvmResult;
use crate::helper::heap_dump_env;
use chrono::Utc;

/// Execute the heap-dump command; prints nothing when disabled
pub fn execute(env: &Env) -> JvmResult<()> {
    if let Some(exported) = heap_dump_env(env, Utc::now()) {
        print!("{}", toml::to_string(&exported)?);
    }
    Ok(())
}
