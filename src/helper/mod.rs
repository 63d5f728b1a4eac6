//! Launch-time helpers
//!
//! Helpers run from `exec.d` when the application container starts and
//! return environment variables to export.

pub mod heap_dump;

pub use heap_dump::{heap_dump_env, BPL_HEAP_DUMP_PATH};
