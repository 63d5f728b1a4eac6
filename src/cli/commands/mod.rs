//! CLI command implementations

pub mod build;
pub mod detect;
pub mod heap_dump;

pub use build::execute as build;
pub use detect::execute as detect;
pub use heap_dump::execute as heap_dump;
