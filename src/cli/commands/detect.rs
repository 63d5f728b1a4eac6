//! Detect command - offer build plan alternatives

use crate::cli::args::DetectArgs;
use crate::config::{BuildpackDescriptor, Env};
use crate::detect::{detect, DETECT_FAIL_EXIT_CODE};
use crate::error::{JvmError, JvmResult};
use std::fs;
use std::process::ExitCode;
use tracing::debug;

/// Execute the detect command
pub fn execute(args: DetectArgs, env: &Env) -> JvmResult<ExitCode> {
    let buildpack = BuildpackDescriptor::from_dir(&args.buildpack_dir)?;
    let result = detect(&buildpack.metadata.configurations, env)?;

    if !result.pass {
        return Ok(ExitCode::from(DETECT_FAIL_EXIT_CODE));
    }

    let plan = result.to_toml()?;
    match args.output {
        Some(path) => {
            debug!("Writing build plan to {}", path.display());
            fs::write(&path, plan)
                .map_err(|e| JvmError::io(format!("writing {}", path.display()), e))?;
        }
        None => print!("{}", plan),
    }
    Ok(ExitCode::SUCCESS)
}
