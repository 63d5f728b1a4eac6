//! Build command - plan and contribute runtime layers

use crate::build::{build, BomEntry, BuildContext, BuildPlan};
use crate::cli::args::{BuildArgs, OutputFormat};
use crate::config::{BuildpackDescriptor, Env};
use crate::dependency::LocalDependencyCache;
use crate::error::JvmResult;
use crate::jvm::ContributedLayer;
use crate::layer::{ContributionOutcome, Layers};
use console::{style, Emoji};
use serde::Serialize;
use tracing::info;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static REUSED: Emoji<'_, '_> = Emoji("↺ ", "[CACHED] ");

#[derive(Serialize)]
struct LayerSummary<'a> {
    name: &'a str,
    outcome: ContributionOutcome,
}

#[derive(Serialize)]
struct BuildSummary<'a> {
    layers: Vec<LayerSummary<'a>>,
    bom: &'a [BomEntry],
}

/// Execute the build command
pub fn execute(args: BuildArgs, env: &Env) -> JvmResult<()> {
    let ctx = BuildContext {
        application_path: args.app,
        buildpack: BuildpackDescriptor::from_dir(&args.buildpack_dir)?,
        buildpack_path: args.buildpack_dir,
        layers_path: args.layers.clone(),
        plan: BuildPlan::from_file(&args.plan)?,
        stack_id: args.stack,
        env: env.clone(),
    };

    let result = build(&ctx)?;
    info!(
        "Contributing {} layer(s) to {}",
        result.contributors.len(),
        args.layers.display()
    );

    let layers = Layers::new(&args.layers);
    let cache = LocalDependencyCache::new(&args.cache);
    let contributed = result.contribute(&layers, &cache)?;

    match args.format {
        OutputFormat::Json => print_json(&contributed, &result.bom)?,
        OutputFormat::Text => print_text(&contributed),
    }
    Ok(())
}

fn print_json(contributed: &[ContributedLayer], bom: &[BomEntry]) -> JvmResult<()> {
    let summary = BuildSummary {
        layers: contributed
            .iter()
            .map(|c| LayerSummary {
                name: &c.layer.name,
                outcome: c.outcome,
            })
            .collect(),
        bom,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_text(contributed: &[ContributedLayer]) {
    for c in contributed {
        match c.outcome {
            ContributionOutcome::Contributed => {
                println!("  {}{}", CHECK, style(&c.layer.name).green())
            }
            ContributionOutcome::Skipped => {
                println!("  {}{} {}", REUSED, c.layer.name, style("(cached)").dim())
            }
        }
    }
}
