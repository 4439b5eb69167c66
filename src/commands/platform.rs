use anyhow::{bail, Context, Result};
use std::path::Path;

use super::{banner, confirmed, done, step, CommandContext, Targets};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::platform_config::PlatformConfig;
use crate::purge::purge_platforms;
use crate::storage::list_platforms;

/// Handle `platform generate`
///
/// Runs the whole pipeline and prints one line per completed stage.
pub fn handle_generate(
    ctx: &CommandContext,
    config_path: &Path,
    name: Option<&str>,
    ca_name: Option<&str>,
) -> Result<PipelineContext> {
    let config = PlatformConfig::from_file(config_path)?;
    banner("GENERATING PLATFORM");
    println!(
        "📄 Configuration: {} (schema {}, {} host(s), {} identit(ies))\n",
        config_path.display(),
        config.version,
        config.hosts.len(),
        config.identity_count()
    );

    let pipeline = Pipeline::new(ctx.signer, ctx.store, ctx.config.policy.clone());
    let context = pipeline
        .run(
            &ctx.workspace,
            &ctx.config.workspace.platforms_path,
            &config,
            name,
            ca_name,
            &mut |stage| step(stage),
        )
        .context("Platform generation failed")?;

    println!("\n   Platform: {}", context.platform.root.display());
    println!("   CA:       {}", context.ca.alias);
    println!("   Log:      {}", context.platform.log_file.display());
    done(&format!("PLATFORM '{}' GENERATED", context.platform.name));
    Ok(context)
}

/// Handle `platform list`
pub fn handle_list(ctx: &CommandContext) -> Result<()> {
    let platforms_dir = &ctx.config.workspace.platforms_path;
    let platforms = list_platforms(platforms_dir)?;
    if platforms.is_empty() {
        println!("No platform in {}", platforms_dir.display());
    }
    for platform in platforms {
        println!("  {platform}");
    }
    Ok(())
}

/// Handle `platform purge`
pub fn handle_purge(ctx: &CommandContext, targets: Targets, assume_yes: bool) -> Result<()> {
    let platforms_dir = &ctx.config.workspace.platforms_path;
    let names = targets.resolve(list_platforms(platforms_dir)?);
    if names.is_empty() {
        bail!("No platform selected for purge");
    }
    if !confirmed("Purging platforms", &names, assume_yes)? {
        return Ok(());
    }
    purge_platforms(platforms_dir, &names).context("Failed to purge platforms")?;
    for name in &names {
        step(format!("purged {name}"));
    }
    Ok(())
}
