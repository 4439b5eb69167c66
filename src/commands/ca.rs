use anyhow::{bail, Context, Result};

use super::{banner, confirmed, done, step, CommandContext, Targets};
use crate::certificate_authority::{ensure_ready, CertificateAuthority};
use crate::error::PkiError;
use crate::platform_config::validate_identity_name;
use crate::purge::delete_cas;
use crate::ui;

/// Handle `ca list`
pub fn handle_list(ctx: &CommandContext) -> Result<()> {
    let cas = ctx.workspace.list_cas()?;
    if cas.is_empty() {
        println!("No CA in {}", ctx.workspace.path().display());
        return Ok(());
    }
    let current = ctx.workspace.current_ca()?;
    print!("{}", ui::render_ca_list(&cas, current.as_deref()));
    Ok(())
}

/// Handle `ca create`
///
/// Creates the root CA, then the intermediate, and makes the CA current.
pub fn handle_create(ctx: &CommandContext, name: Option<&str>) -> Result<()> {
    let alias = name.unwrap_or(ctx.config.workspace.default_ca.as_str());
    validate_identity_name(alias)?;
    banner(&format!("CREATING CA '{alias}'"));

    let ca = CertificateAuthority::new(&ctx.workspace, alias);
    ensure_ready(&ca, ctx.signer, ctx.config.policy.ca_exists)
        .with_context(|| format!("Failed to create CA '{alias}'"))?;
    step(format!("root CA:         {}", ca.root_cert.display()));
    step(format!("intermediate CA: {}", ca.intermediate_cert.display()));
    step(format!("chain file:      {}", ca.chain_file.display()));

    ctx.workspace.set_current_ca(alias)?;
    done(&format!("CA '{alias}' READY AND CURRENT"));
    Ok(())
}

/// Handle `ca delete`
pub fn handle_delete(ctx: &CommandContext, targets: Targets, assume_yes: bool) -> Result<()> {
    let names = targets.resolve(ctx.workspace.list_cas()?);
    if names.is_empty() {
        bail!("No CA selected for deletion");
    }
    if !confirmed("Deleting CA", &names, assume_yes)? {
        return Ok(());
    }
    delete_cas(&ctx.workspace, &names).context("Failed to delete CA")?;
    for name in &names {
        step(format!("deleted {name}"));
    }
    Ok(())
}

/// Handle `ca set-current`
pub fn handle_set_current(ctx: &CommandContext, name: &str) -> Result<()> {
    validate_identity_name(name)?;
    let ca = CertificateAuthority::new(&ctx.workspace, name);
    if !ca.exists() {
        return Err(PkiError::CaNotFound(name.to_string()).into());
    }
    ctx.workspace.set_current_ca(name)?;
    step(format!("current CA is now '{name}'"));
    Ok(())
}
