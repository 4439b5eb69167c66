use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::warn;

use super::{banner, confirmed, done, step, CommandContext, Targets};
use crate::certificate_authority::{ensure_ready, CertificateAuthority};
use crate::error::PkiError;
use crate::export::export_certs;
use crate::generate_user_keypair::issue_all;
use crate::platform_config::PlatformConfig;
use crate::purge::delete_certs;
use crate::registry::MaterialRegistry;
use crate::ui;

/// Handle `certs create`
///
/// Issues every identity of the platform configuration, or a single `default`
/// identity when none is given. A missing CA is created first.
pub fn handle_create(
    ctx: &CommandContext,
    ca_name: Option<&str>,
    config_path: Option<&Path>,
) -> Result<MaterialRegistry> {
    let alias = ctx.ca_name(ca_name)?;
    let config = match config_path {
        Some(path) => PlatformConfig::from_file(path)?,
        None => PlatformConfig::single_default(),
    };
    banner(&format!("ISSUING CERTIFICATES FROM '{alias}'"));

    let ca = CertificateAuthority::new(&ctx.workspace, &alias);
    match ca.check_health() {
        Ok(()) => {}
        Err(PkiError::CaNotFound(_)) => {
            warn!(ca = %alias, "CA not found, creating it");
            ensure_ready(&ca, ctx.signer, ctx.config.policy.ca_exists)
                .with_context(|| format!("Failed to create CA '{alias}'"))?;
            ctx.workspace.set_current_ca(&alias)?;
            step(format!("created CA '{alias}'"));
        }
        Err(e) => return Err(e).with_context(|| format!("CA '{alias}' is not usable")),
    }

    let mut registry = MaterialRegistry::new();
    issue_all(
        &ca,
        ctx.signer,
        &config.hosts,
        ctx.config.policy.identity_exists,
        &mut registry,
    )?;
    for entry in registry.iter() {
        step(format!("{} ({})", entry.name, entry.certificate.display()));
    }
    done(&format!("{} CERTIFICATE(S) AVAILABLE", registry.len()));
    Ok(registry)
}

/// Handle `certs list`
pub fn handle_list(ctx: &CommandContext, ca_name: Option<&str>) -> Result<()> {
    let alias = ctx.ca_name(ca_name)?;
    let ca = CertificateAuthority::new(&ctx.workspace, &alias);
    let mut identities = Vec::new();
    for identity in ca.list_identities()? {
        let files = ca.identity_files(&identity)?;
        identities.push((identity, files));
    }
    print!("{}", ui::render_identity_tree(&alias, &identities));
    Ok(())
}

/// Handle `certs delete`
pub fn handle_delete(
    ctx: &CommandContext,
    ca_name: Option<&str>,
    targets: Targets,
    assume_yes: bool,
) -> Result<()> {
    let alias = ctx.ca_name(ca_name)?;
    let ca = CertificateAuthority::new(&ctx.workspace, &alias);
    let names = targets.resolve(ca.list_identities()?);
    if names.is_empty() {
        bail!("No certificate selected for deletion in CA '{alias}'");
    }
    if !confirmed(&format!("Deleting certificates of '{alias}'"), &names, assume_yes)? {
        return Ok(());
    }
    delete_certs(&ca, &names).context("Failed to delete certificates")?;
    for name in &names {
        step(format!("deleted {name}"));
    }
    Ok(())
}

/// Handle `certs export`
pub fn handle_export(
    ctx: &CommandContext,
    ca_name: Option<&str>,
    output_dir: &Path,
    names: &[String],
) -> Result<()> {
    let alias = ctx.ca_name(ca_name)?;
    let ca = CertificateAuthority::new(&ctx.workspace, &alias);
    let filter = (!names.is_empty()).then_some(names);
    let target = export_certs(&ca, output_dir, filter)
        .with_context(|| format!("Failed to export certificates of '{alias}'"))?;
    step(format!("exported to {}", target.display()));
    Ok(())
}
