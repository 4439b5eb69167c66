//! Deletion of CAs, issued identities and platform workspaces.
//!
//! Every target is validated before anything is removed, so a typo in one name
//! leaves the others untouched.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::certificate_authority::CertificateAuthority;
use crate::error::{PkiError, Result};
use crate::platform_config::{validate_identity_name, RESERVED_NAMES};
use crate::storage::Workspace;

/// Remove whole CA trees. Clears the current-CA pointer if it names a deleted CA.
pub fn delete_cas(workspace: &Workspace, names: &[String]) -> Result<()> {
    let cas: Vec<CertificateAuthority> = names
        .iter()
        .map(|name| CertificateAuthority::new(workspace, name))
        .collect();
    if let Some(missing) = cas
        .iter()
        .find(|ca| validate_identity_name(&ca.alias).is_err() || !ca.exists())
    {
        return Err(PkiError::CaNotFound(missing.alias.clone()));
    }

    let mut metadata = workspace.read_metadata()?;
    for ca in &cas {
        fs::remove_dir_all(&ca.dir)?;
        info!(ca = %ca.alias, "CA deleted");
        if metadata.current.as_deref() == Some(ca.alias.as_str()) {
            metadata.current = None;
        }
    }
    workspace.write_metadata(&metadata)
}

/// Remove issued identities from a CA. The CA's own material cannot be targeted.
pub fn delete_certs(ca: &CertificateAuthority, names: &[String]) -> Result<()> {
    let issued = ca.list_identities()?;
    for name in names {
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(PkiError::ConfigurationInvalid(format!(
                "'{name}' belongs to the CA itself; delete the CA instead"
            )));
        }
        if !issued.contains(name) {
            return Err(PkiError::CertificateNotFound(ca.identity_dir(name)));
        }
    }
    for name in names {
        fs::remove_dir_all(ca.identity_dir(name))?;
        info!(ca = %ca.alias, identity = %name, "certificate deleted");
    }
    Ok(())
}

/// Remove platform workspaces under `platforms_dir`.
pub fn purge_platforms(platforms_dir: &Path, names: &[String]) -> Result<()> {
    if let Some(missing) = names
        .iter()
        .find(|name| validate_identity_name(name).is_err() || !platforms_dir.join(name).is_dir())
    {
        return Err(PkiError::PlatformNotFound(missing.clone()));
    }
    for name in names {
        fs::remove_dir_all(platforms_dir.join(name))?;
        info!(platform = %name, "platform purged");
    }
    Ok(())
}
