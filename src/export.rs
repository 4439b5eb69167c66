//! Export of generated material.
//!
//! [`extract`] lays out a platform directory host by host. [`export_certs`]
//! copies a CA's issued identities into an arbitrary output directory.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::certificate_authority::{material_files, CertificateAuthority};
use crate::error::{PkiError, Result};
use crate::material::CA_CHAIN_FILE_NAME;
use crate::registry::MaterialRegistry;
use crate::storage::PlatformWorkspace;

/// Copy the chain file to the platform root, then every entry's keystore,
/// certificate and key into `{platform}/{host}/`.
pub fn extract(
    platform: &PlatformWorkspace,
    registry: &MaterialRegistry,
    chain_file: &Path,
) -> Result<()> {
    if !chain_file.is_file() {
        return Err(PkiError::CertificateNotFound(chain_file.to_path_buf()));
    }
    fs::copy(chain_file, platform.root.join(CA_CHAIN_FILE_NAME))?;

    for entry in registry.iter() {
        let keystore = entry
            .keystore()
            .ok_or_else(|| PkiError::KeystoreNotFound(entry.name.clone()))?;
        entry.verify_key_and_certificate()?;

        let host_dir = platform.host_dir(&entry.host);
        fs::create_dir_all(&host_dir)?;
        for source in [keystore, entry.certificate.as_path(), entry.private_key.as_path()] {
            copy_into(source, &host_dir)?;
        }
    }
    info!(platform = %platform.name, hosts = registry.hosts().len(), "material extracted");
    Ok(())
}

/// Copy a CA's chain file and issued identities to `{output_dir}/{alias}/`.
///
/// `names` restricts the export to the listed identities; every listed name
/// must exist. Returns the directory written.
pub fn export_certs(
    ca: &CertificateAuthority,
    output_dir: &Path,
    names: Option<&[String]>,
) -> Result<PathBuf> {
    ca.check_health()?;
    let issued = ca.list_identities()?;
    let selected: Vec<String> = match names {
        Some(names) => {
            if let Some(unknown) = names.iter().find(|n| !issued.contains(*n)) {
                return Err(PkiError::CertificateNotFound(ca.identity_dir(unknown)));
            }
            names.to_vec()
        }
        None => issued,
    };

    let target = output_dir.join(&ca.alias);
    fs::create_dir_all(&target)?;
    fs::copy(&ca.chain_file, target.join(CA_CHAIN_FILE_NAME))?;

    for identity in &selected {
        let identity_dir = target.join(identity);
        fs::create_dir_all(&identity_dir)?;
        for file in material_files(&ca.identity_dir(identity))? {
            copy_into(&file, &identity_dir)?;
        }
    }
    info!(ca = %ca.alias, count = selected.len(), target = ?target, "certificates exported");
    Ok(target)
}

fn copy_into(source: &Path, dir: &Path) -> Result<()> {
    let file_name = source
        .file_name()
        .ok_or_else(|| PkiError::CertificateNotFound(source.to_path_buf()))?;
    let destination = dir.join(file_name);
    debug!(from = ?source, to = ?destination, "copying");
    fs::copy(source, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate_authority::ensure_ready;
    use crate::configs::ExistingPolicy;
    use crate::external_interface::fakes::FakeSigner;
    use crate::generate_user_keypair::issue_all;
    use crate::platform_config::HostConfiguration;
    use tempfile::TempDir;

    fn issued_ca(tmp: &TempDir) -> (CertificateAuthority, MaterialRegistry) {
        let signer = FakeSigner::default();
        let ca = CertificateAuthority::at(tmp.path().join("ws/acme"), "acme");
        ensure_ready(&ca, &signer, ExistingPolicy::Skip).unwrap();
        let hosts = vec![
            HostConfiguration::new("web1", "10.0.0.1", None, None, true),
            HostConfiguration::new("db1", "10.0.0.2", None, None, false),
        ];
        let mut registry = MaterialRegistry::new();
        issue_all(&ca, &signer, &hosts, ExistingPolicy::Skip, &mut registry).unwrap();
        (ca, registry)
    }

    #[test]
    fn extract_groups_identities_by_host() {
        let tmp = TempDir::new().unwrap();
        let (ca, mut registry) = issued_ca(&tmp);
        for entry in registry.iter_mut() {
            let keystore = entry.directory.join("private").join(format!("{}-keystore.jks", entry.name));
            fs::write(&keystore, "ks").unwrap();
            entry.attach_keystore(keystore).unwrap();
        }
        let platform = PlatformWorkspace::create(&tmp.path().join("platforms"), Some("p1")).unwrap();

        extract(&platform, &registry, &ca.chain_file).unwrap();

        assert!(platform.root.join("ca_file.crt").is_file());
        let mut web1: Vec<String> = fs::read_dir(platform.host_dir("web1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        web1.sort();
        assert_eq!(
            web1,
            vec![
                "admin-web1-keystore.jks",
                "admin-web1.crt",
                "admin-web1.p8",
                "web1-keystore.jks",
                "web1.crt",
                "web1.p8"
            ]
        );
        assert!(platform.host_dir("db1").join("db1.crt").is_file());
        assert!(!platform.host_dir("admin-web1").exists());
    }

    #[test]
    fn extract_requires_keystores() {
        let tmp = TempDir::new().unwrap();
        let (ca, registry) = issued_ca(&tmp);
        let platform = PlatformWorkspace::create(&tmp.path().join("platforms"), Some("p1")).unwrap();
        assert!(matches!(
            extract(&platform, &registry, &ca.chain_file),
            Err(PkiError::KeystoreNotFound(_))
        ));
    }

    #[test]
    fn export_copies_selected_identities() {
        let tmp = TempDir::new().unwrap();
        let (ca, _) = issued_ca(&tmp);
        let out = tmp.path().join("out");

        let target = export_certs(&ca, &out, Some(&["db1".to_string()][..])).unwrap();

        assert_eq!(target, out.join("acme"));
        assert!(target.join("ca_file.crt").is_file());
        assert!(target.join("db1/db1.crt").is_file());
        assert!(target.join("db1/db1.p8").is_file());
        assert!(!target.join("web1").exists());

        let err = export_certs(&ca, &out, Some(&["nope".to_string()][..])).unwrap_err();
        assert!(matches!(err, PkiError::CertificateNotFound(_)));
    }

    #[test]
    fn export_everything_by_default() {
        let tmp = TempDir::new().unwrap();
        let (ca, _) = issued_ca(&tmp);
        let target = export_certs(&ca, &tmp.path().join("out"), None).unwrap();
        for identity in ["admin-web1", "db1", "web1"] {
            assert!(target.join(identity).join(format!("{identity}.crt")).is_file());
        }
    }
}
