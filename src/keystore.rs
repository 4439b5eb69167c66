//! Keystore and truststore assembly.
//!
//! Each registered identity gets a keystore bundling its key, its certificate
//! and the intermediate certificate. One truststore per platform holds the
//! root and intermediate certificates; it is the only value that unlocks the
//! trust stage.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PkiError, Result};
use crate::external_interface::{StoreTool, ToolOutput};
use crate::material::MaterialKind;
use crate::protocol::StoreRequest;
use crate::registry::{MaterialEntry, MaterialRegistry};

const STAGE: &str = "keystore assembly";

/// Build the keystore of one entry and attach its path.
pub fn build_keystore(
    entry: &mut MaterialEntry,
    intermediate_cert: &Path,
    store: &dyn StoreTool,
    password: &SecretString,
) -> Result<ToolOutput> {
    if entry.keystore().is_some() {
        return Err(PkiError::KeystoreAlreadyBuilt(entry.name.clone()));
    }
    entry.verify_key_and_certificate()?;

    let path = MaterialKind::Keystore.path_in(&entry.directory, &entry.name);
    let request = StoreRequest::Create {
        key: entry.private_key.clone(),
        cert: entry.certificate.clone(),
        chain: intermediate_cert.to_path_buf(),
        store: path.clone(),
    };
    let output = store.store(&request, password)?;
    ensure_written(&path, &output)?;

    entry.attach_keystore(path)?;
    info!(identity = %entry.name, "keystore built");
    Ok(output)
}

/// Build keystores for every entry, in issuance order.
pub fn build_keystores(
    registry: &mut MaterialRegistry,
    intermediate_cert: &Path,
    store: &dyn StoreTool,
    password: &SecretString,
) -> Result<Vec<ToolOutput>> {
    let mut outputs = Vec::with_capacity(registry.len());
    for entry in registry.iter_mut() {
        let output = build_keystore(entry, intermediate_cert, store, password)
            .map_err(|e| e.in_stage(STAGE, entry.name.as_str()))?;
        outputs.push(output);
    }
    Ok(outputs)
}

/// Truststore holding the CA certificates of one platform.
///
/// Only [`build_truststore`] produces one, so holding a `Truststore` means
/// both CA certificates were imported.
#[derive(Debug, Clone)]
pub struct Truststore {
    path: PathBuf,
}

impl Truststore {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Import the root certificate, then the intermediate, into `path`.
pub fn build_truststore(
    root_cert: &Path,
    intermediate_cert: &Path,
    path: &Path,
    store: &dyn StoreTool,
    password: &SecretString,
) -> Result<(Truststore, Vec<ToolOutput>)> {
    let mut outputs = Vec::with_capacity(2);
    for cafile in [root_cert, intermediate_cert] {
        if !cafile.is_file() {
            return Err(PkiError::CertificateNotFound(cafile.to_path_buf()));
        }
        let request = StoreRequest::Import {
            cafile: cafile.to_path_buf(),
            store: path.to_path_buf(),
        };
        outputs.push(store.store(&request, password)?);
    }
    ensure_written(path, outputs.last().unwrap_or(&ToolOutput::default()))?;

    info!(truststore = ?path, "truststore built");
    Ok((
        Truststore {
            path: path.to_path_buf(),
        },
        outputs,
    ))
}

fn ensure_written(path: &Path, output: &ToolOutput) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(PkiError::ExternalToolFailed {
        tool: output.tool.clone(),
        status: Some(0),
        output: format!("did not write {}: {}", path.display(), output.output),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_interface::fakes::FakeStore;
    use std::fs;
    use tempfile::TempDir;

    fn issued(tmp: &TempDir, name: &str) -> MaterialEntry {
        let entry = MaterialEntry::from_directory(name, name, &tmp.path().join(name));
        for path in [&entry.private_key, &entry.certificate] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, name).unwrap();
        }
        entry
    }

    fn password() -> SecretString {
        SecretString::from("changeit".to_string())
    }

    #[test]
    fn keystore_bundles_key_cert_and_chain() {
        let tmp = TempDir::new().unwrap();
        let mut entry = issued(&tmp, "web1");
        let store = FakeStore::default();
        let chain = tmp.path().join("inter.crt");

        build_keystore(&mut entry, &chain, &store, &password()).unwrap();

        let expected = tmp.path().join("web1/private/web1-keystore.jks");
        assert_eq!(entry.keystore(), Some(expected.as_path()));
        assert_eq!(
            store.requests.borrow()[0],
            StoreRequest::Create {
                key: entry.private_key.clone(),
                cert: entry.certificate.clone(),
                chain,
                store: expected,
            }
        );
        assert!(matches!(
            build_keystore(&mut entry, tmp.path(), &store, &password()),
            Err(PkiError::KeystoreAlreadyBuilt(_))
        ));
    }

    #[test]
    fn missing_key_is_reported_before_the_tool_runs() {
        let tmp = TempDir::new().unwrap();
        let mut entry = issued(&tmp, "web1");
        fs::remove_file(&entry.private_key).unwrap();
        let store = FakeStore::default();

        assert!(matches!(
            build_keystore(&mut entry, tmp.path(), &store, &password()),
            Err(PkiError::PrivateKeyNotFound(_))
        ));
        assert!(store.requests.borrow().is_empty());
    }

    #[test]
    fn unwritten_keystore_is_a_tool_failure() {
        let tmp = TempDir::new().unwrap();
        let mut registry = MaterialRegistry::new();
        registry.register(issued(&tmp, "web1")).unwrap();
        let store = FakeStore {
            skip_write: true,
            ..Default::default()
        };
        let err = build_keystores(&mut registry, tmp.path(), &store, &password()).unwrap_err();
        assert!(matches!(err.root_cause(), PkiError::ExternalToolFailed { .. }));
        assert!(registry.get("web1").unwrap().keystore().is_none());
    }

    #[test]
    fn truststore_imports_root_then_intermediate() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root.crt");
        let inter = tmp.path().join("inter.crt");
        fs::write(&root, "r").unwrap();
        fs::write(&inter, "i").unwrap();
        let path = tmp.path().join("p/truststore.jks");
        let store = FakeStore::default();

        let (truststore, outputs) =
            build_truststore(&root, &inter, &path, &store, &password()).unwrap();

        assert_eq!(truststore.path(), path);
        assert_eq!(outputs.len(), 2);
        let cafiles: Vec<PathBuf> = store
            .requests
            .borrow()
            .iter()
            .map(|r| match r {
                StoreRequest::Import { cafile, .. } => cafile.clone(),
                other => panic!("unexpected request {other:?}"),
            })
            .collect();
        assert_eq!(cafiles, vec![root, inter]);
    }
}
