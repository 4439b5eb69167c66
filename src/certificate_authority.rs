//! Certificate Authority layout and health.
//!
//! A CA lives in `{workspace}/{alias}` and is made of a self-signed root and a
//! signing intermediate issued by it. Issued identities sit next to them.
//!
//! ```text
//! {alias}/
//!   root/          certs/{alias}_root.crt          private/{alias}_root.p8
//!   intermediate/  certs/{alias}_intermediate.crt  private/{alias}_intermediate.p8
//!                  certs/ca_file.crt   (root + intermediate chain)
//!   {identity}/    certs/{identity}.crt            private/{identity}.p8
//! ```

use std::path::{Path, PathBuf};
use tracing::info;

use crate::configs::ExistingPolicy;
use crate::error::{PkiError, Result};
use crate::external_interface::{Signer, ToolOutput};
use crate::generate_intermediate_ca::create_intermediate;
use crate::generate_root_ca::create_root;
use crate::material::{MaterialKind, CA_CHAIN_FILE_NAME};
use crate::storage::{self, Workspace};

pub const ROOT_DIR_NAME: &str = "root";
pub const INTERMEDIATE_DIR_NAME: &str = "intermediate";

/// Lifecycle state derived from what is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaState {
    Absent,
    RootCreated,
    /// Root and intermediate material are both present.
    Ready,
}

/// Canonical paths of one CA.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    pub alias: String,
    pub dir: PathBuf,
    pub root_dir: PathBuf,
    pub root_cert: PathBuf,
    pub root_key: PathBuf,
    pub intermediate_dir: PathBuf,
    pub intermediate_cert: PathBuf,
    pub intermediate_key: PathBuf,
    /// Root + intermediate concatenation used as the trust anchor.
    pub chain_file: PathBuf,
}

impl CertificateAuthority {
    pub fn new(workspace: &Workspace, alias: &str) -> Self {
        Self::at(workspace.ca_dir(alias), alias)
    }

    pub fn at(dir: PathBuf, alias: &str) -> Self {
        let root_dir = dir.join(ROOT_DIR_NAME);
        let intermediate_dir = dir.join(INTERMEDIATE_DIR_NAME);
        let root_stem = format!("{alias}_{ROOT_DIR_NAME}");
        let intermediate_stem = format!("{alias}_{INTERMEDIATE_DIR_NAME}");
        CertificateAuthority {
            alias: alias.to_string(),
            root_cert: MaterialKind::Certificate.path_in(&root_dir, &root_stem),
            root_key: MaterialKind::PrivateKey.path_in(&root_dir, &root_stem),
            intermediate_cert: MaterialKind::Certificate.path_in(&intermediate_dir, &intermediate_stem),
            intermediate_key: MaterialKind::PrivateKey.path_in(&intermediate_dir, &intermediate_stem),
            chain_file: intermediate_dir
                .join(MaterialKind::Certificate.parent_dir().unwrap_or("certs"))
                .join(CA_CHAIN_FILE_NAME),
            root_dir,
            intermediate_dir,
            dir,
        }
    }

    /// File stem the signer uses for the root material.
    pub fn root_stem(&self) -> String {
        format!("{}_{ROOT_DIR_NAME}", self.alias)
    }

    /// File stem the signer uses for the intermediate material.
    pub fn intermediate_stem(&self) -> String {
        format!("{}_{INTERMEDIATE_DIR_NAME}", self.alias)
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn state(&self) -> CaState {
        let root = self.root_cert.is_file() && self.root_key.is_file();
        let intermediate = self.intermediate_cert.is_file()
            && self.intermediate_key.is_file()
            && self.chain_file.is_file();
        match (root, intermediate) {
            (true, true) => CaState::Ready,
            (true, false) => CaState::RootCreated,
            _ => CaState::Absent,
        }
    }

    /// Verify the CA directory and both root and intermediate material.
    ///
    /// Reports the first missing precondition, checking the CA directory, the
    /// root directory, its certificate and key, then the intermediate directory,
    /// its certificate, key and chain file.
    pub fn check_health(&self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(PkiError::CaNotFound(self.alias.clone()));
        }
        if !self.root_dir.is_dir() {
            return Err(PkiError::RootCaNotFound(self.alias.clone()));
        }
        check_pair(&self.root_cert, &self.root_key)?;
        if !self.intermediate_dir.is_dir() {
            return Err(PkiError::SigningCaNotFound(self.alias.clone()));
        }
        check_pair(&self.intermediate_cert, &self.intermediate_key)?;
        if !self.chain_file.is_file() {
            return Err(PkiError::CertificateNotFound(self.chain_file.clone()));
        }
        Ok(())
    }

    pub fn identity_dir(&self, identity: &str) -> PathBuf {
        self.dir.join(identity)
    }

    /// Names of issued identities, excluding the CA's own material.
    pub fn list_identities(&self) -> Result<Vec<String>> {
        if !self.exists() {
            return Err(PkiError::CaNotFound(self.alias.clone()));
        }
        Ok(storage::list_dir_names(&self.dir)?
            .into_iter()
            .filter(|name| name != ROOT_DIR_NAME && name != INTERMEDIATE_DIR_NAME)
            .collect())
    }

    /// Files under `certs/` and `private/` of one identity directory.
    pub fn identity_files(&self, identity: &str) -> Result<Vec<PathBuf>> {
        material_files(&self.identity_dir(identity))
    }
}

/// Files under `certs/` then `private/` of a generated directory.
pub fn material_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = storage::list_files(&dir.join("certs"))?;
    files.extend(storage::list_files(&dir.join("private"))?);
    Ok(files)
}

fn check_pair(cert: &Path, key: &Path) -> Result<()> {
    if !cert.is_file() {
        return Err(PkiError::CertificateNotFound(cert.to_path_buf()));
    }
    if !key.is_file() {
        return Err(PkiError::PrivateKeyNotFound(key.to_path_buf()));
    }
    Ok(())
}

/// Bring a CA to [`CaState::Ready`]: root first, then intermediate, then a
/// health check. Returns the output of every tool call made.
pub fn ensure_ready(
    ca: &CertificateAuthority,
    signer: &dyn Signer,
    policy: ExistingPolicy,
) -> Result<Vec<ToolOutput>> {
    let mut outputs = Vec::new();
    outputs.extend(create_root(ca, signer, policy)?);
    outputs.extend(create_intermediate(ca, signer, policy)?);
    ca.check_health()?;
    info!(ca = %ca.alias, "CA ready");
    Ok(outputs)
}
