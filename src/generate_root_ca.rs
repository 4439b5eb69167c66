//! Root CA Generation Module
//!
//! Asks the signer for a self-signed root CA, the trust anchor at the top of
//! every hierarchy this tool builds.
//!
//! # PKI Hierarchy Position
//! ```text
//! Root CA (self-signed) ← This module
//!   └── Intermediate CA (signed by Root)
//!       └── Leaf Certificate (signed by Intermediate)
//! ```
//!
//! # Output
//! - `{ca}/root/certs/{ca}_root.crt`
//! - `{ca}/root/private/{ca}_root.p8`
//!
//! When the CA directory already exists, the configured [`ExistingPolicy`]
//! decides between failing, keeping the existing root, or regenerating the
//! whole CA.

use std::fs;
use tracing::{info, warn};

use crate::certificate_authority::CertificateAuthority;
use crate::configs::ExistingPolicy;
use crate::error::{PkiError, Result};
use crate::external_interface::{Signer, ToolOutput};
use crate::protocol::SignerRequest;

/// Create the root CA of `ca`.
///
/// Returns `None` when an existing root was kept.
pub fn create_root(
    ca: &CertificateAuthority,
    signer: &dyn Signer,
    policy: ExistingPolicy,
) -> Result<Option<ToolOutput>> {
    if ca.exists() {
        match policy {
            ExistingPolicy::Fail => return Err(PkiError::CaAlreadyExists(ca.alias.clone())),
            ExistingPolicy::Skip if ca.root_dir.is_dir() => {
                warn!(ca = %ca.alias, "root CA already exists, keeping it");
                return Ok(None);
            }
            ExistingPolicy::Skip => {}
            ExistingPolicy::Overwrite => {
                // the intermediate and every leaf depend on the old root
                warn!(ca = %ca.alias, "removing existing CA before regenerating root");
                fs::remove_dir_all(&ca.dir)?;
            }
        }
    }

    let request = SignerRequest::Root {
        name: ca.root_stem(),
        out_dir: ca.root_dir.clone(),
    };
    let output = signer.sign(&request)?;

    if !ca.root_cert.is_file() {
        return Err(PkiError::CertificateNotFound(ca.root_cert.clone()));
    }
    if !ca.root_key.is_file() {
        return Err(PkiError::PrivateKeyNotFound(ca.root_key.clone()));
    }
    info!(ca = %ca.alias, cert = ?ca.root_cert, "root CA created");
    Ok(Some(output))
}
