//! Intermediate CA Generation Module
//!
//! Asks the signer for the signing CA of a hierarchy, issued by its root.
//! Leaf certificates are only ever signed by this intermediate, so the root
//! key is used once per CA.
//!
//! # PKI Hierarchy Position
//! ```text
//! Root CA (self-signed)
//!   └── Intermediate CA (signed by Root) ← This module
//!       └── Leaf Certificate (signed by Intermediate)
//! ```
//!
//! # Output
//! - `{ca}/intermediate/certs/{ca}_intermediate.crt`
//! - `{ca}/intermediate/private/{ca}_intermediate.p8`
//! - `{ca}/intermediate/certs/ca_file.crt`: root and intermediate
//!   concatenated, used as the chain for keystores and trust marking

use std::fs;
use tracing::{info, warn};

use crate::certificate_authority::{CaState, CertificateAuthority};
use crate::configs::ExistingPolicy;
use crate::error::{PkiError, Result};
use crate::external_interface::{Signer, ToolOutput};
use crate::protocol::SignerRequest;

/// Subject CN given to every intermediate.
pub const INTERMEDIATE_CN: &str = "intermediate";

/// Create the intermediate CA of `ca`. The root must already exist.
///
/// Returns `None` when an existing intermediate was kept.
pub fn create_intermediate(
    ca: &CertificateAuthority,
    signer: &dyn Signer,
    policy: ExistingPolicy,
) -> Result<Option<ToolOutput>> {
    if ca.state() == CaState::Absent {
        return Err(PkiError::RootCaNotFound(ca.alias.clone()));
    }

    if ca.intermediate_dir.is_dir() {
        match policy {
            ExistingPolicy::Fail => return Err(PkiError::CaAlreadyExists(ca.alias.clone())),
            ExistingPolicy::Skip => {
                warn!(ca = %ca.alias, "intermediate CA already exists, keeping it");
                return Ok(None);
            }
            ExistingPolicy::Overwrite => {
                warn!(ca = %ca.alias, "removing existing intermediate CA");
                fs::remove_dir_all(&ca.intermediate_dir)?;
            }
        }
    }

    let request = SignerRequest::Intermediate {
        name: ca.intermediate_stem(),
        out_dir: ca.intermediate_dir.clone(),
        issuer_dir: ca.root_dir.clone(),
        cn: INTERMEDIATE_CN.to_string(),
    };
    let output = signer.sign(&request)?;

    for cert in [&ca.intermediate_cert, &ca.chain_file] {
        if !cert.is_file() {
            return Err(PkiError::CertificateNotFound(cert.clone()));
        }
    }
    if !ca.intermediate_key.is_file() {
        return Err(PkiError::PrivateKeyNotFound(ca.intermediate_key.clone()));
    }
    info!(ca = %ca.alias, cert = ?ca.intermediate_cert, "intermediate CA created");
    Ok(Some(output))
}
