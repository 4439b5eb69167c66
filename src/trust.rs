//! Trust import: mark issued leaf certificates as trusted against the CA chain.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PkiError, Result};
use crate::external_interface::{Signer, ToolOutput};
use crate::keystore::Truststore;
use crate::protocol::SignerRequest;

/// Hand every certificate to the signer in one trust request.
///
/// Requires a built [`Truststore`]. An empty list is a no-op.
pub fn trust_certificates(
    truststore: &Truststore,
    chain_file: &Path,
    certificates: &[PathBuf],
    signer: &dyn Signer,
) -> Result<Option<ToolOutput>> {
    if certificates.is_empty() {
        debug!("no certificates to trust");
        return Ok(None);
    }
    if !chain_file.is_file() {
        return Err(PkiError::CertificateNotFound(chain_file.to_path_buf()));
    }
    if let Some(missing) = certificates.iter().find(|c| !c.is_file()) {
        return Err(PkiError::CertificateNotFound(missing.clone()));
    }

    let request = SignerRequest::Trust {
        chain_file: chain_file.to_path_buf(),
        certificates: certificates.to_vec(),
    };
    let output = signer.sign(&request)?;
    info!(
        count = certificates.len(),
        truststore = ?truststore.path(),
        "certificates trusted"
    );
    Ok(Some(output))
}
