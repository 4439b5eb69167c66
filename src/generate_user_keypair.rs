//! Leaf Certificate Issuance Module
//!
//! Issues end-entity certificates from the intermediate CA for every identity
//! of every configured host, and records the results in a [`MaterialRegistry`].
//!
//! # PKI Hierarchy Position
//! ```text
//! Root CA (self-signed)
//!   └── Intermediate CA (signed by Root)
//!       └── Leaf Certificate (signed by Intermediate) ← This module
//! ```
//!
//! Every identity of a host shares the host's SAN (`hostname,ip`) and optional
//! CN override. Material lands in `{ca}/{identity}/certs/{identity}.crt` and
//! `{ca}/{identity}/private/{identity}.p8`.

use std::fs;
use tracing::{info, warn};

use crate::certificate_authority::CertificateAuthority;
use crate::configs::ExistingPolicy;
use crate::error::{PkiError, Result};
use crate::external_interface::{Signer, ToolOutput};
use crate::platform_config::{validate_identity_name, HostConfiguration};
use crate::protocol::SignerRequest;
use crate::registry::{MaterialEntry, MaterialRegistry};

const STAGE: &str = "certificate issuance";

/// Issue one identity of `host` and register it.
///
/// An identity that already has a directory under the CA is handled per
/// `policy`: kept and registered as-is, refused, or removed and reissued.
pub fn issue_identity(
    ca: &CertificateAuthority,
    signer: &dyn Signer,
    host: &HostConfiguration,
    identity: &str,
    policy: ExistingPolicy,
    registry: &mut MaterialRegistry,
) -> Result<Option<ToolOutput>> {
    validate_identity_name(identity)?;
    let dir = ca.identity_dir(identity);
    let entry = MaterialEntry::from_directory(identity, &host.hostname, &dir);

    if dir.exists() {
        match policy {
            ExistingPolicy::Fail => {
                return Err(PkiError::IdentityAlreadyExists(identity.to_string()))
            }
            ExistingPolicy::Skip => {
                warn!(identity, "certificate already issued, reusing it");
                entry.verify_key_and_certificate()?;
                registry.register(entry)?;
                return Ok(None);
            }
            ExistingPolicy::Overwrite => {
                warn!(identity, "removing previously issued certificate");
                fs::remove_dir_all(&dir)?;
            }
        }
    }

    let request = SignerRequest::Leaf {
        name: identity.to_string(),
        out_dir: dir,
        issuer_dir: ca.intermediate_dir.clone(),
        san: host.san(),
        cn: host.cn.clone(),
    };
    let output = signer.sign(&request)?;

    entry.verify_key_and_certificate()?;
    info!(identity, host = %host.hostname, "certificate issued");
    registry.register(entry)?;
    Ok(Some(output))
}

/// Issue every identity of every host, in configuration order.
pub fn issue_all(
    ca: &CertificateAuthority,
    signer: &dyn Signer,
    hosts: &[HostConfiguration],
    policy: ExistingPolicy,
    registry: &mut MaterialRegistry,
) -> Result<Vec<ToolOutput>> {
    ca.check_health()?;

    let mut outputs = Vec::new();
    for host in hosts {
        for identity in &host.identities {
            let output = issue_identity(ca, signer, host, identity, policy, registry)
                .map_err(|e| e.in_stage(STAGE, identity.as_str()))?;
            outputs.extend(output);
        }
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate_authority::ensure_ready;
    use crate::external_interface::fakes::FakeSigner;
    use tempfile::TempDir;

    fn ready_ca(tmp: &TempDir, signer: &FakeSigner) -> CertificateAuthority {
        let ca = CertificateAuthority::at(tmp.path().join("acme"), "acme");
        ensure_ready(&ca, signer, ExistingPolicy::Skip).unwrap();
        ca
    }

    #[test]
    fn issues_every_identity_with_host_san() {
        let tmp = TempDir::new().unwrap();
        let signer = FakeSigner::default();
        let ca = ready_ca(&tmp, &signer);
        let hosts = vec![
            HostConfiguration::new("web1", "10.0.0.1", None, None, true),
            HostConfiguration::new(
                "db1",
                "10.0.0.2",
                Some("db.example.com".to_string()),
                Some(vec!["alice".to_string(), "bob".to_string()]),
                false,
            ),
        ];
        let mut registry = MaterialRegistry::new();
        let outputs =
            issue_all(&ca, &signer, &hosts, ExistingPolicy::Skip, &mut registry).unwrap();

        assert_eq!(outputs.len(), 4);
        let names: Vec<&str> = registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["web1", "admin-web1", "alice", "bob"]);
        assert_eq!(registry.get("admin-web1").unwrap().host, "web1");
        assert_eq!(registry.get("bob").unwrap().host, "db1");

        match &signer.requests.borrow()[4] {
            SignerRequest::Leaf {
                san,
                cn,
                issuer_dir,
                ..
            } => {
                assert_eq!(san, "db1,10.0.0.2");
                assert_eq!(cn.as_deref(), Some("db.example.com"));
                assert_eq!(issuer_dir, &ca.intermediate_dir);
            }
            other => panic!("unexpected request {other:?}"),
        };
    }

    #[test]
    fn reissue_skips_existing_identities() {
        let tmp = TempDir::new().unwrap();
        let signer = FakeSigner::default();
        let ca = ready_ca(&tmp, &signer);
        let hosts = vec![HostConfiguration::new("web1", "10.0.0.1", None, None, false)];

        issue_all(&ca, &signer, &hosts, ExistingPolicy::Skip, &mut MaterialRegistry::new())
            .unwrap();
        let mut registry = MaterialRegistry::new();
        let outputs =
            issue_all(&ca, &signer, &hosts, ExistingPolicy::Skip, &mut registry).unwrap();

        assert!(outputs.is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(ca.list_identities().unwrap(), vec!["web1"]);

        let err = issue_all(&ca, &signer, &hosts, ExistingPolicy::Fail, &mut MaterialRegistry::new())
            .unwrap_err();
        assert!(matches!(err.root_cause(), PkiError::IdentityAlreadyExists(_)));
    }

    #[test]
    fn unhealthy_ca_issues_nothing() {
        let tmp = TempDir::new().unwrap();
        let signer = FakeSigner::default();
        let ca = CertificateAuthority::at(tmp.path().join("acme"), "acme");
        let hosts = vec![HostConfiguration::new("web1", "10.0.0.1", None, None, false)];
        assert!(matches!(
            issue_all(&ca, &signer, &hosts, ExistingPolicy::Skip, &mut MaterialRegistry::new()),
            Err(PkiError::CaNotFound(_))
        ));
        assert!(signer.requests.borrow().is_empty());
    }

    #[test]
    fn tool_failure_names_the_identity() {
        let tmp = TempDir::new().unwrap();
        let ok = FakeSigner::default();
        let ca = ready_ca(&tmp, &ok);
        let failing = FakeSigner {
            fail_on: Some("admin-web1".to_string()),
            ..Default::default()
        };
        let hosts = vec![HostConfiguration::new("web1", "10.0.0.1", None, None, true)];
        let mut registry = MaterialRegistry::new();
        let err = issue_all(&ca, &failing, &hosts, ExistingPolicy::Skip, &mut registry).unwrap_err();

        assert!(err.to_string().contains("admin-web1"));
        assert!(matches!(err.root_cause(), PkiError::ExternalToolFailed { .. }));
        assert_eq!(registry.len(), 1);
    }
}
