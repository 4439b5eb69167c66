//! Platform generation pipeline.
//!
//! Runs the stages strictly in order, threading one [`PipelineContext`]
//! through them:
//!
//! ```text
//! Workspace → CA hierarchy → Issuance → Keystores → Truststore → Trust → Extract
//! ```
//!
//! The first failing stage aborts the run. Nothing is cleaned up; the platform
//! directory is left for inspection and must be purged before retrying.

use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::certificate_authority::{ensure_ready, CertificateAuthority};
use crate::configs::PolicyConfig;
use crate::error::Result;
use crate::export::extract;
use crate::external_interface::{Signer, StoreTool, ToolOutput};
use crate::generate_user_keypair::issue_all;
use crate::keystore::{build_keystores, build_truststore, Truststore};
use crate::platform_config::{validate_identity_name, PlatformConfig};
use crate::registry::MaterialRegistry;
use crate::storage::{PlatformWorkspace, Workspace};
use crate::trust::trust_certificates;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Workspace,
    CaHierarchy,
    Issuance,
    Keystores,
    Truststore,
    Trust,
    Extract,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Workspace,
        Stage::CaHierarchy,
        Stage::Issuance,
        Stage::Keystores,
        Stage::Truststore,
        Stage::Trust,
        Stage::Extract,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Workspace => "platform workspace",
            Stage::CaHierarchy => "CA hierarchy",
            Stage::Issuance => "certificate issuance",
            Stage::Keystores => "keystore assembly",
            Stage::Truststore => "truststore assembly",
            Stage::Trust => "trust import",
            Stage::Extract => "extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State accumulated by one run.
#[derive(Debug)]
pub struct PipelineContext {
    pub platform: PlatformWorkspace,
    pub ca: CertificateAuthority,
    pub registry: MaterialRegistry,
    pub truststore: Option<Truststore>,
}

impl PipelineContext {
    fn log_outputs(&self, outputs: &[ToolOutput]) -> Result<()> {
        for output in outputs {
            self.platform
                .append_log(&format!("$ {} {}", output.tool, output.request), &output.output)?;
        }
        Ok(())
    }
}

/// Linear driver over the external tools.
pub struct Pipeline<'a> {
    signer: &'a dyn Signer,
    store: &'a dyn StoreTool,
    policy: PolicyConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(signer: &'a dyn Signer, store: &'a dyn StoreTool, policy: PolicyConfig) -> Self {
        Pipeline {
            signer,
            store,
            policy,
        }
    }

    /// Generate a platform from `config`.
    ///
    /// The platform is named `platform_name` or by timestamp; the CA defaults
    /// to the platform name. `progress` is called after each completed stage.
    pub fn run(
        &self,
        workspace: &Workspace,
        platforms_dir: &Path,
        config: &PlatformConfig,
        platform_name: Option<&str>,
        ca_name: Option<&str>,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<PipelineContext> {
        let password = config.password()?;
        if let Some(ca_name) = ca_name {
            validate_identity_name(ca_name)?;
        }

        let platform = PlatformWorkspace::create(platforms_dir, platform_name)
            .map_err(|e| e.in_stage(Stage::Workspace.label(), platform_name.unwrap_or("<generated>")))?;
        let alias = ca_name.unwrap_or(platform.name.as_str()).to_string();
        let mut context = PipelineContext {
            ca: CertificateAuthority::new(workspace, &alias),
            registry: MaterialRegistry::new(),
            truststore: None,
            platform,
        };
        info!(platform = %context.platform.name, ca = %alias, hosts = config.hosts.len(), "generating platform");
        progress(Stage::Workspace);

        let outputs = ensure_ready(&context.ca, self.signer, self.policy.ca_exists)
            .map_err(|e| e.in_stage(Stage::CaHierarchy.label(), alias.as_str()))?;
        context.log_outputs(&outputs)?;
        progress(Stage::CaHierarchy);

        let outputs = issue_all(
            &context.ca,
            self.signer,
            &config.hosts,
            self.policy.identity_exists,
            &mut context.registry,
        )?;
        context.log_outputs(&outputs)?;
        debug!(entries = context.registry.len(), "registry populated");
        progress(Stage::Issuance);

        let outputs = build_keystores(
            &mut context.registry,
            &context.ca.intermediate_cert,
            self.store,
            password,
        )?;
        context.log_outputs(&outputs)?;
        progress(Stage::Keystores);

        let (truststore, outputs) = build_truststore(
            &context.ca.root_cert,
            &context.ca.intermediate_cert,
            &context.platform.truststore,
            self.store,
            password,
        )
        .map_err(|e| e.in_stage(Stage::Truststore.label(), context.platform.name.as_str()))?;
        context.log_outputs(&outputs)?;
        progress(Stage::Truststore);

        let output = trust_certificates(
            &truststore,
            &context.ca.chain_file,
            &context.registry.certificates(),
            self.signer,
        )
        .map_err(|e| e.in_stage(Stage::Trust.label(), context.platform.name.as_str()))?;
        context.truststore = Some(truststore);
        context.log_outputs(output.as_slice())?;
        progress(Stage::Trust);

        extract(&context.platform, &context.registry, &context.ca.chain_file)
            .map_err(|e| e.in_stage(Stage::Extract.label(), context.platform.name.as_str()))?;
        progress(Stage::Extract);

        info!(platform = %context.platform.name, identities = context.registry.len(), "platform generated");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PkiError;
    use crate::external_interface::fakes::{FakeSigner, FakeStore};
    use crate::protocol::{SignerRequest, StoreRequest};
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
platform:
  password: p
  hosts:
    - hostname: web1
      ip: 10.0.0.1
      admin: true
"#;

    #[test]
    fn stages_run_in_order() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::init(tmp.path().join("ws")).unwrap();
        let config = PlatformConfig::from_yaml(CONFIG).unwrap();
        let (signer, store) = (FakeSigner::default(), FakeStore::default());
        let mut seen = Vec::new();

        let context = Pipeline::new(&signer, &store, PolicyConfig::default())
            .run(
                &workspace,
                &tmp.path().join("platforms"),
                &config,
                Some("p1"),
                None,
                &mut |stage| seen.push(stage),
            )
            .unwrap();

        assert_eq!(seen, Stage::ALL.to_vec());
        assert_eq!(context.ca.alias, "p1");
        assert_eq!(context.registry.len(), 2);

        let requests = signer.requests.borrow();
        assert!(matches!(requests[0], SignerRequest::Root { .. }));
        assert!(matches!(requests[1], SignerRequest::Intermediate { .. }));
        assert!(matches!(requests.last(), Some(SignerRequest::Trust { certificates, .. }) if certificates.len() == 2));

        let stores = store.requests.borrow();
        assert!(matches!(stores[0], StoreRequest::Create { .. }));
        assert!(matches!(stores[2], StoreRequest::Import { .. }));

        let log = fs::read_to_string(&context.platform.log_file).unwrap();
        assert!(log.contains("\"mode\":\"leaf\""));
        assert!(!log.contains("password"));
    }

    #[test]
    fn missing_password_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::init(tmp.path().join("ws")).unwrap();
        let config = PlatformConfig::single_default();
        let (signer, store) = (FakeSigner::default(), FakeStore::default());

        let err = Pipeline::new(&signer, &store, PolicyConfig::default())
            .run(&workspace, &tmp.path().join("platforms"), &config, Some("p1"), None, &mut |_| {})
            .unwrap_err();

        assert!(matches!(err, PkiError::ConfigurationInvalid(_)));
        assert!(!tmp.path().join("platforms/p1").exists());
    }

    #[test]
    fn existing_platform_name_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::init(tmp.path().join("ws")).unwrap();
        let platforms = tmp.path().join("platforms");
        fs::create_dir_all(platforms.join("p1")).unwrap();
        let config = PlatformConfig::from_yaml(CONFIG).unwrap();
        let (signer, store) = (FakeSigner::default(), FakeStore::default());

        let err = Pipeline::new(&signer, &store, PolicyConfig::default())
            .run(&workspace, &platforms, &config, Some("p1"), None, &mut |_| {})
            .unwrap_err();

        assert!(matches!(err.root_cause(), PkiError::WorkspaceAlreadyExists(_)));
        assert!(signer.requests.borrow().is_empty());
    }

    #[test]
    fn failing_stage_stops_the_run() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::init(tmp.path().join("ws")).unwrap();
        let config = PlatformConfig::from_yaml(CONFIG).unwrap();
        let signer = FakeSigner::default();
        let store = FakeStore {
            skip_write: true,
            ..Default::default()
        };
        let mut seen = Vec::new();

        let err = Pipeline::new(&signer, &store, PolicyConfig::default())
            .run(
                &workspace,
                &tmp.path().join("platforms"),
                &config,
                Some("p1"),
                Some("acme"),
                &mut |stage| seen.push(stage),
            )
            .unwrap_err();

        assert_eq!(seen, vec![Stage::Workspace, Stage::CaHierarchy, Stage::Issuance]);
        assert!(err.to_string().starts_with("keystore assembly failed for 'web1'"));
        assert!(!signer
            .requests
            .borrow()
            .iter()
            .any(|r| matches!(r, SignerRequest::Trust { .. })));
    }

    #[test]
    fn names_outside_their_directories_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::init(tmp.path().join("ws")).unwrap();
        let platforms = tmp.path().join("platforms");
        let config = PlatformConfig::from_yaml(CONFIG).unwrap();
        let (signer, store) = (FakeSigner::default(), FakeStore::default());
        let pipeline = Pipeline::new(&signer, &store, PolicyConfig::default());

        for (platform, ca) in [
            (Some("root"), None),
            (Some("../escaped"), None),
            (Some("p1"), Some("../../outside_ca")),
            (Some("p2"), Some("intermediate")),
        ] {
            let err = pipeline
                .run(&workspace, &platforms, &config, platform, ca, &mut |_| {})
                .unwrap_err();
            assert!(matches!(err.root_cause(), PkiError::ConfigurationInvalid(_)));
        }

        assert!(!tmp.path().join("escaped").exists());
        assert!(!tmp.path().join("outside_ca").exists());
        assert!(!platforms.join("p1").exists());
        assert!(signer.requests.borrow().is_empty());
    }
}
