//! Error types for the provisioning pipeline.
//!
//! Library routines return [`PkiError`]; only the command layer decides
//! whether a failure terminates the process.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while generating, assembling, exporting or deleting material.
#[derive(Debug, Error)]
pub enum PkiError {
    /// A pattern search over a workspace matched zero or several candidates.
    #[error("ambiguous or missing artifact: pattern '{pattern}' matched {} candidate(s) under {root:?}: {candidates:?}", .candidates.len())]
    AmbiguousOrMissingArtifact {
        pattern: String,
        root: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("CA '{0}' does not exist")]
    CaNotFound(String),

    #[error("root CA of '{0}' does not exist")]
    RootCaNotFound(String),

    #[error("signing CA of '{0}' does not exist")]
    SigningCaNotFound(String),

    #[error("certificate not found: {0:?}")]
    CertificateNotFound(PathBuf),

    #[error("private key not found: {0:?}")]
    PrivateKeyNotFound(PathBuf),

    #[error("CA '{0}' already exists")]
    CaAlreadyExists(String),

    #[error("identity '{0}' already exists")]
    IdentityAlreadyExists(String),

    #[error("keystore for '{0}' was already built")]
    KeystoreAlreadyBuilt(String),

    #[error("no keystore has been built for '{0}'")]
    KeystoreNotFound(String),

    #[error("platform '{0}' does not exist")]
    PlatformNotFound(String),

    #[error("truststore has not been built; CA certificates must be imported before trusting leaf certificates")]
    TruststoreNotReady,

    /// The external tool exited with a non-zero status.
    #[error("external tool '{tool}' failed with status {}: {output}", .status.map(|s| s.to_string()).unwrap_or_else(|| "<none>".to_string()))]
    ExternalToolFailed {
        tool: String,
        status: Option<i32>,
        output: String,
    },

    /// The stdin exchange with an external tool did not finish in time.
    #[error("external tool '{tool}' timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("workspace already exists: {0:?}")]
    WorkspaceAlreadyExists(PathBuf),

    /// Wraps a failure with the pipeline stage and entity it happened in.
    #[error("{stage} failed for '{entity}': {source}")]
    StageFailed {
        stage: &'static str,
        entity: String,
        #[source]
        source: Box<PkiError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PkiError {
    /// Attach stage and entity context to an error.
    pub fn in_stage(self, stage: &'static str, entity: impl Into<String>) -> Self {
        PkiError::StageFailed {
            stage,
            entity: entity.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with stage wrappers removed.
    pub fn root_cause(&self) -> &PkiError {
        match self {
            PkiError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_context_is_rendered_and_unwrapped() {
        let err = PkiError::CaNotFound("acme".to_string())
            .in_stage("issue", "web1")
            .in_stage("platform", "prod");

        let message = err.to_string();
        assert!(message.starts_with("platform failed for 'prod'"));
        assert!(message.contains("issue failed for 'web1'"));
        assert!(matches!(err.root_cause(), PkiError::CaNotFound(name) if name == "acme"));
    }

    #[test]
    fn tool_failure_mentions_status_and_output() {
        let err = PkiError::ExternalToolFailed {
            tool: "easyssl-store".to_string(),
            status: Some(2),
            output: "bad password".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("status 2"));
        assert!(message.contains("bad password"));
    }
}
