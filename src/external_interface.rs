//! External tool interface.
//!
//! Key generation, signing and keystore encoding are delegated to two
//! command-line tools: a signer (root, intermediate, leaf, trust) and a store
//! writer (keystore create, truststore import). [`Signer`] and [`StoreTool`]
//! are the seams the pipeline drives; [`CommandSigner`] and [`CommandStore`]
//! implement them on top of [`ToolRunner`].
//!
//! Every invocation blocks the caller until the subprocess exits. When input is
//! written to the tool's stdin the whole exchange is bounded by the configured
//! timeout; on expiry the child is killed and the call fails with
//! [`PkiError::ToolTimeout`]. Nothing is retried.

use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::configs::{OutputMode, ToolsConfig};
use crate::error::{PkiError, Result};
use crate::material::MaterialKind;
use crate::protocol::{SignerRequest, StoreRequest};
use crate::storage;

/// Suffix the signer appends to directories it names itself.
pub const CHAINS_SUFFIX_REGEX: &str = "_[0-9]{10}";

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub tool: String,
    /// JSON rendering of the request, for the run log.
    pub request: String,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Produces CA and leaf material.
///
/// For every request that names an output directory, the material must be in
/// that directory when the call returns: `certs/<name>.crt`,
/// `private/<name>.p8`, and for intermediates `certs/ca_file.crt`.
pub trait Signer {
    fn sign(&self, request: &SignerRequest) -> Result<ToolOutput>;
}

/// Writes keystores and truststores.
pub trait StoreTool {
    fn store(&self, request: &StoreRequest, password: &SecretString) -> Result<ToolOutput>;
}

/// Runs one program with a bounded stdin exchange.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    program: PathBuf,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Run the program to completion and return its combined output.
    ///
    /// A non-zero exit, or a failure to start the program, is
    /// [`PkiError::ExternalToolFailed`].
    pub fn run(&self, args: &[OsString], input: Option<&[u8]>) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async(args, input))
    }

    async fn run_async(&self, args: &[OsString], input: Option<&[u8]>) -> Result<String> {
        let tool = self.program_name();
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| PkiError::ExternalToolFailed {
            tool: tool.clone(),
            status: None,
            output: format!("failed to start: {e}"),
        })?;

        let output = match input {
            Some(input) => {
                let stdin = child.stdin.take();
                let exchange = async move {
                    if let Some(mut stdin) = stdin {
                        match stdin.write_all(input).await {
                            // the tool may exit without reading its input
                            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                            other => other?,
                        }
                    }
                    child.wait_with_output().await
                };
                tokio::time::timeout(self.timeout, exchange)
                    .await
                    .map_err(|_| PkiError::ToolTimeout {
                        tool: tool.clone(),
                        seconds: self.timeout.as_secs(),
                    })??
            }
            None => child.wait_with_output().await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(PkiError::ExternalToolFailed {
                tool,
                status: output.status.code(),
                output: combined,
            });
        }
        Ok(combined)
    }
}

/// [`Signer`] backed by the signer command-line tool.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    runner: ToolRunner,
    output_mode: OutputMode,
    chains_dir: PathBuf,
}

impl CommandSigner {
    pub fn new(runner: ToolRunner, output_mode: OutputMode, chains_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            output_mode,
            chains_dir: chains_dir.into(),
        }
    }

    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self::new(
            ToolRunner::new(&tools.signer, Duration::from_secs(tools.timeout_secs)),
            tools.output,
            &tools.chains_path,
        )
    }

    /// Find the directory the tool named `<name>_<timestamp>` and move it to `out_dir`.
    fn relocate_discovered(&self, name: &str, out_dir: &Path) -> Result<()> {
        let pattern = format!("{}{}", regex::escape(name), CHAINS_SUFFIX_REGEX);
        let found = storage::resolve_unique(&self.chains_dir, &pattern, MaterialKind::Directory)?;
        if out_dir.is_dir() {
            // only an empty placeholder may be replaced
            fs::remove_dir(out_dir)?;
        }
        if let Some(parent) = out_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(from = ?found, to = ?out_dir, "relocating signer output");
        fs::rename(&found, out_dir)?;
        Ok(())
    }
}

impl Signer for CommandSigner {
    fn sign(&self, request: &SignerRequest) -> Result<ToolOutput> {
        let explicit = self.output_mode == OutputMode::Explicit;
        if let (true, Some(out_dir)) = (explicit, request.out_dir()) {
            fs::create_dir_all(out_dir)?;
        }

        let request_json = serde_json::to_string(request).unwrap_or_default();
        debug!(tool = %self.runner.program_name(), request = %request_json, "invoking signer");
        let output = self.runner.run(&request.to_args(explicit), None)?;

        if let (false, Some(name), Some(out_dir)) = (explicit, request.name(), request.out_dir()) {
            self.relocate_discovered(name, out_dir)?;
        }

        Ok(ToolOutput {
            tool: self.runner.program_name(),
            request: request_json,
            output,
        })
    }
}

/// [`StoreTool`] backed by the keystore command-line tool.
#[derive(Debug, Clone)]
pub struct CommandStore {
    runner: ToolRunner,
}

impl CommandStore {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self::new(ToolRunner::new(
            &tools.store,
            Duration::from_secs(tools.timeout_secs),
        ))
    }
}

impl StoreTool for CommandStore {
    fn store(&self, request: &StoreRequest, password: &SecretString) -> Result<ToolOutput> {
        if let Some(parent) = request.store().parent() {
            fs::create_dir_all(parent)?;
        }
        let request_json = serde_json::to_string(request).unwrap_or_default();
        debug!(tool = %self.runner.program_name(), request = %request_json, "invoking store tool");

        let mut input = password.expose_secret().as_bytes().to_vec();
        input.push(b'\n');
        let output = self.runner.run(&request.to_args(), Some(&input))?;

        Ok(ToolOutput {
            tool: self.runner.program_name(),
            request: request_json,
            output,
        })
    }
}
