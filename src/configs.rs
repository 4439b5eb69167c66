use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the working directory when `--app-config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "pki-platform.toml";

/// Overrides `[workspace] path`.
pub const WORKSPACE_ENV: &str = "PKI_PLATFORM_WORKSPACE";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_path")]
    pub path: PathBuf,
    #[serde(default = "default_platforms_path")]
    pub platforms_path: PathBuf,
    #[serde(default = "default_ca_name")]
    pub default_ca: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: default_workspace_path(),
            platforms_path: default_platforms_path(),
            default_ca: default_ca_name(),
        }
    }
}

fn default_workspace_path() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_platforms_path() -> PathBuf {
    PathBuf::from("platforms")
}

fn default_ca_name() -> String {
    "ca".to_string()
}

/// Where the signer tool writes its output.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// The caller passes `--dir`.
    #[default]
    Explicit,
    /// The tool picks `<name>_<timestamp>` under `chains_path`; the result is
    /// searched for and moved into place.
    Discover,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    #[serde(default = "default_signer")]
    pub signer: PathBuf,
    #[serde(default = "default_store")]
    pub store: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub output: OutputMode,
    #[serde(default = "default_chains_path")]
    pub chains_path: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            signer: default_signer(),
            store: default_store(),
            timeout_secs: default_timeout_secs(),
            output: OutputMode::default(),
            chains_path: default_chains_path(),
        }
    }
}

fn default_signer() -> PathBuf {
    PathBuf::from("easyssl-chain")
}

fn default_store() -> PathBuf {
    PathBuf::from("easyssl-store")
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_chains_path() -> PathBuf {
    PathBuf::from("chains")
}

/// What to do when a CA or identity directory already exists.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Reject with `CAAlreadyExists` / `IdentityAlreadyExists`.
    Fail,
    /// Warn and reuse what is on disk.
    Skip,
    /// Remove the directory and generate again.
    Overwrite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default = "default_policy")]
    pub ca_exists: ExistingPolicy,
    #[serde(default = "default_policy")]
    pub identity_exists: ExistingPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ca_exists: default_policy(),
            identity_exists: default_policy(),
        }
    }
}

fn default_policy() -> ExistingPolicy {
    ExistingPolicy::Skip
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load the explicit file, else `pki-platform.toml` if present, else defaults.
    /// The workspace path can be overridden through `PKI_PLATFORM_WORKSPACE`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        if let Ok(workspace) = std::env::var(WORKSPACE_ENV) {
            if !workspace.is_empty() {
                config.workspace.path = PathBuf::from(workspace);
            }
        }
        Ok(config)
    }
}
