//! Workspace Store.
//!
//! Resolves on-disk locations of CA and identity material, keeps the durable
//! "current CA" pointer, and owns platform output directories.
//!
//! # Layout
//!
//! ```text
//! {workspace}/
//!   .metadata                      {"current": "<ca>"}
//!   {ca}/root/{certs,private}/
//!   {ca}/intermediate/{certs,private}/
//!   {ca}/{identity}/{certs,private}/
//!
//! {platforms}/{platform}/
//!   platform.log
//!   truststore.jks
//!   ca_file.crt
//!   {host}/...
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PkiError, Result};
use crate::material::{MaterialKind, TRUSTSTORE_FILE_NAME};
use crate::platform_config::validate_identity_name;

const METADATA_FILE_NAME: &str = ".metadata";
const PLATFORM_LOG_FILE_NAME: &str = "platform.log";
const PLATFORM_NAME_PREFIX: &str = "platform_";

/// Search `root` recursively for entries whose file name matches `pattern`.
///
/// `pattern` must match the whole name. `kind` selects directories, any file,
/// or files carrying the kind's extension. With `exact_match` the search must
/// find exactly one candidate, otherwise it fails with
/// [`PkiError::AmbiguousOrMissingArtifact`]; without it every match is returned.
pub fn resolve(
    root: &Path,
    pattern: &str,
    kind: MaterialKind,
    exact_match: bool,
) -> Result<Vec<PathBuf>> {
    let rx = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        PkiError::ConfigurationInvalid(format!("invalid search pattern '{pattern}': {e}"))
    })?;

    let mut candidates = Vec::new();
    if root.is_dir() {
        collect_matches(root, &rx, kind, &mut candidates)?;
    }
    candidates.sort();
    debug!(?root, pattern, %kind, found = candidates.len(), "resolved artifacts");

    if exact_match && candidates.len() != 1 {
        return Err(PkiError::AmbiguousOrMissingArtifact {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
            candidates,
        });
    }
    Ok(candidates)
}

/// [`resolve`] with `exact_match`, returning the single candidate.
pub fn resolve_unique(root: &Path, pattern: &str, kind: MaterialKind) -> Result<PathBuf> {
    let mut found = resolve(root, pattern, kind, true)?;
    Ok(found.remove(0))
}

fn collect_matches(
    dir: &Path,
    rx: &Regex,
    kind: MaterialKind,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() {
            if kind.is_directory() && rx.is_match(&name) {
                out.push(path.clone());
            }
            collect_matches(&path, rx, kind, out)?;
        } else if file_type.is_file() && !kind.is_directory() && rx.is_match(&name) {
            let wanted = match kind.extension() {
                Some(ext) => path.extension().is_some_and(|e| e == ext),
                None => true,
            };
            if wanted {
                out.push(path);
            }
        }
    }
    Ok(())
}

/// Sorted names of the immediate sub-directories of `dir`, hidden ones excluded.
pub fn list_dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Sorted paths of the regular files directly inside `dir`; empty if `dir` is absent.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Durable workspace record.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

/// Persistent CA workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open the workspace at `root`, creating it and its metadata record if absent.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Workspace { root: root.into() };
        fs::create_dir_all(&workspace.root)?;
        if !workspace.metadata_path().exists() {
            workspace.write_metadata(&WorkspaceMetadata::default())?;
        }
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE_NAME)
    }

    pub fn read_metadata(&self) -> Result<WorkspaceMetadata> {
        let content = fs::read_to_string(self.metadata_path())?;
        if content.trim().is_empty() {
            return Ok(WorkspaceMetadata::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            PkiError::ConfigurationInvalid(format!(
                "corrupt workspace metadata {}: {e}",
                self.metadata_path().display()
            ))
        })
    }

    pub fn write_metadata(&self, metadata: &WorkspaceMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata).map_err(|e| {
            PkiError::ConfigurationInvalid(format!("cannot serialize metadata: {e}"))
        })?;
        fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    pub fn current_ca(&self) -> Result<Option<String>> {
        Ok(self.read_metadata()?.current)
    }

    pub fn set_current_ca(&self, name: &str) -> Result<()> {
        let mut metadata = self.read_metadata()?;
        metadata.current = Some(name.to_string());
        self.write_metadata(&metadata)
    }

    /// `name` if given, else the current CA, else `fallback`.
    pub fn ca_name_or_current(&self, name: Option<&str>, fallback: &str) -> Result<String> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.current_ca()?.unwrap_or_else(|| fallback.to_string()),
        };
        validate_identity_name(&name)?;
        Ok(name)
    }

    pub fn ca_dir(&self, ca_name: &str) -> PathBuf {
        self.root.join(ca_name)
    }

    pub fn list_cas(&self) -> Result<Vec<String>> {
        list_dir_names(&self.root)
    }
}

/// Output directory of one `platform generate` run.
#[derive(Debug, Clone)]
pub struct PlatformWorkspace {
    pub name: String,
    pub root: PathBuf,
    pub log_file: PathBuf,
    pub truststore: PathBuf,
}

impl PlatformWorkspace {
    /// Create `{platforms_dir}/{name}`; the name defaults to `platform_<unix-seconds>`.
    /// An existing directory is never reused.
    pub fn create(platforms_dir: &Path, name: Option<&str>) -> Result<Self> {
        let name = match name {
            Some(name) => {
                validate_identity_name(name)?;
                name.to_string()
            }
            None => format!("{PLATFORM_NAME_PREFIX}{}", chrono::Utc::now().timestamp()),
        };
        let root = platforms_dir.join(&name);
        fs::create_dir_all(platforms_dir)?;
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PkiError::WorkspaceAlreadyExists(root));
            }
            Err(e) => return Err(e.into()),
        }
        let workspace = Self::at(name, root);
        fs::File::create(&workspace.log_file)?;
        Ok(workspace)
    }

    fn at(name: String, root: PathBuf) -> Self {
        PlatformWorkspace {
            log_file: root.join(PLATFORM_LOG_FILE_NAME),
            truststore: root.join(TRUSTSTORE_FILE_NAME),
            name,
            root,
        }
    }

    /// Append a block of tool output to the platform log.
    pub fn append_log(&self, header: &str, output: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;
        writeln!(file, "{header}")?;
        if !output.is_empty() {
            writeln!(file, "{}", output.trim_end())?;
        }
        Ok(())
    }

    pub fn host_dir(&self, host: &str) -> PathBuf {
        self.root.join(host)
    }
}

/// Names of the platform workspaces under `platforms_dir`.
pub fn list_platforms(platforms_dir: &Path) -> Result<Vec<String>> {
    if !platforms_dir.is_dir() {
        return Ok(Vec::new());
    }
    list_dir_names(platforms_dir)
}
