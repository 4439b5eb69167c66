//! Material kinds and where each lands inside a generated directory.
//!
//! The signer and store tools write into a fixed sub-layout:
//!
//! ```text
//! <dir>/
//!   certs/<stem>.crt
//!   private/<stem>.p8
//!   private/<stem>-keystore.jks
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the combined root + intermediate certificate file written by the
/// signer next to the intermediate certificate.
pub const CA_CHAIN_FILE_NAME: &str = "ca_file.crt";

/// Name of the shared truststore inside a platform workspace.
pub const TRUSTSTORE_FILE_NAME: &str = "truststore.jks";

const KEYSTORE_SUFFIX: &str = "-keystore";

/// Kind of artifact the pipeline searches for or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Directory,
    File,
    PrivateKey,
    Certificate,
    Keystore,
}

impl MaterialKind {
    /// File extension of the artifact, if the kind maps to a single file type.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            MaterialKind::Directory | MaterialKind::File => None,
            MaterialKind::PrivateKey => Some("p8"),
            MaterialKind::Certificate => Some("crt"),
            MaterialKind::Keystore => Some("jks"),
        }
    }

    /// Sub-directory of a generated directory holding this kind of artifact.
    pub fn parent_dir(self) -> Option<&'static str> {
        match self {
            MaterialKind::Directory | MaterialKind::File => None,
            MaterialKind::PrivateKey | MaterialKind::Keystore => Some("private"),
            MaterialKind::Certificate => Some("certs"),
        }
    }

    /// True when a search for this kind should look at directory entries.
    pub fn is_directory(self) -> bool {
        matches!(self, MaterialKind::Directory)
    }

    /// Location of the `stem` artifact of this kind inside `dir`.
    ///
    /// Returns `dir` itself for [`MaterialKind::Directory`] and
    /// `dir/stem` for [`MaterialKind::File`].
    pub fn path_in(self, dir: &Path, stem: &str) -> PathBuf {
        match (self.parent_dir(), self.extension()) {
            (Some(parent), Some(ext)) => {
                let file_stem = match self {
                    MaterialKind::Keystore => format!("{stem}{KEYSTORE_SUFFIX}"),
                    _ => stem.to_string(),
                };
                dir.join(parent).join(format!("{file_stem}.{ext}"))
            }
            _ if self.is_directory() => dir.to_path_buf(),
            _ => dir.join(stem),
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MaterialKind::Directory => "dir",
            MaterialKind::File => "file",
            MaterialKind::PrivateKey => "p8",
            MaterialKind::Certificate => "crt",
            MaterialKind::Keystore => "jks",
        };
        f.write_str(label)
    }
}
