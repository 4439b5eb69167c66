//! Protocol Module
//!
//! Requests understood by the external signer and store tools, and their
//! command-line encoding. Requests are serialized to JSON for the run log;
//! passwords are never part of a request and travel over stdin instead.

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Request to the signer tool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SignerRequest {
    /// Self-signed root CA.
    Root { name: String, out_dir: PathBuf },
    /// Signing CA issued by the root in `issuer_dir`.
    Intermediate {
        name: String,
        out_dir: PathBuf,
        issuer_dir: PathBuf,
        cn: String,
    },
    /// Leaf certificate issued by the intermediate in `issuer_dir`.
    Leaf {
        name: String,
        out_dir: PathBuf,
        issuer_dir: PathBuf,
        san: String,
        cn: Option<String>,
    },
    /// Mark leaf certificates as trusted relative to a CA chain file.
    Trust {
        chain_file: PathBuf,
        certificates: Vec<PathBuf>,
    },
}

impl SignerRequest {
    /// File stem of the generated material; `None` for trust requests.
    pub fn name(&self) -> Option<&str> {
        match self {
            SignerRequest::Root { name, .. }
            | SignerRequest::Intermediate { name, .. }
            | SignerRequest::Leaf { name, .. } => Some(name),
            SignerRequest::Trust { .. } => None,
        }
    }

    /// Directory the material must end up in; `None` for trust requests.
    pub fn out_dir(&self) -> Option<&Path> {
        match self {
            SignerRequest::Root { out_dir, .. }
            | SignerRequest::Intermediate { out_dir, .. }
            | SignerRequest::Leaf { out_dir, .. } => Some(out_dir),
            SignerRequest::Trust { .. } => None,
        }
    }

    /// Command-line arguments. `--dir` is only passed when `explicit_dir` is set.
    pub fn to_args(&self, explicit_dir: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            SignerRequest::Root { name, out_dir } => {
                args.push("--root".into());
                push_pair(&mut args, "--name", name);
                if explicit_dir {
                    push_pair(&mut args, "--dir", out_dir);
                }
            }
            SignerRequest::Intermediate {
                name,
                out_dir,
                issuer_dir,
                cn,
            } => {
                args.push("--intermediate".into());
                push_pair(&mut args, "--name", name);
                if explicit_dir {
                    push_pair(&mut args, "--dir", out_dir);
                }
                push_pair(&mut args, "--issuer", issuer_dir);
                push_pair(&mut args, "--cn", cn);
            }
            SignerRequest::Leaf {
                name,
                out_dir,
                issuer_dir,
                san,
                cn,
            } => {
                args.push("--leaf".into());
                push_pair(&mut args, "--name", name);
                if explicit_dir {
                    push_pair(&mut args, "--dir", out_dir);
                }
                push_pair(&mut args, "--issuer", issuer_dir);
                push_pair(&mut args, "--san", san);
                if let Some(cn) = cn {
                    push_pair(&mut args, "--cn", cn);
                }
            }
            SignerRequest::Trust {
                chain_file,
                certificates,
            } => {
                push_pair(&mut args, "--trust", chain_file);
                args.extend(certificates.iter().map(|c| c.as_os_str().to_owned()));
            }
        }
        args
    }
}

/// Request to the keystore/truststore tool. The password is supplied separately.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StoreRequest {
    /// Bundle key, certificate and chain into a new keystore.
    Create {
        key: PathBuf,
        cert: PathBuf,
        chain: PathBuf,
        store: PathBuf,
    },
    /// Import a CA certificate into a (possibly new) truststore.
    Import { cafile: PathBuf, store: PathBuf },
}

impl StoreRequest {
    pub fn store(&self) -> &Path {
        match self {
            StoreRequest::Create { store, .. } | StoreRequest::Import { store, .. } => store,
        }
    }

    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            StoreRequest::Create {
                key,
                cert,
                chain,
                store,
            } => {
                args.push("--create".into());
                push_pair(&mut args, "--key", key);
                push_pair(&mut args, "--cert", cert);
                push_pair(&mut args, "--chain", chain);
                push_pair(&mut args, "--store", store);
            }
            StoreRequest::Import { cafile, store } => {
                args.push("--import".into());
                push_pair(&mut args, "--cafile", cafile);
                push_pair(&mut args, "--store", store);
            }
        }
        args.push("--pass-stdin".into());
        args
    }
}

fn push_pair(args: &mut Vec<OsString>, flag: &str, value: impl AsRef<std::ffi::OsStr>) {
    args.push(flag.into());
    args.push(value.as_ref().to_owned());
}
