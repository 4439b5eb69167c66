//! PKI Platform - TLS trust hierarchy provisioning library
//!
//! Drives external signer and keystore tools to build a three-tier CA
//! hierarchy, issue leaf certificates for a set of hosts, and package the
//! result into deployable per-host keystores and one platform truststore.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed)
//!   └── Intermediate CA (signed by Root)
//!       └── Leaf Certificates (signed by Intermediate, one or more per host)
//! ```
//!
//! Generation is a strictly linear pipeline:
//!
//! ```text
//! Workspace → CA hierarchy → Issuance → Keystores → Truststore → Trust → Extract
//! ```
//!
//! Each stage reads what earlier stages recorded in the
//! [`registry::MaterialRegistry`] carried by [`pipeline::PipelineContext`].
//!
//! # Architecture
//!
//! - [`storage`]: workspace layout, artifact resolution, current-CA metadata,
//!   platform output directories
//! - [`certificate_authority`]: CA paths, health checks, root-then-intermediate creation
//! - [`generate_root_ca`] / [`generate_intermediate_ca`] / [`generate_user_keypair`]:
//!   the signer requests for each tier
//! - [`keystore`] and [`trust`]: keystore/truststore assembly and trust marking
//! - [`export`] and [`purge`]: copying material out, deleting it
//! - [`external_interface`] and [`protocol`]: the tool seams and their argv encoding
//! - [`commands`]: handlers behind the `pki-platform` binary
//!
//! # Example
//!
//! ```no_run
//! use pki_platform::configs::AppConfig;
//! use pki_platform::external_interface::{CommandSigner, CommandStore};
//! use pki_platform::pipeline::Pipeline;
//! use pki_platform::platform_config::PlatformConfig;
//! use pki_platform::storage::Workspace;
//! use std::path::Path;
//!
//! fn generate() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let signer = CommandSigner::from_config(&config.tools);
//!     let store = CommandStore::from_config(&config.tools);
//!
//!     let workspace = Workspace::init(&config.workspace.path)?;
//!     let platform = PlatformConfig::from_file(Path::new("platform.yaml"))?;
//!
//!     let context = Pipeline::new(&signer, &store, config.policy.clone()).run(
//!         &workspace,
//!         &config.workspace.platforms_path,
//!         &platform,
//!         Some("staging"),
//!         None,
//!         &mut |stage| println!("✓ {stage}"),
//!     )?;
//!     println!("{} identities in {}", context.registry.len(), context.platform.root.display());
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Library routines return [`error::PkiError`] and never terminate the
//! process; pipeline failures carry the stage and entity they happened in.
//! The command layer converts them to `anyhow::Error`.

pub mod certificate_authority;
pub mod commands;
pub mod configs;
pub mod error;
pub mod export;
pub mod external_interface;
pub mod generate_intermediate_ca;
pub mod generate_root_ca;
pub mod generate_user_keypair;
pub mod keystore;
pub mod material;
pub mod pipeline;
pub mod platform_config;
pub mod protocol;
pub mod purge;
pub mod registry;
pub mod storage;
pub mod trust;
pub mod ui;
