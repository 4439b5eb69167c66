//! Platform configuration parsing.
//!
//! Two document shapes describe the same set of hosts:
//!
//! ```yaml
//! # v2
//! platform:
//!   password: secret
//!   hosts:
//!     - hostname: web1
//!       ip: 10.0.0.1
//!       users: [svc-a, svc-b]   # optional, defaults to [hostname]
//!       cn: web.example.com     # optional
//!       admin: true             # optional, adds admin-web1
//!
//! # v1
//! platform:
//!   password: secret
//!   material:
//!     - host: web1
//!       ip: 10.0.0.1
//!       admin: true
//! ```
//!
//! Both are normalized into an ordered list of [`HostConfiguration`].

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{PkiError, Result};

/// Prefix of the extra identity issued for hosts with the admin flag.
pub const ADMIN_PREFIX: &str = "admin-";

/// Identity names reserved for the CA's own material.
pub const RESERVED_NAMES: [&str; 2] = ["root", "intermediate"];

/// Document key optionally wrapping the configuration body.
const ROOT_KEY: &str = "platform";

/// Configuration schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// `material: [{host, ip, admin?}]`
    V1,
    /// `hosts: [{hostname, ip, users?, cn?, admin?}]`
    V2,
}

impl SchemaVersion {
    pub const SUPPORTED: [&'static str; 2] = ["v1", "v2"];

    fn parse(version: &str) -> Result<Self> {
        match version {
            "v1" => Ok(SchemaVersion::V1),
            "v2" => Ok(SchemaVersion::V2),
            other => Err(PkiError::ConfigurationInvalid(format!(
                "unsupported configuration version '{}', supported versions are {:?}",
                other,
                Self::SUPPORTED
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    version: Option<String>,
    password: Option<String>,
    hosts: Option<Vec<RawHost>>,
    material: Option<Vec<RawMaterial>>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    hostname: String,
    ip: String,
    users: Option<Vec<String>>,
    cn: Option<String>,
    #[serde(default)]
    admin: bool,
}

#[derive(Debug, Deserialize)]
struct RawMaterial {
    host: String,
    ip: String,
    #[serde(default)]
    admin: bool,
}

/// One host and the identities issued under its network identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfiguration {
    pub hostname: String,
    pub ip: String,
    /// Overrides the CN otherwise derived from the identity name.
    pub cn: Option<String>,
    /// Identity names in issuance order.
    pub identities: Vec<String>,
}

impl HostConfiguration {
    /// Build a host entry: `users` (or `[hostname]`) plus `admin-<hostname>`
    /// when `admin` is set.
    pub fn new(
        hostname: &str,
        ip: &str,
        cn: Option<String>,
        users: Option<Vec<String>>,
        admin: bool,
    ) -> Self {
        let mut identities = users.unwrap_or_else(|| vec![hostname.to_string()]);
        if admin {
            identities.push(admin_name(hostname));
        }
        HostConfiguration {
            hostname: hostname.to_string(),
            ip: ip.to_string(),
            cn,
            identities,
        }
    }

    /// Subject Alternative Name shared by every identity of this host.
    pub fn san(&self) -> String {
        format!("{},{}", self.hostname, self.ip)
    }
}

pub fn admin_name(hostname: &str) -> String {
    format!("{ADMIN_PREFIX}{hostname}")
}

/// Canonical platform configuration.
#[derive(Debug)]
pub struct PlatformConfig {
    pub version: SchemaVersion,
    password: Option<SecretString>,
    pub hosts: Vec<HostConfiguration>,
}

impl PlatformConfig {
    /// Parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PkiError::ConfigurationInvalid(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            PkiError::ConfigurationInvalid(msg) => {
                PkiError::ConfigurationInvalid(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse a YAML document, with or without the `platform:` wrapper.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| PkiError::ConfigurationInvalid(format!("expected YAML: {e}")))?;
        let body = match document.get(ROOT_KEY) {
            Some(inner) => inner.clone(),
            None => document,
        };
        let raw: RawPlatform = serde_yaml::from_value(body)
            .map_err(|e| PkiError::ConfigurationInvalid(e.to_string()))?;
        Self::normalize(raw)
    }

    /// Configuration issuing one `default` identity for `127.0.0.1`.
    pub fn single_default() -> Self {
        PlatformConfig {
            version: SchemaVersion::V2,
            password: None,
            hosts: vec![HostConfiguration::new("default", "127.0.0.1", None, None, false)],
        }
    }

    fn normalize(raw: RawPlatform) -> Result<Self> {
        let declared = raw.version.as_deref().map(SchemaVersion::parse).transpose()?;

        let (version, hosts) = match (raw.hosts, raw.material) {
            (Some(_), Some(_)) => {
                return Err(PkiError::ConfigurationInvalid(
                    "'hosts' and 'material' are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(PkiError::ConfigurationInvalid(
                    "one of 'hosts' or 'material' is required".to_string(),
                ))
            }
            (Some(hosts), None) => {
                let hosts = hosts
                    .into_iter()
                    .map(|h| {
                        if h.users.as_ref().is_some_and(|users| users.is_empty()) {
                            return Err(PkiError::ConfigurationInvalid(format!(
                                "host '{}' has an empty users list",
                                h.hostname
                            )));
                        }
                        Ok(HostConfiguration::new(&h.hostname, &h.ip, h.cn, h.users, h.admin))
                    })
                    .collect::<Result<Vec<_>>>()?;
                (SchemaVersion::V2, hosts)
            }
            (None, Some(material)) => {
                let hosts = material
                    .into_iter()
                    .map(|m| HostConfiguration::new(&m.host, &m.ip, None, None, m.admin))
                    .collect::<Vec<_>>();
                (SchemaVersion::V1, hosts)
            }
        };

        if let Some(declared) = declared {
            if declared != version {
                return Err(PkiError::ConfigurationInvalid(format!(
                    "version '{declared}' does not describe a '{}' list",
                    match version {
                        SchemaVersion::V1 => "material",
                        SchemaVersion::V2 => "hosts",
                    }
                )));
            }
        }

        validate_hosts(&hosts)?;

        Ok(PlatformConfig {
            version,
            password: raw.password.map(SecretString::from),
            hosts,
        })
    }

    /// Shared keystore/truststore password.
    pub fn password(&self) -> Result<&SecretString> {
        self.password.as_ref().ok_or_else(|| {
            PkiError::ConfigurationInvalid("'password' is required".to_string())
        })
    }

    /// Total number of identities across all hosts.
    pub fn identity_count(&self) -> usize {
        self.hosts.iter().map(|h| h.identities.len()).sum()
    }
}

fn validate_hosts(hosts: &[HostConfiguration]) -> Result<()> {
    if hosts.is_empty() {
        return Err(PkiError::ConfigurationInvalid(
            "at least one host is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for host in hosts {
        if host.hostname.trim().is_empty() || host.ip.trim().is_empty() {
            return Err(PkiError::ConfigurationInvalid(
                "every host needs a hostname and an ip".to_string(),
            ));
        }
        if host.identities.is_empty() {
            return Err(PkiError::ConfigurationInvalid(format!(
                "host '{}' has an empty users list",
                host.hostname
            )));
        }
        for identity in &host.identities {
            validate_identity_name(identity)?;
            if !seen.insert(identity.as_str()) {
                return Err(PkiError::ConfigurationInvalid(format!(
                    "identity '{identity}' is declared more than once"
                )));
            }
        }
    }
    Ok(())
}

/// Identity, CA and platform names become directory names; reject anything
/// that is not a plain name.
pub fn validate_identity_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || RESERVED_NAMES.contains(&name)
    {
        return Err(PkiError::ConfigurationInvalid(format!(
            "'{name}' is not a valid name; use a plain directory name other than {RESERVED_NAMES:?}"
        )));
    }
    Ok(())
}
