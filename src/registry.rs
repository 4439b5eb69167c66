//! Material registry: logical identity name -> generated artifact paths.
//!
//! Entries keep issuance order, which is the order keystores are built and
//! certificates are handed to the trust importer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PkiError, Result};
use crate::material::MaterialKind;

/// Artifacts generated for one issued identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialEntry {
    pub name: String,
    /// Host whose directory the material is exported to. Differs from `name`
    /// for role identities such as `admin-<host>` or configured users.
    pub host: String,
    pub private_key: PathBuf,
    pub certificate: PathBuf,
    keystore: Option<PathBuf>,
    pub directory: PathBuf,
}

impl MaterialEntry {
    /// Entry for an identity whose material sits in the standard layout of `directory`.
    pub fn from_directory(name: &str, host: &str, directory: &Path) -> Self {
        MaterialEntry {
            name: name.to_string(),
            host: host.to_string(),
            private_key: MaterialKind::PrivateKey.path_in(directory, name),
            certificate: MaterialKind::Certificate.path_in(directory, name),
            keystore: None,
            directory: directory.to_path_buf(),
        }
    }

    pub fn keystore(&self) -> Option<&Path> {
        self.keystore.as_deref()
    }

    /// Check that both key and certificate exist on disk.
    pub fn verify_key_and_certificate(&self) -> Result<()> {
        if !self.private_key.is_file() {
            return Err(PkiError::PrivateKeyNotFound(self.private_key.clone()));
        }
        if !self.certificate.is_file() {
            return Err(PkiError::CertificateNotFound(self.certificate.clone()));
        }
        Ok(())
    }

    /// Record the keystore path. Allowed once per entry.
    pub fn attach_keystore(&mut self, keystore: PathBuf) -> Result<()> {
        if self.keystore.is_some() {
            return Err(PkiError::KeystoreAlreadyBuilt(self.name.clone()));
        }
        self.keystore = Some(keystore);
        Ok(())
    }
}

/// Ordered mapping from identity name to its [`MaterialEntry`].
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    entries: Vec<MaterialEntry>,
    name_to_index: HashMap<String, usize>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. Names are unique.
    pub fn register(&mut self, entry: MaterialEntry) -> Result<()> {
        if self.name_to_index.contains_key(&entry.name) {
            return Err(PkiError::IdentityAlreadyExists(entry.name));
        }
        self.name_to_index
            .insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MaterialEntry> {
        self.name_to_index.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut MaterialEntry> {
        match self.name_to_index.get(name) {
            Some(&i) => Some(&mut self.entries[i]),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Entries in issuance order.
    pub fn iter(&self) -> impl Iterator<Item = &MaterialEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MaterialEntry> {
        self.entries.iter_mut()
    }

    /// Certificate paths in issuance order.
    pub fn certificates(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.certificate.clone()).collect()
    }

    /// Distinct hosts in order of first appearance.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !hosts.contains(&entry.host.as_str()) {
                hosts.push(&entry.host);
            }
        }
        hosts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, host: &str) -> MaterialEntry {
        MaterialEntry::from_directory(name, host, &PathBuf::from("/ws/acme").join(name))
    }

    #[test]
    fn keeps_issuance_order_and_rejects_duplicates() {
        let mut registry = MaterialRegistry::new();
        registry.register(entry("web1", "web1")).unwrap();
        registry.register(entry("admin-web1", "web1")).unwrap();
        registry.register(entry("db1", "db1")).unwrap();

        let names: Vec<&str> = registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["web1", "admin-web1", "db1"]);
        assert_eq!(registry.hosts(), vec!["web1", "db1"]);

        let err = registry.register(entry("web1", "web1")).unwrap_err();
        assert!(matches!(err, PkiError::IdentityAlreadyExists(name) if name == "web1"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn keystore_is_attached_once() {
        let mut registry = MaterialRegistry::new();
        registry.register(entry("web1", "web1")).unwrap();

        let e = registry.get_mut("web1").unwrap();
        e.attach_keystore(PathBuf::from("/ks/web1.jks")).unwrap();
        assert!(matches!(
            e.attach_keystore(PathBuf::from("/ks/other.jks")),
            Err(PkiError::KeystoreAlreadyBuilt(_))
        ));
        assert_eq!(
            registry.get("web1").unwrap().keystore(),
            Some(Path::new("/ks/web1.jks"))
        );
    }

    #[test]
    fn verification_reports_missing_key_first() {
        let e = entry("ghost", "ghost");
        assert!(matches!(
            e.verify_key_and_certificate(),
            Err(PkiError::PrivateKeyNotFound(_))
        ));
    }
}
