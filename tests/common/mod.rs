//! Fake signer and store tools writing placeholder material in the layout the
//! real tools produce.

#![allow(dead_code)]

use pki_platform::error::Result;
use pki_platform::external_interface::{Signer, StoreTool, ToolOutput};
use pki_platform::material::{MaterialKind, CA_CHAIN_FILE_NAME};
use pki_platform::protocol::{SignerRequest, StoreRequest};
use secrecy::{ExposeSecret, SecretString};
use std::cell::RefCell;
use std::fs;

#[derive(Default)]
pub struct RecordingSigner {
    pub requests: RefCell<Vec<SignerRequest>>,
}

impl RecordingSigner {
    pub fn leaf_names(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .filter_map(|r| match r {
                SignerRequest::Leaf { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Signer for RecordingSigner {
    fn sign(&self, request: &SignerRequest) -> Result<ToolOutput> {
        self.requests.borrow_mut().push(request.clone());
        if let (Some(name), Some(out_dir)) = (request.name(), request.out_dir()) {
            for kind in [MaterialKind::Certificate, MaterialKind::PrivateKey] {
                let path = kind.path_in(out_dir, name);
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(&path, format!("{kind} {name}"))?;
            }
            if matches!(request, SignerRequest::Intermediate { .. }) {
                fs::write(out_dir.join("certs").join(CA_CHAIN_FILE_NAME), "root+intermediate")?;
            }
        }
        Ok(ToolOutput {
            tool: "fake-signer".to_string(),
            request: serde_json::to_string(request).unwrap(),
            output: "signed".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingStore {
    pub requests: RefCell<Vec<StoreRequest>>,
    pub passwords: RefCell<Vec<String>>,
}

impl StoreTool for RecordingStore {
    fn store(&self, request: &StoreRequest, password: &SecretString) -> Result<ToolOutput> {
        self.requests.borrow_mut().push(request.clone());
        self.passwords
            .borrow_mut()
            .push(password.expose_secret().to_string());
        let store = request.store();
        fs::create_dir_all(store.parent().unwrap())?;
        let mut content = fs::read_to_string(store).unwrap_or_default();
        content.push_str("entry\n");
        fs::write(store, content)?;
        Ok(ToolOutput {
            tool: "fake-store".to_string(),
            request: serde_json::to_string(request).unwrap(),
            output: "stored".to_string(),
        })
    }
}
