//! Mock store (§2, §5): holds parsed mock definitions and offers
//! first-match lookup. Immutable after load, so readers need no lock —
//! grounded on the teacher's `server/persistence.rs::read_static_mocks`
//! directory-walk and the "immutable after load" resource note in §5.

use std::fs::read_dir;
use std::path::Path;

use bytes::Bytes;
use http::Request;
use serde::Deserialize;
use thiserror::Error;

use crate::mock::matcher;
use crate::mock::model::MockDefinition;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot list mock directory '{0}': {1}")]
    DirRead(String, std::io::Error),
    #[error("cannot read mock file '{0}': {1}")]
    FileRead(String, std::io::Error),
    #[error("cannot deserialize mock definition in '{0}': {1}")]
    Deserialize(String, serde_yaml::Error),
}

/// Immutable collection of mock definitions, tried in declared order
/// (§4.2 "first-match wins").
pub struct MockStore {
    definitions: Vec<MockDefinition>,
}

impl MockStore {
    pub fn new(definitions: Vec<MockDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().map(MockDefinition::normalize).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { definitions: Vec::new() }
    }

    /// Loads every `.yaml`/`.yml` file in `dir`, each of which may contain
    /// multiple `---`-separated mock documents.
    pub fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut definitions = Vec::new();

        let entries = read_dir(dir).map_err(|e| Error::DirRead(dir.display().to_string(), e))?;
        for entry in entries {
            let path = entry
                .map_err(|e| Error::DirRead(dir.display().to_string(), e))?
                .path();

            match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => {}
                _ => continue,
            }

            tracing::info!(file = %path.display(), "loading static mock definitions");

            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::FileRead(path.display().to_string(), e))?;

            for document in serde_yaml::Deserializer::from_str(&content) {
                let def = MockDefinition::deserialize(document)
                    .map_err(|e| Error::Deserialize(path.display().to_string(), e))?;
                definitions.push(def);
            }
        }

        Ok(Self::new(definitions))
    }

    /// First definition (in declared order) whose selector matches `req`.
    pub fn first_match(&self, req: &Request<Bytes>, body: &Bytes) -> Option<&MockDefinition> {
        self.definitions
            .iter()
            .find(|def| matcher::matches(&def.request, req, body))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def_yaml(method: &str, path: &str, status: u16) -> String {
        format!(
            "request:\n  method: {method}\n  path: {path}\nresponse:\n  status: {status}\n"
        )
    }

    #[test]
    fn first_match_wins_over_later_overlapping_definitions() {
        let a: MockDefinition = serde_yaml::from_str(&def_yaml("GET", "/a", 200)).unwrap();
        let b: MockDefinition = serde_yaml::from_str(&def_yaml("GET", "/a", 201)).unwrap();
        let store = MockStore::new(vec![a, b]);

        let req = Request::builder().uri("/a").method("GET").body(Bytes::new()).unwrap();
        let matched = store.first_match(&req, &Bytes::new()).unwrap();
        assert_eq!(matched.response.status, 200);
    }

    #[test]
    fn no_match_returns_none() {
        let a: MockDefinition = serde_yaml::from_str(&def_yaml("GET", "/a", 200)).unwrap();
        let store = MockStore::new(vec![a]);
        let req = Request::builder().uri("/b").method("GET").body(Bytes::new()).unwrap();
        assert!(store.first_match(&req, &Bytes::new()).is_none());
    }
}
