//! Common test utilities and helpers

#![allow(dead_code)]

use object_store::memory::InMemory;
use std::sync::Arc;
use tempfile::TempDir;
use zdk_artifact::{
    ArtifactPart, ArtifactService, DeleteRequest, FileSystemArtifactService, ListRequest,
    LoadRequest, ObjectStoreArtifactService, SaveRequest, VersionsRequest,
};

pub const APP: &str = "test_app";

/// A backend under test, with whatever it needs kept alive
pub struct Backend {
    pub name: &'static str,
    pub service: Arc<dyn ArtifactService>,
    pub store: Option<Arc<InMemory>>,
    _root: Option<TempDir>,
}

impl Backend {
    /// File system backend rooted in a fresh temporary directory
    pub fn filesystem() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let service = FileSystemArtifactService::new(root.path())
            .expect("Failed to open artifact root");
        Self {
            name: "filesystem",
            service: Arc::new(service),
            store: None,
            _root: Some(root),
        }
    }

    /// Object store backend over an in-memory bucket
    pub fn object_store() -> Self {
        let store = Arc::new(InMemory::new());
        Self {
            name: "object_store",
            service: Arc::new(ObjectStoreArtifactService::new(store.clone())),
            store: Some(store),
            _root: None,
        }
    }

    /// Root directory of a file system backend
    pub fn root(&self) -> Option<&std::path::Path> {
        self._root.as_ref().map(|dir| dir.path())
    }
}

/// Every backend, fresh and empty
pub fn backends() -> Vec<Backend> {
    vec![Backend::filesystem(), Backend::object_store()]
}

pub fn save(user: &str, session: &str, file: &str, part: ArtifactPart) -> SaveRequest {
    SaveRequest {
        app_name: APP.to_string(),
        user_id: user.to_string(),
        session_id: session.to_string(),
        file_name: file.to_string(),
        part,
        version: None,
    }
}

pub fn load(user: &str, session: &str, file: &str, version: Option<i64>) -> LoadRequest {
    LoadRequest {
        app_name: APP.to_string(),
        user_id: user.to_string(),
        session_id: session.to_string(),
        file_name: file.to_string(),
        version,
    }
}

pub fn delete(user: &str, session: &str, file: &str, version: Option<i64>) -> DeleteRequest {
    DeleteRequest {
        app_name: APP.to_string(),
        user_id: user.to_string(),
        session_id: session.to_string(),
        file_name: file.to_string(),
        version,
    }
}

pub fn list(user: &str, session: &str) -> ListRequest {
    ListRequest {
        app_name: APP.to_string(),
        user_id: user.to_string(),
        session_id: session.to_string(),
    }
}

pub fn versions(user: &str, session: &str, file: &str) -> VersionsRequest {
    VersionsRequest {
        app_name: APP.to_string(),
        user_id: user.to_string(),
        session_id: session.to_string(),
        file_name: file.to_string(),
    }
}
