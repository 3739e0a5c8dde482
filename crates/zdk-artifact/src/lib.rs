//! # ZDK Artifact Service
//!
//! Versioned blob storage for agent runtimes.
//! Artifacts are files identified by application name, user ID, session ID, and filename.
//! Every save produces a new positive version number unless the caller pins one.
//!
//! ## Features
//!
//! - **Two Storage Backends**: local file system and S3-compatible object stores
//! - **Versioning**: Automatic version allocation guarded by conditional creates
//! - **User Namespacing**: Special "user:" prefix for user-scoped artifacts
//! - **Async/Await**: Fully asynchronous API using tokio

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod address;
mod bucket;
pub mod config;
mod filesystem;
pub mod listing;
mod service;
pub mod version;

pub use bucket::{DEFAULT_DELETE_CONCURRENCY, ObjectStoreArtifactService};
pub use config::{ArtifactConfig, BackendConfig, FileSystemSettings, S3Settings};
pub use filesystem::FileSystemArtifactService;
pub use service::*;

/// Content type recorded for text parts, and assumed when stored metadata is missing
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Errors that can occur during artifact operations
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid artifact part: {0}")]
    InvalidPart(String),

    /// Negative explicit versions, and auto-allocation past `i64::MAX`
    #[error("Invalid version {0}: versions are positive integers up to i64::MAX")]
    InvalidVersion(i64),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store error for key {key}: {source}")]
    ObjectStore {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Malformed object key: {0}")]
    MalformedKey(String),

    #[error("Failed to delete {key}: {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Could not allocate a version for {artifact} after {attempts} attempts")]
    VersionConflict { artifact: String, attempts: usize },

    #[error("Other error: {0}")]
    Other(String),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn object_store(key: impl Into<String>, source: object_store::Error) -> Self {
        Self::ObjectStore {
            key: key.into(),
            source,
        }
    }

    /// True for the expected "no such artifact or version" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for malformed requests, which are never worth retrying
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::InvalidPart(_) | Self::InvalidVersion(_)
        )
    }
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Represents an artifact part (either text or binary data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactPart {
    /// Text content, stored as UTF-8 with content type `text/plain`
    Text(String),
    /// Binary data with MIME type
    Binary {
        mime_type: String,
        #[serde(with = "base64_serde")]
        data: Vec<u8>,
    },
}

mod base64_serde {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

impl ArtifactPart {
    /// Create a text artifact part
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Create a binary artifact part
    pub fn binary(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Binary {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Rebuild a part from a stored payload and its recorded content type.
    ///
    /// Plain text that decodes as UTF-8 comes back as [`ArtifactPart::Text`];
    /// everything else keeps its bytes and content type verbatim.
    pub fn from_stored(content_type: Option<&str>, data: Vec<u8>) -> Self {
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        if content_type == DEFAULT_CONTENT_TYPE {
            match String::from_utf8(data) {
                Ok(text) => Self::Text(text),
                Err(err) => Self::binary(content_type, err.into_bytes()),
            }
        } else {
            Self::binary(content_type, data)
        }
    }

    /// The content type recorded alongside the payload
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Text(_) => DEFAULT_CONTENT_TYPE,
            Self::Binary { mime_type, .. } => mime_type,
        }
    }

    /// The raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary { data, .. } => data,
        }
    }

    /// Check if this part is empty
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

fn require_fields(fields: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ArtifactError::MissingField(missing.join(", ")))
    }
}

/// Collapse the "unspecified" encodings (`None` and `Some(0)`) and reject negatives
fn requested_version(version: Option<i64>) -> Result<Option<i64>> {
    match version {
        None | Some(0) => Ok(None),
        Some(v) if v < 0 => Err(ArtifactError::InvalidVersion(v)),
        Some(v) => Ok(Some(v)),
    }
}

/// Request to save an artifact
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub file_name: String,
    pub part: ArtifactPart,
    /// Optional: specific version to write, overwriting it if present.
    /// Unset (or 0) allocates the next version.
    pub version: Option<i64>,
}

impl SaveRequest {
    /// Validate the save request
    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("app_name", &self.app_name),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
            ("file_name", &self.file_name),
        ])?;

        if self.part.is_empty() {
            return Err(ArtifactError::InvalidPart(
                "Part must contain either text or binary data".into(),
            ));
        }
        if let ArtifactPart::Binary { mime_type, .. } = &self.part
            && mime_type.is_empty()
        {
            return Err(ArtifactError::InvalidPart(
                "Binary part requires a MIME type".into(),
            ));
        }

        requested_version(self.version).map(|_| ())
    }

    /// The pinned version, if the caller supplied one
    pub fn explicit_version(&self) -> Result<Option<i64>> {
        requested_version(self.version)
    }
}

/// Response from saving an artifact
#[derive(Debug, Clone)]
pub struct SaveResponse {
    pub version: i64,
}

/// Request to load an artifact
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub file_name: String,
    /// Optional: specific version to load (unset or 0 loads latest)
    pub version: Option<i64>,
}

impl LoadRequest {
    /// Validate the load request
    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("app_name", &self.app_name),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
            ("file_name", &self.file_name),
        ])?;
        requested_version(self.version).map(|_| ())
    }

    pub fn explicit_version(&self) -> Result<Option<i64>> {
        requested_version(self.version)
    }
}

/// Response from loading an artifact
#[derive(Debug, Clone)]
pub struct LoadResponse {
    pub part: ArtifactPart,
}

/// Request to delete an artifact
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub file_name: String,
    /// Optional: specific version to delete (unset or 0 deletes all versions)
    pub version: Option<i64>,
}

impl DeleteRequest {
    /// Validate the delete request
    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("app_name", &self.app_name),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
            ("file_name", &self.file_name),
        ])?;
        requested_version(self.version).map(|_| ())
    }

    /// Whether this request removes one version or the whole artifact
    pub fn target(&self) -> Result<DeleteTarget> {
        Ok(match requested_version(self.version)? {
            Some(version) => DeleteTarget::Version(version),
            None => DeleteTarget::AllVersions,
        })
    }
}

/// Request to list artifacts in a session
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl ListRequest {
    /// Validate the list request
    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("app_name", &self.app_name),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
        ])
    }
}

/// Response from listing artifacts
#[derive(Debug, Clone)]
pub struct ListResponse {
    pub file_names: Vec<String>,
}

/// Request to list versions of an artifact
#[derive(Debug, Clone)]
pub struct VersionsRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub file_name: String,
}

impl VersionsRequest {
    /// Validate the versions request
    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("app_name", &self.app_name),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
            ("file_name", &self.file_name),
        ])
    }
}

/// Response from listing versions
#[derive(Debug, Clone)]
pub struct VersionsResponse {
    pub versions: Vec<i64>,
}
