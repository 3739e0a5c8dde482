//! Artifact service trait definition

use crate::*;
use async_trait::async_trait;
use zdk_telemetry::{ArtifactOperation, ArtifactSpanAttributes, artifact_span};

/// The artifact storage service trait.
///
/// An artifact is a file identified by an application name, a user ID, a session ID,
/// and a filename. The service provides basic storage operations for artifacts,
/// such as Save, Load, Delete, and List. It also supports versioning of artifacts.
///
/// Every backend satisfies the same contract, so callers hold an
/// `Arc<dyn ArtifactService>` chosen once at construction time.
#[async_trait]
pub trait ArtifactService: Send + Sync {
    /// Save an artifact to storage.
    ///
    /// After saving the artifact, a version ID is returned to identify the artifact version.
    async fn save(&self, req: SaveRequest) -> Result<SaveResponse>;

    /// Load an artifact from storage. An unset version loads the latest one.
    async fn load(&self, req: LoadRequest) -> Result<LoadResponse>;

    /// Delete an artifact. Deleting a non-existing entry is not an error.
    async fn delete(&self, req: DeleteRequest) -> Result<()>;

    /// List all artifact filenames visible to a session, including user-scoped ones.
    async fn list(&self, req: ListRequest) -> Result<ListResponse>;

    /// List all versions of an artifact, ascending. Fails with `NotFound` when none exist.
    async fn versions(&self, req: VersionsRequest) -> Result<VersionsResponse>;
}

/// What a delete request removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// A single stored version
    Version(i64),
    /// Every version, resolved immediately before deletion
    AllVersions,
}

/// Span every backend operation runs in
pub(crate) fn operation_span(
    operation: ArtifactOperation,
    backend: &'static str,
    app_name: &str,
    user_id: &str,
    session_id: &str,
    file_name: Option<&str>,
) -> tracing::Span {
    artifact_span(ArtifactSpanAttributes {
        operation,
        backend,
        app_name,
        user_id,
        session_id,
        file_name,
    })
}

/// Turn an empty enumeration into the public `NotFound` outcome
pub(crate) fn require_versions(
    identity: &address::ArtifactIdentity<'_>,
    versions: Vec<i64>,
) -> Result<Vec<i64>> {
    if versions.is_empty() {
        tracing::debug!(artifact = %identity, "No versions stored");
        return Err(ArtifactError::NotFound(identity.to_string()));
    }
    Ok(versions)
}
