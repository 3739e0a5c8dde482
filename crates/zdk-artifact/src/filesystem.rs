//! File system artifact service implementation

use crate::address::{self, ArtifactIdentity};
use crate::listing::ArtifactNames;
use crate::version::{self, MAX_ALLOCATION_ATTEMPTS};
use crate::*;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;
use zdk_telemetry::ArtifactOperation;

const BACKEND: &str = "filesystem";

/// Suffix of the file recording a version's content type
pub const SIDECAR_SUFFIX: &str = ".meta";

/// File system artifact service implementation.
///
/// Stores one file per version plus a sidecar holding its content type.
/// Directory structure: `base_path/app_name/user_id/session_id/file_name/version`,
/// with the sidecar at `.../version.meta`. User-scoped artifacts use the
/// literal `user` segment in place of the session ID.
#[derive(Debug, Clone)]
pub struct FileSystemArtifactService {
    base_path: PathBuf,
}

impl FileSystemArtifactService {
    /// Create a new file system artifact service, creating the root directory if needed
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| ArtifactError::io(&base_path, e))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the directory holding every version of an artifact
    fn artifact_dir(&self, identity: &ArtifactIdentity<'_>) -> PathBuf {
        identity.container().to_path(&self.base_path)
    }

    fn sidecar_path(payload: &Path) -> PathBuf {
        let mut name = OsString::from(payload.as_os_str());
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Get all versions for an artifact. A missing directory means no versions.
    async fn list_versions(&self, artifact_dir: &Path) -> Result<Vec<i64>> {
        let mut entries = match fs::read_dir(artifact_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArtifactError::io(artifact_dir, e)),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ArtifactError::io(artifact_dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| ArtifactError::io(entry.path(), e))?
                .is_dir();
            if is_dir {
                continue;
            }

            if let Some(name) = entry.file_name().to_str()
                && !name.ends_with(SIDECAR_SUFFIX)
                && let Some(version) = version::parse_version(name)
            {
                versions.push(version);
            }
        }

        Ok(version::normalize(versions))
    }

    /// Write a payload into a slot that must not exist yet
    async fn create_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %cleanup,
                    "Failed to remove partially written payload"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Overwrite a caller-pinned version, recreating the directory if a
    /// concurrent delete pruned it in the meantime
    async fn write_pinned(artifact_dir: &Path, version: i64, data: &[u8]) -> Result<()> {
        let path = artifact_dir.join(version.to_string());
        match fs::write(&path, data).await {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(artifact_dir)
                    .await
                    .map_err(|e| ArtifactError::io(artifact_dir, e))?;
                fs::write(&path, data)
                    .await
                    .map_err(|e| ArtifactError::io(&path, e))
            }
            written => written.map_err(|e| ArtifactError::io(&path, e)),
        }
    }

    /// Store the payload and its sidecar, returning the version written
    async fn write_artifact(
        &self,
        identity: &ArtifactIdentity<'_>,
        artifact_dir: &Path,
        req: &SaveRequest,
    ) -> Result<i64> {
        let data = req.part.as_bytes();
        let version = match req.explicit_version()? {
            Some(version) => {
                Self::write_pinned(artifact_dir, version, data).await?;
                version
            }
            None => self.write_next_version(identity, artifact_dir, data).await?,
        };

        let payload = artifact_dir.join(version.to_string());
        let sidecar = Self::sidecar_path(&payload);
        if let Err(e) = fs::write(&sidecar, req.part.mime_type().as_bytes()).await {
            if let Err(cleanup) = fs::remove_file(&payload).await {
                tracing::warn!(
                    path = %payload.display(),
                    error = %cleanup,
                    "Failed to remove payload after sidecar write failure"
                );
            }
            return Err(ArtifactError::io(sidecar, e));
        }

        Ok(version)
    }

    /// Remove an artifact directory that no longer holds any version.
    ///
    /// Best effort: the directory stays if it still has other entries or
    /// cannot be inspected.
    async fn prune_if_empty(&self, artifact_dir: &Path) {
        match self.list_versions(artifact_dir).await {
            Ok(versions) if versions.is_empty() => {}
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(path = %artifact_dir.display(), error = %e, "Failed to inspect artifact directory");
                return;
            }
        }

        match fs::remove_dir(artifact_dir).await {
            Ok(()) => tracing::debug!(path = %artifact_dir.display(), "Pruned empty artifact directory"),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty) => {}
            Err(e) => {
                tracing::warn!(
                    path = %artifact_dir.display(),
                    error = %e,
                    "Failed to remove empty artifact directory"
                );
            }
        }
    }

    /// Claim the next free version slot and write the payload into it
    async fn write_next_version(
        &self,
        identity: &ArtifactIdentity<'_>,
        artifact_dir: &Path,
        data: &[u8],
    ) -> Result<i64> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let existing = self.list_versions(artifact_dir).await?;
            let candidate =
                version::next_version(&existing).ok_or(ArtifactError::InvalidVersion(i64::MAX))?;
            let path = artifact_dir.join(candidate.to_string());

            match Self::create_new(&path, data).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(version = candidate, attempt, "Version already claimed, retrying");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // The directory was pruned by a concurrent delete
                    fs::create_dir_all(artifact_dir)
                        .await
                        .map_err(|e| ArtifactError::io(artifact_dir, e))?;
                }
                Err(e) => return Err(ArtifactError::io(path, e)),
            }
        }

        Err(ArtifactError::VersionConflict {
            artifact: identity.to_string(),
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    /// Collect the names of artifact directories below a scope directory that
    /// still hold at least one version
    async fn collect_names(&self, scope_dir: &Path, names: &mut ArtifactNames) -> Result<()> {
        let mut entries = match fs::read_dir(scope_dir).await {
            Ok(entries) => entries,
            // A session or user without artifacts has no directory yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ArtifactError::io(scope_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ArtifactError::io(scope_dir, e))?
        {
            if entry
                .file_type()
                .await
                .map_err(|e| ArtifactError::io(entry.path(), e))?
                .is_dir()
                && let Some(file_name) = entry.file_name().to_str()
                && !self.list_versions(&entry.path()).await?.is_empty()
            {
                names.insert(file_name);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ArtifactService for FileSystemArtifactService {
    async fn save(&self, req: SaveRequest) -> Result<SaveResponse> {
        req.validate()?;

        let identity = req.identity();
        let span = operation_span(
            ArtifactOperation::Save,
            BACKEND,
            identity.app_name,
            identity.user_id,
            identity.session_id,
            Some(identity.file_name),
        );

        async {
            let artifact_dir = self.artifact_dir(&identity);
            fs::create_dir_all(&artifact_dir)
                .await
                .map_err(|e| ArtifactError::io(&artifact_dir, e))?;

            let version = match self.write_artifact(&identity, &artifact_dir, &req).await {
                Ok(version) => version,
                Err(e) => {
                    // A failed first save must not leave an empty artifact behind
                    self.prune_if_empty(&artifact_dir).await;
                    return Err(e);
                }
            };

            tracing::debug!(version, bytes = req.part.as_bytes().len(), "Saved artifact");
            Ok::<_, ArtifactError>(SaveResponse { version })
        }
        .instrument(span)
        .await
    }

    async fn load(&self, req: LoadRequest) -> Result<LoadResponse> {
        req.validate()?;

        let identity = req.identity();
        let span = operation_span(
            ArtifactOperation::Load,
            BACKEND,
            identity.app_name,
            identity.user_id,
            identity.session_id,
            Some(identity.file_name),
        );

        async {
            let artifact_dir = self.artifact_dir(&identity);

            let version = match req.explicit_version()? {
                Some(version) => version,
                None => {
                    let versions = self.list_versions(&artifact_dir).await?;
                    version::latest_version(&require_versions(&identity, versions)?)
                        .ok_or_else(|| ArtifactError::NotFound(identity.to_string()))?
                }
            };

            let payload = artifact_dir.join(version.to_string());
            let data = match fs::read(&payload).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(version, "Requested version not stored");
                    return Err(ArtifactError::NotFound(format!(
                        "{} version {}",
                        identity, version
                    )));
                }
                Err(e) => return Err(ArtifactError::io(payload, e)),
            };

            let sidecar = Self::sidecar_path(&payload);
            let content_type = match fs::read(&sidecar).await {
                Ok(raw) => String::from_utf8(raw).ok(),
                Err(e) => {
                    tracing::debug!(error = %e, "Content type unavailable, assuming text/plain");
                    None
                }
            };

            Ok::<_, ArtifactError>(LoadResponse {
                part: ArtifactPart::from_stored(content_type.as_deref(), data),
            })
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, req: DeleteRequest) -> Result<()> {
        req.validate()?;

        let identity = req.identity();
        let span = operation_span(
            ArtifactOperation::Delete,
            BACKEND,
            identity.app_name,
            identity.user_id,
            identity.session_id,
            Some(identity.file_name),
        );

        async {
            let artifact_dir = self.artifact_dir(&identity);

            match req.target()? {
                DeleteTarget::Version(version) => {
                    let payload = artifact_dir.join(version.to_string());
                    match fs::remove_file(&payload).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(ArtifactError::io(payload, e)),
                    }

                    let sidecar = Self::sidecar_path(&payload);
                    if let Err(e) = fs::remove_file(&sidecar).await
                        && e.kind() != ErrorKind::NotFound
                    {
                        tracing::warn!(path = %sidecar.display(), error = %e, "Failed to remove sidecar");
                    }

                    // Drop the artifact directory once its last version is gone
                    self.prune_if_empty(&artifact_dir).await;
                    tracing::debug!(version, "Deleted artifact version");
                }
                DeleteTarget::AllVersions => match fs::remove_dir_all(&artifact_dir).await {
                    Ok(()) => tracing::debug!("Deleted all artifact versions"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(ArtifactError::io(artifact_dir, e)),
                },
            }

            Ok::<_, ArtifactError>(())
        }
        .instrument(span)
        .await
    }

    async fn list(&self, req: ListRequest) -> Result<ListResponse> {
        req.validate()?;

        let span = operation_span(
            ArtifactOperation::List,
            BACKEND,
            &req.app_name,
            &req.user_id,
            &req.session_id,
            None,
        );

        async {
            let session_dir = address::session_scope(&req.app_name, &req.user_id, &req.session_id)
                .to_path(&self.base_path);
            let user_dir = address::user_scope(&req.app_name, &req.user_id).to_path(&self.base_path);

            let mut names = ArtifactNames::new();
            self.collect_names(&session_dir, &mut names).await?;
            self.collect_names(&user_dir, &mut names).await?;

            tracing::debug!(count = names.len(), "Listed artifacts");
            Ok::<_, ArtifactError>(ListResponse {
                file_names: names.into_sorted(),
            })
        }
        .instrument(span)
        .await
    }

    async fn versions(&self, req: VersionsRequest) -> Result<VersionsResponse> {
        req.validate()?;

        let identity = req.identity();
        let span = operation_span(
            ArtifactOperation::Versions,
            BACKEND,
            identity.app_name,
            identity.user_id,
            identity.session_id,
            Some(identity.file_name),
        );

        async {
            let versions = self.list_versions(&self.artifact_dir(&identity)).await?;
            Ok::<_, ArtifactError>(VersionsResponse {
                versions: require_versions(&identity, versions)?,
            })
        }
        .instrument(span)
        .await
    }
}
