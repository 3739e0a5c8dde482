//! Object store artifact service implementation

use crate::address::{self, ArtifactIdentity, Location};
use crate::listing::ArtifactNames;
use crate::version::{self, MAX_ALLOCATION_ATTEMPTS};
use crate::*;
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use zdk_telemetry::ArtifactOperation;

const BACKEND: &str = "object_store";

/// Default bound on concurrent deletes when removing every version of an artifact
pub const DEFAULT_DELETE_CONCURRENCY: usize = 8;

/// Object store artifact service implementation.
///
/// Stores one object per version under the key
/// `app_name/user_id/session_id/file_name/version` (`user` replaces the session ID
/// for user-scoped artifacts). The content type travels as object metadata.
/// Any [`ObjectStore`] works; S3-compatible services are the production target.
#[derive(Debug, Clone)]
pub struct ObjectStoreArtifactService {
    store: Arc<dyn ObjectStore>,
    delete_concurrency: usize,
}

impl ObjectStoreArtifactService {
    /// Create a service over an already opened bucket
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
        }
    }

    /// Bound the fan-out used when deleting every version of an artifact
    pub fn with_delete_concurrency(mut self, limit: usize) -> Self {
        self.delete_concurrency = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Enumerate stored versions. An artifact without objects has no versions,
    /// which is not an error at this layer.
    async fn list_versions(&self, identity: &ArtifactIdentity<'_>) -> Result<Vec<i64>> {
        let container = identity.container();
        let prefix = container.to_object_path()?;

        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| ArtifactError::object_store(container.to_key(), e))?;

        let versions = objects
            .iter()
            .filter_map(|meta| meta.location.filename())
            .filter_map(version::parse_version)
            .collect();

        Ok(version::normalize(versions))
    }

    /// Collect artifact names from every key below a scope prefix
    async fn collect_names(&self, scope: &Location, names: &mut ArtifactNames) -> Result<()> {
        let prefix = scope.to_object_path()?;
        let mut objects = self.store.list(Some(&prefix));

        while let Some(meta) = objects
            .try_next()
            .await
            .map_err(|e| ArtifactError::object_store(scope.to_key(), e))?
        {
            // app/user/<session|user>/file_name/version: the name is second to last
            let parts: Vec<_> = meta.location.parts().collect();
            if parts.len() < 2 {
                return Err(ArtifactError::MalformedKey(meta.location.to_string()));
            }
            names.insert(parts[parts.len() - 2].as_ref());
        }

        Ok(())
    }

    fn put_options(mode: PutMode, content_type: &str) -> PutOptions {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        PutOptions {
            mode,
            attributes,
            ..Default::default()
        }
    }

    /// Write the next version with a create-only put, re-listing when another
    /// writer claims the candidate first
    async fn write_next_version(
        &self,
        identity: &ArtifactIdentity<'_>,
        payload: PutPayload,
        content_type: &str,
    ) -> Result<i64> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let existing = self.list_versions(identity).await?;
            let candidate =
                version::next_version(&existing).ok_or(ArtifactError::InvalidVersion(i64::MAX))?;
            let location = identity.version(candidate);

            let result = self
                .store
                .put_opts(
                    &location.to_object_path()?,
                    payload.clone(),
                    Self::put_options(PutMode::Create, content_type),
                )
                .await;

            match result {
                Ok(_) => return Ok(candidate),
                Err(object_store::Error::AlreadyExists { .. }) => {
                    tracing::debug!(version = candidate, attempt, "Version already claimed, retrying");
                }
                Err(e) => return Err(ArtifactError::object_store(location.to_key(), e)),
            }
        }

        Err(ArtifactError::VersionConflict {
            artifact: identity.to_string(),
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    /// Delete every listed version concurrently.
    ///
    /// The first failure aborts the remaining deletes. Every spawned task has
    /// finished or been cancelled by the time this returns. Versions removed
    /// before the failure stay removed.
    async fn delete_all_versions(&self, identity: &ArtifactIdentity<'_>) -> Result<()> {
        let versions = self.list_versions(identity).await?;
        let total = versions.len();
        let permits = Arc::new(Semaphore::new(self.delete_concurrency));
        let mut tasks = JoinSet::new();

        for version in versions {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let location = identity.version(version);
            let path = location.to_object_path()?;

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ArtifactError::Other(e.to_string()))?;

                match store.delete(&path).await {
                    Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                    Err(source) => Err(ArtifactError::DeleteFailed {
                        key: location.to_key(),
                        source,
                    }),
                }
            });
        }

        let mut deleted = 0usize;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(ArtifactError::Other(format!("delete task failed: {}", e))),
            };

            match outcome {
                Ok(()) => deleted += 1,
                Err(err) if first_error.is_none() => {
                    tasks.abort_all();
                    first_error = Some(err);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Additional delete failure after abort");
                }
            }
        }

        match first_error {
            Some(err) => {
                tracing::warn!(deleted, total, error = %err, "Artifact only partially deleted");
                Err(err)
            }
            None => {
                tracing::debug!(deleted, "Deleted all artifact versions");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ArtifactService for ObjectStoreArtifactService {
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
            let content_type = req.part.mime_type();
            let payload = PutPayload::from(req.part.as_bytes().to_vec());

            let version = match req.explicit_version()? {
                Some(version) => {
                    let location = identity.version(version);
                    self.store
                        .put_opts(
                            &location.to_object_path()?,
                            payload,
                            Self::put_options(PutMode::Overwrite, content_type),
                        )
                        .await
                        .map_err(|e| ArtifactError::object_store(location.to_key(), e))?;
                    version
                }
                None => {
                    self.write_next_version(&identity, payload, content_type)
                        .await?
                }
            };

            tracing::debug!(version, content_type, "Saved artifact");
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
            let version = match req.explicit_version()? {
                Some(version) => version,
                None => {
                    let versions = self.list_versions(&identity).await?;
                    version::latest_version(&versions)
                        .ok_or_else(|| ArtifactError::NotFound(identity.to_string()))?
                }
            };

            let location = identity.version(version);
            let key = location.to_key();
            let result = match self.store.get(&location.to_object_path()?).await {
                Ok(result) => result,
                Err(object_store::Error::NotFound { .. }) => {
                    tracing::debug!(version, "Requested version not stored");
                    return Err(ArtifactError::NotFound(format!("{} version {}", identity, version)));
                }
                Err(e) => return Err(ArtifactError::object_store(key, e)),
            };

            let content_type = result
                .attributes
                .get(&Attribute::ContentType)
                .map(|value| value.to_string());

            let data = result
                .bytes()
                .await
                .map_err(|e| ArtifactError::object_store(&key, e))?;

            Ok::<_, ArtifactError>(LoadResponse {
                part: ArtifactPart::from_stored(content_type.as_deref(), data.to_vec()),
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
            match req.target()? {
                DeleteTarget::Version(version) => {
                    let location = identity.version(version);
                    match self.store.delete(&location.to_object_path()?).await {
                        Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                            tracing::debug!(version, "Deleted artifact version");
                            Ok(())
                        }
                        Err(e) => Err(ArtifactError::object_store(location.to_key(), e)),
                    }
                }
                DeleteTarget::AllVersions => self.delete_all_versions(&identity).await,
            }
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
            let mut names = ArtifactNames::new();
            self.collect_names(
                &address::session_scope(&req.app_name, &req.user_id, &req.session_id),
                &mut names,
            )
            .await?;
            self.collect_names(&address::user_scope(&req.app_name, &req.user_id), &mut names)
                .await?;

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
            let versions = self.list_versions(&identity).await?;
            Ok::<_, ArtifactError>(VersionsResponse {
                versions: require_versions(&identity, versions)?,
            })
        }
        .instrument(span)
        .await
    }
}
