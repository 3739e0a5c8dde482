//! Artifact backend configuration
//!
//! Selects and configures the storage backend from a TOML `[artifact]` table:
//!
//! ## Local file system
//! ```toml
//! [artifact]
//! provider = "filesystem"
//!
//! [artifact.filesystem]
//! root = "./artifacts"
//! ```
//!
//! ## S3-compatible object store
//! ```toml
//! [artifact]
//! provider = "s3"
//! delete_concurrency = 16      # optional, defaults to 8
//!
//! [artifact.s3]
//! bucket = "agent-artifacts"
//! region = "us-east-1"                   # optional, falls back to AWS_REGION
//! endpoint = "http://localhost:9000"     # optional, for MinIO and friends
//! access_key_id = "${MINIO_ACCESS_KEY}"  # optional, falls back to AWS_ACCESS_KEY_ID
//! secret_access_key = "${MINIO_SECRET}"  # optional
//! allow_http = true                      # optional
//! ```
//!
//! String values of the form `${VAR_NAME}` are read from the environment.

use crate::{
    ArtifactService, DEFAULT_DELETE_CONCURRENCY, FileSystemArtifactService,
    ObjectStoreArtifactService,
};
use anyhow::{Context, Result, anyhow, bail};
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Which backend to use and how to reach it
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// Bound on concurrent deletes when removing every version of an artifact
    #[serde(default = "default_delete_concurrency")]
    pub delete_concurrency: usize,
}

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Directory tree on the local file system
    #[serde(rename = "filesystem")]
    FileSystem { filesystem: FileSystemSettings },

    /// S3-compatible object store
    #[serde(rename = "s3")]
    S3 { s3: S3Settings },
}

/// Local file system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemSettings {
    /// Root directory; created on open if missing
    pub root: PathBuf,
}

/// S3-compatible bucket settings
///
/// Unset optional values fall back to the standard `AWS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Settings {
    pub bucket: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub allow_http: bool,
}

/// Shape of a configuration file: only the `[artifact]` table is read
#[derive(Deserialize)]
struct ConfigFile {
    artifact: ArtifactConfig,
}

impl ArtifactConfig {
    /// Load configuration from a TOML file containing an `[artifact]` table
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Loading artifact configuration from: {:?}", path);

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse configuration from TOML text containing an `[artifact]` table
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).context("Invalid artifact configuration")?;
        let mut config = file.artifact;

        config.resolve_env_vars()?;
        config.validate()?;

        Ok(config)
    }

    /// Filesystem configuration rooted at `root`
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::FileSystem {
                filesystem: FileSystemSettings { root: root.into() },
            },
            delete_concurrency: default_delete_concurrency(),
        }
    }

    /// Create test-friendly defaults (file system under the temp directory)
    pub fn test_defaults() -> Self {
        Self::filesystem(env::temp_dir().join("zdk-artifacts-test"))
    }

    /// Short backend name, as recorded on operation spans
    pub fn provider_name(&self) -> &'static str {
        match self.backend {
            BackendConfig::FileSystem { .. } => "filesystem",
            BackendConfig::S3 { .. } => "s3",
        }
    }

    /// Construct the configured backend.
    ///
    /// Backend selection happens here only; callers keep the returned handle
    /// for the life of the process.
    pub fn open(&self) -> Result<Arc<dyn ArtifactService>> {
        self.validate()?;

        let service: Arc<dyn ArtifactService> = match &self.backend {
            BackendConfig::FileSystem { filesystem } => {
                let service = FileSystemArtifactService::new(&filesystem.root).with_context(
                    || format!("Failed to open artifact root: {:?}", filesystem.root),
                )?;
                Arc::new(service)
            }
            BackendConfig::S3 { s3 } => {
                let store = s3.build_store()?;
                Arc::new(
                    ObjectStoreArtifactService::new(store)
                        .with_delete_concurrency(self.delete_concurrency),
                )
            }
        };

        tracing::info!(provider = self.provider_name(), "Artifact service ready");
        Ok(service)
    }

    fn validate(&self) -> Result<()> {
        if self.delete_concurrency == 0 {
            bail!("artifact.delete_concurrency must be at least 1");
        }

        match &self.backend {
            BackendConfig::FileSystem { filesystem } => {
                if filesystem.root.as_os_str().is_empty() {
                    bail!("artifact.filesystem.root must not be empty");
                }
            }
            BackendConfig::S3 { s3 } => {
                if s3.bucket.is_empty() {
                    bail!("artifact.s3.bucket must not be empty");
                }
            }
        }

        Ok(())
    }

    /// Resolve ${VAR_NAME} references to environment variables
    fn resolve_env_vars(&mut self) -> Result<()> {
        match &mut self.backend {
            BackendConfig::FileSystem { filesystem } => {
                if let Some(raw) = filesystem.root.to_str() {
                    let resolved = Self::resolve_env_var(raw).ok_or_else(|| {
                        anyhow!("artifact.filesystem.root references an unset variable: {}", raw)
                    })?;
                    filesystem.root = PathBuf::from(resolved);
                }
            }
            BackendConfig::S3 { s3 } => {
                s3.bucket = Self::resolve_env_var(&s3.bucket).ok_or_else(|| {
                    anyhow!("artifact.s3.bucket references an unset variable: {}", s3.bucket)
                })?;

                // Unresolved optional values fall back to the AWS_* environment
                for field in [
                    &mut s3.region,
                    &mut s3.endpoint,
                    &mut s3.access_key_id,
                    &mut s3.secret_access_key,
                ] {
                    if let Some(value) = field.take() {
                        *field = Self::resolve_env_var(&value);
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }
}

impl S3Settings {
    /// Build the bucket client, overlaying these settings on `AWS_*` variables.
    /// Conditional puts are enabled so version allocation can claim keys atomically.
    pub fn build_store(&self) -> Result<Arc<dyn object_store::ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&self.bucket)
            .with_allow_http(self.allow_http)
            .with_conditional_put(S3ConditionalPut::ETagMatch);

        if let Some(region) = &self.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &self.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &self.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder
            .build()
            .with_context(|| format!("Failed to configure S3 bucket: {}", self.bucket))?;

        Ok(Arc::new(store))
    }
}

fn default_delete_concurrency() -> usize {
    DEFAULT_DELETE_CONCURRENCY
}
