//! Span creation helpers for artifact storage operations

use crate::attributes::*;
use std::fmt;

/// The storage operation a span describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOperation {
    Save,
    Load,
    Delete,
    List,
    Versions,
}

impl ArtifactOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Load => "load",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Versions => "versions",
        }
    }
}

impl fmt::Display for ArtifactOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes for tracing an artifact operation
#[derive(Debug, Clone)]
pub struct ArtifactSpanAttributes<'a> {
    pub operation: ArtifactOperation,
    pub backend: &'static str,
    pub app_name: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    /// Absent for listing, which spans a whole session
    pub file_name: Option<&'a str>,
}

/// Create the span an artifact operation runs in.
///
/// The caller attaches it with `tracing::Instrument` so every event emitted by
/// the backend (including best-effort cleanup warnings) carries the artifact identity.
pub fn artifact_span(attrs: ArtifactSpanAttributes<'_>) -> tracing::Span {
    let span = tracing::info_span!(
        "artifact",
        { ARTIFACT_OPERATION } = attrs.operation.as_str(),
        { ARTIFACT_BACKEND } = attrs.backend,
        { ARTIFACT_APP_NAME } = %attrs.app_name,
        { ARTIFACT_USER_ID } = %attrs.user_id,
        { ARTIFACT_SESSION_ID } = %attrs.session_id,
        { ARTIFACT_FILE_NAME } = tracing::field::Empty,
    );

    if let Some(file_name) = attrs.file_name {
        span.record(ARTIFACT_FILE_NAME, file_name);
    }

    span
}
