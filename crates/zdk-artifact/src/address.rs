//! Artifact addressing shared by every backend.
//!
//! A location is an ordered list of segments:
//! `app_name/user_id/<session_id | "user">/file_name[/version]`.
//! The file system joins them into a path under its root, the object store
//! joins them into a key. Names are used verbatim; callers supply
//! storage-safe identifiers.

use crate::{ArtifactError, DeleteRequest, LoadRequest, Result, SaveRequest, VersionsRequest};
use std::fmt;
use std::path::{Path, PathBuf};

/// Filename prefix marking an artifact as visible across all of a user's sessions
pub const USER_NAMESPACE_PREFIX: &str = "user:";

/// Segment that replaces the session ID for user-scoped artifacts
pub const USER_SCOPE_SEGMENT: &str = "user";

/// Separator between segments of an object key
pub const KEY_DELIMITER: &str = "/";

/// Which namespace an artifact lives in, derived from its filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Session,
    User,
}

pub fn classify(file_name: &str) -> Namespace {
    if file_name.starts_with(USER_NAMESPACE_PREFIX) {
        Namespace::User
    } else {
        Namespace::Session
    }
}

/// A physical location, independent of how a backend renders it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    segments: Vec<String>,
}

impl Location {
    fn new<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            segments: segments.into_iter().map(str::to_string).collect(),
        }
    }

    /// The location one level below this one
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Render as a file system path below `root`
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }

    /// Render as a flat object key
    pub fn to_key(&self) -> String {
        self.segments.join(KEY_DELIMITER)
    }

    /// Render as an object store path.
    ///
    /// Segments are kept verbatim, so the stored key is exactly [`Location::to_key`]
    /// and listed names read back unchanged. Segments the store cannot represent
    /// (`.`, `..`, control characters) are rejected as [`ArtifactError::MalformedKey`].
    pub fn to_object_path(&self) -> Result<object_store::path::Path> {
        let key = self.to_key();
        object_store::path::Path::parse(&key).map_err(|e| {
            tracing::debug!(key = %key, error = %e, "Key not representable in object store");
            ArtifactError::MalformedKey(key)
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

fn scope_segment<'a>(session_id: &'a str, file_name: &str) -> &'a str {
    match classify(file_name) {
        Namespace::User => USER_SCOPE_SEGMENT,
        Namespace::Session => session_id,
    }
}

/// Location of one stored version
pub fn location(
    app_name: &str,
    user_id: &str,
    session_id: &str,
    file_name: &str,
    version: i64,
) -> Location {
    container_location(app_name, user_id, session_id, file_name).child(version.to_string())
}

/// Location holding every version of one artifact
pub fn container_location(
    app_name: &str,
    user_id: &str,
    session_id: &str,
    file_name: &str,
) -> Location {
    Location::new([
        app_name,
        user_id,
        scope_segment(session_id, file_name),
        file_name,
    ])
}

/// Location holding all session-scoped artifacts of a session
pub fn session_scope(app_name: &str, user_id: &str, session_id: &str) -> Location {
    Location::new([app_name, user_id, session_id])
}

/// Location holding all user-scoped artifacts of a user
pub fn user_scope(app_name: &str, user_id: &str) -> Location {
    Location::new([app_name, user_id, USER_SCOPE_SEGMENT])
}

/// The four fields that name a logical artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactIdentity<'a> {
    pub app_name: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub file_name: &'a str,
}

impl<'a> ArtifactIdentity<'a> {
    pub fn container(&self) -> Location {
        container_location(self.app_name, self.user_id, self.session_id, self.file_name)
    }

    pub fn version(&self, version: i64) -> Location {
        location(
            self.app_name,
            self.user_id,
            self.session_id,
            self.file_name,
            version,
        )
    }
}

impl fmt::Display for ArtifactIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.app_name, self.user_id, self.session_id, self.file_name
        )
    }
}

macro_rules! impl_identity {
    ($($request:ty),*) => {
        $(
            impl $request {
                /// The artifact this request addresses
                pub fn identity(&self) -> ArtifactIdentity<'_> {
                    ArtifactIdentity {
                        app_name: &self.app_name,
                        user_id: &self.user_id,
                        session_id: &self.session_id,
                        file_name: &self.file_name,
                    }
                }
            }
        )*
    };
}

impl_identity!(SaveRequest, LoadRequest, DeleteRequest, VersionsRequest);
