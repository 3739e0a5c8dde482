//! # ZDK Artifacts
//!
//! Umbrella crate for the artifact store: the storage backends live in
//! [`artifact`], span and subscriber setup in [`telemetry`].

pub use zdk_artifact as artifact;
pub use zdk_telemetry as telemetry;

pub mod prelude {
    pub use zdk_artifact::{
        ArtifactConfig, ArtifactError, ArtifactPart, ArtifactService, DeleteRequest,
        FileSystemArtifactService, ListRequest, LoadRequest, ObjectStoreArtifactService,
        SaveRequest, VersionsRequest,
    };
    pub use zdk_telemetry::init_telemetry;
}
