//! # ZDK Telemetry
//!
//! Tracing and OpenTelemetry bootstrap for ZDK storage services.
//!
//! Every artifact operation runs inside a span carrying the artifact identity
//! (application, user, session, file name) and the backend that served it, so
//! storage latency and failures can be attributed in any OpenTelemetry backend.

mod spans;
mod tracer;

pub use spans::{ArtifactOperation, ArtifactSpanAttributes, artifact_span};
pub use tracer::{
    ProcessorBuilder, TelemetryConfig, init_telemetry, init_telemetry_with, register_span_processor,
    tracer_provider,
};

/// Span attribute names for artifact storage observability.
pub mod attributes {
    pub const ARTIFACT_OPERATION: &str = "zdk.artifact.operation";
    pub const ARTIFACT_BACKEND: &str = "zdk.artifact.backend";
    pub const ARTIFACT_APP_NAME: &str = "zdk.artifact.app_name";
    pub const ARTIFACT_USER_ID: &str = "zdk.artifact.user_id";
    pub const ARTIFACT_SESSION_ID: &str = "zdk.artifact.session_id";
    pub const ARTIFACT_FILE_NAME: &str = "zdk.artifact.file_name";

    /// Instrumentation scope reported to the tracer provider
    pub const SYSTEM_NAME: &str = "zdk.artifact";
}
