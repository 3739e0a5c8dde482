//! Example demonstrating artifact storage usage
//!
//! ```sh
//! cargo run --example artifact_usage
//! cargo run --example artifact_usage -- --root ./artifacts
//! cargo run --example artifact_usage -- --config config.toml
//! ```

use clap::Parser;
use object_store::memory::InMemory;
use std::path::PathBuf;
use std::sync::Arc;
use zdk_artifact::{
    ArtifactConfig, ArtifactPart, ArtifactService, DeleteRequest, ListRequest, LoadRequest,
    ObjectStoreArtifactService, SaveRequest, VersionsRequest,
};
use zdk_telemetry::{TelemetryConfig, init_telemetry_with};

#[derive(Parser, Debug)]
#[command(about = "Save, load, list and delete artifacts against a storage backend")]
struct Args {
    /// Config file with an [artifact] table; overrides --root
    #[arg(long)]
    config: Option<PathBuf>,

    /// File system root; a temporary directory is used when omitted
    #[arg(long)]
    root: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry_with(TelemetryConfig {
        json: args.json,
        ..Default::default()
    });

    println!("=== ZDK Artifact Service Example ===\n");

    // Keeps a temporary root alive until the end of main
    let mut _scratch = None;
    let configured: Arc<dyn ArtifactService> = match (&args.config, &args.root) {
        (Some(path), _) => ArtifactConfig::load_from(path)?.open()?,
        (None, Some(root)) => ArtifactConfig::filesystem(root).open()?,
        (None, None) => {
            let dir = tempfile::tempdir()?;
            let service = ArtifactConfig::filesystem(dir.path()).open()?;
            _scratch = Some(dir);
            service
        }
    };

    println!("1. Using the configured backend:");
    demonstrate_artifact_service(configured.as_ref()).await?;

    println!("\n2. Using ObjectStoreArtifactService over an in-memory bucket:");
    let bucket = ObjectStoreArtifactService::new(Arc::new(InMemory::new()));
    demonstrate_artifact_service(&bucket).await?;

    Ok(())
}

async fn demonstrate_artifact_service(service: &dyn ArtifactService) -> anyhow::Result<()> {
    // Save a text artifact
    let save_req = SaveRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "document.txt".to_string(),
        part: ArtifactPart::text("Hello, ZDK!"),
        version: None,
    };

    let save_resp = service.save(save_req).await?;
    println!("  Saved artifact, version: {}", save_resp.version);

    // Save another version
    let save_req = SaveRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "document.txt".to_string(),
        part: ArtifactPart::text("Hello, ZDK v2!"),
        version: None,
    };

    let save_resp = service.save(save_req).await?;
    println!("  Saved artifact, version: {}", save_resp.version);

    // Load the latest version
    let load_req = LoadRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "document.txt".to_string(),
        version: None,
    };

    let load_resp = service.load(load_req).await?;
    println!("  Loaded artifact: {:?}", load_resp.part);

    // Save a user-scoped binary artifact, visible from every session of the user
    let image_data = vec![0xFF, 0xD8, 0xFF, 0xE0]; // JPEG header
    let save_req = SaveRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "user:avatar.jpg".to_string(),
        part: ArtifactPart::binary("image/jpeg", image_data),
        version: None,
    };

    service.save(save_req).await?;
    println!("  Saved user-scoped binary artifact");

    // List from another session of the same user
    let list_req = ListRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "another_session".to_string(),
    };

    let list_resp = service.list(list_req).await?;
    println!("  Visible from another session: {:?}", list_resp.file_names);

    let versions_req = VersionsRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "document.txt".to_string(),
    };

    let versions_resp = service.versions(versions_req).await?;
    println!("  document.txt versions: {:?}", versions_resp.versions);

    // Remove every version
    let delete_req = DeleteRequest {
        app_name: "my_app".to_string(),
        user_id: "user123".to_string(),
        session_id: "session456".to_string(),
        file_name: "document.txt".to_string(),
        version: None,
    };

    service.delete(delete_req).await?;
    println!("  Deleted document.txt");

    Ok(())
}
