// Integration tests for the artifact backends
// Every scenario runs against both the file system and the object store

mod common;

use common::{Backend, backends, delete, list, load, save, versions};
use futures::TryStreamExt;
use object_store::ObjectStore;
use std::sync::Arc;
use zdk_artifact::{ArtifactError, ArtifactPart, ArtifactService};

#[tokio::test]
async fn test_text_versions_round_trip() {
    for backend in backends() {
        let service = &backend.service;

        let first = service
            .save(save("u1", "s1", "notes.txt", ArtifactPart::text("hello")))
            .await
            .unwrap();
        assert_eq!(first.version, 1, "{}", backend.name);

        let second = service
            .save(save("u1", "s1", "notes.txt", ArtifactPart::text("world")))
            .await
            .unwrap();
        assert_eq!(second.version, 2, "{}", backend.name);

        let latest = service.load(load("u1", "s1", "notes.txt", Some(0))).await.unwrap();
        assert_eq!(latest.part, ArtifactPart::text("world"), "{}", backend.name);
        assert_eq!(latest.part.mime_type(), "text/plain");

        let v1 = service.load(load("u1", "s1", "notes.txt", Some(1))).await.unwrap();
        assert_eq!(v1.part, ArtifactPart::text("hello"), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_binary_payload_preserved() {
    let payload: Vec<u8> = (0..=255).collect();

    for backend in backends() {
        let service = &backend.service;

        let saved = service
            .save(save(
                "u1",
                "s1",
                "blob.bin",
                ArtifactPart::binary("application/octet-stream", payload.clone()),
            ))
            .await
            .unwrap();

        let loaded = service
            .load(load("u1", "s1", "blob.bin", Some(saved.version)))
            .await
            .unwrap();
        assert_eq!(loaded.part.mime_type(), "application/octet-stream", "{}", backend.name);
        assert_eq!(loaded.part.as_bytes(), payload.as_slice(), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_sequential_saves_number_from_one() {
    for backend in backends() {
        let service = &backend.service;

        for expected in 1..=5 {
            let saved = service
                .save(save("u1", "s1", "log.txt", ArtifactPart::text(format!("line {}", expected))))
                .await
                .unwrap();
            assert_eq!(saved.version, expected, "{}", backend.name);
        }

        let listed = service.versions(versions("u1", "s1", "log.txt")).await.unwrap();
        assert_eq!(listed.versions, vec![1, 2, 3, 4, 5], "{}", backend.name);
    }
}

#[tokio::test]
async fn test_versions_without_saves_is_not_found() {
    for backend in backends() {
        let err = backend
            .service
            .versions(versions("u1", "s1", "ghost.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}: {:?}", backend.name, err);

        let err = backend
            .service
            .load(load("u1", "s1", "ghost.txt", None))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}: {:?}", backend.name, err);
    }
}

#[tokio::test]
async fn test_user_scoped_artifact_visible_across_sessions() {
    for backend in backends() {
        let service = &backend.service;

        service
            .save(save(
                "u1",
                "s1",
                "user:avatar.png",
                ArtifactPart::binary("image/png", vec![0x89, 0x50, 0x4E, 0x47]),
            ))
            .await
            .unwrap();
        service
            .save(save("u1", "s1", "draft.md", ArtifactPart::text("# draft")))
            .await
            .unwrap();

        let other_session = service.list(list("u1", "s2")).await.unwrap();
        assert_eq!(other_session.file_names, vec!["user:avatar.png"], "{}", backend.name);

        let same_session = service.list(list("u1", "s1")).await.unwrap();
        assert_eq!(
            same_session.file_names,
            vec!["draft.md", "user:avatar.png"],
            "{}",
            backend.name
        );

        // The user-scoped artifact loads from any session of the same user
        let avatar = service
            .load(load("u1", "s9", "user:avatar.png", None))
            .await
            .unwrap();
        assert_eq!(avatar.part.mime_type(), "image/png");

        // Other users see nothing
        let stranger = service.list(list("u2", "s1")).await.unwrap();
        assert!(stranger.file_names.is_empty(), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_listed_names_load_back() {
    let names = ["draft~1.md", "report[v2].txt", "50%.csv", "a b.txt"];

    for backend in backends() {
        let service = &backend.service;

        for name in names {
            service
                .save(save("u1", "s1", name, ArtifactPart::text(name)))
                .await
                .unwrap();
        }

        let listed = service.list(list("u1", "s1")).await.unwrap();
        let mut expected = names.to_vec();
        expected.sort();
        assert_eq!(listed.file_names, expected, "{}", backend.name);

        for name in &listed.file_names {
            let loaded = service
                .load(load("u1", "s1", name, None))
                .await
                .unwrap_or_else(|e| panic!("{}: {} failed to load: {:?}", backend.name, name, e));
            assert_eq!(loaded.part, ArtifactPart::text(name.as_str()), "{}", backend.name);

            let listed_versions = service.versions(versions("u1", "s1", name)).await.unwrap();
            assert_eq!(listed_versions.versions, vec![1], "{}", backend.name);
        }
    }
}

#[tokio::test]
async fn test_no_version_after_max() {
    for backend in backends() {
        let service = &backend.service;

        let mut req = save("u1", "s1", "edge.txt", ArtifactPart::text("top"));
        req.version = Some(i64::MAX);
        service.save(req).await.unwrap();

        let err = service
            .save(save("u1", "s1", "edge.txt", ArtifactPart::text("next")))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ArtifactError::InvalidVersion(i64::MAX)),
            "{}: {:?}",
            backend.name,
            err
        );
    }
}

#[tokio::test]
async fn test_list_empty_session() {
    for backend in backends() {
        let listed = backend.service.list(list("nobody", "nowhere")).await.unwrap();
        assert!(listed.file_names.is_empty(), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_delete_single_version() {
    for backend in backends() {
        let service = &backend.service;

        for text in ["one", "two", "three"] {
            service
                .save(save("u1", "s1", "notes.txt", ArtifactPart::text(text)))
                .await
                .unwrap();
        }

        service.delete(delete("u1", "s1", "notes.txt", Some(2))).await.unwrap();

        let listed = service.versions(versions("u1", "s1", "notes.txt")).await.unwrap();
        assert_eq!(listed.versions, vec![1, 3], "{}", backend.name);

        let err = service
            .load(load("u1", "s1", "notes.txt", Some(2)))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}: {:?}", backend.name, err);

        // A new save never reuses the gap
        let next = service
            .save(save("u1", "s1", "notes.txt", ArtifactPart::text("four")))
            .await
            .unwrap();
        assert_eq!(next.version, 4, "{}", backend.name);
    }
}

#[tokio::test]
async fn test_delete_whole_artifact() {
    for backend in backends() {
        let service = &backend.service;

        for text in ["a", "b", "c"] {
            service
                .save(save("u1", "s1", "report.txt", ArtifactPart::text(text)))
                .await
                .unwrap();
        }
        service
            .save(save("u1", "s1", "keep.txt", ArtifactPart::text("stays")))
            .await
            .unwrap();

        service.delete(delete("u1", "s1", "report.txt", Some(0))).await.unwrap();

        let err = service
            .versions(versions("u1", "s1", "report.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}: {:?}", backend.name, err);

        let listed = service.list(list("u1", "s1")).await.unwrap();
        assert_eq!(listed.file_names, vec!["keep.txt"], "{}", backend.name);

        // It behaves as if it never existed
        let again = service
            .save(save("u1", "s1", "report.txt", ArtifactPart::text("fresh")))
            .await
            .unwrap();
        assert_eq!(again.version, 1, "{}", backend.name);
    }
}

#[tokio::test]
async fn test_whole_artifact_delete_removes_every_location() {
    // File system: the artifact directory is gone
    let backend = Backend::filesystem();
    for text in ["1", "2", "3"] {
        backend
            .service
            .save(save("u1", "s1", "data.csv", ArtifactPart::text(text)))
            .await
            .unwrap();
    }
    backend
        .service
        .delete(delete("u1", "s1", "data.csv", None))
        .await
        .unwrap();
    let dir = backend
        .root()
        .unwrap()
        .join("test_app")
        .join("u1")
        .join("s1")
        .join("data.csv");
    assert!(!dir.exists());

    // Object store: no keys remain under the artifact prefix
    let backend = Backend::object_store();
    for text in ["1", "2", "3"] {
        backend
            .service
            .save(save("u1", "s1", "data.csv", ArtifactPart::text(text)))
            .await
            .unwrap();
    }
    backend
        .service
        .delete(delete("u1", "s1", "data.csv", None))
        .await
        .unwrap();
    let store = backend.store.as_ref().unwrap();
    let prefix = object_store::path::Path::from("test_app/u1/s1/data.csv");
    let remaining: Vec<_> = store.list(Some(&prefix)).try_collect().await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    for backend in backends() {
        let service = &backend.service;

        service.delete(delete("u1", "s1", "never.txt", None)).await.unwrap();
        service.delete(delete("u1", "s1", "never.txt", Some(7))).await.unwrap();

        service
            .save(save("u1", "s1", "once.txt", ArtifactPart::text("x")))
            .await
            .unwrap();
        service.delete(delete("u1", "s1", "once.txt", Some(1))).await.unwrap();
        service.delete(delete("u1", "s1", "once.txt", Some(1))).await.unwrap();
    }
}

#[tokio::test]
async fn test_explicit_version_overwrites() {
    for backend in backends() {
        let service = &backend.service;

        let mut req = save("u1", "s1", "pinned.txt", ArtifactPart::text("first"));
        req.version = Some(3);
        assert_eq!(service.save(req).await.unwrap().version, 3, "{}", backend.name);

        let mut req = save("u1", "s1", "pinned.txt", ArtifactPart::text("second"));
        req.version = Some(3);
        assert_eq!(service.save(req).await.unwrap().version, 3, "{}", backend.name);

        let loaded = service.load(load("u1", "s1", "pinned.txt", None)).await.unwrap();
        assert_eq!(loaded.part, ArtifactPart::text("second"), "{}", backend.name);

        let listed = service.versions(versions("u1", "s1", "pinned.txt")).await.unwrap();
        assert_eq!(listed.versions, vec![3], "{}", backend.name);
    }
}

#[tokio::test]
async fn test_concurrent_saves_never_share_a_version() {
    for backend in backends() {
        let service = Arc::clone(&backend.service);

        let tasks = (0..6).map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .save(save("u1", "s1", "shared.txt", ArtifactPart::text(format!("w{}", i))))
                    .await
                    .map(|resp| resp.version)
            })
        });

        let mut claimed = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            claimed.push(joined.unwrap().unwrap());
        }
        claimed.sort();
        assert_eq!(claimed, vec![1, 2, 3, 4, 5, 6], "{}", backend.name);
    }
}

#[tokio::test]
async fn test_validation_rejects_bad_requests() {
    for backend in backends() {
        let service = &backend.service;

        let err = service
            .save(save("", "s1", "notes.txt", ArtifactPart::text("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::MissingField(_)), "{}", backend.name);

        let err = service
            .save(save("u1", "s1", "empty.txt", ArtifactPart::text("")))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPart(_)), "{}", backend.name);

        let err = service
            .load(load("u1", "s1", "notes.txt", Some(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidVersion(-1)), "{}", backend.name);

        let mut bad_list = list("u1", "s1");
        bad_list.session_id.clear();
        let err = service.list(bad_list).await.unwrap_err();
        assert!(err.is_validation(), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_backends_share_one_trait_object() {
    let backends = backends();
    let services: Vec<Arc<dyn ArtifactService>> = backends
        .iter()
        .map(|backend| Arc::clone(&backend.service))
        .collect();

    for service in &services {
        let saved = service
            .save(save("u1", "s1", "shared.txt", ArtifactPart::text("x")))
            .await
            .unwrap();
        assert_eq!(saved.version, 1);
    }
}
