#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Session lifecycle across process restarts, backed by the file store.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use minaret_auth::{CredentialStore, FileCredentialStore, SecretString};
use minaret_client::{ApiClientConfig, Session};
use serde_json::json;
use url::Url;

fn config(server: &MockServer) -> ApiClientConfig {
    ApiClientConfig::for_testing(Url::parse(&server.base_url()).unwrap())
}

fn open(server: &MockServer, path: &std::path::Path) -> Session {
    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));
    Session::connect(config(server), store).unwrap()
}

fn user(id: &str) -> serde_json::Value {
    json!({"id": id, "email": "a@b.c", "emailVerified": true, "roles": ["user"]})
}

#[tokio::test]
async fn login_survives_restart_and_logout_clears_file() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/login");
        then.status(200).json_body(json!({
            "user": user("u1"),
            "accessToken": "acc-1",
            "refreshToken": "ref-1"
        }));
    });
    let profile = server.mock(|when, then| {
        when.method(GET)
            .path("/user/profile")
            .header("authorization", "Bearer acc-1");
        then.status(200).json_body(json!({"user": user("u1")}));
    });
    let logout = server.mock(|when, then| {
        when.method(POST)
            .path("/auth/logout")
            .json_body(json!({"refreshToken": "ref-1"}));
        then.status(200);
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minaret").join("credentials.json");

    let first = open(&server, &path);
    first.login("a@b.c", SecretString::from("pw")).await.unwrap();
    drop(first);
    assert!(path.exists());

    let second = open(&server, &path);
    let state = second.hydrate().await;
    assert!(state.is_authenticated);
    assert_eq!(state.user.unwrap().id, "u1");
    profile.assert_calls(2);

    second.logout().await.unwrap();
    logout.assert();
    assert!(!path.exists());

    let third = open(&server, &path);
    assert!(!third.hydrate().await.is_authenticated);
}

#[tokio::test]
async fn expired_access_token_is_refreshed_once_across_surfaces() {
    let server = MockServer::start();
    for path in ["/user/profile", "/auth/sessions", "/admin/dashboard"] {
        server.mock(|when, then| {
            when.method(GET).path(path).header("authorization", "Bearer old");
            then.status(401).json_body(json!({"message": "jwt expired"}));
        });
    }
    server.mock(|when, then| {
        when.method(GET)
            .path("/user/profile")
            .header("authorization", "Bearer new");
        then.status(200).json_body(user("u1"));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/auth/sessions")
            .header("authorization", "Bearer new");
        then.status(200).json_body(json!([{"id": "s1", "isCurrent": true}]));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/admin/dashboard")
            .header("authorization", "Bearer new");
        then.status(200).json_body(json!({"userCount": 3}));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/auth/refresh")
            .json_body(json!({"refreshToken": "r0"}));
        then.status(200)
            .delay(Duration::from_millis(250))
            .json_body(json!({"accessToken": "new", "refreshToken": "r1"}));
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"accessToken":"old","refreshToken":"r0"}"#).unwrap();

    let session = open(&server, &path);
    let api = session.api();
    let (user, auth, admin) = (api.user(), api.auth(), api.admin());
    let (profile, sessions, stats) =
        tokio::join!(user.profile(), auth.sessions(), admin.dashboard());

    assert_eq!(profile.unwrap().id, "u1");
    assert!(sessions.unwrap()[0].is_current);
    assert_eq!(stats.unwrap().user_count, Some(3));
    refresh.assert_calls(1);

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, json!({"accessToken": "new", "refreshToken": "r1"}));
}

#[tokio::test]
async fn observers_see_invalidation() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/user/profile")
            .header("authorization", "Bearer acc");
        then.status(200).json_body(user("u1"));
    });
    server.mock(|when, then| {
        when.method(POST).path("/user/deactivate");
        then.status(401);
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(401);
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"accessToken":"acc","refreshToken":"ref"}"#).unwrap();

    let session = open(&server, &path);
    let mut changes = session.subscribe();
    assert!(session.hydrate().await.is_authenticated);
    changes.mark_unchanged();

    let err = session.api().user().deactivate().await.unwrap_err();
    assert!(err.is_unauthorized());

    changes.changed().await.unwrap();
    assert!(!changes.borrow().is_authenticated);
    assert!(!path.exists());
}
