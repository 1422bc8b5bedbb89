//! End-to-end tests for the assembled client against a `wiremock` backend
//! and a real storage directory.

use std::sync::{Arc, Mutex};

use chatline::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Notifier for Recorder {
    fn notify_success(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("ok: {message}"));
    }

    fn notify_failure(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("error: {message}"));
    }
}

fn client_for(
    server: &MockServer,
    dir: &tempfile::TempDir,
) -> ChatlineClient<Recorder> {
    client_with(server, dir, Recorder::default())
}

fn client_with(
    server: &MockServer,
    dir: &tempfile::TempDir,
    recorder: Recorder,
) -> ChatlineClient<Recorder> {
    ChatlineClient::builder()
        .backend_url(server.uri())
        .storage_dir(dir.path())
        .notifier(recorder)
        .build()
        .expect("client")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "T1",
            "userData": { "_id": "U1", "fullName": "Ada Lovelace" },
            "message": "Login successful"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_restart_resumes_from_disk() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/check"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": { "_id": "U1", "fullName": "Ada Lovelace" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    {
        let client = client_for(&server, &dir);
        let identity = client
            .login(AuthMode::Login, &AuthRequest::login("ada@example.com", "x"))
            .await
            .unwrap();
        assert_eq!(identity.full_name.as_deref(), Some("Ada Lovelace"));
        client.shutdown().await.unwrap();
    }
    assert_eq!(
        std::fs::read_to_string(dir.path().join("token")).unwrap(),
        "T1"
    );

    let client = client_for(&server, &dir);
    let resumed = client.resume_session().await.unwrap();

    assert_eq!(resumed.map(|i| i.id), Some(UserId::new("U1")));
    assert_eq!(client.session().credential(), Some(Credential::new("T1")));
}

#[tokio::test]
async fn test_login_rejected_surfaces_backend_message() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Invalid credentials"
        })))
        .mount(&server)
        .await;
    let recorder = Recorder::default();
    let client = client_with(&server, &dir, recorder.clone());

    let err = client
        .login(AuthMode::Login, &AuthRequest::login("ada@example.com", "wrong"))
        .await
        .unwrap_err();

    assert!(err.is_rejection());
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(client.identity().is_none());
    assert!(!dir.path().join("token").exists());
    assert_eq!(
        *recorder.messages.lock().unwrap(),
        vec!["error: Invalid credentials".to_string()]
    );
}

#[tokio::test]
async fn test_logout_removes_stored_credential() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;
    let recorder = Recorder::default();
    let client = client_with(&server, &dir, recorder.clone());
    client
        .login(AuthMode::Login, &AuthRequest::login("ada@example.com", "x"))
        .await
        .unwrap();

    client.logout().await.unwrap();

    assert!(!dir.path().join("token").exists());
    assert!(client.identity().is_none());
    assert_eq!(client.channel_state(), ChannelState::NoChannel);
    assert_eq!(
        *recorder.messages.lock().unwrap(),
        vec![
            "ok: Login successful".to_string(),
            "ok: Logged out successfully".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_resume_with_expired_credential_clears_disk() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("token"), "stale").unwrap();
    Mock::given(method("GET"))
        .and(path("/api/auth/check"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "jwt expired"
        })))
        .mount(&server)
        .await;
    let client = client_for(&server, &dir);

    let err = client.resume_session().await.unwrap_err();

    assert!(err.is_rejection());
    assert!(!dir.path().join("token").exists());
    assert!(client.identity().is_none());
}
