use std::sync::Once;
use std::time::Duration;

use lance_core::{JobStatus, NodeStatus};
use lance_engine::{ClientSettings, FailureKind, MeshApi, ReqwestMeshApi};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(lance_logging::initialize_for_tests);
}

fn api_for(server: &MockServer) -> ReqwestMeshApi {
    ReqwestMeshApi::new(ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    })
}

#[tokio::test]
async fn topology_snapshot_is_decoded() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mesh/topology"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "nodes": [
                    {"id": "a1", "name": "Ada", "role": "writer", "status": "busy", "skills": ["copy", "seo"]},
                    {"id": "b2", "name": "Bo", "status": "offline"}
                ],
                "edges": [{"source": "a1", "target": "b2", "source_name": "Ada", "target_name": "Bo"}]
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let snapshot = api_for(&server).topology().await.expect("topology ok");
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.nodes[0].status, NodeStatus::Busy);
    assert_eq!(snapshot.nodes[0].primary_skill(), Some("copy"));
    assert_eq!(snapshot.nodes[1].role, "");
    assert_eq!(snapshot.edges[0].target_name, "Bo");
}

#[tokio::test]
async fn health_and_job_are_decoded() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mesh/health"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"status": "ok", "agents_total": 5, "agents_available": 3}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/42"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "id": "42",
                "title": "Launch video",
                "status": "in_progress",
                "subtasks": [{"id": "s1", "title": "Script", "status": "completed"}],
                "deliverables": [{"id": "d1", "type": "text", "content": "Hello"}]
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let health = api.health().await.expect("health ok");
    assert_eq!(health.agents_total, 5);
    assert_eq!(health.agents_available, 3);

    let job = api.job("42").await.expect("job ok");
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.subtasks[0].title, "Script");
    assert_eq!(job.deliverables[0].kind, "text");
}

#[tokio::test]
async fn missing_job_reports_http_status() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_for(&server).job("nope").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mesh/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).health().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn slow_backend_times_out() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mesh/topology"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("{}"),
        )
        .mount(&server)
        .await;

    let api = ReqwestMeshApi::new(ClientSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ClientSettings::default()
    });
    let err = api.topology().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn unauthenticated_session_is_not_an_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert_eq!(api_for(&server).current_user().await, Ok(None));
}

#[tokio::test]
async fn signed_in_user_and_logout() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"username": "ada", "full_name": "Ada L.", "email": "ada@example.com"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let user = api.current_user().await.expect("user ok").expect("signed in");
    assert_eq!(user.display_name(), "Ada L.");
    api.logout().await.expect("logout ok");
}

#[tokio::test]
async fn bad_base_url_is_rejected_before_sending() {
    let api = ReqwestMeshApi::new(ClientSettings {
        base_url: "not a url".to_string(),
        ..ClientSettings::default()
    });
    let err = api.health().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
