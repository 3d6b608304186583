use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, SESSION_COOKIE};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn dispatch_request(body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::ACCEPT, "application/json")
        .body(body.to_string())
        .unwrap()
}

const BOUNDARY: &str = "mock-boundary";

fn multipart_request(field: &str, file_name: Option<&str>, content: &str) -> Request<String> {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

// --- dispatch ---

#[tokio::test]
async fn ping_returns_result_and_echoes_type() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"type":"ping","payload":{}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"type": "ping", "result": {"ok": true}})
    );
}

#[tokio::test]
async fn echo_returns_payload_and_filter() {
    let resp = app()
        .oneshot(dispatch_request(
            r#"{"type":"echo","payload":{"a":1},"filter":{"limit":5}}"#,
        ))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["result"]["payload"], json!({"a": 1}));
    assert_eq!(body["result"]["filter"], json!({"limit": 5}));
}

#[tokio::test]
async fn list_carries_meta() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"type":"list","payload":{}}"#))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["result"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn whoami_reports_authorization_header() {
    let mut req = dispatch_request(r#"{"type":"whoami","payload":{}}"#);
    req.headers_mut().insert(
        http::header::AUTHORIZATION,
        "Bearer abc".parse().unwrap(),
    );
    let resp = app().oneshot(req).await.unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["result"]["authorization"], "Bearer abc");
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"type":"login","payload":{}}"#))
        .await
        .unwrap();

    let cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(SESSION_COOKIE));
}

#[tokio::test]
async fn fail_returns_error_payload() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"type":"fail","payload":{}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "ACTION_FAILED");
    assert_eq!(body["type"], "fail");
}

#[tokio::test]
async fn unknown_action_is_not_found() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"type":"nope","payload":{}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "ACTION.NOT_FOUND");
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let resp = app()
        .oneshot(dispatch_request(r#"{"payload":{}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- upload ---

#[tokio::test]
async fn upload_reports_received_file() {
    let resp = app()
        .oneshot(multipart_request("asset", Some("notes.txt"), "hello"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(
        body["result"],
        json!({"field": "asset", "name": "notes.txt", "content_type": "text/plain", "size": 5})
    );
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let resp = app()
        .oneshot(multipart_request("asset", None, "not a file"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "UPLOAD.MISSING");
}

// --- unavailable ---

#[tokio::test]
async fn unavailable_is_503_html() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/unavailable")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_bytes(resp).await;
    assert!(serde_json::from_slice::<Value>(&body).is_err());
}
