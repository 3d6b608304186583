//! In-memory implementation of the server side of the dispatch protocol.
//!
//! Serves `POST /dispatch` (JSON action envelopes), `POST /upload`
//! (multipart) and `POST /unavailable` (always 503 with an HTML body) for
//! client tests.

use axum::{
    extract::Multipart,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;

pub const SESSION_COOKIE: &str = "session=mock-session";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

pub fn app() -> Router {
    Router::new()
        .route("/dispatch", post(dispatch))
        .route("/upload", post(upload))
        .route("/unavailable", post(unavailable))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map_or(Value::Null, |v| Value::String(v.to_string()))
}

async fn dispatch(headers: HeaderMap, Json(envelope): Json<Envelope>) -> Response {
    debug!(action = %envelope.action, "dispatch");
    let action = envelope.action.as_str();
    match action {
        "ping" => reply(StatusCode::OK, json!({"type": action, "result": {"ok": true}})),
        "echo" => reply(
            StatusCode::OK,
            json!({"type": action, "result": {"payload": envelope.payload, "filter": envelope.filter}}),
        ),
        "list" => reply(
            StatusCode::OK,
            json!({
                "type": action,
                "result": [{"id": 1}, {"id": 2}],
                "meta": {"total": 2, "page": 1}
            }),
        ),
        "whoami" => reply(
            StatusCode::OK,
            json!({"type": action, "result": {"authorization": header_value(&headers, header::AUTHORIZATION)}}),
        ),
        "login" => (
            StatusCode::OK,
            [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/"))],
            Json(json!({"type": action, "result": {"ok": true}})),
        )
            .into_response(),
        "session" => reply(
            StatusCode::OK,
            json!({"type": action, "result": {"cookie": header_value(&headers, header::COOKIE)}}),
        ),
        "fail" => reply(
            StatusCode::BAD_REQUEST,
            json!({
                "type": action,
                "error": {"message": "The action failed", "code": "ACTION_FAILED", "field": "id"}
            }),
        ),
        other => reply(
            StatusCode::NOT_FOUND,
            json!({
                "type": other,
                "error": {"message": format!("Unknown action {other}"), "code": "ACTION.NOT_FOUND"}
            }),
        ),
    }
}

async fn upload(mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return reply(
                    StatusCode::BAD_REQUEST,
                    json!({"type": "upload", "error": {"message": e.to_string(), "code": "UPLOAD.INVALID"}}),
                )
            }
        };
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = match field.bytes().await {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                return reply(
                    StatusCode::BAD_REQUEST,
                    json!({"type": "upload", "error": {"message": e.to_string(), "code": "UPLOAD.INVALID"}}),
                )
            }
        };
        return reply(
            StatusCode::OK,
            json!({
                "type": "upload",
                "result": {"field": field_name, "name": name, "content_type": content_type, "size": size}
            }),
        );
    }
    reply(
        StatusCode::BAD_REQUEST,
        json!({"type": "upload", "error": {"message": "No file received", "code": "UPLOAD.MISSING"}}),
    )
}

async fn unavailable() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "<html>Service Unavailable</html>")
}
