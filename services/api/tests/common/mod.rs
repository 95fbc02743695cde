//! A scripted stand-in for the chat completions endpoint, served over real HTTP
//! on a random local port.

#![allow(dead_code)]

use api_lib::config::Config;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer from the stub.
pub enum Scripted {
    Reply(String),
    Status(u16, String),
    RateLimited { retry_after_secs: Option<u64> },
    Slow(Duration, String),
}

/// What the stub saw for one request.
#[derive(Clone, Debug)]
pub struct Seen {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct StubState {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<Seen>>,
}

pub struct StubUpstream {
    pub addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubUpstream {
    pub async fn start(script: Vec<Scripted>) -> Self {
        let state = Arc::new(StubState {
            script: Mutex::new(script.into()),
            seen: Mutex::default(),
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.state.seen.lock().unwrap().clone()
    }

    /// Test configuration aimed at this stub, with a short backoff.
    pub fn config(&self) -> Config {
        Config {
            openai_api_base: self.api_base(),
            request_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(10),
            ..Config::default()
        }
    }
}

pub fn completion_body(text: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000u32,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

pub fn error_body(message: &str, code: &str) -> String {
    json!({ "error": { "message": message, "type": "invalid_request_error", "code": code } })
        .to_string()
}

async fn completions(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.seen.lock().unwrap().push(Seen {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some(Scripted::Reply(text)) => Json(completion_body(&text)).into_response(),
        Some(Scripted::Status(code, body)) => {
            (StatusCode::from_u16(code).unwrap(), body).into_response()
        }
        Some(Scripted::RateLimited { retry_after_secs }) => {
            let body = error_body("Rate limit reached for gpt-4o", "rate_limit_exceeded");
            match retry_after_secs {
                Some(secs) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", secs.to_string())],
                    body,
                )
                    .into_response(),
                None => (StatusCode::TOO_MANY_REQUESTS, body).into_response(),
            }
        }
        Some(Scripted::Slow(delay, text)) => {
            tokio::time::sleep(delay).await;
            Json(completion_body(&text)).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "script exhausted").into_response(),
    }
}

/// A tiny valid PNG header; the model never decodes it in tests.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

pub const ANALYSIS_JSON: &str = r#"{"errorType":"runtime","language":"Python","ide":"VS Code","suggestedFix":"1. Guard against an empty list"}"#;
