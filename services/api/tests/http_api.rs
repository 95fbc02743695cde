mod common;

use api_lib::{
    adapters::OpenAiChatAdapter,
    web::{
        self,
        protocol::{
            AnalysisResponse, AskResponse, CreateSessionResponse, ErrorResponse,
            TranscriptResponse,
        },
        render::EMPTY_TRANSCRIPT,
        state::AppState,
    },
};
use common::{error_body, Scripted, StubUpstream, ANALYSIS_JSON, PNG_BYTES};
use reqwest::{multipart, Client, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct TestApp {
    addr: SocketAddr,
    http: Client,
    upstream: StubUpstream,
}

impl TestApp {
    async fn start(script: Vec<Scripted>) -> Self {
        let upstream = StubUpstream::start(script).await;
        let config = Arc::new(upstream.config());
        let adapter = Arc::new(OpenAiChatAdapter::new(&config).unwrap());
        let app = web::router(Arc::new(AppState::new(config, adapter)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            http: Client::new(),
            upstream,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn new_session(&self) -> Uuid {
        let response = self.http.post(self.url("/sessions")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response
            .json::<CreateSessionResponse>()
            .await
            .unwrap()
            .session_id
    }

    async fn set_key(&self, session_id: Uuid, key: &str) -> StatusCode {
        self.http
            .put(self.url(&format!("/sessions/{}/api-key", session_id)))
            .json(&json!({ "api_key": key }))
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn analyse(&self, session_id: Uuid, prompt: &str) -> reqwest::Response {
        let form = multipart::Form::new().text("prompt", prompt.to_string()).part(
            "screenshot",
            multipart::Part::bytes(PNG_BYTES.to_vec())
                .file_name("error.png")
                .mime_str("image/png")
                .unwrap(),
        );
        self.http
            .post(self.url(&format!("/sessions/{}/analysis", session_id)))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn ask(&self, session_id: Uuid, question: &str) -> reqwest::Response {
        self.http
            .post(self.url(&format!("/sessions/{}/messages", session_id)))
            .json(&json!({ "question": question }))
            .send()
            .await
            .unwrap()
    }

    async fn transcript(&self, session_id: Uuid) -> TranscriptResponse {
        self.http
            .get(self.url(&format!("/sessions/{}/messages", session_id)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn analysis_then_follow_up_conversation() {
    let app = TestApp::start(vec![
        Scripted::Reply(ANALYSIS_JSON.to_string()),
        Scripted::Reply("Check `len(items)` before indexing.".to_string()),
    ])
    .await;
    let session_id = app.new_session().await;
    assert_eq!(app.set_key(session_id, "sk-live-key").await, StatusCode::NO_CONTENT);

    let response = app.analyse(session_id, "IndexError when saving").await;
    assert_eq!(response.status(), StatusCode::OK);
    let analysis: AnalysisResponse = response.json().await.unwrap();
    let fields = analysis.analysis.unwrap();
    assert_eq!(fields.error_type, "runtime");
    assert_eq!(fields.ide, "VS Code");
    assert!(analysis.markdown.contains("**Language:** Python"));
    assert!(analysis.parse_error.is_none());

    let response = app.ask(session_id, "How do I guard it?").await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply: AskResponse = response.json().await.unwrap();
    assert_eq!(reply.reply, "Check `len(items)` before indexing.");
    assert!(reply
        .transcript
        .ends_with("**You:** How do I guard it?\n\n**Assistant:** Check `len(items)` before indexing."));

    let transcript = app.transcript(session_id).await;
    let roles: Vec<&str> = transcript.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);
    assert!(transcript.messages[0].has_image);
    assert!(!transcript.messages[2].has_image);
    assert!(transcript.has_screenshot);

    let seen = app.upstream.requests();
    assert_eq!(seen.len(), 2);
    // System instruction, the two analysis turns and the new question.
    assert_eq!(seen[1].body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(seen[1].body["messages"][3]["content"], "How do I guard it?");
}

#[tokio::test]
async fn non_json_reply_is_returned_raw() {
    let app = TestApp::start(vec![Scripted::Reply("Error: not sure".to_string())]).await;
    let session_id = app.new_session().await;
    app.set_key(session_id, "sk-live-key").await;

    let response = app.analyse(session_id, "").await;

    assert_eq!(response.status(), StatusCode::OK);
    let analysis: AnalysisResponse = response.json().await.unwrap();
    assert!(analysis.analysis.is_none());
    assert_eq!(analysis.raw, "Error: not sure");
    assert!(analysis.parse_error.is_some());
    assert!(analysis.markdown.contains("Raw output:\nError: not sure"));
}

#[tokio::test]
async fn missing_key_is_rejected_without_calling_the_model() {
    let app = TestApp::start(vec![Scripted::Reply(ANALYSIS_JSON.to_string())]).await;
    let session_id = app.new_session().await;

    let response = app.analyse(session_id, "help").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("API key"));
    assert!(app.upstream.requests().is_empty());
}

#[tokio::test]
async fn rejected_key_is_reported_and_nothing_is_recorded() {
    let app = TestApp::start(vec![Scripted::Status(
        401,
        error_body("Incorrect API key provided", "invalid_api_key"),
    )])
    .await;
    let session_id = app.new_session().await;
    app.set_key(session_id, "sk-revoked").await;

    let response = app.analyse(session_id, "help").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("API key"));
    assert!(!body.error.contains("sk-revoked"));
    assert_eq!(app.transcript(session_id).await.transcript, EMPTY_TRANSCRIPT);
}

#[tokio::test]
async fn unsupported_upload_is_an_encoding_error() {
    let app = TestApp::start(vec![]).await;
    let session_id = app.new_session().await;
    app.set_key(session_id, "sk-live-key").await;

    let form = multipart::Form::new().part(
        "screenshot",
        multipart::Part::bytes(b"%PDF-1.7".to_vec())
            .file_name("trace.pdf")
            .mime_str("application/pdf")
            .unwrap(),
    );
    let response = app
        .http
        .post(app.url(&format!("/sessions/{}/analysis", session_id)))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.starts_with("**Image Error**"));
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let app = TestApp::start(vec![]).await;
    let session_id = app.new_session().await;
    app.set_key(session_id, "sk-live-key").await;

    let response = app.ask(session_id, "   ").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error, "Please ask a question.");
}

#[tokio::test]
async fn concurrent_request_on_the_same_session_is_refused() {
    let app = Arc::new(
        TestApp::start(vec![Scripted::Slow(
            Duration::from_millis(800),
            "slow answer".to_string(),
        )])
        .await,
    );
    let session_id = app.new_session().await;
    app.set_key(session_id, "sk-live-key").await;

    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.ask(session_id, "first").await.status() })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = app.ask(session_id, "second").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(first.await.unwrap(), StatusCode::OK);
    assert_eq!(app.upstream.requests().len(), 1);
}

#[tokio::test]
async fn sessions_are_independent_and_deletable() {
    let app = TestApp::start(vec![Scripted::Reply("only for the first".to_string())]).await;
    let first = app.new_session().await;
    let second = app.new_session().await;
    app.set_key(first, "sk-first").await;

    assert_eq!(app.ask(first, "hello").await.status(), StatusCode::OK);

    assert_eq!(app.transcript(first).await.messages.len(), 2);
    let untouched = app.transcript(second).await;
    assert!(untouched.messages.is_empty());
    assert!(!untouched.has_screenshot);
    assert_eq!(
        app.ask(second, "hello").await.status(),
        StatusCode::BAD_REQUEST,
        "the second session has no key of its own"
    );

    let deleted = app
        .http
        .delete(app.url(&format!("/sessions/{}", first)))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.ask(first, "still there?").await.status(), StatusCode::NOT_FOUND);
}
