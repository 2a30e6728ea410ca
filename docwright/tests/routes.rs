use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use docwright::server::rate_limit::RateLimiter;
use docwright::server::{build_router, AppState};
use docwright_core::config::OutputConfig;
use docwright_core::contract::{FileRef, MockCompleter, MockSourceLocator};
use docwright_core::error::{CompletionError, FetchError};
use docwright_core::narrate::Narrator;
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

fn app(completer: MockCompleter, locator: MockSourceLocator, output_dir: &Path) -> Router {
    build_router(AppState {
        narrator: Arc::new(Narrator::new(Arc::new(completer))),
        locator: Arc::new(locator),
        output: Arc::new(OutputConfig::in_dir(output_dir)),
        explain_limiter: RateLimiter::per_minute(10),
    })
}

fn answering(text: &'static str) -> MockCompleter {
    let mut completer = MockCompleter::new();
    completer
        .expect_complete()
        .returning(move |_| Ok(text.to_string()));
    completer
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, post(uri, body.to_string())).await
}

#[tokio::test]
async fn home_returns_welcome_text() {
    let temp = tempdir().unwrap();
    let app = app(MockCompleter::new(), MockSourceLocator::new(), temp.path());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("Welcome"));
}

#[tokio::test]
async fn generate_docstring_without_code_is_rejected() {
    let temp = tempdir().unwrap();
    let mut completer = MockCompleter::new();
    completer.expect_complete().times(0);
    let app = app(completer, MockSourceLocator::new(), temp.path());

    let (status, body) = post_json(app, "/generate-docstring", json!({"context": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No code provided"}));
}

#[tokio::test]
async fn generate_docstring_returns_trimmed_completion() {
    let temp = tempdir().unwrap();
    let app = app(
        answering("  \"\"\"Add two numbers.\"\"\"\n"),
        MockSourceLocator::new(),
        temp.path(),
    );

    let (status, body) = post_json(
        app,
        "/generate-docstring",
        json!({"code": "def add(a, b): return a + b"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["docstring"], "\"\"\"Add two numbers.\"\"\"");
}

#[tokio::test]
async fn improve_docstring_requires_docstring() {
    let temp = tempdir().unwrap();
    let app = app(MockCompleter::new(), MockSourceLocator::new(), temp.path());
    let (status, body) = post_json(app, "/improve-docstring", json!({"docstring": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No docstring provided");
}

#[tokio::test]
async fn improve_docstring_returns_improved_text() {
    let temp = tempdir().unwrap();
    let app = app(answering("Adds a and b."), MockSourceLocator::new(), temp.path());
    let (status, body) = post_json(
        app,
        "/improve-docstring",
        json!({"docstring": "a and b are added", "context": "math helpers"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"improved_docstring": "Adds a and b."}));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let temp = tempdir().unwrap();
    let app = app(MockCompleter::new(), MockSourceLocator::new(), temp.path());
    let (status, body) = send(app, post("/generate-docstring", "{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn fetch_repo_lists_python_files() {
    let temp = tempdir().unwrap();
    let mut locator = MockSourceLocator::new();
    locator
        .expect_list_source_files()
        .withf(|repo| repo.owner == "octo" && repo.repo == "tools")
        .returning(|_| {
            Ok(vec![FileRef {
                name: "main.py".to_string(),
                path: "src/main.py".to_string(),
                download_url: "https://raw.example/src/main.py".to_string(),
            }])
        });
    let app = app(MockCompleter::new(), locator, temp.path());

    let (status, body) = post_json(app, "/fetch-repo", json!({"owner": "octo", "repo": "tools"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["python_files"][0]["path"], "src/main.py");
    assert_eq!(body["python_files"][0]["download_url"], "https://raw.example/src/main.py");
}

#[tokio::test]
async fn fetch_repo_requires_owner_and_repo() {
    let temp = tempdir().unwrap();
    let app = app(MockCompleter::new(), MockSourceLocator::new(), temp.path());
    let (status, body) = post_json(app, "/fetch-repo", json!({"owner": "octo"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No repo provided");
}

#[tokio::test]
async fn exhausted_rate_limit_maps_to_service_unavailable() {
    let temp = tempdir().unwrap();
    let mut locator = MockSourceLocator::new();
    locator
        .expect_list_source_files()
        .returning(|_| Err(FetchError::RateLimited { attempts: 3 }));
    let app = app(MockCompleter::new(), locator, temp.path());

    let (status, body) = post_json(app, "/fetch-repo", json!({"owner": "o", "repo": "r"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("rate limit"));
}

#[tokio::test]
async fn parse_file_returns_entities() {
    let temp = tempdir().unwrap();
    let mut locator = MockSourceLocator::new();
    locator
        .expect_fetch()
        .withf(|url| url == "https://raw.example/shapes.py")
        .returning(|_| {
            Ok("class Shape:\n    \"\"\"A shape.\"\"\"\n    def area(self):\n        return 0\n\ndef make(kind: str) -> Shape:\n    return Shape()\n".to_string())
        });
    let app = app(MockCompleter::new(), locator, temp.path());

    let (status, body) = post_json(
        app,
        "/parse-file",
        json!({"download_url": "https://raw.example/shapes.py"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let function_names: Vec<&str> = body["functions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(function_names, vec!["area", "make"]);
    assert_eq!(body["functions"][1]["parameters"], json!(["kind"]));
    assert_eq!(body["functions"][1]["return_annotation"], "Shape");
    assert_eq!(body["classes"][0]["name"], "Shape");
    assert_eq!(body["classes"][0]["methods"], json!(["area"]));
    assert_eq!(body["classes"][0]["docstring"], "A shape.");
}

#[tokio::test]
async fn parse_file_with_invalid_python_is_unprocessable() {
    let temp = tempdir().unwrap();
    let mut locator = MockSourceLocator::new();
    locator
        .expect_fetch()
        .returning(|_| Ok("class Broken(:\n    pass\n".to_string()));
    let app = app(MockCompleter::new(), locator, temp.path());

    let (status, body) = post_json(app, "/parse-file", json!({"download_url": "u"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("line 1"));
}

#[tokio::test]
async fn explain_code_returns_explanation() {
    let temp = tempdir().unwrap();
    let mut completer = MockCompleter::new();
    completer
        .expect_complete()
        .withf(|prompt| prompt.contains("x = 1") && prompt.contains("They are asking: \"why?\""))
        .times(1)
        .returning(|_| Ok(" Assigns one. ".to_string()));
    let app = app(completer, MockSourceLocator::new(), temp.path());

    let (status, body) = post_json(app, "/explain-code", json!({"code": "x = 1", "query": "why?"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"explanation": "Assigns one."}));
}

#[tokio::test]
async fn explain_code_is_rate_limited_per_client() {
    let temp = tempdir().unwrap();
    let app = app(answering("ok"), MockSourceLocator::new(), temp.path());

    for _ in 0..10 {
        let (status, _) = post_json(
            app.clone(),
            "/explain-code",
            json!({"code": "x = 1", "query": "what?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post(
            "/explain-code",
            json!({"code": "x = 1", "query": "what?"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    // Other routes are not limited.
    let (status, _) = post_json(app, "/generate-docstring", json!({"code": "x = 1"})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn completion_failure_maps_to_bad_gateway() {
    let temp = tempdir().unwrap();
    let mut completer = MockCompleter::new();
    completer.expect_complete().returning(|_| {
        Err(CompletionError::Status {
            status: 500,
            body: "boom".to_string(),
        })
    });
    let app = app(completer, MockSourceLocator::new(), temp.path());

    let (status, body) = post_json(app, "/explain-code", json!({"code": "x", "query": "q"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn generate_docs_writes_both_files() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("docs");
    let app = app(answering("Adds."), MockSourceLocator::new(), &out);

    let (status, body) = post_json(
        app,
        "/generate-docs",
        json!({"code": "def add(a, b):\n    return a + b\n"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Documentation generated successfully");

    let markdown = body["markdown_docs"].as_str().unwrap();
    assert!(markdown.starts_with("# API Documentation\n\n## Functions\n\n### `add`\n"));
    assert_eq!(std::fs::read_to_string(out.join("docs.md")).unwrap(), markdown);
    assert_eq!(
        std::fs::read_to_string(out.join("index.html")).unwrap(),
        body["html_docs"].as_str().unwrap()
    );
}

#[tokio::test]
async fn failed_generation_leaves_no_output() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("docs");
    let mut completer = MockCompleter::new();
    completer.expect_complete().returning(|_| {
        Err(CompletionError::Status {
            status: 500,
            body: String::new(),
        })
    });
    let app = app(completer, MockSourceLocator::new(), &out);

    let (status, _) = post_json(app, "/generate-docs", json!({"code": "def f(): pass"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!out.exists());
}

#[tokio::test]
async fn check_docs_reports_staleness() {
    let temp = tempdir().unwrap();
    let app = app(answering("Adds."), MockSourceLocator::new(), temp.path());

    let (status, body) = post_json(
        app.clone(),
        "/check-docs",
        json!({"code": "def add(a, b): return a + b", "docs": "# Old docs"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Documentation is outdated. Please regenerate.");

    let (_, generated) = post_json(
        app.clone(),
        "/generate-docs",
        json!({"code": "def add(a, b): return a + b"}),
    )
    .await;
    let (status, body) = post_json(
        app,
        "/check-docs",
        json!({"code": "def add(a, b): return a + b", "docs": generated["markdown_docs"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Documentation is up-to-date.");
}

fn explain_from(peer: SocketAddr, forwarded: &str) -> Request<Body> {
    let mut request = post(
        "/explain-code",
        json!({"code": "x = 1", "query": "what?"}).to_string(),
    );
    request.headers_mut().insert("x-forwarded-for", forwarded.parse().unwrap());
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

fn limited_app(limiter: RateLimiter, output_dir: &Path) -> Router {
    build_router(AppState {
        narrator: Arc::new(Narrator::new(Arc::new(answering("ok")))),
        locator: Arc::new(MockSourceLocator::new()),
        output: Arc::new(OutputConfig::in_dir(output_dir)),
        explain_limiter: limiter,
    })
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_bypass_the_limit() {
    let temp = tempdir().unwrap();
    let app = limited_app(RateLimiter::per_minute(1), temp.path());
    let peer: SocketAddr = "192.0.2.7:40000".parse().unwrap();

    let mut statuses = Vec::new();
    for i in 0..5 {
        let response = app
            .clone()
            .oneshot(explain_from(peer, &format!("10.0.0.{i}")))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses[1..]
        .iter()
        .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));

    let other_peer: SocketAddr = "198.51.100.9:40000".parse().unwrap();
    let response = app
        .oneshot(explain_from(other_peer, "10.0.0.0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn trusted_forwarded_for_keys_clients_by_header() {
    let temp = tempdir().unwrap();
    let app = limited_app(
        RateLimiter::per_minute(1).trusting_forwarded_for(true),
        temp.path(),
    );
    let proxy: SocketAddr = "192.0.2.1:8080".parse().unwrap();

    let first = app.clone().oneshot(explain_from(proxy, "10.0.0.1")).await.unwrap();
    let second = app.clone().oneshot(explain_from(proxy, "10.0.0.2")).await.unwrap();
    let repeat = app.oneshot(explain_from(proxy, "10.0.0.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}
