// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// The app is built exactly like the binary does (`resume_ranker::app()`),
// pointed at a temp config with the mock evaluator and a temp database.
//
// Env vars are process-global, so every test here runs #[serial].

use std::io::Write as _;

use axum::body::{self, Body};
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use serial_test::serial;
use tempfile::TempDir;
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;
const BOUNDARY: &str = "ranker-test-boundary";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    test_app_with("").await
}

/// `extra` is spliced into the top-level table of the generated config.
async fn test_app_with(extra: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = dir.path().join("ranker.toml");
    let mut f = std::fs::File::create(&cfg_path).expect("create config");
    write!(
        f,
        r#"
database_path = "{db}"
recency_window_days = 30
{extra}

[evaluator]
provider = "mock"
"#,
        db = dir.path().join("ranker.db").display()
    )
    .expect("write config");

    std::env::set_var("RANKER_CONFIG_PATH", &cfg_path);
    std::env::remove_var("RANKER_DATABASE_PATH");
    std::env::remove_var("RANKER_RECENCY_DAYS");
    std::env::remove_var("RANKER_MAX_UPLOAD_BYTES");

    let router = resume_ranker::app().await.expect("app() should build");
    TestApp { router, _dir: dir }
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    data: &'a [u8],
}

fn text(name: &'static str, value: &'static str) -> Part<'static> {
    Part {
        name,
        filename: None,
        data: value.as_bytes(),
    }
}

fn file<'a>(name: &'a str, filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name,
        filename: Some(filename),
        data,
    }
}

fn multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for p in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match p.filename {
            Some(fname) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    p.name, fname
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", p.name).as_bytes(),
            ),
        }
        body.extend_from_slice(p.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("build multipart request")
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build json request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    let v = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

fn rank_payload() -> Value {
    json!({
        "criteria_with_weights": [{ "criterion": "Communication" }, { "criterion": "Python" }],
        "uploaded_by": "recruiter",
        "job_title": "Backend Engineer"
    })
}

async fn upload_jd(app: &Router) -> (StatusCode, Value) {
    send_json(
        app,
        multipart(
            "/upload-jd",
            &[
                text("uploaded_by", "recruiter"),
                text("job_title", "Backend Engineer"),
                file("jd_file", "jd.txt", b"Python backend role."),
            ],
        ),
    )
    .await
}

#[tokio::test]
#[serial]
async fn health_returns_ok() {
    let app = test_app().await;
    let (status, bytes) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
#[serial]
async fn upload_rank_and_rerank_flow() {
    let app = test_app().await;
    let r = &app.router;

    let (status, jd) = upload_jd(r).await;
    assert_eq!(status, StatusCode::OK, "{jd}");
    assert_eq!(jd["status"], "success");

    let (status, batch) = send_json(
        r,
        multipart(
            "/upload-folder",
            &[
                text("uploaded_by", "recruiter"),
                file("files", "alice.txt", b"Alice\nalice@x.dev\nPython"),
                file("files", "scan.png", b"\x89PNG\r\n"),
                file("files", "bob.txt", b"Bob\nbob@x.dev"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{batch}");
    assert_eq!(batch["stored"], 2);
    assert_eq!(batch["bad_files"].as_array().unwrap().len(), 1);
    assert_eq!(batch["bad_files"][0]["filename"], "scan.png");
    assert!(batch["session_id"].as_str().is_some_and(|s| !s.is_empty()));

    let (status, ranked) = send_json(r, post_json("/rank-resumes", &rank_payload())).await;
    assert_eq!(status, StatusCode::OK, "{ranked}");
    let rows = ranked["ranked_resumes"].as_array().expect("ranked_resumes array");
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["status"], "processed");
        // mock evaluator: 70 on every criterion
        assert_eq!(row["weighted_score"], 7.0);
        assert_eq!(row["section_scores"].as_array().unwrap().len(), 2);
    }

    let (_, again) = send_json(r, post_json("/rank-resumes", &rank_payload())).await;
    let rows = again["ranked_resumes"].as_array().unwrap();
    assert!(rows.iter().all(|row| row["status"] == "skipped"), "{again}");

    let (status, records) = send_json(r, get("/records?job_title=backend%20engineer")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.as_array().unwrap().len(), 2);

    let (_, titles) = send_json(r, get("/job-titles?query=BACK")).await;
    assert_eq!(titles, json!(["backend engineer"]));
    let (_, none) = send_json(r, get("/job-titles?query=nurse")).await;
    assert_eq!(none, json!([]));

    let (status, bytes) = send(r, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let exposition = String::from_utf8(bytes).unwrap();
    for needle in ["ranker_evaluations_total", "ranker_skipped_total", "ranker_bad_files_total"] {
        assert!(exposition.contains(needle), "/metrics missing {needle}");
    }
}

#[tokio::test]
#[serial]
async fn ranking_without_job_description_is_400() {
    let app = test_app().await;
    let (status, body) = send_json(&app.router, post_json("/rank-resumes", &rank_payload())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No job description"));
}

#[tokio::test]
#[serial]
async fn ranking_with_no_criteria_is_400() {
    let app = test_app().await;
    upload_jd(&app.router).await;
    let payload = json!({
        "criteria_with_weights": [],
        "uploaded_by": "recruiter",
        "job_title": "Backend Engineer"
    });
    let (status, body) = send_json(&app.router, post_json("/rank-resumes", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("criterion"));
}

#[tokio::test]
#[serial]
async fn job_description_upload_edge_cases() {
    let app = test_app().await;
    let r = &app.router;

    let (status, body) = send_json(
        r,
        multipart(
            "/upload-jd",
            &[
                text("uploaded_by", "recruiter"),
                text("job_title", "Backend Engineer"),
                file("jd_file", "jd.xlsx", b"PK\x03\x04"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("jd.xlsx"));

    let (status, body) = send_json(
        r,
        multipart("/upload-jd", &[text("uploaded_by", "recruiter"), text("job_title", "X")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("jd_file"));

    assert_eq!(upload_jd(r).await.1["status"], "success");
    assert_eq!(upload_jd(r).await.1["status"], "exists");
}

#[tokio::test]
#[serial]
async fn upload_folder_requires_submitter() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app.router,
        multipart("/upload-folder", &[file("files", "a.txt", b"a@x.dev")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("uploaded_by"));
}

#[tokio::test]
#[serial]
async fn admin_clear_empties_everything() {
    let app = test_app().await;
    let r = &app.router;
    upload_jd(r).await;
    send_json(
        r,
        multipart(
            "/upload-folder",
            &[text("uploaded_by", "recruiter"), file("files", "a.txt", b"a@x.dev")],
        ),
    )
    .await;
    send_json(r, post_json("/rank-resumes", &rank_payload())).await;

    let (status, cleared) = send_json(r, post_json("/admin/clear", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["deleted"]["rankings"], 1);
    assert_eq!(cleared["deleted"]["job_descriptions"], 1);

    let (_, records) = send_json(r, get("/records?job_title=backend%20engineer")).await;
    assert_eq!(records, json!([]));
    let (status, _) = send_json(r, post_json("/rank-resumes", &rank_payload())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn padded_resume(email: &str, size: usize) -> Vec<u8> {
    let mut body = format!("{email}\nPython, Rust, SQL\n").into_bytes();
    body.resize(size, b'x');
    body
}

#[tokio::test]
#[serial]
async fn multi_megabyte_batch_is_accepted() {
    let app = test_app().await;
    let one_mb = 1024 * 1024;
    let (a, b, c) = (
        padded_resume("a@x.dev", one_mb),
        padded_resume("b@x.dev", one_mb),
        padded_resume("c@x.dev", one_mb),
    );
    let (status, batch) = send_json(
        &app.router,
        multipart(
            "/upload-folder",
            &[
                text("uploaded_by", "recruiter"),
                file("files", "a.txt", &a),
                file("files", "b.txt", &b),
                file("files", "c.txt", &c),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{batch}");
    assert_eq!(batch["received"], 3);
    assert_eq!(batch["stored"], 3);
}

#[tokio::test]
#[serial]
async fn upload_over_configured_limit_is_413() {
    let app = test_app_with("max_upload_bytes = 4096").await;
    let big = padded_resume("a@x.dev", 16 * 1024);
    let (status, body) = send_json(
        &app.router,
        multipart(
            "/upload-folder",
            &[text("uploaded_by", "recruiter"), file("files", "a.txt", &big)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");
    assert!(body["error"].as_str().unwrap().contains("4096"));

    // the limit only applies to uploads
    let (status, _) = send_json(&app.router, post_json("/rank-resumes", &rank_payload())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
