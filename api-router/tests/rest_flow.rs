use std::sync::Arc;

use api_router::{api_state::ApiState, api_routes_v1};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    compile::TexCompiler,
    storage::db::SurrealDbClient,
    utils::config::AppConfig,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

async fn test_router(script: &str) -> (Router, TempDir) {
    test_router_with_config(script, AppConfig::default()).await
}

async fn test_router_with_config(script: &str, config: AppConfig) -> (Router, TempDir) {
    let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
        .await
        .expect("in-memory surrealdb");
    db.ensure_initialized().await.expect("indexes");

    let (compiler, guard) = TexCompiler::fake(script, 5);
    let state = ApiState {
        db: Arc::new(db),
        config,
        compiler,
    };
    (api_routes_v1::<ApiState>(&state).with_state(state), guard)
}

async fn send_json(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

#[tokio::test]
async fn test_probes() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;

    let (status, body) = get_json(&router, "/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));

    let (status, body) = get_json(&router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["db"], "ok");
    assert_eq!(body["checks"]["artifact_cache"], "ok");
    assert!(body["engine"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_full_hierarchy_and_file_lifecycle() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;

    // Build the tree top down
    let (status, year) = send_json(
        &router,
        "POST",
        "/years",
        json!({ "year": 2025, "description": "Final year" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let year_id = id_of(&year);

    // Duplicate year number is refused
    let (status, _) = send_json(&router, "POST", "/years", json!({ "year": 2025 })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, semester) = send_json(
        &router,
        "POST",
        "/semesters",
        json!({ "year_id": year_id, "name": "Fall" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let semester_id = id_of(&semester);

    let (status, subject) = send_json(
        &router,
        "POST",
        "/subjects",
        json!({ "semester_id": semester_id, "name": "Analysis" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subject_id = id_of(&subject);
    assert_eq!(subject["color"], "#3B82F6");

    let (status, file) = send_json(
        &router,
        "POST",
        "/files",
        json!({
            "name": "hw1.tex",
            "subject_id": subject_id,
            "semester_id": semester_id,
            "content": "\\section{Limits} epsilon delta",
            "tags": ["analysis"]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let file_id = id_of(&file);
    assert_eq!(file["compilation_status"], "success");
    assert_eq!(file["word_count"], 2);

    // Content update appends a version
    let (status, updated) = send_json(
        &router,
        "PUT",
        &format!("/files/{file_id}"),
        json!({ "content": "\\section{Limits} epsilon delta proofs" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["versions"].as_array().map(Vec::len), Some(2));
    assert_eq!(updated["word_count"], 3);

    // Search hits the new content
    let (status, hits) = send_json(&router, "POST", "/search", json!({ "query": "proofs" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().map(Vec::len), Some(1));

    // Tag filter narrows the same search
    let (status, hits) = send_json(
        &router,
        "POST",
        "/search",
        json!({ "query": "proofs", "tags": ["nope"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().map(Vec::len), Some(0));

    // Block policies walk back up the tree
    let (status, _) = send_json(&router, "DELETE", &format!("/years/{year_id}"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send_json(
        &router,
        "DELETE",
        &format!("/semesters/{semester_id}"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Subject delete cascades to its files
    let (status, _) = send_json(
        &router,
        "DELETE",
        &format!("/subjects/{subject_id}"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json(&router, &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Now the tree unwinds cleanly
    let (status, _) = send_json(
        &router,
        "DELETE",
        &format!("/semesters/{semester_id}"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&router, "DELETE", &format!("/years/{year_id}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_file_against_missing_parents() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;

    let (status, _) = send_json(
        &router,
        "POST",
        "/files",
        json!({
            "name": "orphan.tex",
            "subject_id": "missing",
            "semester_id": "missing",
            "content": "x"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pdf_download_and_failed_compile_surface() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;
    let (file_id, _) = seed_one_file(&router).await;

    let request = Request::builder()
        .uri(format!("/files/{file_id}/pdf"))
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    assert!(bytes.starts_with(b"%PDF"));

    // Failing engine turns the same request into a 422 with the log attached
    let (failing_router, _g2) = test_router(TexCompiler::FAKE_FAILURE_SCRIPT).await;
    let (bad_id, _) = seed_one_file(&failing_router).await;
    let (status, body) = get_json(&failing_router, &format!("/files/{bad_id}/pdf")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_multi_upload_and_bulk_export() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;
    let (_, parents) = seed_one_file(&router).await;
    let (subject_id, semester_id) = parents;

    let (status, body) = send_json(
        &router,
        "POST",
        "/files/multi-upload",
        json!({
            "subject_id": subject_id,
            "semester_id": semester_id,
            "tags": ["batch"],
            "files": [
                { "name": "n1.tex", "content": "one" },
                { "name": "", "content": "skipped" },
                { "name": "n2.tex", "content": "two" }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["requested"], 3);
    assert_eq!(body["created"], 2);

    let ids: Vec<String> = body["files"]
        .as_array()
        .expect("files array")
        .iter()
        .map(id_of)
        .collect();

    let request = Request::builder()
        .method("POST")
        .uri("/export/bulk")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!(ids).to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    // Zip local file header magic
    assert!(bytes.starts_with(b"PK"));

    let (status, _) = send_json(&router, "POST", "/export/bulk", json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn multipart_upload_body(
    boundary: &str,
    subject_id: &str,
    semester_id: &str,
    file_name: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("subject_id", subject_id), ("semester_id", semester_id)] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{file_name}\"\r\nContent-Type: application/x-tex\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn test_single_file_upload() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;
    let (_, (subject_id, semester_id)) = seed_one_file(&router).await;

    let boundary = "X-REST-FLOW-BOUNDARY";
    let body = multipart_upload_body(
        boundary,
        &subject_id,
        &semester_id,
        "uploaded.tex",
        b"\\section{Uploaded} body text",
    );
    let request = Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let file: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(file["name"], "uploaded.tex");
    assert_eq!(file["source_type"], "upload");
    assert_eq!(file["word_count"], 2);

    // Wrong extension is rejected before anything is stored
    let body = multipart_upload_body(boundary, &subject_id, &semester_id, "scan.pdf", b"%PDF");
    let request = Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Non-UTF-8 payload with a .tex name is rejected as well
    let body = multipart_upload_body(
        boundary,
        &subject_id,
        &semester_id,
        "binary.tex",
        &[0xff, 0xfe, 0x00, 0x01],
    );
    let request = Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_respects_configured_body_limit() {
    let config = AppConfig {
        upload_max_body_bytes: 64,
        ..Default::default()
    };
    let (router, _guard) =
        test_router_with_config(TexCompiler::FAKE_SUCCESS_SCRIPT, config).await;

    let boundary = "X-REST-FLOW-BOUNDARY";
    let body = multipart_upload_body(
        boundary,
        "subject",
        "semester",
        "big.tex",
        &vec![b'a'; 4096],
    );
    let request = Request::builder()
        .method("POST")
        .uri("/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_stats_snapshot() {
    let (router, _guard) = test_router(TexCompiler::FAKE_SUCCESS_SCRIPT).await;
    seed_one_file(&router).await;

    let (status, stats) = get_json(&router, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_years"], 1);
    assert_eq!(stats["total_semesters"], 1);
    assert_eq!(stats["total_subjects"], 1);
    assert_eq!(stats["total_files"], 1);
    assert_eq!(stats["compilation"]["success"], 1);
    assert_eq!(stats["recent_files"].as_array().map(Vec::len), Some(1));
}

/// Creates year -> semester -> subject -> one file, returning the file id and
/// the (subject_id, semester_id) pair.
async fn seed_one_file(router: &Router) -> (String, (String, String)) {
    let (_, year) = send_json(router, "POST", "/years", json!({ "year": 2024 })).await;
    let (_, semester) = send_json(
        router,
        "POST",
        "/semesters",
        json!({ "year_id": id_of(&year), "name": "Spring" }),
    )
    .await;
    let semester_id = id_of(&semester);
    let (_, subject) = send_json(
        router,
        "POST",
        "/subjects",
        json!({ "semester_id": semester_id, "name": "Algebra" }),
    )
    .await;
    let subject_id = id_of(&subject);
    let (status, file) = send_json(
        router,
        "POST",
        "/files",
        json!({
            "name": "seed.tex",
            "subject_id": subject_id,
            "semester_id": semester_id,
            "content": "seeded content"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (id_of(&file), (subject_id, semester_id))
}
