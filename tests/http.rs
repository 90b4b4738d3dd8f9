//! HTTP contract tests: the axum surface served on an ephemeral port and
//! exercised with a real client.

use docsift::config::Config;
use docsift::server::{build_router, build_state};

fn test_config() -> Config {
    let toml = r#"
[server]
bind = "127.0.0.1:0"

[embedding]
provider = "hashing"
dims = 256

[upload]
max_file_bytes = 4096
max_files_per_request = 3

[quota]
ceiling = 10
window_secs = 3600

[session]
ttl_secs = 3600
"#;
    toml::from_str(toml).unwrap()
}

/// Serve the app on an ephemeral port, returning its base URL.
async fn spawn_server() -> String {
    let config = test_config();
    let state = build_state(&config).unwrap();
    let app = build_router(state, 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn upload_form(user_id: &str, files: &[(&str, &str)]) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new().text("user_id", user_id.to_string());
    for (filename, body) in files {
        form = form.part(
            "file",
            reqwest::multipart::Part::bytes(body.as_bytes().to_vec())
                .file_name(filename.to_string()),
        );
    }
    form
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn_server().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn upload_query_stats_delete_flow() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form(
            "user-1",
            &[
                ("doc_a.txt", "Neural networks are a subset of machine learning"),
                ("doc_b.txt", "Data science workflows involve cleaning, modeling"),
            ],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["files_processed"], 2);
    assert_eq!(body["chunks_indexed"], 2);
    assert_eq!(body["quota_remaining"], 8);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // Query: two results, the on-topic document first.
    let resp = client
        .post(format!("{base}/sessions/{session_id}/query"))
        .json(&serde_json::json!({ "query": "neural networks", "k": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["metadata"]["filename"], "doc_a.txt");
    assert!(body["processing_time_ms"].is_u64());

    // Stats: read-only, repeated calls agree.
    for _ in 0..2 {
        let resp = client
            .get(format!("{base}/sessions/{session_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["document_count"], 2);
        assert_eq!(body["chunk_count"], 2);
    }

    // Delete is idempotent.
    let resp = client
        .delete(format!("{base}/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client
        .delete(format!("{base}/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // The session is gone afterwards.
    let resp = client
        .get(format!("{base}/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn query_on_unknown_session_is_404() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/sessions/nope/query"))
        .json(&serde_json::json!({ "query": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "session_not_found");
}

#[tokio::test]
async fn upload_without_user_id_is_400() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"text".to_vec()).file_name("a.txt"),
    );
    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn disallowed_extension_is_415() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form("user-1", &[("payload.exe", "MZ")]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unsupported_file_type");
}

#[tokio::test]
async fn unreadable_file_is_reported_as_skipped_not_an_error() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form(
            "user-1",
            &[("broken.pdf", "not a pdf"), ("ok.txt", "good content")],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["files_processed"], 1);
    let skipped = body["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["filename"], "broken.pdf");
}

#[tokio::test]
async fn oversized_file_is_413() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let big = "x".repeat(5000);
    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form("user-1", &[("big.txt", &big)]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "file_too_large");
}

#[tokio::test]
async fn too_many_files_is_400() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let files: Vec<(String, String)> = (0..4)
        .map(|i| (format!("{i}.txt"), "body".to_string()))
        .collect();
    let refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_str()))
        .collect();
    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form("user-1", &refs))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn quota_exhaustion_is_429() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    // Ceiling is 10; consume it in batches of 2.
    let mut session_id: Option<String> = None;
    for i in 0..5 {
        let name_a = format!("a{i}.txt");
        let name_b = format!("b{i}.txt");
        let mut form = upload_form(
            "greedy",
            &[(name_a.as_str(), "first file"), (name_b.as_str(), "second file")],
        );
        if let Some(id) = &session_id {
            form = form.text("session_id", id.clone());
        }
        let resp = client
            .post(format!("{base}/sessions"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        session_id = Some(body["session_id"].as_str().unwrap().to_string());
    }

    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form("greedy", &[("one-more.txt", "over")]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "quota_exceeded");
}

#[tokio::test]
async fn zero_k_is_rejected() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/sessions"))
        .multipart(upload_form("user-1", &[("doc.txt", "some text")]))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{base}/sessions/{session_id}/query"))
        .json(&serde_json::json!({ "query": "text", "k": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
