//! Store operations against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use autodoc_viewer::api::HttpBackend;
use autodoc_viewer::auth::{AuthStore, RegisterRequest, SigninRequest, REGISTER_FAILED, SIGNIN_FAILED};
use autodoc_viewer::config::ApiConfig;
use autodoc_viewer::models::DocumentPatch;
use autodoc_viewer::state::{RequestState, Slot};
use autodoc_viewer::store::{
    DocsStore, ListingMode, ResponsePolicy, StoreOptions, BACKEND_UNAVAILABLE, DOC_FAILED,
    ID_REQUIRED, STATS_FAILED,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(base_url: &str) -> Arc<HttpBackend> {
    Arc::new(
        HttpBackend::new(&ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: None,
        })
        .unwrap(),
    )
}

fn store(server: &MockServer) -> DocsStore {
    store_with(server, StoreOptions::default())
}

fn store_with(server: &MockServer, options: StoreOptions) -> DocsStore {
    DocsStore::new(backend(&server.uri()), options)
}

async fn mount_doc(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/documents/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ============ get by id ============

#[tokio::test]
async fn get_by_id_uses_requested_id_when_body_has_none() {
    let server = MockServer::start().await;
    mount_doc(&server, "doc-1", json!({ "content": "# Hi" })).await;

    let store = store(&server);
    let doc = store.fetch_doc_by_id("doc-1").await.unwrap();
    assert_eq!(doc.id, "doc-1");
    assert_eq!(doc.content.as_deref(), Some("# Hi"));

    let state = store.snapshot();
    assert_eq!(state.current_doc.as_ref().map(|d| d.id.as_str()), Some("doc-1"));
    assert_eq!(state.request(Slot::CurrentDoc), &RequestState::Idle);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn get_by_id_accepts_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Raw\n\nbody"))
        .mount(&server)
        .await;

    let doc = store(&server).fetch_doc_by_id("raw").await.unwrap();
    assert_eq!(doc.id, "raw");
    assert_eq!(doc.content.as_deref(), Some("# Raw\n\nbody"));
}

#[tokio::test]
async fn get_by_id_not_found_keeps_current_doc() {
    let server = MockServer::start().await;
    mount_doc(&server, "doc-0", json!({ "_id": "doc-0", "content": "old" })).await;
    Mock::given(method("GET"))
        .and(path("/documents/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Document not found" })),
        )
        .mount(&server)
        .await;

    let store = store(&server);
    store.fetch_doc_by_id("doc-0").await.unwrap();

    let err = store.fetch_doc_by_id("missing").await.unwrap_err();
    assert_eq!(err.message, "Document not found");

    let state = store.snapshot();
    assert_eq!(state.error.as_deref(), Some("Document not found"));
    assert_eq!(
        state.request(Slot::CurrentDoc),
        &RequestState::Failed("Document not found".to_string())
    );
    assert_eq!(state.current_doc.unwrap().id, "doc-0");
}

#[tokio::test]
async fn server_error_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = store(&server).fetch_doc_by_id("broken").await.unwrap_err();
    assert_eq!(err.message, DOC_FAILED);
}

#[tokio::test]
async fn empty_id_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store(&server);
    let err = store.fetch_doc_by_id("").await.unwrap_err();
    assert_eq!(err.message, ID_REQUIRED);
    assert_eq!(store.snapshot().error.as_deref(), Some(ID_REQUIRED));
}

// ============ listing ============

#[tokio::test]
async fn list_fetches_newest_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk-times"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["2024-05-01T10:00:00Z", "2024-05-02T10:00:00Z"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk/2024-05-02T10:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "a", "metadata": { "moduleName": "parser" } },
            { "_id": "b", "source": "src/lib.rs" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    let docs = store.fetch_docs_list().await.unwrap();
    let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["parser", "src/lib.rs"]);
    assert_eq!(store.snapshot().docs.len(), 2);
}

#[tokio::test]
async fn list_with_no_chunks_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk-times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.fetch_docs_list().await.unwrap().is_empty());
    assert_eq!(store.snapshot().request(Slot::DocsList), &RequestState::Idle);
}

#[tokio::test]
async fn recent_listing_passes_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/latest"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "r1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(
        &server,
        StoreOptions {
            listing: ListingMode::Recent { limit: 5 },
            ..Default::default()
        },
    );
    let docs = store.fetch_docs_list().await.unwrap();
    assert_eq!(docs[0].id, "r1");
}

#[tokio::test]
async fn run_listing_replaces_docs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/run/run-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "x" },
            { "_id": "y" },
        ])))
        .mount(&server)
        .await;

    let store = store(&server);
    store.fetch_docs_by_run_id("run-7").await.unwrap();
    let ids: Vec<String> = store.snapshot().docs.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["x", "y"]);
}

// ============ update ============

#[tokio::test]
async fn update_splices_list_and_current_doc() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/run/r"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "a", "content": "old a" },
            { "_id": "b", "content": "old b" },
        ])))
        .mount(&server)
        .await;
    mount_doc(&server, "a", json!({ "_id": "a", "content": "old a" })).await;
    Mock::given(method("PATCH"))
        .and(path("/documents/a/content"))
        .and(body_json(json!({ "content": "new a" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "_id": "a", "content": "new a" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    store.fetch_docs_by_run_id("r").await.unwrap();
    store.fetch_doc_by_id("a").await.unwrap();
    store
        .update_doc("a", &DocumentPatch::content("new a"))
        .await
        .unwrap();

    let state = store.snapshot();
    assert_eq!(state.docs[0].content.as_deref(), Some("new a"));
    assert_eq!(state.docs[1].content.as_deref(), Some("old b"));
    assert_eq!(
        state.current_doc.unwrap().content.as_deref(),
        Some("new a")
    );
}

#[tokio::test]
async fn update_of_other_doc_leaves_current_doc() {
    let server = MockServer::start().await;
    mount_doc(&server, "a", json!({ "_id": "a", "content": "a" })).await;
    Mock::given(method("PATCH"))
        .and(path("/documents/b/content"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "_id": "b", "content": "b2" })),
        )
        .mount(&server)
        .await;

    let store = store(&server);
    store.fetch_doc_by_id("a").await.unwrap();
    store
        .update_doc("b", &DocumentPatch::content("b2"))
        .await
        .unwrap();
    assert_eq!(store.snapshot().current_doc.unwrap().id, "a");
}

#[tokio::test]
async fn failed_update_leaves_local_state_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/run/r"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "a", "content": "old a" },
            { "_id": "b", "content": "old b" },
        ])))
        .mount(&server)
        .await;
    mount_doc(&server, "a", json!({ "_id": "a", "content": "old a" })).await;
    Mock::given(method("PATCH"))
        .and(path("/documents/a/content"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "Database is read-only" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    store.fetch_docs_by_run_id("r").await.unwrap();
    store.fetch_doc_by_id("a").await.unwrap();
    let before = store.snapshot();

    let err = store
        .update_doc("a", &DocumentPatch::content("new a"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Database is read-only");

    let state = store.snapshot();
    assert_eq!(state.docs, before.docs);
    assert_eq!(state.current_doc, before.current_doc);
    assert_eq!(state.error.as_deref(), Some("Database is read-only"));
    assert_eq!(
        state.request(Slot::CurrentDoc),
        &RequestState::Failed("Database is read-only".to_string())
    );
}

// ============ stats ============

#[tokio::test]
async fn stats_combines_count_and_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 3 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk-times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["t1", "t2"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk/t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "_id": "n" }])))
        .mount(&server)
        .await;

    let store = store(&server);
    let stats = store.fetch_stats().await.unwrap();
    assert_eq!(stats.total_count, 3);
    assert_eq!(stats.chunk_times, vec!["t1", "t2"]);
    assert_eq!(stats.latest_documents.len(), 1);
    assert_eq!(store.snapshot().stats, Some(stats));
}

#[tokio::test]
async fn stats_partial_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk-times"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store(&server);
    let err = store.fetch_stats().await.unwrap_err();
    assert_eq!(err.message, STATS_FAILED);

    let state = store.snapshot();
    assert_eq!(state.stats, None);
    assert_eq!(state.error.as_deref(), Some(STATS_FAILED));
}

// ============ changelog ============

#[tokio::test]
async fn chunk_fetch_adds_changelog_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/chunk/2024-05-01T10:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "a" },
            { "_id": "b" },
        ])))
        .mount(&server)
        .await;

    let store = store(&server);
    let entry = store
        .fetch_docs_by_chunk_time("2024-05-01T10:00:00Z")
        .await
        .unwrap();
    assert_eq!(entry.document_count, 2);

    let state = store.snapshot();
    assert_eq!(
        state.changelog_entry("2024-05-01T10:00:00Z").map(|e| e.document_count),
        Some(2)
    );

    store.clear_changelog();
    assert!(store.snapshot().changelog.is_empty());
}

// ============ concurrency ============

/// A is dispatched first but settles after B.
async fn race(policy: ResponsePolicy) -> String {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/A"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "_id": "A" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_doc(&server, "B", json!({ "_id": "B" })).await;

    let store = store_with(
        &server,
        StoreOptions {
            response_policy: policy,
            ..Default::default()
        },
    );
    let (a, b) = tokio::join!(store.fetch_doc_by_id("A"), store.fetch_doc_by_id("B"));
    assert!(a.is_ok() && b.is_ok());

    let state = store.snapshot();
    assert_eq!(state.request(Slot::CurrentDoc), &RequestState::Idle);
    state.current_doc.unwrap().id
}

#[tokio::test]
async fn last_settled_response_wins() {
    assert_eq!(race(ResponsePolicy::LastSettled).await, "A");
}

#[tokio::test]
async fn latest_dispatched_discards_stale_response() {
    assert_eq!(race(ResponsePolicy::LatestDispatched).await, "B");
}

// ============ health ============

#[tokio::test]
async fn health_probe_uses_head() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/documents/count"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.check_health().await);
    let state = store.snapshot();
    assert_eq!(state.backend_available, Some(true));
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let store = DocsStore::new(backend("http://127.0.0.1:1"), StoreOptions::default());
    assert!(!store.check_health().await);

    let state = store.snapshot();
    assert_eq!(state.backend_available, Some(false));
    assert_eq!(state.error.as_deref(), Some(BACKEND_UNAVAILABLE));

    store.clear_error();
    assert_eq!(store.snapshot().error, None);
}

#[tokio::test]
async fn subscribers_see_settled_state() {
    let server = MockServer::start().await;
    mount_doc(&server, "doc-1", json!({ "_id": "doc-1" })).await;

    let store = store(&server);
    let mut rx = store.subscribe();
    store.fetch_doc_by_id("doc-1").await.unwrap();

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.current_doc.unwrap().id, "doc-1");

    store.reset();
    assert_eq!(store.snapshot().current_doc, None);
}

// ============ auth ============

#[tokio::test]
async fn register_returns_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autodoc/register"))
        .and(body_json(json!({
            "email": "dev@example.com",
            "password": "Sup3r$ecret",
            "projectName": "autodoc",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "apiKey": "key-1" })))
        .mount(&server)
        .await;

    let auth = AuthStore::new(backend(&server.uri()));
    let key = auth
        .register(&RegisterRequest {
            email: "dev@example.com".to_string(),
            password: "Sup3r$ecret".to_string(),
            project_name: "autodoc".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(key, "key-1");
    assert_eq!(auth.snapshot().api_key.as_deref(), Some("key-1"));

    auth.logout();
    assert!(!auth.snapshot().is_signed_in());
}

#[tokio::test]
async fn register_failure_uses_backend_message_or_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autodoc/register"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let auth = AuthStore::new(backend(&server.uri()));
    let err = auth
        .register(&RegisterRequest {
            email: "dev@example.com".to_string(),
            password: "Sup3r$ecret".to_string(),
            project_name: "autodoc".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.message, REGISTER_FAILED);
}

#[tokio::test]
async fn bad_api_key_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autodoc/signin"))
        .and(body_json(json!({ "apiKey": "nope" })))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let auth = AuthStore::new(backend(&server.uri()));
    let err = auth
        .signin(&SigninRequest::ApiKey {
            api_key: "nope".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.message, SIGNIN_FAILED);
    assert_eq!(auth.snapshot().error.as_deref(), Some(SIGNIN_FAILED));
    assert_eq!(auth.snapshot().api_key, None);
}
