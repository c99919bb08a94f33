mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use signoff::{
    application::store::{ObjectStore, StoreError, StoredObject},
    infra::{
        http::{REQUEST_ID_HEADER, build_router},
        storage::MemoryStore,
    },
};
use tower::ServiceExt;

use common::{BODY_LIMIT, json_body, key_of, router, state};

fn post_json(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

const BOUNDARY: &str = "signoff-test-boundary";

fn post_form(fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method(Method::POST)
        .uri("/htmlgen")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn text(store: &MemoryStore, key: &str) -> String {
    let object = store
        .get(key)
        .unwrap_or_else(|| panic!("{key} was not stored"));
    String::from_utf8(object.body.to_vec()).expect("utf8 artifact")
}

#[derive(Debug, Deserialize, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    hint: Option<String>,
}

#[tokio::test]
async fn minimal_report_publishes_html_and_json_side_by_side() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json("/", r#"{"id":"unit-7","report":{"name":"Handover"}}"#))
        .await
        .expect("response");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);

    let html_key = key_of(body["HTML"].as_str().expect("html url"));
    let json_key = key_of(body["JSON"].as_str().expect("json url"));
    let (html_partition, html_file) = html_key.split_once('/').expect("partitioned");
    let (json_partition, json_file) = json_key.split_once('/').expect("partitioned");
    assert_eq!(html_partition, json_partition);

    let stem = html_file.strip_suffix(".html").expect("html extension");
    assert_eq!(json_file.strip_suffix(".json"), Some(stem));
    let suffix = stem.strip_prefix("unit-7-").expect("suffixed id");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

    let html = store.get(&html_key).expect("html stored");
    assert_eq!(html.content_type, "text/html; charset=UTF-8");
    let html = text(&store, &html_key);
    assert!(html.contains("<title>Handover</title>"));
    assert!(html.contains("https://media.example.com/logo.svg"));
    assert!(html.contains(&format!("Report {stem}")));

    let json = store.get(&json_key).expect("json stored");
    assert_eq!(json.content_type, "application/json; charset=UTF-8");
    let dump = text(&store, &json_key);
    assert!(dump.starts_with(&format!("{{\n    \"id\": \"{stem}\",")));
}

#[tokio::test]
async fn unforced_publishes_never_share_a_name() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let mut urls = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/jsonhtmlgen", r#"{"id":"unit-7"}"#))
            .await
            .expect("response");
        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        urls.push(body["HTML"].as_str().expect("html url").to_string());
    }

    assert_ne!(urls[0], urls[1]);
    assert_eq!(store.keys().len(), 4);
}

#[tokio::test]
async fn forced_publish_keeps_id_and_document_date() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json(
            "/",
            r#"{"id":"unit-7","force":true,"date":"2018-06-14T09:30:00Z"}"#,
        ))
        .await
        .expect("response");
    let (status, body) = json_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["HTML"],
        "https://reports.example.com/artifacts/2018-06-14/unit-7.html"
    );
    assert_eq!(
        body["JSON"],
        "https://reports.example.com/artifacts/2018-06-14/unit-7.json"
    );
    assert!(text(&store, "2018-06-14/unit-7.html").contains("14 Jun 2018"));
}

#[tokio::test]
async fn reserved_url_characters_in_forced_ids_are_encoded() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json(
            "/jsonhtmlgen",
            r#"{"id":"unit#7","force":true,"date":"2018-06-14T09:30:00Z"}"#,
        ))
        .await
        .expect("response");
    let (status, body) = json_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["HTML"],
        "https://reports.example.com/artifacts/2018-06-14/unit%237.html"
    );
    assert_eq!(
        body["JSON"],
        "https://reports.example.com/artifacts/2018-06-14/unit%237.json"
    );
    assert!(store.get("2018-06-14/unit#7.html").is_some());
    assert!(store.get("2018-06-14/unit#7.json").is_some());
}

#[tokio::test]
async fn null_collections_decode_as_empty() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json(
            "/jsonhtmlgen",
            r#"{"id":"unit-7","signatures":null,"report":{"images":null,"rooms":null}}"#,
        ))
        .await
        .expect("response");
    let (status, body) = json_body(response).await;

    assert_eq!(status, StatusCode::OK, "rejected: {body}");
    let dump = text(&store, &key_of(body["JSON"].as_str().expect("json url")));
    assert!(dump.contains("\"signatures\": []"));
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    for body in [r#"{"id":"#, r#"{"id":"x","colour":"red"}"#, r#"{"force":"yes"}"#] {
        let response = app
            .clone()
            .oneshot(post_json("/", body))
            .await
            .expect("response");
        let (status, value) = json_body(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {body}");
        assert_eq!(value["error"]["code"], "invalid_json");
    }

    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn identifiers_cannot_escape_their_partition() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json("/", r#"{"id":"a/b"}"#))
        .await
        .expect("response");
    let (status, value) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let envelope: ErrorEnvelope = serde_json::from_value(value).expect("error envelope");
    insta::assert_json_snapshot!(envelope, @r#"
    {
      "error": {
        "code": "invalid_input",
        "message": "Report could not be accepted",
        "hint": "invalid report: invalid report identifier `a/b`: path separators are not allowed"
      }
    }
    "#);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn form_fields_are_layered_onto_the_demo_report() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_form(&[
            ("id", "form-unit"),
            ("Unit.Information.City", "Trondheim"),
            ("signatures.0.name", "Ada Lovelace"),
            ("csrf_token", "ignored"),
        ]))
        .await
        .expect("response");
    let (status, body) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);

    let html_key = key_of(body["HTML"].as_str().expect("html url"));
    let html = text(&store, &html_key);
    assert!(html.contains("Trondheim"));
    assert!(html.contains("Ada Lovelace"));
    // untouched demo fields survive
    assert!(html.contains("Cracks on Ceiling"));
    assert!(html.contains("/c_fill,g_auto,h_500,w_500/"));

    let dump = text(&store, &key_of(body["JSON"].as_str().expect("json url")));
    assert!(dump.contains("\"id\": \"form-unit-"));
}

#[tokio::test]
async fn malformed_form_values_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let response = app
        .clone()
        .oneshot(post_form(&[("force", "perhaps")]))
        .await
        .expect("response");
    let (status, value) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["code"], "invalid_input");

    let response = app
        .oneshot(post_json("/htmlgen", r#"{"id":"unit-7"}"#))
        .await
        .expect("response");
    let (status, value) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["code"], "invalid_input");

    assert!(store.keys().is_empty());
}

/// Accepts HTML writes and rejects everything else.
#[derive(Default)]
struct HtmlOnlyStore {
    inner: MemoryStore,
}

#[async_trait]
impl ObjectStore for HtmlOnlyStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StoreError> {
        if key.ends_with(".html") {
            self.inner.put(key, body, content_type).await
        } else {
            Err(StoreError::rejected("bucket quota exceeded"))
        }
    }
}

#[tokio::test]
async fn partial_publish_is_reported_distinctly() {
    let store = Arc::new(HtmlOnlyStore::default());
    let app = router(store.clone(), Vec::new());

    let response = app
        .oneshot(post_json("/", r#"{"id":"unit-7"}"#))
        .await
        .expect("response");
    let (status, value) = json_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value["error"]["code"], "publish_partial");
    assert!(value["error"].get("hint").is_none());

    let keys = store.inner.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with(".html"));
}

#[tokio::test]
async fn health_has_no_content() {
    let app = router(Arc::new(MemoryStore::new()), Vec::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn index_page_is_hidden_from_crawlers_outside_production() {
    let get_index = || {
        Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request")
    };

    let staging = router(Arc::new(MemoryStore::new()), Vec::new());
    let response = staging.oneshot(get_index()).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-robots-tag").map(|v| v.as_bytes()),
        Some(&b"none"[..])
    );

    let production = build_router(
        state(Arc::new(MemoryStore::new()), Vec::new(), true),
        BODY_LIMIT,
    );
    let response = production.oneshot(get_index()).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-robots-tag").is_none());
}

#[tokio::test]
async fn request_ids_are_echoed_or_generated() {
    let app = router(Arc::new(MemoryStore::new()), Vec::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "trace-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).map(|v| v.as_bytes()),
        Some(&b"trace-42"[..])
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "not a valid id")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let generated = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .expect("generated id");
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let store = Arc::new(MemoryStore::new());
    let app = router(store.clone(), Vec::new());

    let padding = "x".repeat(BODY_LIMIT + 1);
    let response = app
        .oneshot(post_json("/", &format!(r#"{{"id":"{padding}"}}"#)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.keys().is_empty());
}
