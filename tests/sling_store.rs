//! HTTP client tests against a local mock repository.
//!
//! Run with:
//!   cargo test --test sling_store

use mockito::{Matcher, Server, ServerGuard};
use preview_processor::{ContentStore, PreviewVariant, SizeClass, SlingStore, StoreConfig, StoreError};

// admin:admin
const BASIC_AUTH: &str = "Basic YWRtaW46YWRtaW4=";

async fn server() -> (ServerGuard, SlingStore) {
    let server = Server::new_async().await;
    let store = SlingStore::new(&StoreConfig::new(server.url()).timeout_secs(5)).unwrap();
    (server, store)
}

fn variant(size: SizeClass) -> PreviewVariant {
    PreviewVariant {
        item_id: "abc".into(),
        page: 1,
        size,
        content: b"jpeg-bytes".to_vec(),
    }
}

#[tokio::test]
async fn list_pending_reads_result_paths() {
    let (mut server, store) = server().await;
    let referer = format!("{}/", server.url());
    let mock = server
        .mock("GET", "/var/search/needsprocessing.json")
        .match_header("authorization", BASIC_AUTH)
        .match_header("referer", referer.as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total":2,"results":[{"_path":"/abc"},{"_path":"def","other":1}]}"#)
        .create_async()
        .await;

    let pending = store.list_pending().await.unwrap();

    mock.assert_async().await;
    let ids: Vec<_> = pending.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["abc", "def"]);
    assert_eq!(pending[0].path, "/abc");
}

#[tokio::test]
async fn list_pending_without_results_is_empty() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/var/search/needsprocessing.json")
        .with_body(r#"{"total":0}"#)
        .create_async()
        .await;

    assert!(store.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_pending_rejects_malformed_json() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/var/search/needsprocessing.json")
        .with_body("<html>login</html>")
        .create_async()
        .await;

    let err = store.list_pending().await.unwrap_err();
    assert!(matches!(err, StoreError::MalformedResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn get_metadata_reads_mime_type_and_extension() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/p/abc.json")
        .with_body(r#"{"_mimeType":"application/pdf","sakai:fileextension":".pdf","sakai:pooled-content-file-name":"x.pdf"}"#)
        .create_async()
        .await;

    let meta = store.get_metadata("abc").await.unwrap();
    assert_eq!(meta.mime_type, "application/pdf");
    assert_eq!(meta.hinted_extension.as_deref(), Some(".pdf"));
}

#[tokio::test]
async fn get_metadata_treats_empty_extension_as_absent() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/p/abc.json")
        .with_body(r#"{"_mimeType":"image/png","sakai:fileextension":""}"#)
        .create_async()
        .await;

    let meta = store.get_metadata("abc").await.unwrap();
    assert_eq!(meta.hinted_extension, None);
}

#[tokio::test]
async fn get_metadata_requires_mime_type() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/p/abc.json")
        .with_body(r#"{"sakai:fileextension":".pdf"}"#)
        .create_async()
        .await;

    let err = store.get_metadata("abc").await.unwrap_err();
    match err {
        StoreError::MalformedResponse { detail, .. } => assert!(detail.contains("_mimeType")),
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[tokio::test]
async fn get_content_returns_raw_bytes() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/p/abc")
        .with_body(b"%PDF-1.4\x00\x01".to_vec())
        .create_async()
        .await;

    assert_eq!(store.get_content("abc").await.unwrap(), b"%PDF-1.4\x00\x01".to_vec());
}

#[tokio::test]
async fn non_success_status_is_reported_with_code() {
    let (mut server, store) = server().await;
    server
        .mock("GET", "/p/missing")
        .with_status(404)
        .create_async()
        .await;

    let err = store.get_content("missing").await.unwrap_err();
    match err {
        StoreError::Status { status, url } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/p/missing"), "url: {url}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn large_variant_is_uploaded_without_alias() {
    let (mut server, store) = server().await;
    let upload = server
        .mock("POST", "/system/pool/createfile.abc.page1-large")
        .match_header("authorization", BASIC_AUTH)
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="thumbnail"; filename="abc.page1-large.jpg""#.into()),
            Matcher::Regex("(?i)content-type: image/jpeg".into()),
            Matcher::Regex("jpeg-bytes".into()),
        ]))
        .with_status(201)
        .create_async()
        .await;
    let alias = server
        .mock("POST", Matcher::Regex("^/p/abc/".into()))
        .expect(0)
        .create_async()
        .await;

    store.publish_variant(&variant(SizeClass::Large)).await.unwrap();

    upload.assert_async().await;
    alias.assert_async().await;
}

#[tokio::test]
async fn normal_variant_is_uploaded_then_aliased() {
    let (mut server, store) = server().await;
    let upload = server
        .mock("POST", "/system/pool/createfile.abc.page1-normal")
        .match_body(Matcher::Regex(r#"filename="abc.page1-normal.jpg""#.into()))
        .with_status(200)
        .create_async()
        .await;
    let alias = server
        .mock("POST", "/p/abc/page1.normal.jpg")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::UrlEncoded("sakai:excludeSearch".into(), "true".into()))
        .with_status(200)
        .create_async()
        .await;

    store.publish_variant(&variant(SizeClass::Normal)).await.unwrap();

    upload.assert_async().await;
    alias.assert_async().await;
}

#[tokio::test]
async fn failed_upload_skips_alias() {
    let (mut server, store) = server().await;
    server
        .mock("POST", "/system/pool/createfile.abc.page1-small")
        .with_status(500)
        .create_async()
        .await;
    let alias = server
        .mock("POST", "/p/abc/page1.small.jpg")
        .expect(0)
        .create_async()
        .await;

    let err = store.publish_variant(&variant(SizeClass::Small)).await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 500, .. }));
    alias.assert_async().await;
}

#[tokio::test]
async fn publish_status_posts_form_fields() {
    let (mut server, store) = server().await;
    let mock = server
        .mock("POST", "/p/abc")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sakai:pagecount".into(), "3".into()),
            Matcher::UrlEncoded("sakai:hasPreview".into(), "true".into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    store
        .publish_status("abc", &[("sakai:pagecount", "3"), ("sakai:hasPreview", "true")])
        .await
        .unwrap();

    mock.assert_async().await;
}
