//! Content repository access.
//!
//! The pipeline treats the repository as a blob-get / blob-put / metadata
//! service behind the [`ContentStore`] trait. [`SlingStore`] is the HTTP
//! implementation for a Sling-based repository; tests substitute an
//! in-memory recorder.
//!
//! ## Preview naming contract
//!
//! The document viewer finds previews by name, so the paths are fixed:
//!
//! | Variant | Upload path | Alias |
//! |---------|-------------|-------|
//! | large   | `system/pool/createfile.{id}.page{n}-large`  | none |
//! | normal  | `system/pool/createfile.{id}.page{n}-normal` | `p/{id}/page{n}.normal.jpg` |
//! | small   | `system/pool/createfile.{id}.page{n}-small`  | `p/{id}/page{n}.small.jpg` |
//!
//! `n` is 1-based. The viewer counts pages by probing successive `large`
//! uploads, which is why the controller publishes in strict page order.

use crate::config::{SizeClass, StoreConfig};
use crate::error::{PreviewError, StoreError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Content type of every published variant.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Status property: number of published pages.
pub const PAGE_COUNT: &str = "sakai:pagecount";
/// Status property: previews exist for this item.
pub const HAS_PREVIEW: &str = "sakai:hasPreview";
/// Status property: the last attempt failed.
pub const PROCESSING_FAILED: &str = "sakai:processing_failed";
/// Status property: the item is on the pending list.
pub const NEEDS_PROCESSING: &str = "sakai:needsprocessing";
/// Alias property keeping preview files out of search results.
pub const EXCLUDE_SEARCH: &str = "sakai:excludeSearch";

/// An entry of the pending list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub id: String,
    /// Repository path as returned by the search.
    pub path: String,
}

/// The metadata the classifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    pub mime_type: String,
    pub hinted_extension: Option<String>,
}

/// One preview image ready for upload.
#[derive(Debug, Clone)]
pub struct PreviewVariant {
    pub item_id: String,
    /// 1-based page number.
    pub page: u32,
    pub size: SizeClass,
    pub content: Vec<u8>,
}

impl PreviewVariant {
    /// `{id}.page{n}-{size}.jpg`
    pub fn file_name(&self) -> String {
        format!("{}.page{}-{}.jpg", self.item_id, self.page, self.size)
    }

    /// Repository path the image is uploaded to.
    pub fn upload_path(&self) -> String {
        format!(
            "system/pool/createfile.{}.page{}-{}",
            self.item_id, self.page, self.size
        )
    }

    /// Secondary path written for `normal` and `small` variants.
    pub fn alias_path(&self) -> Option<String> {
        match self.size {
            SizeClass::Large => None,
            SizeClass::Normal | SizeClass::Small => Some(format!(
                "p/{}/page{}.{}.jpg",
                self.item_id, self.page, self.size
            )),
        }
    }
}

/// The repository operations the pipeline depends on.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Items flagged as needing processing.
    async fn list_pending(&self) -> Result<Vec<PendingItem>, StoreError>;

    async fn get_metadata(&self, id: &str) -> Result<ItemMetadata, StoreError>;

    async fn get_content(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    async fn publish_variant(&self, variant: &PreviewVariant) -> Result<(), StoreError>;

    /// Set arbitrary properties on the item.
    async fn publish_status(&self, id: &str, fields: &[(&str, &str)]) -> Result<(), StoreError>;
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_path")]
    path: String,
}

#[derive(Debug, Deserialize)]
struct ItemJson {
    #[serde(rename = "_mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "sakai:fileextension")]
    file_extension: Option<String>,
}

/// HTTP client for a Sling content repository.
#[derive(Debug, Clone)]
pub struct SlingStore {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SlingStore {
    /// Build a client. Every request carries the server URL as `Referer`,
    /// which the repository's POST filter requires.
    pub fn new(config: &StoreConfig) -> Result<Self, PreviewError> {
        let base_url = format!("{}/", config.base_url.trim_end_matches('/'));
        reqwest::Url::parse(&base_url)
            .map_err(|e| PreviewError::InvalidConfig(format!("Bad server URL '{base_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(&base_url)
            .map_err(|e| PreviewError::ClientSetup(e.to_string()))?;
        headers.insert(REFERER, referer);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| PreviewError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Send and require a 2xx status.
    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|source| StoreError::Transport {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url_for(path);
        let response = self.send(&url, self.request(Method::GET, &url)).await?;
        let bytes = response.bytes().await.map_err(|source| StoreError::Transport {
            url: url.clone(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, StoreError> {
        let body = self.get_bytes(path).await?;
        serde_json::from_slice(&body).map_err(|e| StoreError::MalformedResponse {
            url: self.url_for(path),
            detail: e.to_string(),
        })
    }

    async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let url = self.url_for(path);
        self.send(&url, self.request(Method::POST, &url).form(fields))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SlingStore {
    async fn list_pending(&self) -> Result<Vec<PendingItem>, StoreError> {
        let found: SearchResults = self.get_json("var/search/needsprocessing.json").await?;
        Ok(found
            .results
            .into_iter()
            .map(|hit| PendingItem {
                id: hit.path.trim_matches('/').to_string(),
                path: hit.path,
            })
            .collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<ItemMetadata, StoreError> {
        let path = format!("p/{id}.json");
        let item: ItemJson = self.get_json(&path).await?;
        let mime_type = item.mime_type.ok_or_else(|| StoreError::MalformedResponse {
            url: self.url_for(&path),
            detail: "missing _mimeType".into(),
        })?;
        Ok(ItemMetadata {
            mime_type,
            hinted_extension: item.file_extension.filter(|e| !e.is_empty()),
        })
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.get_bytes(&format!("p/{id}")).await
    }

    async fn publish_variant(&self, variant: &PreviewVariant) -> Result<(), StoreError> {
        let url = self.url_for(&variant.upload_path());
        let part = Part::bytes(variant.content.clone())
            .file_name(variant.file_name())
            .mime_str(JPEG_CONTENT_TYPE)
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("thumbnail", part);
        self.send(&url, self.request(Method::POST, &url).multipart(form))
            .await?;
        debug!("Uploaded {} ({} bytes)", variant.file_name(), variant.content.len());

        if let Some(alias) = variant.alias_path() {
            self.post_form(&alias, &[(EXCLUDE_SEARCH, "true")]).await?;
            info!("Uploaded image to {}", self.url_for(&alias));
        }
        Ok(())
    }

    async fn publish_status(&self, id: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        self.post_form(&format!("p/{id}"), fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(size: SizeClass, page: u32) -> PreviewVariant {
        PreviewVariant {
            item_id: "abc123".into(),
            page,
            size,
            content: vec![0xFF, 0xD8],
        }
    }

    #[test]
    fn variant_paths_follow_viewer_contract() {
        let v = variant(SizeClass::Normal, 2);
        assert_eq!(v.file_name(), "abc123.page2-normal.jpg");
        assert_eq!(v.upload_path(), "system/pool/createfile.abc123.page2-normal");
        assert_eq!(v.alias_path().as_deref(), Some("p/abc123/page2.normal.jpg"));
    }

    #[test]
    fn large_variant_has_no_alias() {
        let v = variant(SizeClass::Large, 1);
        assert_eq!(v.upload_path(), "system/pool/createfile.abc123.page1-large");
        assert_eq!(v.alias_path(), None);
    }

    #[test]
    fn url_for_normalises_slashes() {
        let store = SlingStore::new(&StoreConfig::new("http://localhost:8080")).unwrap();
        assert_eq!(store.url_for("p/abc"), "http://localhost:8080/p/abc");
        assert_eq!(store.url_for("/p/abc"), "http://localhost:8080/p/abc");

        let store = SlingStore::new(&StoreConfig::new("http://localhost:8080///")).unwrap();
        assert_eq!(store.url_for("p/abc"), "http://localhost:8080/p/abc");
    }

    #[test]
    fn rejects_bad_server_url() {
        let err = SlingStore::new(&StoreConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, PreviewError::InvalidConfig(_)));
    }
}
