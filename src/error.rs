//! Error types for the preview-processor library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PreviewError`]: **Fatal**: the batch cannot run at all (the pending
//!   list could not be fetched, staging directories could not be created,
//!   the configuration is invalid). Returned as `Err(PreviewError)` from
//!   [`crate::process::PreviewProcessor::run`].
//!
//! * [`ItemError`]: **Non-fatal**: a single item failed (transport error,
//!   unreadable document, transform glitch) but the rest of the batch goes
//!   on. The controller turns it into a
//!   [`crate::output::ProcessingOutcome::Failed`] and flags the item in the
//!   repository.
//!
//! [`StoreError`] and [`RasterizeError`] come from the two external
//! collaborators and are wrapped into one of the above at the call site.

use crate::output::FailureReason;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the preview-processor library.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The repository refused or failed the pending-items query.
    #[error("Failed to retrieve list to process: {0}")]
    ListPendingFailed(#[source] StoreError),

    /// Batch staging directories could not be created.
    #[error("Failed to create staging directory under '{path}': {source}")]
    StagingSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A lookup table or ignore list file could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to set up repository client: {0}")]
    ClientSetup(String),
}

/// Errors raised by a [`crate::store::ContentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("Request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The repository answered with a non-success status.
    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body did not have the expected shape.
    #[error("Malformed response from '{url}': {detail}")]
    MalformedResponse { url: String, detail: String },

    /// The request could not be built (bad URL, bad content type).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors raised by a [`crate::pipeline::rasterize::Rasterizer`].
#[derive(Debug, Error)]
pub enum RasterizeError {
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set --pdfium-lib (PDFIUM_LIB_PATH) to the directory holding libpdfium."
    )]
    Binding(String),

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// A rendered page could not be encoded as JPEG.
    #[error("Failed to encode page {page}: {source}")]
    Encode {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    /// The office pre-conversion exited with a failure status.
    #[error("Conversion of '{path}' to PDF failed: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// Reading the document or writing a page failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Join(String),
}

/// A non-fatal error for a single work item.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Failed to fetch metadata for '{id}': {source}")]
    MetadataFetch {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to fetch content for '{id}': {source}")]
    ContentFetch {
        id: String,
        #[source]
        source: StoreError,
    },

    /// The id cannot be used as a local file name.
    #[error("Item id '{id}' is not usable as a file name")]
    InvalidItemId { id: String },

    #[error("Staging error at '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Rasterize(#[from] RasterizeError),

    /// Resizing or re-encoding a page failed.
    #[error("Thumbnail generation failed for page {page}: {source}")]
    Transform {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to publish {what} for '{id}': {source}")]
    Publish {
        id: String,
        what: String,
        #[source]
        source: StoreError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ItemError {
    /// Short machine-readable reason recorded in the batch report.
    pub fn reason(&self) -> FailureReason {
        match self {
            ItemError::MetadataFetch { .. } => FailureReason::MetadataFetch,
            ItemError::ContentFetch { .. } => FailureReason::ContentFetch,
            ItemError::InvalidItemId { .. } => FailureReason::InvalidId,
            ItemError::Staging { .. } => FailureReason::Staging,
            ItemError::Rasterize(_) => FailureReason::Rasterize,
            ItemError::Transform { .. } => FailureReason::Transform,
            ItemError::Publish { .. } => FailureReason::Publish,
            ItemError::Internal(_) => FailureReason::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let e = StoreError::Status {
            url: "http://localhost:8080/p/abc".into(),
            status: 404,
        };
        let msg = e.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("/p/abc"), "got: {msg}");
    }

    #[test]
    fn list_pending_wraps_store_error() {
        let e = PreviewError::ListPendingFailed(StoreError::Status {
            url: "http://localhost:8080/var/search/needsprocessing.json".into(),
            status: 500,
        });
        assert!(e.to_string().contains("HTTP 500"));
    }

    #[test]
    fn item_error_reasons() {
        let fetch = ItemError::ContentFetch {
            id: "abc".into(),
            source: StoreError::Status {
                url: "u".into(),
                status: 503,
            },
        };
        assert_eq!(fetch.reason(), FailureReason::ContentFetch);
        assert_eq!(fetch.reason().as_str(), "content-fetch");

        let render = ItemError::from(RasterizeError::Render {
            page: 2,
            detail: "bad xref".into(),
        });
        assert_eq!(render.reason(), FailureReason::Rasterize);
        assert!(render.to_string().contains("page 2"));
    }

    #[test]
    fn invalid_id_display() {
        let e = ItemError::InvalidItemId { id: "../etc".into() };
        assert!(e.to_string().contains("../etc"));
        assert_eq!(e.reason().as_str(), "invalid-id");
    }
}
