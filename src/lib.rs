//! # preview-processor
//!
//! Generate page previews for documents and images stored in a Sling-based
//! content repository.
//!
//! The repository flags newly uploaded content as needing processing. Each
//! batch run pulls that list, fetches every item, renders JPEG previews at
//! fixed size classes and uploads them under the names the document viewer
//! looks for, then records the page count and clears the flag.
//!
//! ## Pipeline Overview
//!
//! ```text
//! pending list
//!  │
//!  ├─ 1. Classify   mime type → extension, or skip (ignored / unknown)
//!  ├─ 2. Stage      fetch content into a per-batch temp dir
//!  ├─ 3. Rasterise  office → PDF (soffice), PDF → page JPEGs (pdfium)
//!  ├─ 4. Resize     large / normal / small variants (Lanczos3, JPEG)
//!  ├─ 5. Publish    upload in page order, then alias normal/small
//!  └─ 6. Finalise   pagecount + hasPreview, needsprocessing=false
//! ```
//!
//! A failing item is flagged `processing_failed` and the batch moves on;
//! only an unreachable pending list or unusable work directory aborts a run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use preview_processor::{PdfiumRasterizer, PreviewConfig, PreviewProcessor, SlingStore, StoreConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SlingStore::new(
//!         &StoreConfig::new("http://localhost:8080").credentials("admin", "admin"),
//!     )?;
//!     let config = PreviewConfig::builder().work_dir("/tmp/previews").build()?;
//!     let rasterizer = PdfiumRasterizer::new().jpeg_quality(config.jpeg_quality);
//!
//!     let processor = PreviewProcessor::new(Arc::new(store), Arc::new(rasterizer), config);
//!     let report = processor.run().await?;
//!     eprintln!(
//!         "{} succeeded, {} skipped, {} failed",
//!         report.succeeded(),
//!         report.skipped(),
//!         report.failed()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | `preview-processor` binary and the [`logging`] module (clap + anyhow + tracing-subscriber + tracing-appender) |
//!
//! Disable `cli` when embedding the library:
//! ```toml
//! preview-processor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
#[cfg(feature = "cli")]
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PreviewConfig, PreviewConfigBuilder, SizeBounds, SizeClass, StoreConfig};
pub use error::{ItemError, PreviewError, RasterizeError, StoreError};
pub use output::{
    BatchReport, FailureReason, ItemReport, PageImage, ProcessingOutcome, SkipReason, WorkItem,
};
pub use pipeline::classify::{Classification, MimeTable};
pub use pipeline::rasterize::{PdfiumRasterizer, Rasterizer};
pub use process::PreviewProcessor;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{ContentStore, ItemMetadata, PendingItem, PreviewVariant, SlingStore};
