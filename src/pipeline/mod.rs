//! Pipeline stages for preview generation.
//!
//! Each submodule implements exactly one step of the per-item flow driven by
//! [`crate::process`].
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ staging ──▶ rasterize ──▶ resize
//! (mime→ext)   (temp copy)  (doc pages)   (normal/small JPEGs)
//! ```
//!
//! 1. [`classify`]: map the declared mime type to a staging extension,
//!    or decide the item is not previewable
//! 2. [`staging`]: scoped temp directories and files that delete
//!    themselves on every exit path
//! 3. [`rasterize`]: render document pages via pdfium; runs in
//!    `spawn_blocking`
//! 4. [`resize`]: deterministic scaling and JPEG encoding

pub mod classify;
pub mod rasterize;
pub mod resize;
pub mod staging;

/// `spawn_blocking` that keeps the caller's tracing dispatch and span, so
/// logs from blocking work reach the same sinks as the rest of the batch.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, tokio::task::JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || span.in_scope(f))
    })
    .await
}
