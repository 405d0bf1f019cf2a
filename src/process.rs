//! Batch controller: pending list → previews → status flags.
//!
//! One run pulls the pending list, stages each item locally, renders its
//! variants and publishes them, then finalises the item in the repository.
//! Items are processed strictly one after another.
//!
//! ## Per-item flow
//!
//! ```text
//! metadata ─▶ classify ─┬─▶ (unsupported) ─────────────────────────┐
//!                       └─▶ fetch + stage ─┬─▶ image:    normal, small ─┤
//!                                          └─▶ document: rasterise,     │
//!                                              large/normal/small ──────┤
//!                                                                       ▼
//!                      page count ◀── success         needsprocessing=false
//! ```
//!
//! Any [`ItemError`] is caught at the item boundary: it is logged with the
//! item id, `processing_failed` is set, and the batch continues. Whatever
//! happens, the pending flag is cleared and the staged copy is deleted.

use crate::config::{PreviewConfig, SizeBounds, SizeClass};
use crate::error::{ItemError, PreviewError};
use crate::output::{BatchReport, ItemReport, ProcessingOutcome, SkipReason, WorkItem};
use crate::pipeline::classify::Classification;
use crate::pipeline::rasterize::Rasterizer;
use crate::pipeline::resize::{self, ScaledImage};
use crate::pipeline::run_blocking;
use crate::pipeline::staging::StagingArea;
use crate::store::{
    ContentStore, PendingItem, PreviewVariant, HAS_PREVIEW, NEEDS_PROCESSING, PAGE_COUNT,
    PROCESSING_FAILED,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, info_span, warn, Dispatch, Instrument};

/// Drives one preview batch.
pub struct PreviewProcessor {
    store: Arc<dyn ContentStore>,
    rasterizer: Arc<dyn Rasterizer>,
    config: PreviewConfig,
    dispatch: Option<Dispatch>,
}

impl PreviewProcessor {
    pub fn new(
        store: Arc<dyn ContentStore>,
        rasterizer: Arc<dyn Rasterizer>,
        config: PreviewConfig,
    ) -> Self {
        Self {
            store,
            rasterizer,
            config,
            dispatch: None,
        }
    }

    /// Send this processor's logs to `dispatch` instead of the global
    /// default subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Process every pending item once.
    ///
    /// # Errors
    /// Only fatal conditions: the pending list cannot be fetched or the
    /// staging directories cannot be created. Per-item failures are
    /// reported in the returned [`BatchReport`].
    pub async fn run(&self) -> Result<BatchReport, PreviewError> {
        match self.dispatch {
            Some(ref dispatch) => self.run_batch().with_subscriber(dispatch.clone()).await,
            None => self.run_batch().await,
        }
    }

    async fn run_batch(&self) -> Result<BatchReport, PreviewError> {
        let start = Instant::now();

        let pending = self
            .store
            .list_pending()
            .await
            .map_err(PreviewError::ListPendingFailed)?;
        let items = unique_items(pending);
        info!("processing {} entries", items.len());

        if items.is_empty() {
            return Ok(BatchReport {
                items: Vec::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let total = items.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let staging = StagingArea::create(&self.config.work_dir)?;
        info!(
            "Starts a new batch of queued files: {}",
            items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut reports = Vec::with_capacity(total);
        for (index, mut item) in items.into_iter().enumerate() {
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_item_start(&item.id, index, total);
            }

            let span = info_span!("item", id = %item.id);
            let outcome = self
                .process_item(&staging, &mut item)
                .instrument(span)
                .await;

            if let Some(ref cb) = self.config.progress_callback {
                cb.on_item_complete(&item.id, index, total, &outcome);
            }
            reports.push(ItemReport { item, outcome });
        }

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directories: {}", e);
        }

        let report = BatchReport {
            items: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Batch complete: {} succeeded, {} skipped, {} failed in {}ms",
            report.succeeded(),
            report.skipped(),
            report.failed(),
            report.duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(&report);
        }
        Ok(report)
    }

    /// Run one item to a terminal outcome and finalise it in the repository.
    ///
    /// Never fails: errors become [`ProcessingOutcome::Failed`].
    pub async fn process_item(&self, staging: &StagingArea, item: &mut WorkItem) -> ProcessingOutcome {
        info!("processing {}", item.id);

        let outcome = match self.generate_previews(staging, item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("error generating preview/thumbnail (ID: {}): {}", item.id, e);
                if let Err(flag_err) = self
                    .store
                    .publish_status(&item.id, &[(PROCESSING_FAILED, "true")])
                    .await
                {
                    warn!("Failed to flag {} as failed: {}", item.id, flag_err);
                }
                ProcessingOutcome::Failed {
                    reason: e.reason(),
                    message: e.to_string(),
                }
            }
        };

        if let Err(e) = self
            .store
            .publish_status(&item.id, &[(NEEDS_PROCESSING, "false")])
            .await
        {
            warn!("Failed to clear pending flag for {}: {}", item.id, e);
        }

        info!("{}: {}", item.id, outcome);
        outcome
    }

    async fn generate_previews(
        &self,
        staging: &StagingArea,
        item: &mut WorkItem,
    ) -> Result<ProcessingOutcome, ItemError> {
        let meta = self
            .store
            .get_metadata(&item.id)
            .await
            .map_err(|source| ItemError::MetadataFetch {
                id: item.id.clone(),
                source,
            })?;
        item.mime_type = Some(meta.mime_type.clone());
        item.hinted_extension = meta.hinted_extension.clone();

        let extension = match self
            .config
            .classify(&meta.mime_type, meta.hinted_extension.as_deref())
        {
            Classification::Supported(extension) => extension,
            Classification::Unsupported(reason) => {
                match reason {
                    SkipReason::UnknownType => info!(
                        "ignoring processing of {}, no preview can be generated for files \
                         without a known mime type (original extension {:?}, mime type {})",
                        item.id, meta.hinted_extension, meta.mime_type
                    ),
                    _ => info!(
                        "ignoring processing of {}, no preview can be generated for {} files",
                        item.id, meta.mime_type
                    ),
                }
                return Ok(ProcessingOutcome::Skipped { reason });
            }
        };
        item.extension = Some(extension.clone());

        let content = self
            .store
            .get_content(&item.id)
            .await
            .map_err(|source| ItemError::ContentFetch {
                id: item.id.clone(),
                source,
            })?;
        let staged = staging.stage_file(&item.id, &extension, &content)?;
        drop(content);
        item.local_file = Some(staged.path().to_path_buf());
        info!("with filename: {}", staged.path().display());

        let page_count = if self.config.is_image_extension(&extension) {
            self.publish_image(&item.id, staged.path()).await?
        } else {
            self.publish_document(staging, &item.id, staged.path()).await?
        };

        if page_count == 0 {
            info!("Skipping {}: document has no pages", item.id);
            return Ok(ProcessingOutcome::Skipped {
                reason: SkipReason::NoPages,
            });
        }
        item.page_count = Some(page_count);

        let count = page_count.to_string();
        self.store
            .publish_status(&item.id, &[(PAGE_COUNT, count.as_str()), (HAS_PREVIEW, "true")])
            .await
            .map_err(|source| ItemError::Publish {
                id: item.id.clone(),
                what: "page count".into(),
                source,
            })?;

        if let Err(e) = staged.remove() {
            warn!("Failed to remove staged copy of {}: {}", item.id, e);
        }
        Ok(ProcessingOutcome::Succeeded { page_count })
    }

    /// Image path: one implicit page with `normal` and `small` variants.
    async fn publish_image(&self, id: &str, image: &Path) -> Result<usize, ItemError> {
        let targets = vec![
            (SizeClass::Normal, self.config.image_normal),
            (SizeClass::Small, self.config.small),
        ];
        for (size, scaled) in self.thumbnails(image.to_path_buf(), 1, targets).await? {
            self.publish(id, 1, size, scaled.bytes).await?;
        }
        Ok(1)
    }

    /// Document path: rasterise, then `large`, `normal`, `small` per page.
    ///
    /// Returns the number of pages published; zero means nothing was.
    async fn publish_document(
        &self,
        staging: &StagingArea,
        id: &str,
        document: &Path,
    ) -> Result<usize, ItemError> {
        let preview_dir = staging.preview_dir(id)?;
        let mut pages = self
            .rasterizer
            .rasterize(document, self.config.document_raster_width, preview_dir.path())
            .await?;
        pages.sort_by_key(|p| p.index);
        debug!("{} rasterised into {} pages", id, pages.len());

        let targets = vec![
            (SizeClass::Normal, self.config.document_normal),
            (SizeClass::Small, self.config.small),
        ];
        for (position, page) in pages.iter().enumerate() {
            let page_number = position as u32 + 1;

            let large = tokio::fs::read(&page.path)
                .await
                .map_err(|source| ItemError::Staging {
                    path: page.path.clone(),
                    source,
                })?;
            self.publish(id, page_number, SizeClass::Large, large).await?;

            for (size, scaled) in self
                .thumbnails(page.path.clone(), page_number, targets.clone())
                .await?
            {
                self.publish(id, page_number, size, scaled.bytes).await?;
            }
        }

        if let Err(e) = preview_dir.remove() {
            warn!("Failed to remove preview directory of {}: {}", id, e);
        }
        Ok(pages.len())
    }

    /// Decode `source` once and scale it to each target, in order.
    async fn thumbnails(
        &self,
        source: PathBuf,
        page: u32,
        targets: Vec<(SizeClass, SizeBounds)>,
    ) -> Result<Vec<(SizeClass, ScaledImage)>, ItemError> {
        let quality = self.config.jpeg_quality;
        let page = page as usize;
        run_blocking(move || -> Result<Vec<(SizeClass, ScaledImage)>, ItemError> {
            let img = resize::open_image(&source)
                .map_err(|source| ItemError::Transform { page, source })?;
            targets
                .into_iter()
                .map(|(size, bounds)| {
                    resize::resize(&img, bounds, quality)
                        .map(|scaled| (size, scaled))
                        .map_err(|source| ItemError::Transform { page, source })
                })
                .collect()
        })
        .await
        .map_err(|e| ItemError::Internal(format!("Thumbnail task failed: {}", e)))?
    }

    async fn publish(
        &self,
        id: &str,
        page: u32,
        size: SizeClass,
        content: Vec<u8>,
    ) -> Result<(), ItemError> {
        let variant = PreviewVariant {
            item_id: id.to_string(),
            page,
            size,
            content,
        };
        self.store
            .publish_variant(&variant)
            .await
            .map_err(|source| ItemError::Publish {
                id: id.to_string(),
                what: variant.file_name(),
                source,
            })
    }
}

/// Turn the pending list into work items, dropping repeated ids.
fn unique_items(pending: Vec<PendingItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    pending
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .map(|p| WorkItem::new(p.id))
        .collect()
}
