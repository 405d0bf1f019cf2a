//! Configuration types for a preview batch.
//!
//! All pipeline behaviour is controlled through [`PreviewConfig`], built via
//! its [`PreviewConfigBuilder`]. Repository connection settings live apart in
//! [`StoreConfig`] because only the HTTP client needs them.
//!
//! The default sizes are the ones the document viewer expects: whole images
//! get a 900 px wide `normal` preview, document pages are rendered 1000 px
//! wide and get a 700 px `normal` preview, and every `small` thumbnail fits
//! a 180×225 box. The two `normal` widths are separate settings.

use crate::error::PreviewError;
use crate::pipeline::classify::{self, Classification, MimeTable};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Size of a published preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// The rasterised page itself (documents only).
    Large,
    Normal,
    Small,
}

impl SizeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Large => "large",
            SizeClass::Normal => "normal",
            SizeClass::Small => "small",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resize target: a width, plus a height when the output must fit a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    pub width: u32,
    pub height: Option<u32>,
}

impl SizeBounds {
    /// Width-only bound; height follows the source aspect ratio.
    pub const fn width(width: u32) -> Self {
        Self {
            width,
            height: None,
        }
    }

    /// Bounding box.
    pub const fn boxed(width: u32, height: u32) -> Self {
        Self {
            width,
            height: Some(height),
        }
    }
}

/// Configuration for preview generation.
///
/// # Example
/// ```rust
/// use preview_processor::{PreviewConfig, SizeBounds};
///
/// let config = PreviewConfig::builder()
///     .work_dir("/var/tmp/previews")
///     .document_normal(SizeBounds::width(700))
///     .jpeg_quality(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PreviewConfig {
    /// Root under which batch staging directories are created.
    pub work_dir: PathBuf,

    /// Extensions (with leading dot) handled by the image path. Everything
    /// else classified as supported goes through the rasteriser.
    pub image_extensions: Vec<String>,

    /// Mime type → extension table used by the classifier.
    pub mime_table: MimeTable,

    /// Mime types skipped without fetching content.
    pub ignored_mime_types: BTreeSet<String>,

    /// `normal` preview of a whole image. Default: 900 wide.
    pub image_normal: SizeBounds,

    /// Width document pages are rasterised at. Default: 1000.
    pub document_raster_width: u32,

    /// `normal` preview of a document page. Default: 700 wide.
    pub document_normal: SizeBounds,

    /// `small` thumbnail for both paths. Default: 180×225 box.
    pub small: SizeBounds,

    /// JPEG quality for every generated variant (1–100). Default: 85.
    pub jpeg_quality: u8,

    /// Per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("preview-processor"),
            image_extensions: [".png", ".jpg", ".jpeg", ".jpe", ".gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mime_table: classify::default_mime_table(),
            ignored_mime_types: classify::default_ignore_list(),
            image_normal: SizeBounds::width(900),
            document_raster_width: 1000,
            document_normal: SizeBounds::width(700),
            small: SizeBounds::boxed(180, 225),
            jpeg_quality: 85,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PreviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewConfig")
            .field("work_dir", &self.work_dir)
            .field("image_extensions", &self.image_extensions)
            .field("mime_types", &self.mime_table.len())
            .field("ignored_mime_types", &self.ignored_mime_types)
            .field("image_normal", &self.image_normal)
            .field("document_raster_width", &self.document_raster_width)
            .field("document_normal", &self.document_normal)
            .field("small", &self.small)
            .field("jpeg_quality", &self.jpeg_quality)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PreviewConfig {
    pub fn builder() -> PreviewConfigBuilder {
        PreviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Run the type classifier with this configuration's tables.
    pub fn classify(&self, mime_type: &str, hinted_extension: Option<&str>) -> Classification {
        classify::classify(
            &self.mime_table,
            &self.ignored_mime_types,
            mime_type,
            hinted_extension,
        )
    }

    /// Whether a classified extension takes the image path.
    ///
    /// Aliases the mime table registers alongside a listed extension
    /// (`.jpe` next to `.jpg`) count as image extensions too.
    pub fn is_image_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.image_extensions.iter().any(|listed| {
            let listed = listed.trim_start_matches('.');
            listed.eq_ignore_ascii_case(extension)
                || self.mime_table.registered_together(listed, extension)
        })
    }
}

/// Builder for [`PreviewConfig`].
#[derive(Debug)]
pub struct PreviewConfigBuilder {
    config: PreviewConfig,
}

impl PreviewConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.image_extensions = extensions
            .into_iter()
            .map(|e| format!(".{}", e.as_ref().trim_start_matches('.').to_ascii_lowercase()))
            .collect();
        self
    }

    pub fn mime_table(mut self, table: MimeTable) -> Self {
        self.config.mime_table = table;
        self
    }

    pub fn ignored_mime_types(mut self, types: BTreeSet<String>) -> Self {
        self.config.ignored_mime_types = types;
        self
    }

    pub fn image_normal(mut self, bounds: SizeBounds) -> Self {
        self.config.image_normal = bounds;
        self
    }

    pub fn document_raster_width(mut self, width: u32) -> Self {
        self.config.document_raster_width = width;
        self
    }

    pub fn document_normal(mut self, bounds: SizeBounds) -> Self {
        self.config.document_normal = bounds;
        self
    }

    pub fn small(mut self, bounds: SizeBounds) -> Self {
        self.config.small = bounds;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PreviewConfig, PreviewError> {
        let c = &self.config;
        for (name, bounds) in [
            ("image normal", c.image_normal),
            ("document normal", c.document_normal),
            ("small", c.small),
        ] {
            if bounds.width == 0 || bounds.height == Some(0) {
                return Err(PreviewError::InvalidConfig(format!(
                    "{name} size must be non-zero, got {bounds:?}"
                )));
            }
        }
        if c.document_raster_width == 0 {
            return Err(PreviewError::InvalidConfig(
                "Document raster width must be ≥ 1".into(),
            ));
        }
        if c.mime_table.is_empty() {
            return Err(PreviewError::InvalidConfig(
                "Mime type table has no entries".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Connection settings for the repository.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Server root, e.g. `http://localhost:8080/`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: "admin".into(),
            password: "admin".into(),
            timeout_secs: 120,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
