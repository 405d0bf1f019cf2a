//! Document rasterisation: render every page of a document to a JPEG file.
//!
//! The controller only needs "document in, ordered page images out", so
//! pdfium and the office converter sit behind [`Rasterizer`]. Rendering runs
//! on the blocking pool.
//!
//! ## Non-PDF documents
//!
//! Word processor, spreadsheet and presentation files are first converted to
//! PDF by a headless office suite (`soffice --convert-to pdf`), written next
//! to the page images so it disappears with the item's preview directory.

use crate::error::RasterizeError;
use crate::output::PageImage;
use crate::pipeline::resize::encode_jpeg;
use crate::pipeline::run_blocking;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Converts a document into ordered page rasters.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `document` about `target_width` pixels wide into
    /// `out_dir`, returning the pages in page order.
    ///
    /// A document with no extractable pages yields an empty vector, not an
    /// error.
    async fn rasterize(
        &self,
        document: &Path,
        target_width: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RasterizeError>;
}

/// pdfium-backed rasteriser with optional office pre-conversion.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    office_command: Option<PathBuf>,
    jpeg_quality: u8,
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self {
            library_dir: None,
            office_command: Some(PathBuf::from("soffice")),
            jpeg_quality: 85,
        }
    }
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind pdfium from this directory instead of the system library path.
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Office suite binary used for non-PDF documents; `None` disables it.
    pub fn office_command(mut self, command: Option<PathBuf>) -> Self {
        self.office_command = command;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Convert `document` to PDF inside `out_dir` and return the PDF path.
    async fn convert_to_pdf(&self, document: &Path, out_dir: &Path) -> Result<PathBuf, RasterizeError> {
        let Some(ref command) = self.office_command else {
            return Err(RasterizeError::ConversionFailed {
                path: document.to_path_buf(),
                detail: "not a PDF and no office converter is configured".into(),
            });
        };

        info!("Converting {} to PDF with {}", document.display(), command.display());
        let output = Command::new(command)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(document)
            .output()
            .await
            .map_err(|source| RasterizeError::Io {
                path: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RasterizeError::ConversionFailed {
                path: document.to_path_buf(),
                detail: format!(
                    "{} ({})",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stem = document.file_stem().unwrap_or_default().to_string_lossy();
        let pdf = out_dir.join(format!("{stem}.pdf"));
        if !pdf.is_file() {
            return Err(RasterizeError::ConversionFailed {
                path: document.to_path_buf(),
                detail: format!("converter produced no {}", pdf.display()),
            });
        }
        Ok(pdf)
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        document: &Path,
        target_width: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RasterizeError> {
        let pdf_path = if is_pdf(document)? {
            document.to_path_buf()
        } else {
            self.convert_to_pdf(document, out_dir).await?
        };

        let out_dir = out_dir.to_path_buf();
        let library_dir = self.library_dir.clone();
        let quality = self.jpeg_quality;

        run_blocking(move || {
            render_pages_blocking(&pdf_path, target_width, &out_dir, quality, library_dir.as_deref())
        })
        .await
        .map_err(|e| RasterizeError::Join(e.to_string()))?
    }
}

/// Check the `%PDF` magic bytes.
fn is_pdf(path: &Path) -> Result<bool, RasterizeError> {
    let mut f = std::fs::File::open(path).map_err(|source| RasterizeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut magic = [0u8; 4];
    Ok(f.read_exact(&mut magic).is_ok() && &magic == b"%PDF")
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, RasterizeError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| RasterizeError::Binding(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
///
/// Pages are written as `<out_dir>/<index>.jpg` with a 0-based index.
fn render_pages_blocking(
    pdf_path: &Path,
    target_width: u32,
    out_dir: &Path,
    quality: u8,
    library_dir: Option<&Path>,
) -> Result<Vec<PageImage>, RasterizeError> {
    let pdfium = bind_pdfium(library_dir)?;

    // Corrupt, encrypted and otherwise unreadable documents have no pages
    // we can extract.
    let document = match pdfium.load_pdf_from_file(pdf_path, None) {
        Ok(document) => document,
        Err(e) => {
            warn!("Cannot open {}: {:?}", pdf_path.display(), e);
            return Ok(Vec::new());
        }
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().set_target_width(target_width as i32);
    let mut results = Vec::with_capacity(total_pages);

    for (index, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            RasterizeError::Render {
                page: index + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let bytes = encode_jpeg(&image, quality).map_err(|source| RasterizeError::Encode {
            page: index + 1,
            source,
        })?;

        let path = out_dir.join(format!("{index}.jpg"));
        std::fs::write(&path, &bytes).map_err(|source| RasterizeError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );

        results.push(PageImage { index, path });
    }

    Ok(results)
}
