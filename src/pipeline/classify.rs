//! Type classification: declared mime type → local file extension.
//!
//! The repository stores the uploader's mime type and, sometimes, the
//! original file extension. Local tools (the image decoder, the office
//! converter) pick their parser by extension, so every staged copy needs one
//! that actually belongs to its mime type. The uploader's hint wins when it
//! is registered for the type; otherwise the table's first extension is used.

use crate::error::PreviewError;
use crate::output::SkipReason;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Built-in subset of the Apache `mime.types` table.
const DEFAULT_MIME_TYPES: &str = "\
# mime type                                                              extensions
application/pdf                                                          pdf
application/msword                                                       doc dot
application/vnd.openxmlformats-officedocument.wordprocessingml.document  docx
application/vnd.ms-excel                                                 xls xlt
application/vnd.openxmlformats-officedocument.spreadsheetml.sheet        xlsx
application/vnd.ms-powerpoint                                            ppt pps pot
application/vnd.openxmlformats-officedocument.presentationml.presentation pptx
application/vnd.oasis.opendocument.text                                  odt
application/vnd.oasis.opendocument.spreadsheet                           ods
application/vnd.oasis.opendocument.presentation                          odp
application/rtf                                                          rtf
text/rtf                                                                 rtf
text/plain                                                               txt text
text/html                                                                html htm
text/csv                                                                 csv
image/png                                                                png
image/jpeg                                                               jpg jpeg jpe
image/pjpeg                                                              jpg
image/gif                                                                gif
image/vnd.adobe.photoshop                                                psd
application/zip                                                          zip
application/x-shockwave-flash                                            swf
audio/mpeg                                                               mp3 mpga
video/mp4                                                                mp4
video/quicktime                                                          mov qt
";

/// Mime types that never get a preview unless overridden.
const DEFAULT_IGNORE_TYPES: &str = "\
# archives and media have nothing to rasterise
application/zip
application/x-shockwave-flash
audio/mpeg
video/mp4
video/quicktime
# not decodable by the image backend
image/vnd.adobe.photoshop
";

static DEFAULT_TABLE: Lazy<MimeTable> = Lazy::new(|| MimeTable::parse(DEFAULT_MIME_TYPES));

/// Mime type → registered extensions, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeTable {
    entries: HashMap<String, Vec<String>>,
}

impl MimeTable {
    /// Parse Apache `mime.types` syntax: `type ext ext ...` per line,
    /// `#` starts a comment line. Types listed without extensions are
    /// dropped; a repeated type keeps its first line.
    pub fn parse(text: &str) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(mime) = fields.next() else { continue };
            let extensions: Vec<String> = fields.map(|e| e.to_ascii_lowercase()).collect();
            if extensions.is_empty() {
                continue;
            }
            entries
                .entry(mime.to_ascii_lowercase())
                .or_insert(extensions);
        }
        Self { entries }
    }

    /// Read and parse a `mime.types` file.
    pub fn load(path: &Path) -> Result<Self, PreviewError> {
        let text = std::fs::read_to_string(path).map_err(|source| PreviewError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Extensions registered for `mime_type`, without leading dots.
    pub fn extensions(&self, mime_type: &str) -> Option<&[String]> {
        self.entries
            .get(&mime_type.trim().to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Whether some mime type lists both `a` and `b` (without leading dots).
    pub fn registered_together(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.to_ascii_lowercase(), b.to_ascii_lowercase());
        self.entries
            .values()
            .any(|exts| exts.contains(&a) && exts.contains(&b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The built-in table.
pub fn default_mime_table() -> MimeTable {
    DEFAULT_TABLE.clone()
}

/// Parse an ignore list: one mime type per line, `#` comments.
pub fn parse_ignore_list(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Read and parse an ignore-list file.
pub fn load_ignore_list(path: &Path) -> Result<BTreeSet<String>, PreviewError> {
    let text = std::fs::read_to_string(path).map_err(|source| PreviewError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_ignore_list(&text))
}

/// The built-in ignore list.
pub fn default_ignore_list() -> BTreeSet<String> {
    parse_ignore_list(DEFAULT_IGNORE_TYPES)
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Extension to stage the file under, with its leading dot.
    Supported(String),
    Unsupported(SkipReason),
}

/// Resolve the extension a staged copy of `mime_type` should carry.
///
/// `hinted_extension` may be given with or without its leading dot.
pub fn classify(
    table: &MimeTable,
    ignored: &BTreeSet<String>,
    mime_type: &str,
    hinted_extension: Option<&str>,
) -> Classification {
    let mime = mime_type.trim().to_ascii_lowercase();
    if ignored.contains(&mime) {
        return Classification::Unsupported(SkipReason::IgnoredType);
    }

    let Some(registered) = table.extensions(&mime) else {
        return Classification::Unsupported(SkipReason::UnknownType);
    };

    let hint = hinted_extension
        .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty());

    let chosen = match hint {
        Some(h) if registered.contains(&h) => h,
        _ => registered[0].clone(),
    };
    Classification::Supported(format!(".{chosen}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported(ext: &str) -> Classification {
        Classification::Supported(ext.to_string())
    }

    #[test]
    fn hint_registered_for_type_is_kept() {
        let table = default_mime_table();
        let ignored = default_ignore_list();
        assert_eq!(
            classify(&table, &ignored, "image/jpeg", Some(".jpg")),
            supported(".jpg")
        );
        assert_eq!(
            classify(&table, &ignored, "application/msword", Some(".dot")),
            supported(".dot")
        );
    }

    #[test]
    fn unregistered_hint_falls_back_to_first_extension() {
        let table = MimeTable::parse("image/jpeg jpg\n");
        let ignored = BTreeSet::new();
        assert_eq!(
            classify(&table, &ignored, "image/jpeg", Some(".jpeg")),
            supported(".jpg")
        );
        assert_eq!(
            classify(&table, &ignored, "image/jpeg", None),
            supported(".jpg")
        );
    }

    #[test]
    fn jpeg_is_registered_in_default_table() {
        let table = default_mime_table();
        assert_eq!(
            classify(&table, &BTreeSet::new(), "image/jpeg", Some(".jpeg")),
            supported(".jpeg")
        );
    }

    #[test]
    fn wrong_hint_for_type_is_replaced() {
        let table = default_mime_table();
        assert_eq!(
            classify(&table, &BTreeSet::new(), "application/pdf", Some(".docx")),
            supported(".pdf")
        );
    }

    #[test]
    fn hint_without_dot_and_mixed_case() {
        let table = default_mime_table();
        assert_eq!(
            classify(&table, &BTreeSet::new(), "IMAGE/PNG", Some("PNG")),
            supported(".png")
        );
    }

    #[test]
    fn ignored_type_wins_over_table() {
        let table = default_mime_table();
        let ignored = default_ignore_list();
        assert_eq!(
            classify(&table, &ignored, "video/mp4", Some(".mp4")),
            Classification::Unsupported(SkipReason::IgnoredType)
        );
    }

    #[test]
    fn unknown_type() {
        let table = default_mime_table();
        assert_eq!(
            classify(&table, &BTreeSet::new(), "application/x-made-up", Some(".xyz")),
            Classification::Unsupported(SkipReason::UnknownType)
        );
    }

    #[test]
    fn parse_skips_comments_and_bare_types() {
        let table = MimeTable::parse(
            "# comment line\n\
             application/pdf pdf\n\
             application/x-empty\n\
             \n\
             application/pdf other\n",
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.extensions("application/pdf"), Some(&["pdf".to_string()][..]));
    }

    #[test]
    fn ignore_list_parsing() {
        let ignored = parse_ignore_list("# media\nvideo/mp4\n\n  audio/mpeg  \n#image/png\n");
        assert_eq!(ignored.len(), 2);
        assert!(ignored.contains("video/mp4"));
        assert!(ignored.contains("audio/mpeg"));
        assert!(!ignored.contains("image/png"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MimeTable::load(Path::new("/definitely/not/mime.types")).unwrap_err();
        assert!(err.to_string().contains("mime.types"));
    }
}
