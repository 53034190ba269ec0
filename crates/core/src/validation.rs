//! Input admissibility checks (uploaded files + remote image URLs).
//!
//! Everything here is a pure function of its inputs apart from a read-only
//! existence check on the staged upload path. Validation is fail-fast: the
//! first violation found is returned as a single [`CoreError::Validation`].

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum size of a single uploaded image (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Declared content types accepted for uploaded images.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// File extensions accepted for uploaded images (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// An uploaded file that has been staged on local disk by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// File name as supplied by the client.
    pub original_name: String,
    /// Declared `Content-Type` of the multipart part.
    pub content_type: String,
    /// Size in bytes of the staged file.
    pub size: u64,
    /// Where the staged bytes live.
    pub path: PathBuf,
}

/// Route-dependent limits on how many images a request may carry and
/// where they must come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCountRule {
    pub min_images: usize,
    pub max_images: usize,
    pub require_upload: bool,
    pub require_url: bool,
}

impl ImageCountRule {
    /// 2-3 images, at least one uploaded file and at least one URL.
    pub const MIXED_SOURCES: Self = Self {
        min_images: 2,
        max_images: 3,
        require_upload: true,
        require_url: true,
    };

    /// 1-5 images from any mix of sources.
    pub const ANY_SOURCE: Self = Self {
        min_images: 1,
        max_images: 5,
        require_upload: false,
        require_url: false,
    };
}

/// Counts reported back once a request has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCounts {
    pub total_images: usize,
    pub uploaded_count: usize,
    pub url_count: usize,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Validate the aggregate image count against `rule`.
///
/// Check order: maximum, upload-required, URL-required, minimum.
pub fn validate_image_count(
    uploaded: usize,
    urls: usize,
    rule: ImageCountRule,
) -> Result<ValidatedCounts, CoreError> {
    let total = uploaded + urls;

    if total > rule.max_images {
        return Err(CoreError::Validation(format!(
            "Maximum {} images allowed (uploaded files + URLs)",
            rule.max_images
        )));
    }
    if rule.require_upload && uploaded == 0 {
        return Err(CoreError::Validation(
            "At least one image must be uploaded as file".into(),
        ));
    }
    if rule.require_url && urls == 0 {
        return Err(CoreError::Validation(
            "At least one image URL must be provided".into(),
        ));
    }
    if total < rule.min_images {
        let noun = if rule.min_images == 1 { "image" } else { "images" };
        return Err(CoreError::Validation(format!(
            "Minimum {} {noun} required (uploaded files + URLs)",
            rule.min_images
        )));
    }

    Ok(ValidatedCounts {
        total_images: total,
        uploaded_count: uploaded,
        url_count: urls,
    })
}

/// Validate a single staged upload. Returns the bare reason on failure so
/// callers can prefix it with the file's position.
pub fn check_uploaded_file(file: &UploadedImage) -> Result<(), String> {
    if file.size > MAX_FILE_SIZE_BYTES {
        return Err(format!(
            "File size exceeds maximum limit of {}MB",
            MAX_FILE_SIZE_BYTES / (1024 * 1024)
        ));
    }

    let content_type = file.content_type.to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_MIME_TYPES.join(", ")
        ));
    }

    let extension = extension_of(&file.original_name);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "Invalid file extension. Allowed extensions: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ));
    }

    if !mime_types_for_extension(&extension).contains(&content_type.as_str()) {
        return Err(format!(
            "File extension '{extension}' does not match content type '{content_type}'"
        ));
    }

    if !file.path.is_file() {
        return Err("Uploaded file not found on server".into());
    }

    Ok(())
}

/// `true` when `url` parses and uses the `http` or `https` scheme.
pub fn is_valid_image_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Validate a whole request: counts first, then each file, then each URL.
pub fn validate_inputs(
    files: &[UploadedImage],
    urls: &[String],
    rule: ImageCountRule,
) -> Result<ValidatedCounts, CoreError> {
    let counts = validate_image_count(files.len(), urls.len(), rule)?;

    for (i, file) in files.iter().enumerate() {
        check_uploaded_file(file)
            .map_err(|reason| CoreError::Validation(format!("File {}: {reason}", i + 1)))?;
    }

    for (i, url) in urls.iter().enumerate() {
        if !is_valid_image_url(url) {
            return Err(CoreError::Validation(format!("Invalid URL {}: {url}", i + 1)));
        }
    }

    Ok(counts)
}

/// Lowercased extension of `name` including the leading dot, or an empty
/// string when there is none.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn mime_types_for_extension(extension: &str) -> &'static [&'static str] {
    match extension {
        ".jpg" | ".jpeg" => &["image/jpeg", "image/jpg"],
        ".png" => &["image/png"],
        ".webp" => &["image/webp"],
        ".gif" => &["image/gif"],
        _ => &[],
    }
}

// ---------------------------------------------------------------------------
// Published rules
// ---------------------------------------------------------------------------

/// Validation limits published to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    pub max_file_size: u64,
    pub max_file_size_mb: u64,
    pub allowed_mime_types: &'static [&'static str],
    pub allowed_extensions: &'static [&'static str],
    pub mixed_sources: ImageCountRule,
    pub any_source: ImageCountRule,
}

pub fn validation_rules() -> ValidationRules {
    ValidationRules {
        max_file_size: MAX_FILE_SIZE_BYTES,
        max_file_size_mb: MAX_FILE_SIZE_BYTES / (1024 * 1024),
        allowed_mime_types: ALLOWED_MIME_TYPES,
        allowed_extensions: ALLOWED_EXTENSIONS,
        mixed_sources: ImageCountRule::MIXED_SOURCES,
        any_source: ImageCountRule::ANY_SOURCE,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn staged(dir: &tempfile::TempDir, name: &str, content_type: &str, size: u64) -> UploadedImage {
        let path = dir.path().join(name);
        std::fs::write(&path, b"staged").expect("write staged file");
        UploadedImage {
            original_name: name.to_string(),
            content_type: content_type.to_string(),
            size,
            path,
        }
    }

    fn message(err: CoreError) -> String {
        match err {
            CoreError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn one_jpeg_and_one_url_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(&dir, "look.jpg", "image/jpeg", 3 * 1024 * 1024)];
        let urls = vec!["https://cdn.example.com/face.png".to_string()];

        let counts = validate_inputs(&files, &urls, ImageCountRule::MIXED_SOURCES).unwrap();
        assert_eq!(
            counts,
            ValidatedCounts {
                total_images: 2,
                uploaded_count: 1,
                url_count: 1
            }
        );
    }

    #[test]
    fn url_only_on_mixed_route_requires_an_upload() {
        let urls = vec!["https://cdn.example.com/face.png".to_string()];
        let err = validate_inputs(&[], &urls, ImageCountRule::MIXED_SOURCES).unwrap_err();
        assert_eq!(message(err), "At least one image must be uploaded as file");
    }

    #[test]
    fn four_uploads_on_mixed_route_exceed_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<_> = (0..4)
            .map(|i| staged(&dir, &format!("{i}.png"), "image/png", 10))
            .collect();
        let err = validate_inputs(&files, &[], ImageCountRule::MIXED_SOURCES).unwrap_err();
        assert_eq!(message(err), "Maximum 3 images allowed (uploaded files + URLs)");
    }

    #[test]
    fn uploads_only_on_mixed_route_require_a_url() {
        let err = validate_image_count(2, 0, ImageCountRule::MIXED_SOURCES).unwrap_err();
        assert_eq!(message(err), "At least one image URL must be provided");
    }

    #[test]
    fn any_source_route_accepts_a_single_url() {
        let counts = validate_image_count(0, 1, ImageCountRule::ANY_SOURCE).unwrap();
        assert_eq!(counts.total_images, 1);
    }

    #[test]
    fn any_source_route_rejects_empty_and_six() {
        assert_eq!(
            message(validate_image_count(0, 0, ImageCountRule::ANY_SOURCE).unwrap_err()),
            "Minimum 1 image required (uploaded files + URLs)"
        );
        assert_eq!(
            message(validate_image_count(3, 3, ImageCountRule::ANY_SOURCE).unwrap_err()),
            "Maximum 5 images allowed (uploaded files + URLs)"
        );
    }

    #[test]
    fn oversized_file_is_rejected_with_position() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            staged(&dir, "a.png", "image/png", 10),
            staged(&dir, "b.png", "image/png", MAX_FILE_SIZE_BYTES + 1),
        ];
        let urls = vec!["https://cdn.example.com/face.png".to_string()];
        let err = validate_inputs(&files, &urls, ImageCountRule::MIXED_SOURCES).unwrap_err();
        assert_eq!(message(err), "File 2: File size exceeds maximum limit of 10MB");
    }

    #[test]
    fn disallowed_content_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "doc.png", "application/pdf", 10);
        assert!(check_uploaded_file(&file).unwrap_err().starts_with("Invalid file type"));
    }

    #[test]
    fn extension_must_match_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "photo.png", "image/jpeg", 10);
        assert_eq!(
            check_uploaded_file(&file).unwrap_err(),
            "File extension '.png' does not match content type 'image/jpeg'"
        );
    }

    #[test]
    fn jpg_alias_content_type_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "photo.JPEG", "image/jpg", 10);
        assert!(check_uploaded_file(&file).is_ok());
    }

    #[test]
    fn missing_staged_file_is_rejected() {
        let file = UploadedImage {
            original_name: "gone.png".into(),
            content_type: "image/png".into(),
            size: 10,
            path: PathBuf::from("/nonexistent/modelgen/gone.png"),
        };
        assert_eq!(
            check_uploaded_file(&file).unwrap_err(),
            "Uploaded file not found on server"
        );
    }

    #[test]
    fn url_scheme_must_be_http_or_https() {
        assert!(is_valid_image_url("http://example.com/a.png"));
        assert!(is_valid_image_url("https://example.com/a.png"));
        assert!(!is_valid_image_url("ftp://example.com/a.png"));
        assert!(!is_valid_image_url("not a url"));
    }

    #[test]
    fn invalid_url_is_reported_with_position() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(&dir, "a.webp", "image/webp", 10)];
        let urls = vec!["file:///etc/passwd".to_string()];
        assert_matches!(
            validate_inputs(&files, &urls, ImageCountRule::MIXED_SOURCES),
            Err(CoreError::Validation(msg)) if msg == "Invalid URL 1: file:///etc/passwd"
        );
    }

    #[test]
    fn published_rules_match_constants() {
        let rules = validation_rules();
        assert_eq!(rules.max_file_size_mb, 10);
        assert_eq!(rules.mixed_sources.max_images, 3);
        assert_eq!(rules.any_source.max_images, 5);
    }
}
