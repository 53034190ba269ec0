//! Image format sniffing for artifacts whose origin gave no reliable name.

use image::ImageFormat;

/// File extension (without dot) for encoded image `bytes`, defaulting to
/// `png` when the format is not recognised.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Gif) => "gif",
        _ => "png",
    }
}

/// MIME type for a file extension (with or without leading dot).
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_magic_numbers() {
        assert_eq!(sniff_extension(b"\x89PNG\r\n\x1a\n rest"), "png");
        assert_eq!(sniff_extension(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "jpg");
        assert_eq!(sniff_extension(b"GIF89a...."), "gif");
        assert_eq!(sniff_extension(b"garbage"), "png");
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for_extension(".JPG"), "image/jpeg");
        assert_eq!(content_type_for_extension("webp"), "image/webp");
        assert_eq!(content_type_for_extension("bin"), "application/octet-stream");
    }
}
