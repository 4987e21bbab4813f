use crate::config::PreviewConfig;

/// Answers whether previews can be generated for a mime type.
pub trait PreviewCapability: Send + Sync {
    fn is_mime_supported(&self, mime: &str) -> bool;
}

/// Preview support backed by the image decoder, plus configured extras
pub struct ImagePreview {
    extra_mimes: Vec<String>,
}

impl ImagePreview {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            extra_mimes: config.extra_mimes.clone(),
        }
    }
}

impl PreviewCapability for ImagePreview {
    fn is_mime_supported(&self, mime: &str) -> bool {
        if self.extra_mimes.iter().any(|m| m.eq_ignore_ascii_case(mime)) {
            return true;
        }
        image::ImageFormat::from_mime_type(mime)
            .map(|format| format.reading_enabled())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_formats() {
        let preview = ImagePreview::new(&PreviewConfig::default());
        assert!(preview.is_mime_supported("image/jpeg"));
        assert!(preview.is_mime_supported("image/png"));
        assert!(!preview.is_mime_supported("image/heic"));
        assert!(!preview.is_mime_supported("application/pdf"));
    }

    #[test]
    fn test_extra_mimes() {
        let preview = ImagePreview::new(&PreviewConfig {
            extra_mimes: vec!["image/heic".to_string()],
        });
        assert!(preview.is_mime_supported("image/heic"));
        assert!(preview.is_mime_supported("IMAGE/HEIC"));
    }
}
