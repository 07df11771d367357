//! Normalizes user-supplied images before they are sent to the vision model.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{GenericImageView, ImageFormat, codecs::jpeg::JpegEncoder, imageops::FilterType};
use url::Url;

use crate::error::{PipelineError, Result};

/// Longest edge sent upstream; larger photos are scaled down.
pub const MAX_EDGE: u32 = 1024;
const JPEG_QUALITY: u8 = 85;
/// Largest photo accepted from an upload or a remote URL.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// `data:image/jpeg;base64,...`, ready for an `image_url` content part.
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub source_mime_type: &'static str,
    pub source_size: usize,
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        "image/bmp" => Ok(ImageFormat::Bmp),
        _ => Err(PipelineError::InvalidInput(format!(
            "unsupported mime type: {mime_type}"
        ))),
    }
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
pub fn decode_base64_image(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::InvalidInput("malformed data URL".to_string()))?,
        None => trimmed,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(PipelineError::InvalidInput("image payload is empty".to_string()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| PipelineError::InvalidInput(format!("invalid base64 image: {err}")))
}

pub fn validate_http_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidInput("url must not be empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| PipelineError::InvalidInput(format!("invalid url: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(PipelineError::InvalidInput(format!(
            "only http and https urls are allowed, got {scheme}"
        ))),
    }
}

/// Fetches remote photos with a per-request timeout and a body size cap.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_bytes,
        }
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>> {
        let url = validate_http_url(raw_url)?;
        let mut response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Http {
                status: status.as_u16(),
                body: format!("fetching image from {raw_url}"),
            });
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(too_large(self.max_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            append_within_limit(&mut body, &chunk, self.max_bytes)?;
        }
        Ok(body)
    }
}

fn too_large(max_bytes: usize) -> PipelineError {
    PipelineError::InvalidInput(format!("image is larger than {max_bytes} bytes"))
}

fn append_within_limit(body: &mut Vec<u8>, chunk: &[u8], max_bytes: usize) -> Result<()> {
    if body.len().saturating_add(chunk.len()) > max_bytes {
        return Err(too_large(max_bytes));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

/// Decodes, downsizes to [`MAX_EDGE`], and re-encodes as JPEG.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage> {
    let source_mime_type = detect_mime_type(bytes)
        .ok_or_else(|| PipelineError::InvalidInput("unrecognized image format".to_string()))?;
    let format = mime_to_format(source_mime_type)?;
    let mut image = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| PipelineError::InvalidInput(format!("decode image failed: {err}")))?;

    let (width, height) = image.dimensions();
    if width.max(height) > MAX_EDGE {
        image = image.resize(MAX_EDGE, MAX_EDGE, FilterType::Triangle);
    }
    let (width, height) = image.dimensions();

    let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());
    let mut encoded = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY))
        .map_err(|err| PipelineError::InvalidInput(format!("encode jpeg failed: {err}")))?;

    Ok(PreparedImage {
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(&encoded)),
        width,
        height,
        source_mime_type,
        source_size: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut output = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn detects_common_formats() {
        assert_eq!(detect_mime_type(&png_bytes(1, 1)), Some("image/png"));
        assert_eq!(detect_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_mime_type(b"GIF89a..."), Some("image/gif"));
        assert_eq!(detect_mime_type(b"hello"), None);
    }

    #[test]
    fn large_images_are_downscaled_to_jpeg() {
        let prepared = prepare_image(&png_bytes(2048, 1024)).unwrap();
        assert_eq!((prepared.width, prepared.height), (1024, 512));
        assert_eq!(prepared.source_mime_type, "image/png");
        assert!(prepared.data_url.starts_with("data:image/jpeg;base64,"));

        let jpeg = decode_base64_image(&prepared.data_url).unwrap();
        assert_eq!(detect_mime_type(&jpeg), Some("image/jpeg"));
    }

    #[test]
    fn small_images_keep_their_size() {
        let prepared = prepare_image(&png_bytes(64, 48)).unwrap();
        assert_eq!((prepared.width, prepared.height), (64, 48));
    }

    #[test]
    fn garbage_is_invalid_input() {
        assert!(matches!(
            prepare_image(b"definitely not an image"),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_base64_image("data:image/png;base64"),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_base64_image("!!!"),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn base64_with_whitespace_decodes() {
        let encoded = STANDARD.encode(b"abc123");
        let wrapped = format!("  {}\n{}  ", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_base64_image(&wrapped).unwrap(), b"abc123");
    }

    #[test]
    fn only_http_urls_are_accepted() {
        assert!(validate_http_url("https://example.com/fridge.jpg").is_ok());
        assert!(validate_http_url("file:///etc/passwd").is_err());
        assert!(validate_http_url("  ").is_err());
    }

    #[test]
    fn chunks_past_the_limit_are_rejected() {
        let mut body = Vec::new();
        append_within_limit(&mut body, &[1; 6], 10).unwrap();
        append_within_limit(&mut body, &[2; 4], 10).unwrap();
        assert!(matches!(
            append_within_limit(&mut body, &[3], 10),
            Err(PipelineError::InvalidInput(_))
        ));
        assert_eq!(body.len(), 10);
    }

    async fn serve_bytes(len: usize) -> String {
        let router = axum::Router::new().route(
            "/photo.png",
            axum::routing::get(move || async move { vec![0u8; len] }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/photo.png")
    }

    #[tokio::test]
    async fn oversized_remote_images_are_rejected() {
        let fetcher = ImageFetcher::new(Duration::from_secs(5), 1024);

        let small = serve_bytes(512).await;
        assert_eq!(fetcher.fetch(&small).await.unwrap().len(), 512);

        let large = serve_bytes(4096).await;
        assert!(matches!(
            fetcher.fetch(&large).await,
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
