use chapterbind_model::RasterPage;
use image::codecs::jpeg::JpegEncoder;
use image::ImageResult;
use unicode_normalization::UnicodeNormalization;

/// Quality used for the canonical page encoding.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Normalize scraped text to NFC and collapse runs of whitespace.
///
/// Listing markup tends to wrap chapter names across lines and pad them
/// with indentation; the display name is the single-spaced form.
pub fn clean_text(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode any supported raster format and re-encode it as baseline RGB JPEG.
///
/// The assembler only ever sees this one encoding.
pub fn to_raster_page(index: usize, bytes: &[u8], quality: u8) -> ImageResult<RasterPage> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    Ok(RasterPage {
        index,
        jpeg,
        width,
        height,
    })
}
