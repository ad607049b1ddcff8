use eframe::egui::ColorImage;

/// Largest edge of the preview shown next to the form.
const MAX_EDGE: u32 = 160;

/// Decodes image bytes into a texture-ready preview, scaled down to fit.
pub fn decode_preview(bytes: &[u8]) -> Option<ColorImage> {
    let img = image::load_from_memory(bytes).ok()?;
    let img = if img.width() > MAX_EDGE || img.height() > MAX_EDGE {
        img.thumbnail(MAX_EDGE, MAX_EDGE)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &rgba))
}

/// Fetches the thumbnail the extractor reported for a video.
///
/// Blocking; run it off the interface thread. Any failure just means no preview.
pub fn fetch_thumbnail(thumbnail_url: &str) -> Option<ColorImage> {
    let resp = reqwest::blocking::get(thumbnail_url).ok()?.error_for_status().ok()?;
    let bytes = resp.bytes().ok()?;
    decode_preview(&bytes)
}
