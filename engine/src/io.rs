use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use wasm_bindgen::prelude::*;

use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};
use crate::objects::ImageElement;
use crate::raster;
use crate::types::RasterFormat;

/// Where an image comes from. Data URLs carry their bytes; the other two
/// need the host to fetch them and hand the bytes back.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    DataUrl { mime: String, bytes: Vec<u8> },
    ObjectUrl(String),
    Url(String),
}

impl ImageSource {
    pub fn parse(source: &str) -> Result<ImageSource> {
        let source = source.trim();
        if source.is_empty() {
            return Err(EditorError::InvalidArgument("empty image source".into()));
        }
        if let Some(rest) = source.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| EditorError::Decode("data URL has no payload".into()))?;
            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or_default().to_string();
            let bytes = if parts.any(|p| p.eq_ignore_ascii_case("base64")) {
                general_purpose::STANDARD
                    .decode(payload.trim())
                    .map_err(|e| EditorError::Decode(format!("bad base64 payload: {}", e)))?
            } else {
                payload.as_bytes().to_vec()
            };
            return Ok(ImageSource::DataUrl { mime, bytes });
        }
        if source.starts_with("blob:") {
            return Ok(ImageSource::ObjectUrl(source.to_string()));
        }
        Ok(ImageSource::Url(source.to_string()))
    }
}

#[derive(Clone, Debug)]
struct PendingLoad {
    ticket: u32,
    source: ImageSource,
}

/// Tracks the one load allowed in flight. Every new load takes a fresh
/// ticket, so bytes arriving for an older ticket are dropped.
#[derive(Debug, Default)]
pub struct ImageLoader {
    generation: u32,
    pending: Option<PendingLoad>,
}

impl ImageLoader {
    fn next_ticket(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1).max(1);
        self.generation
    }

    /// Starts a load; any earlier pending load becomes stale. Returns the
    /// ticket and the object URL of a dropped blob load, which the caller
    /// must release.
    pub fn begin(&mut self, source: ImageSource) -> (u32, Option<String>) {
        let (ticket, stale) = self.supersede();
        self.pending = Some(PendingLoad { ticket, source });
        (ticket, stale)
    }

    fn finish(&mut self, ticket: u32) -> Option<ImageSource> {
        match &self.pending {
            Some(p) if p.ticket == ticket => self.pending.take().map(|p| p.source),
            _ => None,
        }
    }

    pub fn supersede(&mut self) -> (u32, Option<String>) {
        let ticket = self.next_ticket();
        let stale = self.pending.take().and_then(|stale| {
            log::info!("image load {} superseded by {}", stale.ticket, ticket);
            match stale.source {
                ImageSource::ObjectUrl(url) => Some(url),
                _ => None,
            }
        });
        (ticket, stale)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_ticket(&self) -> Option<u32> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    pub fn pending_url(&self) -> Option<&str> {
        match &self.pending.as_ref()?.source {
            ImageSource::ObjectUrl(url) | ImageSource::Url(url) => Some(url),
            ImageSource::DataUrl { .. } => None,
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    if bytes.is_empty() {
        return Err(EditorError::Decode("no image data".into()));
    }
    let img = image::load_from_memory(bytes).map_err(|e| EditorError::Decode(e.to_string()))?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(EditorError::Decode("image has no pixels".into()));
    }
    Ok(rgba)
}

/// Maps a 0..=1 quality onto the JPEG encoder's 1..=100 scale.
fn jpeg_quality(quality: Option<f64>, default: f64) -> u8 {
    let q = quality.filter(|q| q.is_finite() && *q > 0.0).unwrap_or(default);
    (q.min(1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

pub fn encode(pixels: &RgbaImage, format: RasterFormat, quality: u8) -> Result<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::new();
    match format {
        RasterFormat::Png => {
            DynamicImage::ImageRgba8(pixels.clone())
                .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
        RasterFormat::Jpeg => {
            // JPEG has no alpha: flatten onto white.
            let mut flat = RgbaImage::from_pixel(pixels.width(), pixels.height(), Rgba([255, 255, 255, 255]));
            image::imageops::overlay(&mut flat, pixels, 0, 0);
            let rgb = DynamicImage::ImageRgba8(flat).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality)
                .encode_image(&rgb)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
    }
    Ok(bytes)
}

impl PhotoEditor {
    pub fn load_image_pixels(&mut self, pixels: RgbaImage) -> Result<()> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(EditorError::Decode("image has no pixels".into()));
        }
        if self.crop.cancel(&mut self.session) {
            log::info!("crop cancelled by image load");
        }
        self.end_gesture();
        let (width, height) = pixels.dimensions();
        let key = self.session.images.insert(pixels);
        let id = self.session.next_id();
        let mut element = ImageElement::new(id, key, width, height);
        self.session.fit_to_stage(&mut element);
        self.session.replace_image(element);
        log::info!("loaded {}x{} image as node {}", width, height, id);
        self.snapshot_canvas()
    }

    pub fn export_pixels(&mut self) -> Result<RgbaImage> {
        let image = self.session.require_image()?;
        let region = image.client_rect();
        let ratio = raster::export_pixel_ratio(&image.placement, self.session.config.max_export_pixel_ratio);
        log::debug!("exporting {:?} at pixel ratio {}", region, ratio);
        raster::rasterize(&mut self.session, region, ratio)
    }

    fn supersede_load(&mut self) -> u32 {
        let (ticket, stale) = self.loader.supersede();
        if let Some(url) = stale {
            revoke_object_url(&url);
        }
        ticket
    }

    fn export_encoded(&mut self, format: Option<String>, quality: Option<f64>) -> Result<(RasterFormat, Vec<u8>)> {
        let format: RasterFormat = format.as_deref().unwrap_or("png").parse()?;
        let quality = jpeg_quality(quality, self.session.config.jpeg_quality);
        let pixels = self.export_pixels()?;
        Ok((format, encode(&pixels, format, quality)?))
    }
}

#[wasm_bindgen]
impl PhotoEditor {
    /// Starts loading from a data URL, object URL or plain URL. Data URLs are
    /// decoded right away; for the others the host fetches the bytes and
    /// passes them to `complete_load` with the returned ticket.
    pub fn load_image(&mut self, source: &str) -> std::result::Result<u32, EditorError> {
        match ImageSource::parse(source)? {
            ImageSource::DataUrl { mime, bytes } => {
                let ticket = self.supersede_load();
                log::debug!("decoding inline {} image ({} bytes)", if mime.is_empty() { "untyped" } else { &mime }, bytes.len());
                self.load_image_pixels(decode(&bytes)?)?;
                Ok(ticket)
            }
            source => {
                let (ticket, stale) = self.loader.begin(source);
                if let Some(url) = stale {
                    revoke_object_url(&url);
                }
                Ok(ticket)
            }
        }
    }

    /// Delivers fetched bytes for `ticket`. Returns false when a newer load
    /// has superseded it. Decode failures leave the current image untouched.
    pub fn complete_load(&mut self, ticket: u32, bytes: &[u8]) -> std::result::Result<bool, EditorError> {
        let Some(source) = self.loader.finish(ticket) else {
            log::warn!("ignoring stale image load {}", ticket);
            return Ok(false);
        };
        if let ImageSource::ObjectUrl(url) = &source {
            revoke_object_url(url);
        }
        self.load_image_pixels(decode(bytes)?)?;
        Ok(true)
    }

    pub fn fail_load(&mut self, ticket: u32, message: &str) -> std::result::Result<(), EditorError> {
        match self.loader.finish(ticket) {
            Some(source) => {
                if let ImageSource::ObjectUrl(url) = &source {
                    revoke_object_url(url);
                }
                log::error!("image load {} failed: {}", ticket, message);
                Err(EditorError::Decode(message.to_string()))
            }
            None => Ok(()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_pending()
    }

    pub fn pending_load_url(&self) -> Option<String> {
        self.loader.pending_url().map(str::to_string)
    }

    pub fn load_image_bytes(&mut self, bytes: &[u8]) -> std::result::Result<(), EditorError> {
        self.supersede_load();
        self.load_image_pixels(decode(bytes)?)
    }

    /// Encoded export bytes; `format` is "png" (default) or "jpeg", `quality`
    /// is 0..=1 and only affects JPEG.
    pub fn export_image(&mut self, format: Option<String>, quality: Option<f64>) -> std::result::Result<Vec<u8>, EditorError> {
        Ok(self.export_encoded(format, quality)?.1)
    }

    pub fn get_image_as_base64(&mut self, format: Option<String>, quality: Option<f64>) -> std::result::Result<String, EditorError> {
        let (format, bytes) = self.export_encoded(format, quality)?;
        Ok(format!("data:{};base64,{}", format.mime(), general_purpose::STANDARD.encode(&bytes)))
    }

    pub fn download(&mut self, filename: Option<String>, format: Option<String>, quality: Option<f64>) -> std::result::Result<(), EditorError> {
        let (format, bytes) = self.export_encoded(format, quality)?;
        let filename = filename.unwrap_or_else(|| format!("edited-image.{}", format.extension()));
        trigger_download(&filename, format.mime(), &bytes)
    }

    pub fn register_font(&mut self, bytes: Vec<u8>) -> std::result::Result<(), EditorError> {
        let font = ab_glyph::FontArc::try_from_vec(bytes)
            .map_err(|e| EditorError::InvalidArgument(format!("unreadable font: {}", e)))?;
        self.session.font = Some(font);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
fn revoke_object_url(url: &str) {
    if web_sys::Url::revoke_object_url(url).is_err() {
        log::warn!("could not revoke {}", url);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn revoke_object_url(url: &str) {
    log::debug!("released {}", url);
}

#[cfg(target_arch = "wasm32")]
fn trigger_download(filename: &str, mime: &str, bytes: &[u8]) -> Result<()> {
    use wasm_bindgen::JsCast;

    let fail = |e: JsValue| EditorError::Encode(format!("download failed: {:?}", e));
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let bag = web_sys::BlobPropertyBag::new();
    bag.set_type(mime);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &bag).map_err(fail)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(fail)?;
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(EditorError::InvalidState("no document to download into"))?;
    let anchor = document
        .create_element("a")
        .map_err(fail)?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| EditorError::InvalidState("anchor element expected"))?;
    anchor.set_href(&url);
    anchor.set_download(filename);
    anchor.click();
    revoke_object_url(&url);
    log::info!("downloaded {} ({} bytes)", filename, bytes.len());
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn trigger_download(_filename: &str, _mime: &str, _bytes: &[u8]) -> Result<()> {
    Err(EditorError::InvalidState("downloads need a browser"))
}
