//! Editor configuration and its defaults.

use serde::{Deserialize, Serialize};
use crate::error::Result;

pub const DEFAULT_STAGE_WIDTH: f64 = 800.0;
pub const DEFAULT_STAGE_HEIGHT: f64 = 600.0;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Smallest crop rectangle side, in scene units.
pub const DEFAULT_CROP_MIN_SIZE: f64 = 50.0;

pub const DEFAULT_INITIAL_CROP_FRACTION: f64 = 0.8;

pub const DEFAULT_FIT_FRACTION: f64 = 0.8;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
pub const DEFAULT_ZOOM_STEP: f64 = 1.1;

pub const DEFAULT_MAX_EXPORT_PIXEL_RATIO: f64 = 4.0;

pub const DEFAULT_JPEG_QUALITY: f64 = 0.92;

/// Largest display size accepted by resize, in scene units.
pub const DEFAULT_MAX_RESIZE_DIMENSION: f64 = 10_000.0;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    pub stage_width: f64,
    pub stage_height: f64,
    pub history_capacity: usize,
    pub crop_min_size: f64,
    pub initial_crop_fraction: f64,
    pub fit_fraction: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub max_export_pixel_ratio: f64,
    pub jpeg_quality: f64,
    pub max_resize_dimension: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            stage_width: DEFAULT_STAGE_WIDTH,
            stage_height: DEFAULT_STAGE_HEIGHT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            crop_min_size: DEFAULT_CROP_MIN_SIZE,
            initial_crop_fraction: DEFAULT_INITIAL_CROP_FRACTION,
            fit_fraction: DEFAULT_FIT_FRACTION,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            zoom_step: DEFAULT_ZOOM_STEP,
            max_export_pixel_ratio: DEFAULT_MAX_EXPORT_PIXEL_RATIO,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_resize_dimension: DEFAULT_MAX_RESIZE_DIMENSION,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Replaces values that would break the editor's invariants.
    pub fn validated(mut self) -> Self {
        let defaults = EditorConfig::default();
        if !(self.stage_width.is_finite() && self.stage_width > 0.0) { self.stage_width = defaults.stage_width; }
        if !(self.stage_height.is_finite() && self.stage_height > 0.0) { self.stage_height = defaults.stage_height; }
        self.history_capacity = self.history_capacity.max(1);
        if !(self.crop_min_size.is_finite() && self.crop_min_size >= 1.0) { self.crop_min_size = defaults.crop_min_size; }
        if !(self.initial_crop_fraction > 0.0 && self.initial_crop_fraction <= 1.0) { self.initial_crop_fraction = defaults.initial_crop_fraction; }
        if !(self.fit_fraction > 0.0 && self.fit_fraction <= 1.0) { self.fit_fraction = defaults.fit_fraction; }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        if !(self.zoom_step > 1.0) { self.zoom_step = defaults.zoom_step; }
        if !(self.max_export_pixel_ratio >= 1.0) { self.max_export_pixel_ratio = defaults.max_export_pixel_ratio; }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) { self.jpeg_quality = defaults.jpeg_quality; }
        if !(self.max_resize_dimension >= 1.0) { self.max_resize_dimension = defaults.max_resize_dimension; }
        self
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}
