//! The image element's filter set and the filter half of the editing surface.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};

/// Filter parameters of the image element. Every field has a neutral value at
/// which the filter is a no-op.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FilterSet {
    pub brightness: f64,
    pub contrast: f64,
    pub blur: f64,
    pub saturation: f64,
    pub hue: f64,
    pub luminance: f64,
    pub pixelate: f64,
    pub noise: f64,
    pub grayscale: bool,
    pub sepia: bool,
    pub invert: bool,
    pub emboss: bool,
    pub posterize: bool,
    pub solarize: bool,
    pub enhance: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        FilterSet {
            brightness: 1.0,
            contrast: 0.0,
            blur: 0.0,
            saturation: 0.0,
            hue: 0.0,
            luminance: 0.0,
            pixelate: 1.0,
            noise: 0.0,
            grayscale: false,
            sepia: false,
            invert: false,
            emboss: false,
            posterize: false,
            solarize: false,
            enhance: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FilterName {
    Brightness,
    Contrast,
    Blur,
    Saturation,
    Hue,
    Luminance,
    Pixelate,
    Noise,
    Grayscale,
    Sepia,
    Invert,
    Emboss,
    Posterize,
    Solarize,
    Enhance,
}

impl FilterName {
    pub fn is_toggle(self) -> bool {
        matches!(self, FilterName::Grayscale | FilterName::Sepia | FilterName::Invert | FilterName::Emboss
            | FilterName::Posterize | FilterName::Solarize | FilterName::Enhance)
    }
}

impl FromStr for FilterName {
    type Err = EditorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        let parsed = match name.as_str() {
            "brightness" => FilterName::Brightness,
            "contrast" => FilterName::Contrast,
            "blur" | "blurradius" => FilterName::Blur,
            "saturation" => FilterName::Saturation,
            "hue" => FilterName::Hue,
            "luminance" => FilterName::Luminance,
            "pixelate" | "pixelsize" => FilterName::Pixelate,
            "noise" => FilterName::Noise,
            "grayscale" | "greyscale" => FilterName::Grayscale,
            "sepia" => FilterName::Sepia,
            "invert" => FilterName::Invert,
            "emboss" => FilterName::Emboss,
            "posterize" => FilterName::Posterize,
            "solarize" => FilterName::Solarize,
            "enhance" => FilterName::Enhance,
            _ => return Err(EditorError::InvalidArgument(format!("unknown filter '{}'", s))),
        };
        Ok(parsed)
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub enum ActiveFilter {
    Brightness(f64),
    Contrast(f64),
    Hsl { saturation: f64, hue: f64, luminance: f64 },
    Blur(f64),
    Pixelate(f64),
    Noise(f64),
    Grayscale,
    Sepia,
    Invert,
    Emboss,
    Posterize,
    Solarize,
    Enhance,
}

impl FilterSet {
    /// Sets one field. Toggles treat any non-zero value as on.
    pub fn set(&mut self, name: FilterName, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(EditorError::InvalidArgument(format!("{:?} must be a finite number", name)));
        }
        let on = value != 0.0;
        match name {
            FilterName::Brightness => self.brightness = value.max(0.0),
            FilterName::Contrast => self.contrast = value,
            FilterName::Blur => self.blur = value.max(0.0),
            FilterName::Saturation => self.saturation = value,
            FilterName::Hue => self.hue = value,
            FilterName::Luminance => self.luminance = value,
            FilterName::Pixelate => self.pixelate = value.max(1.0),
            FilterName::Noise => self.noise = value.max(0.0),
            FilterName::Grayscale => self.grayscale = on,
            FilterName::Sepia => self.sepia = on,
            FilterName::Invert => self.invert = on,
            FilterName::Emboss => self.emboss = on,
            FilterName::Posterize => self.posterize = on,
            FilterName::Solarize => self.solarize = on,
            FilterName::Enhance => self.enhance = on,
        }
        Ok(())
    }

    pub fn get(&self, name: FilterName) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match name {
            FilterName::Brightness => self.brightness,
            FilterName::Contrast => self.contrast,
            FilterName::Blur => self.blur,
            FilterName::Saturation => self.saturation,
            FilterName::Hue => self.hue,
            FilterName::Luminance => self.luminance,
            FilterName::Pixelate => self.pixelate,
            FilterName::Noise => self.noise,
            FilterName::Grayscale => flag(self.grayscale),
            FilterName::Sepia => flag(self.sepia),
            FilterName::Invert => flag(self.invert),
            FilterName::Emboss => flag(self.emboss),
            FilterName::Posterize => flag(self.posterize),
            FilterName::Solarize => flag(self.solarize),
            FilterName::Enhance => flag(self.enhance),
        }
    }

    pub fn active(&self) -> Vec<ActiveFilter> {
        let mut list = Vec::new();
        if self.brightness != 1.0 { list.push(ActiveFilter::Brightness(self.brightness)); }
        if self.contrast != 0.0 { list.push(ActiveFilter::Contrast(self.contrast)); }
        if self.saturation != 0.0 || self.hue != 0.0 || self.luminance != 0.0 {
            list.push(ActiveFilter::Hsl { saturation: self.saturation, hue: self.hue, luminance: self.luminance });
        }
        if self.blur > 0.0 { list.push(ActiveFilter::Blur(self.blur)); }
        if self.pixelate > 1.0 { list.push(ActiveFilter::Pixelate(self.pixelate)); }
        if self.noise > 0.0 { list.push(ActiveFilter::Noise(self.noise)); }
        if self.grayscale { list.push(ActiveFilter::Grayscale); }
        if self.sepia { list.push(ActiveFilter::Sepia); }
        if self.invert { list.push(ActiveFilter::Invert); }
        if self.emboss { list.push(ActiveFilter::Emboss); }
        if self.posterize { list.push(ActiveFilter::Posterize); }
        if self.solarize { list.push(ActiveFilter::Solarize); }
        if self.enhance { list.push(ActiveFilter::Enhance); }
        list
    }

    pub fn has_active(&self) -> bool {
        !self.active().is_empty()
    }

    pub fn reset(&mut self) {
        *self = FilterSet::default();
    }
}

#[wasm_bindgen]
impl PhotoEditor {
    /// Changes one filter parameter and re-renders the filtered image.
    /// Slider drags call this continuously, so no history entry is recorded.
    pub fn update_filter(&mut self, name: &str, value: f64) -> std::result::Result<(), EditorError> {
        let name: FilterName = name.parse()?;
        let session = &mut self.session;
        let image = session.image.as_mut().ok_or(EditorError::NoImage)?;
        image.filters.set(name, value)?;
        image.refresh_filter_cache(&session.images);
        session.mark_dirty();
        log::debug!("filter {:?} set to {}", name, value);
        Ok(())
    }

    pub fn reset_filters(&mut self) -> std::result::Result<(), EditorError> {
        self.ensure_no_crop()?;
        let session = &mut self.session;
        let image = session.image.as_mut().ok_or(EditorError::NoImage)?;
        image.filters.reset();
        image.clear_filter_cache();
        session.mark_dirty();
        self.snapshot_canvas()
    }

    pub fn has_active_filters(&self) -> bool {
        self.session.image.as_ref().map(|img| img.filters.has_active()).unwrap_or(false)
    }

    pub fn get_filter(&self, name: &str) -> std::result::Result<f64, EditorError> {
        let name: FilterName = name.parse()?;
        let image = self.session.image.as_ref().ok_or(EditorError::NoImage)?;
        Ok(image.filters.get(name))
    }

    pub fn get_filters_json(&self) -> String {
        match &self.session.image {
            Some(image) => serde_json::to_string(&image.filters).unwrap_or_else(|_| "{}".to_string()),
            None => "null".to_string(),
        }
    }

    pub fn get_active_filters_json(&self) -> String {
        let list = self.session.image.as_ref().map(|img| img.filters.active()).unwrap_or_default();
        serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use image::{Rgba, RgbaImage};

    #[test]
    fn neutral_set_has_no_active_filters() {
        let set = FilterSet::default();
        assert!(set.active().is_empty());
        assert!(!set.has_active());
    }

    #[test]
    fn only_non_neutral_fields_are_active() {
        let mut set = FilterSet::default();
        set.set(FilterName::Blur, 3.0).unwrap();
        set.set(FilterName::Hue, 40.0).unwrap();
        set.set(FilterName::Invert, 1.0).unwrap();
        set.set(FilterName::Pixelate, 1.0).unwrap();
        assert_eq!(set.active(), vec![
            ActiveFilter::Hsl { saturation: 0.0, hue: 40.0, luminance: 0.0 },
            ActiveFilter::Blur(3.0),
            ActiveFilter::Invert,
        ]);
    }

    #[test]
    fn returning_to_neutral_deactivates() {
        let mut set = FilterSet::default();
        set.set(FilterName::Brightness, 1.4).unwrap();
        assert!(set.has_active());
        set.set(FilterName::Brightness, 1.0).unwrap();
        assert!(!set.has_active());
    }

    #[test]
    fn reset_restores_every_field() {
        let mut set = FilterSet::default();
        set.set(FilterName::Contrast, 20.0).unwrap();
        set.set(FilterName::Noise, 0.3).unwrap();
        set.set(FilterName::Sepia, 1.0).unwrap();
        set.set(FilterName::Enhance, 1.0).unwrap();
        set.reset();
        assert_eq!(set, FilterSet::default());
    }

    #[test]
    fn editor_reset_is_neutral_and_undoable() {
        let mut editor = PhotoEditor::default();
        editor.load_image_pixels(RgbaImage::from_fn(24, 16, |x, y| Rgba([x as u8 * 9, y as u8 * 13, 90, 255]))).unwrap();
        editor.update_filter("brightness", 1.4).unwrap();
        editor.update_filter("blur", 2.0).unwrap();
        editor.update_filter("sepia", 1.0).unwrap();
        assert!(editor.has_active_filters());
        assert!(editor.session.image.as_ref().unwrap().has_filter_cache());
        assert_eq!(editor.history_len(), 1);

        editor.reset_filters().unwrap();
        assert!(!editor.has_active_filters());
        assert_eq!(editor.get_active_filters_json(), "[]");
        assert_eq!(editor.history_len(), 2);

        let session = &mut editor.session;
        let image = session.image.as_mut().unwrap();
        assert!(!image.has_filter_cache());
        let source = session.images.get(image.source).unwrap();
        let filtered = image.filtered_pixels(&session.images).unwrap();
        assert!(Rc::ptr_eq(&filtered, &source));

        assert!(editor.undo().unwrap());
        assert!(editor.has_active_filters());
        assert_eq!(editor.get_filter("brightness").unwrap(), 1.4);
        assert_eq!(editor.get_filter("blur").unwrap(), 2.0);
    }

    #[test]
    fn parameters_are_bounded() {
        let mut set = FilterSet::default();
        set.set(FilterName::Blur, -4.0).unwrap();
        set.set(FilterName::Pixelate, 0.2).unwrap();
        assert_eq!(set.blur, 0.0);
        assert_eq!(set.pixelate, 1.0);
        assert!(set.set(FilterName::Noise, f64::NAN).is_err());
    }

    #[test]
    fn names_accept_panel_spellings() {
        assert_eq!("blurRadius".parse::<FilterName>().unwrap(), FilterName::Blur);
        assert_eq!("pixel_size".parse::<FilterName>().unwrap(), FilterName::Pixelate);
        assert!("vignette".parse::<FilterName>().is_err());
        assert!(FilterName::Solarize.is_toggle());
        assert!(!FilterName::Noise.is_toggle());
    }
}
