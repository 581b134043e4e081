//! Rotate, flip, resize and move the image; pan and zoom the stage.

use kurbo::Point;
use wasm_bindgen::prelude::*;

use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};

impl PhotoEditor {
    fn rotate_by(&mut self, degrees: f64) -> Result<()> {
        self.ensure_no_crop()?;
        let session = &mut self.session;
        let mut image = session.image.take().ok_or(EditorError::NoImage)?;
        image.placement.rotation += degrees;
        session.center(&mut image);
        session.image = Some(image);
        session.mark_dirty();
        log::debug!("rotated by {} degrees", degrees);
        self.snapshot_canvas()
    }

    fn flip(&mut self, horizontal: bool) -> Result<()> {
        self.ensure_no_crop()?;
        let image = self.session.require_image_mut()?;
        if horizontal {
            image.placement.scale_x = -image.placement.scale_x;
        } else {
            image.placement.scale_y = -image.placement.scale_y;
        }
        self.session.mark_dirty();
        self.snapshot_canvas()
    }
}

#[wasm_bindgen]
impl PhotoEditor {
    pub fn rotate_cw(&mut self) -> std::result::Result<(), EditorError> {
        self.rotate_by(90.0)
    }

    pub fn rotate_ccw(&mut self) -> std::result::Result<(), EditorError> {
        self.rotate_by(-90.0)
    }

    pub fn rotate_180(&mut self) -> std::result::Result<(), EditorError> {
        self.rotate_by(180.0)
    }

    pub fn flip_horizontal(&mut self) -> std::result::Result<(), EditorError> {
        self.flip(true)
    }

    pub fn flip_vertical(&mut self) -> std::result::Result<(), EditorError> {
        self.flip(false)
    }

    /// Sets the displayed size in scene units. With `lock_aspect` the side
    /// that moved further wins and the other follows the natural aspect ratio.
    pub fn resize_image(&mut self, width: f64, height: f64, lock_aspect: bool) -> std::result::Result<(), EditorError> {
        self.ensure_no_crop()?;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(EditorError::InvalidArgument(format!("resize to {}x{} is not a positive size", width, height)));
        }
        let max = self.session.config.max_resize_dimension;
        let image = self.session.require_image_mut()?;
        let natural = image.natural_size();
        let (mut w, mut h) = (width, height);
        if lock_aspect {
            let current = image.displayed_size();
            let aspect = natural.width / natural.height;
            if (w - current.width).abs() >= (h - current.height).abs() {
                h = w / aspect;
            } else {
                w = h * aspect;
            }
        }
        if w > max || h > max {
            return Err(EditorError::DimensionsExceedImage {
                requested_width: w.round(),
                requested_height: h.round(),
                available_width: max,
                available_height: max,
            });
        }
        image.placement.scale_x = (w / natural.width).copysign(image.placement.scale_x);
        image.placement.scale_y = (h / natural.height).copysign(image.placement.scale_y);
        log::debug!("resized image to {}x{}", w, h);
        self.session.mark_dirty();
        self.snapshot_canvas()
    }

    /// Moves the image's pivot to a scene position while it is draggable.
    pub fn drag_image_to(&mut self, x: f64, y: f64) -> std::result::Result<(), EditorError> {
        let image = self.session.require_image_mut()?;
        if !image.draggable {
            return Err(EditorError::InvalidState("image dragging is disabled"));
        }
        image.placement.x = x;
        image.placement.y = y;
        self.session.mark_dirty();
        Ok(())
    }

    pub fn end_image_drag(&mut self) -> std::result::Result<(), EditorError> {
        self.session.require_image()?;
        self.snapshot_canvas()
    }

    pub fn set_stage_size(&mut self, width: f64, height: f64) -> std::result::Result<(), EditorError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(EditorError::InvalidArgument(format!("stage size {}x{} is not positive", width, height)));
        }
        self.session.stage.width = width;
        self.session.stage.height = height;
        self.session.mark_dirty();
        Ok(())
    }

    pub fn get_zoom(&self) -> f64 {
        self.session.stage.viewport.zoom
    }

    /// Zooms by `factor`, keeping the scene point under the stage position
    /// (`anchor_x`, `anchor_y`) fixed. Returns the clamped zoom.
    pub fn zoom_by(&mut self, factor: f64, anchor_x: f64, anchor_y: f64) -> f64 {
        if !(factor.is_finite() && factor > 0.0) {
            return self.get_zoom();
        }
        let anchor = Point::new(anchor_x, anchor_y);
        let viewport = &mut self.session.stage.viewport;
        let scene = viewport.stage_to_scene(anchor);
        viewport.zoom = self.session.config.clamp_zoom(viewport.zoom * factor);
        viewport.offset_x = anchor.x - scene.x * viewport.zoom;
        viewport.offset_y = anchor.y - scene.y * viewport.zoom;
        let zoom = viewport.zoom;
        self.session.mark_dirty();
        zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        let current = self.get_zoom();
        let center = self.session.stage.center();
        self.zoom_by(zoom / current, center.x, center.y)
    }

    pub fn zoom_step(&mut self, direction: i32, anchor_x: f64, anchor_y: f64) -> f64 {
        let step = self.session.config.zoom_step;
        let factor = if direction > 0 { step } else if direction < 0 { 1.0 / step } else { 1.0 };
        self.zoom_by(factor, anchor_x, anchor_y)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let viewport = &mut self.session.stage.viewport;
        viewport.offset_x += dx;
        viewport.offset_y += dy;
        self.session.mark_dirty();
    }

    pub fn reset_view(&mut self) {
        self.session.stage.viewport = Default::default();
        self.session.mark_dirty();
    }

    pub fn stage_to_scene(&self, x: f64, y: f64) -> Vec<f64> {
        let p = self.session.stage.viewport.stage_to_scene(Point::new(x, y));
        vec![p.x, p.y]
    }

    pub fn scene_to_stage(&self, x: f64, y: f64) -> Vec<f64> {
        let p = self.session.stage.viewport.scene_to_stage(Point::new(x, y));
        vec![p.x, p.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn editor_with(width: u32, height: u32) -> PhotoEditor {
        let mut editor = PhotoEditor::default();
        editor.load_image_pixels(RgbaImage::new(width, height)).unwrap();
        editor
    }

    #[test]
    fn transforms_require_an_image() {
        let mut editor = PhotoEditor::default();
        assert!(matches!(editor.rotate_cw(), Err(EditorError::NoImage)));
        assert!(matches!(editor.flip_vertical(), Err(EditorError::NoImage)));
        assert!(matches!(editor.resize_image(10.0, 10.0, false), Err(EditorError::NoImage)));
    }

    #[test]
    fn rotation_accumulates_and_recenters() {
        let mut editor = editor_with(400, 200);
        editor.drag_image_to(10.0, 10.0).unwrap();
        editor.rotate_cw().unwrap();
        editor.rotate_cw().unwrap();
        editor.rotate_180().unwrap();
        editor.rotate_ccw().unwrap();
        let image = editor.session.image.as_ref().unwrap();
        assert_eq!(image.placement.rotation, 270.0);
        assert_eq!((image.placement.x, image.placement.y), (400.0, 300.0));
        assert_eq!(editor.history_len(), 5);
    }

    #[test]
    fn double_flip_restores_sign() {
        let mut editor = editor_with(100, 100);
        let before = editor.session.image.as_ref().unwrap().placement.scale_x;
        editor.flip_horizontal().unwrap();
        assert_eq!(editor.session.image.as_ref().unwrap().placement.scale_x, -before);
        editor.flip_horizontal().unwrap();
        assert_eq!(editor.session.image.as_ref().unwrap().placement.scale_x, before);
    }

    #[test]
    fn locked_resize_uses_natural_aspect() {
        let mut editor = editor_with(400, 200);
        editor.resize_image(300.0, 50.0, false).unwrap();
        // width moved 100, height moved 100 on a distorted image: width wins.
        editor.resize_image(400.0, 150.0, true).unwrap();
        let size = editor.session.image.as_ref().unwrap().displayed_size();
        assert_eq!((size.width, size.height), (400.0, 200.0));
        // height moved further: width follows.
        editor.resize_image(410.0, 100.0, true).unwrap();
        let size = editor.session.image.as_ref().unwrap().displayed_size();
        assert_eq!((size.width, size.height), (200.0, 100.0));
    }

    #[test]
    fn resize_keeps_flip_and_rejects_bad_sizes() {
        let mut editor = editor_with(100, 100);
        editor.flip_vertical().unwrap();
        editor.resize_image(50.0, 80.0, false).unwrap();
        let placement = editor.session.image.as_ref().unwrap().placement;
        assert_eq!((placement.scale_x, placement.scale_y), (0.5, -0.8));
        assert!(matches!(editor.resize_image(0.0, 10.0, false), Err(EditorError::InvalidArgument(_))));
        assert!(matches!(editor.resize_image(20_000.0, 10.0, false), Err(EditorError::DimensionsExceedImage { .. })));
    }

    #[test]
    fn transforms_are_rejected_while_cropping() {
        let mut editor = editor_with(400, 400);
        editor.start_crop("free").unwrap();
        assert!(matches!(editor.rotate_cw(), Err(EditorError::InvalidState(_))));
        assert!(matches!(editor.undo(), Err(EditorError::InvalidState(_))));
        assert!(editor.cancel_crop());
        editor.rotate_cw().unwrap();
    }

    #[test]
    fn zoom_keeps_anchor_fixed_and_clamps() {
        let mut editor = PhotoEditor::default();
        let before = editor.stage_to_scene(200.0, 150.0);
        editor.zoom_by(2.0, 200.0, 150.0);
        let after = editor.stage_to_scene(200.0, 150.0);
        assert!((before[0] - after[0]).abs() < 1e-9 && (before[1] - after[1]).abs() < 1e-9);
        assert_eq!(editor.zoom_by(100.0, 0.0, 0.0), 5.0);
        assert_eq!(editor.set_zoom(0.01), 0.1);
        editor.pan_by(10.0, 5.0);
        editor.reset_view();
        assert_eq!(editor.stage_to_scene(3.0, 4.0), vec![3.0, 4.0]);
    }
}
