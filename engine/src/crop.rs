//! Interactive crop: constrained rectangle, overlays and pixel extraction.
//!
//! The resize and drag bound functions are pure; they run on every pointer
//! move and only ever produce a new rectangle.

use std::str::FromStr;

use image::imageops;
use kurbo::{Point, Rect, Size, Vec2};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};
use crate::geometry::rotated_size;
use crate::handles::{self, BoxHit};
use crate::objects::ImageElement;
use crate::scene::EditorSession;
use crate::types::DrawingTool;

/// Movement below this is treated as "edge did not move".
const EDGE_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CropConstraint {
    Free,
    Ratio(f64),
    /// Fixed size in natural image pixels.
    Pixels { width: f64, height: f64 },
}

impl CropConstraint {
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            CropConstraint::Free => None,
            CropConstraint::Ratio(r) => Some(r),
            CropConstraint::Pixels { width, height } => Some(width / height),
        }
    }

    pub fn is_fixed_size(&self) -> bool {
        matches!(self, CropConstraint::Pixels { .. })
    }

    pub fn label(&self) -> String {
        match *self {
            CropConstraint::Free => "free".to_string(),
            CropConstraint::Ratio(r) => format!("{}", r),
            CropConstraint::Pixels { width, height } => format!("{}x{}px", width, height),
        }
    }
}

impl FromStr for CropConstraint {
    type Err = EditorError;

    /// Accepts `free`, `W:H` pairs such as `16:9` and plain decimals.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("free") || s.eq_ignore_ascii_case("none") {
            return Ok(CropConstraint::Free);
        }
        let invalid = || EditorError::InvalidArgument(format!("invalid crop ratio '{}'", s));
        let ratio = match s.split_once(':') {
            Some((w, h)) => {
                let w: f64 = w.trim().parse().map_err(|_| invalid())?;
                let h: f64 = h.trim().parse().map_err(|_| invalid())?;
                if h == 0.0 { return Err(invalid()); }
                w / h
            }
            None => s.parse().map_err(|_| invalid())?,
        };
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(invalid());
        }
        Ok(CropConstraint::Ratio(ratio))
    }
}

/// The four dark regions around the crop rectangle. Together with the
/// rectangle they tile the image bounds exactly.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct CropOverlays {
    pub top: Rect,
    pub right: Rect,
    pub bottom: Rect,
    pub left: Rect,
}

impl CropOverlays {
    pub fn compute(bounds: Rect, rect: Rect) -> CropOverlays {
        CropOverlays {
            top: Rect::new(bounds.x0, bounds.y0, bounds.x1, rect.y0),
            bottom: Rect::new(bounds.x0, rect.y1, bounds.x1, bounds.y1),
            left: Rect::new(bounds.x0, rect.y0, rect.x0, rect.y1),
            right: Rect::new(rect.x1, rect.y0, bounds.x1, rect.y1),
        }
    }

    pub fn regions(&self) -> [Rect; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// Resize bound function.
///
/// Steps run in a fixed order: minimum check, ratio enforcement, clamping to
/// `bounds`, minimum check again. Any minimum violation returns `old`.
/// Under a ratio the side with the larger change drives the other (width on
/// a tie); the edge opposite a moved edge stays put.
pub fn bound_resize(old: Rect, new: Rect, bounds: Rect, ratio: Option<f64>, min: f64) -> Rect {
    let new = new.abs();
    if new.width() < min || new.height() < min {
        return old;
    }

    let anchor_left = !((new.x0 - old.x0).abs() > EDGE_EPSILON && (new.x1 - old.x1).abs() <= EDGE_EPSILON);
    let anchor_top = !((new.y0 - old.y0).abs() > EDGE_EPSILON && (new.y1 - old.y1).abs() <= EDGE_EPSILON);

    let rect = match ratio {
        None => Rect::new(
            new.x0.max(bounds.x0),
            new.y0.max(bounds.y0),
            new.x1.min(bounds.x1),
            new.y1.min(bounds.y1),
        ),
        Some(r) => {
            let dw = (new.width() - old.width()).abs();
            let dh = (new.height() - old.height()).abs();
            let (mut w, mut h) = if dw >= dh { (new.width(), new.width() / r) } else { (new.height() * r, new.height()) };

            let ax = if anchor_left { new.x0.max(bounds.x0) } else { new.x1.min(bounds.x1) };
            let ay = if anchor_top { new.y0.max(bounds.y0) } else { new.y1.min(bounds.y1) };
            let avail_w = if anchor_left { bounds.x1 - ax } else { ax - bounds.x0 };
            let avail_h = if anchor_top { bounds.y1 - ay } else { ay - bounds.y0 };
            if w > avail_w || h > avail_h {
                w = avail_w.min(avail_h * r);
                h = w / r;
            }
            let x0 = if anchor_left { ax } else { ax - w };
            let y0 = if anchor_top { ay } else { ay - h };
            Rect::new(x0, y0, x0 + w, y0 + h)
        }
    };

    if rect.width() < min || rect.height() < min {
        return old;
    }
    rect
}

pub fn bound_drag(size: Size, pos: Point, bounds: Rect) -> Point {
    Point::new(
        pos.x.min(bounds.x1 - size.width).max(bounds.x0),
        pos.y.min(bounds.y1 - size.height).max(bounds.y0),
    )
}

fn fit_ratio(area: Rect, ratio: f64) -> Rect {
    let (w, h) = if area.width() / area.height() > ratio {
        (area.height() * ratio, area.height())
    } else {
        (area.width(), area.width() / ratio)
    };
    Rect::from_center_size(area.center(), (w, h))
}

#[derive(Clone, Copy, Debug)]
struct PointerDrag {
    hit: BoxHit,
    start: Point,
    start_rect: Rect,
}

#[derive(Clone, Debug)]
pub struct CropSession {
    constraint: CropConstraint,
    rect: Rect,
    bounds: Rect,
    overlays: CropOverlays,
    prior_tool: Option<DrawingTool>,
    pointer: Option<PointerDrag>,
}

impl CropSession {
    pub fn constraint(&self) -> CropConstraint { self.constraint }
    pub fn rect(&self) -> Rect { self.rect }
    pub fn bounds(&self) -> Rect { self.bounds }
    pub fn overlays(&self) -> &CropOverlays { &self.overlays }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
        self.overlays = CropOverlays::compute(self.bounds, rect);
    }
}

#[derive(Default)]
pub struct CropController {
    active: Option<CropSession>,
}

impl CropController {
    pub fn new() -> Self {
        CropController::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<&CropSession> {
        self.active.as_ref()
    }

    fn require_active(&mut self) -> Result<&mut CropSession> {
        self.active.as_mut().ok_or(EditorError::InvalidState("no crop session is active"))
    }

    pub fn start(&mut self, session: &mut EditorSession, constraint: CropConstraint) -> Result<()> {
        if self.active.is_some() {
            return Err(EditorError::InvalidState("a crop session is already active"));
        }
        let image = session.require_image()?;
        let bounds = image.client_rect();
        let rect = initial_rect(image, bounds, constraint, session.config.initial_crop_fraction)?;

        let prior_tool = session.tool.take();
        session.interaction_locked = true;
        session.refresh_draggable();
        session.mark_dirty();

        log::info!("crop started ({}), rect {:?}", constraint.label(), rect);
        self.active = Some(CropSession {
            constraint,
            rect,
            bounds,
            overlays: CropOverlays::compute(bounds, rect),
            prior_tool,
            pointer: None,
        });
        Ok(())
    }

    pub fn resize(&mut self, session: &mut EditorSession, proposed: Rect) -> Result<Rect> {
        let min = session.config.crop_min_size;
        let crop = self.require_active()?;
        let rect = if crop.constraint.is_fixed_size() {
            crop.rect
        } else {
            bound_resize(crop.rect, proposed, crop.bounds, crop.constraint.ratio(), min)
        };
        crop.set_rect(rect);
        session.mark_dirty();
        Ok(rect)
    }

    pub fn move_to(&mut self, session: &mut EditorSession, pos: Point) -> Result<Rect> {
        let crop = self.require_active()?;
        let origin = bound_drag(crop.rect.size(), pos, crop.bounds);
        let rect = Rect::from_origin_size(origin, crop.rect.size());
        crop.set_rect(rect);
        session.mark_dirty();
        Ok(rect)
    }

    /// Height follows the current width under the new ratio; if that
    /// overflows the image the width shrinks instead. A side that ends up
    /// below the minimum grows back to it, and a ratio that cannot fit the
    /// minimum inside the image is rejected. Position is kept when it still
    /// fits.
    pub fn change_ratio(&mut self, session: &mut EditorSession, constraint: CropConstraint) -> Result<Rect> {
        let min = session.config.crop_min_size;
        let crop = self.require_active()?;
        let bounds = crop.bounds;
        let mut size = crop.rect.size();
        if let Some(r) = constraint.ratio() {
            size.height = size.width / r;
            if size.height > bounds.height() {
                size.height = bounds.height();
                size.width = size.height * r;
            }
            if size.width > bounds.width() {
                size.width = bounds.width();
                size.height = size.width / r;
            }
            if size.width < min || size.height < min {
                let grow = (min / size.width).max(min / size.height);
                size = Size::new(size.width * grow, size.height * grow);
            }
            if size.width > bounds.width() + EDGE_EPSILON || size.height > bounds.height() + EDGE_EPSILON {
                return Err(EditorError::InvalidArgument(format!(
                    "crop ratio {} cannot fit a {} unit crop inside the image",
                    constraint.label(),
                    min
                )));
            }
        }
        let origin = bound_drag(size, crop.rect.origin(), bounds);
        crop.constraint = constraint;
        crop.set_rect(Rect::from_origin_size(origin, size));
        session.mark_dirty();
        log::debug!("crop ratio changed to {}", constraint.label());
        Ok(crop.rect)
    }

    /// Cuts the rectangle out of the original raster and installs the result
    /// as the new image. The caller records the canvas snapshot.
    pub fn apply(&mut self, session: &mut EditorSession) -> Result<()> {
        let crop = self.active.take().ok_or(EditorError::InvalidState("no crop session is active"))?;
        let result = extract(session, crop.rect);
        release(session, &crop);
        let element = result?;
        log::info!("crop applied, new image {}x{}", element.natural_width, element.natural_height);
        session.replace_image(element);
        Ok(())
    }

    pub fn cancel(&mut self, session: &mut EditorSession) -> bool {
        match self.active.take() {
            Some(crop) => {
                release(session, &crop);
                log::debug!("crop cancelled");
                true
            }
            None => false,
        }
    }

    pub fn pointer_down(&mut self, point: Point, zoom: f64) -> Option<BoxHit> {
        let crop = self.active.as_mut()?;
        let hit = handles::hit_test(crop.rect, point, zoom)?;
        crop.pointer = Some(PointerDrag { hit, start: point, start_rect: crop.rect });
        Some(hit)
    }

    pub fn pointer_move(&mut self, session: &mut EditorSession, point: Point) -> Result<Option<Rect>> {
        let Some(drag) = self.active.as_ref().and_then(|c| c.pointer) else { return Ok(None) };
        let delta: Vec2 = point - drag.start;
        let rect = match drag.hit {
            BoxHit::Handle(handle) => self.resize(session, handles::drag_edges(drag.start_rect, handle, delta))?,
            BoxHit::Body => self.move_to(session, drag.start_rect.origin() + delta)?,
        };
        Ok(Some(rect))
    }

    pub fn pointer_up(&mut self) -> bool {
        self.active.as_mut().and_then(|c| c.pointer.take()).is_some()
    }
}

fn initial_rect(image: &ImageElement, bounds: Rect, constraint: CropConstraint, fraction: f64) -> Result<Rect> {
    let area = Rect::from_center_size(bounds.center(), (bounds.width() * fraction, bounds.height() * fraction));
    match constraint {
        CropConstraint::Free => Ok(area),
        CropConstraint::Ratio(r) => Ok(fit_ratio(area, r)),
        CropConstraint::Pixels { width, height } => {
            if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
                return Err(EditorError::InvalidArgument(format!("crop size {}x{} must be positive", width, height)));
            }
            let view = image.placement.rect_to_view_space(Rect::new(0.0, 0.0, width, height)).size();
            if view.width > bounds.width() + EDGE_EPSILON || view.height > bounds.height() + EDGE_EPSILON {
                let available = rotated_size(image.natural_size(), image.placement.rotation);
                return Err(EditorError::DimensionsExceedImage {
                    requested_width: width,
                    requested_height: height,
                    available_width: available.width.round(),
                    available_height: available.height.round(),
                });
            }
            Ok(Rect::from_center_size(bounds.center(), view))
        }
    }
}

/// Maps `rect` to natural pixels and builds the cropped element, keeping the
/// orientation and filters of the current one.
fn extract(session: &mut EditorSession, rect: Rect) -> Result<ImageElement> {
    let image = session.require_image()?;
    let source = session.images.get(image.source).ok_or(EditorError::NoImage)?;
    let natural = image.placement.rect_to_image_space(rect);
    let (nw, nh) = (image.natural_width as f64, image.natural_height as f64);
    let x0 = natural.x0.round().clamp(0.0, nw);
    let y0 = natural.y0.round().clamp(0.0, nh);
    let x1 = natural.x1.round().clamp(0.0, nw);
    let y1 = natural.y1.round().clamp(0.0, nh);
    let (w, h) = ((x1 - x0) as u32, (y1 - y0) as u32);
    if w == 0 || h == 0 {
        return Err(EditorError::InvalidState("crop rectangle does not cover any pixels"));
    }
    log::debug!("extracting {}x{} at ({}, {}) from {}x{}", w, h, x0, y0, nw, nh);
    let pixels = imageops::crop_imm(&*source, x0 as u32, y0 as u32, w, h).to_image();

    let (rotation, flip_x, flip_y, filters) =
        (image.placement.rotation, image.placement.scale_x, image.placement.scale_y, image.filters.clone());
    let key = session.images.insert(pixels);
    let id = session.next_id();
    let mut element = ImageElement::new(id, key, w, h);
    element.placement.rotation = rotation;
    element.placement.scale_x = flip_x.signum();
    element.placement.scale_y = flip_y.signum();
    element.filters = filters;
    session.fit_to_stage(&mut element);
    Ok(element)
}

fn release(session: &mut EditorSession, crop: &CropSession) {
    session.interaction_locked = false;
    session.tool = crop.prior_tool;
    session.refresh_draggable();
    session.mark_dirty();
}

fn rect_json(rect: Rect) -> serde_json::Value {
    serde_json::json!({ "x": rect.x0, "y": rect.y0, "width": rect.width(), "height": rect.height() })
}

#[wasm_bindgen]
impl PhotoEditor {
    pub fn start_crop(&mut self, ratio: &str) -> std::result::Result<(), EditorError> {
        let constraint: CropConstraint = ratio.parse()?;
        self.end_gesture();
        self.crop.start(&mut self.session, constraint)
    }

    pub fn start_crop_with_custom_dimensions(&mut self, width: f64, height: f64) -> std::result::Result<(), EditorError> {
        self.end_gesture();
        self.crop.start(&mut self.session, CropConstraint::Pixels { width, height })
    }

    pub fn change_crop_ratio(&mut self, ratio: &str) -> std::result::Result<(), EditorError> {
        let constraint: CropConstraint = ratio.parse()?;
        self.crop.change_ratio(&mut self.session, constraint).map(|_| ())
    }

    pub fn apply_crop(&mut self) -> std::result::Result<(), EditorError> {
        self.crop.apply(&mut self.session)?;
        self.snapshot_canvas()
    }

    pub fn cancel_crop(&mut self) -> bool {
        self.crop.cancel(&mut self.session)
    }

    pub fn is_cropping(&self) -> bool {
        self.crop.is_active()
    }

    pub fn resize_crop(&mut self, x: f64, y: f64, width: f64, height: f64) -> std::result::Result<String, EditorError> {
        let rect = self.crop.resize(&mut self.session, Rect::new(x, y, x + width, y + height))?;
        Ok(rect_json(rect).to_string())
    }

    pub fn move_crop(&mut self, x: f64, y: f64) -> std::result::Result<String, EditorError> {
        let rect = self.crop.move_to(&mut self.session, Point::new(x, y))?;
        Ok(rect_json(rect).to_string())
    }

    /// Pointer press in stage coordinates. Returns the grabbed part, or an
    /// empty string when the press missed the crop box.
    pub fn crop_pointer_down(&mut self, x: f64, y: f64) -> String {
        let point = self.session.stage.viewport.stage_to_scene(Point::new(x, y));
        let zoom = self.session.stage.viewport.zoom;
        self.crop.pointer_down(point, zoom).map(|hit| hit.name().to_string()).unwrap_or_default()
    }

    pub fn crop_pointer_move(&mut self, x: f64, y: f64) -> std::result::Result<bool, EditorError> {
        let point = self.session.stage.viewport.stage_to_scene(Point::new(x, y));
        Ok(self.crop.pointer_move(&mut self.session, point)?.is_some())
    }

    pub fn crop_pointer_up(&mut self) -> bool {
        self.crop.pointer_up()
    }

    pub fn crop_rect(&self) -> String {
        match self.crop.session() {
            Some(crop) => rect_json(crop.rect()).to_string(),
            None => "null".to_string(),
        }
    }

    pub fn crop_overlays(&self) -> String {
        match self.crop.session() {
            Some(crop) => {
                let o = crop.overlays();
                serde_json::json!({
                    "top": rect_json(o.top),
                    "right": rect_json(o.right),
                    "bottom": rect_json(o.bottom),
                    "left": rect_json(o.left),
                })
                .to_string()
            }
            None => "null".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use image::{Rgba, RgbaImage};

    const MIN: f64 = 50.0;

    fn bounds() -> Rect {
        Rect::new(100.0, 100.0, 700.0, 500.0)
    }

    fn session_with(width: u32, height: u32, scale: f64) -> EditorSession {
        let mut session = EditorSession::new(EditorConfig::default());
        let pixels = RgbaImage::from_fn(width, height, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]));
        let key = session.images.insert(pixels);
        let id = session.next_id();
        let mut element = ImageElement::new(id, key, width, height);
        element.placement.scale_x = scale;
        element.placement.scale_y = scale;
        session.center(&mut element);
        session.replace_image(element);
        session
    }

    #[test]
    fn ratio_strings_parse() {
        assert_eq!("free".parse::<CropConstraint>().unwrap(), CropConstraint::Free);
        assert_eq!("16:9".parse::<CropConstraint>().unwrap(), CropConstraint::Ratio(16.0 / 9.0));
        assert_eq!("1.5".parse::<CropConstraint>().unwrap(), CropConstraint::Ratio(1.5));
        assert!("4:0".parse::<CropConstraint>().is_err());
        assert!("wide".parse::<CropConstraint>().is_err());
        assert!("-2".parse::<CropConstraint>().is_err());
    }

    #[test]
    fn resize_below_minimum_reverts() {
        let old = Rect::new(200.0, 200.0, 400.0, 400.0);
        let new = Rect::new(200.0, 200.0, 240.0, 400.0);
        assert_eq!(bound_resize(old, new, bounds(), None, MIN), old);
    }

    #[test]
    fn free_resize_clamps_each_edge() {
        let old = Rect::new(200.0, 200.0, 400.0, 400.0);
        let new = Rect::new(50.0, 200.0, 400.0, 650.0);
        assert_eq!(bound_resize(old, new, bounds(), None, MIN), Rect::new(100.0, 200.0, 400.0, 500.0));
    }

    #[test]
    fn ratio_follows_larger_change() {
        let old = Rect::new(200.0, 200.0, 400.0, 300.0);
        // width grew by 100, height by 10: height is derived.
        let out = bound_resize(old, Rect::new(200.0, 200.0, 500.0, 310.0), bounds(), Some(2.0), MIN);
        assert_eq!(out, Rect::new(200.0, 200.0, 500.0, 350.0));
        // height grew more: width is derived.
        let out = bound_resize(old, Rect::new(200.0, 200.0, 410.0, 380.0), bounds(), Some(2.0), MIN);
        assert_eq!(out, Rect::new(200.0, 200.0, 560.0, 380.0));
    }

    #[test]
    fn ratio_tie_prefers_width() {
        let old = Rect::new(200.0, 200.0, 300.0, 300.0);
        let out = bound_resize(old, Rect::new(200.0, 200.0, 320.0, 320.0), bounds(), Some(1.5), MIN);
        assert_eq!(out, Rect::new(200.0, 200.0, 320.0, 280.0));
    }

    #[test]
    fn moved_left_edge_anchors_right() {
        let old = Rect::new(300.0, 200.0, 500.0, 300.0);
        let out = bound_resize(old, Rect::new(250.0, 200.0, 500.0, 300.0), bounds(), Some(2.0), MIN);
        assert_eq!(out, Rect::new(250.0, 200.0, 500.0, 325.0));
        let out = bound_resize(old, Rect::new(300.0, 150.0, 500.0, 300.0), bounds(), Some(2.0), MIN);
        assert_eq!(out, Rect::new(300.0, 150.0, 600.0, 300.0));
    }

    #[test]
    fn ratio_clamp_shrinks_proportionally() {
        let old = Rect::new(400.0, 300.0, 600.0, 400.0);
        // pulled far past the bottom-right corner.
        let out = bound_resize(old, Rect::new(400.0, 300.0, 900.0, 700.0), bounds(), Some(2.0), MIN);
        assert_eq!(out, Rect::new(400.0, 300.0, 700.0, 450.0));
        assert!(out.x1 <= bounds().x1 && out.y1 <= bounds().y1);
    }

    #[test]
    fn ratio_holds_for_any_resize_sequence() {
        let ratio = 4.0 / 3.0;
        let b = bounds();
        let mut rect = fit_ratio(Rect::from_center_size(b.center(), (480.0, 320.0)), ratio);
        let mut seed = 12345u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((seed >> 8) % 1000) as f64 / 1000.0 - 0.5
        };
        for step in 0..500 {
            let handle = crate::types::HandleType::ALL[step % 8];
            let delta = Vec2::new(next() * 300.0, next() * 300.0);
            rect = bound_resize(rect, handles::drag_edges(rect, handle, delta), b, Some(ratio), MIN);
            assert!((rect.width() / rect.height() - ratio).abs() < 1e-6, "step {}: {:?}", step, rect);
            assert!(rect.x0 >= b.x0 - 1e-9 && rect.y0 >= b.y0 - 1e-9);
            assert!(rect.x1 <= b.x1 + 1e-9 && rect.y1 <= b.y1 + 1e-9);
            assert!(rect.width() >= MIN - 1e-9);
        }
    }

    #[test]
    fn drag_stays_inside_bounds() {
        let size = Size::new(200.0, 100.0);
        assert_eq!(bound_drag(size, Point::new(-50.0, 450.0), bounds()), Point::new(100.0, 400.0));
        assert_eq!(bound_drag(size, Point::new(650.0, 90.0), bounds()), Point::new(500.0, 100.0));
        assert_eq!(bound_drag(size, Point::new(300.0, 200.0), bounds()), Point::new(300.0, 200.0));
    }

    #[test]
    fn overlays_tile_the_bounds() {
        let b = bounds();
        let rect = Rect::new(250.0, 180.0, 420.0, 330.0);
        let o = CropOverlays::compute(b, rect);
        let area: f64 = o.regions().iter().map(|r| r.area()).sum::<f64>() + rect.area();
        assert_eq!(area, b.area());
        assert_eq!(o.top.y1, rect.y0);
        assert_eq!(o.bottom.y0, rect.y1);
        assert_eq!(o.left.x1, rect.x0);
        assert_eq!(o.right.x0, rect.x1);
        assert_eq!((o.left.y0, o.left.y1), (rect.y0, rect.y1));
        for region in o.regions() {
            assert_eq!(region.intersect(rect).area(), 0.0);
        }
    }

    #[test]
    fn start_requires_image_and_single_session() {
        let mut controller = CropController::new();
        let mut empty = EditorSession::new(EditorConfig::default());
        assert!(matches!(controller.start(&mut empty, CropConstraint::Free), Err(EditorError::NoImage)));

        let mut session = session_with(1000, 1000, 0.5);
        controller.start(&mut session, CropConstraint::Free).unwrap();
        assert!(matches!(controller.start(&mut session, CropConstraint::Free), Err(EditorError::InvalidState(_))));
        let rect = controller.session().unwrap().rect();
        assert_eq!(rect, Rect::new(200.0, 100.0, 600.0, 500.0));
    }

    #[test]
    fn start_disables_dragging_and_tool_until_cancel() {
        let mut controller = CropController::new();
        let mut session = session_with(400, 400, 1.0);
        session.set_tool(Some(DrawingTool::Rectangle));
        controller.start(&mut session, "1:1".parse().unwrap()).unwrap();
        assert_eq!(session.tool, None);
        assert!(!session.image.as_ref().unwrap().draggable);
        assert!(controller.cancel(&mut session));
        assert_eq!(session.tool, Some(DrawingTool::Rectangle));
        assert!(!controller.cancel(&mut session));
    }

    #[test]
    fn fixed_pixels_convert_to_view_units() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 800, 0.5);
        controller.start(&mut session, CropConstraint::Pixels { width: 300.0, height: 200.0 }).unwrap();
        let rect = controller.session().unwrap().rect();
        assert_eq!(rect.size(), Size::new(150.0, 100.0));
        // fixed size cannot be resized.
        let after = controller.resize(&mut session, rect.inflate(20.0, 20.0)).unwrap();
        assert_eq!(after, rect);
    }

    #[test]
    fn fixed_pixels_larger_than_image_are_rejected() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 800, 0.5);
        let err = controller.start(&mut session, CropConstraint::Pixels { width: 1200.0, height: 100.0 }).unwrap_err();
        assert!(matches!(err, EditorError::DimensionsExceedImage { .. }));
        assert!(!controller.is_active());
        assert!(session.image.as_ref().unwrap().draggable);
    }

    #[test]
    fn change_ratio_requires_session_and_keeps_position() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 1000, 0.5);
        assert!(matches!(controller.change_ratio(&mut session, CropConstraint::Ratio(1.0)), Err(EditorError::InvalidState(_))));

        controller.start(&mut session, CropConstraint::Free).unwrap();
        controller.resize(&mut session, Rect::new(200.0, 100.0, 400.0, 300.0)).unwrap();
        let rect = controller.change_ratio(&mut session, CropConstraint::Ratio(2.0)).unwrap();
        assert_eq!(rect, Rect::new(200.0, 100.0, 400.0, 200.0));
        // a tall ratio on a wide rectangle overflows: width shrinks instead.
        controller.resize(&mut session, Rect::new(150.0, 100.0, 650.0, 200.0)).unwrap();
        let rect = controller.change_ratio(&mut session, CropConstraint::Ratio(0.5)).unwrap();
        assert_eq!(rect.size(), Size::new(250.0, 500.0));
        assert_eq!(rect.origin(), Point::new(150.0, 50.0));
    }

    #[test]
    fn extreme_ratio_keeps_minimum_size() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 1000, 0.5);
        controller.start(&mut session, CropConstraint::Free).unwrap();

        let rect = controller.change_ratio(&mut session, CropConstraint::Ratio(10.0)).unwrap();
        assert_eq!(rect, Rect::new(150.0, 100.0, 650.0, 150.0));

        // 16:1 needs 800 units of width for a 50 unit height.
        let err = controller.change_ratio(&mut session, "16:1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, EditorError::InvalidArgument(_)));
        let crop = controller.session().unwrap();
        assert_eq!(crop.constraint(), CropConstraint::Ratio(10.0));
        assert_eq!(crop.rect(), rect);
    }

    #[test]
    fn apply_extracts_natural_pixels() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 1000, 0.5);
        assert_eq!(session.image.as_ref().unwrap().client_rect(), Rect::new(150.0, 50.0, 650.0, 550.0));

        controller.start(&mut session, CropConstraint::Free).unwrap();
        controller.resize(&mut session, Rect::new(200.0, 100.0, 400.0, 300.0)).unwrap();
        controller.apply(&mut session).unwrap();

        assert!(!controller.is_active());
        let image = session.image.as_ref().unwrap();
        assert_eq!((image.natural_width, image.natural_height), (400, 400));
        let pixels = session.images.get(image.source).unwrap();
        assert_eq!(pixels.get_pixel(0, 0), &Rgba([100, 100, 0, 255]));
        assert_eq!(pixels.get_pixel(399, 399), &Rgba([(499 % 256) as u8, (499 % 256) as u8, 0, 255]));
        assert!(image.draggable);
    }

    #[test]
    fn apply_without_session_is_invalid() {
        let mut controller = CropController::new();
        let mut session = session_with(100, 100, 1.0);
        assert!(matches!(controller.apply(&mut session), Err(EditorError::InvalidState(_))));
    }

    #[test]
    fn pointer_drag_moves_and_resizes() {
        let mut controller = CropController::new();
        let mut session = session_with(1000, 1000, 0.5);
        controller.start(&mut session, CropConstraint::Free).unwrap();
        // body drag past the right edge is clamped.
        assert_eq!(controller.pointer_down(Point::new(400.0, 300.0), 1.0), Some(BoxHit::Body));
        let rect = controller.pointer_move(&mut session, Point::new(900.0, 300.0)).unwrap().unwrap();
        assert_eq!(rect, Rect::new(250.0, 100.0, 650.0, 500.0));
        assert!(controller.pointer_up());

        assert_eq!(controller.pointer_down(Point::new(250.0, 300.0), 1.0), Some(BoxHit::Handle(crate::types::HandleType::Left)));
        let rect = controller.pointer_move(&mut session, Point::new(300.0, 300.0)).unwrap().unwrap();
        assert_eq!(rect, Rect::new(300.0, 100.0, 650.0, 500.0));
    }
}
