use std::f64::consts::PI;
use std::rc::Rc;

use image::RgbaImage;
use kurbo::{Affine, Point, Rect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

use crate::engine::PhotoEditor;
use crate::handles::{handle_position, HANDLE_SIZE};
use crate::shapes::{arrow_head, flat_points, radial_vertices, DrawingShape, Geometry};
use crate::types::HandleType;

const HANDLE_STROKE: &str = "#4facfe";
const CROP_SHADE: &str = "rgba(0,0,0,0.5)";

/// Offscreen canvases reused between frames: the filtered image, keyed by
/// the pixel buffer it was uploaded from, and the drawing layer.
#[derive(Default)]
pub struct RenderSurfaces {
    image: Option<(Rc<RgbaImage>, HtmlCanvasElement)>,
    drawing: Option<HtmlCanvasElement>,
}

fn scratch_canvas(width: u32, height: u32) -> Result<HtmlCanvasElement, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas = document.create_element("canvas")?.dyn_into::<HtmlCanvasElement>()?;
    canvas.set_width(width);
    canvas.set_height(height);
    Ok(canvas)
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

fn apply_affine(ctx: &CanvasRenderingContext2d, affine: Affine) -> Result<(), JsValue> {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    ctx.transform(a, b, c, d, e, f)
}

impl RenderSurfaces {
    fn image_canvas(&mut self, pixels: Rc<RgbaImage>) -> Result<&HtmlCanvasElement, JsValue> {
        let stale = !matches!(&self.image, Some((uploaded, _)) if Rc::ptr_eq(uploaded, &pixels));
        if stale {
            let canvas = scratch_canvas(pixels.width(), pixels.height())?;
            let data = ImageData::new_with_u8_clamped_array_and_sh(Clamped(pixels.as_raw()), pixels.width(), pixels.height())?;
            context_2d(&canvas)?.put_image_data(&data, 0.0, 0.0)?;
            self.image = Some((pixels, canvas));
        }
        self.image
            .as_ref()
            .map(|(_, canvas)| canvas)
            .ok_or_else(|| JsValue::from_str("image surface missing"))
    }

    fn drawing_canvas(&mut self, width: u32, height: u32) -> Result<&HtmlCanvasElement, JsValue> {
        let resized = !matches!(&self.drawing, Some(c) if c.width() == width && c.height() == height);
        if resized {
            self.drawing = Some(scratch_canvas(width, height)?);
        }
        self.drawing.as_ref().ok_or_else(|| JsValue::from_str("drawing surface missing"))
    }
}

#[wasm_bindgen]
impl PhotoEditor {
    pub fn render(&mut self, ctx: &CanvasRenderingContext2d) -> Result<(), JsValue> {
        let canvas = ctx.canvas().ok_or_else(|| JsValue::from_str("context has no canvas"))?;
        let (width, height) = (canvas.width(), canvas.height());
        let viewport = self.session.stage.viewport;
        let zoom = viewport.zoom;

        ctx.save();
        ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
        ctx.clear_rect(0.0, 0.0, width as f64, height as f64);
        ctx.set_transform(zoom, 0.0, 0.0, zoom, viewport.offset_x, viewport.offset_y)?;

        if let Some(image) = self.session.image.as_mut() {
            if let Some(pixels) = image.filtered_pixels(&self.session.images) {
                let surface = self.surfaces.image_canvas(pixels)?;
                ctx.save();
                apply_affine(ctx, image.placement.affine())?;
                ctx.draw_image_with_html_canvas_element(surface, 0.0, 0.0)?;
                ctx.restore();
            }
        }

        if !self.session.drawing.is_empty() {
            let layer = self.surfaces.drawing_canvas(width, height)?;
            let lctx = context_2d(layer)?;
            lctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
            lctx.clear_rect(0.0, 0.0, width as f64, height as f64);
            lctx.set_transform(zoom, 0.0, 0.0, zoom, viewport.offset_x, viewport.offset_y)?;
            for shape in self.session.drawing.shapes() {
                render_shape(&lctx, shape)?;
            }
            ctx.save();
            ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
            ctx.draw_image_with_html_canvas_element(layer, 0.0, 0.0)?;
            ctx.restore();
        }

        self.render_transformer(ctx, zoom)?;
        self.render_crop_overlay(ctx, zoom)?;
        ctx.restore();
        Ok(())
    }
}

impl PhotoEditor {
    fn render_transformer(&self, ctx: &CanvasRenderingContext2d, zoom: f64) -> Result<(), JsValue> {
        let (Some(handles), Some(image)) = (&self.session.transformer, &self.session.image) else { return Ok(()) };
        if !handles.visible || handles.attached_to != Some(image.id) {
            return Ok(());
        }
        let affine = image.placement.affine();
        let local = Rect::from_origin_size(Point::ZERO, image.natural_size());
        let corners = [
            Point::new(local.x0, local.y0),
            Point::new(local.x1, local.y0),
            Point::new(local.x1, local.y1),
            Point::new(local.x0, local.y1),
        ]
        .map(|p| affine * p);

        ctx.save();
        ctx.set_stroke_style_str(HANDLE_STROKE);
        ctx.set_line_width(1.5 / zoom);
        ctx.begin_path();
        for (i, p) in corners.iter().enumerate() {
            if i == 0 { ctx.move_to(p.x, p.y); } else { ctx.line_to(p.x, p.y); }
        }
        ctx.close_path();
        ctx.stroke();

        ctx.set_fill_style_str("#ffffff");
        ctx.set_line_width(1.0 / zoom);
        let size = HANDLE_SIZE / zoom;
        for handle in HandleType::ALL {
            let p = affine * handle_position(local, handle);
            ctx.begin_path();
            ctx.rect(p.x - size / 2.0, p.y - size / 2.0, size, size);
            ctx.fill();
            ctx.stroke();
        }
        ctx.restore();
        Ok(())
    }

    fn render_crop_overlay(&self, ctx: &CanvasRenderingContext2d, zoom: f64) -> Result<(), JsValue> {
        let Some(crop) = self.crop.session() else { return Ok(()) };
        let rect = crop.rect();
        ctx.save();
        ctx.set_fill_style_str(CROP_SHADE);
        for region in crop.overlays().regions() {
            if region.area() > 0.0 {
                ctx.fill_rect(region.x0, region.y0, region.width(), region.height());
            }
        }

        let dash = js_sys::Array::new();
        dash.push(&JsValue::from_f64(5.0 / zoom));
        dash.push(&JsValue::from_f64(5.0 / zoom));
        ctx.set_line_dash(&dash)?;
        ctx.set_stroke_style_str("#ffffff");
        ctx.set_line_width(2.0 / zoom);
        ctx.stroke_rect(rect.x0, rect.y0, rect.width(), rect.height());
        ctx.set_line_dash(&js_sys::Array::new())?;

        if !crop.constraint().is_fixed_size() {
            let size = HANDLE_SIZE / zoom;
            ctx.set_fill_style_str("#ffffff");
            ctx.set_stroke_style_str(HANDLE_STROKE);
            ctx.set_line_width(1.0 / zoom);
            for handle in HandleType::ALL {
                let p = handle_position(rect, handle);
                ctx.begin_path();
                ctx.rect(p.x - size / 2.0, p.y - size / 2.0, size, size);
                ctx.fill();
                ctx.stroke();
            }
        }
        ctx.restore();
        Ok(())
    }
}

fn trace_polygon(ctx: &CanvasRenderingContext2d, points: impl IntoIterator<Item = Point>) {
    ctx.begin_path();
    for (i, p) in points.into_iter().enumerate() {
        if i == 0 { ctx.move_to(p.x, p.y); } else { ctx.line_to(p.x, p.y); }
    }
    ctx.close_path();
}

fn trace_line(ctx: &CanvasRenderingContext2d, points: &[f64], tension: f64) {
    let pts: Vec<Point> = flat_points(points).collect();
    let Some(first) = pts.first() else { return };
    ctx.begin_path();
    ctx.move_to(first.x, first.y);
    if tension > 0.0 && pts.len() > 2 {
        for pair in pts.windows(2).skip(1) {
            let mid = pair[0].midpoint(pair[1]);
            ctx.quadratic_curve_to(pair[0].x, pair[0].y, mid.x, mid.y);
        }
        if let Some(last) = pts.last() {
            ctx.line_to(last.x, last.y);
        }
    } else {
        for p in &pts[1..] {
            ctx.line_to(p.x, p.y);
        }
    }
}

fn trace_round_rect(ctx: &CanvasRenderingContext2d, width: f64, height: f64, radius: f64) -> Result<(), JsValue> {
    let r = radius.min(width.abs() / 2.0).min(height.abs() / 2.0);
    ctx.begin_path();
    if r <= 0.0 {
        ctx.rect(0.0, 0.0, width, height);
        return Ok(());
    }
    ctx.move_to(r, 0.0);
    ctx.line_to(width - r, 0.0);
    ctx.arc_to(width, 0.0, width, r, r)?;
    ctx.line_to(width, height - r);
    ctx.arc_to(width, height, width - r, height, r)?;
    ctx.line_to(r, height);
    ctx.arc_to(0.0, height, 0.0, height - r, r)?;
    ctx.line_to(0.0, r);
    ctx.arc_to(0.0, 0.0, r, 0.0, r)?;
    ctx.close_path();
    Ok(())
}

fn render_shape(ctx: &CanvasRenderingContext2d, shape: &DrawingShape) -> Result<(), JsValue> {
    if !shape.is_renderable() {
        return Ok(());
    }
    let style = &shape.style;
    ctx.save();
    apply_affine(ctx, shape.placement.affine())?;
    ctx.set_global_alpha(style.opacity);
    ctx.set_global_composite_operation(style.composite.canvas_name())?;
    ctx.set_stroke_style_str(&style.stroke);
    ctx.set_line_width(style.stroke_width);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    if let Some(fill) = &style.fill {
        ctx.set_fill_style_str(fill);
    }
    let paint = |ctx: &CanvasRenderingContext2d| {
        if style.fill.is_some() { ctx.fill(); }
        if style.stroke_width > 0.0 { ctx.stroke(); }
    };

    match &shape.geometry {
        Geometry::Line { points, tension, closed } => {
            trace_line(ctx, points, *tension);
            if *closed { ctx.close_path(); }
            paint(ctx);
        }
        Geometry::Text { text, font_size, font_family } => {
            ctx.set_font(&format!("{}px {}", font_size, font_family));
            ctx.set_text_baseline("top");
            ctx.set_fill_style_str(style.fill.as_deref().unwrap_or(&style.stroke));
            for (i, line) in text.lines().enumerate() {
                ctx.fill_text(line, 0.0, i as f64 * font_size * 1.2)?;
            }
        }
        Geometry::Rect { width, height, corner_radius } => {
            trace_round_rect(ctx, *width, *height, *corner_radius)?;
            paint(ctx);
        }
        Geometry::Ellipse { radius_x, radius_y } => {
            ctx.begin_path();
            ctx.ellipse(0.0, 0.0, radius_x.abs(), radius_y.abs(), 0.0, 0.0, 2.0 * PI)?;
            paint(ctx);
        }
        Geometry::Arrow { points, pointer_length, pointer_width } => {
            trace_line(ctx, points, 0.0);
            ctx.stroke();
            if let Some(head) = arrow_head(points, *pointer_length, *pointer_width) {
                trace_polygon(ctx, head);
                ctx.set_fill_style_str(&style.stroke);
                ctx.fill();
            }
        }
        Geometry::Star { num_points, inner_radius, outer_radius } => {
            trace_polygon(ctx, radial_vertices(*num_points, *outer_radius, Some(*inner_radius)));
            paint(ctx);
        }
        Geometry::Polygon { sides, radius } => {
            trace_polygon(ctx, radial_vertices(*sides, *radius, None));
            paint(ctx);
        }
        Geometry::Unsupported => {}
    }
    ctx.restore();
    Ok(())
}
