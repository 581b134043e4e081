//! Software rasterization of the scene for export. Only content is drawn:
//! transform handles and crop overlays never reach the output.

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::RgbaImage;
use kurbo::{Affine, Point, Rect};
use tiny_skia::{
    BlendMode, Color, ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};

use crate::error::{EditorError, Result};
use crate::geometry::Placement;
use crate::scene::EditorSession;
use crate::shapes::{arrow_head, flat_points, radial_vertices, Composite, DrawingShape, Geometry};

/// Pixel ratio that brings the displayed image back to its natural
/// resolution, capped at `max`.
pub fn export_pixel_ratio(placement: &Placement, max: f64) -> f64 {
    let sx = placement.scale_x.abs();
    let sy = placement.scale_y.abs();
    if sx <= 0.0 || sy <= 0.0 {
        return 1.0;
    }
    (1.0 / sx).max(1.0 / sy).min(max)
}

/// Renders `region` (scene units) of the image and drawing layer at
/// `pixel_ratio` output pixels per scene unit.
pub fn rasterize(session: &mut EditorSession, region: Rect, pixel_ratio: f64) -> Result<RgbaImage> {
    let width = (region.width() * pixel_ratio).round().max(1.0) as u32;
    let height = (region.height() * pixel_ratio).round().max(1.0) as u32;
    let mut canvas = Pixmap::new(width, height)
        .ok_or_else(|| EditorError::Encode(format!("cannot allocate a {}x{} raster", width, height)))?;
    let view = Affine::scale(pixel_ratio) * Affine::translate((-region.x0, -region.y0));

    if let Some(image) = session.image.as_mut() {
        if let Some(pixels) = image.filtered_pixels(&session.images) {
            let source = to_pixmap(&pixels)?;
            let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
            canvas.draw_pixmap(0, 0, source.as_ref(), &paint, to_transform(view * image.placement.affine()), None);
        }
    }

    if !session.drawing.is_empty() {
        let mut layer = Pixmap::new(width, height)
            .ok_or_else(|| EditorError::Encode("cannot allocate the drawing layer".into()))?;
        for shape in session.drawing.shapes() {
            draw_shape(&mut layer, shape, view, session.font.as_ref());
        }
        canvas.draw_pixmap(0, 0, layer.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    }

    from_pixmap(&canvas)
}

fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_pixmap(img: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height())
        .ok_or_else(|| EditorError::Encode("image has no pixels".into()))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> Result<RgbaImage> {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        raw.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .ok_or_else(|| EditorError::Encode("raster size mismatch".into()))
}

fn paint_for(color: &str, opacity: f64, composite: Composite) -> Option<Paint<'static>> {
    let mut color = parse_color(color)?;
    color.apply_opacity(opacity.clamp(0.0, 1.0) as f32);
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint.blend_mode = match composite {
        Composite::SourceOver => BlendMode::SourceOver,
        Composite::DestinationOut => BlendMode::DestinationOut,
    };
    Some(paint)
}

fn polyline(points: impl Iterator<Item = Point>, close: bool) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for (i, p) in points.enumerate() {
        if i == 0 { pb.move_to(p.x as f32, p.y as f32); } else { pb.line_to(p.x as f32, p.y as f32); }
    }
    if close { pb.close(); }
    pb.finish()
}

fn draw_shape(pixmap: &mut Pixmap, shape: &DrawingShape, view: Affine, font: Option<&FontArc>) {
    let style = &shape.style;
    let affine = view * shape.placement.affine();
    let transform = to_transform(affine);
    let stroke = Stroke {
        width: style.stroke_width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    let stroke_paint = if style.stroke_width > 0.0 { paint_for(&style.stroke, style.opacity, style.composite) } else { None };
    let fill_paint = style.fill.as_deref().and_then(|f| paint_for(f, style.opacity, style.composite));

    let outline = |pixmap: &mut Pixmap, path: Option<tiny_skia::Path>| {
        let Some(path) = path else { return };
        if let Some(paint) = &fill_paint {
            pixmap.fill_path(&path, paint, FillRule::Winding, transform, None);
        }
        if let Some(paint) = &stroke_paint {
            pixmap.stroke_path(&path, paint, &stroke, transform, None);
        }
    };

    match &shape.geometry {
        Geometry::Line { points, closed, .. } => {
            if points.len() == 2 {
                // single-point stroke: a dot
                let r = (style.stroke_width / 2.0).max(0.5) as f32;
                let dot = PathBuilder::from_circle(points[0] as f32, points[1] as f32, r);
                if let (Some(path), Some(paint)) = (dot, &stroke_paint) {
                    pixmap.fill_path(&path, paint, FillRule::Winding, transform, None);
                }
            } else {
                outline(pixmap, polyline(flat_points(points), *closed));
            }
        }
        Geometry::Rect { width, height, .. } => {
            let rect = tiny_skia::Rect::from_xywh(0.0, 0.0, *width as f32, *height as f32);
            outline(pixmap, rect.map(PathBuilder::from_rect));
        }
        Geometry::Ellipse { radius_x, radius_y } => {
            let rect = tiny_skia::Rect::from_xywh(-*radius_x as f32, -*radius_y as f32, (*radius_x * 2.0) as f32, (*radius_y * 2.0) as f32);
            outline(pixmap, rect.and_then(PathBuilder::from_oval));
        }
        Geometry::Star { num_points, inner_radius, outer_radius } => {
            outline(pixmap, polyline(radial_vertices(*num_points, *outer_radius, Some(*inner_radius)).into_iter(), true));
        }
        Geometry::Polygon { sides, radius } => {
            outline(pixmap, polyline(radial_vertices(*sides, *radius, None).into_iter(), true));
        }
        Geometry::Arrow { points, pointer_length, pointer_width } => {
            if let Some(paint) = &stroke_paint {
                if let Some(path) = polyline(flat_points(points), false) {
                    pixmap.stroke_path(&path, paint, &stroke, transform, None);
                }
                let head = arrow_head(points, *pointer_length, *pointer_width).and_then(|h| polyline(h.into_iter(), true));
                if let Some(head) = head {
                    pixmap.fill_path(&head, paint, FillRule::Winding, transform, None);
                }
            }
        }
        Geometry::Text { text, font_size, .. } => match font {
            Some(font) => {
                let fill = style.fill.as_deref().unwrap_or(&style.stroke);
                if let Some(color) = parse_color(fill) {
                    draw_text(pixmap, font, text, *font_size, affine, color, style.opacity);
                }
            }
            None => log::debug!("no font registered, text shape {} left out of export", shape.id),
        },
        Geometry::Unsupported => {}
    }
}

/// Lays text out axis-aligned at the shape origin, one line per `\n`.
fn draw_text(pixmap: &mut Pixmap, font: &FontArc, text: &str, font_size: f64, affine: Affine, color: Color, opacity: f64) {
    let scale = affine.determinant().abs().sqrt();
    let px = (font_size * scale) as f32;
    if px <= 0.0 {
        return;
    }
    let scaled = font.as_scaled(PxScale::from(px));
    let origin = affine * Point::ZERO;
    for (line_index, line) in text.lines().enumerate() {
        let baseline = origin.y as f32 + scaled.ascent() + line_index as f32 * scaled.height();
        let mut caret = point(origin.x as f32, baseline);
        for ch in line.chars() {
            let id = scaled.glyph_id(ch);
            let glyph = id.with_scale_and_position(px, caret);
            caret.x += scaled.h_advance(id);
            let Some(outlined) = font.outline_glyph(glyph) else { continue };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                blend_pixel(pixmap, x, y, color, coverage * opacity as f32);
            });
        }
    }
}

fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, color: Color, coverage: f32) {
    if x < 0 || y < 0 || x >= pixmap.width() as i32 || y >= pixmap.height() as i32 {
        return;
    }
    let idx = y as usize * pixmap.width() as usize + x as usize;
    let a = (color.alpha() * coverage).clamp(0.0, 1.0);
    let dst = pixmap.pixels()[idx];
    let mix = |src: f32, dst: u8| (src * a * 255.0 + dst as f32 * (1.0 - a)).round().clamp(0.0, 255.0) as u8;
    let out_a = mix(1.0, dst.alpha());
    let out = PremultipliedColorU8::from_rgba(
        mix(color.red(), dst.red()).min(out_a),
        mix(color.green(), dst.green()).min(out_a),
        mix(color.blue(), dst.blue()).min(out_a),
        out_a,
    );
    if let Some(out) = out {
        pixmap.pixels_mut()[idx] = out;
    }
}

/// CSS colors the panels send: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`,
/// `rgba()` and a few names.
pub fn parse_color(css: &str) -> Option<Color> {
    let s = css.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        let channel = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
        return match hex.len() {
            3 => {
                let (r, g, b) = (channel(0, 1)?, channel(1, 1)?, channel(2, 1)?);
                Some(Color::from_rgba8(r * 17, g * 17, b * 17, 255))
            }
            6 => Some(Color::from_rgba8(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, 255)),
            8 => Some(Color::from_rgba8(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, channel(6, 2)?)),
            _ => None,
        };
    }
    if let Some(args) = s.strip_prefix("rgba(").or_else(|| s.strip_prefix("rgb(")).and_then(|r| r.strip_suffix(')')) {
        let parts: Vec<f32> = args.split(',').map(|p| p.trim().parse::<f32>()).collect::<std::result::Result<_, _>>().ok()?;
        let alpha = match parts.len() {
            3 => 1.0,
            4 => parts[3],
            _ => return None,
        };
        return Color::from_rgba(parts[0] / 255.0, parts[1] / 255.0, parts[2] / 255.0, alpha.clamp(0.0, 1.0));
    }
    match s.as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::from_rgba8(255, 0, 0, 255)),
        "green" => Some(Color::from_rgba8(0, 128, 0, 255)),
        "blue" => Some(Color::from_rgba8(0, 0, 255, 255)),
        "yellow" => Some(Color::from_rgba8(255, 255, 0, 255)),
        "transparent" => Some(Color::TRANSPARENT),
        _ => None,
    }
}
