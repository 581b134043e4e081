//! Annotation shapes living on the drawing layer.

use serde::{Deserialize, Serialize};
use kurbo::{Point, Rect, Vec2};
use crate::geometry::{bounding_box, transform_rect_bbox, Placement};
use crate::objects::TransformHandles;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Eraser strokes punch holes into the drawing layer.
    DestinationOut,
}

impl Composite {
    pub fn canvas_name(self) -> &'static str {
        match self {
            Composite::SourceOver => "source-over",
            Composite::DestinationOut => "destination-out",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShapeStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub fill: Option<String>,
    pub opacity: f64,
    pub composite: Composite,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        ShapeStyle { stroke: "#ff0000".to_string(), stroke_width: 5.0, fill: None, opacity: 1.0, composite: Composite::SourceOver }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Freehand stroke; `points` is a flat `[x0, y0, x1, y1, ...]` list.
    Line { points: Vec<f64>, tension: f64, closed: bool },
    Text { text: String, font_size: f64, font_family: String },
    Rect { width: f64, height: f64, corner_radius: f64 },
    Ellipse { radius_x: f64, radius_y: f64 },
    Arrow { points: Vec<f64>, pointer_length: f64, pointer_width: f64 },
    Star { num_points: u32, inner_radius: f64, outer_radius: f64 },
    Polygon { sides: u32, radius: f64 },
    /// A node the editor does not know how to draw.
    Unsupported,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DrawingShape {
    pub id: u32,
    pub draggable: bool,
    pub placement: Placement,
    pub style: ShapeStyle,
    pub geometry: Geometry,
}

impl DrawingShape {
    pub fn new(id: u32, origin: Point, style: ShapeStyle, geometry: Geometry) -> Self {
        DrawingShape { id, draggable: true, placement: Placement::at(origin.x, origin.y), style, geometry }
    }

    pub fn unsupported(id: u32, draggable: bool) -> Self {
        DrawingShape { id, draggable, placement: Placement::default(), style: ShapeStyle::default(), geometry: Geometry::Unsupported }
    }

    pub fn is_renderable(&self) -> bool {
        !matches!(self.geometry, Geometry::Unsupported)
    }

    /// Bounds in local space, padded by half the stroke width.
    pub fn local_bounds(&self) -> Rect {
        let pad = self.style.stroke_width / 2.0;
        let rect = match &self.geometry {
            Geometry::Line { points, .. } | Geometry::Arrow { points, .. } => bounding_box(flat_points(points)),
            Geometry::Text { text, font_size, .. } => {
                let lines = text.lines().count().max(1) as f64;
                let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0) as f64;
                Rect::new(0.0, 0.0, longest * font_size * 0.6, lines * font_size)
            }
            Geometry::Rect { width, height, .. } => Rect::new(0.0, 0.0, *width, *height),
            Geometry::Ellipse { radius_x, radius_y } => Rect::new(-radius_x, -radius_y, *radius_x, *radius_y),
            Geometry::Star { outer_radius, inner_radius, .. } => {
                let r = outer_radius.max(*inner_radius);
                Rect::new(-r, -r, r, r)
            }
            Geometry::Polygon { radius, .. } => Rect::new(-radius, -radius, *radius, *radius),
            Geometry::Unsupported => Rect::ZERO,
        };
        rect.inflate(pad, pad)
    }

    pub fn bounds(&self) -> Rect {
        transform_rect_bbox(self.placement.affine(), self.local_bounds())
    }

    pub fn hit_test(&self, point: Point) -> bool {
        self.is_renderable() && self.bounds().contains(point)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.placement.x += delta.x;
        self.placement.y += delta.y;
    }
}

pub fn flat_points(points: &[f64]) -> impl Iterator<Item = Point> + '_ {
    points.chunks_exact(2).map(|p| Point::new(p[0], p[1]))
}

/// Tip and the two base corners of an arrow head on the last segment.
pub fn arrow_head(points: &[f64], length: f64, width: f64) -> Option<[Point; 3]> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let tip = Point::new(points[n - 2], points[n - 1]);
    let dir = tip - Point::new(points[n - 4], points[n - 3]);
    let len = dir.hypot();
    if len <= f64::EPSILON {
        return None;
    }
    let unit = dir / len;
    let normal = Vec2::new(-unit.y, unit.x) * (width / 2.0);
    let base = tip - unit * length;
    Some([tip, base + normal, base - normal])
}

/// Vertices of a star or regular polygon centred on the origin, first vertex up.
pub fn radial_vertices(count: u32, outer: f64, inner: Option<f64>) -> Vec<Point> {
    let (steps, angle_step) = match inner {
        Some(_) => (count.max(2) * 2, std::f64::consts::PI / count.max(2) as f64),
        None => (count.max(3), 2.0 * std::f64::consts::PI / count.max(3) as f64),
    };
    (0..steps)
        .map(|i| {
            let r = match inner {
                Some(inner) if i % 2 == 1 => inner,
                _ => outer,
            };
            let angle = i as f64 * angle_step - std::f64::consts::FRAC_PI_2;
            Point::new(r * angle.cos(), r * angle.sin())
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerChild {
    Shape(DrawingShape),
    Decoration(TransformHandles),
}

/// Ordered children of the drawing layer; order is z-order.
#[derive(Clone, Debug, Default)]
pub struct DrawingLayer {
    children: Vec<LayerChild>,
}

impl DrawingLayer {
    pub fn new() -> Self {
        DrawingLayer::default()
    }

    pub fn add(&mut self, shape: DrawingShape) {
        self.children.push(LayerChild::Shape(shape));
    }

    pub fn add_decoration(&mut self, handles: TransformHandles) {
        self.children.push(LayerChild::Decoration(handles));
    }

    pub fn shapes(&self) -> impl Iterator<Item = &DrawingShape> {
        self.children.iter().filter_map(|c| match c {
            LayerChild::Shape(s) => Some(s),
            LayerChild::Decoration(_) => None,
        })
    }

    pub fn decorations(&self) -> impl Iterator<Item = &TransformHandles> {
        self.children.iter().filter_map(|c| match c {
            LayerChild::Decoration(d) => Some(d),
            LayerChild::Shape(_) => None,
        })
    }

    pub fn decorations_mut(&mut self) -> impl Iterator<Item = &mut TransformHandles> {
        self.children.iter_mut().filter_map(|c| match c {
            LayerChild::Decoration(d) => Some(d),
            LayerChild::Shape(_) => None,
        })
    }

    pub fn shape_count(&self) -> usize {
        self.shapes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.shape_count() == 0
    }

    pub fn get(&self, id: u32) -> Option<&DrawingShape> {
        self.shapes().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut DrawingShape> {
        self.children.iter_mut().find_map(|c| match c {
            LayerChild::Shape(s) if s.id == id => Some(s),
            _ => None,
        })
    }

    pub fn remove(&mut self, id: u32) -> Option<DrawingShape> {
        let pos = self.children.iter().position(|c| matches!(c, LayerChild::Shape(s) if s.id == id))?;
        match self.children.remove(pos) {
            LayerChild::Shape(s) => {
                self.detach_missing();
                Some(s)
            }
            LayerChild::Decoration(_) => None,
        }
    }

    pub fn clear_shapes(&mut self) {
        self.children.retain(|c| matches!(c, LayerChild::Decoration(_)));
        self.detach_missing();
    }

    pub fn shape_at(&self, point: Point) -> Option<u32> {
        self.shapes().filter(|s| s.hit_test(point)).last().map(|s| s.id)
    }

    pub fn max_id(&self) -> u32 {
        self.children.iter().map(|c| match c {
            LayerChild::Shape(s) => s.id,
            LayerChild::Decoration(d) => d.id,
        }).max().unwrap_or(0)
    }

    fn detach_missing(&mut self) {
        let ids: Vec<u32> = self.shapes().map(|s| s.id).collect();
        for handles in self.decorations_mut() {
            if let Some(id) = handles.attached_to {
                if !ids.contains(&id) { handles.detach(); }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_shape(id: u32, x: f64, y: f64) -> DrawingShape {
        DrawingShape::new(id, Point::new(x, y), ShapeStyle { stroke_width: 0.0, ..ShapeStyle::default() },
            Geometry::Rect { width: 10.0, height: 10.0, corner_radius: 0.0 })
    }

    #[test]
    fn clearing_keeps_decorations() {
        let mut layer = DrawingLayer::new();
        layer.add(rect_shape(1, 0.0, 0.0));
        let mut handles = TransformHandles::new(2);
        handles.attach(1);
        layer.add_decoration(handles);
        layer.add(rect_shape(3, 5.0, 5.0));

        layer.clear_shapes();
        assert!(layer.is_empty());
        let kept: Vec<_> = layer.decorations().collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].attached_to, None);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut layer = DrawingLayer::new();
        layer.add(rect_shape(1, 0.0, 0.0));
        layer.add(rect_shape(2, 5.0, 5.0));
        assert_eq!(layer.shape_at(Point::new(7.0, 7.0)), Some(2));
        assert_eq!(layer.shape_at(Point::new(2.0, 2.0)), Some(1));
        assert_eq!(layer.shape_at(Point::new(50.0, 50.0)), None);
    }

    #[test]
    fn line_bounds_include_stroke() {
        let shape = DrawingShape::new(1, Point::new(10.0, 10.0), ShapeStyle { stroke_width: 4.0, ..ShapeStyle::default() },
            Geometry::Line { points: vec![0.0, 0.0, 20.0, 10.0], tension: 0.0, closed: false });
        assert_eq!(shape.bounds(), Rect::new(8.0, 8.0, 32.0, 22.0));
    }

    #[test]
    fn star_vertices_alternate_radius() {
        let verts = radial_vertices(5, 10.0, Some(4.0));
        assert_eq!(verts.len(), 10);
        assert!((verts[0].y + 10.0).abs() < 1e-9);
        assert!(((verts[1].x.powi(2) + verts[1].y.powi(2)).sqrt() - 4.0).abs() < 1e-9);
        assert_eq!(radial_vertices(6, 10.0, None).len(), 6);
    }
}
