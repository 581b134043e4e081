//! Node placement and the mapping between scene space and image pixel space.
//!
//! Every conversion between the two spaces goes through [`Placement`]: crop
//! extraction, resize and export all use the same affine.

use kurbo::{Affine, Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Position, scale, rotation (degrees) and local origin of a node.
///
/// A negative scale encodes a flip along that axis.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Placement { x: 0.0, y: 0.0, scale_x: 1.0, scale_y: 1.0, rotation: 0.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

impl Placement {
    pub fn at(x: f64, y: f64) -> Self {
        Placement { x, y, ..Placement::default() }
    }

    pub fn affine(&self) -> Affine {
        Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * Affine::translate((-self.offset_x, -self.offset_y))
    }

    pub fn to_view_space(&self, point: Point) -> Point {
        self.affine() * point
    }

    pub fn to_image_space(&self, point: Point) -> Point {
        self.affine().inverse() * point
    }

    /// Axis-aligned scene rectangle covered by a local rectangle.
    pub fn rect_to_view_space(&self, rect: Rect) -> Rect {
        transform_rect_bbox(self.affine(), rect)
    }

    /// Axis-aligned local rectangle covered by a scene rectangle.
    pub fn rect_to_image_space(&self, rect: Rect) -> Rect {
        transform_rect_bbox(self.affine().inverse(), rect)
    }

    /// Scene-space bounds of a node whose local content spans `size`.
    pub fn client_rect(&self, size: Size) -> Rect {
        self.rect_to_view_space(Rect::from_origin_size(Point::ZERO, size))
    }

    pub fn is_flipped_x(&self) -> bool { self.scale_x < 0.0 }
    pub fn is_flipped_y(&self) -> bool { self.scale_y < 0.0 }
}

pub fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    bounding_box([
        affine * Point::new(rect.x0, rect.y0),
        affine * Point::new(rect.x1, rect.y0),
        affine * Point::new(rect.x1, rect.y1),
        affine * Point::new(rect.x0, rect.y1),
    ])
}

pub fn bounding_box<I: IntoIterator<Item = Point>>(points: I) -> Rect {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in points {
        if p.x < min_x { min_x = p.x; }
        if p.x > max_x { max_x = p.x; }
        if p.y < min_y { min_y = p.y; }
        if p.y > max_y { max_y = p.y; }
    }
    if min_x > max_x { return Rect::ZERO; }
    Rect::new(min_x, min_y, max_x, max_y)
}

pub fn fit_scale(content: Size, container: Size, fraction: f64) -> f64 {
    if content.width <= 0.0 || content.height <= 0.0 { return 1.0; }
    let sx = container.width * fraction / content.width;
    let sy = container.height * fraction / content.height;
    sx.min(sy)
}

pub fn rotated_size(size: Size, degrees: f64) -> Size {
    let rect = transform_rect_bbox(Affine::rotate(degrees.to_radians()), Rect::from_origin_size(Point::ZERO, size));
    rect.size()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    #[test]
    fn image_space_round_trips() {
        let placement = Placement { x: 400.0, y: 300.0, scale_x: 0.5, scale_y: -0.5, rotation: 90.0, offset_x: 500.0, offset_y: 250.0 };
        let p = Point::new(123.0, 77.0);
        let back = placement.to_image_space(placement.to_view_space(p));
        assert!(close(back.x, p.x) && close(back.y, p.y));
    }

    #[test]
    fn centered_placement_maps_corners() {
        let placement = Placement { x: 400.0, y: 300.0, scale_x: 0.5, scale_y: 0.5, rotation: 0.0, offset_x: 500.0, offset_y: 500.0 };
        let rect = placement.client_rect(Size::new(1000.0, 1000.0));
        assert!(close(rect.x0, 150.0) && close(rect.y0, 50.0));
        assert!(close(rect.width(), 500.0) && close(rect.height(), 500.0));
        let natural = placement.rect_to_image_space(Rect::new(200.0, 100.0, 400.0, 300.0));
        assert!(close(natural.x0, 100.0) && close(natural.y0, 100.0));
        assert!(close(natural.x1, 500.0) && close(natural.y1, 500.0));
    }

    #[test]
    fn quarter_turn_swaps_client_size() {
        let placement = Placement { rotation: 90.0, ..Placement::default() };
        let rect = placement.client_rect(Size::new(200.0, 100.0));
        assert!(close(rect.width(), 100.0) && close(rect.height(), 200.0));
        let size = rotated_size(Size::new(200.0, 100.0), 270.0);
        assert!(close(size.width, 100.0) && close(size.height, 200.0));
    }

    #[test]
    fn fit_uses_binding_axis() {
        let scale = fit_scale(Size::new(2000.0, 1000.0), Size::new(800.0, 600.0), 0.8);
        assert!(close(scale, 0.32));
        assert_eq!(fit_scale(Size::ZERO, Size::new(800.0, 600.0), 0.8), 1.0);
    }
}
