//! Hit testing and edge dragging for the eight resize handles of a box.

use kurbo::{Point, Rect, Vec2};
use crate::types::HandleType;

/// Hit radius of a handle in screen pixels.
pub const HANDLE_HIT_RADIUS: f64 = 6.0;

pub const HANDLE_SIZE: f64 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxHit {
    Handle(HandleType),
    Body,
}

impl BoxHit {
    pub fn name(self) -> &'static str {
        match self {
            BoxHit::Handle(HandleType::TopLeft) => "top-left",
            BoxHit::Handle(HandleType::Top) => "top-center",
            BoxHit::Handle(HandleType::TopRight) => "top-right",
            BoxHit::Handle(HandleType::Right) => "middle-right",
            BoxHit::Handle(HandleType::BottomRight) => "bottom-right",
            BoxHit::Handle(HandleType::Bottom) => "bottom-center",
            BoxHit::Handle(HandleType::BottomLeft) => "bottom-left",
            BoxHit::Handle(HandleType::Left) => "middle-left",
            BoxHit::Body => "body",
        }
    }
}

pub fn handle_position(rect: Rect, handle: HandleType) -> Point {
    let cx = (rect.x0 + rect.x1) / 2.0;
    let cy = (rect.y0 + rect.y1) / 2.0;
    match handle {
        HandleType::TopLeft => Point::new(rect.x0, rect.y0),
        HandleType::Top => Point::new(cx, rect.y0),
        HandleType::TopRight => Point::new(rect.x1, rect.y0),
        HandleType::Right => Point::new(rect.x1, cy),
        HandleType::BottomRight => Point::new(rect.x1, rect.y1),
        HandleType::Bottom => Point::new(cx, rect.y1),
        HandleType::BottomLeft => Point::new(rect.x0, rect.y1),
        HandleType::Left => Point::new(rect.x0, cy),
    }
}

/// Handles win over the body; `zoom` keeps the hit radius constant on screen.
pub fn hit_test(rect: Rect, point: Point, zoom: f64) -> Option<BoxHit> {
    let radius = HANDLE_HIT_RADIUS / zoom.max(f64::EPSILON);
    for handle in HandleType::ALL {
        let p = handle_position(rect, handle);
        if (point.x - p.x).abs() <= radius && (point.y - p.y).abs() <= radius {
            return Some(BoxHit::Handle(handle));
        }
    }
    if rect.contains(point) {
        return Some(BoxHit::Body);
    }
    None
}

/// Moves the edges a handle controls by `delta`. The result may be inverted
/// or tiny; callers run it through their bound function.
pub fn drag_edges(rect: Rect, handle: HandleType, delta: Vec2) -> Rect {
    let (left, top, right, bottom) = handle.edges();
    let mut out = rect;
    if left { out.x0 += delta.x; }
    if right { out.x1 += delta.x; }
    if top { out.y0 += delta.y; }
    if bottom { out.y1 += delta.y; }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_take_priority_over_body() {
        let rect = Rect::new(10.0, 10.0, 110.0, 60.0);
        assert_eq!(hit_test(rect, Point::new(12.0, 9.0), 1.0), Some(BoxHit::Handle(HandleType::TopLeft)));
        assert_eq!(hit_test(rect, Point::new(60.0, 61.0), 1.0), Some(BoxHit::Handle(HandleType::Bottom)));
        assert_eq!(hit_test(rect, Point::new(50.0, 30.0), 1.0), Some(BoxHit::Body));
        assert_eq!(hit_test(rect, Point::new(200.0, 30.0), 1.0), None);
    }

    #[test]
    fn hit_radius_shrinks_with_zoom() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(hit_test(rect, Point::new(104.0, 50.0), 1.0), Some(BoxHit::Handle(HandleType::Right)));
        assert_eq!(hit_test(rect, Point::new(104.0, 50.0), 2.0), None);
    }

    #[test]
    fn corner_drag_moves_two_edges() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        let out = drag_edges(rect, HandleType::TopLeft, Vec2::new(10.0, 20.0));
        assert_eq!(out, Rect::new(10.0, 20.0, 100.0, 100.0));
        let out = drag_edges(rect, HandleType::Right, Vec2::new(-30.0, 99.0));
        assert_eq!(out, Rect::new(0.0, 0.0, 70.0, 100.0));
    }
}
