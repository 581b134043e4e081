//! Plain-data records for drawing shapes, used by drawing history.

use serde::{Deserialize, Serialize};
use crate::geometry::Placement;
use crate::shapes::{DrawingShape, Geometry, ShapeStyle};

/// Tag stored in records. Tags written by other producers read back as
/// `Unknown`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(from = "String", into = "String")]
pub enum ShapeKind {
    Line,
    Text,
    Rect,
    Ellipse,
    Arrow,
    Star,
    RegularPolygon,
    Unknown,
}

impl From<String> for ShapeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Line" => ShapeKind::Line,
            "Text" => ShapeKind::Text,
            "Rect" => ShapeKind::Rect,
            "Ellipse" => ShapeKind::Ellipse,
            "Arrow" => ShapeKind::Arrow,
            "Star" => ShapeKind::Star,
            "RegularPolygon" => ShapeKind::RegularPolygon,
            _ => ShapeKind::Unknown,
        }
    }
}

impl From<ShapeKind> for String {
    fn from(kind: ShapeKind) -> Self {
        format!("{:?}", kind)
    }
}

impl ShapeKind {
    pub fn of(geometry: &Geometry) -> ShapeKind {
        match geometry {
            Geometry::Line { .. } => ShapeKind::Line,
            Geometry::Text { .. } => ShapeKind::Text,
            Geometry::Rect { .. } => ShapeKind::Rect,
            Geometry::Ellipse { .. } => ShapeKind::Ellipse,
            Geometry::Arrow { .. } => ShapeKind::Arrow,
            Geometry::Star { .. } => ShapeKind::Star,
            Geometry::Polygon { .. } => ShapeKind::RegularPolygon,
            Geometry::Unsupported => ShapeKind::Unknown,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecordAttrs {
    pub placement: Placement,
    pub style: ShapeStyle,
    pub geometry: Geometry,
}

/// One shape in a drawing history entry. `attrs` is absent for kinds the
/// editor cannot draw.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShapeRecord {
    pub id: u32,
    pub kind: ShapeKind,
    pub draggable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<RecordAttrs>,
}

pub fn encode(shape: &DrawingShape) -> ShapeRecord {
    let kind = ShapeKind::of(&shape.geometry);
    let attrs = match kind {
        ShapeKind::Unknown => None,
        _ => Some(RecordAttrs {
            placement: shape.placement,
            style: shape.style.clone(),
            geometry: shape.geometry.clone(),
        }),
    };
    ShapeRecord { id: shape.id, kind, draggable: shape.draggable, attrs }
}

/// Never fails: records that cannot be rebuilt come back as unsupported
/// shapes carrying only their id and draggable flag.
pub fn decode(record: &ShapeRecord) -> DrawingShape {
    let Some(attrs) = &record.attrs else {
        return DrawingShape::unsupported(record.id, record.draggable);
    };
    if record.kind == ShapeKind::Unknown || ShapeKind::of(&attrs.geometry) != record.kind {
        log::warn!("shape {} has kind {:?} but {:?} geometry, dropping geometry",
            record.id, record.kind, ShapeKind::of(&attrs.geometry));
        return DrawingShape::unsupported(record.id, record.draggable);
    }
    DrawingShape {
        id: record.id,
        draggable: record.draggable,
        placement: attrs.placement,
        style: attrs.style.clone(),
        geometry: attrs.geometry.clone(),
    }
}

pub fn encode_all<'a, I: IntoIterator<Item = &'a DrawingShape>>(shapes: I) -> Vec<ShapeRecord> {
    shapes.into_iter().map(encode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Composite;
    use kurbo::Point;

    fn samples() -> Vec<DrawingShape> {
        let style = ShapeStyle {
            stroke: "#123456".into(),
            stroke_width: 3.25,
            fill: Some("rgba(1,2,3,0.5)".into()),
            opacity: 0.7,
            composite: Composite::SourceOver,
        };
        let eraser = ShapeStyle { composite: Composite::DestinationOut, fill: None, ..style.clone() };
        let geometries = vec![
            Geometry::Line { points: vec![0.1, 0.2, 10.3, 20.4, 30.5, 5.6], tension: 0.5, closed: false },
            Geometry::Text { text: "Hello\nworld".into(), font_size: 24.0, font_family: "Arial".into() },
            Geometry::Rect { width: 120.5, height: 80.25, corner_radius: 4.0 },
            Geometry::Ellipse { radius_x: 33.3, radius_y: 11.1 },
            Geometry::Arrow { points: vec![0.0, 0.0, 100.0, 50.0], pointer_length: 10.0, pointer_width: 12.0 },
            Geometry::Star { num_points: 5, inner_radius: 20.0, outer_radius: 50.0 },
            Geometry::Polygon { sides: 6, radius: 42.42 },
        ];
        let mut shapes: Vec<DrawingShape> = geometries
            .into_iter()
            .enumerate()
            .map(|(i, g)| {
                let mut s = DrawingShape::new(i as u32 + 1, Point::new(17.5 * i as f64, 3.0), style.clone(), g);
                s.placement.rotation = 12.5;
                s.placement.scale_x = -1.5;
                s.draggable = i % 2 == 0;
                s
            })
            .collect();
        shapes.push(DrawingShape::new(99, Point::new(1.0, 2.0), eraser,
            Geometry::Line { points: vec![1.0, 1.0, 2.0, 2.0], tension: 0.0, closed: false }));
        shapes
    }

    #[test]
    fn every_variant_survives_encoding() {
        for shape in samples() {
            let record = encode(&shape);
            assert_eq!(decode(&record), shape);
            let json = serde_json::to_string(&record).unwrap();
            let back: ShapeRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(decode(&back), shape);
        }
    }

    #[test]
    fn unsupported_shapes_encode_to_base_record() {
        let record = encode(&DrawingShape::unsupported(7, false));
        assert_eq!(record, ShapeRecord { id: 7, kind: ShapeKind::Unknown, draggable: false, attrs: None });
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"id":7,"kind":"Unknown","draggable":false}"#);
        let shape = decode(&record);
        assert!(!shape.is_renderable());
        assert_eq!(shape.id, 7);
    }

    #[test]
    fn unknown_kind_tags_decode_without_failing() {
        let record: ShapeRecord = serde_json::from_str(r#"{"id":3,"kind":"Path","draggable":true}"#).unwrap();
        assert_eq!(record.kind, ShapeKind::Unknown);
        let shape = decode(&record);
        assert!(!shape.is_renderable());
        assert!(shape.draggable);
    }

    #[test]
    fn mismatched_geometry_is_dropped() {
        let mut record = encode(&samples()[2]);
        record.kind = ShapeKind::Ellipse;
        assert!(!decode(&record).is_renderable());
    }
}
