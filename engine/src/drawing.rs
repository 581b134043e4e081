//! Drawing tools, their options, and pointer gestures on the stage.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::codec;
use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};
use crate::shapes::{Composite, DrawingShape, Geometry, ShapeStyle};
use crate::types::DrawingTool;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DrawingOptions {
    pub stroke_color: String,
    pub fill_color: Option<String>,
    pub stroke_width: f64,
    pub opacity: f64,
    pub font_size: f64,
    pub font_family: String,
    pub star_points: u32,
    pub polygon_sides: u32,
}

impl Default for DrawingOptions {
    fn default() -> Self {
        DrawingOptions {
            stroke_color: "#ff0000".to_string(),
            fill_color: None,
            stroke_width: 5.0,
            opacity: 1.0,
            font_size: 24.0,
            font_family: "Arial".to_string(),
            star_points: 5,
            polygon_sides: 6,
        }
    }
}

impl DrawingOptions {
    /// Sets one option from its string form. Names are matched loosely
    /// (`strokeWidth`, `stroke_width` and `width` are the same option).
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let key = name.trim().to_ascii_lowercase().replace(['_', '-'], "");
        let value = value.trim();
        let number = || -> Result<f64> {
            value.parse::<f64>().ok().filter(|v| v.is_finite())
                .ok_or_else(|| EditorError::InvalidArgument(format!("{} expects a number, got '{}'", name, value)))
        };
        match key.as_str() {
            "color" | "strokecolor" | "stroke" => {
                if value.is_empty() {
                    return Err(EditorError::InvalidArgument("stroke color cannot be empty".into()));
                }
                self.stroke_color = value.to_string();
            }
            "fill" | "fillcolor" => {
                self.fill_color = match value {
                    "" | "none" | "transparent" => None,
                    color => Some(color.to_string()),
                };
            }
            "width" | "strokewidth" | "size" | "brushsize" => self.stroke_width = number()?.max(0.5),
            "opacity" => self.opacity = number()?.clamp(0.0, 1.0),
            "fontsize" => self.font_size = number()?.max(1.0),
            "fontfamily" | "font" => self.font_family = value.to_string(),
            "starpoints" | "points" => self.star_points = (number()?.round() as u32).max(2),
            "polygonsides" | "sides" => self.polygon_sides = (number()?.round() as u32).max(3),
            _ => return Err(EditorError::InvalidArgument(format!("unknown drawing option '{}'", name))),
        }
        Ok(())
    }

    fn style_for(&self, tool: DrawingTool) -> ShapeStyle {
        let closed = matches!(tool, DrawingTool::Rectangle | DrawingTool::Ellipse | DrawingTool::Star | DrawingTool::Polygon);
        ShapeStyle {
            stroke: self.stroke_color.clone(),
            stroke_width: self.stroke_width,
            fill: match tool {
                DrawingTool::Text => Some(self.stroke_color.clone()),
                _ if closed => self.fill_color.clone(),
                _ => None,
            },
            opacity: self.opacity,
            composite: if tool == DrawingTool::Eraser { Composite::DestinationOut } else { Composite::SourceOver },
        }
    }
}

/// Geometry of a shape dragged out from `start` to `current`, with the
/// shape's origin.
pub fn dragged_geometry(tool: DrawingTool, options: &DrawingOptions, start: Point, current: Point) -> (Point, Geometry) {
    let d = current - start;
    let radius = d.hypot();
    match tool {
        DrawingTool::Brush | DrawingTool::Eraser => (start, Geometry::Line { points: vec![0.0, 0.0, d.x, d.y], tension: 0.5, closed: false }),
        DrawingTool::Rectangle => (
            Point::new(start.x.min(current.x), start.y.min(current.y)),
            Geometry::Rect { width: d.x.abs(), height: d.y.abs(), corner_radius: 0.0 },
        ),
        DrawingTool::Ellipse => (start.midpoint(current), Geometry::Ellipse { radius_x: d.x.abs() / 2.0, radius_y: d.y.abs() / 2.0 }),
        DrawingTool::Arrow => {
            let head = (options.stroke_width * 3.0).max(10.0);
            (start, Geometry::Arrow { points: vec![0.0, 0.0, d.x, d.y], pointer_length: head, pointer_width: head })
        }
        DrawingTool::Star => (start, Geometry::Star { num_points: options.star_points, inner_radius: radius / 2.0, outer_radius: radius }),
        DrawingTool::Polygon => (start, Geometry::Polygon { sides: options.polygon_sides, radius }),
        DrawingTool::Text => (start, Geometry::Text { text: String::new(), font_size: options.font_size, font_family: options.font_family.clone() }),
    }
}

fn is_degenerate(geometry: &Geometry) -> bool {
    const EPS: f64 = 1.0;
    match geometry {
        Geometry::Rect { width, height, .. } => *width < EPS || *height < EPS,
        Geometry::Ellipse { radius_x, radius_y } => *radius_x < EPS / 2.0 || *radius_y < EPS / 2.0,
        Geometry::Arrow { points, .. } => points.len() < 4 || (points[2].hypot(points[3])) < EPS,
        Geometry::Star { outer_radius, .. } => *outer_radius < EPS,
        Geometry::Polygon { radius, .. } => *radius < EPS,
        Geometry::Text { text, .. } => text.is_empty(),
        Geometry::Line { .. } => false,
        Geometry::Unsupported => true,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Gesture {
    Draw { id: u32, tool: DrawingTool, start: Point },
    MoveShape { id: u32, start: Point, origin: Point },
    MoveImage { start: Point, origin: Point },
    Crop,
}

#[wasm_bindgen]
impl PhotoEditor {
    /// Activates a tool by name, or deactivates drawing for `None`/`""`/`"none"`.
    pub fn set_drawing_tool(&mut self, tool: Option<String>) -> std::result::Result<(), EditorError> {
        let tool = match tool.as_deref().map(str::trim) {
            None | Some("") | Some("none") | Some("null") => None,
            Some(name) => Some(name.parse::<DrawingTool>()?),
        };
        if tool.is_some() && self.crop.is_active() {
            return Err(EditorError::InvalidState("drawing is disabled while cropping"));
        }
        self.end_gesture();
        self.session.set_tool(tool);
        log::debug!("drawing tool set to {:?}", tool);
        Ok(())
    }

    pub fn get_drawing_tool(&self) -> Option<String> {
        self.session.tool.map(|t| format!("{:?}", t).to_ascii_lowercase())
    }

    pub fn update_drawing_option(&mut self, option: &str, value: &str) -> std::result::Result<(), EditorError> {
        self.session.options.set(option, value)
    }

    pub fn get_drawing_options_json(&self) -> String {
        serde_json::to_string(&self.session.options).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get_drawing_json(&self) -> String {
        serde_json::to_string(&codec::encode_all(self.session.drawing.shapes())).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn shape_count(&self) -> usize {
        self.session.drawing.shape_count()
    }

    /// Pointer press in stage coordinates. Returns what the press started:
    /// `draw`, `text`, `shape`, `image`, `crop:<part>` or an empty string.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> String {
        self.end_gesture();
        let viewport = self.session.stage.viewport;
        let point = viewport.stage_to_scene(Point::new(x, y));

        if self.crop.is_active() {
            return match self.crop.pointer_down(point, viewport.zoom) {
                Some(hit) => {
                    self.gesture = Some(Gesture::Crop);
                    format!("crop:{}", hit.name())
                }
                None => String::new(),
            };
        }

        if let Some(tool) = self.session.tool {
            if tool == DrawingTool::Text {
                return "text".to_string();
            }
            let (origin, geometry) = dragged_geometry(tool, &self.session.options, point, point);
            let id = self.session.next_id();
            let style = self.session.options.style_for(tool);
            self.session.drawing.add(DrawingShape::new(id, origin, style, geometry));
            self.session.mark_dirty();
            self.gesture = Some(Gesture::Draw { id, tool, start: point });
            return "draw".to_string();
        }

        if let Some(id) = self.session.drawing.shape_at(point) {
            if let Some(shape) = self.session.drawing.get(id).filter(|s| s.draggable) {
                let origin = Point::new(shape.placement.x, shape.placement.y);
                self.gesture = Some(Gesture::MoveShape { id, start: point, origin });
                return "shape".to_string();
            }
        }

        if let Some(image) = self.session.image.as_ref().filter(|img| img.draggable && img.contains(point)) {
            let origin = Point::new(image.placement.x, image.placement.y);
            self.gesture = Some(Gesture::MoveImage { start: point, origin });
            return "image".to_string();
        }
        String::new()
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> std::result::Result<bool, EditorError> {
        let point = self.session.stage.viewport.stage_to_scene(Point::new(x, y));
        let Some(gesture) = self.gesture else { return Ok(false) };
        match gesture {
            Gesture::Draw { id, tool, start } => {
                let options = self.session.options.clone();
                let Some(shape) = self.session.drawing.get_mut(id) else { return Ok(false) };
                if matches!(tool, DrawingTool::Brush | DrawingTool::Eraser) {
                    let local = point - Vec2::new(shape.placement.x, shape.placement.y);
                    if let Geometry::Line { points, .. } = &mut shape.geometry {
                        points.push(local.x);
                        points.push(local.y);
                    }
                } else {
                    let (origin, geometry) = dragged_geometry(tool, &options, start, point);
                    shape.placement.x = origin.x;
                    shape.placement.y = origin.y;
                    shape.geometry = geometry;
                }
            }
            Gesture::MoveShape { id, start, origin } => {
                let Some(shape) = self.session.drawing.get_mut(id) else { return Ok(false) };
                let target = origin + (point - start);
                shape.placement.x = target.x;
                shape.placement.y = target.y;
            }
            Gesture::MoveImage { start, origin } => {
                let target = origin + (point - start);
                self.drag_image_to(target.x, target.y)?;
            }
            Gesture::Crop => {
                return Ok(self.crop.pointer_move(&mut self.session, point)?.is_some());
            }
        }
        self.session.mark_dirty();
        Ok(true)
    }

    /// Finishes the gesture. Completed drawing gestures are recorded in
    /// drawing history, image drags in canvas history.
    pub fn pointer_up(&mut self) -> std::result::Result<bool, EditorError> {
        let Some(gesture) = self.gesture.take() else { return Ok(false) };
        match gesture {
            Gesture::Draw { id, .. } => {
                if self.session.drawing.get(id).map(|s| is_degenerate(&s.geometry)).unwrap_or(true) {
                    self.session.drawing.remove(id);
                    self.session.mark_dirty();
                    return Ok(false);
                }
                self.drawing_history.snapshot(&self.session);
            }
            Gesture::MoveShape { id, origin, .. } => {
                let moved = self.session.drawing.get(id)
                    .map(|s| Point::new(s.placement.x, s.placement.y) != origin)
                    .unwrap_or(false);
                if !moved { return Ok(false); }
                self.drawing_history.snapshot(&self.session);
            }
            Gesture::MoveImage { origin, .. } => {
                let moved = self.session.image.as_ref()
                    .map(|img| Point::new(img.placement.x, img.placement.y) != origin)
                    .unwrap_or(false);
                if !moved { return Ok(false); }
                self.end_image_drag()?;
            }
            Gesture::Crop => {
                return Ok(self.crop.pointer_up());
            }
        }
        Ok(true)
    }

    pub fn add_text(&mut self, x: f64, y: f64, text: &str) -> std::result::Result<u32, EditorError> {
        if text.trim().is_empty() {
            return Err(EditorError::InvalidArgument("text cannot be empty".into()));
        }
        if self.crop.is_active() {
            return Err(EditorError::InvalidState("drawing is disabled while cropping"));
        }
        self.end_gesture();
        let point = self.session.stage.viewport.stage_to_scene(Point::new(x, y));
        let options = &self.session.options;
        let geometry = Geometry::Text {
            text: text.to_string(),
            font_size: options.font_size,
            font_family: options.font_family.clone(),
        };
        let style = options.style_for(DrawingTool::Text);
        let id = self.session.next_id();
        self.session.drawing.add(DrawingShape::new(id, point, style, geometry));
        self.session.mark_dirty();
        self.drawing_history.snapshot(&self.session);
        Ok(id)
    }

    pub fn clear_drawing(&mut self) -> bool {
        self.end_gesture();
        if self.session.drawing.is_empty() {
            return false;
        }
        self.session.drawing.clear_shapes();
        self.session.mark_dirty();
        self.drawing_history.snapshot(&self.session);
        true
    }

    /// Moves a shape by a scene-space delta, as a completed drag.
    pub fn move_shape(&mut self, id: u32, dx: f64, dy: f64) -> std::result::Result<(), EditorError> {
        self.end_gesture();
        let shape = self.session.drawing.get_mut(id)
            .ok_or_else(|| EditorError::InvalidArgument(format!("no shape with id {}", id)))?;
        shape.translate(Vec2::new(dx, dy));
        self.session.mark_dirty();
        self.drawing_history.snapshot(&self.session);
        Ok(())
    }

    pub fn remove_shape(&mut self, id: u32) -> std::result::Result<(), EditorError> {
        self.end_gesture();
        self.session.drawing.remove(id)
            .ok_or_else(|| EditorError::InvalidArgument(format!("no shape with id {}", id)))?;
        self.session.mark_dirty();
        self.drawing_history.snapshot(&self.session);
        Ok(())
    }
}

impl PhotoEditor {
    pub(crate) fn end_gesture(&mut self) {
        if self.gesture.is_some() {
            if let Err(err) = self.pointer_up() {
                log::warn!("dropping unfinished gesture: {}", err);
            }
        }
    }
}
