//! The editor session: stage, image element, drawing layer and the decoded
//! pixel store, plus the full-scene snapshots used by canvas history.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::rc::Rc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use image::RgbaImage;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::drawing::DrawingOptions;
use crate::error::{EditorError, Result};
use crate::geometry::{fit_scale, rotated_size};
use crate::objects::{ImageElement, TransformHandles};
use crate::shapes::DrawingLayer;
use crate::types::DrawingTool;

pub type ImageKey = u64;

#[derive(Default)]
pub struct ImageStore {
    images: HashMap<ImageKey, Rc<RgbaImage>>,
    next_key: ImageKey,
}

impl ImageStore {
    pub fn insert(&mut self, pixels: RgbaImage) -> ImageKey {
        self.next_key += 1;
        self.images.insert(self.next_key, Rc::new(pixels));
        self.next_key
    }

    pub fn get(&self, key: ImageKey) -> Option<Rc<RgbaImage>> {
        self.images.get(&key).cloned()
    }

    pub fn contains(&self, key: ImageKey) -> bool {
        self.images.contains_key(&key)
    }

    pub fn retain(&mut self, keep: &HashSet<ImageKey>) {
        let before = self.images.len();
        self.images.retain(|key, _| keep.contains(key));
        let dropped = before - self.images.len();
        if dropped > 0 {
            log::debug!("released {} unreferenced raster(s)", dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Pan and zoom of the stage. Scene coordinates are stage coordinates with
/// this transform divided out.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { offset_x: 0.0, offset_y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    pub fn stage_to_scene(&self, p: Point) -> Point {
        Point::new((p.x - self.offset_x) / self.zoom, (p.y - self.offset_y) / self.zoom)
    }

    pub fn scene_to_stage(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.offset_x, p.y * self.zoom + self.offset_y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stage {
    pub width: f64,
    pub height: f64,
    pub viewport: Viewport,
}

impl Stage {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

pub struct EditorSession {
    pub config: EditorConfig,
    pub stage: Stage,
    pub image: Option<ImageElement>,
    pub transformer: Option<TransformHandles>,
    pub drawing: DrawingLayer,
    pub images: ImageStore,
    pub tool: Option<DrawingTool>,
    pub options: DrawingOptions,
    pub font: Option<ab_glyph::FontArc>,
    pub(crate) interaction_locked: bool,
    next_id: u32,
    dirty: bool,
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let stage = Stage { width: config.stage_width, height: config.stage_height, viewport: Viewport::default() };
        EditorSession {
            config,
            stage,
            image: None,
            transformer: None,
            drawing: DrawingLayer::new(),
            images: ImageStore::default(),
            tool: None,
            options: DrawingOptions::default(),
            font: None,
            interaction_locked: false,
            next_id: 1,
            dirty: true,
        }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn require_image(&self) -> Result<&ImageElement> {
        self.image.as_ref().ok_or(EditorError::NoImage)
    }

    pub fn require_image_mut(&mut self) -> Result<&mut ImageElement> {
        self.image.as_mut().ok_or(EditorError::NoImage)
    }

    pub fn set_tool(&mut self, tool: Option<DrawingTool>) {
        self.tool = tool;
        self.refresh_draggable();
        self.mark_dirty();
    }

    /// Drops the drawing tool and hands the pointer back to the image.
    pub fn deactivate_tool(&mut self) {
        if self.tool.take().is_some() {
            log::debug!("drawing tool deactivated");
        }
        self.refresh_draggable();
        self.mark_dirty();
    }

    pub(crate) fn refresh_draggable(&mut self) {
        let draggable = self.tool.is_none() && !self.interaction_locked;
        if let Some(image) = &mut self.image {
            image.draggable = draggable;
        }
        if let Some(handles) = &mut self.transformer {
            handles.visible = draggable && self.image.is_some();
        }
    }

    pub fn fit_to_stage(&self, element: &mut ImageElement) {
        let rotated = rotated_size(element.natural_size(), element.placement.rotation);
        let scale = fit_scale(rotated, self.stage.size(), self.config.fit_fraction);
        element.placement.scale_x = scale.copysign(element.placement.scale_x);
        element.placement.scale_y = scale.copysign(element.placement.scale_y);
        self.center(element);
    }

    pub fn center(&self, element: &mut ImageElement) {
        let c = self.stage.center();
        element.placement.x = c.x;
        element.placement.y = c.y;
    }

    /// Destroys the current image and installs `element` in its place, with
    /// transform handles attached.
    pub fn replace_image(&mut self, mut element: ImageElement) {
        if let Some(old) = self.image.take() {
            log::debug!("replacing image {} with {}", old.id, element.id);
        }
        element.clear_filter_cache();
        let handles_id = match &self.transformer {
            Some(handles) => handles.id,
            None => self.next_id(),
        };
        let mut handles = TransformHandles::new(handles_id);
        handles.attach(element.id);
        self.transformer = Some(handles);
        self.image = Some(element);
        self.refresh_draggable();
        self.mark_dirty();
    }

    pub fn move_image_by(&mut self, delta: Vec2) -> Result<()> {
        let image = self.require_image_mut()?;
        image.placement.x += delta.x;
        image.placement.y += delta.y;
        self.mark_dirty();
        Ok(())
    }
}

/// Node tree stored in canvas snapshots. The drawing layer and the viewport
/// are not part of it.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "className")]
pub enum SceneNode {
    Stage { width: f64, height: f64, children: Vec<SceneNode> },
    Layer { children: Vec<SceneNode> },
    Image(ImageElement),
    Transformer(TransformHandles),
}

impl SceneNode {
    fn capture(session: &EditorSession) -> SceneNode {
        let mut layer = Vec::new();
        if let Some(image) = &session.image {
            layer.push(SceneNode::Image(image.clone()));
        }
        if let Some(handles) = &session.transformer {
            layer.push(SceneNode::Transformer(handles.clone()));
        }
        SceneNode::Stage {
            width: session.stage.width,
            height: session.stage.height,
            children: vec![SceneNode::Layer { children: layer }],
        }
    }

    fn children(&self) -> &[SceneNode] {
        match self {
            SceneNode::Stage { children, .. } | SceneNode::Layer { children } => children,
            _ => &[],
        }
    }

    fn first_layer(&self) -> Option<&SceneNode> {
        self.children().iter().find(|c| matches!(c, SceneNode::Layer { .. }))
    }
}

/// Deflate-compressed JSON of a [`SceneNode`] tree.
#[derive(Clone, Debug)]
pub struct CanvasSnapshot {
    bytes: Vec<u8>,
    source: Option<ImageKey>,
}

impl CanvasSnapshot {
    pub fn capture(session: &EditorSession) -> Result<CanvasSnapshot> {
        let json = serde_json::to_vec(&SceneNode::capture(session))?;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&json)?;
        let bytes = encoder.finish()?;
        Ok(CanvasSnapshot { bytes, source: session.image.as_ref().map(|img| img.source) })
    }

    pub fn source(&self) -> Option<ImageKey> {
        self.source
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    fn tree(&self) -> Result<SceneNode> {
        let mut json = Vec::new();
        DeflateDecoder::new(self.bytes.as_slice()).read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Rebuilds the image and its transform handles from the snapshot.
    ///
    /// References are re-resolved from the tree: first layer, then its
    /// transformer and image children. Whatever cannot be found becomes absent.
    pub fn restore(&self, session: &mut EditorSession) -> Result<()> {
        let tree = self.tree()?;
        let layer = tree.first_layer();
        if layer.is_none() {
            log::warn!("canvas snapshot has no layer, image reference cleared");
        }
        let children = layer.map(|l| l.children()).unwrap_or(&[]);

        let transformer = children.iter().find_map(|c| match c {
            SceneNode::Transformer(t) => Some(t.clone()),
            _ => None,
        });
        let mut image = children.iter().find_map(|c| match c {
            SceneNode::Image(img) => Some(img.clone()),
            _ => None,
        });
        if let Some(img) = &image {
            if !session.images.contains(img.source) {
                log::warn!("canvas snapshot references released raster {}, image reference cleared", img.source);
                image = None;
            }
        }

        session.image = image;
        session.transformer = transformer;
        if let (Some(handles), Some(img)) = (&mut session.transformer, &session.image) {
            if handles.attached_to != Some(img.id) {
                handles.attach(img.id);
            }
        }
        session.refresh_draggable();
        session.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Placement;

    fn session_with_image() -> EditorSession {
        let mut session = EditorSession::new(EditorConfig::default());
        let key = session.images.insert(RgbaImage::new(400, 200));
        let id = session.next_id();
        let mut element = ImageElement::new(id, key, 400, 200);
        session.fit_to_stage(&mut element);
        session.replace_image(element);
        session
    }

    #[test]
    fn loaded_image_is_fitted_and_centered() {
        let session = session_with_image();
        let image = session.image.as_ref().unwrap();
        assert_eq!(image.placement.scale_x, 1.6);
        let rect = image.client_rect();
        assert!((rect.center().x - 400.0).abs() < 1e-9);
        assert!((rect.center().y - 300.0).abs() < 1e-9);
        assert!((rect.width() - 640.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_restores_image_state() {
        let mut session = session_with_image();
        let snapshot = CanvasSnapshot::capture(&session).unwrap();
        {
            let image = session.image.as_mut().unwrap();
            image.placement.rotation = 90.0;
            image.filters.sepia = true;
        }
        snapshot.restore(&mut session).unwrap();
        let image = session.image.as_ref().unwrap();
        assert_eq!(image.placement.rotation, 0.0);
        assert!(!image.filters.sepia);
        assert_eq!(session.transformer.as_ref().unwrap().attached_to, Some(image.id));
    }

    #[test]
    fn snapshot_placement_is_bit_exact() {
        let mut session = session_with_image();
        for i in 1..200 {
            let f = i as f64;
            let placement = Placement {
                x: 0.1 + 0.2 * f,
                y: f / 3.0,
                scale_x: -(f.sqrt() / 7.0),
                scale_y: 1.0 / f,
                rotation: 90.0 * f + 1e-9 / f,
                offset_x: 200.0 / 3.0 * f.ln_1p(),
                offset_y: std::f64::consts::PI * f,
            };
            session.image.as_mut().unwrap().placement = placement;
            let snapshot = CanvasSnapshot::capture(&session).unwrap();
            session.image.as_mut().unwrap().placement = Placement::default();
            snapshot.restore(&mut session).unwrap();
            let restored = session.image.as_ref().unwrap().placement;
            let bits = |p: Placement| [p.x, p.y, p.scale_x, p.scale_y, p.rotation, p.offset_x, p.offset_y].map(f64::to_bits);
            assert_eq!(bits(restored), bits(placement), "placement {} drifted", i);
        }
    }

    #[test]
    fn missing_raster_degrades_to_no_image() {
        let mut session = session_with_image();
        let snapshot = CanvasSnapshot::capture(&session).unwrap();
        session.images.retain(&HashSet::new());
        snapshot.restore(&mut session).unwrap();
        assert!(session.image.is_none());
        assert!(matches!(session.require_image(), Err(EditorError::NoImage)));
    }

    #[test]
    fn restore_recomputes_dragging_from_tool() {
        let mut session = session_with_image();
        let snapshot = CanvasSnapshot::capture(&session).unwrap();
        session.set_tool(Some(DrawingTool::Brush));
        snapshot.restore(&mut session).unwrap();
        assert!(!session.image.as_ref().unwrap().draggable);
    }

    #[test]
    fn viewport_maps_both_ways() {
        let viewport = Viewport { offset_x: 20.0, offset_y: -10.0, zoom: 2.0 };
        let p = Point::new(15.0, 7.5);
        assert_eq!(viewport.stage_to_scene(viewport.scene_to_stage(p)), p);
    }
}
