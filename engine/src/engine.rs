use wasm_bindgen::prelude::*;
use crate::config::EditorConfig;
use crate::crop::CropController;
use crate::drawing::Gesture;
use crate::error::{EditorError, Result};
use crate::history::{CanvasHistory, DrawingHistory};
use crate::io::ImageLoader;
use crate::render::RenderSurfaces;
use crate::scene::EditorSession;

#[wasm_bindgen]
pub struct PhotoEditor {
    pub(crate) session: EditorSession,
    pub(crate) canvas_history: CanvasHistory,
    pub(crate) drawing_history: DrawingHistory,
    pub(crate) crop: CropController,
    pub(crate) gesture: Option<Gesture>,
    pub(crate) loader: ImageLoader,
    pub(crate) surfaces: RenderSurfaces,
}

impl Default for PhotoEditor {
    fn default() -> Self {
        PhotoEditor::from_config(EditorConfig::default())
    }
}

impl PhotoEditor {
    pub fn from_config(config: EditorConfig) -> PhotoEditor {
        let config = config.validated();
        let capacity = config.history_capacity;
        PhotoEditor {
            session: EditorSession::new(config),
            canvas_history: CanvasHistory::new(capacity),
            drawing_history: DrawingHistory::new(capacity),
            crop: CropController::new(),
            gesture: None,
            loader: ImageLoader::default(),
            surfaces: RenderSurfaces::default(),
        }
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn config(&self) -> &EditorConfig {
        &self.session.config
    }

    pub(crate) fn ensure_no_crop(&self) -> Result<()> {
        if self.crop.is_active() {
            return Err(EditorError::InvalidState("apply or cancel the crop first"));
        }
        Ok(())
    }

    pub(crate) fn snapshot_canvas(&mut self) -> Result<()> {
        self.ensure_no_crop()?;
        self.canvas_history.snapshot(&mut self.session)
    }
}

#[wasm_bindgen]
impl PhotoEditor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PhotoEditor {
        console_error_panic_hook::set_once();
        PhotoEditor::default()
    }

    pub fn with_config(config_json: &str) -> std::result::Result<PhotoEditor, EditorError> {
        console_error_panic_hook::set_once();
        Ok(PhotoEditor::from_config(EditorConfig::from_json(config_json)?))
    }

    pub fn undo(&mut self) -> std::result::Result<bool, EditorError> {
        self.ensure_no_crop()?;
        self.end_gesture();
        let changed = self.canvas_history.undo(&mut self.session)?;
        if changed {
            log::debug!("canvas undo to {}", self.canvas_history.position());
        }
        Ok(changed)
    }

    pub fn redo(&mut self) -> std::result::Result<bool, EditorError> {
        self.ensure_no_crop()?;
        self.end_gesture();
        let changed = self.canvas_history.redo(&mut self.session)?;
        if changed {
            log::debug!("canvas redo to {}", self.canvas_history.position());
        }
        Ok(changed)
    }

    pub fn undo_drawing(&mut self) -> bool {
        self.end_gesture();
        self.drawing_history.undo(&mut self.session)
    }

    pub fn redo_drawing(&mut self) -> bool {
        self.end_gesture();
        self.drawing_history.redo(&mut self.session)
    }

    pub fn can_undo(&self) -> bool {
        !self.crop.is_active() && self.canvas_history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.crop.is_active() && self.canvas_history.can_redo()
    }

    pub fn can_undo_drawing(&self) -> bool {
        self.drawing_history.can_undo()
    }

    pub fn can_redo_drawing(&self) -> bool {
        self.drawing_history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.canvas_history.len()
    }

    pub fn history_position(&self) -> usize {
        self.canvas_history.position()
    }

    pub fn drawing_history_len(&self) -> usize {
        self.drawing_history.len()
    }

    pub fn drawing_history_position(&self) -> usize {
        self.drawing_history.position()
    }

    pub fn has_image(&self) -> bool {
        self.session.image.is_some()
    }

    /// True once after any change that needs a repaint.
    pub fn needs_redraw(&mut self) -> bool {
        self.session.take_dirty()
    }

    pub fn get_image_info(&self) -> String {
        let Some(image) = &self.session.image else { return "null".to_string() };
        let rect = image.client_rect();
        serde_json::json!({
            "id": image.id,
            "naturalWidth": image.natural_width,
            "naturalHeight": image.natural_height,
            "x": rect.x0,
            "y": rect.y0,
            "width": rect.width(),
            "height": rect.height(),
            "rotation": image.placement.rotation,
            "scaleX": image.placement.scale_x,
            "scaleY": image.placement.scale_y,
            "draggable": image.draggable,
        })
        .to_string()
    }

    pub fn get_config_json(&self) -> String {
        serde_json::to_string(&self.session.config).unwrap_or_else(|_| "{}".to_string())
    }
}
