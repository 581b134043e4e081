use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;

use crate::engine::PhotoEditor;
use crate::error::{EditorError, Result};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub has_image: bool,
    pub is_cropping: bool,
    pub is_loading: bool,
    pub tool: Option<String>,
    pub zoom: f64,
    pub shape_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub can_undo_drawing: bool,
    pub can_redo_drawing: bool,
    pub has_active_filters: bool,
}

fn number(params: &Value, key: &str) -> Result<f64> {
    params[key]
        .as_f64()
        .ok_or_else(|| EditorError::InvalidArgument(format!("'{}' must be a number", key)))
}

fn text<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params[key]
        .as_str()
        .ok_or_else(|| EditorError::InvalidArgument(format!("'{}' must be a string", key)))
}

fn id(params: &Value) -> Result<u32> {
    params["id"]
        .as_u64()
        .map(|v| v as u32)
        .ok_or_else(|| EditorError::InvalidArgument("'id' must be a shape id".into()))
}

impl PhotoEditor {
    pub fn state(&self) -> EditorState {
        EditorState {
            has_image: self.has_image(),
            is_cropping: self.is_cropping(),
            is_loading: self.is_loading(),
            tool: self.get_drawing_tool(),
            zoom: self.get_zoom(),
            shape_count: self.shape_count(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            can_undo_drawing: self.can_undo_drawing(),
            can_redo_drawing: self.can_redo_drawing(),
            has_active_filters: self.has_active_filters(),
        }
    }

    fn dispatch(&mut self, action: &str, params: &Value) -> Result<Value> {
        let done = json!({});
        Ok(match action {
            "load_image" => json!({ "ticket": self.load_image(text(params, "source")?)? }),
            "undo" => json!({ "changed": self.undo()? }),
            "redo" => json!({ "changed": self.redo()? }),
            "undo_drawing" => json!({ "changed": self.undo_drawing() }),
            "redo_drawing" => json!({ "changed": self.redo_drawing() }),
            "rotate" => {
                match params["direction"].as_str().unwrap_or("cw") {
                    "cw" => self.rotate_cw()?,
                    "ccw" => self.rotate_ccw()?,
                    "180" => self.rotate_180()?,
                    other => return Err(EditorError::InvalidArgument(format!("unknown rotation '{}'", other))),
                }
                done
            }
            "flip" => {
                match params["axis"].as_str().unwrap_or("horizontal") {
                    "horizontal" | "x" => self.flip_horizontal()?,
                    "vertical" | "y" => self.flip_vertical()?,
                    other => return Err(EditorError::InvalidArgument(format!("unknown flip axis '{}'", other))),
                }
                done
            }
            "resize" => {
                let lock = params["lockAspect"].as_bool().unwrap_or(false);
                self.resize_image(number(params, "width")?, number(params, "height")?, lock)?;
                done
            }
            "update_filter" => {
                self.update_filter(text(params, "name")?, number(params, "value")?)?;
                done
            }
            "reset_filters" => {
                self.reset_filters()?;
                done
            }
            "start_crop" => {
                if params["width"].is_number() || params["height"].is_number() {
                    self.start_crop_with_custom_dimensions(number(params, "width")?, number(params, "height")?)?;
                } else {
                    self.start_crop(params["ratio"].as_str().unwrap_or("free"))?;
                }
                parse_json(&self.crop_rect())
            }
            "change_crop_ratio" => {
                self.change_crop_ratio(text(params, "ratio")?)?;
                parse_json(&self.crop_rect())
            }
            "resize_crop" => parse_json(&self.resize_crop(
                number(params, "x")?,
                number(params, "y")?,
                number(params, "width")?,
                number(params, "height")?,
            )?),
            "move_crop" => parse_json(&self.move_crop(number(params, "x")?, number(params, "y")?)?),
            "apply_crop" => {
                self.apply_crop()?;
                done
            }
            "cancel_crop" => json!({ "cancelled": self.cancel_crop() }),
            "set_tool" => {
                self.set_drawing_tool(params["tool"].as_str().map(str::to_string))?;
                done
            }
            "set_option" => {
                let value = match &params["value"] {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.update_drawing_option(text(params, "name")?, &value)?;
                done
            }
            "add_text" => json!({ "id": self.add_text(number(params, "x")?, number(params, "y")?, text(params, "text")?)? }),
            "clear_drawing" => json!({ "changed": self.clear_drawing() }),
            "move_shape" => {
                self.move_shape(id(params)?, number(params, "dx")?, number(params, "dy")?)?;
                done
            }
            "remove_shape" => {
                self.remove_shape(id(params)?)?;
                done
            }
            "set_stage_size" => {
                self.set_stage_size(number(params, "width")?, number(params, "height")?)?;
                done
            }
            "zoom" => {
                let zoom = self.zoom_by(
                    number(params, "factor")?,
                    params["x"].as_f64().unwrap_or(0.0),
                    params["y"].as_f64().unwrap_or(0.0),
                );
                json!({ "zoom": zoom })
            }
            "set_zoom" => json!({ "zoom": self.set_zoom(number(params, "zoom")?) }),
            "pan" => {
                self.pan_by(number(params, "dx")?, number(params, "dy")?);
                done
            }
            "reset_view" => {
                self.reset_view();
                done
            }
            "export" => {
                let format = params["format"].as_str().map(str::to_string);
                json!({ "dataUrl": self.get_image_as_base64(format, params["quality"].as_f64())? })
            }
            "state" => serde_json::to_value(self.state())?,
            other => return Err(EditorError::InvalidArgument(format!("unknown action '{}'", other))),
        })
    }
}

fn parse_json(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or(Value::Null)
}

#[wasm_bindgen]
impl PhotoEditor {
    /// Single string entry point: `{"action": "...", "params": {...}}`.
    /// Answers `{"success": true, ...}` or `{"error": "...", "code": "..."}`.
    pub fn execute_command(&mut self, cmd_json: &str) -> String {
        #[derive(Deserialize)]
        struct Command {
            action: String,
            #[serde(default)]
            params: Value,
        }

        let cmd: Command = match serde_json::from_str(cmd_json) {
            Ok(c) => c,
            Err(e) => return json!({ "error": format!("Invalid JSON: {}", e), "code": "InvalidArgumentError" }).to_string(),
        };

        match self.dispatch(&cmd.action, &cmd.params) {
            Ok(Value::Object(mut payload)) => {
                payload.insert("success".into(), Value::Bool(true));
                Value::Object(payload).to_string()
            }
            Ok(other) => json!({ "success": true, "result": other }).to_string(),
            Err(e) => {
                log::warn!("command '{}' failed: {}", cmd.action, e);
                json!({ "error": e.to_string(), "code": e.code() }).to_string()
            }
        }
    }

    pub fn get_state(&self) -> std::result::Result<JsValue, EditorError> {
        serde_wasm_bindgen::to_value(&self.state()).map_err(|e| EditorError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn run(editor: &mut PhotoEditor, cmd: Value) -> Value {
        serde_json::from_str(&editor.execute_command(&cmd.to_string())).unwrap()
    }

    #[test]
    fn reports_errors_with_codes() {
        let mut editor = PhotoEditor::default();
        let out: Value = serde_json::from_str(&editor.execute_command("{not json")).unwrap();
        assert!(out["error"].as_str().unwrap().starts_with("Invalid JSON"));

        let out = run(&mut editor, json!({ "action": "rotate" }));
        assert_eq!(out["code"], "NoImageError");

        let out = run(&mut editor, json!({ "action": "teleport" }));
        assert_eq!(out["code"], "InvalidArgumentError");
    }

    #[test]
    fn routes_editing_actions() {
        let mut editor = PhotoEditor::default();
        editor.load_image_pixels(RgbaImage::from_pixel(200, 100, Rgba([9, 9, 9, 255]))).unwrap();

        assert_eq!(run(&mut editor, json!({ "action": "rotate", "params": { "direction": "ccw" } }))["success"], true);
        assert_eq!(run(&mut editor, json!({ "action": "flip", "params": { "axis": "y" } }))["success"], true);
        let crop = run(&mut editor, json!({ "action": "start_crop", "params": { "ratio": "1:1" } }));
        assert_eq!(crop["success"], true);
        assert_eq!(crop["width"], crop["height"]);
        assert_eq!(run(&mut editor, json!({ "action": "cancel_crop" }))["cancelled"], true);

        assert_eq!(run(&mut editor, json!({ "action": "set_tool", "params": { "tool": "rectangle" } }))["success"], true);
        assert_eq!(run(&mut editor, json!({ "action": "set_option", "params": { "name": "strokeWidth", "value": 3 } }))["success"], true);
        let text = run(&mut editor, json!({ "action": "add_text", "params": { "x": 10, "y": 10, "text": "hi" } }));
        assert!(text["id"].is_u64());

        let state = run(&mut editor, json!({ "action": "state" }));
        assert_eq!(state["hasImage"], true);
        assert_eq!(state["shapeCount"], 1);
        assert_eq!(state["tool"], "rectangle");
        assert_eq!(state["canUndo"], true);
    }

    #[test]
    fn export_returns_data_url() {
        let mut editor = PhotoEditor::default();
        editor.load_image_pixels(RgbaImage::from_pixel(20, 20, Rgba([1, 2, 3, 255]))).unwrap();
        let out = run(&mut editor, json!({ "action": "export", "params": { "format": "jpeg", "quality": 0.8 } }));
        assert!(out["dataUrl"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }
}
