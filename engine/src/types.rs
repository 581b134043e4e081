use serde::{Serialize, Deserialize};
use std::str::FromStr;
use crate::error::EditorError;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawingTool {
    Brush,
    Eraser,
    Rectangle,
    Ellipse,
    Arrow,
    Star,
    Polygon,
    Text,
}

impl FromStr for DrawingTool {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brush" | "pen" | "pencil" => Ok(DrawingTool::Brush),
            "eraser" => Ok(DrawingTool::Eraser),
            "rect" | "rectangle" => Ok(DrawingTool::Rectangle),
            "ellipse" | "circle" => Ok(DrawingTool::Ellipse),
            "arrow" => Ok(DrawingTool::Arrow),
            "star" => Ok(DrawingTool::Star),
            "polygon" => Ok(DrawingTool::Polygon),
            "text" => Ok(DrawingTool::Text),
            other => Err(EditorError::InvalidArgument(format!("unknown drawing tool '{}'", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandleType {
    TopLeft, TopRight, BottomLeft, BottomRight,
    Top, Bottom, Left, Right,
}

impl HandleType {
    pub const ALL: [HandleType; 8] = [
        HandleType::TopLeft, HandleType::Top, HandleType::TopRight, HandleType::Right,
        HandleType::BottomRight, HandleType::Bottom, HandleType::BottomLeft, HandleType::Left,
    ];

    pub fn edges(self) -> (bool, bool, bool, bool) {
        match self {
            HandleType::TopLeft => (true, true, false, false),
            HandleType::Top => (false, true, false, false),
            HandleType::TopRight => (false, true, true, false),
            HandleType::Right => (false, false, true, false),
            HandleType::BottomRight => (false, false, true, true),
            HandleType::Bottom => (false, false, false, true),
            HandleType::BottomLeft => (true, false, false, true),
            HandleType::Left => (true, false, false, false),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn mime(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for RasterFormat {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "png" | "image/png" => Ok(RasterFormat::Png),
            "jpg" | "jpeg" | "image/jpeg" | "image/jpg" => Ok(RasterFormat::Jpeg),
            other => Err(EditorError::InvalidArgument(format!("unsupported raster format '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_parse() {
        assert_eq!("Brush".parse::<DrawingTool>().unwrap(), DrawingTool::Brush);
        assert_eq!("circle".parse::<DrawingTool>().unwrap(), DrawingTool::Ellipse);
        assert!("lasso".parse::<DrawingTool>().is_err());
    }

    #[test]
    fn formats_parse_from_mime_and_extension() {
        assert_eq!("image/jpeg".parse::<RasterFormat>().unwrap(), RasterFormat::Jpeg);
        assert_eq!("JPG".parse::<RasterFormat>().unwrap(), RasterFormat::Jpeg);
        assert_eq!("".parse::<RasterFormat>().unwrap(), RasterFormat::Png);
        assert!("gif".parse::<RasterFormat>().is_err());
    }

    #[test]
    fn corner_handles_drag_two_edges() {
        for handle in HandleType::ALL {
            let (l, t, r, b) = handle.edges();
            let count = [l, t, r, b].iter().filter(|e| **e).count();
            let is_corner = matches!(handle, HandleType::TopLeft | HandleType::TopRight | HandleType::BottomLeft | HandleType::BottomRight);
            assert_eq!(count, if is_corner { 2 } else { 1 });
        }
    }
}
