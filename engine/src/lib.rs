pub mod types;
pub mod error;
pub mod config;
pub mod logger;
pub mod geometry;
pub mod filters;
pub mod image_ops;
pub mod objects;
pub mod shapes;
pub mod codec;
pub mod scene;
pub mod history;
pub mod handles;
pub mod crop;
pub mod drawing;
pub mod engine;
pub mod transform;
pub mod io;
pub mod raster;
pub mod render;
pub mod commands;

pub use engine::PhotoEditor;
pub use error::{EditorError, Result};
pub use config::EditorConfig;
pub use types::{DrawingTool, HandleType, RasterFormat};
pub use crop::CropConstraint;
pub use filters::FilterSet;
pub use codec::{ShapeKind, ShapeRecord};
pub use shapes::{DrawingShape, Geometry};
pub use logger::init_logging;
