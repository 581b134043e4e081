use wasm_bindgen::JsValue;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no image is loaded")]
    NoImage,

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("requested {requested_width}x{requested_height} exceeds the image ({available_width}x{available_height})")]
    DimensionsExceedImage {
        requested_width: f64,
        requested_height: f64,
        available_width: f64,
        available_height: f64,
    },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl EditorError {
    pub fn code(&self) -> &'static str {
        match self {
            EditorError::NoImage => "NoImageError",
            EditorError::Decode(_) => "DecodeError",
            EditorError::DimensionsExceedImage { .. } => "DimensionsExceedImageError",
            EditorError::InvalidState(_) => "InvalidStateError",
            EditorError::InvalidArgument(_) => "InvalidArgumentError",
            EditorError::Encode(_) => "EncodeError",
            EditorError::Snapshot(_) => "SnapshotError",
        }
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(err: serde_json::Error) -> Self {
        EditorError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for EditorError {
    fn from(err: std::io::Error) -> Self {
        EditorError::Snapshot(err.to_string())
    }
}

impl From<EditorError> for JsValue {
    fn from(err: EditorError) -> Self {
        let js_err = js_sys::Error::new(&err.to_string());
        js_err.set_name(err.code());
        js_err.into()
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
