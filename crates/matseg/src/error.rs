use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Image codec error: {0}")]
    Load(#[from] image::ImageError),

    #[error("Degenerate input: {distinct} distinct feature vector(s), cannot form {requested} clusters")]
    DegenerateInput { distinct: usize, requested: usize },

    #[error("Invalid labeling strategy '{0}' (expected one of: auto, bright, dark)")]
    InvalidStrategy(String),

    #[error("Dataset validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
