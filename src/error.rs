//! Error types for the trunk storage engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NebError>;

#[derive(Error, Debug)]
pub enum NebError {
    #[error("cell already exists: {0:#x}")]
    AlreadyExists(u64),

    #[error("cell not found: {0:#x}")]
    NotFound(u64),

    #[error("schema not found: {0}")]
    SchemaNotFound(u32),

    #[error("schema '{0}' not found")]
    SchemaNameNotFound(String),

    #[error("schema '{0}' already registered")]
    SchemaExists(String),

    #[error("trunk is full: no segment could host {requested} bytes")]
    StoreFull { requested: usize },

    #[error("object too large: {size} bytes exceeds segment size {max}")]
    ObjectTooLarge { size: usize, max: usize },

    #[error("replica file corrupt: {0}")]
    CorruptReplica(String),

    #[error("function '{0}' is not registered")]
    FunctionNotFound(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema file error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NebError {
    /// Stable string code, useful for callers that adapt these errors onto
    /// a wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            NebError::AlreadyExists(_) => "ALREADY_EXISTS",
            NebError::NotFound(_) => "NOT_FOUND",
            NebError::SchemaNotFound(_) | NebError::SchemaNameNotFound(_) => "SCHEMA_NOT_FOUND",
            NebError::SchemaExists(_) => "SCHEMA_EXISTS",
            NebError::StoreFull { .. } => "STORE_FULL",
            NebError::ObjectTooLarge { .. } => "OBJECT_TOO_LARGE",
            NebError::CorruptReplica(_) => "CORRUPT_REPLICA",
            NebError::FunctionNotFound(_) => "FUNCTION_NOT_FOUND",
            NebError::Codec(_) => "CODEC_ERROR",
            NebError::Io(_) => "IO_ERROR",
            NebError::Json(_) => "SCHEMA_FILE_ERROR",
        }
    }
}
