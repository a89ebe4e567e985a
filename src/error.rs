//! Pipeline error types

use crate::backend::BackendError;
use thiserror::Error;

/// WGSL parse or validation failure, reported at shader registration
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Failed to parse shader '{name}': {message}")]
    Parse { name: String, message: String },
    #[error("Shader '{name}' failed validation: {message}")]
    Validation { name: String, message: String },
    #[error("Shader '{name}' has no entry point '{entry}'")]
    MissingEntryPoint { name: String, entry: String },
    #[error("Shader '{name}' declares {count} {kind}, at most {max} are supported")]
    TooManyBindings {
        name: String,
        kind: &'static str,
        count: usize,
        max: usize,
    },
}

/// Pipeline error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unknown {kind} id {id}")]
    MissingResource { kind: &'static str, id: u32 },
    #[error("Failed to create window: {0}")]
    Window(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
