//! Error types for shader linking and uniform uploads.

use crate::uniform::UniformType;
use thiserror::Error;

/// A mismatch between generated shader text and what the binder expects.
///
/// These are configuration bugs: they surface at setup time and are never
/// retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShaderLinkError {
    #[error("GLSL parse error: {0}")]
    Parse(String),

    #[error("shader validation error: {0}")]
    Validation(String),

    #[error("WGSL generation error: {0}")]
    WgslOutput(String),

    #[error("uniform `{name}` is declared but missing from the linked program")]
    MissingUniform { name: String },

    #[error("uniform `{name}` is declared as {expected} but linked as {found}")]
    TypeMismatch {
        name: String,
        expected: UniformType,
        found: String,
    },

    #[error("uniform `{name}` is present in the linked program but has no binding")]
    UnboundUniform { name: String },
}

/// Errors raised while binding or uploading uniform values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("uniform handles for `{filter}` are not resolved; link the program first")]
    HandlesUnresolved { filter: String },

    #[error("binding mismatch for `{name}`: {reason}")]
    BindingMismatch { name: String, reason: String },

    #[error("filter `{filter}` has no uniform named `{name}`")]
    UnknownUniform { filter: String, name: String },

    #[error("no filter stage at index {index} (chain has {len})")]
    UnknownStage { index: usize, len: usize },

    #[error("uniform write of {len} bytes at offset {offset} exceeds block size {size}")]
    OutOfBounds { offset: u32, len: u32, size: u32 },

    #[error(transparent)]
    Link(#[from] ShaderLinkError),
}
