//! Filterkit: GPU fragment-shader image filters
//!
//! Levels/gamma, polar pixellate and vignette filters, each described by a
//! generated GLSL fragment shader and a set of typed uniforms, run through a
//! wgpu pipeline or evaluated on the host.

pub mod config;
pub mod error;
pub mod filters;
pub mod frame;
pub mod shader;
pub mod software;
pub mod uniform;

pub use error::{FilterError, ShaderLinkError};
