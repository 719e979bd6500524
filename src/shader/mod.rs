//! GPU shader pipeline.

pub mod builder;
mod gpu_context;
mod program;
mod wgpu_pipeline;

pub use builder::{
    FragmentShader, FragmentShaderBuilder, OUTPUT_COLOR, SAMPLER_TEXTURE0, UNIFORM_TEXTURE0, VARYING_TEXCOORD,
};
pub use gpu_context::GpuContext;
pub use program::{LinkedProgram, ProgramCache, ProgramId, ReflectedUniform};
pub use wgpu_pipeline::WgpuPipeline;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for filter chain pipelines.
pub trait ShaderPipeline {
    /// Process a frame through every filter stage.
    fn process_frame(&mut self, input: &Frame) -> Result<Frame>;
}
