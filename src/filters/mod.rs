//! Fragment-shader filters and the stage that binds them to a linked program.
//!
//! A [`Filter`] is a declarative record: typed parameters exposed as uniform
//! bindings, the GLSL that reads them, and a host-side evaluation of the same
//! formula. [`FilterStage`] composes a filter with a [`UniformBinder`] and the
//! program it was linked into; pipelines own a sequence of stages and drive
//! each one in turn.

pub mod levels;
pub mod polar_pixellate;
pub mod vignette;

pub use levels::LevelsFilter;
pub use polar_pixellate::PolarPixellateFilter;
pub use vignette::VignetteFilter;

use crate::error::{FilterError, ShaderLinkError};
use crate::frame::TextureSampler;
use crate::shader::{FragmentShader, FragmentShaderBuilder, LinkedProgram, ProgramCache};
use crate::uniform::{RenderContext, UniformBinder, UniformBinding, UniformType, UniformValue};
use glam::{Vec2, Vec4};
use std::fmt;
use std::sync::Arc;

/// What a filter contributes to its stage.
pub trait Filter: fmt::Debug {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Current value of every uniform, in declaration order.
    fn uniforms(&self) -> Vec<UniformBinding>;

    /// Declares the uniforms returned by [`Filter::uniforms`].
    fn declare_uniforms(&self, shader: &mut FragmentShaderBuilder) {
        for binding in self.uniforms() {
            shader.uniform(binding.name, binding.value.ty());
        }
    }

    /// Adds helper functions and the body of `main`.
    fn write_body(&self, shader: &mut FragmentShaderBuilder);

    /// Sets a parameter through its uniform name.
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), FilterError>;

    /// Evaluates the fragment shader on the host for one texture coordinate.
    fn shade(&self, source: &dyn TextureSampler, coord: Vec2) -> Vec4;
}

/// Builds the complete fragment shader for `filter`.
///
/// Depends only on the filter's uniform declarations and body, never on
/// parameter values, so the result is stable for a given filter type.
pub fn build_fragment_source(filter: &dyn Filter) -> FragmentShader {
    let mut shader = FragmentShaderBuilder::new();
    filter.declare_uniforms(&mut shader);
    filter.write_body(&mut shader);
    shader.build()
}

pub(crate) fn expect_float(name: &str, value: UniformValue) -> Result<f32, FilterError> {
    value.as_float().ok_or_else(|| type_mismatch(name, UniformType::Float, value))
}

pub(crate) fn expect_vec2(name: &str, value: UniformValue) -> Result<Vec2, FilterError> {
    value.as_vec2().ok_or_else(|| type_mismatch(name, UniformType::Vec2, value))
}

pub(crate) fn expect_vec3(name: &str, value: UniformValue) -> Result<glam::Vec3, FilterError> {
    value.as_vec3().ok_or_else(|| type_mismatch(name, UniformType::Vec3, value))
}

fn type_mismatch(name: &str, expected: UniformType, value: UniformValue) -> FilterError {
    FilterError::BindingMismatch {
        name: name.to_string(),
        reason: format!("expected {}, got {}", expected, value.ty()),
    }
}

pub(crate) fn unknown_uniform(filter: &str, name: &str) -> FilterError {
    FilterError::UnknownUniform {
        filter: filter.to_string(),
        name: name.to_string(),
    }
}

/// One pass of a pipeline: a filter, its shader and its resolved bindings.
pub struct FilterStage {
    filter: Box<dyn Filter>,
    shader: FragmentShader,
    binder: UniformBinder,
    program: Option<Arc<LinkedProgram>>,
}

impl FilterStage {
    pub fn new(filter: Box<dyn Filter>) -> Self {
        let shader = build_fragment_source(filter.as_ref());
        let binder = UniformBinder::new(filter.name(), shader.uniforms.clone());
        Self {
            filter,
            shader,
            binder,
            program: None,
        }
    }

    pub fn filter(&self) -> &dyn Filter {
        self.filter.as_ref()
    }

    pub fn fragment_shader(&self) -> &FragmentShader {
        &self.shader
    }

    /// The program handles are currently resolved against.
    pub fn program(&self) -> Option<&Arc<LinkedProgram>> {
        self.program.as_ref()
    }

    /// Links the stage's shader (reusing a cached program for identical
    /// source) and resolves its uniform handles.
    pub fn link(&mut self, cache: &mut ProgramCache) -> Result<Arc<LinkedProgram>, ShaderLinkError> {
        let program = cache.get_or_link(&self.shader.source)?;
        self.resolve_handles(program.clone())?;
        Ok(program)
    }

    /// Resolves uniform handles against `program`, replacing any previous
    /// resolution.
    pub fn resolve_handles(&mut self, program: Arc<LinkedProgram>) -> Result<(), ShaderLinkError> {
        self.program = None;
        self.binder.resolve_handles(&program)?;
        self.program = Some(program);
        Ok(())
    }

    /// Uploads the filter's current parameter values.
    pub fn push_values(&self, ctx: &mut dyn RenderContext) -> Result<(), FilterError> {
        self.binder.push_values(&self.filter.uniforms(), ctx)
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), FilterError> {
        self.filter.set_uniform(name, value)
    }

    pub fn shade(&self, source: &dyn TextureSampler, coord: Vec2) -> Vec4 {
        self.filter.shade(source, coord)
    }
}

/// Sets a parameter on stage `index` of a chain.
pub fn set_stage_uniform(
    stages: &mut [FilterStage],
    index: usize,
    name: &str,
    value: UniformValue,
) -> Result<(), FilterError> {
    let len = stages.len();
    stages
        .get_mut(index)
        .ok_or(FilterError::UnknownStage { index, len })?
        .set_uniform(name, value)
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("filter", &self.filter)
            .field("program", &self.program.as_ref().map(|p| p.id()))
            .finish()
    }
}

impl<F: Filter + 'static> From<F> for FilterStage {
    fn from(filter: F) -> Self {
        FilterStage::new(Box::new(filter))
    }
}
