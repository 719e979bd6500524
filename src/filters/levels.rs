//! Photoshop-style levels control with gamma adjustment.
//!
//! Input levels stretch `[min_in, max_in]` onto `[0, 1]`, gamma bends the
//! result and output levels map it onto `[min_out, max_out]`. Applied to each
//! RGB channel independently; alpha is untouched. Levels are expected in
//! `[0, 1]` and gamma in `[0, 3]` for normal use, but only negative gamma is
//! corrected (clamped to 0).

use super::{expect_float, unknown_uniform, Filter};
use crate::error::FilterError;
use crate::frame::TextureSampler;
use crate::shader::{FragmentShaderBuilder, OUTPUT_COLOR, VARYING_TEXCOORD};
use crate::software::glsl;
use crate::uniform::{UniformBinding, UniformValue};
use glam::{Vec2, Vec4};
use tracing::warn;

pub const UNIFORM_GAMMA: &str = "u_Gamma";
pub const UNIFORM_MININ: &str = "u_MinIn";
pub const UNIFORM_MAXIN: &str = "u_MaxIn";
pub const UNIFORM_MINOUT: &str = "u_MinOut";
pub const UNIFORM_MAXOUT: &str = "u_MaxOut";

const LEVELS_FUNCTIONS: &str = "\
vec3 gammaCorrection(vec3 color, vec3 gamma) {
    return pow(color, vec3(1.0) / gamma);
}
vec3 levelsControlInputRange(vec3 color, vec3 minInput, vec3 maxInput) {
    return min(max(color - minInput, vec3(0.0)) / (maxInput - minInput), vec3(1.0));
}
vec3 levelsControl(vec3 color, vec3 minInput, vec3 gamma, vec3 maxInput, vec3 minOutput, vec3 maxOutput) {
    return mix(minOutput, maxOutput, gammaCorrection(levelsControlInputRange(color, minInput, maxInput), gamma));
}
";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelsFilter {
    min_in: f32,
    max_in: f32,
    gamma: f32,
    min_out: f32,
    max_out: f32,
}

impl LevelsFilter {
    /// Creates a levels filter. A negative `gamma` is clamped to 0.
    ///
    /// `max_in == min_in` is accepted; the shader then divides by zero.
    pub fn new(min_in: f32, max_in: f32, gamma: f32, min_out: f32, max_out: f32) -> Self {
        let filter = Self {
            min_in,
            max_in,
            gamma: clamp_gamma(gamma),
            min_out,
            max_out,
        };
        filter.warn_if_degenerate();
        filter
    }

    pub fn min_in(&self) -> f32 {
        self.min_in
    }

    pub fn max_in(&self) -> f32 {
        self.max_in
    }

    /// Effective gamma, never negative.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn min_out(&self) -> f32 {
        self.min_out
    }

    pub fn max_out(&self) -> f32 {
        self.max_out
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = clamp_gamma(gamma);
    }

    pub fn set_input_range(&mut self, min_in: f32, max_in: f32) {
        self.min_in = min_in;
        self.max_in = max_in;
        self.warn_if_degenerate();
    }

    pub fn set_output_range(&mut self, min_out: f32, max_out: f32) {
        self.min_out = min_out;
        self.max_out = max_out;
    }

    /// True when the input range is empty and the output is undefined.
    pub fn is_degenerate(&self) -> bool {
        self.max_in == self.min_in
    }

    fn warn_if_degenerate(&self) {
        if self.is_degenerate() {
            warn!("levels input range is empty (min_in == max_in == {}); output is undefined", self.min_in);
        }
    }

    fn level_channel(&self, c: f32) -> f32 {
        let range = glsl::min(glsl::max(c - self.min_in, 0.0) / (self.max_in - self.min_in), 1.0);
        let corrected = range.powf(1.0 / self.gamma);
        glsl::mix(self.min_out, self.max_out, corrected)
    }
}

fn clamp_gamma(gamma: f32) -> f32 {
    if gamma < 0.0 {
        0.0
    } else {
        gamma
    }
}

impl Default for LevelsFilter {
    /// Identity levels.
    fn default() -> Self {
        Self::new(0.0, 1.0, 1.0, 0.0, 1.0)
    }
}

impl Filter for LevelsFilter {
    fn name(&self) -> &'static str {
        "levels"
    }

    fn uniforms(&self) -> Vec<UniformBinding> {
        vec![
            UniformBinding::float(UNIFORM_GAMMA, self.gamma),
            UniformBinding::float(UNIFORM_MININ, self.min_in),
            UniformBinding::float(UNIFORM_MAXIN, self.max_in),
            UniformBinding::float(UNIFORM_MINOUT, self.min_out),
            UniformBinding::float(UNIFORM_MAXOUT, self.max_out),
        ]
    }

    fn write_body(&self, shader: &mut FragmentShaderBuilder) {
        shader
            .function(LEVELS_FUNCTIONS)
            .line(format!("vec4 color = {};", FragmentShaderBuilder::sample(VARYING_TEXCOORD)))
            .line(format!(
                "{OUTPUT_COLOR} = vec4(levelsControl(color.rgb, vec3({UNIFORM_MININ}), vec3({UNIFORM_GAMMA}), \
                 vec3({UNIFORM_MAXIN}), vec3({UNIFORM_MINOUT}), vec3({UNIFORM_MAXOUT})), color.a);"
            ));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), FilterError> {
        match name {
            UNIFORM_GAMMA => self.set_gamma(expect_float(name, value)?),
            UNIFORM_MININ => self.set_input_range(expect_float(name, value)?, self.max_in),
            UNIFORM_MAXIN => self.set_input_range(self.min_in, expect_float(name, value)?),
            UNIFORM_MINOUT => self.min_out = expect_float(name, value)?,
            UNIFORM_MAXOUT => self.max_out = expect_float(name, value)?,
            _ => return Err(unknown_uniform(self.name(), name)),
        }
        Ok(())
    }

    fn shade(&self, source: &dyn TextureSampler, coord: Vec2) -> Vec4 {
        let color = source.sample(coord);
        Vec4::new(
            self.level_channel(color.x),
            self.level_channel(color.y),
            self.level_channel(color.z),
            color.w,
        )
    }
}
