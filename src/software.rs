//! Host-side execution of filter chains.
//!
//! Evaluates each stage's fragment shader for every texel using the same
//! formulas as the GLSL. Useful without a GPU adapter and as the reference
//! filter behaviour is tested against.

use crate::error::FilterError;
use crate::filters::{set_stage_uniform, FilterStage};
use crate::frame::{Frame, PixelFormat};
use crate::shader::ShaderPipeline;
use crate::uniform::UniformValue;
use anyhow::Result;
use tracing::debug;

/// GLSL built-ins with their specified semantics.
pub(crate) mod glsl {
    use glam::Vec3;

    /// `mix(x, y, a)`, exact at `a == 0` and `a == 1`.
    pub fn mix(x: f32, y: f32, a: f32) -> f32 {
        x * (1.0 - a) + y * a
    }

    pub fn mix_vec3(x: Vec3, y: Vec3, a: f32) -> Vec3 {
        x * (1.0 - a) + y * a
    }

    /// `min(x, y)`: `y` if `y < x`, otherwise `x`. A NaN `x` is returned
    /// unchanged, unlike `f32::min`.
    pub fn min(x: f32, y: f32) -> f32 {
        if y < x {
            y
        } else {
            x
        }
    }

    /// `max(x, y)`: `y` if `x < y`, otherwise `x`.
    pub fn max(x: f32, y: f32) -> f32 {
        if x < y {
            y
        } else {
            x
        }
    }

    /// `smoothstep(edge0, edge1, x)`, Hermite-eased between the edges.
    ///
    /// Reversed edges follow the same formula and ease downwards. Equal edges
    /// give a step: 0 at or below `edge0`, 1 above it.
    pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
        if edge0 == edge1 {
            return if x <= edge0 { 0.0 } else { 1.0 };
        }
        let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// `mod(x, y)`, i.e. `x - y * floor(x / y)`; the result takes the sign of `y`.
    pub fn modulo(x: f32, y: f32) -> f32 {
        x - y * (x / y).floor()
    }
}

/// Runs a chain of filter stages on the CPU.
#[derive(Debug, Default)]
pub struct SoftwarePipeline {
    stages: Vec<FilterStage>,
}

impl SoftwarePipeline {
    pub fn new(stages: Vec<FilterStage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut [FilterStage] {
        &mut self.stages
    }

    /// Adjusts a parameter of stage `index`.
    pub fn set_uniform(&mut self, index: usize, name: &str, value: UniformValue) -> Result<(), FilterError> {
        set_stage_uniform(&mut self.stages, index, name, value)
    }

    /// Applies every stage in order. An empty chain passes the frame through.
    pub fn apply(&self, input: &Frame) -> Frame {
        let mut current = input.to_rgba();
        for stage in &self.stages {
            let start = std::time::Instant::now();
            let mut output = Frame::new(current.width, current.height, PixelFormat::Rgba);
            for y in 0..current.height {
                for x in 0..current.width {
                    let color = stage.shade(&current, current.texel_center(x, y));
                    output.set_texel(x, y, color);
                }
            }
            debug!("[Perf] software {}: {:?}", stage.filter().name(), start.elapsed());
            current = output;
        }
        current
    }
}

impl ShaderPipeline for SoftwarePipeline {
    fn process_frame(&mut self, input: &Frame) -> Result<Frame> {
        Ok(self.apply(input))
    }
}

#[cfg(test)]
mod tests {
    use super::glsl::*;
    use super::*;
    use crate::filters::{LevelsFilter, PolarPixellateFilter, VignetteFilter};
    use glam::{Vec2, Vec3, Vec4};

    fn checker(width: u32, height: u32) -> Frame {
        let mut frame = Frame::new(width, height, PixelFormat::Rgba);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 37 + y * 91) % 256) as f32 / 255.0;
                frame.set_texel(x, y, Vec4::new(v, 1.0 - v, (x % 2) as f32, ((y * 13) % 256) as f32 / 255.0));
            }
        }
        frame
    }

    #[test]
    fn test_glsl_mod_follows_divisor_sign() {
        assert_eq!(modulo(5.5, 2.0), 1.5);
        assert_eq!(modulo(-0.5, 2.0), 1.5);
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.2, 0.4, 0.1), 0.0);
        assert_eq!(smoothstep(0.2, 0.4, 0.2), 0.0);
        assert_eq!(smoothstep(0.2, 0.4, 0.4), 1.0);
        assert_eq!(smoothstep(0.3, 0.3, 0.3), 0.0);
        assert_eq!(smoothstep(0.3, 0.3, 0.31), 1.0);
        assert_eq!(mix(2.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn test_smoothstep_reversed_edges_ease_downwards() {
        assert_eq!(smoothstep(0.5, 0.2, 0.6), 0.0);
        assert_eq!(smoothstep(0.5, 0.2, 0.1), 1.0);
        let t: f32 = 2.0 / 3.0;
        assert!((smoothstep(0.5, 0.2, 0.3) - t * t * (3.0 - 2.0 * t)).abs() < 1e-6);
    }

    #[test]
    fn test_glsl_min_max_keep_nan_operand() {
        assert!(min(f32::NAN, 1.0).is_nan());
        assert!(max(f32::NAN, 0.0).is_nan());
        assert_eq!(min(f32::INFINITY, 1.0), 1.0);
        assert_eq!(max(-0.25, 0.0), 0.0);
        assert_eq!(min(0.25, 1.0), 0.25);
    }

    #[test]
    fn test_set_uniform_by_stage_index() {
        let input = checker(4, 4);
        let mut pipeline = SoftwarePipeline::new(vec![LevelsFilter::default().into()]);
        pipeline
            .set_uniform(0, crate::filters::levels::UNIFORM_MAXOUT, UniformValue::Float(0.0))
            .unwrap();
        assert_eq!(pipeline.apply(&input).texel(1, 2).truncate(), Vec3::ZERO);

        let err = pipeline
            .set_uniform(3, crate::filters::levels::UNIFORM_MAXOUT, UniformValue::Float(0.0))
            .unwrap_err();
        assert_eq!(err, FilterError::UnknownStage { index: 3, len: 1 });
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let input = checker(5, 3);
        assert_eq!(SoftwarePipeline::default().apply(&input), input);
    }

    #[test]
    fn test_identity_levels_frame() {
        let input = checker(8, 8);
        let pipeline = SoftwarePipeline::new(vec![LevelsFilter::default().into()]);
        assert_eq!(pipeline.apply(&input), input);
    }

    #[test]
    fn test_vignette_frame_corners_and_centre() {
        let input = checker(9, 9);
        let red = Vec3::new(1.0, 0.0, 0.0);
        let pipeline = SoftwarePipeline::new(vec![VignetteFilter::new(Vec2::splat(0.5), red, 0.1, 0.5).into()]);
        let output = pipeline.apply(&input);

        assert_eq!(output.texel(4, 4), input.texel(4, 4));
        let corner = output.texel(0, 0);
        assert_eq!(corner.truncate(), red);
        assert_eq!(corner.w, input.texel(0, 0).w);
    }

    #[test]
    fn test_chain_runs_in_order() {
        let input = checker(16, 16);
        let mut pipeline = SoftwarePipeline::new(vec![
            PolarPixellateFilter::default().into(),
            LevelsFilter::new(0.0, 1.0, 1.0, 0.0, 0.0).into(),
        ]);
        let output = pipeline.process_frame(&input).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(output.texel(x, y).truncate(), Vec3::ZERO);
            }
        }
    }
}
