//! Vignette: fades the image towards a colour away from a centre point.

use super::{expect_float, expect_vec2, expect_vec3, unknown_uniform, Filter};
use crate::error::FilterError;
use crate::frame::TextureSampler;
use crate::shader::{FragmentShaderBuilder, OUTPUT_COLOR, VARYING_TEXCOORD};
use crate::software::glsl;
use crate::uniform::{UniformBinding, UniformValue};
use glam::{Vec2, Vec3, Vec4};

pub const UNIFORM_CENTER: &str = "u_Center";
pub const UNIFORM_COLOUR: &str = "u_Colour";
pub const UNIFORM_START: &str = "u_Start";
pub const UNIFORM_END: &str = "u_End";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VignetteFilter {
    center: Vec2,
    colour: Vec3,
    start: f32,
    end: f32,
}

impl VignetteFilter {
    /// Pixels closer than `start` to `center` are untouched, pixels further
    /// than `end` become `colour`, with a smoothstep in between.
    pub fn new(center: Vec2, colour: Vec3, start: f32, end: f32) -> Self {
        Self {
            center,
            colour,
            start,
            end,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn colour(&self) -> Vec3 {
        self.colour
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    pub fn set_colour(&mut self, colour: Vec3) {
        self.colour = colour;
    }

    pub fn set_range(&mut self, start: f32, end: f32) {
        self.start = start;
        self.end = end;
    }

    /// Blend factor towards `colour` at `coord`.
    pub fn percent(&self, coord: Vec2) -> f32 {
        glsl::smoothstep(self.start, self.end, coord.distance(self.center))
    }
}

impl Default for VignetteFilter {
    fn default() -> Self {
        Self::new(Vec2::splat(0.5), Vec3::ZERO, 0.3, 0.75)
    }
}

impl Filter for VignetteFilter {
    fn name(&self) -> &'static str {
        "vignette"
    }

    fn uniforms(&self) -> Vec<UniformBinding> {
        vec![
            UniformBinding::vec2(UNIFORM_CENTER, self.center),
            UniformBinding::vec3(UNIFORM_COLOUR, self.colour),
            UniformBinding::float(UNIFORM_START, self.start),
            UniformBinding::float(UNIFORM_END, self.end),
        ]
    }

    fn write_body(&self, shader: &mut FragmentShaderBuilder) {
        shader
            .line(format!("vec4 color = {};", FragmentShaderBuilder::sample(VARYING_TEXCOORD)))
            .line(format!("float d = distance({VARYING_TEXCOORD}, {UNIFORM_CENTER});"))
            .line(format!("float percent = smoothstep({UNIFORM_START}, {UNIFORM_END}, d);"))
            .line(format!(
                "{OUTPUT_COLOR} = vec4(mix(color.rgb, {UNIFORM_COLOUR}, vec3(percent)), color.a);"
            ));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), FilterError> {
        match name {
            UNIFORM_CENTER => self.center = expect_vec2(name, value)?,
            UNIFORM_COLOUR => self.colour = expect_vec3(name, value)?,
            UNIFORM_START => self.start = expect_float(name, value)?,
            UNIFORM_END => self.end = expect_float(name, value)?,
            _ => return Err(unknown_uniform(self.name(), name)),
        }
        Ok(())
    }

    fn shade(&self, source: &dyn TextureSampler, coord: Vec2) -> Vec4 {
        let color = source.sample(coord);
        let percent = self.percent(coord);
        let rgb = glsl::mix_vec3(color.truncate(), self.colour, percent);
        rgb.extend(color.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid(Vec4);

    impl TextureSampler for Solid {
        fn sample(&self, _coord: Vec2) -> Vec4 {
            self.0
        }
    }

    fn filter() -> VignetteFilter {
        VignetteFilter::new(Vec2::splat(0.5), Vec3::new(0.1, 0.2, 0.9), 0.2, 0.4)
    }

    #[test]
    fn test_inside_start_is_unchanged() {
        let input = Vec4::new(0.3, 0.6, 0.7, 0.45);
        let f = filter();
        for coord in [Vec2::splat(0.5), Vec2::new(0.6, 0.5), Vec2::new(0.5, 0.65)] {
            assert!(coord.distance(f.center()) <= f.start());
            assert_eq!(f.percent(coord), 0.0);
            assert_eq!(f.shade(&Solid(input), coord), input);
        }
    }

    #[test]
    fn test_beyond_end_is_colour() {
        let input = Vec4::new(0.3, 0.6, 0.7, 0.45);
        let f = filter();
        for coord in [Vec2::ZERO, Vec2::new(1.0, 0.5), Vec2::new(0.5, 0.95)] {
            assert!(coord.distance(f.center()) >= f.end());
            assert_eq!(f.shade(&Solid(input), coord), f.colour().extend(0.45));
        }
    }

    #[test]
    fn test_alpha_always_preserved() {
        let f = filter();
        for i in 0..=20 {
            let coord = Vec2::new(i as f32 / 20.0, 0.5);
            let out = f.shade(&Solid(Vec4::new(1.0, 1.0, 1.0, 0.25)), coord);
            assert_eq!(out.w, 0.25);
        }
    }

    #[test]
    fn test_smooth_between_start_and_end() {
        let f = filter();
        let mid = f.percent(Vec2::new(0.8, 0.5));
        assert!((mid - 0.5).abs() < 1e-5);
    }
}
