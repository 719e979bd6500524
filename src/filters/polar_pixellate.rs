//! Pixellation in polar coordinates around a centre point.
//!
//! The radius is snapped to multiples of `fractional_size.x` and the angle to
//! multiples of `fractional_size.y`, giving concentric/spiral blocks instead
//! of a square grid.

use super::{expect_vec2, unknown_uniform, Filter};
use crate::error::FilterError;
use crate::frame::TextureSampler;
use crate::shader::{FragmentShaderBuilder, OUTPUT_COLOR, VARYING_TEXCOORD};
use crate::software::glsl;
use crate::uniform::{UniformBinding, UniformValue};
use glam::{Vec2, Vec4};

pub const UNIFORM_CENTER: &str = "u_Center";
pub const UNIFORM_FRACTIONAL_SIZE: &str = "u_FractionalSize";

/// Constant added to the snapped radius.
const RADIUS_BIAS: f32 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPixellateFilter {
    center: Vec2,
    fractional_size: Vec2,
}

impl PolarPixellateFilter {
    /// `center` is in texture space; `fractional_size` is the block size as a
    /// fraction of the image (x: radius step, y: angle step).
    pub fn new(center: Vec2, fractional_size: Vec2) -> Self {
        Self {
            center,
            fractional_size,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn fractional_size(&self) -> Vec2 {
        self.fractional_size
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    pub fn set_fractional_size(&mut self, fractional_size: Vec2) {
        self.fractional_size = fractional_size;
    }

    /// Snapped `(radius, angle)` for a texture coordinate, relative to the
    /// centre in `[-1, 1]` space. The radius excludes the bias.
    pub fn bucket(&self, coord: Vec2) -> (f32, f32) {
        let norm = (coord * 2.0 - Vec2::ONE) - self.norm_center();
        let r = norm.length();
        let phi = norm.y.atan2(norm.x);
        (
            r - glsl::modulo(r, self.fractional_size.x),
            phi - glsl::modulo(phi, self.fractional_size.y),
        )
    }

    /// The coordinate actually sampled for `coord`.
    pub fn quantized_coord(&self, coord: Vec2) -> Vec2 {
        let (r, phi) = self.bucket(coord);
        let r = r + RADIUS_BIAS;
        let norm = Vec2::new(r * phi.cos(), r * phi.sin()) + self.norm_center();
        norm / 2.0 + Vec2::splat(0.5)
    }

    fn norm_center(&self) -> Vec2 {
        self.center * 2.0 - Vec2::ONE
    }
}

impl Default for PolarPixellateFilter {
    fn default() -> Self {
        Self::new(Vec2::splat(0.5), Vec2::splat(0.05))
    }
}

impl Filter for PolarPixellateFilter {
    fn name(&self) -> &'static str {
        "polar_pixellate"
    }

    fn uniforms(&self) -> Vec<UniformBinding> {
        vec![
            UniformBinding::vec2(UNIFORM_FRACTIONAL_SIZE, self.fractional_size),
            UniformBinding::vec2(UNIFORM_CENTER, self.center),
        ]
    }

    fn write_body(&self, shader: &mut FragmentShaderBuilder) {
        shader
            .line(format!("vec2 normCoord = vec2(2.0) * {VARYING_TEXCOORD} - vec2(1.0);"))
            .line(format!("vec2 normCenter = vec2(2.0) * {UNIFORM_CENTER} - vec2(1.0);"))
            .line("normCoord = normCoord - normCenter;")
            .line("float r = length(normCoord);")
            .line("float phi = atan(normCoord.y, normCoord.x);")
            .line(format!("r = r - mod(r, {UNIFORM_FRACTIONAL_SIZE}.x) + {RADIUS_BIAS:?};"))
            .line(format!("phi = phi - mod(phi, {UNIFORM_FRACTIONAL_SIZE}.y);"))
            .line("normCoord = vec2(r * cos(phi), r * sin(phi)) + normCenter;")
            .line("vec2 textureCoordinateToUse = normCoord / vec2(2.0) + vec2(0.5);")
            .line(format!(
                "{OUTPUT_COLOR} = {};",
                FragmentShaderBuilder::sample("textureCoordinateToUse")
            ));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), FilterError> {
        match name {
            UNIFORM_CENTER => self.center = expect_vec2(name, value)?,
            UNIFORM_FRACTIONAL_SIZE => self.fractional_size = expect_vec2(name, value)?,
            _ => return Err(unknown_uniform(self.name(), name)),
        }
        Ok(())
    }

    fn shade(&self, source: &dyn TextureSampler, coord: Vec2) -> Vec4 {
        source.sample(self.quantized_coord(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PixelFormat};

    fn gradient(width: u32, height: u32) -> Frame {
        let mut frame = Frame::new(width, height, PixelFormat::Rgba);
        for y in 0..height {
            for x in 0..width {
                let c = frame.texel_center(x, y);
                frame.set_texel(x, y, Vec4::new(c.x, c.y, (c.x * c.y).fract(), 1.0));
            }
        }
        frame
    }

    #[test]
    fn test_same_bucket_same_color() {
        let filter = PolarPixellateFilter::new(Vec2::splat(0.5), Vec2::new(0.25, 0.5));
        let source = gradient(64, 64);

        // Radii 0.3 and 0.35 share the [0.25, 0.5) ring, angles 0.05 and 0.3 the [0, 0.5) sector.
        let polar = |r: f32, phi: f32| Vec2::new(r * phi.cos(), r * phi.sin()) / 2.0 + Vec2::splat(0.5);
        let a = polar(0.3, 0.05);
        let b = polar(0.35, 0.3);

        assert_eq!(filter.bucket(a), (0.25, 0.0));
        assert_eq!(filter.bucket(a), filter.bucket(b));
        assert_eq!(filter.shade(&source, a), filter.shade(&source, b));
    }

    #[test]
    fn test_quantization_is_idempotent_within_bucket() {
        let filter = PolarPixellateFilter::new(Vec2::splat(0.5), Vec2::new(0.125, 0.25));
        let source = gradient(32, 32);
        for i in 0..16 {
            let coord = Vec2::new(i as f32 / 16.0, 0.55 + i as f32 / 40.0);
            let (r, phi) = filter.bucket(coord);
            let inner_r = r + filter.fractional_size().x * 0.5;
            let inner_phi = phi + filter.fractional_size().y * 0.5;
            let inner = Vec2::new(inner_r * inner_phi.cos(), inner_r * inner_phi.sin()) / 2.0 + Vec2::splat(0.5);
            assert_eq!(filter.bucket(inner), (r, phi));
            assert_eq!(filter.shade(&source, inner), filter.shade(&source, coord));
        }
    }

    #[test]
    fn test_glsl_mentions_bias_and_uniforms() {
        let shader = super::super::build_fragment_source(&PolarPixellateFilter::default());
        assert!(shader.source.contains("mod(r, u_FractionalSize.x) + 0.03;"));
        assert!(shader.source.contains("atan(normCoord.y, normCoord.x)"));
        let names: Vec<&str> = shader.uniforms.iter().map(|u| u.name).collect();
        assert_eq!(names, vec![UNIFORM_FRACTIONAL_SIZE, UNIFORM_CENTER]);
    }
}
