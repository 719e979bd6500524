//! Typed uniform values and the rendering-context capability they upload through.

mod binder;
mod block;

pub use binder::UniformBinder;
pub use block::UniformBlock;

use crate::error::FilterError;
use glam::{Vec2, Vec3, Vec4};
use std::fmt;

/// Semantic type of a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformType {
    /// GLSL spelling of the type.
    pub fn glsl_name(&self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
        }
    }

    /// Number of f32 components.
    pub fn components(&self) -> u32 {
        match self {
            UniformType::Float => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 => 4,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// Host-side value of a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            UniformValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            UniformValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Upload this value with the call matching its arity.
    pub fn upload(&self, location: UniformLocation, ctx: &mut dyn RenderContext) -> Result<(), FilterError> {
        match *self {
            UniformValue::Float(x) => ctx.uniform1f(location, x),
            UniformValue::Vec2(v) => ctx.uniform2f(location, v.x, v.y),
            UniformValue::Vec3(v) => ctx.uniform3f(location, v.x, v.y, v.z),
            UniformValue::Vec4(v) => ctx.uniform4f(location, v.x, v.y, v.z, v.w),
        }
    }
}

/// A uniform declaration: name and type, no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub ty: UniformType,
}

/// A named uniform together with its current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBinding {
    pub name: &'static str,
    pub value: UniformValue,
}

impl UniformBinding {
    pub fn new(name: &'static str, value: UniformValue) -> Self {
        Self { name, value }
    }

    pub fn float(name: &'static str, value: f32) -> Self {
        Self::new(name, UniformValue::Float(value))
    }

    pub fn vec2(name: &'static str, value: Vec2) -> Self {
        Self::new(name, UniformValue::Vec2(value))
    }

    pub fn vec3(name: &'static str, value: Vec3) -> Self {
        Self::new(name, UniformValue::Vec3(value))
    }

    pub fn decl(&self) -> UniformDecl {
        UniformDecl {
            name: self.name,
            ty: self.value.ty(),
        }
    }
}

/// Resolved GPU-side location of a uniform inside a linked program.
///
/// Only produced by handle resolution against a `LinkedProgram`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub(crate) offset: u32,
    pub(crate) ty: UniformType,
}

impl UniformLocation {
    /// Byte offset within the program's uniform block.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn ty(&self) -> UniformType {
        self.ty
    }
}

/// The rendering context uniform values are written into.
///
/// Passed explicitly to every upload instead of relying on an implicitly
/// current GPU context.
pub trait RenderContext {
    fn uniform1f(&mut self, location: UniformLocation, x: f32) -> Result<(), FilterError>;
    fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32) -> Result<(), FilterError>;
    fn uniform3f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32) -> Result<(), FilterError>;
    fn uniform4f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32, w: f32) -> Result<(), FilterError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every upload call in order.
    #[derive(Debug, Default)]
    pub struct RecordingContext {
        pub calls: Vec<(u32, Vec<f32>)>,
    }

    impl RenderContext for RecordingContext {
        fn uniform1f(&mut self, location: UniformLocation, x: f32) -> Result<(), FilterError> {
            self.calls.push((location.offset, vec![x]));
            Ok(())
        }

        fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32) -> Result<(), FilterError> {
            self.calls.push((location.offset, vec![x, y]));
            Ok(())
        }

        fn uniform3f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32) -> Result<(), FilterError> {
            self.calls.push((location.offset, vec![x, y, z]));
            Ok(())
        }

        fn uniform4f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32, w: f32) -> Result<(), FilterError> {
            self.calls.push((location.offset, vec![x, y, z, w]));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingContext;
    use super::*;

    #[test]
    fn test_upload_uses_matching_arity() {
        let mut ctx = RecordingContext::default();
        let loc = UniformLocation { offset: 16, ty: UniformType::Vec3 };
        UniformValue::Vec3(Vec3::new(0.1, 0.2, 0.3)).upload(loc, &mut ctx).unwrap();
        UniformValue::Float(2.0)
            .upload(UniformLocation { offset: 28, ty: UniformType::Float }, &mut ctx)
            .unwrap();

        assert_eq!(ctx.calls, vec![(16, vec![0.1, 0.2, 0.3]), (28, vec![2.0])]);
    }

    #[test]
    fn test_binding_decl() {
        let binding = UniformBinding::vec2("u_Center", Vec2::splat(0.5));
        assert_eq!(binding.decl(), UniformDecl { name: "u_Center", ty: UniformType::Vec2 });
        assert_eq!(UniformType::Vec2.to_string(), "vec2");
    }
}
