//! Fragment shader source assembly.
//!
//! Every filter shares the same preamble: a precision statement, the source
//! texture and its sampler, the interpolated texture coordinate and the colour
//! output. A filter adds its uniforms, optional helper functions and the body
//! of `main`. The builder records each uniform it declares so the binder can be
//! checked against exactly the same list.

use crate::uniform::{UniformDecl, UniformType};
use std::fmt::Write;

/// Source texture, `layout(set = 0, binding = 0)`.
pub const UNIFORM_TEXTURE0: &str = "u_Texture0";
/// Sampler paired with the source texture, `layout(set = 0, binding = 1)`.
pub const SAMPLER_TEXTURE0: &str = "s_Texture0";
/// Interpolated texture coordinate, `layout(location = 0) in`.
pub const VARYING_TEXCOORD: &str = "v_TexCoord";
/// Fragment colour output, `layout(location = 0) out`.
pub const OUTPUT_COLOR: &str = "o_FragColor";
/// Name of the uniform block holding every filter parameter.
pub const UNIFORM_BLOCK: &str = "FilterParams";

pub const TEXTURE_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;
pub const UNIFORM_BINDING: u32 = 2;

/// A complete fragment shader and the uniforms it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentShader {
    pub source: String,
    pub uniforms: Vec<UniformDecl>,
}

/// Builds a [`FragmentShader`] from typed declarations and body lines.
#[derive(Debug, Default)]
pub struct FragmentShaderBuilder {
    uniforms: Vec<UniformDecl>,
    functions: Vec<String>,
    body: Vec<String>,
}

impl FragmentShaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// GLSL expression sampling the source texture at `coord`.
    pub fn sample(coord: &str) -> String {
        format!("texture(sampler2D({UNIFORM_TEXTURE0}, {SAMPLER_TEXTURE0}), {coord})")
    }

    /// Declares a uniform. Names must be unique within a shader.
    pub fn uniform(&mut self, name: &'static str, ty: UniformType) -> &mut Self {
        if self.uniforms.iter().any(|u| u.name == name) {
            debug_assert!(false, "uniform `{name}` declared twice");
            return self;
        }
        self.uniforms.push(UniformDecl { name, ty });
        self
    }

    /// Adds a helper function placed before `main`.
    pub fn function(&mut self, source: impl Into<String>) -> &mut Self {
        self.functions.push(source.into());
        self
    }

    /// Appends one statement to the body of `main`.
    pub fn line(&mut self, statement: impl Into<String>) -> &mut Self {
        self.body.push(statement.into());
        self
    }

    pub fn declared(&self) -> &[UniformDecl] {
        &self.uniforms
    }

    pub fn build(self) -> FragmentShader {
        let mut src = String::new();
        src.push_str("#version 450\n");
        src.push_str("precision mediump float;\n");
        let _ = writeln!(
            src,
            "layout(set = 0, binding = {TEXTURE_BINDING}) uniform texture2D {UNIFORM_TEXTURE0};"
        );
        let _ = writeln!(
            src,
            "layout(set = 0, binding = {SAMPLER_BINDING}) uniform sampler {SAMPLER_TEXTURE0};"
        );
        if !self.uniforms.is_empty() {
            let _ = writeln!(
                src,
                "layout(set = 0, binding = {UNIFORM_BINDING}, std140) uniform {UNIFORM_BLOCK} {{"
            );
            for decl in &self.uniforms {
                let _ = writeln!(src, "    {} {};", decl.ty.glsl_name(), decl.name);
            }
            src.push_str("};\n");
        }
        let _ = writeln!(src, "layout(location = 0) in vec2 {VARYING_TEXCOORD};");
        let _ = writeln!(src, "layout(location = 0) out vec4 {OUTPUT_COLOR};");

        for function in &self.functions {
            src.push_str(function);
            if !function.ends_with('\n') {
                src.push('\n');
            }
        }

        src.push_str("void main() {\n");
        for line in &self.body {
            let _ = writeln!(src, "    {line}");
        }
        src.push_str("}\n");

        FragmentShader {
            source: src,
            uniforms: self.uniforms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_sample() -> FragmentShader {
        let mut builder = FragmentShaderBuilder::new();
        builder
            .uniform("u_Amount", UniformType::Float)
            .uniform("u_Center", UniformType::Vec2)
            .line(format!("vec4 color = {};", FragmentShaderBuilder::sample(VARYING_TEXCOORD)))
            .line(format!("{OUTPUT_COLOR} = color * u_Amount;"));
        builder.build()
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build_sample(), build_sample());
    }

    #[test]
    fn test_uniform_block_declares_every_uniform() {
        let shader = build_sample();
        assert!(shader.source.starts_with("#version 450\nprecision mediump float;\n"));
        assert!(shader
            .source
            .contains("layout(set = 0, binding = 2, std140) uniform FilterParams {\n    float u_Amount;\n    vec2 u_Center;\n};"));
        assert_eq!(
            shader.uniforms,
            vec![
                UniformDecl { name: "u_Amount", ty: UniformType::Float },
                UniformDecl { name: "u_Center", ty: UniformType::Vec2 },
            ]
        );
    }

    #[test]
    fn test_no_block_without_uniforms() {
        let mut builder = FragmentShaderBuilder::new();
        builder.line(format!("{OUTPUT_COLOR} = {};", FragmentShaderBuilder::sample(VARYING_TEXCOORD)));
        let shader = builder.build();
        assert!(!shader.source.contains(UNIFORM_BLOCK));
        assert!(shader.uniforms.is_empty());
    }
}
