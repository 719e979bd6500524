//! Resolves declared uniforms against a linked program and uploads their values.

use super::{RenderContext, UniformBinding, UniformDecl, UniformLocation};
use crate::error::{FilterError, ShaderLinkError};
use crate::shader::{LinkedProgram, ProgramId};
use tracing::debug;

#[derive(Debug, Clone)]
struct Resolved {
    program: ProgramId,
    locations: Vec<UniformLocation>,
}

/// Maps one filter's declared uniforms onto the locations of its program.
///
/// Handles must be resolved once per link before any values can be pushed.
#[derive(Debug, Clone)]
pub struct UniformBinder {
    owner: String,
    declared: Vec<UniformDecl>,
    resolved: Option<Resolved>,
}

impl UniformBinder {
    pub fn new(owner: impl Into<String>, declared: Vec<UniformDecl>) -> Self {
        Self {
            owner: owner.into(),
            declared,
            resolved: None,
        }
    }

    pub fn declared(&self) -> &[UniformDecl] {
        &self.declared
    }

    /// The program the current handles belong to.
    pub fn program(&self) -> Option<ProgramId> {
        self.resolved.as_ref().map(|r| r.program)
    }

    /// Looks every declared uniform up in `program`.
    ///
    /// Fails if a declaration is missing or has a different type, or if the
    /// program carries a uniform nothing declared. On failure the previous
    /// handles are discarded.
    pub fn resolve_handles(&mut self, program: &LinkedProgram) -> Result<(), ShaderLinkError> {
        self.resolved = None;

        let mut locations = Vec::with_capacity(self.declared.len());
        for decl in &self.declared {
            let reflected = program
                .uniform(decl.name)
                .ok_or_else(|| ShaderLinkError::MissingUniform {
                    name: decl.name.to_string(),
                })?;
            match reflected.location() {
                Some(location) if location.ty == decl.ty => locations.push(location),
                _ => {
                    return Err(ShaderLinkError::TypeMismatch {
                        name: decl.name.to_string(),
                        expected: decl.ty,
                        found: reflected.type_name.clone(),
                    })
                }
            }
        }

        if let Some(extra) = program
            .uniforms()
            .iter()
            .find(|u| !self.declared.iter().any(|d| d.name == u.name))
        {
            return Err(ShaderLinkError::UnboundUniform {
                name: extra.name.clone(),
            });
        }

        debug!("Resolved {} uniform handles for {} against {:?}", locations.len(), self.owner, program.id());
        self.resolved = Some(Resolved {
            program: program.id(),
            locations,
        });
        Ok(())
    }

    /// Writes each binding's value to its resolved location.
    ///
    /// `bindings` must match the declarations one to one, in order.
    pub fn push_values(&self, bindings: &[UniformBinding], ctx: &mut dyn RenderContext) -> Result<(), FilterError> {
        let resolved = self.resolved.as_ref().ok_or_else(|| FilterError::HandlesUnresolved {
            filter: self.owner.clone(),
        })?;

        if bindings.len() != self.declared.len() {
            return Err(FilterError::BindingMismatch {
                name: self.owner.clone(),
                reason: format!("{} values for {} declared uniforms", bindings.len(), self.declared.len()),
            });
        }

        // Nothing is written unless every binding matches.
        for (binding, decl) in bindings.iter().zip(&self.declared) {
            if binding.name != decl.name || binding.value.ty() != decl.ty {
                return Err(FilterError::BindingMismatch {
                    name: binding.name.to_string(),
                    reason: format!("expected {} {}, got {} {}", decl.ty, decl.name, binding.value.ty(), binding.name),
                });
            }
        }
        for (binding, location) in bindings.iter().zip(&resolved.locations) {
            binding.value.upload(*location, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{FragmentShaderBuilder, OUTPUT_COLOR, VARYING_TEXCOORD};
    use crate::uniform::testing::RecordingContext;
    use crate::uniform::UniformType;

    fn program_with(uniforms: &[(&'static str, UniformType)]) -> LinkedProgram {
        let mut builder = FragmentShaderBuilder::new();
        for (name, ty) in uniforms {
            builder.uniform(*name, *ty);
        }
        builder.line(format!("{OUTPUT_COLOR} = {};", FragmentShaderBuilder::sample(VARYING_TEXCOORD)));
        LinkedProgram::link(&builder.build().source).unwrap()
    }

    fn decls() -> Vec<UniformDecl> {
        vec![
            UniformDecl { name: "u_Start", ty: UniformType::Float },
            UniformDecl { name: "u_Center", ty: UniformType::Vec2 },
        ]
    }

    #[test]
    fn test_push_before_resolve_fails() {
        let binder = UniformBinder::new("test", decls());
        let mut ctx = RecordingContext::default();
        let err = binder.push_values(&[], &mut ctx).unwrap_err();
        assert!(matches!(err, FilterError::HandlesUnresolved { .. }));
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn test_resolve_then_push() {
        let program = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec2)]);
        let mut binder = UniformBinder::new("test", decls());
        binder.resolve_handles(&program).unwrap();
        assert_eq!(binder.program(), Some(program.id()));

        let mut ctx = RecordingContext::default();
        binder
            .push_values(
                &[
                    UniformBinding::float("u_Start", 0.3),
                    UniformBinding::vec2("u_Center", glam::Vec2::new(0.25, 0.75)),
                ],
                &mut ctx,
            )
            .unwrap();
        assert_eq!(ctx.calls, vec![(0, vec![0.3]), (8, vec![0.25, 0.75])]);
    }

    #[test]
    fn test_missing_uniform() {
        let program = program_with(&[("u_Start", UniformType::Float)]);
        let mut binder = UniformBinder::new("test", decls());
        let err = binder.resolve_handles(&program).unwrap_err();
        assert_eq!(err, ShaderLinkError::MissingUniform { name: "u_Center".into() });
        assert_eq!(binder.program(), None);
    }

    #[test]
    fn test_type_mismatch() {
        let program = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec3)]);
        let mut binder = UniformBinder::new("test", decls());
        let err = binder.resolve_handles(&program).unwrap_err();
        assert!(matches!(err, ShaderLinkError::TypeMismatch { ref name, expected: UniformType::Vec2, .. } if name == "u_Center"));
    }

    #[test]
    fn test_unbound_uniform() {
        let program = program_with(&[
            ("u_Start", UniformType::Float),
            ("u_Center", UniformType::Vec2),
            ("u_End", UniformType::Float),
        ]);
        let mut binder = UniformBinder::new("test", decls());
        let err = binder.resolve_handles(&program).unwrap_err();
        assert_eq!(err, ShaderLinkError::UnboundUniform { name: "u_End".into() });
    }

    #[test]
    fn test_relink_replaces_handles() {
        let first = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec2)]);
        let second = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec2)]);
        let mut binder = UniformBinder::new("test", decls());
        binder.resolve_handles(&first).unwrap();
        binder.resolve_handles(&second).unwrap();
        assert_eq!(binder.program(), Some(second.id()));
    }

    #[test]
    fn test_push_rejects_out_of_order_bindings() {
        let program = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec2)]);
        let mut binder = UniformBinder::new("test", decls());
        binder.resolve_handles(&program).unwrap();

        let mut ctx = RecordingContext::default();
        let err = binder
            .push_values(
                &[
                    UniformBinding::vec2("u_Center", glam::Vec2::ZERO),
                    UniformBinding::float("u_Start", 0.0),
                ],
                &mut ctx,
            )
            .unwrap_err();
        assert!(matches!(err, FilterError::BindingMismatch { .. }));
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn test_push_writes_nothing_when_a_later_binding_mismatches() {
        let program = program_with(&[("u_Start", UniformType::Float), ("u_Center", UniformType::Vec2)]);
        let mut binder = UniformBinder::new("test", decls());
        binder.resolve_handles(&program).unwrap();

        let mut ctx = RecordingContext::default();
        let err = binder
            .push_values(
                &[
                    UniformBinding::float("u_Start", 0.5),
                    UniformBinding::float("u_Center", 0.0),
                ],
                &mut ctx,
            )
            .unwrap_err();
        assert!(matches!(err, FilterError::BindingMismatch { ref name, .. } if name == "u_Center"));
        assert!(ctx.calls.is_empty());
    }
}
