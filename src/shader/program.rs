//! Linking generated GLSL into a program the GPU can run.
//!
//! Linking parses the fragment shader with naga, validates it, reflects the
//! uniform block and writes WGSL for wgpu. The reflection is what handle
//! resolution looks names up in.

use super::builder::UNIFORM_BINDING;
use crate::error::ShaderLinkError;
use crate::uniform::{UniformLocation, UniformType};
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ResourceBinding, Scalar, ShaderStage, TypeInner, VectorSize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one link. A relink always produces a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u64);

/// A uniform block member as seen by the linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedUniform {
    pub name: String,
    /// `None` when the member has a type no filter can upload.
    pub ty: Option<UniformType>,
    pub type_name: String,
    pub offset: u32,
}

impl ReflectedUniform {
    pub fn location(&self) -> Option<UniformLocation> {
        self.ty.map(|ty| UniformLocation {
            offset: self.offset,
            ty,
        })
    }
}

/// A validated program with its WGSL translation and uniform reflection.
#[derive(Debug)]
pub struct LinkedProgram {
    id: ProgramId,
    wgsl: String,
    uniforms: Vec<ReflectedUniform>,
    block_size: u32,
}

impl LinkedProgram {
    /// Entry point of the fragment stage in the generated WGSL.
    pub const ENTRY_POINT: &'static str = "main";

    /// Parses, validates and reflects a GLSL 450 fragment shader.
    pub fn link(glsl: &str) -> Result<Self, ShaderLinkError> {
        let mut frontend = Frontend::default();
        let options = Options::from(ShaderStage::Fragment);
        let module = frontend
            .parse(&options, glsl)
            .map_err(|e| ShaderLinkError::Parse(format!("{:?}", e)))?;

        let (uniforms, block_size) = reflect_uniform_block(&module);

        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        let info = validator
            .validate(&module)
            .map_err(|e| ShaderLinkError::Validation(format!("{:?}", e)))?;
        let wgsl = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
            .map_err(|e| ShaderLinkError::WgslOutput(format!("{:?}", e)))?;

        let id = ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed));
        debug!("Linked program {:?} ({} uniforms, {} byte block)", id, uniforms.len(), block_size);

        Ok(Self {
            id,
            wgsl,
            uniforms,
            block_size,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn wgsl(&self) -> &str {
        &self.wgsl
    }

    pub fn uniforms(&self) -> &[ReflectedUniform] {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&ReflectedUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Size in bytes of the uniform block, 0 if the program has none.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

fn reflect_uniform_block(module: &naga::Module) -> (Vec<ReflectedUniform>, u32) {
    let block_binding = ResourceBinding {
        group: 0,
        binding: UNIFORM_BINDING,
    };
    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform || var.binding.as_ref() != Some(&block_binding) {
            continue;
        }
        if let TypeInner::Struct { ref members, span } = module.types[var.ty].inner {
            let uniforms = members
                .iter()
                .map(|member| {
                    let (ty, type_name) = reflect_type(&module.types[member.ty].inner);
                    ReflectedUniform {
                        name: member.name.clone().unwrap_or_default(),
                        ty,
                        type_name,
                        offset: member.offset,
                    }
                })
                .collect();
            return (uniforms, span);
        }
    }
    (Vec::new(), 0)
}

fn reflect_type(inner: &TypeInner) -> (Option<UniformType>, String) {
    match *inner {
        TypeInner::Scalar(scalar) if scalar == Scalar::F32 => (Some(UniformType::Float), "float".into()),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => {
            let ty = match size {
                VectorSize::Bi => UniformType::Vec2,
                VectorSize::Tri => UniformType::Vec3,
                VectorSize::Quad => UniformType::Vec4,
            };
            (Some(ty), ty.glsl_name().into())
        }
        ref other => (None, format!("{:?}", other)),
    }
}

/// Linked programs keyed by their exact source text.
///
/// Identical filter configurations produce byte-identical sources and share
/// one program.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<String, Arc<LinkedProgram>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_link(&mut self, glsl: &str) -> Result<Arc<LinkedProgram>, ShaderLinkError> {
        if let Some(program) = self.programs.get(glsl) {
            return Ok(program.clone());
        }
        let program = Arc::new(LinkedProgram::link(glsl)?);
        self.programs.insert(glsl.to_string(), program.clone());
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Drops every program so the next lookup relinks.
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}
