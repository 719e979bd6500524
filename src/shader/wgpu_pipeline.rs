//! wgpu-based filter chain.
//!
//! Each stage gets its own render pipeline and uniform buffer. Frames are
//! uploaded once, drawn through every stage into intermediate textures and
//! the last texture is read back.

use super::{GpuContext, LinkedProgram, ProgramCache, ShaderPipeline};
use crate::error::FilterError;
use crate::filters::{set_stage_uniform, FilterStage};
use crate::frame::{Frame, PixelFormat, QuadVertex};
use crate::uniform::{UniformBlock, UniformValue};
use anyhow::{anyhow, Context, Result};
use std::borrow::Cow;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

/// Default vertex shader in WGSL.
const VERTEX_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coords: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(in.position, 0.0, 1.0);
    out.tex_coords = in.tex_coords;
    return out;
}
"#;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Smallest uniform buffer bound for a stage, also used when a stage has no
/// uniform block.
const MIN_UNIFORM_BUFFER: u64 = 16;

/// GPU filter chain using wgpu.
pub struct WgpuPipeline {
    context: GpuContext,
    stages: Vec<FilterStage>,
    cache: ProgramCache,
    vertex_module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    bind_group_layout: wgpu::BindGroupLayout,
    render_pipelines: Vec<wgpu::RenderPipeline>,
    uniform_buffers: Vec<wgpu::Buffer>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    // Size-dependent resources
    input_texture: Option<wgpu::Texture>,
    output_textures: Vec<wgpu::Texture>,
    readback_buffer: Option<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
    cached_width: u32,
    cached_height: u32,
}

impl WgpuPipeline {
    /// Links every stage and creates its render pipeline.
    pub fn new(context: GpuContext, stages: Vec<FilterStage>) -> Result<Self> {
        let device = &context.device;

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(VERTEX_SHADER)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Filter Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(QuadVertex::VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(QuadVertex::INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut pipeline = Self {
            context,
            stages,
            cache: ProgramCache::new(),
            vertex_module,
            pipeline_layout,
            bind_group_layout,
            render_pipelines: Vec::new(),
            uniform_buffers: Vec::new(),
            vertex_buffer,
            index_buffer,
            sampler,
            input_texture: None,
            output_textures: Vec::new(),
            readback_buffer: None,
            bind_groups: Vec::new(),
            cached_width: 0,
            cached_height: 0,
        };
        pipeline.relink()?;
        Ok(pipeline)
    }

    /// Relinks every stage from scratch and re-resolves its uniform handles.
    pub fn relink(&mut self) -> Result<()> {
        self.cache.clear();
        self.render_pipelines.clear();
        self.uniform_buffers.clear();

        for (i, stage) in self.stages.iter_mut().enumerate() {
            let program = stage
                .link(&mut self.cache)
                .with_context(|| format!("linking stage {} ({})", i, stage.filter().name()))?;
            let render_pipeline = Self::create_render_pipeline(
                &self.context.device,
                &self.pipeline_layout,
                &self.vertex_module,
                &program,
                i,
            );
            self.render_pipelines.push(render_pipeline);

            let size = u64::from(program.block_size()).max(MIN_UNIFORM_BUFFER).next_multiple_of(16);
            self.uniform_buffers.push(self.context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Uniform Buffer {}", i)),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        // Bind groups reference the uniform buffers just replaced.
        self.cached_width = 0;
        self.cached_height = 0;
        info!(
            "Linked {} filter stages ({} distinct programs)",
            self.stages.len(),
            self.cache.len()
        );
        Ok(())
    }

    fn create_render_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        vertex_module: &wgpu::ShaderModule,
        program: &LinkedProgram,
        index: usize,
    ) -> wgpu::RenderPipeline {
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("Fragment Shader {}", index)),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(program.wgsl().to_string())),
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("Render Pipeline {}", index)),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(LinkedProgram::ENTRY_POINT),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Adjusts a parameter of stage `index`; takes effect on the next frame.
    pub fn set_uniform(&mut self, index: usize, name: &str, value: UniformValue) -> Result<(), FilterError> {
        set_stage_uniform(&mut self.stages, index, name, value)
    }

    pub fn adapter_name(&self) -> String {
        self.context.adapter_name()
    }

    fn padded_bytes_per_row(width: u32) -> u32 {
        (width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
    }

    /// Update or create cached textures/buffers if dimensions changed
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if self.cached_width == width && self.cached_height == height {
            return;
        }
        info!("Creating GPU resources ({}x{})", width, height);
        let device = &self.context.device;
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let input_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Input Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.output_textures = (0..self.render_pipelines.len())
            .map(|i| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("Intermediate Texture {}", i)),
                    size: extent,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: TEXTURE_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::COPY_SRC
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
            })
            .collect();

        self.readback_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(Self::padded_bytes_per_row(width)) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }));

        self.bind_groups = (0..self.render_pipelines.len())
            .map(|i| {
                let source = if i == 0 { &input_texture } else { &self.output_textures[i - 1] };
                let view = source.create_view(&wgpu::TextureViewDescriptor::default());
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Bind Group {}", i)),
                    layout: &self.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                        wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                        wgpu::BindGroupEntry { binding: 2, resource: self.uniform_buffers[i].as_entire_binding() },
                    ],
                })
            })
            .collect();

        self.input_texture = Some(input_texture);
        self.cached_width = width;
        self.cached_height = height;
    }

    /// Pushes every stage's current values into its uniform buffer.
    fn upload_uniforms(&self) -> Result<()> {
        for (i, stage) in self.stages.iter().enumerate() {
            let Some(program) = stage.program() else {
                return Err(FilterError::HandlesUnresolved {
                    filter: stage.filter().name().to_string(),
                }
                .into());
            };
            if program.block_size() == 0 {
                continue;
            }
            let mut block = UniformBlock::new(program.block_size());
            stage.push_values(&mut block)?;
            self.context.queue.write_buffer(&self.uniform_buffers[i], 0, block.as_bytes());
        }
        Ok(())
    }
}

impl ShaderPipeline for WgpuPipeline {
    fn process_frame(&mut self, input: &Frame) -> Result<Frame> {
        let start = std::time::Instant::now();
        let rgba_input = input.to_rgba();
        if self.render_pipelines.is_empty() {
            return Ok(rgba_input);
        }
        let (width, height) = (rgba_input.width, rgba_input.height);
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot filter an empty {}x{} frame", width, height));
        }

        self.ensure_resources(width, height);
        self.upload_uniforms()?;

        let input_texture = self.input_texture.as_ref().ok_or_else(|| anyhow!("input texture missing"))?;
        let readback_buffer = self.readback_buffer.as_ref().ok_or_else(|| anyhow!("readback buffer missing"))?;
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let queue = &self.context.queue;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: input_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba_input.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent,
        );

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Filter Encoder") });

        for (i, pipeline) in self.render_pipelines.iter().enumerate() {
            let output_view = self.output_textures[i].create_view(&wgpu::TextureViewDescriptor::default());
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("Render Pass {}", i)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.bind_groups[i], &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..QuadVertex::INDICES.len() as u32, 0, 0..1);
        }

        let padded_row = Self::padded_bytes_per_row(width);
        let final_texture = self
            .output_textures
            .last()
            .ok_or_else(|| anyhow!("no output texture"))?;
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: final_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );

        queue.submit(std::iter::once(encoder.finish()));
        debug!("  [Perf] Filter Dispatch: {:?}", start.elapsed());

        let readback_start = std::time::Instant::now();
        let buffer_slice = readback_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| anyhow!("GPU poll failed: {:?}", e))?;
        receiver.recv()??;

        let row_bytes = (width * 4) as usize;
        let mut output_data = Vec::with_capacity(row_bytes * height as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in data.chunks(padded_row as usize).take(height as usize) {
                output_data.extend_from_slice(&row[..row_bytes]);
            }
        }
        readback_buffer.unmap();

        debug!("  [Perf] GPU Readback: {:?}", readback_start.elapsed());
        debug!("  [Perf] TOTAL FRAME: {:?}", start.elapsed());

        Frame::from_data(width, height, PixelFormat::Rgba, output_data)
    }
}
