use std::num::NonZeroU64;

use glam::{Mat4, Vec4};
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType,
    BufferBinding, BufferBindingType, BufferUsages, CompareFunction, DepthBiasState, DepthStencilState, Device, Face,
    FrontFace, MultisampleState, PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue,
    RenderPass, RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages,
    StencilState, VertexBufferLayout, VertexState, VertexStepMode,
};

use crate::{
    caster::{ShadowDraw, ShadowMeshSource},
    error::TargetInitializationError,
    shaders::wgsl_source,
    util::{bind_merge::BindGroupBuilder, buffer::WrappedPotBuffer, error_scope::ValidationErrorScope, math::round_up_pot},
    INTERNAL_SHADOW_DEPTH_FORMAT,
};

#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct ShadowObjectUniforms {
    mvp: Mat4,
    scaling: Vec4,
}

unsafe impl bytemuck::Zeroable for ShadowObjectUniforms {}
unsafe impl bytemuck::Pod for ShadowObjectUniforms {}

/// Depth-only rendering of shadow casters.
///
/// Front faces are culled to reduce peter-panning and depth clipping is
/// disabled so casters between the light and the fitted box still land in the
/// map; the device therefore needs [`wgpu::Features::DEPTH_CLIP_CONTROL`].
/// Per-object `{mvp, scaling}` uniforms live in one dynamically-offset buffer
/// uploaded before the pass starts.
pub(crate) struct ShadowCastPass {
    pipeline: RenderPipeline,
    object_bgl: BindGroupLayout,
    objects: WrappedPotBuffer,
    object_bg: Option<BindGroup>,
    stride: u64,
}

impl ShadowCastPass {
    pub fn new(device: &Device) -> Result<Self, TargetInitializationError> {
        profiling::scope!("ShadowCastPass::new");

        let scope = ValidationErrorScope::new(device);
        let vertex = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("shadow cast vert"),
            source: ShaderSource::Wgsl(wgsl_source("shadow.vert.wgsl")),
        });
        scope
            .end()
            .map_err(|source| TargetInitializationError::ShaderCreation {
                label: "shadow cast vertex",
                source,
            })?;

        let uniforms_size = std::mem::size_of::<ShadowObjectUniforms>() as u64;
        let object_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow object bgl"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(uniforms_size),
                },
                count: None,
            }],
        });

        let pll = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("shadow cast pass"),
            bind_group_layouts: &[&object_bgl],
            push_constant_ranges: &[],
        });

        let vertex_attributes = wgpu::vertex_attr_array![0 => Float32x3];

        let scope = ValidationErrorScope::new(device);
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("shadow cast pass"),
            layout: Some(&pll),
            vertex: VertexState {
                module: &vertex,
                entry_point: "vs_main",
                buffers: &[VertexBufferLayout {
                    array_stride: 12,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &vertex_attributes,
                }],
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: Some(Face::Front),
                unclipped_depth: true,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: INTERNAL_SHADOW_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            fragment: None,
            multiview: None,
        });
        scope
            .end()
            .map_err(|source| TargetInitializationError::PipelineCreation {
                label: "shadow cast",
                source,
            })?;

        let stride = round_up_pot(
            uniforms_size,
            device.limits().min_uniform_buffer_offset_alignment.max(16) as u64,
        );

        let objects = WrappedPotBuffer::new(
            device,
            stride,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            Some("shadow object uniforms"),
        );

        Ok(Self {
            pipeline,
            object_bgl,
            objects,
            object_bg: None,
            stride,
        })
    }

    /// Uploads the per-object uniforms for the expanded draw list. Must run
    /// before the shadow render pass opens.
    pub fn upload<P: Copy>(&mut self, device: &Device, queue: &Queue, view_proj: Mat4, draws: &[ShadowDraw<P>]) {
        profiling::scope!("ShadowCastPass::upload");

        if draws.is_empty() {
            return;
        }

        let mut data = vec![0_u8; draws.len() * self.stride as usize];
        for (idx, draw) in draws.iter().enumerate() {
            let uniforms = ShadowObjectUniforms {
                mvp: view_proj * draw.model,
                scaling: draw.scaling.extend(0.0),
            };
            let offset = idx * self.stride as usize;
            data[offset..offset + std::mem::size_of::<ShadowObjectUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));
        }

        let reallocated = self.objects.write_to_buffer(device, queue, &data);
        if reallocated || self.object_bg.is_none() {
            let mut bgb = BindGroupBuilder::new(Some("shadow object bg"));
            bgb.append(BindingResource::Buffer(BufferBinding {
                buffer: &self.objects,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ShadowObjectUniforms>() as u64),
            }));
            self.object_bg = Some(bgb.build(device, &self.object_bgl));
        }
    }

    /// Records one draw per expanded primitive, in upload order.
    pub fn record<'a, S: ShadowMeshSource>(
        &'a self,
        rpass: &mut RenderPass<'a>,
        source: &'a S,
        draws: &[ShadowDraw<S::Part>],
    ) {
        profiling::scope!("ShadowCastPass::record");

        if draws.is_empty() {
            return;
        }
        let Some(object_bg) = self.object_bg.as_ref() else {
            return;
        };

        rpass.set_pipeline(&self.pipeline);
        source.bind(rpass);
        for (idx, draw) in draws.iter().enumerate() {
            rpass.set_bind_group(0, object_bg, &[idx as u32 * self.stride as u32]);
            source.draw(rpass, draw.part);
        }
    }
}
