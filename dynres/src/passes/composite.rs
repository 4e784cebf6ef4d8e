use glam::{UVec2, Vec4};
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, Buffer,
    BufferBindingType, BufferDescriptor, BufferUsages, Color, ColorTargetState, ColorWrites, CommandEncoder,
    CompareFunction, DepthStencilState, Device, FilterMode, FragmentState, FrontFace, LoadOp, MultisampleState,
    Operations, PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource,
    ShaderStages, StencilState, TextureFormat, TextureSampleType, TextureView, TextureViewDimension, VertexState,
};

use crate::{
    error::TargetInitializationError,
    shaders::wgsl_source,
    types::UpscaleFilter,
    util::{bind_merge::BindGroupBuilder, error_scope::ValidationErrorScope},
    INTERNAL_DEPTH_FORMAT,
};

#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct CompositeUniforms {
    // xy window size, z resolution factor of the sampled slot, w unused
    screen_res_and_factor: Vec4,
}

unsafe impl bytemuck::Zeroable for CompositeUniforms {}
unsafe impl bytemuck::Pod for CompositeUniforms {}

pub(crate) struct CompositePassNewArgs<'a> {
    pub device: &'a Device,

    pub output_format: TextureFormat,
    pub filter: UpscaleFilter,
    pub depth_passthrough: bool,
}

pub(crate) struct CompositeBlitArgs<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,

    pub source: &'a TextureView,
    /// Must be Some iff the pass was created with depth passthrough.
    pub source_depth: Option<&'a TextureView>,
    pub target: &'a TextureView,
    /// Must be Some iff the pass was created with depth passthrough.
    pub target_depth: Option<&'a TextureView>,

    pub window_extent: UVec2,
    pub factor: f32,
}

/// Draws the (possibly downscaled) slot texture to the window with a single
/// full-screen triangle.
pub(crate) struct CompositePass {
    pipeline: RenderPipeline,
    bgl: BindGroupLayout,
    sampler: Sampler,
    uniform_buffer: Buffer,
    depth_passthrough: bool,
}

impl CompositePass {
    pub fn new(args: CompositePassNewArgs<'_>) -> Result<Self, TargetInitializationError> {
        profiling::scope!("CompositePass::new");

        let scope = ValidationErrorScope::new(args.device);
        let vertex = args.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("composite vert"),
            source: ShaderSource::Wgsl(wgsl_source("fullscreen.vert.wgsl")),
        });
        scope
            .end()
            .map_err(|source| TargetInitializationError::ShaderCreation {
                label: "composite vertex",
                source,
            })?;

        let fragment_file = match args.depth_passthrough {
            false => "composite.frag.wgsl",
            true => "composite-depth.frag.wgsl",
        };
        let scope = ValidationErrorScope::new(args.device);
        let fragment = args.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("composite frag"),
            source: ShaderSource::Wgsl(wgsl_source(fragment_file)),
        });
        scope
            .end()
            .map_err(|source| TargetInitializationError::ShaderCreation {
                label: "composite fragment",
                source,
            })?;

        let mut bgl_entries = vec![
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ];
        if args.depth_passthrough {
            bgl_entries.push(BindGroupLayoutEntry {
                binding: 3,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        let bgl = args.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("composite bgl"),
            entries: &bgl_entries,
        });

        let pll = args.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("composite pass"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let filter_mode = match args.filter {
            UpscaleFilter::Point => FilterMode::Nearest,
            UpscaleFilter::Bilinear => FilterMode::Linear,
        };
        let sampler = args.device.create_sampler(&SamplerDescriptor {
            label: Some("composite sampler"),
            mag_filter: filter_mode,
            min_filter: filter_mode,
            mipmap_filter: FilterMode::Nearest,
            ..SamplerDescriptor::default()
        });

        let uniform_buffer = args.device.create_buffer(&BufferDescriptor {
            label: Some("composite uniforms"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scope = ValidationErrorScope::new(args.device);
        let pipeline = args.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("composite pass"),
            layout: Some(&pll),
            vertex: VertexState {
                module: &vertex,
                entry_point: "vs_main",
                buffers: &[],
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: args.depth_passthrough.then(|| DepthStencilState {
                format: INTERNAL_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Always,
                stencil: StencilState::default(),
                bias: Default::default(),
            }),
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &fragment,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: args.output_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            multiview: None,
        });
        scope
            .end()
            .map_err(|source| TargetInitializationError::PipelineCreation {
                label: "composite",
                source,
            })?;

        Ok(Self {
            pipeline,
            bgl,
            sampler,
            uniform_buffer,
            depth_passthrough: args.depth_passthrough,
        })
    }

    pub fn blit(&self, args: CompositeBlitArgs<'_>) {
        profiling::scope!("composite");

        let uniforms = CompositeUniforms {
            screen_res_and_factor: Vec4::new(
                args.window_extent.x as f32,
                args.window_extent.y as f32,
                args.factor,
                0.0,
            ),
        };
        args.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut bgb = BindGroupBuilder::new(Some("composite src bg"));
        bgb.append(self.uniform_buffer.as_entire_binding())
            .append(BindingResource::Sampler(&self.sampler))
            .append(BindingResource::TextureView(args.source));
        if self.depth_passthrough {
            let source_depth = args
                .source_depth
                .expect("depth passthrough composite needs a source depth view");
            bgb.append(BindingResource::TextureView(source_depth));
        }
        let bg = bgb.build(args.device, &self.bgl);

        let depth_stencil_attachment = self.depth_passthrough.then(|| RenderPassDepthStencilAttachment {
            view: args
                .target_depth
                .expect("depth passthrough composite needs a target depth view"),
            depth_ops: Some(Operations {
                load: LoadOp::Clear(1.0),
                store: true,
            }),
            stencil_ops: None,
        });

        let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("composite pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: args.target,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bg, &[]);
        rpass.draw(0..3, 0..1);

        drop(rpass);
    }
}
