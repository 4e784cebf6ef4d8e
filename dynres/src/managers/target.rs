use glam::{Mat4, UVec2};
use wgpu::{
    Color, CommandEncoder, Device, Extent3d, LoadOp, Operations, Queue, RenderPass, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, Texture, TextureDescriptor, TextureDimension,
    TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::{
    caster::{ShadowCaster, ShadowDraw, ShadowMeshSource},
    control::ResolutionController,
    error::TargetInitializationError,
    format_sso,
    passes::{CompositeBlitArgs, CompositePass, CompositePassNewArgs, ShadowCastPass},
    types::{ShadowMapOptions, TargetOptions},
    util::math::nearest_pot_clamped,
    INTERNAL_DEPTH_FORMAT, INTERNAL_SHADOW_DEPTH_FORMAT,
};

/// Internal color resolution for a window, after the fixed factor.
fn internal_extent(window: UVec2, fixed_factor: f32) -> UVec2 {
    UVec2::new(
        ((window.x as f32 * fixed_factor) as u32).max(1),
        ((window.y as f32 * fixed_factor) as u32).max(1),
    )
}

/// Shadow map dimensions for a window.
fn shadow_extent(window: UVec2, options: &ShadowMapOptions, fixed_factor: f32) -> UVec2 {
    let scale = options.size_multiplier * fixed_factor;
    let axis = |dimension: u32| ((dimension as f32 * scale).round() as u32).clamp(1, options.max_dimension.max(1));

    let mut extent = if options.force_square {
        UVec2::splat(axis(window.x.max(window.y)))
    } else {
        UVec2::new(axis(window.x), axis(window.y))
    };

    if let Some(bounds) = options.pot_snap {
        extent.x = nearest_pot_clamped(extent.x, bounds.min, bounds.max);
        extent.y = nearest_pot_clamped(extent.y, bounds.min, bounds.max);
    }

    extent
}

/// Round-robin bookkeeping over the ping-ponged slots, kept apart from the GPU
/// objects so the lag semantics stay testable.
///
/// Slot `active` is the one written this frame; the slot *displayed* (and the
/// shadow map *sampled*) is the oldest written one, `(active + 1) % N`, which
/// with `N` slots is `N - 1` frames old. Each slot remembers the resolution
/// factors in effect when it was written, because that is the factor the
/// composite shader has to sample it with.
#[derive(Debug, Clone)]
struct SlotRotation {
    active: usize,
    color_factors: Vec<f32>,
    shadow_factors: Vec<f32>,
}

impl SlotRotation {
    fn new(count: usize) -> Self {
        debug_assert!(count >= 1);
        Self {
            active: 0,
            color_factors: vec![1.0; count],
            shadow_factors: vec![1.0; count],
        }
    }

    fn slot_count(&self) -> usize {
        self.color_factors.len()
    }

    fn active(&self) -> usize {
        self.active
    }

    fn sample_index(&self) -> usize {
        (self.active + 1) % self.slot_count()
    }

    fn advance(&mut self) {
        self.active = (self.active + 1) % self.slot_count();
    }

    fn record_color(&mut self, factor: f32) {
        self.color_factors[self.active] = factor;
    }

    fn record_shadow(&mut self, factor: f32) {
        self.shadow_factors[self.active] = factor;
    }

    fn sampled_color_factor(&self) -> f32 {
        self.color_factors[self.sample_index()]
    }

    fn sampled_shadow_factor(&self) -> f32 {
        self.shadow_factors[self.sample_index()]
    }
}

/// Per-frame call ordering, verified in debug builds. Violations render wrong,
/// they do not corrupt memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FramePhase {
    Idle,
    ShadowRecorded,
    ColorRecorded,
}

struct TargetSlot {
    _color: Texture,
    color_view: TextureView,
    _depth: Texture,
    depth_view: TextureView,
    _shadow: Texture,
    shadow_view: TextureView,
}

/// Where the scene ends up when no scaling is active, and where the composite
/// writes its output.
pub struct ColorPassTarget<'a> {
    pub view: &'a TextureView,
    /// Only used when rendering straight to the surface or when depth
    /// passthrough is enabled.
    pub depth: Option<&'a TextureView>,
}

pub struct ShadowPassArgs<'a, S: ShadowMeshSource> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,

    pub source: &'a S,
    pub casters: &'a [ShadowCaster<S::Part>],
    /// Light view-projection, usually [`ShadowFit::view_proj`](crate::ShadowFit).
    pub view_proj: Mat4,
}

pub struct CompositeArgs<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,

    pub target: ColorPassTarget<'a>,
}

/// Owns the ping-ponged color and shadow render targets, the adaptive
/// resolution feedback loop and the passes gluing them to the screen.
///
/// Per frame, in order: [`render_shadow_pass`](Self::render_shadow_pass) (when
/// shadows are wanted), [`begin_color_pass`](Self::begin_color_pass) plus the
/// caller's scene drawing, then exactly one [`composite`](Self::composite).
/// One instance per renderer, owned by the render thread; concurrent use is
/// not supported.
pub struct RenderTargetManager {
    options: TargetOptions,
    shadow_options: ShadowMapOptions,
    fixed_factor: f32,

    window_extent: UVec2,
    internal_extent: UVec2,
    shadow_extent: UVec2,

    slots: Vec<TargetSlot>,
    rotation: SlotRotation,
    controller: ResolutionController,

    composite: CompositePass,
    shadow_cast: ShadowCastPass,

    phase: FramePhase,
}

impl RenderTargetManager {
    /// Builds the composite and shadow pipelines. A validation failure here is
    /// the single fatal error path of the whole subsystem: without these
    /// shaders no useful rendering is possible.
    ///
    /// The targets are unsized until the first [`resize`](Self::resize).
    pub fn new(
        device: &Device,
        options: TargetOptions,
        shadow_options: ShadowMapOptions,
    ) -> Result<Self, TargetInitializationError> {
        profiling::scope!("RenderTargetManager::new");

        let composite = CompositePass::new(CompositePassNewArgs {
            device,
            output_format: options.surface_format,
            filter: options.filter,
            depth_passthrough: options.depth_passthrough,
        })?;
        let shadow_cast = ShadowCastPass::new(device)?;

        let fixed_factor = options.sanitized_fixed_factor();
        let slot_count = options.slot_count.max(1);
        let controller = ResolutionController::new(options.target_fps, options.dynamic_resolution);

        Ok(Self {
            options,
            shadow_options,
            fixed_factor,
            window_extent: UVec2::ZERO,
            internal_extent: UVec2::ZERO,
            shadow_extent: UVec2::ZERO,
            slots: Vec::new(),
            rotation: SlotRotation::new(slot_count),
            controller,
            composite,
            shadow_cast,
            phase: FramePhase::Idle,
        })
    }

    /// Tears down and recreates every slot's textures for the new window size.
    /// Callable repeatedly; the same size produces the same targets.
    pub fn resize(&mut self, device: &Device, window: UVec2) {
        profiling::scope!("RenderTargetManager::resize");

        let window = window.max(UVec2::ONE);
        self.window_extent = window;
        self.internal_extent = self.clamp_to_device_limits(device, internal_extent(window, self.fixed_factor));
        self.shadow_extent =
            self.clamp_to_device_limits(device, shadow_extent(window, &self.shadow_options, self.fixed_factor));

        self.slots.clear();
        for idx in 0..self.rotation.slot_count() {
            self.slots
                .push(create_slot(device, idx, self.internal_extent, self.shadow_extent, &self.options));
        }
    }

    fn clamp_to_device_limits(&self, device: &Device, extent: UVec2) -> UVec2 {
        let max_dimension = device.limits().max_texture_dimension_2d;
        if extent.x > max_dimension || extent.y > max_dimension {
            // Soft failure: the target will render at the clamped size and
            // stretch, it will not crash.
            log::error!(
                "render target extent {}x{} exceeds the device limit of {}, clamping",
                extent.x,
                extent.y,
                max_dimension
            );
            extent.min(UVec2::splat(max_dimension))
        } else {
            extent
        }
    }

    fn scaling_active(&self) -> bool {
        self.options.dynamic_resolution || self.fixed_factor < 1.0
    }

    /// The resolution factor applied to the viewports this frame.
    fn current_factor(&self) -> f32 {
        if self.scaling_active() {
            self.controller.factor()
        } else {
            1.0
        }
    }

    /// Renders every caster into the current slot's shadow map: expands
    /// capsules, uploads the per-object uniforms, then records the depth-only
    /// pass at the dynamically scaled viewport.
    pub fn render_shadow_pass<S: ShadowMeshSource>(&mut self, args: ShadowPassArgs<'_, S>) {
        profiling::scope!("RenderTargetManager::render_shadow_pass");
        assert!(!self.slots.is_empty(), "resize() must be called before rendering");
        debug_assert_eq!(self.phase, FramePhase::Idle, "shadow pass must open the frame");

        let factor = self.current_factor();
        self.rotation.record_shadow(factor);
        self.phase = FramePhase::ShadowRecorded;

        let mut draws: Vec<ShadowDraw<S::Part>> = Vec::with_capacity(args.casters.len());
        for caster in args.casters {
            draws.extend(caster.expand());
        }
        self.shadow_cast.upload(args.device, args.queue, args.view_proj, &draws);

        let slot = &self.slots[self.rotation.active()];
        let label = format_sso!("shadow pass slot {}", self.rotation.active());
        let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &slot.shadow_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });

        let viewport = self.shadow_extent.as_vec2() * factor;
        rpass.set_viewport(0.0, 0.0, viewport.x.max(1.0), viewport.y.max(1.0), 0.0, 1.0);

        self.shadow_cast.record(&mut rpass, args.source, &draws);
    }

    /// Opens the scene render pass. With scaling active it targets the current
    /// slot at the dynamically scaled viewport; otherwise it targets the
    /// surface directly at full size. Color and depth are cleared.
    pub fn begin_color_pass<'a>(
        &'a mut self,
        encoder: &'a mut CommandEncoder,
        surface: ColorPassTarget<'a>,
    ) -> RenderPass<'a> {
        profiling::scope!("RenderTargetManager::begin_color_pass");
        assert!(!self.slots.is_empty(), "resize() must be called before rendering");
        debug_assert_ne!(self.phase, FramePhase::ColorRecorded, "one color pass per frame");

        let factor = self.current_factor();
        self.rotation.record_color(factor);
        self.phase = FramePhase::ColorRecorded;

        let scaling_active = self.scaling_active();
        let slot = &self.slots[self.rotation.active()];

        let (color_view, depth_view) = if scaling_active {
            (&slot.color_view, Some(&slot.depth_view))
        } else {
            (surface.view, surface.depth)
        };

        let label = format_sso!("color pass slot {}", self.rotation.active());
        let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: depth_view.map(|view| RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });

        if scaling_active {
            let viewport = self.internal_extent.as_vec2() * factor;
            rpass.set_viewport(0.0, 0.0, viewport.x.max(1.0), viewport.y.max(1.0), 0.0, 1.0);
        }

        rpass
    }

    /// Mandatory once per displayed frame. Stretches the slot written `N - 1`
    /// frames ago onto the surface (when scaling is active), rotates the
    /// slots, and runs the feedback control step.
    pub fn composite(&mut self, args: CompositeArgs<'_>, delta_seconds: f32) {
        profiling::scope!("RenderTargetManager::composite");
        debug_assert_eq!(self.phase, FramePhase::ColorRecorded, "composite follows the color pass");
        self.phase = FramePhase::Idle;

        if self.scaling_active() {
            let slot = &self.slots[self.rotation.sample_index()];
            self.composite.blit(CompositeBlitArgs {
                device: args.device,
                queue: args.queue,
                encoder: args.encoder,
                source: &slot.color_view,
                source_depth: self.options.depth_passthrough.then_some(&slot.depth_view),
                target: args.target.view,
                target_depth: args.target.depth,
                window_extent: self.window_extent,
                factor: self.rotation.sampled_color_factor(),
            });
        }

        self.rotation.advance();

        if self.controller.step(delta_seconds) {
            log::debug!("{}", self.status_line());
        }
    }

    /// The shadow map the main pass should sample this frame: the one of the
    /// slot written `N - 1` frames ago, not the one just rendered.
    pub fn shadow_map_view(&self) -> &TextureView {
        assert!(!self.slots.is_empty(), "resize() must be called before rendering");
        &self.slots[self.rotation.sample_index()].shadow_view
    }

    /// Resolution factor the sampled shadow map was rendered with; feeds the
    /// consuming shader's texture lookup scaling.
    pub fn shadow_map_factor(&self) -> f32 {
        self.rotation.sampled_shadow_factor()
    }

    pub fn dynamic_resolution_factor(&self) -> f32 {
        self.controller.factor()
    }

    pub fn set_dynamic_resolution(&mut self, enabled: bool) {
        self.controller.set_enabled(enabled);
    }

    pub fn set_target_fps(&mut self, target_fps: f32) {
        self.controller.set_target_fps(target_fps);
    }

    pub fn window_extent(&self) -> UVec2 {
        self.window_extent
    }

    pub fn internal_extent(&self) -> UVec2 {
        self.internal_extent
    }

    pub fn shadow_extent(&self) -> UVec2 {
        self.shadow_extent
    }

    /// Human readable summary of the feedback loop and the currently rendered
    /// internal resolution.
    pub fn status_line(&self) -> String {
        let scaled = (self.internal_extent.as_vec2() * self.current_factor()).as_uvec2();
        self.controller.status_line(scaled)
    }
}

fn create_slot(
    device: &Device,
    index: usize,
    internal: UVec2,
    shadow: UVec2,
    options: &TargetOptions,
) -> TargetSlot {
    profiling::scope!("render target slot creation");

    let make_texture = |label: &str, extent: UVec2, format| {
        let label = format_sso!("{label} {index}");
        device.create_texture(&TextureDescriptor {
            label: Some(&label),
            size: Extent3d {
                width: extent.x,
                height: extent.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    };

    let color = make_texture("color target", internal, options.color_format);
    let depth = make_texture("depth target", internal, INTERNAL_DEPTH_FORMAT);
    let shadow = make_texture("shadow target", shadow, INTERNAL_SHADOW_DEPTH_FORMAT);

    let color_view = color.create_view(&TextureViewDescriptor::default());
    let depth_view = depth.create_view(&TextureViewDescriptor::default());
    let shadow_view = shadow.create_view(&TextureViewDescriptor::default());

    TargetSlot {
        _color: color,
        color_view,
        _depth: depth,
        depth_view,
        _shadow: shadow,
        shadow_view,
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use crate::types::{PotBounds, ShadowMapOptions};

    use super::{internal_extent, shadow_extent, SlotRotation};

    #[test]
    fn internal_extent_applies_fixed_factor() {
        assert_eq!(internal_extent(UVec2::new(1920, 1080), 0.5), UVec2::new(960, 540));
        assert_eq!(internal_extent(UVec2::new(1920, 1080), 1.0), UVec2::new(1920, 1080));
        // Never collapses to zero.
        assert_eq!(internal_extent(UVec2::new(4, 4), 0.1), UVec2::ONE);
    }

    #[test]
    fn sizing_is_idempotent() {
        let options = ShadowMapOptions::default();
        let window = UVec2::new(1377, 841);
        assert_eq!(
            internal_extent(window, 0.75),
            internal_extent(window, 0.75)
        );
        assert_eq!(
            shadow_extent(window, &options, 0.75),
            shadow_extent(window, &options, 0.75)
        );
    }

    #[test]
    fn shadow_extent_clamps_and_squares() {
        // round(1920 * 1.5) = 2880, clamped to 2048, forced square.
        let options = ShadowMapOptions {
            size_multiplier: 1.5,
            max_dimension: 2048,
            force_square: true,
            pot_snap: None,
        };
        assert_eq!(shadow_extent(UVec2::new(1920, 1080), &options, 1.0), UVec2::splat(2048));
    }

    #[test]
    fn shadow_extent_per_axis_when_not_square() {
        let options = ShadowMapOptions {
            size_multiplier: 1.0,
            max_dimension: 4096,
            force_square: false,
            pot_snap: None,
        };
        assert_eq!(
            shadow_extent(UVec2::new(1920, 1080), &options, 1.0),
            UVec2::new(1920, 1080)
        );
    }

    #[test]
    fn shadow_extent_respects_fixed_factor_and_pot_snap() {
        let options = ShadowMapOptions {
            size_multiplier: 1.5,
            max_dimension: 4096,
            force_square: true,
            pot_snap: Some(PotBounds { min: 256, max: 2048 }),
        };
        // round(1920 * 1.5 * 0.5) = 1440, nearest pot 1024.
        assert_eq!(
            shadow_extent(UVec2::new(1920, 1080), &options, 0.5),
            UVec2::splat(1024)
        );
    }

    #[test]
    fn rotation_round_trips_after_n_advances() {
        for count in 1..=4 {
            let mut rotation = SlotRotation::new(count);
            let start = rotation.active();
            for _ in 0..count {
                rotation.advance();
            }
            assert_eq!(rotation.active(), start);
        }
    }

    #[test]
    fn single_slot_samples_itself() {
        let rotation = SlotRotation::new(1);
        assert_eq!(rotation.sample_index(), rotation.active());
    }

    #[test]
    fn two_slots_sample_the_previous_frame() {
        let mut rotation = SlotRotation::new(2);

        rotation.record_color(0.5);
        rotation.advance();
        // The slot written last frame (factor 0.5) is the one displayed now.
        rotation.record_color(0.75);
        assert_eq!(rotation.sampled_color_factor(), 0.5);

        rotation.advance();
        assert_eq!(rotation.sampled_color_factor(), 0.75);
    }

    #[test]
    fn shadow_factor_history_follows_the_same_lag() {
        let mut rotation = SlotRotation::new(2);
        rotation.record_shadow(0.3);
        rotation.advance();
        rotation.record_shadow(0.9);
        assert_eq!(rotation.sampled_shadow_factor(), 0.3);
    }
}
