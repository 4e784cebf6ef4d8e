use glam::Vec3;
use wgpu::TextureFormat;

/// How the internal color buffer is filtered when stretched to the window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpscaleFilter {
    Point,
    Bilinear,
}

/// Inclusive bounds used when snapping shadow map dimensions to a power of
/// two. Bounds that are not powers of two themselves are snapped to their
/// nearest one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PotBounds {
    pub min: u32,
    pub max: u32,
}

/// Configuration for the color side of a [`RenderTargetManager`](crate::RenderTargetManager).
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOptions {
    /// Setpoint of the feedback loop, in frames per second.
    pub target_fps: f32,
    /// Enables the feedback-controlled resolution factor.
    pub dynamic_resolution: bool,
    /// Static resolution multiplier in `(0, 1]`, applied independently of the
    /// dynamic factor. 1.0 disables it. Out-of-range values are clamped, not
    /// rejected.
    pub fixed_resolution_factor: f32,
    /// Number of ping-ponged render target slots. With `N` slots the displayed
    /// image is the one written `N - 1` frames ago.
    pub slot_count: usize,
    pub filter: UpscaleFilter,
    /// Forward the internal depth buffer to the window during composite.
    pub depth_passthrough: bool,
    /// Format of the offscreen color buffers.
    pub color_format: TextureFormat,
    /// Format of the surface the composite pass writes to.
    pub surface_format: TextureFormat,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            target_fps: 35.0,
            dynamic_resolution: true,
            fixed_resolution_factor: 1.0,
            slot_count: 1,
            filter: UpscaleFilter::Bilinear,
            depth_passthrough: false,
            color_format: TextureFormat::Rgba8UnormSrgb,
            surface_format: TextureFormat::Bgra8UnormSrgb,
        }
    }
}

impl TargetOptions {
    /// Fixed factor with the silent out-of-range clamping applied: values at or
    /// below zero become 0.1, values above one become 1.0.
    pub(crate) fn sanitized_fixed_factor(&self) -> f32 {
        if self.fixed_resolution_factor <= 0.0 {
            0.1
        } else if self.fixed_resolution_factor > 1.0 {
            1.0
        } else {
            self.fixed_resolution_factor
        }
    }
}

/// Configuration for shadow map sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMapOptions {
    /// Shadow dimensions derive from `window dimension * size_multiplier`.
    pub size_multiplier: f32,
    /// Hard cap on either shadow dimension.
    pub max_dimension: u32,
    /// Use the larger window axis for both shadow dimensions.
    pub force_square: bool,
    /// Snap each dimension to the nearest power of two within these bounds.
    pub pot_snap: Option<PotBounds>,
}

impl Default for ShadowMapOptions {
    fn default() -> Self {
        Self {
            size_multiplier: 1.5,
            max_dimension: 2048,
            force_square: true,
            pot_snap: None,
        }
    }
}

/// The camera parameters the shadow fitter encloses.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraFrustum {
    pub location: Vec3,
    /// Normalized view direction.
    pub forward: Vec3,
    /// Vertical field of view, in radians.
    pub vertical_fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}
