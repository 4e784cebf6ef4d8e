//! Adaptive resolution render targets and directional shadow maps for wgpu.
//!
//! The crate owns three pieces that have to cooperate tightly in a real-time
//! renderer:
//!
//! - A [`RenderTargetManager`] holding N ping-ponged offscreen color targets
//!   and depth-only shadow maps, rendered at a feedback-controlled fraction of
//!   the window resolution and stretched back onto the surface with a single
//!   full-screen-triangle pass.
//! - A proportional feedback loop ([`ResolutionController`]) that shrinks and
//!   grows that fraction to hold a target frame rate.
//! - A shadow frustum fitter ([`fit_directional_shadow`]) producing a stable,
//!   tightly fit orthographic light view-projection for a directional light,
//!   with texel snapping to keep shadow edges from swimming as the camera
//!   moves.
//!
//! The per-frame protocol is strict: shadow pass, color pass, then exactly one
//! [`composite`](RenderTargetManager::composite). The manager is a plain owned
//! object with no interior locking; it belongs to the render thread.
//!
//! The shadow pipeline disables depth clipping, so the device needs
//! [`wgpu::Features::DEPTH_CLIP_CONTROL`].

mod caster;
mod control;
mod error;
mod managers;
mod passes;
mod shaders;
mod shadow;
mod types;

pub mod util;

pub use caster::{ShadowCaster, ShadowMeshSource};
pub use control::{ResolutionController, MIN_DYNAMIC_FACTOR};
pub use error::TargetInitializationError;
pub use managers::{ColorPassTarget, CompositeArgs, RenderTargetManager, ShadowPassArgs};
pub use shadow::{bias_matrix, fit_directional_shadow, ShadowFit};
pub use types::{CameraFrustum, PotBounds, ShadowMapOptions, TargetOptions, UpscaleFilter};

use wgpu::TextureFormat;

/// Format of the internal depth attachments.
pub const INTERNAL_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Format of the shadow map depth attachments.
pub const INTERNAL_SHADOW_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
