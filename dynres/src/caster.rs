//! The boundary between the shadow pass and the consumer's mesh library.

use arrayvec::ArrayVec;
use glam::{Mat4, Vec3};
use wgpu::RenderPass;

/// Low level mesh drawing primitives the shadow pass calls into.
///
/// The implementation owns the vertex/index buffers and knows how to issue the
/// indexed draw for each of its parts; the shadow pass owns the pipeline and
/// the per-object uniforms.
pub trait ShadowMeshSource {
    /// Identifier of one drawable mesh range.
    type Part: Copy;

    /// Binds the vertex and index buffers. Called once per shadow pass,
    /// before any [`draw`](Self::draw).
    fn bind<'a>(&'a self, rpass: &mut RenderPass<'a>);

    /// Issues the indexed draw call for one part.
    fn draw<'a>(&'a self, rpass: &mut RenderPass<'a>, part: Self::Part);
}

/// One object to render into the shadow map.
///
/// A capsule is not directly drawable: it expands into a cylinder lateral
/// surface and two hemispherical caps, each with its own derived transform and
/// scaling. The variant carries the part handles for those primitives itself,
/// so the shadow pass never has to know about any concrete mesh.
#[derive(Debug, Copy, Clone)]
pub enum ShadowCaster<P> {
    Mesh {
        part: P,
        transform: Mat4,
        scaling: Vec3,
    },
    Capsule {
        lateral: P,
        upper_cap: P,
        lower_cap: P,
        transform: Mat4,
        radius: f32,
        /// Height of the cylindrical section, caps excluded.
        cylinder_height: f32,
    },
}

/// A single expanded draw: a unit mesh part, its model matrix and the scaling
/// the shadow shader applies to positions before the mvp transform.
#[derive(Debug, Copy, Clone)]
pub(crate) struct ShadowDraw<P> {
    pub part: P,
    pub model: Mat4,
    pub scaling: Vec3,
}

impl<P: Copy> ShadowCaster<P> {
    pub(crate) fn expand(&self) -> ArrayVec<ShadowDraw<P>, 3> {
        let mut draws = ArrayVec::new();
        match *self {
            ShadowCaster::Mesh { part, transform, scaling } => {
                draws.push(ShadowDraw {
                    part,
                    model: transform,
                    scaling,
                });
            }
            ShadowCaster::Capsule {
                lateral,
                upper_cap,
                lower_cap,
                transform,
                radius,
                cylinder_height,
            } => {
                let half_height = cylinder_height * 0.5;
                draws.push(ShadowDraw {
                    part: lateral,
                    model: transform,
                    scaling: Vec3::new(radius, cylinder_height, radius),
                });
                draws.push(ShadowDraw {
                    part: upper_cap,
                    model: transform * Mat4::from_translation(Vec3::new(0.0, half_height, 0.0)),
                    scaling: Vec3::splat(radius),
                });
                draws.push(ShadowDraw {
                    part: lower_cap,
                    model: transform * Mat4::from_translation(Vec3::new(0.0, -half_height, 0.0)),
                    scaling: Vec3::splat(radius),
                });
            }
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::ShadowCaster;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Part {
        Box,
        Cylinder,
        CapUp,
        CapDown,
    }

    #[test]
    fn mesh_passes_through() {
        let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let caster = ShadowCaster::Mesh {
            part: Part::Box,
            transform,
            scaling: Vec3::new(2.0, 1.0, 2.0),
        };

        let draws = caster.expand();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].part, Part::Box);
        assert_eq!(draws[0].model, transform);
        assert_eq!(draws[0].scaling, Vec3::new(2.0, 1.0, 2.0));
    }

    #[test]
    fn capsule_expands_into_three_draws() {
        let transform = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        let caster = ShadowCaster::Capsule {
            lateral: Part::Cylinder,
            upper_cap: Part::CapUp,
            lower_cap: Part::CapDown,
            transform,
            radius: 0.5,
            cylinder_height: 2.0,
        };

        let draws = caster.expand();
        assert_eq!(draws.len(), 3);

        assert_eq!(draws[0].part, Part::Cylinder);
        assert_eq!(draws[0].model, transform);
        assert_eq!(draws[0].scaling, Vec3::new(0.5, 2.0, 0.5));

        // Caps sit at the cylinder ends, in the capsule's local space.
        assert_eq!(draws[1].part, Part::CapUp);
        assert_eq!(draws[1].model.w_axis.truncate(), Vec3::new(0.0, 6.0, 0.0));
        assert_eq!(draws[1].scaling, Vec3::splat(0.5));

        assert_eq!(draws[2].part, Part::CapDown);
        assert_eq!(draws[2].model.w_axis.truncate(), Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(draws[2].scaling, Vec3::splat(0.5));
    }

    #[test]
    fn capsule_cap_offset_rotates_with_the_transform() {
        let transform = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let caster = ShadowCaster::Capsule {
            lateral: Part::Cylinder,
            upper_cap: Part::CapUp,
            lower_cap: Part::CapDown,
            transform,
            radius: 1.0,
            cylinder_height: 4.0,
        };

        let draws = caster.expand();
        // Local +Y maps to world -X under a 90 degree Z rotation.
        let upper = draws[1].model.w_axis.truncate();
        assert!((upper - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
    }
}
