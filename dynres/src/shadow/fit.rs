use glam::{Mat4, Vec3, Vec4};

use crate::types::CameraFrustum;

/// Nudge applied to degenerate inputs instead of rejecting them. A pathological
/// camera yields a pathological (but finite) shadow matrix, never a crash.
const DEGENERACY_EPSILON: f32 = 1e-4;

/// A tightly fit orthographic light space for a directional light.
///
/// The camera frustum is enclosed in a sphere of `radius` around `center`; the
/// orthographic box is `[-radius, radius]` in light space X/Y with depth
/// spanning `[0, 2 * radius]` along the light direction.
#[derive(Debug, Copy, Clone)]
pub struct ShadowFit {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub center: Vec3,
    pub radius: f32,
}

impl ShadowFit {
    /// World-space size of one shadow map texel, given the shadow map
    /// resolution. Feed this back as `texel_increment` on the next fit to keep
    /// the light box stable under camera movement.
    pub fn texel_size(&self, resolution: u32) -> f32 {
        2.0 * self.radius / resolution.max(1) as f32
    }

    /// The matrix the consuming per-object shader samples the shadow map with.
    ///
    /// Composes the bias with the view-projection and the inverse of the
    /// *camera* view matrix: the consuming shader reconstructs shadow
    /// coordinates from view-space positions, not world-space ones.
    pub fn biased_view_proj(&self, inverse_camera_view: Mat4) -> Mat4 {
        bias_matrix() * self.view_proj * inverse_camera_view
    }
}

/// Maps NDC X/Y from `[-1, 1]` to texture space `[0, 1]` with Y flipped.
/// Depth passes through, already being `[0, 1]` in wgpu clip space.
pub fn bias_matrix() -> Mat4 {
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5, 0.5, 0.0, 1.0),
    )
}

/// Fits an orthographic light view-projection around the camera frustum.
///
/// The fit works on the frustum's minimal bounding sphere, so it is invariant
/// under camera rotation. With `texel_increment > 0` two stabilization steps
/// run on top: the radius is rounded up to a whole texel multiple (the box
/// never changes size under small camera moves) and the translation of the
/// result is snapped to a fixed world-space texel lattice (the box only ever
/// moves in whole-texel jumps). Together these eliminate shadow edge swimming.
/// `texel_increment <= 0` disables both, for when the shadow map size is not
/// yet known.
pub fn fit_directional_shadow(camera: &CameraFrustum, light_direction: Vec3, texel_increment: f32) -> ShadowFit {
    let aspect = if camera.aspect_ratio == 0.0 {
        DEGENERACY_EPSILON
    } else {
        camera.aspect_ratio
    };
    let near = camera.near;
    let far = if camera.far <= near { near + DEGENERACY_EPSILON } else { camera.far };

    // Tangent squared of the half-angle of the frustum's *diagonal* field of
    // view: the worst-case cone enclosing the frustum regardless of aspect.
    let tan_half = (camera.vertical_fov * 0.5).tan();
    let tan2_diagonal = tan_half * tan_half * (1.0 + aspect * aspect);

    // Optimal bounding sphere center sits past the geometric mid plane,
    // compensating for the wide-angle corners, but never past the far plane.
    let mid = (near + far) * 0.5;
    let center_distance = (mid * (1.0 + tan2_diagonal)).min(far);

    let forward = non_degenerate_or(camera.forward, Vec3::NEG_Z);
    let center = camera.location + forward * center_distance;

    let far_gap = far - center_distance;
    let mut radius = (tan2_diagonal * far * far + far_gap * far_gap).sqrt();
    if texel_increment > 0.0 {
        radius = (radius / texel_increment).ceil() * texel_increment;
    }
    if radius <= 0.0 {
        radius = DEGENERACY_EPSILON;
    }

    let dir = non_degenerate_or(light_direction, Vec3::NEG_Y);
    let up = if dir.cross(Vec3::Y).length_squared() < DEGENERACY_EPSILON * DEGENERACY_EPSILON {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let view = Mat4::look_at_rh(center - dir * radius, center, up);
    let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, 2.0 * radius);
    let mut view_proj = proj * view;

    if texel_increment > 0.0 {
        // Snap the translation to a fixed lattice: as the frustum center moves
        // continuously, the discretized light-space origin only jumps in whole
        // increments, removing sub-texel shimmer from the translation.
        let lattice = 2.0 * texel_increment;
        let origin = view_proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        view_proj.w_axis.x += ((origin.x / lattice).round() - origin.x / lattice) * lattice;
        view_proj.w_axis.y += ((origin.y / lattice).round() - origin.y / lattice) * lattice;
    }

    ShadowFit {
        view,
        proj,
        view_proj,
        center,
        radius,
    }
}

fn non_degenerate_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let normalized = v.normalize_or_zero();
    if normalized == Vec3::ZERO {
        fallback
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec4};

    use crate::types::CameraFrustum;

    use super::{bias_matrix, fit_directional_shadow};

    fn test_camera() -> CameraFrustum {
        CameraFrustum {
            location: Vec3::new(3.0, 1.5, -4.0),
            forward: Vec3::new(0.0, 0.0, -1.0),
            vertical_fov: 45_f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near: 0.5,
            far: 20.0,
        }
    }

    #[test]
    fn center_sits_between_mid_plane_and_far_plane() {
        let camera = test_camera();
        let fit = fit_directional_shadow(&camera, Vec3::new(0.0, -1.0, 0.0), 0.0);

        let center_distance = (fit.center - camera.location).length();
        let mid = (camera.near + camera.far) * 0.5;
        assert!(center_distance > mid, "{center_distance} <= {mid}");
        assert!(center_distance < camera.far, "{center_distance} >= {}", camera.far);
    }

    #[test]
    fn sphere_encloses_far_plane_corners() {
        let camera = test_camera();
        let fit = fit_directional_shadow(&camera, Vec3::new(-0.5, -1.0, 0.2).normalize(), 0.0);

        let tan_half = (camera.vertical_fov * 0.5).tan();
        let half_height = camera.far * tan_half;
        let half_width = half_height * camera.aspect_ratio;
        let far_center = camera.location + camera.forward * camera.far;

        for sx in [-1.0_f32, 1.0] {
            for sy in [-1.0_f32, 1.0] {
                let corner = far_center + Vec3::X * (sx * half_width) + Vec3::Y * (sy * half_height);
                let distance = (corner - fit.center).length();
                assert!(distance <= fit.radius + 1e-3, "{distance} > {}", fit.radius);
            }
        }
    }

    #[test]
    fn ortho_box_spans_the_sphere_depth() {
        let camera = test_camera();
        let dir = Vec3::new(0.3, -1.0, 0.1).normalize();
        let fit = fit_directional_shadow(&camera, dir, 0.0);

        // Nearest and furthest sphere poles along the light direction map to
        // the wgpu depth range ends.
        let near_pole = fit.view_proj * (fit.center - dir * fit.radius).extend(1.0);
        let far_pole = fit.view_proj * (fit.center + dir * fit.radius).extend(1.0);
        assert!((near_pole.z / near_pole.w).abs() < 1e-3);
        assert!((far_pole.z / far_pole.w - 1.0).abs() < 1e-3);

        // The center projects to the middle of NDC.
        let center = fit.view_proj * fit.center.extend(1.0);
        assert!(center.x.abs() < 1e-3 && center.y.abs() < 1e-3);
    }

    #[test]
    fn texel_rounding_grows_radius_to_a_multiple() {
        let camera = test_camera();
        let raw = fit_directional_shadow(&camera, Vec3::NEG_Y, 0.0);
        let texel = 0.25;
        let fit = fit_directional_shadow(&camera, Vec3::NEG_Y, texel);

        assert!(fit.radius >= raw.radius);
        let multiple = fit.radius / texel;
        assert!((multiple - multiple.round()).abs() < 1e-3, "radius {} not texel aligned", fit.radius);
    }

    #[test]
    fn sub_texel_translation_does_not_move_the_snapped_matrix() {
        let light = Vec3::new(0.0, -1.0, 0.0);
        let mut camera = test_camera();
        let texel = fit_directional_shadow(&camera, light, 0.0).texel_size(2048);

        let before = fit_directional_shadow(&camera, light, texel);
        // Move the camera sideways by a fraction of one texel.
        camera.location += Vec3::new(0.31 * texel, 0.0, -0.17 * texel);
        let after = fit_directional_shadow(&camera, light, texel);

        assert_eq!(before.radius, after.radius);
        let delta = (after.view_proj.w_axis - before.view_proj.w_axis).abs();
        assert!(delta.max_element() < 1e-5, "translation moved by {delta:?}");
    }

    #[test]
    fn unsnapped_matrix_does_move() {
        // Sanity check of the previous test: without snapping the same camera
        // move visibly shifts the translation.
        let light = Vec3::new(0.0, -1.0, 0.0);
        let mut camera = test_camera();
        let before = fit_directional_shadow(&camera, light, 0.0);
        camera.location += Vec3::new(0.005, 0.0, -0.003);
        let after = fit_directional_shadow(&camera, light, 0.0);

        let delta = (after.view_proj.w_axis - before.view_proj.w_axis).abs();
        assert!(delta.max_element() > 1e-5);
    }

    #[test]
    fn degenerate_inputs_are_nudged_not_rejected() {
        let camera = CameraFrustum {
            location: Vec3::ZERO,
            forward: Vec3::ZERO,
            vertical_fov: 0.0,
            aspect_ratio: 0.0,
            near: 1.0,
            far: 1.0, // far <= near
        };
        let fit = fit_directional_shadow(&camera, Vec3::ZERO, -1.0);

        assert!(fit.radius > 0.0);
        assert!(fit.view_proj.is_finite());
    }

    #[test]
    fn light_parallel_to_up_gets_a_fallback_up_vector() {
        let camera = test_camera();
        let fit = fit_directional_shadow(&camera, Vec3::new(0.0, -1.0, 0.0), 0.0);
        assert!(fit.view.is_finite());
        assert!(fit.view.determinant().abs() > 1e-6);
    }

    #[test]
    fn bias_maps_ndc_to_texture_space() {
        let bias = bias_matrix();
        let lower_left = bias * Vec4::new(-1.0, -1.0, 0.0, 1.0);
        let upper_right = bias * Vec4::new(1.0, 1.0, 1.0, 1.0);

        // NDC (-1,-1) is the bottom left of the screen but the top left texel
        // row samples v=0, hence the Y flip.
        assert_eq!(lower_left.truncate(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(upper_right.truncate(), Vec3::new(1.0, 0.0, 1.0));
    }
}
