use glam::{Mat4, Vec3};

use crate::render_graph::TextureId;

/// A directional light plus the shadow map an earlier stage rendered for it.
/// `matrix` takes world positions into the shadow map's clip space.
pub struct Light {
    pub direction: Vec3,
    pub matrix: Mat4,
    pub shadow_map: TextureId,
}

impl Light {
    /// `direction` is the direction the light travels in; `extent` is the
    /// radius of the world region the shadow map covers.
    pub fn directional(direction: Vec3, extent: f32, shadow_map: TextureId) -> Light {
        let direction = direction.normalize();

        let up = if direction.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(-direction * extent, Vec3::ZERO, up);
        let projection =
            Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.0, 2.0 * extent);

        Light {
            direction,
            matrix: projection * view,
            shadow_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn direction_is_normalized() {
        let light = Light::directional(Vec3::new(0.0, -10.0, 0.0), 20.0, 0);
        assert!((light.direction.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn world_origin_projects_to_the_shadow_map_center() {
        let light = Light::directional(Vec3::new(-0.5, -1.0, -0.3), 25.0, 0);

        let projected = light.matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = projected / projected.w;

        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        // Halfway between the near and far planes.
        assert!((ndc.z - 0.5).abs() < 1e-4);
    }

    #[test]
    fn straight_down_light_does_not_degenerate() {
        let light = Light::directional(Vec3::new(0.0, -1.0, 0.0), 10.0, 0);
        assert!(light.matrix.is_finite());
    }
}
