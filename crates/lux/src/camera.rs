use glam::{Mat4, Vec3};

#[derive(Clone, Copy)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    fov_degrees: f32,
    aspect_ratio: f32,
    near_plane: f32,
    far_plane: f32,
}

impl Camera {
    pub fn new_look_at(position: Vec3, target: Vec3, fov_degrees: f32, aspect_ratio: f32) -> Camera {
        Camera {
            position,
            target,
            fov_degrees,
            aspect_ratio,
            near_plane: 0.01,
            far_plane: 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn get_view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn get_projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect_ratio,
            self.near_plane,
            self.far_plane,
        )
    }

    pub fn get_near_plane(&self) -> f32 {
        self.near_plane
    }

    pub fn get_far_plane(&self) -> f32 {
        self.far_plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn view_places_the_camera_at_the_origin() {
        let camera = Camera::new_look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, 60.0, 16.0 / 9.0);

        let eye = camera.get_view() * Vec4::new(0.0, 2.0, 6.0, 1.0);
        assert!(eye.truncate().length() < 1e-5);
    }

    #[test]
    fn target_lands_on_the_negative_view_axis() {
        let camera = Camera::new_look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0, 1.0);

        let target = camera.get_view() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(target.x.abs() < 1e-5);
        assert!(target.y.abs() < 1e-5);
        assert!((target.z + 5.0).abs() < 1e-5);
    }
}
