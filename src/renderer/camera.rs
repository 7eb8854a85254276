//! Orbital viewport camera

use glam::{Mat4, Vec3};

/// Camera orbiting a target point, driven by drag/zoom input from the
/// shell. The core only ever reads the derived matrices.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Point the camera looks at (render units)
    pub target: Vec3,
    /// Distance from the target
    pub distance: f32,
    /// Rotation around Y (rad)
    pub azimuth: f32,
    /// Elevation above the XZ plane (rad)
    pub elevation: f32,
    /// Vertical field of view (rad)
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 4.0,
            azimuth: 0.0,
            elevation: 0.35,
            fov: 45.0_f32.to_radians(),
            near: 0.01,
            far: 200.0,
        }
    }
}

impl Camera {
    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect_ratio, self.near, self.far)
    }

    pub fn view_projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        self.projection_matrix(aspect_ratio) * self.view_matrix()
    }

    /// Drag rotation.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.azimuth += delta_x * 0.01;
        self.elevation = (self.elevation + delta_y * 0.01).clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );
    }

    /// Wheel zoom; never descends into the globe.
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta * 0.1)).clamp(1.05, 80.0);
    }

    /// Recenter on the globe.
    pub fn reset(&mut self) {
        self.target = Vec3::ZERO;
        self.distance = 4.0;
    }
}

/// Camera data as the shaders see it.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera, aspect_ratio: f32) -> Self {
        let pos = camera.position();
        Self {
            view_proj: camera
                .view_projection_matrix(aspect_ratio)
                .to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            proj: camera.projection_matrix(aspect_ratio).to_cols_array_2d(),
            camera_pos: [pos.x, pos.y, pos.z, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_on_orbit_sphere() {
        let camera = Camera::default();
        assert!((camera.position().length() - camera.distance).abs() < 1.0e-5);
    }

    #[test]
    fn test_zoom_clamped_above_globe() {
        let mut camera = Camera::default();
        for _ in 0..100 {
            camera.zoom(5.0);
        }
        assert!(camera.distance >= 1.05);
    }
}
