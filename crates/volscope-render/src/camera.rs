//! The viewing camera shared by frame and pick passes.

use glam::{Mat4, Vec3};

/// How the camera projects the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Rays fan out from the eye.
    Perspective,
    /// Rays run parallel to the view direction.
    Orthographic,
}

/// A look-at camera. The volume shaders derive their rays from
/// `position` and [`Camera::forward`].
#[derive(Debug, Clone)]
pub struct Camera {
    /// Eye position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Viewport width over height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub projection_mode: ProjectionMode,
    /// Half the visible height in orthographic mode.
    pub ortho_scale: f32,
}

impl Camera {
    /// A perspective camera three units up the z axis, looking at the origin.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_scale: 1.0,
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection for the current mode. The orthographic depth range always
    /// spans the eye-to-target distance plus the far plane.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                let depth = (self.position.distance(self.target) + self.far)
                    .max(self.ortho_scale * 100.0);
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    -depth,
                    depth,
                )
            }
        }
    }

    /// Unit view direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Frames an axis-aligned box: looks at its center from the +z side and
    /// sizes the clip planes and orthographic extent to fit it.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let extents = max - min;
        let diagonal = extents.length();

        self.target = center;
        self.position = center + Vec3::Z * (diagonal * 1.5);
        self.near = diagonal * 0.001;
        self.far = diagonal * 100.0;
        self.ortho_scale = (extents.y.max(extents.x / self.aspect_ratio) * 0.6).max(0.1);
    }
}
