//! Volume nodes: one volume, one transfer function and the parameters to draw them.
//!
//! A node refers to its volume and transfer function by registry name. The
//! names are resolved by whoever draws the node; the node itself only carries
//! the geometry derived from its volume at bind time and the per-node
//! shading parameters. [`VolumeNode::uniforms`] is the single place those
//! parameters are serialized for the GPU.

use glam::{Mat4, UVec3, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::options::Options;
use crate::volume::VoxelGrid;

/// Shader program used to draw a volume node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderKind {
    /// Front-to-back emission/absorption ray-march through the transfer function.
    #[default]
    Raymarch,
    /// Maximum intensity projection along the view ray.
    MaximumIntensity,
    /// Writes the first opaque hit in local `[-1, 1]^3` space to RGB with A = 1,
    /// or A = 0 on a miss. Only used for picking.
    PickPosition,
}

impl ShaderKind {
    /// Display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ShaderKind::Raymarch => "raymarch",
            ShaderKind::MaximumIntensity => "maximum intensity",
            ShaderKind::PickPosition => "pick position",
        }
    }
}

/// GPU uniforms for one volume node.
/// Layout must match WGSL `VolumeUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct VolumeUniforms {
    /// Local proxy cube `[-1, 1]^3` to world.
    pub model: [[f32; 4]; 4],
    /// World to local proxy cube.
    pub inv_model: [[f32; 4]; 4],
    /// Background color blended behind the volume (RGBA).
    pub background: [f32; 4],
    /// World-space extent of the volume (xyz), w unused.
    pub scaling: [f32; 4],
    /// Voxel counts (xyz), w unused.
    pub resolution: [u32; 4],
    /// Multiplier applied to sampled color and opacity.
    pub intensity: f32,
    /// Ray-march samples across the proxy cube diagonal.
    pub step_count: u32,
    /// Opacity at which the pick shader reports a hit.
    pub pick_threshold: f32,
    /// Padding to 16-byte alignment.
    pub _pad: f32,
}

impl Default for VolumeUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            inv_model: Mat4::IDENTITY.to_cols_array_2d(),
            background: [0.0; 4],
            scaling: [1.0, 1.0, 1.0, 0.0],
            resolution: [1, 1, 1, 0],
            intensity: 1.0,
            step_count: 256,
            pick_threshold: 0.05,
            _pad: 0.0,
        }
    }
}

/// A renderable binding of a volume and a transfer function.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeNode {
    volume: Option<String>,
    transfer_function: Option<String>,
    shader: Option<ShaderKind>,
    intensity: f32,
    level_of_detail: f32,
    background: Vec4,
    transform: Mat4,
    resolution: UVec3,
    scaling: Vec3,
    enabled: bool,
}

impl Default for VolumeNode {
    fn default() -> Self {
        Self {
            volume: None,
            transfer_function: None,
            shader: None,
            intensity: 1.0,
            level_of_detail: 1.0,
            background: Vec4::ZERO,
            transform: Mat4::IDENTITY,
            resolution: UVec3::ZERO,
            scaling: Vec3::ZERO,
            enabled: true,
        }
    }
}

impl VolumeNode {
    /// Creates a node drawing the volume registered as `volume`.
    pub fn new(volume: impl Into<String>) -> Self {
        Self {
            volume: Some(volume.into()),
            ..Self::default()
        }
    }

    /// Registry name of the bound volume.
    #[must_use]
    pub fn volume(&self) -> Option<&str> {
        self.volume.as_deref()
    }

    pub fn set_volume(&mut self, name: impl Into<String>) -> &mut Self {
        self.volume = Some(name.into());
        self
    }

    /// Registry name of the bound transfer function.
    #[must_use]
    pub fn transfer_function(&self) -> Option<&str> {
        self.transfer_function.as_deref()
    }

    pub fn set_transfer_function(&mut self, name: impl Into<String>) -> &mut Self {
        self.transfer_function = Some(name.into());
        self
    }

    /// Selected shader, if one was chosen.
    #[must_use]
    pub fn shader(&self) -> Option<ShaderKind> {
        self.shader
    }

    pub fn set_shader(&mut self, shader: ShaderKind) -> &mut Self {
        self.shader = Some(shader);
        self
    }

    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) -> &mut Self {
        self.intensity = intensity.max(0.0);
        self
    }

    /// Sampling density relative to [`Options::raymarch_steps`].
    #[must_use]
    pub fn level_of_detail(&self) -> f32 {
        self.level_of_detail
    }

    pub fn set_level_of_detail(&mut self, level_of_detail: f32) -> &mut Self {
        self.level_of_detail = level_of_detail.max(0.0);
        self
    }

    #[must_use]
    pub fn background(&self) -> Vec4 {
        self.background
    }

    pub fn set_background(&mut self, background: Vec4) -> &mut Self {
        self.background = background;
        self
    }

    /// World transform applied on top of the volume's own scaling.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) -> &mut Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    /// Voxel counts of the bound volume (zero until bound).
    #[must_use]
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// World extent of the bound volume (zero until bound).
    #[must_use]
    pub fn scaling(&self) -> Vec3 {
        self.scaling
    }

    /// Whether geometry has been derived from a volume.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.resolution != UVec3::ZERO
    }

    /// Derives resolution and world scaling from `grid`.
    pub fn bind_volume(&mut self, grid: &VoxelGrid) {
        self.resolution = grid.dims();
        self.scaling = grid.world_size();
    }

    /// Fills in the transfer function and shader when the caller left them unset.
    pub fn apply_defaults(&mut self, options: &Options) {
        if self.transfer_function.is_none() {
            self.transfer_function = Some(options.default_transfer_function.clone());
        }
        if self.shader.is_none() {
            self.shader = Some(options.default_shader);
        }
    }

    /// Maps the local proxy cube `[-1, 1]^3` onto the volume's world extent.
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        self.transform * Mat4::from_scale(self.scaling * 0.5)
    }

    /// Transforms a local proxy-space point to world space, dividing by `w`.
    #[must_use]
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.model_matrix().project_point3(local)
    }

    /// Serializes the node's parameters into GPU uniforms.
    #[must_use]
    pub fn uniforms(&self, options: &Options) -> VolumeUniforms {
        let model = self.model_matrix();
        let steps = (options.raymarch_steps as f32 * self.level_of_detail).round();
        VolumeUniforms {
            model: model.to_cols_array_2d(),
            inv_model: model.inverse().to_cols_array_2d(),
            background: self.background.to_array(),
            scaling: self.scaling.extend(0.0).to_array(),
            resolution: self.resolution.extend(0).to_array(),
            intensity: self.intensity,
            step_count: (steps as u32).max(1),
            pick_threshold: options.pick_opacity_threshold,
            _pad: 0.0,
        }
    }
}
