//! Traits implemented by rendering services.
//!
//! The core never talks to a GPU directly. A rendering service exposes
//! texture residency and drawing through [`VolumeBackend`], and the
//! single-pixel render/readback primitives picking needs through
//! [`PickBackend`]. `volscope-render` implements both on top of wgpu.

use glam::{Vec3, Vec4};

use crate::error::Result;
use crate::volume::VoxelGrid;
use crate::volume_node::{ShaderKind, VolumeUniforms};

/// Everything a backend needs to draw one node.
///
/// The shader is passed explicitly so callers can override a node's own
/// selection (picking draws with [`ShaderKind::PickPosition`]) without
/// touching the node.
#[derive(Debug, Clone, Copy)]
pub struct NodeDraw<'a> {
    /// Registry name of the node.
    pub node: &'a str,
    /// Registry name of the volume texture to sample.
    pub volume: &'a str,
    /// Registry name of the lookup-table texture to sample.
    pub transfer_function: &'a str,
    /// Program to draw with.
    pub shader: ShaderKind,
    /// Serialized node parameters.
    pub uniforms: VolumeUniforms,
}

/// GPU residency and drawing of volumes and lookup tables.
pub trait VolumeBackend {
    /// Creates or refreshes the 3D texture for `name`.
    fn upload_volume(&mut self, name: &str, grid: &VoxelGrid) -> Result<()>;

    /// Drops the 3D texture for `name`, if any.
    fn release_volume(&mut self, name: &str);

    /// Creates or refreshes the 1D RGBA lookup-table texture for `name`.
    fn upload_transfer_function(&mut self, name: &str, table: &[u8]) -> Result<()>;

    /// Drops the lookup-table texture for `name`, if any.
    fn release_transfer_function(&mut self, name: &str);

    /// Draws `nodes` in order into an offscreen frame and returns RGBA8 pixels.
    fn render_frame(&mut self, nodes: &[NodeDraw<'_>]) -> Result<Vec<u8>>;
}

/// Primitives for GPU position picking.
///
/// A query calls [`Self::begin_pick`] once, [`Self::render_pick_pixel`] per
/// candidate node, and always finishes with [`Self::end_pick`], even when a
/// candidate failed.
pub trait PickBackend {
    /// Current viewport size in pixels.
    fn viewport_size(&self) -> (u32, u32);

    /// World-space position of the eye.
    fn eye_position(&self) -> Vec3;

    /// (Re)allocates the offscreen pick target.
    fn allocate_pick_target(&mut self, width: u32, height: u32) -> Result<()>;

    /// Restricts subsequent pick renders to the pixel `(x, y)`.
    fn begin_pick(&mut self, x: u32, y: u32) -> Result<()>;

    /// Clears the target, draws one node and reads back the query pixel as floats.
    ///
    /// Fails with [`crate::VolscopeError::NotFound`] when the node's GPU
    /// resources are not resident.
    fn render_pick_pixel(&mut self, draw: &NodeDraw<'_>) -> Result<Vec4>;

    /// Restores default render state after a query.
    fn end_pick(&mut self);
}
