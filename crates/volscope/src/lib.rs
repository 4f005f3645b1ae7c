//! volscope-rs: GPU volume rendering and position picking for 3D voxel data.
//!
//! Register voxel grids, describe how scalar values map to color and opacity
//! with editable transfer functions, and draw them as volume nodes. Any
//! screen pixel can be resolved to the world position where its view ray
//! first meets visible material.
//!
//! # Quick Start
//!
//! ```no_run
//! use volscope::*;
//!
//! fn main() -> Result<()> {
//!     let mut scene = new_headless_scene(640, 480)?;
//!
//!     // A 2x2x2 volume, fully opaque under the default ramp
//!     let grid = VoxelGrid::from_u8(UVec3::splat(2), vec![255; 8]);
//!     let volume = scene.add_volume(grid, Some("cube"))?;
//!     scene.add_volume_node(VolumeNode::new(volume), Some("cube node"))?;
//!
//!     scene.fit_camera();
//!     scene.render_to_file("cube.png")?;
//!     if let Some(p) = scene.pick_position(320, 240)? {
//!         println!("hit at {p}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`VoxelGrid`] - Raw voxel bytes with dimensions, spacing and depth
//! - [`TransferFunction`] - Four control-point curves compiled to an RGBA table
//! - [`VolumeNode`] - One volume drawn through one transfer function
//! - [`Scene`] - Registry of all three, kept in sync with a backend
//!
//! The scene is generic over [`VolumeBackend`] and [`PickBackend`]; the
//! wgpu [`RenderEngine`] implements both.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod headless;
mod scene;

pub use headless::{new_headless_scene, new_headless_scene_with_options, HeadlessScene};
pub use scene::Scene;

// Re-export core types
pub use volscope_core::{
    vl, Channel, ControlPoint, FormatError, NamedMap, NodeDraw, Options, PickBackend, PickHit,
    PickingEngine, Registry, Result, ShaderKind, TfState, TransferFunction, VolscopeError,
    VolumeBackend, VolumeNode, VolumeUniforms, VoxelGrid, DEFAULT_TRANSFER_FUNCTION,
};
pub use volscope_core::{Mat4, UVec3, Vec3, Vec4};

// Re-export render types
pub use volscope_render::{save_image, Camera, ProjectionMode, RenderEngine, RenderError};
