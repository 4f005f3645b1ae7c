//! Core types for volscope-rs.
//!
//! This crate holds everything that does not need a GPU:
//! - [`VoxelGrid`] and the [`vl`] container codec
//! - [`TransferFunction`] curves and their compiled lookup tables
//! - [`VolumeNode`] parameters and their uniform serialization
//! - The named [`Registry`] and the [`PickingEngine`] query logic
//!
//! Rendering services plug in through the [`VolumeBackend`] and
//! [`PickBackend`] traits.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Voxel math mixes u32 dimensions, u64 indices and f32 positions
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod backend;
pub mod error;
pub mod options;
pub mod pick;
pub mod registry;
pub mod transfer_function;
pub mod vl;
pub mod volume;
pub mod volume_node;

pub use backend::{NodeDraw, PickBackend, VolumeBackend};
pub use error::{FormatError, Result, VolscopeError};
pub use options::{Options, DEFAULT_TRANSFER_FUNCTION};
pub use pick::{PickHit, PickingEngine};
pub use registry::{NamedMap, Registry};
pub use transfer_function::{Channel, ControlPoint, TfState, TransferFunction, MAX_TABLE_WIDTH};
pub use volume::VoxelGrid;
pub use volume_node::{ShaderKind, VolumeNode, VolumeUniforms};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec3, Vec4};
