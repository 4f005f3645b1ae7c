//! Rendering backend for volscope-rs.
//!
//! This crate provides the wgpu-based rendering engine, including:
//! - Headless device creation and camera management
//! - 3D volume and 1D lookup-table texture residency
//! - Ray-march, maximum intensity and position-encoding pipelines (WGSL)
//! - Pick target allocation and single-pixel readback
//! - Offscreen frame capture and image export
//!
//! [`RenderEngine`] implements the core's `VolumeBackend` and `PickBackend`.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel and texel math converts between u32 sizes and f32 coordinates
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod camera;
pub mod engine;
pub mod error;
pub mod screenshot;
pub mod volume_render;

pub use camera::{Camera, ProjectionMode};
pub use engine::{volume_texels, CameraUniforms, RenderEngine};
pub use error::{RenderError, RenderResult};
pub use screenshot::{save_image, ScreenshotError};
pub use volume_render::{generate_proxy_cube, VolumeRenderData, PROXY_CUBE_VERTEX_COUNT};
