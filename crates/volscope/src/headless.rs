//! Headless rendering API for volscope-rs.
//!
//! Creates a GPU device without a window, so scenes can be rendered to image
//! buffers or files and picked from tests, batch jobs and servers.

use std::path::Path;

use pollster::FutureExt;
use volscope_core::{Options, Result, VolscopeError};
use volscope_render::RenderEngine;

use crate::Scene;

/// A scene drawn by the wgpu engine.
pub type HeadlessScene = Scene<RenderEngine>;

/// Creates a scene backed by a headless GPU device with a `width` x `height` viewport.
///
/// # Example
/// ```no_run
/// use volscope::*;
///
/// let mut scene = new_headless_scene(512, 512).unwrap();
/// let volume = scene
///     .add_volume(VoxelGrid::from_u8(UVec3::splat(2), vec![255; 8]), None)
///     .unwrap();
/// scene.add_volume_node(VolumeNode::new(volume), None).unwrap();
/// scene.fit_camera();
/// let hit = scene.pick_position(256, 256).unwrap();
/// ```
pub fn new_headless_scene(width: u32, height: u32) -> Result<HeadlessScene> {
    new_headless_scene_with_options(width, height, Options::default())
}

/// Like [`new_headless_scene`], with explicit options.
pub fn new_headless_scene_with_options(
    width: u32,
    height: u32,
    options: Options,
) -> Result<HeadlessScene> {
    let _ = env_logger::try_init();

    let engine = RenderEngine::new_headless(width, height)
        .block_on()
        .map_err(|e| VolscopeError::Render(format!("Failed to create headless engine: {e}")))?;
    Scene::new(engine, options)
}

impl Scene<RenderEngine> {
    /// Points the camera at the bounding box of everything drawable.
    ///
    /// Leaves the camera alone when nothing is drawable.
    pub fn fit_camera(&mut self) {
        if let Some((min, max)) = self.world_bounds() {
            self.backend_mut().look_at_box(min, max);
        }
    }

    /// Resizes the viewport. The pick target follows on the next query.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend_mut().resize(width, height);
    }

    /// Renders one frame and saves it as a PNG or JPEG image.
    pub fn render_to_file(&mut self, filename: impl AsRef<Path>) -> Result<()> {
        let data = self.render_to_image()?;
        let (width, height) = self.backend().dimensions();
        volscope_render::save_image(filename, &data, width, height)
            .map_err(|e| VolscopeError::Render(format!("Failed to save image: {e}")))
    }
}
