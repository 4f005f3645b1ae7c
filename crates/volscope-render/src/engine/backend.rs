use glam::{Vec3, Vec4};
use volscope_core::{NodeDraw, PickBackend, Result, VolumeBackend, VoxelGrid};

use super::RenderEngine;

impl VolumeBackend for RenderEngine {
    fn upload_volume(&mut self, name: &str, grid: &VoxelGrid) -> Result<()> {
        Ok(self.upload_volume_texture(name, grid)?)
    }

    fn release_volume(&mut self, name: &str) {
        self.remove_volume_texture(name);
    }

    fn upload_transfer_function(&mut self, name: &str, table: &[u8]) -> Result<()> {
        Ok(self.upload_lut_texture(name, table)?)
    }

    fn release_transfer_function(&mut self, name: &str) {
        self.remove_lut_texture(name);
    }

    fn render_frame(&mut self, nodes: &[NodeDraw<'_>]) -> Result<Vec<u8>> {
        Ok(self.render_nodes(nodes)?)
    }
}

impl PickBackend for RenderEngine {
    fn viewport_size(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn eye_position(&self) -> Vec3 {
        self.camera.position
    }

    fn allocate_pick_target(&mut self, width: u32, height: u32) -> Result<()> {
        Ok(self.init_pick_buffers(width, height)?)
    }

    fn begin_pick(&mut self, x: u32, y: u32) -> Result<()> {
        Ok(self.begin_pick_region(x, y)?)
    }

    fn render_pick_pixel(&mut self, draw: &NodeDraw<'_>) -> Result<Vec4> {
        Ok(self.render_pick_pixel_for(draw)?)
    }

    fn end_pick(&mut self) {
        self.end_pick_region();
    }
}
