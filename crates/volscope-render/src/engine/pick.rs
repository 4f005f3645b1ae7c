use glam::{Mat4, Vec3, Vec4};
use volscope_core::NodeDraw;

use super::pipelines::PICK_FORMAT;
use super::{CameraUniforms, RenderEngine};
use crate::error::{RenderError, RenderResult};
use crate::volume_render::{VolumeBindings, VolumeRenderData, PROXY_CUBE_VERTEX_COUNT};

/// Bytes per pick texel (four f32 channels).
const PICK_TEXEL_BYTES: u64 = 16;

impl RenderEngine {
    // ========== Pick System - GPU Resources ==========

    /// Sizes the pick viewport to `width` x `height`.
    ///
    /// Pick passes render into a single texel, the query pixel scaled up to
    /// fill it, so the GPU target is created once and only the logical size
    /// changes.
    pub fn init_pick_buffers(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if self.pick_buffer_size == (width, height) && self.pick_texture.is_some() {
            return Ok(());
        }

        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::TextureCreationFailed(format!(
                "pick viewport {width}x{height} outside 1..={max}"
            )));
        }

        if self.pick_texture.is_none() {
            let pick_texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Pick Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: PICK_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            self.pick_texture_view =
                Some(pick_texture.create_view(&wgpu::TextureViewDescriptor::default()));
            self.pick_texture = Some(pick_texture);

            // One row, padded to COPY_BYTES_PER_ROW_ALIGNMENT
            self.pick_staging_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Pick Staging Buffer"),
                size: u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }));
        }

        self.pick_buffer_size = (width, height);
        log::debug!("pick viewport set to {width}x{height}");
        Ok(())
    }

    /// Points pick renders at the pixel `(x, y)` of the pick viewport.
    pub fn begin_pick_region(&mut self, x: u32, y: u32) -> RenderResult<()> {
        let (width, height) = self.pick_buffer_size;
        if self.pick_texture.is_none() || x >= width || y >= height {
            return Err(RenderError::NoPickInProgress);
        }

        let mut uniforms = CameraUniforms::from_camera(&self.camera);
        let view_proj = pick_projection(x, y, width, height)
            * self.camera.projection_matrix()
            * self.camera.view_matrix();
        uniforms.view_proj = view_proj.to_cols_array_2d();
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        self.pick_pixel = Some((x, y));
        Ok(())
    }

    /// Ends the query started by [`Self::begin_pick_region`] and restores the frame camera.
    pub fn end_pick_region(&mut self) {
        if self.pick_pixel.take().is_some() {
            self.update_camera_uniforms();
        }
    }

    /// Draws one node with the position-encoding shader and reads back the query pixel.
    pub fn render_pick_pixel_for(&mut self, draw: &NodeDraw<'_>) -> RenderResult<Vec4> {
        if self.pick_pixel.is_none() {
            return Err(RenderError::NoPickInProgress);
        }
        let pick_view = self
            .pick_texture_view
            .as_ref()
            .ok_or(RenderError::NoPickInProgress)?;

        let data = VolumeRenderData::new(
            &self.device,
            &self.volume_bind_group_layout,
            &VolumeBindings {
                camera_buffer: &self.camera_buffer,
                proxy_cube_buffer: &self.proxy_cube_buffer,
                volume_view: self.volume_view(draw.volume)?,
                lut_view: self.lut_view(draw.transfer_function)?,
                sampler: &self.volume_sampler,
            },
            &draw.uniforms,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: pick_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // Background = miss; the target is a single texel
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.pick_pipeline);
            pass.set_bind_group(0, &data.bind_group, &[]);
            pass.draw(0..PROXY_CUBE_VERTEX_COUNT, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.read_pick_pixel()
    }

    /// Copies the pick texel to the staging buffer and decodes it.
    fn read_pick_pixel(&self) -> RenderResult<Vec4> {
        let pick_texture = self
            .pick_texture
            .as_ref()
            .ok_or(RenderError::NoPickInProgress)?;
        let staging_buffer = self
            .pick_staging_buffer
            .as_ref()
            .ok_or(RenderError::NoPickInProgress)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Readback Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: pick_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..PICK_TEXEL_BYTES);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        let data = buffer_slice.get_mapped_range();
        let pixel = decode_pick_texel(&data);
        drop(data);
        staging_buffer.unmap();

        Ok(pixel)
    }

    /// Current size of the pick viewport, `(0, 0)` before the first query.
    #[must_use]
    pub fn pick_buffer_size(&self) -> (u32, u32) {
        self.pick_buffer_size
    }
}

/// Clip-space transform that maps pixel `(x, y)` of a `width` x `height`
/// viewport onto the whole of a 1x1 target.
///
/// Applied after the projection, so depth and the interpolated positions the
/// ray setup reads are unchanged.
fn pick_projection(x: u32, y: u32, width: u32, height: u32) -> Mat4 {
    let (w, h) = (width as f32, height as f32);
    let center_x = 2.0 * (x as f32 + 0.5) / w - 1.0;
    let center_y = 1.0 - 2.0 * (y as f32 + 0.5) / h;
    Mat4::from_scale(Vec3::new(w, h, 1.0))
        * Mat4::from_translation(Vec3::new(-center_x, -center_y, 0.0))
}

/// Decodes one `Rgba32Float` texel from little-endian bytes.
fn decode_pick_texel(bytes: &[u8]) -> Vec4 {
    let mut channels = [0.0f32; 4];
    for (channel, chunk) in channels.iter_mut().zip(bytes.chunks_exact(4)) {
        *channel = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Vec4::from_array(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pick_texel() {
        let bytes: Vec<u8> = [0.25f32, -1.0, 0.5, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(decode_pick_texel(&bytes), Vec4::new(0.25, -1.0, 0.5, 1.0));
    }

    #[test]
    fn test_pick_projection_centers_query_pixel() {
        let (width, height) = (64, 48);
        let ndc_of_pixel = |px: f32, py: f32| {
            Vec3::new(2.0 * px / width as f32 - 1.0, 1.0 - 2.0 * py / height as f32, 0.5)
        };

        let pick = pick_projection(10, 7, width, height);
        let center = pick.project_point3(ndc_of_pixel(10.5, 7.5));
        assert!(center.x.abs() < 1e-5 && center.y.abs() < 1e-5);
        assert!((center.z - 0.5).abs() < 1e-6);

        // The query pixel's edges land on the 1x1 target's edges.
        let corner = pick.project_point3(ndc_of_pixel(10.0, 7.0));
        assert!((corner.x + 1.0).abs() < 1e-4 && (corner.y - 1.0).abs() < 1e-4);

        // A neighbour falls outside the target.
        let next = pick.project_point3(ndc_of_pixel(11.5, 7.5));
        assert!((next.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_pick_projection_keeps_clip_w() {
        let pick = pick_projection(0, 0, 2, 2);
        let clip = pick * Vec4::new(0.3, -0.2, 0.4, 2.0);
        assert_eq!(clip.w, 2.0);
        assert_eq!(clip.z, 0.4);
    }

    #[test]
    fn test_decode_miss_texel() {
        assert_eq!(decode_pick_texel(&[0u8; 16]).w, 0.0);
    }
}
