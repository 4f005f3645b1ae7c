use volscope_core::{NodeDraw, ShaderKind};

use super::pipelines::FRAME_FORMAT;
use super::RenderEngine;
use crate::error::{RenderError, RenderResult};
use crate::volume_render::{VolumeBindings, VolumeRenderData, PROXY_CUBE_VERTEX_COUNT};

impl RenderEngine {
    /// Draws `nodes` in order into an offscreen frame and returns its RGBA8 pixels.
    ///
    /// Nodes whose textures are not resident are skipped. The returned buffer
    /// holds `width * height * 4` bytes, row by row from the top-left.
    pub fn render_nodes(&mut self, nodes: &[NodeDraw<'_>]) -> RenderResult<Vec<u8>> {
        self.update_camera_uniforms();

        let mut draws = Vec::with_capacity(nodes.len());
        for draw in nodes {
            let pipeline = match draw.shader {
                ShaderKind::Raymarch => &self.raymarch_pipeline,
                ShaderKind::MaximumIntensity => &self.mip_pipeline,
                ShaderKind::PickPosition => {
                    log::warn!("node '{}': the pick shader cannot draw a color frame", draw.node);
                    continue;
                }
            };
            let (volume_view, lut_view) =
                match (self.volume_view(draw.volume), self.lut_view(draw.transfer_function)) {
                    (Ok(volume_view), Ok(lut_view)) => (volume_view, lut_view),
                    (Err(err), _) | (_, Err(err)) => {
                        log::warn!("skipping node '{}': {err}", draw.node);
                        continue;
                    }
                };
            let data = VolumeRenderData::new(
                &self.device,
                &self.volume_bind_group_layout,
                &VolumeBindings {
                    camera_buffer: &self.camera_buffer,
                    proxy_cube_buffer: &self.proxy_cube_buffer,
                    volume_view,
                    lut_view,
                    sampler: &self.volume_sampler,
                },
                &draw.uniforms,
            );
            draws.push((pipeline, data));
        }

        let frame_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame texture"),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let frame_view = frame_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row = Self::aligned_bytes_per_row(self.width);
        let frame_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Volume Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            for (pipeline, data) in &draws {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &data.bind_group, &[]);
                pass.draw(0..PROXY_CUBE_VERTEX_COUNT, 0..1);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &frame_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &frame_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = frame_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        for row in data.chunks_exact(bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }
        drop(data);
        frame_buffer.unmap();

        log::debug!(
            "rendered {} of {} nodes at {}x{}",
            draws.len(),
            nodes.len(),
            self.width,
            self.height
        );
        Ok(pixels)
    }

    fn aligned_bytes_per_row(width: u32) -> u32 {
        let bytes_per_pixel = 4u32; // RGBA8
        let unaligned = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }
}
