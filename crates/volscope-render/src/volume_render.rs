//! Proxy geometry and per-node GPU resources for volume drawing.
//!
//! Every volume node is drawn as the cube `[-1, 1]^3` transformed by the
//! node's model matrix. Only back faces are rasterized; the fragment shader
//! walks the view ray from the cube entry point to the back-face fragment.

use volscope_core::VolumeUniforms;
use wgpu::util::DeviceExt;

/// Vertices in the proxy cube: 6 faces, 2 triangles each.
pub const PROXY_CUBE_VERTEX_COUNT: u32 = 36;

/// Generates the proxy cube as a non-indexed triangle list.
///
/// Triangles wind counter-clockwise seen from outside the cube.
#[must_use]
pub fn generate_proxy_cube() -> Vec<[f32; 4]> {
    // Face order: +X, -X, +Y, -Y, +Z, -Z
    const FACES: [[[f32; 3]; 4]; 6] = [
        [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]],
        [[-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]],
        [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
        [[-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0]],
        [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
        [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]],
    ];

    FACES
        .iter()
        .flat_map(|quad| [0, 1, 2, 0, 2, 3].map(|corner| quad[corner]))
        .map(|[x, y, z]| [x, y, z, 1.0])
        .collect()
}

/// GPU resources for drawing one volume node.
pub struct VolumeRenderData {
    /// Node uniform buffer.
    pub uniform_buffer: wgpu::Buffer,
    /// Bind group (Group 0).
    pub bind_group: wgpu::BindGroup,
}

/// Views and buffers shared by every node's bind group.
pub struct VolumeBindings<'a> {
    pub camera_buffer: &'a wgpu::Buffer,
    pub proxy_cube_buffer: &'a wgpu::Buffer,
    pub volume_view: &'a wgpu::TextureView,
    pub lut_view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

impl VolumeRenderData {
    /// Creates the uniform buffer and bind group for one node.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
        bindings: &VolumeBindings<'_>,
        uniforms: &VolumeUniforms,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("volume uniforms"),
            contents: bytemuck::cast_slice(&[*uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("volume bind group"),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: bindings.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: bindings.proxy_cube_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(bindings.volume_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(bindings.lut_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(bindings.sampler),
                },
            ],
        });

        Self {
            uniform_buffer,
            bind_group,
        }
    }

    /// Updates the uniform buffer.
    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &VolumeUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }
}
