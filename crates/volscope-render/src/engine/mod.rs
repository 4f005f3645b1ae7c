//! The main rendering engine.

mod backend;
mod pick;
mod pipelines;
mod rendering;
mod textures;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::camera::{Camera, ProjectionMode};
use crate::error::{RenderError, RenderResult};
use crate::volume_render::generate_proxy_cube;

pub use textures::volume_texels;

/// Camera uniforms for GPU.
/// Layout must match WGSL `CameraUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Eye position (xyz), w unused.
    pub camera_pos: [f32; 4],
    /// View direction (xyz), w = 1 for orthographic projection.
    pub camera_forward: [f32; 4],
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            view: glam::Mat4::IDENTITY.to_cols_array_2d(),
            proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 3.0, 1.0],
            camera_forward: [0.0, 0.0, -1.0, 0.0],
        }
    }
}

impl CameraUniforms {
    /// Captures the matrices and eye of `camera`.
    #[must_use]
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();
        let ortho = match camera.projection_mode {
            ProjectionMode::Perspective => 0.0,
            ProjectionMode::Orthographic => 1.0,
        };
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_proj: (proj * view).to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            camera_forward: camera.forward().extend(ortho).to_array(),
        }
    }
}

/// The main rendering engine backed by wgpu.
///
/// Renders offscreen only: frames are captured to RGBA8 buffers and pick
/// queries read back from an `Rgba32Float` target.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// Main camera.
    pub camera: Camera,
    /// Current viewport width.
    pub width: u32,
    /// Current viewport height.
    pub height: u32,
    /// Color the frame is cleared to before drawing volumes.
    pub clear_color: wgpu::Color,
    /// Camera uniform buffer.
    pub camera_buffer: wgpu::Buffer,
    /// Proxy cube positions (storage, vec4 per vertex).
    pub(crate) proxy_cube_buffer: wgpu::Buffer,
    /// Volume bind group layout (camera, node uniforms, cube, textures, sampler).
    pub(crate) volume_bind_group_layout: wgpu::BindGroupLayout,
    /// Trilinear sampler for volume textures.
    pub(crate) volume_sampler: wgpu::Sampler,
    /// Emission/absorption ray-march pipeline.
    pub(crate) raymarch_pipeline: wgpu::RenderPipeline,
    /// Maximum intensity projection pipeline.
    pub(crate) mip_pipeline: wgpu::RenderPipeline,
    /// Position-encoding pipeline (pick target format, no blending).
    pub(crate) pick_pipeline: wgpu::RenderPipeline,
    /// 3D textures keyed by volume name.
    pub(crate) volume_textures: HashMap<String, textures::VolumeTexture>,
    /// 1D lookup-table textures keyed by transfer function name.
    pub(crate) lut_textures: HashMap<String, textures::LutTexture>,

    // Pick system - GPU resources
    /// Position-encoding target.
    pub(crate) pick_texture: Option<wgpu::Texture>,
    /// Position-encoding target view.
    pub(crate) pick_texture_view: Option<wgpu::TextureView>,
    /// Staging buffer for pick pixel readback.
    pub(crate) pick_staging_buffer: Option<wgpu::Buffer>,
    /// Current size of pick buffers (for resize detection).
    pub(crate) pick_buffer_size: (u32, u32),
    /// Pixel the current pick query is restricted to.
    pub(crate) pick_pixel: Option<(u32, u32)>,
}

impl RenderEngine {
    /// Creates a new headless render engine.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("volscope device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!(
            "headless render engine on '{}' ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let width = width.max(1);
        let height = height.max(1);
        let camera = Camera::new(width as f32 / height as f32);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniforms"),
            contents: bytemuck::cast_slice(&[CameraUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let proxy_cube_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("proxy cube positions"),
            contents: bytemuck::cast_slice(&generate_proxy_cube()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let volume_bind_group_layout = pipelines::create_volume_bind_group_layout(&device);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/volume.wgsl").into()),
        });
        let raymarch_pipeline = pipelines::create_volume_pipeline(
            &device,
            &volume_bind_group_layout,
            &shader,
            "fs_raymarch",
            pipelines::FRAME_FORMAT,
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        );
        let mip_pipeline = pipelines::create_volume_pipeline(
            &device,
            &volume_bind_group_layout,
            &shader,
            "fs_mip",
            pipelines::FRAME_FORMAT,
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        );
        let pick_pipeline = pipelines::create_volume_pipeline(
            &device,
            &volume_bind_group_layout,
            &shader,
            "fs_pick",
            pipelines::PICK_FORMAT,
            None, // Exact values, no blending
        );

        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            camera,
            width,
            height,
            clear_color: wgpu::Color::BLACK,
            camera_buffer,
            proxy_cube_buffer,
            volume_bind_group_layout,
            volume_sampler,
            raymarch_pipeline,
            mip_pipeline,
            pick_pipeline,
            volume_textures: HashMap::new(),
            lut_textures: HashMap::new(),
            pick_texture: None,
            pick_texture_view: None,
            pick_staging_buffer: None,
            pick_buffer_size: (0, 0),
            pick_pixel: None,
        })
    }

    /// Resizes the viewport. The pick target follows on the next query.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.width = width;
        self.height = height;
        self.camera.set_aspect_ratio(width as f32 / height as f32);
    }

    /// Updates camera uniforms.
    pub fn update_camera_uniforms(&self) {
        let uniforms = CameraUniforms::from_camera(&self.camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Gets the camera buffer.
    pub fn camera_buffer(&self) -> &wgpu::Buffer {
        &self.camera_buffer
    }

    /// Returns the viewport dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fits the camera to the world-space bounding box `[min, max]`.
    pub fn look_at_box(&mut self, min: glam::Vec3, max: glam::Vec3) {
        self.camera.look_at_box(min, max);
    }
}
