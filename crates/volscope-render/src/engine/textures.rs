use volscope_core::VoxelGrid;

use super::RenderEngine;
use crate::error::{RenderError, RenderResult};

/// A resident 3D volume texture.
pub(crate) struct VolumeTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// A resident 1D lookup-table texture.
pub(crate) struct LutTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
}

/// Converts a grid into texel bytes and the texture format they are laid out for.
///
/// Grids with 1, 2 or 4 eight-bit channels upload as-is. Anything else
/// uploads channel 0 normalized to `[0, 1]` as `R16Float`.
pub fn volume_texels(grid: &VoxelGrid) -> RenderResult<(wgpu::TextureFormat, Vec<u8>)> {
    grid.validate()
        .map_err(|err| RenderError::UnsupportedVolume(err.to_string()))?;

    if grid.bits_per_channel() == 8 {
        let format = match grid.channels() {
            1 => Some(wgpu::TextureFormat::R8Unorm),
            2 => Some(wgpu::TextureFormat::Rg8Unorm),
            4 => Some(wgpu::TextureFormat::Rgba8Unorm),
            _ => None,
        };
        if let Some(format) = format {
            return Ok((format, grid.data().to_vec()));
        }
    }

    let values = grid
        .normalized_channel0()
        .map_err(|err| RenderError::UnsupportedVolume(err.to_string()))?;
    let texels = values
        .into_iter()
        .flat_map(|v| half::f16::from_f32(v).to_bits().to_le_bytes())
        .collect();
    Ok((wgpu::TextureFormat::R16Float, texels))
}

fn bytes_per_texel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rg8Unorm | wgpu::TextureFormat::R16Float => 2,
        wgpu::TextureFormat::Rgba8Unorm => 4,
        _ => 1,
    }
}

impl RenderEngine {
    /// Creates or refreshes the 3D texture for volume `name`.
    ///
    /// The existing texture is rewritten in place when its size and format
    /// still match.
    pub fn upload_volume_texture(&mut self, name: &str, grid: &VoxelGrid) -> RenderResult<()> {
        let (format, texels) = volume_texels(grid)?;
        let dims = grid.dims();
        let size = wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        };

        let reusable = self.volume_textures.get(name).is_some_and(|existing| {
            existing.format == format && existing.texture.size() == size
        });

        if !reusable {
            let max = self.device.limits().max_texture_dimension_3d;
            if dims.max_element() > max {
                return Err(RenderError::TextureCreationFailed(format!(
                    "volume '{name}' is {}x{}x{}, larger than the {max} texel limit",
                    dims.x, dims.y, dims.z
                )));
            }

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("volume texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            log::debug!("allocated {format:?} volume texture '{name}' ({}x{}x{})", dims.x, dims.y, dims.z);
            self.volume_textures.insert(
                name.to_string(),
                VolumeTexture {
                    texture,
                    view,
                    format,
                },
            );
        }

        let Some(resident) = self.volume_textures.get(name) else {
            return Err(RenderError::NotResident {
                kind: "volume texture",
                name: name.to_string(),
            });
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &resident.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.x * bytes_per_texel(format)),
                rows_per_image: Some(dims.y),
            },
            size,
        );
        Ok(())
    }

    /// Creates or refreshes the lookup-table texture for transfer function `name`.
    pub fn upload_lut_texture(&mut self, name: &str, table: &[u8]) -> RenderResult<()> {
        if table.is_empty() || table.len() % 4 != 0 {
            return Err(RenderError::TextureCreationFailed(format!(
                "lookup table '{name}' has {} bytes, not a whole number of RGBA texels",
                table.len()
            )));
        }
        let width = u32::try_from(table.len() / 4).unwrap_or(u32::MAX);

        if self.lut_textures.get(name).map(|lut| lut.width) != Some(width) {
            let max = self.device.limits().max_texture_dimension_1d;
            if width > max {
                return Err(RenderError::TextureCreationFailed(format!(
                    "lookup table '{name}' is {width} texels wide, larger than the {max} texel limit"
                )));
            }

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("lookup table texture"),
                size: wgpu::Extent3d {
                    width,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D1,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(wgpu::TextureViewDimension::D1),
                ..Default::default()
            });
            log::debug!("allocated lookup table texture '{name}' ({width} texels)");
            self.lut_textures.insert(
                name.to_string(),
                LutTexture {
                    texture,
                    view,
                    width,
                },
            );
        }

        let Some(resident) = self.lut_textures.get(name) else {
            return Err(RenderError::NotResident {
                kind: "lookup table texture",
                name: name.to_string(),
            });
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &resident.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            table,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Drops the volume texture for `name`. Returns whether one existed.
    pub fn remove_volume_texture(&mut self, name: &str) -> bool {
        self.volume_textures.remove(name).is_some()
    }

    /// Drops the lookup-table texture for `name`. Returns whether one existed.
    pub fn remove_lut_texture(&mut self, name: &str) -> bool {
        self.lut_textures.remove(name).is_some()
    }

    /// Whether a volume texture is resident for `name`.
    #[must_use]
    pub fn has_volume_texture(&self, name: &str) -> bool {
        self.volume_textures.contains_key(name)
    }

    /// Whether a lookup-table texture is resident for `name`.
    #[must_use]
    pub fn has_lut_texture(&self, name: &str) -> bool {
        self.lut_textures.contains_key(name)
    }

    pub(crate) fn volume_view(&self, name: &str) -> RenderResult<&wgpu::TextureView> {
        self.volume_textures
            .get(name)
            .map(|resident| &resident.view)
            .ok_or_else(|| RenderError::NotResident {
                kind: "volume texture",
                name: name.to_string(),
            })
    }

    pub(crate) fn lut_view(&self, name: &str) -> RenderResult<&wgpu::TextureView> {
        self.lut_textures
            .get(name)
            .map(|resident| &resident.view)
            .ok_or_else(|| RenderError::NotResident {
                kind: "lookup table texture",
                name: name.to_string(),
            })
    }
}
