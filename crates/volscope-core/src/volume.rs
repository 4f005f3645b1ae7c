//! Dense voxel grids.
//!
//! A [`VoxelGrid`] owns a raw little-endian byte buffer together with the
//! geometric and format metadata needed to interpret it. Each voxel occupies
//! `voxel_depth_bits` bits, split evenly across `channels` channels. Channel
//! values are packed bit-contiguously, least significant bit first, so the
//! common 8/16/32-bit layouts read back as plain little-endian integers.
//!
//! Grids are never rejected at construction time. A grid whose parameters or
//! payload length are inconsistent is *invalid*: it can still be inspected,
//! encoded metadata included, but every read or derive operation fails fast
//! with [`VolscopeError::InvalidGrid`].

use std::fmt;
use std::sync::OnceLock;

use glam::{UVec3, Vec3};

use crate::error::{Result, VolscopeError};

/// Widest channel a grid may carry.
pub const MAX_BITS_PER_CHANNEL: u32 = 32;

/// Widest channel for which a dense histogram is built (65536 bins).
pub const MAX_HISTOGRAM_BITS: u32 = 16;

/// Returns `ceil(w * h * d * bits / 8)`, or `None` on overflow.
#[must_use]
pub fn expected_byte_length(dims: UVec3, voxel_depth_bits: u32) -> Option<usize> {
    let bits = u128::from(dims.x)
        .checked_mul(u128::from(dims.y))?
        .checked_mul(u128::from(dims.z))?
        .checked_mul(u128::from(voxel_depth_bits))?;
    usize::try_from(bits.div_ceil(8)).ok()
}

/// A dense 3D grid of (possibly multi-channel) voxels.
#[derive(Clone)]
pub struct VoxelGrid {
    dims: UVec3,
    spacing: Vec3,
    channels: u32,
    voxel_depth_bits: u32,
    data: Vec<u8>,

    /// Why the grid is invalid, if it is.
    defect: Option<String>,

    // Derived statistics, dropped whenever `data` is replaced.
    histograms: Vec<OnceLock<Vec<u64>>>,
    extrema: OnceLock<(u32, u32)>,
}

impl VoxelGrid {
    /// Creates a grid from dimensions, spacing, format and payload.
    ///
    /// Never fails: a grid whose parameters or payload length violate the
    /// grid invariant is returned marked invalid. Check [`Self::is_valid`]
    /// or call [`Self::validate`] before relying on it.
    pub fn new(
        dims: UVec3,
        spacing: Vec3,
        channels: u32,
        voxel_depth_bits: u32,
        data: Vec<u8>,
    ) -> Self {
        let defect = find_defect(dims, spacing, channels, voxel_depth_bits, data.len());
        if let Some(reason) = &defect {
            log::warn!("voxel grid {dims} marked invalid: {reason}");
        }

        let histograms = histogram_caches(channels, defect.is_none());
        Self {
            dims,
            spacing,
            channels,
            voxel_depth_bits,
            data,
            defect,
            histograms,
            extrema: OnceLock::new(),
        }
    }

    /// Creates a single-channel 8-bit grid with unit spacing.
    pub fn from_u8(dims: UVec3, data: Vec<u8>) -> Self {
        Self::new(dims, Vec3::ONE, 1, 8, data)
    }

    /// Creates a single-channel 16-bit grid; values are stored little-endian.
    pub fn from_u16(dims: UVec3, spacing: Vec3, values: &[u16]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(dims, spacing, 1, 16, data)
    }

    /// Returns the voxel counts along x, y and z.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dims.x
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dims.y
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.dims.z
    }

    /// Returns the world-space size of one voxel along each axis.
    #[must_use]
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    #[must_use]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[must_use]
    pub fn voxel_depth_bits(&self) -> u32 {
        self.voxel_depth_bits
    }

    /// Bits used by a single channel value.
    #[must_use]
    pub fn bits_per_channel(&self) -> u32 {
        if self.channels == 0 {
            0
        } else {
            self.voxel_depth_bits / self.channels
        }
    }

    /// Bytes per voxel, rounded down (fractional for sub-byte voxels).
    #[must_use]
    pub fn bytes_per_voxel(&self) -> u32 {
        self.voxel_depth_bits / 8
    }

    /// Total number of voxels.
    #[must_use]
    pub fn num_voxels(&self) -> u64 {
        u64::from(self.dims.x) * u64::from(self.dims.y) * u64::from(self.dims.z)
    }

    /// World-space extent of the whole grid (`dims * spacing`).
    #[must_use]
    pub fn world_size(&self) -> Vec3 {
        self.dims.as_vec3() * self.spacing
    }

    /// Raw voxel bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the grid, returning its payload.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.defect.is_none()
    }

    /// Returns the reason this grid is invalid, if any.
    #[must_use]
    pub fn defect(&self) -> Option<&str> {
        self.defect.as_deref()
    }

    /// Fails with [`VolscopeError::InvalidGrid`] if the grid invariant does not hold.
    pub fn validate(&self) -> Result<()> {
        match &self.defect {
            Some(reason) => Err(VolscopeError::invalid_grid(reason.clone())),
            None => Ok(()),
        }
    }

    /// Replaces the whole payload, re-validating and dropping every cached statistic.
    ///
    /// The new buffer is stored even when it breaks the invariant; the
    /// returned error reports that the grid is now invalid.
    pub fn replace_data(&mut self, data: Vec<u8>) -> Result<()> {
        self.defect = find_defect(
            self.dims,
            self.spacing,
            self.channels,
            self.voxel_depth_bits,
            data.len(),
        );
        self.data = data;
        self.histograms = histogram_caches(self.channels, self.defect.is_none());
        self.extrema = OnceLock::new();
        self.validate()
    }

    /// Flattens `(i, j, k)` into a linear voxel index.
    #[must_use]
    pub fn linear_index(&self, i: u32, j: u32, k: u32) -> u64 {
        u64::from(i)
            + u64::from(j) * u64::from(self.dims.x)
            + u64::from(k) * u64::from(self.dims.x) * u64::from(self.dims.y)
    }

    /// Returns every channel value of the voxel at `(i, j, k)`.
    pub fn voxel(&self, i: u32, j: u32, k: u32) -> Result<Vec<u32>> {
        self.validate()?;
        if i >= self.dims.x || j >= self.dims.y || k >= self.dims.z {
            return Err(VolscopeError::precondition(format!(
                "voxel ({i}, {j}, {k}) outside grid {}x{}x{}",
                self.dims.x, self.dims.y, self.dims.z
            )));
        }
        Ok(self.read_voxel(self.linear_index(i, j, k)))
    }

    /// Returns every channel value of the voxel at linear index `index`.
    pub fn voxel_linear(&self, index: u64) -> Result<Vec<u32>> {
        self.validate()?;
        if index >= self.num_voxels() {
            return Err(VolscopeError::precondition(format!(
                "voxel index {index} outside grid of {} voxels",
                self.num_voxels()
            )));
        }
        Ok(self.read_voxel(index))
    }

    /// Occupancy histogram of channel 0 over the whole grid.
    pub fn histogram(&self) -> Result<&[u64]> {
        self.channel_histogram(0)
    }

    /// Occupancy histogram of `channel`, with `2^bits_per_channel` bins.
    ///
    /// Computed in full on first request and cached until the payload is replaced.
    pub fn channel_histogram(&self, channel: u32) -> Result<&[u64]> {
        self.validate()?;
        self.check_channel(channel)?;
        let bits = self.bits_per_channel();
        if bits > MAX_HISTOGRAM_BITS {
            return Err(VolscopeError::precondition(format!(
                "histogram of {bits}-bit channels is not supported (max {MAX_HISTOGRAM_BITS})"
            )));
        }

        let histogram = self.histograms[channel as usize].get_or_init(|| {
            let mut bins = vec![0u64; 1usize << bits];
            for index in 0..self.num_voxels() {
                bins[self.read_channel(index, channel) as usize] += 1;
            }
            log::debug!(
                "computed {}-bin histogram for channel {channel} over {} voxels",
                bins.len(),
                self.num_voxels()
            );
            bins
        });
        Ok(histogram)
    }

    /// Minimum and maximum channel-0 values.
    pub fn min_max(&self) -> Result<(u32, u32)> {
        self.validate()?;
        Ok(*self.extrema.get_or_init(|| {
            (0..self.num_voxels())
                .map(|index| self.read_channel(index, 0))
                .fold((u32::MAX, u32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
        }))
    }

    pub fn min(&self) -> Result<u32> {
        self.min_max().map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Result<u32> {
        self.min_max().map(|(_, hi)| hi)
    }

    /// Channel 0 of every voxel scaled into `[0, 1]` by the channel's full range.
    pub fn normalized_channel0(&self) -> Result<Vec<f32>> {
        self.validate()?;
        let full_scale = channel_full_scale(self.bits_per_channel());
        Ok((0..self.num_voxels())
            .map(|index| (f64::from(self.read_channel(index, 0)) / full_scale) as f32)
            .collect())
    }

    fn check_channel(&self, channel: u32) -> Result<()> {
        if channel >= self.channels {
            return Err(VolscopeError::precondition(format!(
                "channel {channel} out of range for a {}-channel grid",
                self.channels
            )));
        }
        Ok(())
    }

    fn read_voxel(&self, index: u64) -> Vec<u32> {
        (0..self.channels)
            .map(|channel| self.read_channel(index, channel))
            .collect()
    }

    /// Reads one channel value. Callers have validated the grid and bounds.
    fn read_channel(&self, index: u64, channel: u32) -> u32 {
        let bits = self.bits_per_channel();
        let bit_offset =
            index * u64::from(self.voxel_depth_bits) + u64::from(channel) * u64::from(bits);
        read_bits(&self.data, bit_offset, bits)
    }
}

impl PartialEq for VoxelGrid {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
            && self.spacing == other.spacing
            && self.channels == other.channels
            && self.voxel_depth_bits == other.voxel_depth_bits
            && self.data == other.data
    }
}

impl fmt::Debug for VoxelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoxelGrid")
            .field("dims", &self.dims)
            .field("spacing", &self.spacing)
            .field("channels", &self.channels)
            .field("voxel_depth_bits", &self.voxel_depth_bits)
            .field("bytes", &self.data.len())
            .field("defect", &self.defect)
            .finish_non_exhaustive()
    }
}

/// One cache slot per channel. Invalid grids get none: their channel count
/// comes straight from an untrusted header and is never indexed.
fn histogram_caches(channels: u32, valid: bool) -> Vec<OnceLock<Vec<u64>>> {
    if !valid {
        return Vec::new();
    }
    (0..channels).map(|_| OnceLock::new()).collect()
}

fn channel_full_scale(bits: u32) -> f64 {
    if bits == 0 {
        1.0
    } else {
        2f64.powi(bits as i32) - 1.0
    }
}

fn find_defect(
    dims: UVec3,
    spacing: Vec3,
    channels: u32,
    voxel_depth_bits: u32,
    byte_len: usize,
) -> Option<String> {
    if dims.min_element() == 0 {
        return Some(format!("dimensions {dims} must all be positive"));
    }
    if !spacing.is_finite() || spacing.min_element() <= 0.0 {
        return Some(format!("spacing {spacing} must be finite and positive"));
    }
    if channels == 0 {
        return Some("channel count must be positive".to_string());
    }
    if voxel_depth_bits == 0 || voxel_depth_bits % 8 != 0 {
        return Some(format!(
            "voxel depth of {voxel_depth_bits} bits is not a positive multiple of 8"
        ));
    }
    if voxel_depth_bits % channels != 0 {
        return Some(format!(
            "voxel depth of {voxel_depth_bits} bits does not split evenly across {channels} channels"
        ));
    }
    if voxel_depth_bits / channels > MAX_BITS_PER_CHANNEL {
        return Some(format!(
            "{} bits per channel exceeds the {MAX_BITS_PER_CHANNEL}-bit limit",
            voxel_depth_bits / channels
        ));
    }
    match expected_byte_length(dims, voxel_depth_bits) {
        None => Some(format!("grid {dims} is too large to address")),
        Some(expected) if expected != byte_len => Some(format!(
            "payload holds {byte_len} bytes, expected {expected}"
        )),
        Some(_) => None,
    }
}

/// Reads `bits` (at most 32) bits starting at `bit_offset`, least significant bit first.
fn read_bits(data: &[u8], bit_offset: u64, bits: u32) -> u32 {
    let first = (bit_offset / 8) as usize;
    let shift = (bit_offset % 8) as u32;

    if shift == 0 && bits % 8 == 0 {
        let mut bytes = [0u8; 4];
        let n = (bits / 8) as usize;
        bytes[..n].copy_from_slice(&data[first..first + n]);
        return u32::from_le_bytes(bytes);
    }

    // General case: gather up to five bytes into a window and mask.
    let needed = (shift + bits).div_ceil(8) as usize;
    let mut window = 0u64;
    for (n, byte) in data[first..first + needed].iter().enumerate() {
        window |= u64::from(*byte) << (8 * n);
    }
    let mask = if bits == 32 { u64::from(u32::MAX) } else { (1u64 << bits) - 1 };
    ((window >> shift) & mask) as u32
}
