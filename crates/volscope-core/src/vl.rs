//! The VL binary volume container.
//!
//! Layout (all words little-endian, 4 bytes each):
//!
//! | word | type | field |
//! |------|------|-------|
//! | 0    | u32  | format version (1) |
//! | 1..3 | u32  | width, height, depth |
//! | 4..6 | f32  | spacing x, y, z |
//! | 7    | u32  | channels |
//! | 8    | u32  | voxel depth in bits |
//!
//! The 36-byte header is followed by the raw voxel payload.

use std::path::Path;

use glam::{UVec3, Vec3};

use crate::error::{FormatError, Result, VolscopeError};
use crate::volume::{expected_byte_length, VoxelGrid};

/// The only container version this crate reads and writes.
pub const VL_VERSION: u32 = 1;

/// Size of the fixed header in bytes.
pub const VL_HEADER_LEN: usize = 36;

/// Conventional file extension for VL containers.
pub const VL_EXTENSION: &str = "vl";

/// Encodes a valid grid into a version-1 VL container.
pub fn encode(grid: &VoxelGrid) -> Result<Vec<u8>> {
    grid.validate()?;

    let dims = grid.dims();
    let spacing = grid.spacing();
    let mut bytes = Vec::with_capacity(VL_HEADER_LEN + grid.data().len());

    for word in [VL_VERSION, dims.x, dims.y, dims.z] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    for value in [spacing.x, spacing.y, spacing.z] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for word in [grid.channels(), grid.voxel_depth_bits()] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes.extend_from_slice(grid.data());

    Ok(bytes)
}

/// Decodes a VL container.
///
/// Fails only on a truncated header or an unsupported version. A payload
/// whose length disagrees with the header yields a grid marked invalid, with
/// every byte preserved.
pub fn decode(bytes: &[u8]) -> Result<VoxelGrid> {
    if bytes.len() < VL_HEADER_LEN {
        return Err(FormatError::Truncated { len: bytes.len() }.into());
    }

    let word = |index: usize| {
        let start = index * 4;
        [bytes[start], bytes[start + 1], bytes[start + 2], bytes[start + 3]]
    };

    let version = u32::from_le_bytes(word(0));
    if version != VL_VERSION {
        return Err(FormatError::UnsupportedVersion(version).into());
    }

    let dims = UVec3::new(
        u32::from_le_bytes(word(1)),
        u32::from_le_bytes(word(2)),
        u32::from_le_bytes(word(3)),
    );
    let spacing = Vec3::new(
        f32::from_le_bytes(word(4)),
        f32::from_le_bytes(word(5)),
        f32::from_le_bytes(word(6)),
    );
    let channels = u32::from_le_bytes(word(7));
    let voxel_depth_bits = u32::from_le_bytes(word(8));

    let grid = VoxelGrid::new(
        dims,
        spacing,
        channels,
        voxel_depth_bits,
        bytes[VL_HEADER_LEN..].to_vec(),
    );
    log::debug!(
        "decoded VL container: {dims} voxels, {channels} channel(s), {voxel_depth_bits} bits, valid={}",
        grid.is_valid()
    );
    Ok(grid)
}

/// Decodes a VL container and rejects any grid that breaks the invariant.
///
/// A payload size mismatch is reported as [`FormatError::PayloadSize`];
/// other defects as [`VolscopeError::InvalidGrid`].
pub fn decode_validated(bytes: &[u8]) -> Result<VoxelGrid> {
    let grid = decode(bytes)?;
    if grid.is_valid() {
        return Ok(grid);
    }

    let actual = grid.data().len();
    match expected_byte_length(grid.dims(), grid.voxel_depth_bits()) {
        Some(expected) if expected != actual => {
            Err(FormatError::PayloadSize { expected, actual }.into())
        }
        _ => Err(grid
            .validate()
            .err()
            .unwrap_or_else(|| VolscopeError::invalid_grid("unknown defect"))),
    }
}

/// Reads and validates a `.vl` file.
pub fn read_file(path: impl AsRef<Path>) -> Result<VoxelGrid> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    log::info!("reading VL volume from {}", path.display());
    decode_validated(&bytes)
}

/// Writes a grid to a `.vl` file.
pub fn write_file(path: impl AsRef<Path>, grid: &VoxelGrid) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(grid)?;
    std::fs::write(path, bytes)?;
    log::info!("wrote VL volume to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_grid() -> VoxelGrid {
        VoxelGrid::new(
            UVec3::new(2, 2, 2),
            Vec3::new(1.0, 1.0, 1.0),
            1,
            8,
            vec![10, 20, 30, 40, 50, 60, 70, 80],
        )
    }

    #[test]
    fn test_header_layout() {
        let grid = VoxelGrid::new(
            UVec3::new(3, 2, 1),
            Vec3::new(0.5, 0.25, 2.0),
            2,
            16,
            vec![0; 12],
        );
        let bytes = encode(&grid).unwrap();
        assert_eq!(bytes.len(), VL_HEADER_LEN + 12);
        assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &1u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[24..28], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], &2u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &16u32.to_le_bytes());
    }

    #[test]
    fn test_decode_reconstructs_grid() {
        let grid = sample_grid();
        let bytes = encode(&grid).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_valid());
        assert_eq!(decoded, grid);
        assert_eq!(decoded.voxel(1, 1, 1).unwrap(), vec![80]);
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = encode(&sample_grid()).unwrap();
        bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
        match decode(&bytes) {
            Err(VolscopeError::Format(FormatError::UnsupportedVersion(2))) => {}
            other => panic!("expected unsupported version, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = encode(&sample_grid()).unwrap();
        assert!(matches!(
            decode(&bytes[..20]),
            Err(VolscopeError::Format(FormatError::Truncated { len: 20 }))
        ));
    }

    #[test]
    fn test_short_payload_yields_invalid_grid() {
        let bytes = encode(&sample_grid()).unwrap();
        let grid = decode(&bytes[..bytes.len() - 1]).unwrap();
        assert!(!grid.is_valid());
        assert_eq!(grid.data().len(), 7);
        assert!(encode(&grid).is_err());

        assert!(matches!(
            decode_validated(&bytes[..bytes.len() - 1]),
            Err(VolscopeError::Format(FormatError::PayloadSize {
                expected: 8,
                actual: 7
            }))
        ));
    }

    #[test]
    fn test_trailing_bytes_kept_and_flagged() {
        let mut bytes = encode(&sample_grid()).unwrap();
        bytes.push(99);
        let grid = decode(&bytes).unwrap();
        assert!(!grid.is_valid());
        assert_eq!(grid.data().len(), 9);
        assert_eq!(grid.data()[8], 99);
    }

    #[test]
    fn test_bad_format_fields_rejected_by_validated_decode() {
        let mut bytes = encode(&sample_grid()).unwrap();
        // 12-bit voxels are not a multiple of 8; payload length still "fits".
        bytes[32..36].copy_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(
            decode_validated(&bytes),
            Err(VolscopeError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn test_absurd_header_counts_yield_invalid_grid() {
        let header = |channels: u32, bits: u32| {
            let mut bytes = encode(&VoxelGrid::from_u8(UVec3::ONE, vec![7])).unwrap();
            bytes[28..32].copy_from_slice(&channels.to_le_bytes());
            bytes[32..36].copy_from_slice(&bits.to_le_bytes());
            bytes
        };

        for (channels, bits) in [
            (u32::MAX, 8),
            (u32::MAX, u32::MAX - 7),
            (1, u32::MAX - 7),
            (1 << 24, 1 << 27),
        ] {
            let grid = decode(&header(channels, bits)).unwrap();
            assert!(!grid.is_valid(), "channels={channels} bits={bits}");
            assert_eq!(grid.channels(), channels);
            assert_eq!(grid.data(), &[7]);
            assert!(grid.channel_histogram(0).is_err());
            assert!(decode_validated(&header(channels, bits)).is_err());
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("head.{VL_EXTENSION}"));
        let grid = sample_grid();
        write_file(&path, &grid).unwrap();
        let loaded = read_file(&path).unwrap();
        assert_eq!(loaded, grid);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_file(dir.path().join("absent.vl")),
            Err(VolscopeError::Io(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_is_lossless(
            w in 1u32..5,
            h in 1u32..5,
            d in 1u32..5,
            layout in prop::sample::select(vec![(1u32, 8u32), (1, 16), (2, 16), (3, 24), (4, 32), (2, 8)]),
            spacing in (0.01f32..10.0, 0.01f32..10.0, 0.01f32..10.0),
            seed in any::<u64>(),
        ) {
            let (channels, bits) = layout;
            let dims = UVec3::new(w, h, d);
            let len = expected_byte_length(dims, bits).unwrap();
            let data: Vec<u8> = (0..len)
                .map(|i| (seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(i as u64) >> 24) as u8)
                .collect();
            let grid = VoxelGrid::new(dims, Vec3::new(spacing.0, spacing.1, spacing.2), channels, bits, data);
            prop_assert!(grid.is_valid());

            let bytes = encode(&grid).unwrap();
            let decoded = decode(&bytes).unwrap();
            prop_assert_eq!(&decoded, &grid);
            prop_assert_eq!(encode(&decoded).unwrap(), bytes);
        }
    }
}
