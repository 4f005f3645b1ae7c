//! Transfer functions: RGBA control-point curves compiled into a lookup table.
//!
//! Each of the four channels is a piecewise-linear curve over the normalized
//! scalar range. The curves are compiled into an interleaved RGBA8 table that
//! the renderer samples as a 1D texture.
//!
//! Compilation and GPU upload are tracked separately so that any number of
//! edits between two frames costs one recompute and one upload:
//!
//! ```text
//! edit ──► PendingRecompute ──table()──► PendingUpload ──synchronize()──► Clean
//!   ▲                                                                     │
//!   └─────────────────────────────── edit ◄───────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolscopeError};

/// Default lookup table resolution.
pub const DEFAULT_TABLE_WIDTH: usize = 256;

/// Widest supported lookup table. Texel `i` stores `round(v * (width - 1))`,
/// which must fit in a byte.
pub const MAX_TABLE_WIDTH: usize = 256;

/// Marks a point for removal during compaction.
const REMOVED_SENTINEL: f32 = -1.0;

/// One vertex of a channel curve. Both coordinates lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Normalized scalar position.
    pub x: f32,
    /// Normalized channel output.
    pub y: f32,
}

impl ControlPoint {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

/// A lookup table channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    /// All channels in table order.
    pub const ALL: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];

    /// Offset of this channel within an RGBA texel.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

/// Synchronization state of a transfer function's lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfState {
    /// Table and GPU copy both reflect the curves.
    Clean,
    /// Curves changed since the last compile.
    PendingRecompute,
    /// Table is current but the GPU copy lags behind.
    PendingUpload,
}

/// Four editable channel curves and their compiled RGBA lookup table.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    width: usize,
    curves: [Vec<ControlPoint>; 4],
    table: Vec<u8>,
    state: TfState,
    recompute_count: u64,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_WIDTH)
    }
}

impl TransferFunction {
    /// Creates a transfer function with empty curves.
    ///
    /// `width` is clamped to `2..=MAX_TABLE_WIDTH`.
    pub fn new(width: usize) -> Self {
        let clamped = width.clamp(2, MAX_TABLE_WIDTH);
        if clamped != width {
            log::warn!("transfer function width {width} clamped to {clamped}");
        }
        let width = clamped;
        Self {
            width,
            curves: Default::default(),
            table: vec![0; width * 4],
            state: TfState::PendingRecompute,
            recompute_count: 0,
        }
    }

    /// Creates a transfer function from four curves in R, G, B, A order.
    pub fn from_points(width: usize, curves: [Vec<ControlPoint>; 4]) -> Self {
        let mut tf = Self::new(width);
        for (channel, points) in Channel::ALL.into_iter().zip(curves) {
            tf.set_points(channel, points);
        }
        tf
    }

    /// A grey ramp with opacity rising linearly across the scalar range.
    pub fn linear_ramp(width: usize) -> Self {
        let ramp = vec![ControlPoint::new(0.0, 0.0), ControlPoint::new(1.0, 1.0)];
        Self::from_points(
            width,
            [ramp.clone(), ramp.clone(), ramp.clone(), ramp],
        )
    }

    /// Lookup table resolution.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn state(&self) -> TfState {
        self.state
    }

    /// Number of times the table has been compiled.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// The control points of one channel, sorted by `x`.
    #[must_use]
    pub fn channel_points(&self, channel: Channel) -> &[ControlPoint] {
        &self.curves[channel.index()]
    }

    /// Replaces a channel's curve.
    pub fn set_points(&mut self, channel: Channel, points: Vec<ControlPoint>) {
        let curve = &mut self.curves[channel.index()];
        *curve = points.into_iter().map(ControlPoint::clamped).collect();
        sort_curve(curve);
        self.invalidate();
    }

    /// Inserts a point, keeping the curve sorted.
    pub fn add_point(&mut self, channel: Channel, point: ControlPoint) {
        let curve = &mut self.curves[channel.index()];
        curve.push(point.clamped());
        sort_curve(curve);
        self.invalidate();
    }

    /// Moves the point at `index` to `point`, re-sorting the curve.
    pub fn move_point(&mut self, channel: Channel, index: usize, point: ControlPoint) -> Result<()> {
        let curve = &mut self.curves[channel.index()];
        let len = curve.len();
        let slot = curve.get_mut(index).ok_or_else(|| {
            VolscopeError::precondition(format!(
                "control point {index} out of range for {channel:?} curve of {len} points"
            ))
        })?;
        *slot = point.clamped();
        sort_curve(curve);
        self.invalidate();
        Ok(())
    }

    /// Removes the point at `index`.
    pub fn remove_point(&mut self, channel: Channel, index: usize) -> Result<ControlPoint> {
        let len = self.curves[channel.index()].len();
        let point = *self.curves[channel.index()].get(index).ok_or_else(|| {
            VolscopeError::precondition(format!(
                "control point {index} out of range for {channel:?} curve of {len} points"
            ))
        })?;
        let mut position = 0;
        self.remove_points(channel, |_| {
            let hit = position == index;
            position += 1;
            hit
        });
        Ok(point)
    }

    /// Removes every point matching `predicate`, returning how many were dropped.
    ///
    /// Matching points are overwritten with a sentinel that sorts before every
    /// valid position, then the sentinel prefix is cut off.
    pub fn remove_points<F>(&mut self, channel: Channel, mut predicate: F) -> usize
    where
        F: FnMut(&ControlPoint) -> bool,
    {
        let curve = &mut self.curves[channel.index()];
        for point in curve.iter_mut() {
            if predicate(point) {
                point.x = REMOVED_SENTINEL;
            }
        }
        sort_curve(curve);
        let removed = curve
            .iter()
            .take_while(|p| p.x == REMOVED_SENTINEL)
            .count();
        curve.drain(..removed);

        if removed > 0 {
            self.invalidate();
        }
        removed
    }

    /// Evaluates one channel curve at normalized position `u`.
    #[must_use]
    pub fn sample(&self, channel: Channel, u: f32) -> f32 {
        let curve = &self.curves[channel.index()];
        let p = curve.iter().take_while(|point| u >= point.x).count();
        evaluate(curve, p, u)
    }

    /// Returns the compiled RGBA table, recompiling first if the curves changed.
    pub fn table(&mut self) -> &[u8] {
        if self.state == TfState::PendingRecompute {
            self.recompute();
        }
        &self.table
    }

    /// Brings the GPU copy up to date.
    ///
    /// Recompiles if needed, then calls `upload` with the table only when the
    /// GPU copy is stale. Returns whether an upload happened. If `upload`
    /// fails the table stays pending so the next call retries.
    pub fn synchronize<F>(&mut self, upload: F) -> Result<bool>
    where
        F: FnOnce(&[u8]) -> Result<()>,
    {
        if self.state == TfState::PendingRecompute {
            self.recompute();
        }
        if self.state != TfState::PendingUpload {
            return Ok(false);
        }
        upload(&self.table)?;
        self.state = TfState::Clean;
        Ok(true)
    }

    /// Forces the GPU copy to be considered stale (e.g. after device loss).
    pub fn mark_upload_needed(&mut self) {
        if self.state == TfState::Clean {
            self.state = TfState::PendingUpload;
        }
    }

    fn invalidate(&mut self) {
        self.state = TfState::PendingRecompute;
    }

    /// Compiles all four curves in a single left-to-right sweep each.
    fn recompute(&mut self) {
        let last = self.width - 1;
        let scale = last as f32;

        for channel in Channel::ALL {
            let curve = &self.curves[channel.index()];
            let mut p = 0;
            for i in 0..self.width {
                let u = i as f32 / scale;
                while p < curve.len() && u >= curve[p].x {
                    p += 1;
                }
                let value = evaluate(curve, p, u);
                let quantized = (value * scale).round().clamp(0.0, scale);
                self.table[i * 4 + channel.index()] = quantized as u8;
            }
        }

        self.recompute_count += 1;
        self.state = TfState::PendingUpload;
        log::debug!(
            "transfer function recompiled ({} texels, compile #{})",
            self.width,
            self.recompute_count
        );
    }
}

/// Evaluates `curve` at `u`, where `p` is the number of points with `x <= u`.
fn evaluate(curve: &[ControlPoint], p: usize, u: f32) -> f32 {
    let Some(last) = curve.last() else {
        return 0.0;
    };
    if p == 0 {
        return curve[0].y;
    }
    if p == curve.len() {
        return last.y;
    }

    let a = curve[p - 1];
    let b = curve[p];
    if a.x == b.x {
        // Vertical segment.
        return b.y;
    }
    let t = (u - a.x) / (b.x - a.x);
    (1.0 - t) * a.y + t * b.y
}

fn sort_curve(curve: &mut [ControlPoint]) {
    curve.sort_by(|a, b| a.x.total_cmp(&b.x));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pts(points: &[(f32, f32)]) -> Vec<ControlPoint> {
        points.iter().map(|&(x, y)| ControlPoint::new(x, y)).collect()
    }

    #[test]
    fn test_flat_extrapolation_and_midpoint() {
        let mut tf = TransferFunction::new(256);
        tf.set_points(Channel::A, pts(&[(0.3, 0.0), (0.7, 1.0)]));

        assert_eq!(tf.sample(Channel::A, 0.0), 0.0);
        assert_eq!(tf.sample(Channel::A, 1.0), 1.0);
        assert!((tf.sample(Channel::A, 0.5) - 0.5).abs() < 1e-6);

        let table = tf.table().to_vec();
        assert_eq!(table[3], 0);
        assert_eq!(table[255 * 4 + 3], 255);
    }

    #[test]
    fn test_midpoint_in_table() {
        // Width 3 places a sample exactly at u = 0.5.
        let mut tf = TransferFunction::new(3);
        tf.set_points(Channel::R, pts(&[(0.3, 0.0), (0.7, 1.0)]));
        let table = tf.table();
        assert_eq!(table[0], 0);
        assert_eq!(table[4], 1); // round(0.5 * 2)
        assert_eq!(table[8], 2);
    }

    #[test]
    fn test_width_is_capped_at_one_byte_range() {
        let mut tf = TransferFunction::linear_ramp(512);
        assert_eq!(tf.width(), MAX_TABLE_WIDTH);
        let table = tf.table().to_vec();
        assert_eq!(table.len(), MAX_TABLE_WIDTH * 4);
        let alpha: Vec<u8> = table.chunks(4).map(|texel| texel[3]).collect();
        assert!(alpha.windows(2).all(|w| w[1] == w[0] + 1));

        assert_eq!(TransferFunction::new(0).width(), 2);
    }

    #[test]
    fn test_degenerate_segment_takes_second_point() {
        let mut tf = TransferFunction::new(256);
        tf.set_points(Channel::G, pts(&[(0.5, 0.0), (0.5, 1.0), (1.0, 1.0)]));
        assert_eq!(tf.sample(Channel::G, 0.5), 1.0);
        assert_eq!(tf.sample(Channel::G, 0.25), 0.0);

        let mut tf3 = TransferFunction::new(3);
        tf3.set_points(Channel::G, pts(&[(0.5, 0.0), (0.5, 1.0), (1.0, 1.0)]));
        assert_eq!(tf3.table()[4 + 1], 2);
    }

    #[test]
    fn test_empty_curve_is_zero() {
        let mut tf = TransferFunction::new(16);
        assert_eq!(tf.sample(Channel::B, 0.4), 0.0);
        assert!(tf.table().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_single_point_is_constant() {
        let mut tf = TransferFunction::new(8);
        tf.set_points(Channel::R, pts(&[(0.5, 0.25)]));
        let table = tf.table().to_vec();
        let expected = (0.25f32 * 7.0).round() as u8;
        assert!(table.chunks(4).all(|texel| texel[0] == expected));
    }

    #[test]
    fn test_channels_are_interleaved() {
        let mut tf = TransferFunction::from_points(
            2,
            [
                pts(&[(0.0, 1.0)]),
                pts(&[(0.0, 0.0)]),
                pts(&[(0.0, 1.0)]),
                pts(&[(0.0, 0.0), (1.0, 1.0)]),
            ],
        );
        assert_eq!(tf.table(), &[1, 0, 1, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn test_dirty_flag_coalescing() {
        let mut tf = TransferFunction::linear_ramp(256);
        assert_eq!(tf.state(), TfState::PendingRecompute);

        tf.add_point(Channel::A, ControlPoint::new(0.5, 0.1));
        tf.add_point(Channel::A, ControlPoint::new(0.8, 0.9));
        assert_eq!(tf.recompute_count(), 0);

        let snapshot = tf.table().to_vec();
        assert_eq!(tf.recompute_count(), 1);
        assert_eq!(tf.state(), TfState::PendingUpload);

        // The single compile saw both edits.
        let u = 204.0 / 255.0;
        let expected = (tf.sample(Channel::A, u) * 255.0).round() as u8;
        assert_eq!(snapshot[204 * 4 + 3], expected);
        assert!((229..=230).contains(&expected));

        let _ = tf.table();
        assert_eq!(tf.recompute_count(), 1);
    }

    #[test]
    fn test_synchronize_uploads_once() {
        let mut tf = TransferFunction::linear_ramp(4);
        let mut uploads = Vec::new();

        let uploaded = tf
            .synchronize(|table| {
                uploads.push(table.to_vec());
                Ok(())
            })
            .unwrap();
        assert!(uploaded);
        assert_eq!(tf.state(), TfState::Clean);
        assert_eq!(uploads.len(), 1);
        assert_eq!(&uploads[0][..4], &[0, 0, 0, 0]);
        assert_eq!(&uploads[0][12..], &[3, 3, 3, 3]);

        let uploaded = tf.synchronize(|_| panic!("no upload expected")).unwrap();
        assert!(!uploaded);
        assert_eq!(tf.recompute_count(), 1);

        tf.add_point(Channel::R, ControlPoint::new(0.5, 1.0));
        tf.add_point(Channel::G, ControlPoint::new(0.5, 1.0));
        assert_eq!(tf.state(), TfState::PendingRecompute);
        tf.synchronize(|_| Ok(())).unwrap();
        assert_eq!(tf.recompute_count(), 2);
        assert_eq!(tf.state(), TfState::Clean);
    }

    #[test]
    fn test_failed_upload_stays_pending() {
        let mut tf = TransferFunction::linear_ramp(4);
        let result = tf.synchronize(|_| Err(VolscopeError::Render("lost".into())));
        assert!(result.is_err());
        assert_eq!(tf.state(), TfState::PendingUpload);
        assert!(tf.synchronize(|_| Ok(())).unwrap());
        assert_eq!(tf.recompute_count(), 1);
    }

    #[test]
    fn test_editing_keeps_curve_sorted() {
        let mut tf = TransferFunction::new(256);
        tf.add_point(Channel::A, ControlPoint::new(0.9, 1.0));
        tf.add_point(Channel::A, ControlPoint::new(0.1, 0.0));
        tf.add_point(Channel::A, ControlPoint::new(0.5, 0.5));
        let xs: Vec<f32> = tf.channel_points(Channel::A).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.1, 0.5, 0.9]);

        tf.move_point(Channel::A, 0, ControlPoint::new(0.95, 0.2)).unwrap();
        let xs: Vec<f32> = tf.channel_points(Channel::A).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.5, 0.9, 0.95]);

        let removed = tf.remove_points(Channel::A, |p| p.x > 0.8);
        assert_eq!(removed, 2);
        assert_eq!(tf.channel_points(Channel::A), &[ControlPoint::new(0.5, 0.5)]);

        assert!(tf.move_point(Channel::A, 3, ControlPoint::new(0.0, 0.0)).is_err());
    }

    #[test]
    fn test_remove_point_by_index() {
        let mut tf = TransferFunction::new(256);
        tf.set_points(Channel::R, pts(&[(0.2, 0.0), (0.4, 1.0), (0.6, 0.0)]));
        let removed = tf.remove_point(Channel::R, 1).unwrap();
        assert_eq!(removed, ControlPoint::new(0.4, 1.0));
        assert_eq!(tf.channel_points(Channel::R), &pts(&[(0.2, 0.0), (0.6, 0.0)])[..]);
        assert!(tf.remove_point(Channel::R, 5).is_err());
    }

    #[test]
    fn test_points_are_clamped() {
        let mut tf = TransferFunction::new(256);
        tf.add_point(Channel::B, ControlPoint::new(-0.5, 2.0));
        assert_eq!(tf.channel_points(Channel::B), &[ControlPoint::new(0.0, 1.0)]);
    }

    proptest! {
        #[test]
        fn prop_table_matches_direct_evaluation(
            raw in prop::collection::vec((0.0f32..=1.0, 0.0f32..=1.0), 0..8),
            width in 2usize..=MAX_TABLE_WIDTH,
        ) {
            let mut tf = TransferFunction::new(width);
            tf.set_points(Channel::A, pts(&raw));
            let scale = (width - 1) as f32;
            let table = tf.table().to_vec();
            for i in 0..width {
                let u = i as f32 / scale;
                let expected = (tf.sample(Channel::A, u) * scale).round().clamp(0.0, 255.0) as u8;
                prop_assert_eq!(table[i * 4 + 3], expected);
            }
        }
    }
}
