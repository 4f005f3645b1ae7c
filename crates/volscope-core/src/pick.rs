//! GPU position picking.
//!
//! A pick query resolves a screen pixel to the nearest world-space point at
//! which the view ray through that pixel hits any visible volume node. Each
//! candidate node is drawn alone with the position-encoding shader into a
//! reusable offscreen target, restricted to the query pixel, and the pixel is
//! read back. The encoding shader writes the local hit point to RGB and
//! exactly 1.0 to alpha on a hit, exactly 0.0 on a miss.

use glam::{Vec3, Vec4};

use crate::backend::{NodeDraw, PickBackend};
use crate::error::{Result, VolscopeError};
use crate::options::Options;
use crate::registry::Registry;
use crate::volume_node::{ShaderKind, VolumeNode};

/// Result of a successful pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    /// Registry name of the node that was hit.
    pub node: String,

    /// The world position of the hit.
    pub world_position: Vec3,

    /// Distance from the eye to the hit.
    pub distance: f32,
}

/// Runs pick queries and owns the pick target's size cache.
///
/// Queries take `&mut self`, so only one can be in flight at a time.
#[derive(Debug, Default)]
pub struct PickingEngine {
    target_size: Option<(u32, u32)>,
    allocations: u64,
}

impl PickingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the currently allocated pick target, if any.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target_size
    }

    /// How many times the pick target has been (re)allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Forgets the pick target so the next query reallocates it.
    pub fn invalidate_target(&mut self) {
        self.target_size = None;
    }

    /// Returns the world position of the nearest hit at `(x, y)`, or `None`.
    pub fn pick_position<B>(
        &mut self,
        backend: &mut B,
        registry: &Registry,
        options: &Options,
        x: u32,
        y: u32,
    ) -> Result<Option<Vec3>>
    where
        B: PickBackend + ?Sized,
    {
        Ok(self
            .pick(backend, registry, options, x, y)?
            .map(|hit| hit.world_position))
    }

    /// Returns the nearest hit at `(x, y)` together with the node it belongs to.
    ///
    /// Candidates are tested in registration order and a later hit only
    /// replaces the current one when it is strictly closer to the eye.
    pub fn pick<B>(
        &mut self,
        backend: &mut B,
        registry: &Registry,
        options: &Options,
        x: u32,
        y: u32,
    ) -> Result<Option<PickHit>>
    where
        B: PickBackend + ?Sized,
    {
        let (width, height) = backend.viewport_size();
        if x >= width || y >= height {
            return Ok(None);
        }

        self.acquire_target(backend, width, height)?;

        let result = backend
            .begin_pick(x, y)
            .and_then(|()| Self::nearest_hit(backend, registry, options));
        backend.end_pick();

        let hit = result?;
        match &hit {
            Some(hit) => log::debug!(
                "pick ({x}, {y}) hit '{}' at {} (distance {})",
                hit.node,
                hit.world_position,
                hit.distance
            ),
            None => log::debug!("pick ({x}, {y}) missed"),
        }
        Ok(hit)
    }

    fn acquire_target<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()>
    where
        B: PickBackend + ?Sized,
    {
        if self.target_size == Some((width, height)) {
            return Ok(());
        }

        self.target_size = None;
        backend
            .allocate_pick_target(width, height)
            .map_err(|err| match err {
                VolscopeError::ResourceAllocation(_) => err,
                other => VolscopeError::ResourceAllocation(other.to_string()),
            })?;
        self.target_size = Some((width, height));
        self.allocations += 1;
        log::debug!("pick target allocated at {width}x{height}");
        Ok(())
    }

    fn nearest_hit<B>(
        backend: &mut B,
        registry: &Registry,
        options: &Options,
    ) -> Result<Option<PickHit>>
    where
        B: PickBackend + ?Sized,
    {
        let eye = backend.eye_position();
        let mut nearest: Option<PickHit> = None;

        for (name, node) in registry.nodes.iter() {
            let Some(draw) = candidate_draw(registry, options, name, node) else {
                continue;
            };

            let pixel = match backend.render_pick_pixel(&draw) {
                Ok(pixel) => pixel,
                Err(VolscopeError::NotFound { kind, name: missing }) => {
                    log::warn!("skipping pick candidate '{name}': {kind} '{missing}' not resident");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if !is_hit(pixel) {
                continue;
            }

            let world_position = node.local_to_world(pixel.truncate());
            let distance = world_position.distance(eye);
            if nearest.as_ref().is_none_or(|best| distance < best.distance) {
                nearest = Some(PickHit {
                    node: name.to_string(),
                    world_position,
                    distance,
                });
            }
        }

        Ok(nearest)
    }
}

/// The encoding shader writes exact sentinels; anything else is a miss.
#[allow(clippy::float_cmp)]
fn is_hit(pixel: Vec4) -> bool {
    pixel.w == 1.0
}

/// Builds the pick draw for `node`, or `None` if it cannot be drawn.
fn candidate_draw<'a>(
    registry: &'a Registry,
    options: &Options,
    name: &'a str,
    node: &'a VolumeNode,
) -> Option<NodeDraw<'a>> {
    if !node.is_enabled() {
        return None;
    }

    let (Some(volume), Some(transfer_function)) = (node.volume(), node.transfer_function())
    else {
        log::debug!("skipping pick candidate '{name}': volume or transfer function unset");
        return None;
    };
    if !node.is_bound()
        || !registry.volumes.contains(volume)
        || !registry.transfer_functions.contains(transfer_function)
    {
        log::debug!("skipping pick candidate '{name}': resources not registered");
        return None;
    }

    Some(NodeDraw {
        node: name,
        volume,
        transfer_function,
        shader: ShaderKind::PickPosition,
        uniforms: node.uniforms(options),
    })
}
