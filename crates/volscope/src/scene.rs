//! The scene: registry, options and a backend that makes them visible.

use glam::Vec3;
use volscope_core::{
    NodeDraw, Options, PickBackend, PickHit, PickingEngine, Registry, Result, TransferFunction,
    VolscopeError, VolumeBackend, VolumeNode, VoxelGrid,
};

/// Owns every named resource and keeps the backend's copies of them current.
///
/// Names are unique per kind. Registering under an existing name replaces
/// the old entry and its GPU resources.
pub struct Scene<B> {
    registry: Registry,
    options: Options,
    picking: PickingEngine,
    backend: B,
}

impl<B: VolumeBackend + PickBackend> Scene<B> {
    /// Creates a scene and registers the default transfer function.
    ///
    /// The default is a linear ramp of `options.transfer_function_width`
    /// texels, registered as `options.default_transfer_function`. Options
    /// that fail [`Options::validate`] are rejected.
    pub fn new(backend: B, options: Options) -> Result<Self> {
        options.validate()?;
        let mut scene = Self {
            registry: Registry::new(),
            options,
            picking: PickingEngine::new(),
            backend,
        };
        let name = scene.options.default_transfer_function.clone();
        let ramp = TransferFunction::linear_ramp(scene.options.transfer_function_width);
        scene.add_transfer_function(ramp, Some(&name))?;
        Ok(scene)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The picking engine, e.g. to inspect how often the pick target was allocated.
    pub fn picking(&self) -> &PickingEngine {
        &self.picking
    }

    // ========== Volumes ==========

    /// Registers `grid` and uploads its texture. Returns the name used.
    ///
    /// Without a name the grid is called `"<volume_name_prefix>_<n>"`.
    /// The grid must satisfy its byte-length invariant. Nodes already bound
    /// to a replaced volume pick up the new geometry.
    pub fn add_volume(&mut self, grid: VoxelGrid, name: Option<&str>) -> Result<String> {
        grid.validate()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .registry
                .volumes
                .auto_name(&self.options.volume_name_prefix),
        };

        self.backend.upload_volume(&name, &grid)?;

        for (_, node) in self.registry.nodes.iter_mut() {
            if node.volume() == Some(name.as_str()) {
                node.bind_volume(&grid);
            }
        }

        let dims = grid.dims();
        log::info!(
            "registered volume '{name}' ({}x{}x{}, {} bits per voxel)",
            dims.x,
            dims.y,
            dims.z,
            grid.voxel_depth_bits()
        );
        self.registry.volumes.insert(name.clone(), grid);
        Ok(name)
    }

    pub fn volume(&self, name: &str) -> Option<&VoxelGrid> {
        self.registry.volumes.get(name)
    }

    /// Unregisters a volume and releases its texture.
    ///
    /// Nodes that draw it stay registered and are skipped until a volume of
    /// that name is added again.
    pub fn remove_volume(&mut self, name: &str) -> Option<VoxelGrid> {
        let grid = self.registry.volumes.remove(name)?;
        self.backend.release_volume(name);
        log::info!("removed volume '{name}'");
        Some(grid)
    }

    // ========== Transfer functions ==========

    /// Registers `tf` and uploads its lookup table. Returns the name used.
    pub fn add_transfer_function(
        &mut self,
        mut tf: TransferFunction,
        name: Option<&str>,
    ) -> Result<String> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .registry
                .transfer_functions
                .auto_name(&self.options.transfer_function_name_prefix),
        };

        // A table compiled for another scene has never reached this backend.
        tf.mark_upload_needed();
        let backend = &mut self.backend;
        tf.synchronize(|table| backend.upload_transfer_function(&name, table))?;

        log::info!(
            "registered transfer function '{name}' ({} texels)",
            tf.width()
        );
        self.registry.transfer_functions.insert(name.clone(), tf);
        Ok(name)
    }

    pub fn transfer_function(&self, name: &str) -> Option<&TransferFunction> {
        self.registry.transfer_functions.get(name)
    }

    /// Mutable access for editing control points.
    ///
    /// Edits only mark the table stale; it is recompiled and uploaded once on
    /// the next [`Self::sync`], render or pick.
    pub fn transfer_function_mut(&mut self, name: &str) -> Option<&mut TransferFunction> {
        self.registry.transfer_functions.get_mut(name)
    }

    /// Unregisters a transfer function and releases its lookup table.
    pub fn remove_transfer_function(&mut self, name: &str) -> Option<TransferFunction> {
        let tf = self.registry.transfer_functions.remove(name)?;
        self.backend.release_transfer_function(name);
        log::info!("removed transfer function '{name}'");
        Some(tf)
    }

    // ========== Volume nodes ==========

    /// Registers a node drawing an already registered volume. Returns the name used.
    ///
    /// A node without a transfer function or shader gets the scene defaults.
    pub fn add_volume_node(&mut self, mut node: VolumeNode, name: Option<&str>) -> Result<String> {
        let Some(volume_name) = node.volume() else {
            return Err(VolscopeError::Precondition(
                "volume node has no volume".to_string(),
            ));
        };
        let Some(grid) = self.registry.volumes.get(volume_name) else {
            return Err(VolscopeError::NotFound {
                kind: "volume",
                name: volume_name.to_string(),
            });
        };
        node.bind_volume(grid);
        node.apply_defaults(&self.options);

        if let Some(tf) = node.transfer_function() {
            if !self.registry.transfer_functions.contains(tf) {
                log::warn!("transfer function '{tf}' is not registered yet");
            }
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .registry
                .nodes
                .auto_name(&self.options.node_name_prefix),
        };
        log::info!(
            "registered volume node '{name}' (volume '{}')",
            node.volume().unwrap_or_default()
        );
        self.registry.nodes.insert(name.clone(), node);
        Ok(name)
    }

    pub fn volume_node(&self, name: &str) -> Option<&VolumeNode> {
        self.registry.nodes.get(name)
    }

    /// Mutable access for shading and placement parameters.
    ///
    /// Rebinding a node to another volume goes through
    /// [`Self::remove_volume_node`] and [`Self::add_volume_node`].
    pub fn volume_node_mut(&mut self, name: &str) -> Option<&mut VolumeNode> {
        self.registry.nodes.get_mut(name)
    }

    pub fn remove_volume_node(&mut self, name: &str) -> Option<VolumeNode> {
        let node = self.registry.nodes.remove(name)?;
        log::info!("removed volume node '{name}'");
        Some(node)
    }

    /// Removes every volume, node and transfer function except the default one.
    pub fn remove_all(&mut self) {
        for name in self.registry.volumes.names() {
            self.backend.release_volume(name);
        }
        for name in self.registry.transfer_functions.names() {
            if name != self.options.default_transfer_function {
                self.backend.release_transfer_function(name);
            }
        }
        let default_tf = self
            .registry
            .transfer_functions
            .remove(&self.options.default_transfer_function);
        self.registry.clear();
        if let Some(tf) = default_tf {
            self.registry
                .transfer_functions
                .insert(self.options.default_transfer_function.clone(), tf);
        }
    }

    // ========== Frame ==========

    /// Recompiles and uploads every stale lookup table. Returns how many were uploaded.
    pub fn sync(&mut self) -> Result<usize> {
        let backend = &mut self.backend;
        let mut uploads = 0;
        for (name, tf) in self.registry.transfer_functions.iter_mut() {
            if tf.synchronize(|table| backend.upload_transfer_function(name, table))? {
                log::debug!("uploaded lookup table '{name}'");
                uploads += 1;
            }
        }
        Ok(uploads)
    }

    /// Draws every drawable node in registration order and returns RGBA8 pixels.
    pub fn render_to_image(&mut self) -> Result<Vec<u8>> {
        self.sync()?;
        let draws: Vec<NodeDraw<'_>> = self
            .registry
            .drawable_nodes()
            .filter_map(|(name, node)| {
                Some(NodeDraw {
                    node: name,
                    volume: node.volume()?,
                    transfer_function: node.transfer_function()?,
                    shader: node.shader().unwrap_or(self.options.default_shader),
                    uniforms: node.uniforms(&self.options),
                })
            })
            .collect();
        self.backend.render_frame(&draws)
    }

    // ========== Picking ==========

    /// World position of the nearest visible volume under pixel `(x, y)`.
    ///
    /// Pixel coordinates start at the top-left of the viewport. Returns
    /// `None` when nothing is hit or the pixel lies outside the viewport.
    pub fn pick_position(&mut self, x: u32, y: u32) -> Result<Option<Vec3>> {
        Ok(self.pick(x, y)?.map(|hit| hit.world_position))
    }

    /// Like [`Self::pick_position`], also naming the node that was hit.
    pub fn pick(&mut self, x: u32, y: u32) -> Result<Option<PickHit>> {
        self.sync()?;
        self.picking
            .pick(&mut self.backend, &self.registry, &self.options, x, y)
    }

    /// World-space bounding box of every drawable node, if there is one.
    pub fn world_bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        for (_, node) in self.registry.drawable_nodes() {
            for i in 0..8u8 {
                let corner = Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                );
                let p = node.local_to_world(corner);
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(p), max.max(p)),
                    None => (p, p),
                });
            }
        }
        bounds
    }
}

impl<B> std::fmt::Debug for Scene<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("volumes", &self.registry.volumes.len())
            .field("transfer_functions", &self.registry.transfer_functions.len())
            .field("nodes", &self.registry.nodes.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
