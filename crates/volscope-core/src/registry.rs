//! Named registries for volumes, transfer functions and volume nodes.
//!
//! Entries keep their registration order. Rendering and picking iterate
//! nodes in that order, which decides which node wins a picking tie.

use crate::transfer_function::TransferFunction;
use crate::volume::VoxelGrid;
use crate::volume_node::VolumeNode;

/// An insertion-ordered map from names to values.
#[derive(Debug, Clone)]
pub struct NamedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for NamedMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> NamedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`. A replaced entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        let name = name.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.position(name).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.position(name).map(|index| &mut self.entries[index].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes `name`, preserving the order of the remaining entries.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.position(name).map(|index| self.entries.remove(index).1)
    }

    /// Iterates entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `"<prefix>_<n>"` for the smallest `n >= len()` not already taken.
    pub fn auto_name(&self, prefix: &str) -> String {
        (self.len()..)
            .map(|n| format!("{prefix}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| format!("{prefix}_{}", self.len()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| entry == name)
    }
}

/// Every named resource a scene knows about.
#[derive(Debug, Default)]
pub struct Registry {
    pub volumes: NamedMap<VoxelGrid>,
    pub transfer_functions: NamedMap<TransferFunction>,
    pub nodes: NamedMap<VolumeNode>,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.volumes.clear();
        self.transfer_functions.clear();
        self.nodes.clear();
    }

    /// Enabled nodes whose volume and transfer function are both registered.
    pub fn drawable_nodes(&self) -> impl Iterator<Item = (&str, &VolumeNode)> {
        self.nodes.iter().filter(|(_, node)| {
            node.is_enabled()
                && node.volume().is_some_and(|v| self.volumes.contains(v))
                && node
                    .transfer_function()
                    .is_some_and(|tf| self.transfer_functions.contains(tf))
        })
    }
}
