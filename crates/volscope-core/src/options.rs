//! Configuration options for volscope.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolscopeError};
use crate::transfer_function::{DEFAULT_TABLE_WIDTH, MAX_TABLE_WIDTH};
use crate::volume_node::ShaderKind;

/// Name under which the default transfer function is registered.
pub const DEFAULT_TRANSFER_FUNCTION: &str = "tf_default";

/// Scene-wide configuration.
///
/// Every field has a default, so a JSON document only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Resolution of compiled transfer function lookup tables, `2..=256`.
    pub transfer_function_width: usize,

    /// Transfer function bound to volume nodes that do not name one.
    pub default_transfer_function: String,

    /// Shader bound to volume nodes that do not select one.
    pub default_shader: ShaderKind,

    /// Prefix for auto-generated volume names (`"<prefix>_<n>"`).
    pub volume_name_prefix: String,

    /// Prefix for auto-generated transfer function names.
    pub transfer_function_name_prefix: String,

    /// Prefix for auto-generated volume node names.
    pub node_name_prefix: String,

    /// Transfer function opacity at which the pick shader reports a hit.
    pub pick_opacity_threshold: f32,

    /// Ray-march samples across the full diagonal of a volume at level of detail 1.
    pub raymarch_steps: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            transfer_function_width: DEFAULT_TABLE_WIDTH,
            default_transfer_function: DEFAULT_TRANSFER_FUNCTION.to_string(),
            default_shader: ShaderKind::Raymarch,
            volume_name_prefix: "volume".to_string(),
            transfer_function_name_prefix: "tf".to_string(),
            node_name_prefix: "node".to_string(),
            pick_opacity_threshold: 0.05,
            raymarch_steps: 256,
        }
    }
}

impl Options {
    /// Parses options from a JSON string and validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks values that parse but cannot be honored.
    pub fn validate(&self) -> Result<()> {
        let width = self.transfer_function_width;
        if !(2..=MAX_TABLE_WIDTH).contains(&width) {
            return Err(VolscopeError::precondition(format!(
                "transfer_function_width {width} outside 2..={MAX_TABLE_WIDTH}"
            )));
        }
        Ok(())
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
