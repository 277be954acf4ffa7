use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapter::{ClipPlane, Crosshair};

pub const QUAD_LAYOUT: &str = "quad";

/// Saved viewer scene. `drag_mode` and `pen` hold the numeric selector codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneDocument {
    pub layout: String,
    pub volumes: Vec<PathBuf>,
    pub opacity: [f32; 2],
    pub clip_plane: ClipPlane,
    pub drag_mode: i64,
    pub pen: i64,
    pub crosshair: Crosshair,
}

impl SceneDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read scene {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid scene {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("Could not encode scene document")?;
        fs::write(path, text)
            .with_context(|| format!("Could not write scene {}", path.display()))?;
        Ok(())
    }

    pub fn clip_plane_enabled(&self) -> bool {
        self.clip_plane[0] < 1.0
    }

    /// Opacity on the 0..=255 selector scale.
    pub fn opacity_value(&self, layer_index: usize) -> i64 {
        let alpha = self.opacity.get(layer_index).copied().unwrap_or(1.0);
        (alpha.clamp(0.0, 1.0) * 255.0).round() as i64
    }
}

/// Inverse of the surface pen encoding: disabled is -1, filled adds 8.
pub fn pen_code(enabled: bool, value: u8, filled: bool) -> i64 {
    if !enabled {
        return -1;
    }
    i64::from(value & 7) + if filled { 8 } else { 0 }
}
