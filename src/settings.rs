use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::navigation::{SliceNavigator, DEFAULT_STEP_SIZE};
use crate::state::{
    InteractionMode, Layer, ViewerState, DEFAULT_BACKGROUND_OPACITY, DEFAULT_OVERLAY_OPACITY,
};

const APP_DIR_NAME: &str = "segview";
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub step_size: f32,
    pub invert_scroll: bool,
    pub background_opacity: u8,
    pub overlay_opacity: u8,
    pub interaction_mode: InteractionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            invert_scroll: false,
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            interaction_mode: InteractionMode::default(),
            catalog_path: None,
        }
    }
}

impl ViewerSettings {
    /// Missing or unreadable files give the defaults.
    pub fn load() -> Self {
        settings_file_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                log::warn!("Could not read settings {}: {err}", path.display());
                return Self::default();
            }
        };
        Self::from_toml(&text).unwrap_or_else(|err| {
            log::warn!("Ignoring invalid settings {}: {err:#}", path.display());
            Self::default()
        })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(text)?;
        if SliceNavigator::new(settings.step_size, settings.invert_scroll).is_err() {
            log::warn!(
                "Slice step {} is out of range; using {DEFAULT_STEP_SIZE}",
                settings.step_size
            );
            settings.step_size = DEFAULT_STEP_SIZE;
        }
        Ok(settings)
    }

    pub fn persist(&self) {
        let Some(path) = settings_file_path() else {
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::warn!("{err:#}");
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create settings dir {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Could not encode settings")?;
        fs::write(path, text)
            .with_context(|| format!("Could not write settings {}", path.display()))?;
        Ok(())
    }

    pub fn initial_state(&self) -> ViewerState {
        let mut state = ViewerState::default();
        for (layer, value) in [
            (Layer::Background, self.background_opacity),
            (Layer::Overlay, self.overlay_opacity),
        ] {
            if let Err(err) = state.set_opacity(layer, i64::from(value)) {
                log::warn!("{err}");
            }
        }
        state.set_interaction_mode(self.interaction_mode);
        state
    }

    pub fn navigator(&self) -> SliceNavigator {
        SliceNavigator::new(self.step_size, self.invert_scroll).unwrap_or_default()
    }
}

pub fn settings_file_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        return env::var_os("APPDATA")
            .map(PathBuf::from)
            .map(|base| base.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME));
    }

    #[cfg(target_os = "macos")]
    {
        return env::var_os("HOME").map(PathBuf::from).map(|home| {
            home.join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME)
                .join(SETTINGS_FILE_NAME)
        });
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join(APP_DIR_NAME).join(SETTINGS_FILE_NAME));
        }
        env::var_os("HOME").map(PathBuf::from).map(|home| {
            home.join(".config")
                .join(APP_DIR_NAME)
                .join(SETTINGS_FILE_NAME)
        })
    }
}
