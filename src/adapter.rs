use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::error::Result;
use crate::segmentation::{EditBuffer, MaskVolume};
use crate::state::InteractionMode;

/// Normalized focus point, one coordinate in `[0, 1]` per spatial axis (x, y, z).
pub type Crosshair = [f32; 3];

pub const CENTERED_CROSSHAIR: Crosshair = [0.5, 0.5, 0.5];

/// Clip plane as `[depth, azimuth, elevation]`.
pub type ClipPlane = [f32; 3];

/// Depth 0 cuts through the volume centre.
pub const CLIP_PLANE_ENABLED: ClipPlane = [0.0, 0.0, 90.0];
/// Depth 2 lies outside the volume, so nothing is clipped.
pub const CLIP_PLANE_DISABLED: ClipPlane = [2.0, 0.0, 90.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrientation {
    Axial,
    Coronal,
    Sagittal,
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRef {
    pub path: PathBuf,
}

impl VolumeRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    LocationChanged(Crosshair),
    VolumesLoaded { count: usize },
    LoadFailed(String),
}

/// Capabilities the viewport controller needs from a rendering engine. The
/// engine owns decoded volumes, the crosshair and any pending strokes; the
/// controller only pushes declarative state and proposes crosshair moves.
pub trait RenderSurface {
    /// Starts an asynchronous load replacing every current volume. Completion
    /// is reported as a `SurfaceEvent` from a later `poll`.
    fn load_volumes(&mut self, refs: &[VolumeRef]) -> Result<()>;

    /// Advances latent work and flushes pending notifications.
    fn poll(&mut self);

    /// Registers the sink for location and load notifications.
    fn subscribe(&mut self, sink: Sender<SurfaceEvent>);

    fn volume_count(&self) -> usize;

    /// True from `load_volumes` until the matching result is installed or
    /// reported as failed.
    fn is_loading(&self) -> bool;

    fn background_dims(&self) -> Option<[usize; 3]>;

    /// `alpha` is in `[0, 1]`.
    fn set_opacity(&mut self, layer_index: usize, alpha: f32);

    fn set_clip_plane(&mut self, plane: ClipPlane);

    fn set_interaction_mode(&mut self, mode: InteractionMode);

    fn set_pen_enabled(&mut self, enabled: bool);

    fn set_pen_value(&mut self, value: u8, filled: bool);

    fn has_edit_buffer(&self) -> bool;

    fn edit_buffer(&self) -> Option<EditBuffer>;

    fn discard_edit(&mut self);

    fn mask_volume_mut(&mut self) -> Option<&mut MaskVolume>;

    fn redraw(&mut self);

    fn resolve_tile_at(&self, x: f32, y: f32) -> Option<usize>;

    fn tile_orientation(&self, tile: usize) -> Option<TileOrientation>;

    fn crosshair(&self) -> Crosshair;

    /// Moves the crosshair and emits `SurfaceEvent::LocationChanged`.
    fn set_crosshair(&mut self, crosshair: Crosshair);

    fn save_segmentation(&self, path: &Path) -> anyhow::Result<()>;

    fn save_document(&self, path: &Path) -> anyhow::Result<()>;

    /// Frees the graphics context and drops every volume reference.
    fn release(&mut self);
}
