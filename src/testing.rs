use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::Sender;

use crate::adapter::{
    ClipPlane, Crosshair, RenderSurface, SurfaceEvent, TileOrientation, VolumeRef,
    CENTERED_CROSSHAIR,
};
use crate::error::{Result, ViewerError};
use crate::segmentation::{EditBuffer, MaskVolume};
use crate::state::InteractionMode;

pub const FAKE_CANVAS: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Load(Vec<PathBuf>),
    Opacity(usize, f32),
    ClipPlane(ClipPlane),
    InteractionMode(InteractionMode),
    PenEnabled(bool),
    PenValue(u8, bool),
    DiscardEdit,
    Redraw,
    SetCrosshair(Crosshair),
    Release,
}

/// In-memory surface laid out as a 2x2 quad on a 200x200 canvas:
/// axial top-left, coronal top-right, sagittal bottom-left, render bottom-right.
pub struct FakeSurface {
    pub calls: Vec<SurfaceCall>,
    pub dims: Option<[usize; 3]>,
    pub volume_count: usize,
    pub mask: Option<MaskVolume>,
    pub edit: Option<EditBuffer>,
    pub crosshair: Crosshair,
    pub next_load: std::result::Result<[usize; 3], String>,
    pub released: Rc<Cell<bool>>,
    pending_load: Option<usize>,
    sink: Option<Sender<SurfaceEvent>>,
}

impl FakeSurface {
    pub fn empty() -> Self {
        Self {
            calls: Vec::new(),
            dims: None,
            volume_count: 0,
            mask: None,
            edit: None,
            crosshair: CENTERED_CROSSHAIR,
            next_load: Ok([4, 4, 4]),
            released: Rc::new(Cell::new(false)),
            pending_load: None,
            sink: None,
        }
    }

    pub fn with_volumes(dims: [usize; 3], count: usize) -> Self {
        let mut surface = Self::empty();
        surface.install(dims, count);
        surface
    }

    pub fn set_edit_buffer(&mut self, buffer: EditBuffer) {
        self.edit = Some(buffer);
    }

    pub fn tile_center(orientation: TileOrientation) -> (f32, f32) {
        let half = FAKE_CANVAS / 2.0;
        let quarter = FAKE_CANVAS / 4.0;
        match orientation {
            TileOrientation::Axial => (quarter, quarter),
            TileOrientation::Coronal => (half + quarter, quarter),
            TileOrientation::Sagittal => (quarter, half + quarter),
            TileOrientation::Render => (half + quarter, half + quarter),
        }
    }

    fn install(&mut self, dims: [usize; 3], count: usize) {
        self.dims = Some(dims);
        self.volume_count = count;
        self.mask = (count >= 2).then(|| MaskVolume::zeros(dims));
        self.edit = None;
    }

    fn emit(&self, event: SurfaceEvent) {
        if let Some(sink) = self.sink.as_ref() {
            let _ = sink.send(event);
        }
    }
}

impl RenderSurface for FakeSurface {
    fn load_volumes(&mut self, refs: &[VolumeRef]) -> Result<()> {
        if refs.is_empty() {
            return Err(ViewerError::invalid("no volumes requested"));
        }
        self.calls.push(SurfaceCall::Load(
            refs.iter().map(|volume| volume.path.clone()).collect(),
        ));
        self.pending_load = Some(refs.len());
        self.edit = None;
        Ok(())
    }

    fn poll(&mut self) {
        let Some(count) = self.pending_load.take() else {
            return;
        };
        match self.next_load.clone() {
            Ok(dims) => {
                self.install(dims, count);
                self.emit(SurfaceEvent::VolumesLoaded { count });
            }
            Err(message) => {
                self.dims = None;
                self.volume_count = 0;
                self.mask = None;
                self.emit(SurfaceEvent::LoadFailed(message));
            }
        }
    }

    fn subscribe(&mut self, sink: Sender<SurfaceEvent>) {
        self.sink = Some(sink);
    }

    fn volume_count(&self) -> usize {
        self.volume_count
    }

    fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    fn background_dims(&self) -> Option<[usize; 3]> {
        self.dims
    }

    fn set_opacity(&mut self, layer_index: usize, alpha: f32) {
        self.calls.push(SurfaceCall::Opacity(layer_index, alpha));
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) {
        self.calls.push(SurfaceCall::ClipPlane(plane));
    }

    fn set_interaction_mode(&mut self, mode: InteractionMode) {
        self.calls.push(SurfaceCall::InteractionMode(mode));
    }

    fn set_pen_enabled(&mut self, enabled: bool) {
        self.calls.push(SurfaceCall::PenEnabled(enabled));
        if enabled && self.edit.is_none() && self.pending_load.is_none() {
            if let Some([nx, ny, nz]) = self.dims {
                self.edit = Some(EditBuffer::blank(nx * ny * nz));
            }
        }
    }

    fn set_pen_value(&mut self, value: u8, filled: bool) {
        self.calls.push(SurfaceCall::PenValue(value, filled));
    }

    fn has_edit_buffer(&self) -> bool {
        self.edit.is_some()
    }

    fn edit_buffer(&self) -> Option<EditBuffer> {
        self.edit.clone()
    }

    fn discard_edit(&mut self) {
        self.calls.push(SurfaceCall::DiscardEdit);
        self.edit = None;
    }

    fn mask_volume_mut(&mut self) -> Option<&mut MaskVolume> {
        self.mask.as_mut()
    }

    fn redraw(&mut self) {
        self.calls.push(SurfaceCall::Redraw);
    }

    fn resolve_tile_at(&self, x: f32, y: f32) -> Option<usize> {
        if !(0.0..FAKE_CANVAS).contains(&x) || !(0.0..FAKE_CANVAS).contains(&y) {
            return None;
        }
        let column = usize::from(x >= FAKE_CANVAS / 2.0);
        let row = usize::from(y >= FAKE_CANVAS / 2.0);
        Some(row * 2 + column)
    }

    fn tile_orientation(&self, tile: usize) -> Option<TileOrientation> {
        match tile {
            0 => Some(TileOrientation::Axial),
            1 => Some(TileOrientation::Coronal),
            2 => Some(TileOrientation::Sagittal),
            3 => Some(TileOrientation::Render),
            _ => None,
        }
    }

    fn crosshair(&self) -> Crosshair {
        self.crosshair
    }

    fn set_crosshair(&mut self, crosshair: Crosshair) {
        self.calls.push(SurfaceCall::SetCrosshair(crosshair));
        self.crosshair = crosshair;
        self.emit(SurfaceEvent::LocationChanged(crosshair));
    }

    fn save_segmentation(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(self.mask.is_some(), "no mask to save");
        Ok(())
    }

    fn save_document(&self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn release(&mut self) {
        self.calls.push(SurfaceCall::Release);
        self.released.set(true);
        self.sink = None;
        self.mask = None;
        self.edit = None;
        self.dims = None;
        self.volume_count = 0;
    }
}
