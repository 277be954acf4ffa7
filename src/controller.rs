use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::adapter::{
    Crosshair, RenderSurface, SurfaceEvent, VolumeRef, CLIP_PLANE_DISABLED, CLIP_PLANE_ENABLED,
};
use crate::error::{Result, ViewerError};
use crate::navigation::SliceNavigator;
use crate::scene::{SceneDocument, QUAD_LAYOUT};
use crate::segmentation::{self, EditOutcome};
use crate::state::{EditAction, InteractionMode, Layer, PenMode, SliceInfo, ViewerState};

/// Owns the rendering surface for the lifetime of a mounted viewer and keeps
/// it in step with the declarative `ViewerState`.
pub struct ViewportController<S: RenderSurface> {
    surface: Option<S>,
    events: Option<Receiver<SurfaceEvent>>,
    state: ViewerState,
    navigator: SliceNavigator,
    slice_info: SliceInfo,
    location_text: String,
    pen_ever_enabled: bool,
}

impl<S: RenderSurface> ViewportController<S> {
    pub fn new(state: ViewerState, navigator: SliceNavigator) -> Self {
        let slice_info = SliceInfo::default();
        Self {
            surface: None,
            events: None,
            state,
            navigator,
            location_text: slice_info.describe(),
            slice_info,
            pen_ever_enabled: false,
        }
    }

    pub fn attach(&mut self, mut surface: S) {
        self.detach();
        let (tx, rx) = mpsc::channel();
        surface.subscribe(tx);
        self.surface = Some(surface);
        self.events = Some(rx);
        self.reconcile();
        self.refresh_slice_info();
    }

    /// Releases the surface. Notifications still in flight are dropped with
    /// the receiver.
    pub fn detach(&mut self) {
        self.events = None;
        if let Some(mut surface) = self.surface.take() {
            surface.release();
            log::debug!("Rendering surface released");
        }
        self.pen_ever_enabled = false;
        self.slice_info = SliceInfo::default();
        self.location_text = self.slice_info.describe();
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn slice_info(&self) -> SliceInfo {
        self.slice_info
    }

    pub fn location_text(&self) -> &str {
        &self.location_text
    }

    pub fn navigator(&self) -> &SliceNavigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut SliceNavigator {
        &mut self.navigator
    }

    pub fn volume_count(&self) -> usize {
        self.surface
            .as_ref()
            .map(RenderSurface::volume_count)
            .unwrap_or(0)
    }

    pub fn load_volumes(&mut self, refs: &[VolumeRef]) -> Result<()> {
        let surface = self.surface.as_mut().ok_or(ViewerError::AdapterUnavailable)?;
        surface.load_volumes(refs)?;
        log::info!("Loading {} volume(s)", refs.len());
        self.pen_ever_enabled = false;
        self.state.reset_drawing();
        Ok(())
    }

    /// Codes are validated before anything is loaded. The crosshair is not
    /// restored; a fresh load always starts centred.
    pub fn restore_scene(&mut self, scene: &SceneDocument) -> Result<()> {
        let mode = InteractionMode::from_code(scene.drag_mode)?;
        let pen = PenMode::from_code(scene.pen)?;
        if scene.volumes.is_empty() {
            return Err(ViewerError::invalid("scene lists no volumes"));
        }
        if scene.layout != QUAD_LAYOUT {
            log::warn!("Scene layout {} shown as {QUAD_LAYOUT}", scene.layout);
        }

        let refs = scene.volumes.iter().map(VolumeRef::new).collect::<Vec<_>>();
        self.load_volumes(&refs)?;
        self.set_opacity(Layer::Background, scene.opacity_value(0))?;
        self.set_opacity(Layer::Overlay, scene.opacity_value(1))?;
        self.set_clip_plane(scene.clip_plane_enabled());
        self.set_interaction_mode(mode);
        self.set_pen_mode(pen);
        Ok(())
    }

    pub fn set_opacity(&mut self, layer: Layer, value: i64) -> Result<()> {
        if self.state.set_opacity(layer, value)? {
            self.reconcile();
        }
        Ok(())
    }

    pub fn set_clip_plane(&mut self, enabled: bool) {
        if self.state.set_clip_plane(enabled) {
            self.reconcile();
        }
    }

    pub fn set_interaction_mode(&mut self, mode: InteractionMode) {
        if self.state.set_interaction_mode(mode) {
            self.reconcile();
        }
    }

    pub fn set_pen_mode(&mut self, mode: PenMode) {
        if mode != PenMode::Off {
            self.pen_ever_enabled = true;
        }
        if self.state.set_pen_mode(mode) {
            self.reconcile();
        }
    }

    /// Every outcome leaves the edit-action selector back on Undo. A commit
    /// also turns the pen off.
    pub fn apply_edit_action(&mut self, action: EditAction) -> Result<EditOutcome> {
        self.state.set_pending_edit_action(action);
        let result = match self.surface.as_mut() {
            Some(surface) => segmentation::apply_edit_action(surface, action, self.pen_ever_enabled),
            None => Err(ViewerError::AdapterUnavailable),
        };

        match &result {
            Ok(EditOutcome::Committed { action, changed }) => {
                log::info!("{} committed, {changed} voxel(s) changed", action.label());
                self.state.reset_drawing();
                self.reconcile();
            }
            Ok(EditOutcome::Discarded) => log::info!("Pending strokes discarded"),
            Ok(EditOutcome::NothingToUndo) => {}
            Err(err) => log::warn!("{} rejected: {err}", action.label()),
        }
        // A rejected edit keeps the pen so the strokes can still be committed.
        self.state.set_pending_edit_action(EditAction::Undo);
        result
    }

    pub fn handle_wheel(&mut self, x: f32, y: f32, scroll_delta: f32) -> Result<Option<Crosshair>> {
        let surface = self.surface.as_mut().ok_or(ViewerError::AdapterUnavailable)?;
        let moved = self.navigator.handle_wheel(surface, x, y, scroll_delta);
        if moved.is_some() {
            self.drain_events()?;
        }
        Ok(moved)
    }

    /// Polls the surface and applies its notifications. A failed volume load
    /// is returned after every pending notification has been handled.
    pub fn pump(&mut self) -> Result<()> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        surface.poll();
        self.drain_events()
    }

    pub fn save_segmentation(&self, path: &Path) -> anyhow::Result<()> {
        let surface = self.surface.as_ref().ok_or(ViewerError::AdapterUnavailable)?;
        if surface.volume_count() < 2 {
            return Err(ViewerError::NoSegmentationLoaded.into());
        }
        surface.save_segmentation(path)
    }

    pub fn save_scene(&self, path: &Path) -> anyhow::Result<()> {
        let surface = self.surface.as_ref().ok_or(ViewerError::AdapterUnavailable)?;
        surface.save_document(path)
    }

    fn drain_events(&mut self) -> Result<()> {
        let mut failure = None;
        loop {
            let Some(events) = self.events.as_ref() else {
                break;
            };
            match events.try_recv() {
                Ok(SurfaceEvent::LocationChanged(crosshair)) => {
                    self.on_location_changed(crosshair);
                }
                Ok(SurfaceEvent::VolumesLoaded { count }) => {
                    log::info!("{count} volume(s) loaded");
                    self.reconcile();
                    self.refresh_slice_info();
                }
                Ok(SurfaceEvent::LoadFailed(message)) => {
                    log::error!("Error loading volumes: {message}");
                    self.state.reset_drawing();
                    self.refresh_slice_info();
                    failure = Some(ViewerError::VolumeLoad(message));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    break;
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn on_location_changed(&mut self, crosshair: Crosshair) {
        let dims = self.surface.as_ref().and_then(RenderSurface::background_dims);
        self.slice_info = SliceInfo::from_crosshair(dims, crosshair);
        self.location_text = self.slice_info.describe();
        self.reconcile();
    }

    fn refresh_slice_info(&mut self) {
        let (dims, crosshair) = match self.surface.as_ref() {
            Some(surface) => (surface.background_dims(), surface.crosshair()),
            None => (None, crate::adapter::CENTERED_CROSSHAIR),
        };
        self.slice_info = SliceInfo::from_crosshair(dims, crosshair);
        self.location_text = self.slice_info.describe();
    }

    /// Pushes the declarative state to the surface. No-op while detached.
    fn reconcile(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let loaded = surface.volume_count();
        for layer in [Layer::Background, Layer::Overlay] {
            if layer.volume_index() < loaded {
                let alpha = f32::from(self.state.opacity(layer)) / 255.0;
                surface.set_opacity(layer.volume_index(), alpha);
            }
        }
        surface.set_clip_plane(if self.state.clip_plane_enabled() {
            CLIP_PLANE_ENABLED
        } else {
            CLIP_PLANE_DISABLED
        });
        surface.set_interaction_mode(self.state.interaction_mode());
        surface.set_pen_enabled(self.state.drawing_enabled());
        if let Some((value, filled)) = self.state.pen_mode().pen_value() {
            surface.set_pen_value(value, filled);
        }
    }
}

impl<S: RenderSurface> Drop for ViewportController<S> {
    fn drop(&mut self) {
        self.detach();
    }
}
