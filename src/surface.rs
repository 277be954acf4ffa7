use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use anyhow::Result;
use eframe::egui::{self, Color32, Pos2, Rect, TextureHandle, TextureOptions, Vec2};

use crate::adapter::{
    ClipPlane, Crosshair, RenderSurface, SurfaceEvent, TileOrientation, VolumeRef,
    CENTERED_CROSSHAIR, CLIP_PLANE_DISABLED,
};
use crate::error::ViewerError;
use crate::renderer::{render_projection, render_slice, LayerLook, SlicePlane};
use crate::scene::{pen_code, SceneDocument, QUAD_LAYOUT};
use crate::segmentation::{EditBuffer, MaskVolume};
use crate::state::InteractionMode;
use crate::volume::{spawn_volume_set_load, write_mask, LoadedVolumes, VolumeLoadMessage};

/// Quad layout, row-major: axial and coronal on top, sagittal and the 3-D
/// render below.
pub const TILE_ORDER: [TileOrientation; 4] = [
    TileOrientation::Axial,
    TileOrientation::Coronal,
    TileOrientation::Sagittal,
    TileOrientation::Render,
];

const TILE_GAP: f32 = 2.0;
const MAX_ZOOM: f32 = 12.0;
const CROSSHAIR_COLOR: Color32 = Color32::from_rgb(220, 40, 40);
const RULER_COLOR: Color32 = Color32::from_rgb(240, 200, 40);

struct Stroke {
    tile: usize,
    plane: SlicePlane,
    depth: usize,
    points: Vec<[usize; 2]>,
}

struct Ruler {
    start: Pos2,
    end: Pos2,
    length_mm: f32,
}

pub struct SoftwareSurface {
    ctx: egui::Context,
    refs: Vec<VolumeRef>,
    pending_refs: Vec<VolumeRef>,
    volumes: Option<LoadedVolumes>,
    sink: Option<Sender<SurfaceEvent>>,
    load_receiver: Option<Receiver<VolumeLoadMessage>>,
    load_generation: u64,
    opacity: [f32; 2],
    clip_plane: ClipPlane,
    interaction_mode: InteractionMode,
    pen_enabled: bool,
    pen_value: u8,
    pen_filled: bool,
    edit: Option<EditBuffer>,
    stroke: Option<Stroke>,
    crosshair: Crosshair,
    window_center: f32,
    window_width: f32,
    zoom: f32,
    pan: Vec2,
    tiles: [Rect; 4],
    textures: [Option<TextureHandle>; 4],
    dirty: bool,
    drag_tile: Option<usize>,
    ruler: Option<Ruler>,
}

impl SoftwareSurface {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            refs: Vec::new(),
            pending_refs: Vec::new(),
            volumes: None,
            sink: None,
            load_receiver: None,
            load_generation: 0,
            opacity: [1.0, 0.5],
            clip_plane: CLIP_PLANE_DISABLED,
            interaction_mode: InteractionMode::default(),
            pen_enabled: false,
            pen_value: 0,
            pen_filled: false,
            edit: None,
            stroke: None,
            crosshair: CENTERED_CROSSHAIR,
            window_center: 0.0,
            window_width: 1.0,
            zoom: 1.0,
            pan: Vec2::ZERO,
            tiles: [Rect::NOTHING; 4],
            textures: [None, None, None, None],
            dirty: false,
            drag_tile: None,
            ruler: None,
        }
    }

    pub fn scene_document(&self) -> SceneDocument {
        SceneDocument {
            layout: QUAD_LAYOUT.to_string(),
            volumes: self.refs.iter().map(|volume| volume.path.clone()).collect(),
            opacity: self.opacity,
            clip_plane: self.clip_plane,
            drag_mode: self.interaction_mode.code(),
            pen: pen_code(self.pen_enabled, self.pen_value, self.pen_filled),
            crosshair: self.crosshair,
        }
    }

    pub fn paint(&mut self, ui: &egui::Ui, rect: Rect) {
        self.tiles = layout_tiles(rect);
        if self.dirty {
            self.rebuild_textures();
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(20));
        for (index, tile) in self.tiles.iter().enumerate() {
            painter.rect_filled(*tile, 0.0, Color32::BLACK);
            let Some(image_rect) = self.image_rect(index) else {
                continue;
            };
            if let Some(texture) = self.textures[index].as_ref() {
                painter.with_clip_rect(*tile).image(
                    texture.id(),
                    image_rect,
                    Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            if let Some([column, row]) = self.crosshair_position(index, image_rect) {
                let clipped = painter.with_clip_rect(*tile);
                let stroke = egui::Stroke::new(1.0, CROSSHAIR_COLOR);
                clipped.line_segment(
                    [egui::pos2(column, tile.top()), egui::pos2(column, tile.bottom())],
                    stroke,
                );
                clipped.line_segment(
                    [egui::pos2(tile.left(), row), egui::pos2(tile.right(), row)],
                    stroke,
                );
            }
            painter.text(
                tile.left_bottom() + egui::vec2(6.0, -6.0),
                egui::Align2::LEFT_BOTTOM,
                tile_label(TILE_ORDER[index]),
                egui::FontId::proportional(12.0),
                Color32::from_gray(200),
            );
        }

        if let Some(ruler) = self.ruler.as_ref() {
            let stroke = egui::Stroke::new(1.5, RULER_COLOR);
            painter.line_segment([ruler.start, ruler.end], stroke);
            painter.text(
                ruler.end + egui::vec2(6.0, -6.0),
                egui::Align2::LEFT_BOTTOM,
                format!("{:.1} mm", ruler.length_mm),
                egui::FontId::proportional(12.0),
                RULER_COLOR,
            );
        }
    }

    /// Routes a pointer response over the surface: strokes while a pen is
    /// active, otherwise the pushed interaction mode decides.
    pub fn handle_pointer(&mut self, response: &egui::Response, zoom_delta: f32) {
        if self.volumes.is_none() {
            return;
        }
        let zooming = (zoom_delta - 1.0).abs() > f32::EPSILON;
        if zooming && self.interaction_mode == InteractionMode::PanZoom {
            self.zoom = (self.zoom * zoom_delta).clamp(1.0, MAX_ZOOM);
            if self.zoom <= 1.0 {
                self.pan = Vec2::ZERO;
            }
        }

        let Some(pos) = response.interact_pointer_pos() else {
            if response.drag_stopped() {
                self.end_drag();
            }
            return;
        };
        if response.drag_started() || response.clicked() {
            self.drag_tile = self.resolve_tile_at(pos.x, pos.y);
        }
        let Some(tile) = self.drag_tile else {
            return;
        };

        if self.pen_enabled && self.edit.is_some() {
            if response.clicked() || response.drag_started() || response.dragged() {
                self.paint_stroke(tile, pos);
            }
            if response.clicked() || response.drag_stopped() {
                self.end_drag();
            }
            return;
        }

        if response.clicked() {
            self.move_crosshair_to(tile, pos);
            self.ruler = None;
            return;
        }

        match self.interaction_mode {
            InteractionMode::None => {}
            InteractionMode::Contrast => {
                if response.dragged() {
                    self.apply_window_level_drag(response.drag_delta());
                }
            }
            InteractionMode::Measurement => {
                if response.drag_started() {
                    self.ruler = Some(Ruler {
                        start: pos,
                        end: pos,
                        length_mm: 0.0,
                    });
                }
                if response.dragged() {
                    let mm_per_point = self.mm_per_point(tile);
                    if let Some(ruler) = self.ruler.as_mut() {
                        ruler.end = pos;
                        ruler.length_mm = (ruler.end - ruler.start).length() * mm_per_point;
                    }
                }
            }
            InteractionMode::PanZoom => {
                if response.dragged() && self.zoom > 1.0 {
                    self.pan += response.drag_delta();
                }
            }
            InteractionMode::Slicer3D => {
                if response.dragged() {
                    self.move_crosshair_to(tile, pos);
                }
            }
        }
        if response.drag_stopped() {
            self.end_drag();
        }
    }

    fn end_drag(&mut self) {
        self.finish_stroke();
        self.drag_tile = None;
    }

    fn dims(&self) -> Option<[usize; 3]> {
        self.volumes.as_ref().map(|volumes| volumes.background.dims)
    }

    fn emit(&self, event: SurfaceEvent) {
        if let Some(sink) = self.sink.as_ref() {
            if sink.send(event).is_err() {
                log::debug!("Surface notification dropped: controller gone");
            }
        }
    }

    fn install(&mut self, loaded: LoadedVolumes) {
        let (center, width) = loaded.background.default_window();
        self.window_center = center;
        self.window_width = width;
        let count = loaded.count();
        if let Some(overlay) = loaded.overlay.as_ref() {
            log::debug!(
                "{} has {} labelled voxel(s)",
                overlay.path.display(),
                overlay.mask.labelled_count()
            );
        }
        self.volumes = Some(loaded);
        self.refs = std::mem::take(&mut self.pending_refs);
        self.edit = None;
        self.stroke = None;
        self.ruler = None;
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
        self.crosshair = CENTERED_CROSSHAIR;
        self.dirty = true;
        self.emit(SurfaceEvent::VolumesLoaded { count });
        self.emit(SurfaceEvent::LocationChanged(self.crosshair));
    }

    fn clear_volumes(&mut self) {
        self.volumes = None;
        self.refs.clear();
        self.edit = None;
        self.stroke = None;
        self.ruler = None;
        self.textures = [None, None, None, None];
        self.dirty = false;
    }

    fn look(&self) -> LayerLook {
        LayerLook {
            window_center: self.window_center,
            window_width: self.window_width,
            background_alpha: self.opacity[0],
            overlay_alpha: self.opacity[1],
        }
    }

    fn crosshair_voxel(&self, dims: [usize; 3]) -> [usize; 3] {
        let mut voxel = [0; 3];
        for axis in 0..3 {
            let last = dims[axis].saturating_sub(1);
            voxel[axis] = ((self.crosshair[axis] * last as f32).round() as usize).min(last);
        }
        voxel
    }

    fn rebuild_textures(&mut self) {
        self.dirty = false;
        let images = {
            let Some(volumes) = self.volumes.as_ref() else {
                return;
            };
            let background = &volumes.background;
            let mask = volumes.overlay.as_ref().map(|overlay| &overlay.mask);
            let look = self.look();
            let depth_voxel = self.crosshair_voxel(background.dims);
            TILE_ORDER
                .iter()
                .map(|orientation| match SlicePlane::for_orientation(*orientation) {
                    Some(plane) => render_slice(
                        background,
                        mask,
                        self.edit.as_ref(),
                        plane,
                        depth_voxel[plane.depth_axis],
                        &look,
                    ),
                    None => render_projection(background, mask, self.clip_plane, &look),
                })
                .collect::<Vec<_>>()
        };

        for (index, image) in images.into_iter().enumerate() {
            if let Some(texture) = self.textures[index].as_mut() {
                texture.set(image, TextureOptions::NEAREST);
                continue;
            }
            self.textures[index] = Some(self.ctx.load_texture(
                format!("segview-tile-{index}"),
                image,
                TextureOptions::NEAREST,
            ));
        }
    }

    fn image_rect(&self, tile: usize) -> Option<Rect> {
        let volumes = self.volumes.as_ref()?;
        let dims = volumes.background.dims;
        let spacing = volumes.background.spacing;
        let tile_rect = *self.tiles.get(tile)?;
        if !tile_rect.is_positive() {
            return None;
        }

        let (columns, rows, column_mm, row_mm, zoomable) =
            match SlicePlane::for_orientation(*TILE_ORDER.get(tile)?) {
                Some(plane) => {
                    let [columns, rows] = plane.size(dims);
                    (
                        columns,
                        rows,
                        spacing[plane.column_axis],
                        spacing[plane.row_axis],
                        true,
                    )
                }
                None => (dims[0], dims[2], spacing[0], spacing[2], false),
            };
        let world = egui::vec2(columns as f32 * column_mm, rows as f32 * row_mm);
        if world.x <= 0.0 || world.y <= 0.0 {
            return None;
        }
        let fit = (tile_rect.width() / world.x).min(tile_rect.height() / world.y);
        let (zoom, pan) = if zoomable {
            (self.zoom, self.pan)
        } else {
            (1.0, Vec2::ZERO)
        };
        Some(Rect::from_center_size(
            tile_rect.center() + pan,
            world * fit * zoom,
        ))
    }

    fn mm_per_point(&self, tile: usize) -> f32 {
        let (Some(volumes), Some(rect)) = (self.volumes.as_ref(), self.image_rect(tile)) else {
            return 0.0;
        };
        let Some(plane) = TILE_ORDER
            .get(tile)
            .and_then(|orientation| SlicePlane::for_orientation(*orientation))
        else {
            return 0.0;
        };
        let background = &volumes.background;
        let world_width =
            background.dims[plane.column_axis] as f32 * background.spacing[plane.column_axis];
        world_width / rect.width().max(f32::EPSILON)
    }

    fn crosshair_position(&self, tile: usize, image_rect: Rect) -> Option<[f32; 2]> {
        let dims = self.dims()?;
        let plane = SlicePlane::for_orientation(*TILE_ORDER.get(tile)?)?;
        let [columns, rows] = plane.size(dims);
        let [column, row] = plane.pixel(dims, self.crosshair_voxel(dims));
        Some([
            image_rect.left() + (column as f32 + 0.5) / columns as f32 * image_rect.width(),
            image_rect.top() + (row as f32 + 0.5) / rows as f32 * image_rect.height(),
        ])
    }

    fn pixel_at(&self, tile: usize, pos: Pos2) -> Option<(SlicePlane, [usize; 2])> {
        let dims = self.dims()?;
        let plane = SlicePlane::for_orientation(*TILE_ORDER.get(tile)?)?;
        let rect = self.image_rect(tile)?;
        if !rect.contains(pos) {
            return None;
        }
        let [columns, rows] = plane.size(dims);
        let column = ((pos.x - rect.left()) / rect.width() * columns as f32).floor() as usize;
        let row = ((pos.y - rect.top()) / rect.height() * rows as f32).floor() as usize;
        Some((
            plane,
            [column.min(columns.saturating_sub(1)), row.min(rows.saturating_sub(1))],
        ))
    }

    fn move_crosshair_to(&mut self, tile: usize, pos: Pos2) {
        let Some(dims) = self.dims() else {
            return;
        };
        let Some((plane, [column, row])) = self.pixel_at(tile, pos) else {
            return;
        };
        let depth = self.crosshair_voxel(dims)[plane.depth_axis];
        let voxel = plane.voxel(dims, column, row, depth);
        let mut crosshair = self.crosshair;
        for axis in [plane.column_axis, plane.row_axis] {
            crosshair[axis] = normalized(voxel[axis], dims[axis]);
        }
        self.set_crosshair(crosshair);
    }

    fn apply_window_level_drag(&mut self, drag_delta: Vec2) {
        let Some(volumes) = self.volumes.as_ref() else {
            return;
        };
        if drag_delta == Vec2::ZERO {
            return;
        }
        let span = (volumes.background.max_value - volumes.background.min_value).abs();
        let sensitivity = (span / 512.0).clamp(0.01, 256.0);
        self.window_center += -drag_delta.y * sensitivity;
        self.window_width = (self.window_width + drag_delta.x * sensitivity).max(1.0);
        self.dirty = true;
    }

    fn paint_stroke(&mut self, tile: usize, pos: Pos2) {
        let Some(dims) = self.dims() else {
            return;
        };
        let Some((plane, pixel)) = self.pixel_at(tile, pos) else {
            return;
        };
        if self.stroke.as_ref().is_some_and(|stroke| stroke.tile != tile) {
            self.finish_stroke();
        }
        let depth = self.crosshair_voxel(dims)[plane.depth_axis];
        let stroke = self.stroke.get_or_insert_with(|| Stroke {
            tile,
            plane,
            depth,
            points: Vec::new(),
        });
        let from = stroke.points.last().copied().unwrap_or(pixel);
        if stroke.points.last() != Some(&pixel) {
            stroke.points.push(pixel);
        }
        let (plane, depth) = (stroke.plane, stroke.depth);
        for point in line_pixels(from, pixel) {
            self.write_pen(dims, plane, depth, point);
        }
        self.dirty = true;
    }

    fn finish_stroke(&mut self) {
        let Some(stroke) = self.stroke.take() else {
            return;
        };
        let Some(dims) = self.dims() else {
            return;
        };
        if self.pen_filled && stroke.points.len() >= 3 {
            for point in fill_polygon(&stroke.points, stroke.plane.size(dims)) {
                self.write_pen(dims, stroke.plane, stroke.depth, point);
            }
            self.dirty = true;
        }
    }

    fn write_pen(&mut self, dims: [usize; 3], plane: SlicePlane, depth: usize, pixel: [usize; 2]) {
        let [x, y, z] = plane.voxel(dims, pixel[0], pixel[1], depth);
        if let Some(edit) = self.edit.as_mut() {
            edit.set_flag(x + dims[0] * (y + dims[1] * z), self.pen_value);
        }
    }
}

impl RenderSurface for SoftwareSurface {
    fn load_volumes(&mut self, refs: &[VolumeRef]) -> crate::error::Result<()> {
        if refs.is_empty() {
            return Err(ViewerError::invalid("no volumes to load"));
        }
        self.load_generation = self.load_generation.wrapping_add(1);
        let (tx, rx) = mpsc::channel();
        spawn_volume_set_load(self.load_generation, refs.to_vec(), tx);
        self.load_receiver = Some(rx);
        self.pending_refs = refs.to_vec();
        self.stroke = None;
        if self.edit.take().is_some() {
            log::debug!("Unsaved strokes dropped for the new load");
            self.dirty = true;
        }
        self.ctx.request_repaint();
        Ok(())
    }

    fn poll(&mut self) {
        let Some(receiver) = self.load_receiver.take() else {
            return;
        };

        match receiver.try_recv() {
            Ok((generation, _)) if generation != self.load_generation => {
                log::debug!("Dropping stale volume load {generation}");
            }
            Ok((_, Ok(loaded))) => {
                log::info!(
                    "Loaded {} ({}x{}x{})",
                    loaded.background.path.display(),
                    loaded.background.dims[0],
                    loaded.background.dims[1],
                    loaded.background.dims[2]
                );
                self.install(loaded);
                self.ctx.request_repaint();
            }
            Ok((_, Err(message))) => {
                self.clear_volumes();
                self.emit(SurfaceEvent::LoadFailed(message));
                self.ctx.request_repaint();
            }
            Err(TryRecvError::Empty) => {
                self.load_receiver = Some(receiver);
                self.ctx.request_repaint_after(Duration::from_millis(16));
            }
            Err(TryRecvError::Disconnected) => {
                self.clear_volumes();
                self.emit(SurfaceEvent::LoadFailed(
                    "volume loader exited without a result".to_string(),
                ));
            }
        }
    }

    fn subscribe(&mut self, sink: Sender<SurfaceEvent>) {
        self.sink = Some(sink);
    }

    fn volume_count(&self) -> usize {
        self.volumes.as_ref().map(LoadedVolumes::count).unwrap_or(0)
    }

    fn is_loading(&self) -> bool {
        self.load_receiver.is_some()
    }

    fn background_dims(&self) -> Option<[usize; 3]> {
        self.dims()
    }

    fn set_opacity(&mut self, layer_index: usize, alpha: f32) {
        if let Some(slot) = self.opacity.get_mut(layer_index) {
            let alpha = alpha.clamp(0.0, 1.0);
            if *slot != alpha {
                *slot = alpha;
                self.dirty = true;
            }
        }
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) {
        if self.clip_plane != plane {
            self.clip_plane = plane;
            self.dirty = true;
        }
    }

    fn set_interaction_mode(&mut self, mode: InteractionMode) {
        if self.interaction_mode != mode {
            self.interaction_mode = mode;
            self.ruler = None;
        }
    }

    fn set_pen_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.finish_stroke();
        }
        self.pen_enabled = enabled;
        if enabled && self.edit.is_none() && !self.is_loading() {
            if let Some(volumes) = self.volumes.as_ref() {
                self.edit = Some(EditBuffer::blank(volumes.background.voxel_count()));
            }
        }
    }

    fn set_pen_value(&mut self, value: u8, filled: bool) {
        self.pen_value = value;
        self.pen_filled = filled;
    }

    fn has_edit_buffer(&self) -> bool {
        self.edit.is_some()
    }

    fn edit_buffer(&self) -> Option<EditBuffer> {
        self.edit.clone()
    }

    fn discard_edit(&mut self) {
        self.stroke = None;
        if self.edit.take().is_some() {
            self.dirty = true;
        }
    }

    fn mask_volume_mut(&mut self) -> Option<&mut MaskVolume> {
        self.volumes
            .as_mut()?
            .overlay
            .as_mut()
            .map(|overlay| &mut overlay.mask)
    }

    fn redraw(&mut self) {
        self.dirty = true;
        self.ctx.request_repaint();
    }

    fn resolve_tile_at(&self, x: f32, y: f32) -> Option<usize> {
        let pos = egui::pos2(x, y);
        self.tiles.iter().position(|tile| tile.contains(pos))
    }

    fn tile_orientation(&self, tile: usize) -> Option<TileOrientation> {
        TILE_ORDER.get(tile).copied()
    }

    fn crosshair(&self) -> Crosshair {
        self.crosshair
    }

    fn set_crosshair(&mut self, crosshair: Crosshair) {
        let clamped = crosshair.map(|coord| coord.clamp(0.0, 1.0));
        if clamped != self.crosshair {
            self.crosshair = clamped;
            self.dirty = true;
        }
        self.emit(SurfaceEvent::LocationChanged(self.crosshair));
    }

    fn save_segmentation(&self, path: &Path) -> Result<()> {
        let volumes = self
            .volumes
            .as_ref()
            .ok_or(ViewerError::NoSegmentationLoaded)?;
        let overlay = volumes
            .overlay
            .as_ref()
            .ok_or(ViewerError::NoSegmentationLoaded)?;
        write_mask(&overlay.mask, &volumes.background.header, path)?;
        log::info!("Saved segmentation to {}", path.display());
        Ok(())
    }

    fn save_document(&self, path: &Path) -> Result<()> {
        self.scene_document().save(path)?;
        log::info!("Saved scene to {}", path.display());
        Ok(())
    }

    fn release(&mut self) {
        self.load_receiver = None;
        self.sink = None;
        self.pending_refs.clear();
        self.clear_volumes();
        self.tiles = [Rect::NOTHING; 4];
        log::debug!("Software surface released its textures and volumes");
    }
}

pub fn layout_tiles(rect: Rect) -> [Rect; 4] {
    let cell = egui::vec2(
        ((rect.width() - TILE_GAP).max(2.0)) / 2.0,
        ((rect.height() - TILE_GAP).max(2.0)) / 2.0,
    );
    let mut tiles = [Rect::NOTHING; 4];
    for (index, tile) in tiles.iter_mut().enumerate() {
        let column = (index % 2) as f32;
        let row = (index / 2) as f32;
        let min = rect.min + egui::vec2(column * (cell.x + TILE_GAP), row * (cell.y + TILE_GAP));
        *tile = Rect::from_min_size(min, cell);
    }
    tiles
}

pub fn tile_label(orientation: TileOrientation) -> &'static str {
    match orientation {
        TileOrientation::Axial => "Axial",
        TileOrientation::Coronal => "Coronal",
        TileOrientation::Sagittal => "Sagittal",
        TileOrientation::Render => "3D",
    }
}

fn normalized(voxel: usize, count: usize) -> f32 {
    if count > 1 {
        voxel as f32 / (count - 1) as f32
    } else {
        0.5
    }
}

/// Every pixel on the segment from `from` to `to`, endpoints included.
pub fn line_pixels(from: [usize; 2], to: [usize; 2]) -> Vec<[usize; 2]> {
    let (mut x, mut y) = (from[0] as i64, from[1] as i64);
    let (x1, y1) = (to[0] as i64, to[1] as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let step_x = if x < x1 { 1 } else { -1 };
    let step_y = if y < y1 { 1 } else { -1 };
    let mut error = dx + dy;
    let mut pixels = Vec::new();

    loop {
        pixels.push([x as usize, y as usize]);
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            y += step_y;
        }
    }
    pixels
}

/// Even-odd scanline fill of the closed outline, sampled at pixel centres.
pub fn fill_polygon(outline: &[[usize; 2]], size: [usize; 2]) -> Vec<[usize; 2]> {
    if outline.len() < 3 || size[0] == 0 || size[1] == 0 {
        return Vec::new();
    }
    let centre = |point: [usize; 2]| (point[0] as f32 + 0.5, point[1] as f32 + 0.5);
    let top = outline.iter().map(|point| point[1]).min().unwrap_or(0);
    let bottom = outline
        .iter()
        .map(|point| point[1])
        .max()
        .unwrap_or(0)
        .min(size[1] - 1);

    let mut filled = Vec::new();
    for row in top..=bottom {
        let scan_y = row as f32 + 0.5;
        let mut crossings = Vec::new();
        for (index, point) in outline.iter().enumerate() {
            let (x0, y0) = centre(*point);
            let (x1, y1) = centre(outline[(index + 1) % outline.len()]);
            if (y0 <= scan_y) != (y1 <= scan_y) {
                crossings.push(x0 + (scan_y - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(f32::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let first = (pair[0] - 0.5).ceil().max(0.0) as usize;
            let last = ((pair[1] - 0.5).floor().max(0.0) as usize).min(size[0] - 1);
            for column in first..=last {
                if column as f32 + 0.5 >= pair[0] && column as f32 + 0.5 <= pair[1] {
                    filled.push([column, row]);
                }
            }
        }
    }
    filled
}
