use eframe::egui::{Color32, ColorImage};

use crate::adapter::{ClipPlane, TileOrientation};
use crate::segmentation::{EditBuffer, MaskVolume};
use crate::volume::ScalarVolume;

const OVERLAY_COLOR: [f32; 3] = [255.0, 0.0, 0.0];
const PEN_ALPHA: f32 = 0.8;

/// Display look shared by every tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerLook {
    pub window_center: f32,
    pub window_width: f32,
    pub background_alpha: f32,
    pub overlay_alpha: f32,
}

/// Maps a 2-D tile onto volume axes. Rows run top-down, so the row axis is
/// flipped to keep anterior/superior at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicePlane {
    pub column_axis: usize,
    pub row_axis: usize,
    pub depth_axis: usize,
}

impl SlicePlane {
    pub fn for_orientation(orientation: TileOrientation) -> Option<Self> {
        let (column_axis, row_axis, depth_axis) = match orientation {
            TileOrientation::Axial => (0, 1, 2),
            TileOrientation::Coronal => (0, 2, 1),
            TileOrientation::Sagittal => (1, 2, 0),
            TileOrientation::Render => return None,
        };
        Some(Self {
            column_axis,
            row_axis,
            depth_axis,
        })
    }

    pub fn size(&self, dims: [usize; 3]) -> [usize; 2] {
        [dims[self.column_axis], dims[self.row_axis]]
    }

    pub fn voxel(&self, dims: [usize; 3], column: usize, row: usize, depth: usize) -> [usize; 3] {
        let rows = dims[self.row_axis];
        let mut voxel = [0; 3];
        voxel[self.column_axis] = column;
        voxel[self.row_axis] = rows.saturating_sub(1).saturating_sub(row);
        voxel[self.depth_axis] = depth;
        voxel
    }

    pub fn pixel(&self, dims: [usize; 3], voxel: [usize; 3]) -> [usize; 2] {
        let rows = dims[self.row_axis];
        [
            voxel[self.column_axis],
            rows.saturating_sub(1).saturating_sub(voxel[self.row_axis]),
        ]
    }
}

pub fn window_gray(sample: f32, center: f32, width: f32) -> f32 {
    let effective_width = width.max(1.0);
    let low = center - effective_width / 2.0;
    let range = effective_width.max(1e-6);
    ((sample - low) / range).clamp(0.0, 1.0) * 255.0
}

pub fn pen_color(value: u8) -> [f32; 3] {
    match value & 7 {
        1 => [255.0, 0.0, 0.0],
        2 => [0.0, 255.0, 0.0],
        3 => [0.0, 0.0, 255.0],
        4 => [255.0, 255.0, 0.0],
        5 => [0.0, 255.0, 255.0],
        6 => [255.0, 0.0, 255.0],
        _ => [255.0, 255.0, 255.0],
    }
}

pub fn render_slice(
    volume: &ScalarVolume,
    mask: Option<&MaskVolume>,
    edit: Option<&EditBuffer>,
    plane: SlicePlane,
    depth: usize,
    look: &LayerLook,
) -> ColorImage {
    let dims = volume.dims;
    let [width_px, height_px] = plane.size(dims);
    let mut pixels = Vec::with_capacity(width_px * height_px);

    for row in 0..height_px {
        for column in 0..width_px {
            let [x, y, z] = plane.voxel(dims, column, row, depth);
            let gray = window_gray(volume.value(x, y, z), look.window_center, look.window_width)
                * look.background_alpha;
            let mut rgb = [gray; 3];

            let index = x + dims[0] * (y + dims[1] * z);
            if mask.and_then(|mask| mask.labels().get(index)).is_some_and(|label| *label != 0) {
                rgb = blend(rgb, OVERLAY_COLOR, look.overlay_alpha);
            }
            if let Some(flag) = edit.map(|edit| edit.flag(index)).filter(|flag| *flag > 0) {
                rgb = blend(rgb, pen_color(flag), PEN_ALPHA);
            }
            pixels.push(to_color(rgb));
        }
    }

    ColorImage {
        size: [width_px, height_px],
        pixels,
    }
}

/// Maximum-intensity projection along y, viewed from the front. The clip
/// plane depth limits how far along y the rays travel: depth 0 stops at the
/// centre, anything at or beyond 1 keeps the whole volume.
pub fn render_projection(
    volume: &ScalarVolume,
    mask: Option<&MaskVolume>,
    clip_plane: ClipPlane,
    look: &LayerLook,
) -> ColorImage {
    let [nx, ny, nz] = volume.dims;
    let reach = (0.5 + clip_plane[0] * 0.5).clamp(0.0, 1.0);
    let depth_limit = ((reach * ny as f32).ceil() as usize).clamp(1, ny.max(1));
    let mut pixels = Vec::with_capacity(nx * nz);

    for row in 0..nz {
        let z = nz - 1 - row;
        for x in 0..nx {
            let mut peak = f32::NEG_INFINITY;
            let mut labelled = false;
            for y in 0..depth_limit {
                peak = peak.max(volume.value(x, y, z));
                labelled |= mask
                    .and_then(|mask| mask.get(x, y, z))
                    .is_some_and(|label| label != 0);
            }
            let gray = window_gray(peak, look.window_center, look.window_width)
                * look.background_alpha;
            let mut rgb = [gray; 3];
            if labelled {
                rgb = blend(rgb, OVERLAY_COLOR, look.overlay_alpha);
            }
            pixels.push(to_color(rgb));
        }
    }

    ColorImage {
        size: [nx, nz],
        pixels,
    }
}

fn blend(base: [f32; 3], top: [f32; 3], alpha: f32) -> [f32; 3] {
    let alpha = alpha.clamp(0.0, 1.0);
    [
        base[0] + (top[0] - base[0]) * alpha,
        base[1] + (top[1] - base[1]) * alpha,
        base[2] + (top[2] - base[2]) * alpha,
    ]
}

fn to_color(rgb: [f32; 3]) -> Color32 {
    let channel = |value: f32| value.round().clamp(0.0, 255.0) as u8;
    Color32::from_rgb(channel(rgb[0]), channel(rgb[1]), channel(rgb[2]))
}
