use serde::{Deserialize, Serialize};

use crate::adapter::Crosshair;
use crate::error::{Result, ViewerError};

pub const DEFAULT_BACKGROUND_OPACITY: u8 = 255;
pub const DEFAULT_OVERLAY_OPACITY: u8 = 128;
pub const NO_VOLUME_LOCATION_TEXT: &str = "Drag and Drop any NIfTI image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Overlay,
}

impl Layer {
    pub fn volume_index(self) -> usize {
        match self {
            Layer::Background => 0,
            Layer::Overlay => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    None,
    Contrast,
    Measurement,
    #[default]
    PanZoom,
    Slicer3D,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 5] = [
        InteractionMode::None,
        InteractionMode::Contrast,
        InteractionMode::Measurement,
        InteractionMode::PanZoom,
        InteractionMode::Slicer3D,
    ];

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(InteractionMode::None),
            1 => Ok(InteractionMode::Contrast),
            2 => Ok(InteractionMode::Measurement),
            3 => Ok(InteractionMode::PanZoom),
            4 => Ok(InteractionMode::Slicer3D),
            other => Err(ViewerError::invalid(format!(
                "interaction mode {other} (expected 0..=4)"
            ))),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            InteractionMode::None => 0,
            InteractionMode::Contrast => 1,
            InteractionMode::Measurement => 2,
            InteractionMode::PanZoom => 3,
            InteractionMode::Slicer3D => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InteractionMode::None => "none",
            InteractionMode::Contrast => "contrast",
            InteractionMode::Measurement => "measurement",
            InteractionMode::PanZoom => "pan/zoom",
            InteractionMode::Slicer3D => "slicer3D",
        }
    }
}

/// Pen selector values. The numeric codes are the draw surface's pen encoding:
/// the low three bits select the pen colour and any code above 7 requests a
/// filled pen. Off has no pen value at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenMode {
    #[default]
    Off,
    Paint,
    FilledPaint,
    Erase,
}

impl PenMode {
    pub const ALL: [PenMode; 4] = [
        PenMode::Off,
        PenMode::Paint,
        PenMode::FilledPaint,
        PenMode::Erase,
    ];

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            -1 => Ok(PenMode::Off),
            2 => Ok(PenMode::Paint),
            10 => Ok(PenMode::FilledPaint),
            0 => Ok(PenMode::Erase),
            other => Err(ViewerError::invalid(format!(
                "pen mode {other} (expected -1, 0, 2 or 10)"
            ))),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            PenMode::Off => -1,
            PenMode::Paint => 2,
            PenMode::FilledPaint => 10,
            PenMode::Erase => 0,
        }
    }

    /// `(code & 7, code > 7)` as the surface expects it, `None` when off.
    pub fn pen_value(self) -> Option<(u8, bool)> {
        let code = self.code();
        if code < 0 {
            return None;
        }
        Some(((code & 7) as u8, code > 7))
    }

    pub fn label(self) -> &'static str {
        match self {
            PenMode::Off => "Off",
            PenMode::Paint => "On",
            PenMode::FilledPaint => "Filled",
            PenMode::Erase => "Erase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditAction {
    None,
    #[default]
    Undo,
    Append,
    Remove,
}

impl EditAction {
    pub const SELECTABLE: [EditAction; 3] =
        [EditAction::Undo, EditAction::Append, EditAction::Remove];

    pub fn label(self) -> &'static str {
        match self {
            EditAction::None => "",
            EditAction::Undo => "Undo",
            EditAction::Append => "Append",
            EditAction::Remove => "Remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    background_opacity: u8,
    overlay_opacity: u8,
    clip_plane_enabled: bool,
    interaction_mode: InteractionMode,
    drawing_enabled: bool,
    pen_mode: PenMode,
    pending_edit_action: EditAction,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            clip_plane_enabled: false,
            interaction_mode: InteractionMode::default(),
            drawing_enabled: false,
            pen_mode: PenMode::Off,
            pending_edit_action: EditAction::Undo,
        }
    }
}

impl ViewerState {
    pub fn opacity(&self, layer: Layer) -> u8 {
        match layer {
            Layer::Background => self.background_opacity,
            Layer::Overlay => self.overlay_opacity,
        }
    }

    pub fn clip_plane_enabled(&self) -> bool {
        self.clip_plane_enabled
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        self.interaction_mode
    }

    pub fn drawing_enabled(&self) -> bool {
        self.drawing_enabled
    }

    pub fn pen_mode(&self) -> PenMode {
        self.pen_mode
    }

    pub fn pending_edit_action(&self) -> EditAction {
        self.pending_edit_action
    }

    /// Rejects values outside 0..=255 before touching state. Returns whether
    /// the stored value changed.
    pub fn set_opacity(&mut self, layer: Layer, value: i64) -> Result<bool> {
        let value = u8::try_from(value).map_err(|_| {
            ViewerError::invalid(format!("opacity {value} is outside 0..=255"))
        })?;
        let slot = match layer {
            Layer::Background => &mut self.background_opacity,
            Layer::Overlay => &mut self.overlay_opacity,
        };
        let changed = *slot != value;
        *slot = value;
        Ok(changed)
    }

    pub fn set_clip_plane(&mut self, enabled: bool) -> bool {
        let changed = self.clip_plane_enabled != enabled;
        self.clip_plane_enabled = enabled;
        changed
    }

    pub fn set_interaction_mode(&mut self, mode: InteractionMode) -> bool {
        let changed = self.interaction_mode != mode;
        self.interaction_mode = mode;
        changed
    }

    /// Keeps `drawing_enabled == (pen_mode != Off)`.
    pub fn set_pen_mode(&mut self, mode: PenMode) -> bool {
        let changed = self.pen_mode != mode;
        self.pen_mode = mode;
        self.drawing_enabled = mode != PenMode::Off;
        changed
    }

    pub fn set_pending_edit_action(&mut self, action: EditAction) {
        self.pending_edit_action = action;
    }

    pub fn reset_drawing(&mut self) {
        self.set_pen_mode(PenMode::Off);
        self.pending_edit_action = EditAction::Undo;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnatomicalAxis {
    Axial,
    Coronal,
    Sagittal,
}

impl AnatomicalAxis {
    /// Axial slices step along z, coronal along y, sagittal along x.
    pub fn spatial_axis(self) -> usize {
        match self {
            AnatomicalAxis::Axial => 2,
            AnatomicalAxis::Coronal => 1,
            AnatomicalAxis::Sagittal => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlicePosition {
    pub current: usize,
    pub total: usize,
}

impl SlicePosition {
    /// 1-based nearest slice: `round(coord * (total - 1)) + 1`.
    pub fn from_normalized(total: usize, coord: f32) -> Self {
        if total == 0 {
            return Self::default();
        }
        let coord = f64::from(coord.clamp(0.0, 1.0));
        let index = (coord * (total - 1) as f64).round() as usize + 1;
        Self {
            current: index.clamp(1, total),
            total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceInfo {
    pub axial: SlicePosition,
    pub coronal: SlicePosition,
    pub sagittal: SlicePosition,
}

impl SliceInfo {
    pub fn from_crosshair(dims: Option<[usize; 3]>, crosshair: Crosshair) -> Self {
        let Some(dims) = dims else {
            return Self::default();
        };
        let position = |axis: AnatomicalAxis| {
            let spatial = axis.spatial_axis();
            SlicePosition::from_normalized(dims[spatial], crosshair[spatial])
        };
        Self {
            axial: position(AnatomicalAxis::Axial),
            coronal: position(AnatomicalAxis::Coronal),
            sagittal: position(AnatomicalAxis::Sagittal),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.axial.total == 0 && self.coronal.total == 0 && self.sagittal.total == 0
    }

    pub fn describe(&self) -> String {
        if self.is_empty() {
            return NO_VOLUME_LOCATION_TEXT.to_string();
        }
        format!(
            "Axial {}/{} Coronal {}/{} Sagittal {}/{}",
            self.axial.current,
            self.axial.total,
            self.coronal.current,
            self.coronal.total,
            self.sagittal.current,
            self.sagittal.total,
        )
    }
}
