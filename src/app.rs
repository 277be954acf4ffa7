use std::path::PathBuf;

use eframe::egui::{self, Sense};

use crate::adapter::{RenderSurface, VolumeRef};
use crate::controller::ViewportController;
use crate::launch::{is_nifti_path, LaunchRequest};
use crate::recents::Recents;
use crate::scene::SceneDocument;
use crate::segmentation::EditOutcome;
use crate::settings::ViewerSettings;
use crate::state::{EditAction, InteractionMode, Layer, PenMode, NO_VOLUME_LOCATION_TEXT};
use crate::study::{StudyCatalog, STUDY_NOT_FOUND_TEXT};
use crate::surface::SoftwareSurface;

const APP_TITLE: &str = "Segview";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const SEGMENTATION_FILE_NAME: &str = "segmentation.nii.gz";
const SCENE_FILE_NAME: &str = "scene.toml";

pub struct SegviewApp {
    controller: ViewportController<SoftwareSurface>,
    saved_settings: ViewerSettings,
    catalog: StudyCatalog,
    recents: Recents,
    current_study: Option<String>,
    pending_launch_request: Option<LaunchRequest>,
    status_line: String,
    notice: Option<String>,
    wheel_scroll_accum: f32,
}

impl SegviewApp {
    /// `saved_settings` is the file as read; `settings` may carry CLI overrides
    /// and is never written back.
    pub fn new(
        ctx: &egui::Context,
        saved_settings: ViewerSettings,
        settings: &ViewerSettings,
        initial_request: Option<LaunchRequest>,
    ) -> Self {
        let mut controller = ViewportController::new(settings.initial_state(), settings.navigator());
        controller.attach(SoftwareSurface::new(ctx.clone()));

        let mut status_line = String::new();
        let catalog = match settings.catalog_path.as_deref() {
            Some(path) => StudyCatalog::load(path).unwrap_or_else(|err| {
                log::warn!("{err:#}");
                status_line = format!("{err:#}");
                StudyCatalog::default()
            }),
            None => StudyCatalog::default(),
        };

        Self {
            controller,
            saved_settings,
            catalog,
            recents: Recents::default(),
            current_study: None,
            pending_launch_request: initial_request,
            status_line,
            notice: None,
            wheel_scroll_accum: 0.0,
        }
    }

    fn apply_black_background(ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        let line_base = egui::Color32::from_gray(28);
        visuals.panel_fill = egui::Color32::BLACK;
        visuals.window_fill = egui::Color32::from_gray(12);
        visuals.extreme_bg_color = egui::Color32::BLACK;
        visuals.window_stroke = egui::Stroke::new(1.0, line_base);
        visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, line_base);
        ctx.set_visuals(visuals);
    }

    fn is_loading(&self) -> bool {
        self.controller
            .surface()
            .is_some_and(RenderSurface::is_loading)
    }

    fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status_line = message.clone();
        self.notice = Some(message);
    }

    fn handle_launch_request(&mut self, request: LaunchRequest) {
        match request {
            LaunchRequest::Volumes(paths) => {
                self.current_study = None;
                self.open_paths(paths);
            }
            LaunchRequest::Study(id) => self.open_study(&id),
        }
    }

    fn open_paths(&mut self, paths: Vec<PathBuf>) {
        let refs = paths.iter().map(VolumeRef::new).collect::<Vec<_>>();
        match self.controller.load_volumes(&refs) {
            Ok(()) => {
                self.status_line = format!("Loading {} volume(s)...", refs.len());
            }
            Err(err) => self.notify(err.to_string()),
        }
    }

    fn open_study(&mut self, id: &str) {
        match study_volumes(&self.catalog, id) {
            Ok(paths) => {
                self.recents.mark_opened(id);
                self.current_study = Some(id.to_string());
                self.open_paths(paths);
            }
            Err(message) => {
                log::warn!("{message}");
                self.notify(message);
            }
        }
    }

    fn open_volumes_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("NIfTI", &["nii", "gz"])
            .pick_files();

        if let Some(paths) = picked {
            self.current_study = None;
            self.open_paths(paths);
        }
    }

    fn open_scene_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Scene", &["toml"])
            .pick_file()
        else {
            return;
        };
        let restored = SceneDocument::load(&path)
            .and_then(|scene| self.controller.restore_scene(&scene).map_err(Into::into));
        match restored {
            Ok(()) => {
                self.current_study = None;
                self.status_line = format!("Opened scene {}", path.display());
            }
            Err(err) => {
                log::warn!("{err:#}");
                self.notify(format!("{err:#}"));
            }
        }
    }

    fn save_segmentation_dialog(&mut self) {
        if self.controller.volume_count() < 2 {
            self.notify(crate::error::ViewerError::NoSegmentationLoaded.to_string());
            return;
        }
        let Some(path) = rfd::FileDialog::new()
            .add_filter("NIfTI", &["gz", "nii"])
            .set_file_name(SEGMENTATION_FILE_NAME)
            .save_file()
        else {
            return;
        };
        match self.controller.save_segmentation(&path) {
            Ok(()) => self.status_line = format!("Saved {}", path.display()),
            Err(err) => {
                log::error!("{err:#}");
                self.notify(format!("{err:#}"));
            }
        }
    }

    fn save_scene_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Scene", &["toml"])
            .set_file_name(SCENE_FILE_NAME)
            .save_file()
        else {
            return;
        };
        match self.controller.save_scene(&path) {
            Ok(()) => self.status_line = format!("Saved {}", path.display()),
            Err(err) => {
                log::error!("{err:#}");
                self.notify(format!("{err:#}"));
            }
        }
    }

    fn apply_edit_action(&mut self, action: EditAction) {
        match self.controller.apply_edit_action(action) {
            Ok(EditOutcome::Committed { action, changed }) => {
                self.status_line = format!("{}: {changed} voxel(s) changed", action.label());
            }
            Ok(EditOutcome::Discarded) => self.status_line = "Strokes discarded".to_string(),
            Ok(EditOutcome::NothingToUndo) => {}
            Err(err) => self.notify(err.to_string()),
        }
    }

    fn persist_settings(&mut self) {
        let state = self.controller.state();
        self.saved_settings.background_opacity = state.opacity(Layer::Background);
        self.saved_settings.overlay_opacity = state.opacity(Layer::Overlay);
        self.saved_settings.interaction_mode = state.interaction_mode();
        self.saved_settings.invert_scroll = self.controller.navigator().invert_scroll();
        self.saved_settings.persist();
    }

    fn pump_controller(&mut self) {
        if let Err(err) = self.controller.pump() {
            self.status_line = err.to_string();
        }
    }

    fn take_dropped_paths(ctx: &egui::Context) -> Vec<PathBuf> {
        ctx.input(|input| {
            input
                .raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .filter(|path| is_nifti_path(path))
                .collect()
        })
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let state = self.controller.state().clone();
        let mut settings_changed = false;

        ui.horizontal_wrapped(|ui| {
            if ui.button("Open").clicked() {
                self.open_volumes_dialog();
            }
            if ui.button("Open Scene").clicked() {
                self.open_scene_dialog();
            }
            ui.separator();

            let mut clip = state.clip_plane_enabled();
            if ui.checkbox(&mut clip, "Clip Plane").changed() {
                self.controller.set_clip_plane(clip);
            }

            for (layer, label) in [(Layer::Background, "Background"), (Layer::Overlay, "Overlay")] {
                let mut value = i64::from(state.opacity(layer));
                let response = ui.add(egui::Slider::new(&mut value, 0..=255).text(label));
                if response.changed() {
                    match self.controller.set_opacity(layer, value) {
                        Ok(()) => settings_changed = true,
                        Err(err) => self.notify(err.to_string()),
                    }
                }
            }
            ui.separator();

            let mut pen = state.pen_mode();
            egui::ComboBox::from_label("Draw")
                .selected_text(pen.label())
                .show_ui(ui, |ui| {
                    for mode in PenMode::ALL {
                        ui.selectable_value(&mut pen, mode, mode.label());
                    }
                });
            if pen != state.pen_mode() {
                self.controller.set_pen_mode(pen);
            }

            let mut chosen_action = None;
            egui::ComboBox::from_label("Edit")
                .selected_text(state.pending_edit_action().label())
                .show_ui(ui, |ui| {
                    for action in EditAction::SELECTABLE {
                        if ui
                            .selectable_label(state.pending_edit_action() == action, action.label())
                            .clicked()
                        {
                            chosen_action = Some(action);
                        }
                    }
                });
            if let Some(action) = chosen_action {
                self.apply_edit_action(action);
            }

            let mut mode = state.interaction_mode();
            egui::ComboBox::from_label("Drag")
                .selected_text(mode.label())
                .show_ui(ui, |ui| {
                    for option in InteractionMode::ALL {
                        ui.selectable_value(&mut mode, option, option.label());
                    }
                });
            if mode != state.interaction_mode() {
                self.controller.set_interaction_mode(mode);
                settings_changed = true;
            }

            let navigator = *self.controller.navigator();
            let mut invert = navigator.invert_scroll();
            if ui
                .checkbox(&mut invert, "Invert Scroll")
                .on_hover_text(format!(
                    "Each wheel notch moves {:.0}% through the volume",
                    navigator.step_size() * 100.0
                ))
                .changed()
            {
                self.controller.navigator_mut().set_invert_scroll(invert);
                settings_changed = true;
            }
            ui.separator();

            if ui.button("Save Segmentation").clicked() {
                self.save_segmentation_dialog();
            }
            if ui.button("Save Scene").clicked() {
                self.save_scene_dialog();
            }
        });

        if settings_changed {
            self.persist_settings();
        }
    }

    fn show_recents(&mut self, ui: &mut egui::Ui) -> Option<String> {
        let mut clicked = None;
        ui.heading("Recent");
        if self.recents.is_empty() {
            ui.label("No recent studies.");
        }
        for id in self.recents.ids() {
            let title = self
                .catalog
                .find(id)
                .map(|study| study.title())
                .unwrap_or_else(|| id.clone());
            let is_current = self.current_study.as_deref() == Some(id.as_str());
            if ui.selectable_label(is_current, title).clicked() {
                clicked = Some(id.clone());
            }
        }

        if !self.catalog.studies().is_empty() {
            ui.separator();
            egui::CollapsingHeader::new("Studies")
                .default_open(self.recents.is_empty())
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .id_salt("study-catalog")
                        .show(ui, |ui| {
                            for study in self.catalog.studies() {
                                let response = ui
                                    .selectable_label(false, study.title())
                                    .on_hover_text(format!(
                                        "{} | {} | {}\n{}",
                                        study.kind, study.status, study.priority, study.comments
                                    ));
                                if response.clicked() {
                                    clicked = Some(study.id.clone());
                                }
                            }
                        });
                });
        }
        clicked
    }

    fn show_viewport(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let (canvas_rect, response) = ui.allocate_exact_size(available, Sense::click_and_drag());
        if !canvas_rect.is_positive() {
            return;
        }

        let mut zoom_delta = 1.0;
        if response.hovered() {
            let (zoom, raw_scroll, smooth_scroll) = ui.input(|input| {
                (
                    input.zoom_delta(),
                    input.raw_scroll_delta,
                    input.smooth_scroll_delta,
                )
            });
            zoom_delta = zoom;
            // The wheel drives slices only; nothing else may scroll or zoom from it.
            ui.ctx().input_mut(|input| {
                input.raw_scroll_delta = egui::Vec2::ZERO;
                input.smooth_scroll_delta = egui::Vec2::ZERO;
            });

            let scroll = dominant_scroll_axis(raw_scroll, smooth_scroll);
            let steps = wheel_steps_from_scroll(&mut self.wheel_scroll_accum, scroll);
            if let (Some(pointer), true) = (response.hover_pos(), steps != 0) {
                for _ in 0..steps.unsigned_abs() {
                    if let Err(err) =
                        self.controller
                            .handle_wheel(pointer.x, pointer.y, steps.signum() as f32)
                    {
                        self.status_line = err.to_string();
                        break;
                    }
                }
            }
        }

        if let Some(surface) = self.controller.surface_mut() {
            surface.handle_pointer(&response, zoom_delta);
        }
        self.pump_controller();

        if let Some(surface) = self.controller.surface_mut() {
            surface.paint(ui, canvas_rect);
        }
    }
}

impl eframe::App for SegviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_black_background(ctx);

        if let Some(request) = self.pending_launch_request.take() {
            self.handle_launch_request(request);
        }
        self.pump_controller();

        let dropped = Self::take_dropped_paths(ctx);
        if !dropped.is_empty() {
            self.current_study = None;
            self.open_paths(dropped);
        }

        egui::TopBottomPanel::top("controls")
            .frame(egui::Frame::none().inner_margin(egui::Margin::symmetric(8.0, 4.0)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(format!("{APP_TITLE} v{APP_VERSION}"));
                    ui.separator();
                    self.show_controls(ui);
                });
            });

        egui::TopBottomPanel::bottom("footer")
            .frame(egui::Frame::none().inner_margin(egui::Margin::symmetric(8.0, 4.0)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if self.controller.slice_info().is_empty() {
                        ui.label(NO_VOLUME_LOCATION_TEXT);
                    } else {
                        ui.monospace(self.controller.location_text());
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(&self.status_line);
                    });
                });
            });

        let mut reopen = None;
        if !self.recents.is_empty() || !self.catalog.studies().is_empty() {
            egui::SidePanel::left("recents")
                .resizable(false)
                .default_width(190.0)
                .show(ctx, |ui| {
                    reopen = self.show_recents(ui);
                });
        }
        if let Some(id) = reopen {
            self.open_study(&id);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| self.show_viewport(ui));

        if let Some(message) = self.notice.clone() {
            egui::Window::new("Notice")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        self.notice = None;
                    }
                });
        }

        if self.is_loading() {
            ctx.set_cursor_icon(egui::CursorIcon::Progress);
        }
    }
}

fn study_volumes(catalog: &StudyCatalog, id: &str) -> Result<Vec<PathBuf>, String> {
    let study = catalog
        .find(id)
        .ok_or_else(|| format!("{STUDY_NOT_FOUND_TEXT}: {id}"))?;
    if study.volumes.is_empty() {
        return Err(format!("Study {id} lists no volumes"));
    }
    Ok(study.volumes.clone())
}

/// Slice steps for accumulated wheel input, positive when the wheel moved
/// down. egui reports wheel-down as negative scroll.
fn wheel_steps_from_scroll(scroll_accum: &mut f32, scroll: f32) -> i32 {
    const DEAD_ZONE: f32 = 0.5;
    const POINTS_PER_STEP: f32 = 30.0;

    if scroll.abs() <= DEAD_ZONE {
        return 0;
    }
    if *scroll_accum != 0.0 && scroll.signum() != scroll_accum.signum() {
        *scroll_accum = 0.0;
    }
    *scroll_accum += scroll;

    let raw_steps = (*scroll_accum / POINTS_PER_STEP).trunc() as i32;
    *scroll_accum -= raw_steps as f32 * POINTS_PER_STEP;
    -raw_steps
}

fn dominant_scroll_axis(raw_scroll: egui::Vec2, smooth_scroll: egui::Vec2) -> f32 {
    let pick = |delta: egui::Vec2| {
        if delta.y.abs() >= delta.x.abs() {
            delta.y
        } else {
            delta.x
        }
    };

    if smooth_scroll != egui::Vec2::ZERO {
        pick(smooth_scroll)
    } else {
        pick(raw_scroll)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn wheel_down_steps_forward() {
        let mut accum = 0.0;
        assert_eq!(wheel_steps_from_scroll(&mut accum, -50.0), 1);
        assert_eq!(wheel_steps_from_scroll(&mut accum, -10.0), 1);
        assert_eq!(accum, 0.0);
        assert_eq!(wheel_steps_from_scroll(&mut accum, 95.0), -3);
        assert_eq!(wheel_steps_from_scroll(&mut accum, 0.2), 0);
    }

    #[test]
    fn reversing_direction_drops_residual() {
        let mut accum = 0.0;
        assert_eq!(wheel_steps_from_scroll(&mut accum, 20.0), 0);
        assert_eq!(wheel_steps_from_scroll(&mut accum, -20.0), 0);
        assert_eq!(accum, -20.0);
    }

    #[test]
    fn smooth_scroll_wins_over_raw() {
        let raw = egui::vec2(0.0, 40.0);
        assert_eq!(dominant_scroll_axis(raw, egui::Vec2::ZERO), 40.0);
        assert_eq!(dominant_scroll_axis(raw, egui::vec2(-7.0, 2.0)), -7.0);
    }

    #[test]
    fn study_lookup_reports_missing_and_empty_studies() {
        let catalog = StudyCatalog::parse(
            "[[study]]\nid = \"a\"\nvolumes = [\"brain.nii\"]\n[[study]]\nid = \"b\"\n",
            Path::new("/data"),
        )
        .expect("catalog should parse");

        assert_eq!(
            study_volumes(&catalog, "a"),
            Ok(vec![PathBuf::from("/data/brain.nii")])
        );
        assert_eq!(
            study_volumes(&catalog, "zzz"),
            Err("Study not found: zzz".to_string())
        );
        assert!(study_volumes(&catalog, "b").is_err());
    }
}
