mod adapter;
mod app;
mod controller;
mod error;
mod launch;
mod navigation;
mod recents;
mod renderer;
mod scene;
mod segmentation;
mod settings;
mod state;
mod study;
mod surface;
mod volume;

#[cfg(test)]
mod testing;

use clap::Parser;
use simple_logger::SimpleLogger;

use crate::launch::{default_launch_request, LaunchArgs};
use crate::settings::ViewerSettings;

fn main() -> eframe::Result<()> {
    if let Err(err) = SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("Logger already initialised: {err}");
    }

    let args = LaunchArgs::parse();
    let saved_settings = ViewerSettings::load();
    let mut settings = saved_settings.clone();
    args.apply_to(&mut settings);

    let initial_request = args.launch_request().or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|dir| default_launch_request(&dir))
    });

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_title("Segview")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Segview",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(app::SegviewApp::new(
                &cc.egui_ctx,
                saved_settings,
                &settings,
                initial_request,
            )))
        }),
    )
}
