#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod error;
mod gui;
mod logging;
mod network;
mod validate;
mod watcher;

use eframe::egui;

fn main() -> eframe::Result<()> {
    let _log_guard = logging::init();
    tracing::info!("IP Range Changer v{} starting", env!("CARGO_PKG_VERSION"));

    let logo = gui::logo_path().and_then(|path| gui::load_logo(&path));

    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([720.0, 620.0])
        .with_min_inner_size([480.0, 420.0]);
    if let Some(icon) = &logo {
        viewport = viewport.with_icon(icon.clone());
    }

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "IP Range Changer - IP 配置切换器",
        options,
        Box::new(|cc| Ok(Box::new(gui::IpRangeChangerApp::new(cc, logo)))),
    )
}
