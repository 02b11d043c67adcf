mod app;
mod chart;
mod color;
mod config;
mod data;
mod state;
mod ui;

use anyhow::{anyhow, Result};
use app::HousingExplorerApp;
use config::{DatasetSource, Settings};
use eframe::egui;
use state::AppState;

fn main() -> Result<()> {
    env_logger::init();

    let settings = Settings::load()?;
    let mut state = AppState::new(settings.top_n());

    // A dataset that is named but unreadable or malformed aborts startup.
    let path = match settings.dataset_source() {
        DatasetSource::Explicit(path) => Some(path),
        DatasetSource::Default(path) if path.is_file() => Some(path),
        DatasetSource::Default(path) => {
            log::info!("No dataset at {}; waiting for File → Open…", path.display());
            None
        }
    };
    if let Some(path) = path {
        let dataset = data::loader::load_file(&path)
            .inspect_err(|e| log::error!("Failed to load dataset: {e:#}"))?;
        state.set_dataset(dataset, path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(settings.window_size)
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Housing Explorer – Affordable Housing by Town",
        options,
        Box::new(move |_cc| Ok(Box::new(HousingExplorerApp::new(state)))),
    )
    .map_err(|e| anyhow!("running the UI: {e}"))
}
