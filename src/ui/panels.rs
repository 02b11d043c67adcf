use anyhow::Context;
use eframe::egui::{self, Color32, RichText, ScrollArea, Slider, Ui};

use crate::config::{TOP_N_MAX, TOP_N_MIN};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – section controls
// ---------------------------------------------------------------------------

/// Render the left control panel, one group per chart section.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Controls");
    ui.separator();

    let Some(session) = state.session.as_mut() else {
        ui.label("No dataset loaded.");
        return;
    };

    // Widgets edit local copies; the session setters ignore unchanged values.
    let params = session.params().clone();
    let years = session.dataset().years().to_vec();
    let towns = session.dataset().towns().to_vec();
    let (first_year, last_year) = session.dataset().year_bounds().unwrap_or_default();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- 1. Bar chart ----
            ui.strong("1. Percent Affordable by Town");
            let mut bar_year = params.bar_year;
            year_combo(ui, "year_bar", "Select a year", &years, &mut bar_year);
            session.set_bar_year(bar_year);

            let mut top_n = params.top_n;
            ui.add(Slider::new(&mut top_n, TOP_N_MIN..=TOP_N_MAX).text("Top N towns"));
            session.set_top_n(top_n);
            ui.separator();

            // ---- 2. Scatter ----
            ui.strong("2. Census Units vs Percent Affordable");
            let (mut from, mut to) = params.year_range;
            ui.label("Select year range");
            ui.add(Slider::new(&mut from, first_year..=last_year).text("from"));
            ui.add(Slider::new(&mut to, first_year..=last_year).text("to"));
            if from > to {
                to = from;
            }
            session.set_year_range(from, to);

            // Read after set_year_range: the sliders clamp to this extent.
            match session.unit_controls() {
                Some(((min, max), (mut low, mut high))) => {
                    ui.label("Filter towns by 2010 Census Units");
                    ui.add(Slider::new(&mut low, min..=max).text("min"));
                    ui.add(Slider::new(&mut high, min..=max).text("max"));
                    if low > high {
                        high = low;
                    }
                    session.set_unit_bounds(low, high);
                }
                None => {
                    ui.label("No census-unit values in this range.");
                }
            }
            ui.separator();

            // ---- 3. Time series ----
            ui.strong("3. Time Series for a Town");
            let mut town = params.town.clone();
            egui::ComboBox::from_id_salt("town_timeseries")
                .selected_text(town.clone())
                .height(320.0)
                .show_ui(ui, |ui: &mut Ui| {
                    for t in &towns {
                        ui.selectable_value(&mut town, t.clone(), t.as_str());
                    }
                });
            session.set_town(&town);
            ui.separator();

            // ---- 4. Regression ----
            ui.strong("4. Linear Regression");
            let mut reg_year = params.regression_year;
            year_combo(ui, "reg_year", "Year for regression", &years, &mut reg_year);
            session.set_regression_year(reg_year);
        });
}

fn year_combo(ui: &mut Ui, id: &str, label: &str, years: &[i32], selected: &mut i32) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        egui::ComboBox::from_id_salt(id)
            .selected_text(selected.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for &year in years {
                    ui.selectable_value(selected, year, year.to_string());
                }
            });
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_export = state.session.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export charts as JSON…"))
                .clicked()
            {
                export_charts_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            let ds = session.dataset();
            let file_name = session
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut details: Vec<String> = ds
                .year_counts()
                .iter()
                .map(|(year, n)| format!("{year}: {n} rows"))
                .collect();
            if !ds.extra_columns().is_empty() {
                details.push(format!("Other columns: {}", ds.extra_columns().join(", ")));
            }
            ui.label(format!(
                "{file_name}: {} observations, {} towns, {} years",
                ds.len(),
                ds.towns().len(),
                ds.years().len()
            ))
            .on_hover_text(details.join("\n"));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open housing data")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_file(&path) {
            Ok(dataset) => state.set_dataset(dataset, path),
            Err(e) => {
                // The current dataset, if any, stays loaded.
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

pub fn export_charts_dialog(state: &mut AppState) {
    let Some(session) = &state.session else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Export chart specs")
        .set_file_name("charts.json")
        .add_filter("JSON", &["json"])
        .save_file();

    if let Some(path) = file {
        let written = session.charts_json().and_then(|json| {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
        });
        match written {
            Ok(()) => {
                log::info!("Exported chart specs to {}", path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to export charts: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
