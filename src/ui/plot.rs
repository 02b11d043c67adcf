use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_plot::{uniform_grid_spacer, Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use crate::chart::{ChartSpec, Datum, Mark, Scale};
use crate::data::regression::RegressionError;
use crate::state::{AppState, Session};
use crate::ui::table;

const CHART_HEIGHT: f32 = 340.0;

// ---------------------------------------------------------------------------
// Central panel – the four sections
// ---------------------------------------------------------------------------

/// Render every section of the loaded session in the central panel.
pub fn sections(ui: &mut Ui, state: &AppState) {
    let Some(session) = &state.session else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a housing dataset to begin  (File → Open…)");
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let title = match session.dataset().year_bounds() {
                Some((first, last)) => {
                    format!("Affordable Housing in Connecticut Towns ({first}–{last})")
                }
                None => "Affordable Housing in Connecticut Towns".to_string(),
            };
            ui.heading(title);
            ui.label(
                "Explore affordable housing statistics by town and year. \
                 Use the controls on the left to interact with each section.",
            );
            ui.add_space(8.0);

            bar_section(ui, session);
            scatter_section(ui, session);
            timeseries_section(ui, session);
            regression_section(ui, session);
        });
}

fn bar_section(ui: &mut Ui, session: &Session) {
    ui.heading("1. Percent Affordable by Town");
    chart_plot(ui, "bar", &session.bar.spec);
    egui::CollapsingHeader::new(format!("Rows ({})", session.bar.table.len()))
        .id_salt("bar_rows")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            table::rows_table(ui, &session.bar.table);
        });
    ui.separator();
}

fn scatter_section(ui: &mut Ui, session: &Session) {
    ui.heading("2. Census Units vs Percent Affordable");
    chart_plot(ui, "scatter", &session.scatter.spec);
    ui.label(format!("Number of points: {}", session.scatter.point_count));
    ui.separator();
}

fn timeseries_section(ui: &mut Ui, session: &Session) {
    ui.heading("3. Time Series for a Selected Town");
    chart_plot(ui, "timeseries", &session.timeseries.spec);
    ui.label(format!(
        "Showing {} data points for {} over the available years.",
        session.timeseries.point_count,
        session.params().town
    ));
    ui.separator();
}

fn regression_section(ui: &mut Ui, session: &Session) {
    ui.heading("4. Linear Regression");
    ui.label("Simple linear model on a chosen year:");
    ui.label(RichText::new("Percent Affordable = a + b × Total Assisted Units").monospace());

    match &session.regression.outcome {
        Ok(reg) => {
            ui.label(format!("Fitted model for {}:", session.regression.year));
            ui.label(RichText::new(reg.fit.equation()).monospace().strong());
            chart_plot(ui, "regression", &reg.spec);
            let r2 = if reg.fit.r_squared.is_nan() {
                "undefined (all y values identical)".to_string()
            } else {
                format!("{:.3}", reg.fit.r_squared)
            };
            ui.label(format!("R² for this regression: {r2}"));
        }
        Err(e) => {
            let headline = regression_warning(session.regression.year, e);
            ui.label(RichText::new(headline).color(Color32::from_rgb(230, 160, 40)));
            if let RegressionError::InsufficientData { usable } = e {
                ui.small(format!("{usable} usable rows"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChartSpec → egui_plot
// ---------------------------------------------------------------------------

/// Draw a chart spec. The plot id includes the title so a new selection
/// starts with fresh auto-fitted bounds.
pub fn chart_plot(ui: &mut Ui, id: &str, spec: &ChartSpec) {
    ui.label(RichText::new(&spec.title).strong());

    let mut plot = Plot::new(format!("{id}:{}", spec.title))
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label(spec.x.title.clone())
        .y_axis_label(spec.y.title.clone())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(false)
        .allow_zoom(true);

    if spec.x.scale == Scale::Ordinal {
        plot = plot
            .x_grid_spacer(uniform_grid_spacer(|_| [1.0, 5.0, 10.0]))
            .x_axis_formatter(|mark, _range| integral_label(mark.value));
    }
    if spec.y.scale == Scale::Nominal {
        let axis = spec.y.clone();
        plot = plot
            .y_grid_spacer(uniform_grid_spacer(|_| [1.0, 5.0, 10.0]))
            .y_axis_formatter(move |mark, _range| {
                axis.category(mark.value).unwrap_or_default().to_string()
            })
            .show_grid([true, false]);
    }

    // Hover text: the tooltip of the datum under the cursor.
    let lookup: Vec<(String, Vec<Datum>)> = spec
        .series
        .iter()
        .filter(|s| s.mark != Mark::Bar)
        .map(|s| (s.name.clone(), s.data.clone()))
        .collect();
    plot = plot.label_formatter(move |name, value| {
        lookup
            .iter()
            .find(|(series, _)| series == name)
            .and_then(|(_, data)| data.iter().find(|d| d.x == value.x && d.y == value.y))
            .filter(|d| !d.tooltip.is_empty())
            .map(Datum::tooltip_text)
            .unwrap_or_else(|| format!("x: {:.2}\ny: {:.2}", value.x, value.y))
    });

    plot.show(ui, |plot_ui| {
        for series in &spec.series {
            let color = series.color.map(|[r, g, b]| Color32::from_rgb(r, g, b));
            let points: PlotPoints = series.data.iter().map(|d| [d.x, d.y]).collect();

            match series.mark {
                Mark::Bar => {
                    let bars: Vec<Bar> = series
                        .data
                        .iter()
                        .map(|d| Bar::new(d.y, d.x).width(0.7).name(d.tooltip_text()))
                        .collect();
                    let mut chart = BarChart::new(bars).horizontal().name(&series.name);
                    if let Some(c) = color {
                        chart = chart.color(c);
                    }
                    plot_ui.bar_chart(chart);
                }
                Mark::Point { radius } => {
                    let mut marks = Points::new(points).radius(radius).name(&series.name);
                    if let Some(c) = color {
                        marks = marks.color(c);
                    }
                    plot_ui.points(marks);
                }
                Mark::Line { with_points } => {
                    let coords: Vec<[f64; 2]> = series.data.iter().map(|d| [d.x, d.y]).collect();
                    let mut line = Line::new(points).name(&series.name).width(2.0);
                    if let Some(c) = color {
                        line = line.color(c);
                    }
                    plot_ui.line(line);

                    if with_points {
                        let mut marks = Points::new(coords).radius(3.5).name(&series.name);
                        if let Some(c) = color {
                            marks = marks.color(c);
                        }
                        plot_ui.points(marks);
                    }
                }
            }
        }
    });
}

/// Headline shown instead of the regression chart.
fn regression_warning(year: i32, error: &RegressionError) -> String {
    match error {
        RegressionError::InsufficientData { .. } => {
            "Not enough data points for regression in this year.".to_string()
        }
        RegressionError::ConstantX { .. } => format!("Cannot fit a line for {year}: {error}."),
    }
}

fn integral_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        String::new()
    }
}
