use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::chart::{self, ChartSpec};
use crate::config::{TOP_N_MAX, TOP_N_MIN};
use crate::data::filter::{
    by_measure_range, by_town, by_year, by_year_range, observed_range, top_n_by, View,
};
use crate::data::model::{Field, HousingDataset, Measure};
use crate::data::regression::{fit_line, LineFit, RegressionError};

/// Columns listed in the data table under the bar chart.
pub const TABLE_FIELDS: [Field; 5] = [
    Field::Town,
    Field::Year,
    Field::PercentAffordable,
    Field::TotalAssistedUnits,
    Field::CensusUnits,
];

// ---------------------------------------------------------------------------
// Parameters chosen through the widgets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorerParams {
    pub bar_year: i32,
    pub top_n: usize,
    /// Inclusive `(from, to)`.
    pub year_range: (i32, i32),
    /// Selected census-unit bounds; `None` until the scatter view has values.
    pub unit_bounds: Option<(f64, f64)>,
    pub town: String,
    pub regression_year: i32,
}

impl ExplorerParams {
    /// Widget defaults for a freshly loaded dataset.
    pub fn initial(dataset: &HousingDataset, top_n: usize) -> Self {
        let (first, last) = dataset.year_bounds().unwrap_or_default();
        Self {
            bar_year: first,
            top_n: top_n.clamp(TOP_N_MIN, TOP_N_MAX),
            year_range: (first, last),
            unit_bounds: None,
            town: dataset.towns().first().cloned().unwrap_or_default(),
            regression_year: first,
        }
    }

    fn top_n(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.top_n).unwrap_or(NonZeroUsize::MIN)
    }
}

// ---------------------------------------------------------------------------
// Pipeline: (dataset, params) → view → chart spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BarSection {
    pub spec: ChartSpec,
    /// Formatted cells of [`TABLE_FIELDS`] for every bar, top first.
    pub table: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSection {
    pub spec: ChartSpec,
    pub point_count: usize,
    /// Observed census-unit extremes of the year-range view; the slider bounds.
    pub unit_extent: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSection {
    pub spec: ChartSpec,
    pub point_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub fit: LineFit,
    pub spec: ChartSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionSection {
    pub year: i32,
    pub outcome: Result<Regression, RegressionError>,
}

pub fn bar_section(dataset: &HousingDataset, params: &ExplorerParams) -> BarSection {
    let year = by_year(dataset, params.bar_year);
    let top = top_n_by(&year, Measure::PercentAffordable, params.top_n());
    let table = top
        .iter()
        .map(|obs| TABLE_FIELDS.iter().map(|f| f.format(obs)).collect())
        .collect();
    BarSection {
        spec: chart::bar_chart(&top, params.bar_year),
        table,
    }
}

pub fn scatter_section(dataset: &HousingDataset, params: &ExplorerParams) -> ScatterSection {
    let (from, to) = params.year_range;
    let in_range = by_year_range(dataset, from, to);
    let unit_extent = observed_range(&in_range, Measure::CensusUnits);
    let view = match params.unit_bounds.or(unit_extent) {
        Some((low, high)) => by_measure_range(&in_range, Measure::CensusUnits, low, high),
        None => View::default(),
    };
    let spec = chart::scatter_chart(&view);
    ScatterSection {
        point_count: spec.point_count(),
        spec,
        unit_extent,
    }
}

pub fn timeseries_section(dataset: &HousingDataset, params: &ExplorerParams) -> TimeSeriesSection {
    let view = by_town(dataset, &params.town);
    if view.is_empty() {
        log::warn!("No rows for town {:?}", params.town);
    }
    let spec = chart::timeseries_chart(&view, &params.town);
    TimeSeriesSection {
        point_count: spec.point_count(),
        spec,
    }
}

pub fn regression_section(dataset: &HousingDataset, params: &ExplorerParams) -> RegressionSection {
    let view = by_year(dataset, params.regression_year);
    let outcome = fit_line(&view, Measure::TotalAssistedUnits, Measure::PercentAffordable)
        .map(|fit| Regression {
            spec: chart::regression_chart(&view, &fit),
            fit,
        });
    if let Err(e) = &outcome {
        log::warn!("Skipping regression for {}: {e}", params.regression_year);
    }
    RegressionSection {
        year: params.regression_year,
        outcome,
    }
}

// ---------------------------------------------------------------------------
// Session – one loaded dataset and everything derived from it
// ---------------------------------------------------------------------------

/// The loaded table, the widget parameters and the cached sections.
/// Sections are rebuilt only when a parameter feeding them changes.
pub struct Session {
    dataset: HousingDataset,
    pub source: PathBuf,
    params: ExplorerParams,
    pub bar: BarSection,
    pub scatter: ScatterSection,
    pub timeseries: TimeSeriesSection,
    pub regression: RegressionSection,
}

impl Session {
    pub fn new(dataset: HousingDataset, source: PathBuf, top_n: usize) -> Self {
        let mut params = ExplorerParams::initial(&dataset, top_n);
        let scatter = scatter_section(&dataset, &params);
        params.unit_bounds = scatter.unit_extent;
        Self {
            bar: bar_section(&dataset, &params),
            timeseries: timeseries_section(&dataset, &params),
            regression: regression_section(&dataset, &params),
            scatter,
            params,
            dataset,
            source,
        }
    }

    pub fn dataset(&self) -> &HousingDataset {
        &self.dataset
    }

    pub fn params(&self) -> &ExplorerParams {
        &self.params
    }

    pub fn set_bar_year(&mut self, year: i32) {
        if self.params.bar_year != year {
            self.params.bar_year = year;
            self.refresh_bar();
        }
    }

    pub fn set_top_n(&mut self, n: usize) {
        let n = n.clamp(TOP_N_MIN, TOP_N_MAX);
        if self.params.top_n != n {
            self.params.top_n = n;
            self.refresh_bar();
        }
    }

    /// Changing the year range resets the census-unit bounds to the new
    /// view's observed extremes.
    pub fn set_year_range(&mut self, from: i32, to: i32) {
        if self.params.year_range != (from, to) {
            self.params.year_range = (from, to);
            self.params.unit_bounds = None;
            self.refresh_scatter();
            self.params.unit_bounds = self.scatter.unit_extent;
        }
    }

    /// Slider range and current selection for the census-unit filter, read
    /// after any year-range change so the range is never stale.
    pub fn unit_controls(&self) -> Option<((f64, f64), (f64, f64))> {
        let extent = self.scatter.unit_extent?;
        Some((extent, self.params.unit_bounds.unwrap_or(extent)))
    }

    pub fn set_unit_bounds(&mut self, low: f64, high: f64) {
        let bounds = if low <= high { (low, high) } else { (high, low) };
        if self.params.unit_bounds != Some(bounds) {
            self.params.unit_bounds = Some(bounds);
            self.refresh_scatter();
        }
    }

    pub fn set_town(&mut self, town: &str) {
        if self.params.town != town {
            self.params.town = town.to_string();
            log::debug!("Recomputing time series for {town}");
            self.timeseries = timeseries_section(&self.dataset, &self.params);
        }
    }

    pub fn set_regression_year(&mut self, year: i32) {
        if self.params.regression_year != year {
            self.params.regression_year = year;
            log::debug!("Recomputing regression for {year}");
            self.regression = regression_section(&self.dataset, &self.params);
        }
    }

    fn refresh_bar(&mut self) {
        log::debug!(
            "Recomputing top {} towns for {}",
            self.params.top_n,
            self.params.bar_year
        );
        self.bar = bar_section(&self.dataset, &self.params);
    }

    fn refresh_scatter(&mut self) {
        log::debug!(
            "Recomputing scatter for {:?} within {:?}",
            self.params.year_range,
            self.params.unit_bounds
        );
        self.scatter = scatter_section(&self.dataset, &self.params);
    }

    /// The four current charts (and the fit, if any) as pretty JSON.
    pub fn charts_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            source: &'a PathBuf,
            params: &'a ExplorerParams,
            charts: Vec<&'a ChartSpec>,
            fit: Option<&'a LineFit>,
        }

        let regression = self.regression.outcome.as_ref().ok();
        let mut charts = vec![&self.bar.spec, &self.scatter.spec, &self.timeseries.spec];
        charts.extend(regression.map(|r| &r.spec));

        serde_json::to_string_pretty(&Export {
            source: &self.source,
            params: &self.params,
            charts,
            fit: regression.map(|r| &r.fit),
        })
        .context("serializing chart specs")
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset and derived views (None until a file is loaded).
    pub session: Option<Session>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    default_top_n: usize,
}

impl AppState {
    pub fn new(default_top_n: usize) -> Self {
        Self {
            session: None,
            status_message: None,
            default_top_n,
        }
    }

    /// Replace the loaded dataset and reset every widget.
    pub fn set_dataset(&mut self, dataset: HousingDataset, source: PathBuf) {
        if dataset.is_empty() {
            log::warn!("{} contains no observations", source.display());
        }
        self.session = Some(Session::new(dataset, source, self.default_top_n));
        self.status_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Observation;
    use crate::data::test_support::{sample_dataset, FIRST_YEAR, LAST_YEAR, TOWNS};

    fn session() -> Session {
        Session::new(sample_dataset(), PathBuf::from("sample.csv"), 20)
    }

    #[test]
    fn initial_params_follow_the_dataset() {
        let s = session();
        let p = s.params();
        assert_eq!(p.bar_year, FIRST_YEAR);
        assert_eq!(p.regression_year, FIRST_YEAR);
        assert_eq!(p.year_range, (FIRST_YEAR, LAST_YEAR));
        assert_eq!(p.top_n, 20);
        assert_eq!(p.town, "Andover");
        assert_eq!(p.unit_bounds, s.scatter.unit_extent);
        assert_eq!(s.scatter.point_count, s.dataset().len());
    }

    #[test]
    fn top_ten_for_2015_yields_ten_bars() {
        let mut s = session();
        s.set_bar_year(2015);
        s.set_top_n(10);
        assert_eq!(s.bar.spec.series[0].data.len(), 10);
        assert_eq!(s.bar.table.len(), 10);
        assert!(s.bar.table.iter().all(|row| row[1] == "2015"));
    }

    #[test]
    fn top_n_is_clamped_to_slider_bounds() {
        let mut s = session();
        s.set_top_n(1);
        assert_eq!(s.params().top_n, TOP_N_MIN);
        s.set_top_n(1000);
        assert_eq!(s.params().top_n, TOP_N_MAX);
        assert_eq!(s.bar.table.len(), TOWNS.len());
    }

    #[test]
    fn single_year_range_matches_that_year() {
        let mut s = session();
        s.set_year_range(2011, 2011);
        assert_eq!(s.scatter.point_count, by_year(s.dataset(), 2011).len());
    }

    #[test]
    fn year_range_change_resets_unit_bounds() {
        let mut s = session();
        let (lo, hi) = s.scatter.unit_extent.unwrap();
        s.set_unit_bounds(lo, lo + 1.0);
        assert!(s.scatter.point_count < s.dataset().len());

        s.set_year_range(2014, 2016);
        assert_eq!(s.params().unit_bounds, Some((lo, hi)));
        assert_eq!(s.scatter.point_count, 3 * TOWNS.len());
    }

    #[test]
    fn widening_year_range_widens_unit_controls() {
        let ds = HousingDataset::from_observations(vec![
            Observation::new("Small", 2011)
                .with(Measure::CensusUnits, Some(1_000.0))
                .with(Measure::PercentAffordable, Some(5.0)),
            Observation::new("Mid", 2011)
                .with(Measure::CensusUnits, Some(2_000.0))
                .with(Measure::PercentAffordable, Some(5.0)),
            Observation::new("Large", 2012)
                .with(Measure::CensusUnits, Some(9_000.0))
                .with(Measure::PercentAffordable, Some(5.0)),
        ]);
        let mut s = Session::new(ds, PathBuf::from("wide.csv"), 20);
        s.set_year_range(2011, 2011);
        assert_eq!(s.unit_controls(), Some(((1_000.0, 2_000.0), (1_000.0, 2_000.0))));

        s.set_year_range(2011, 2012);
        let (extent, (low, high)) = s.unit_controls().unwrap();
        assert_eq!(extent, (1_000.0, 9_000.0));
        // Feeding the bounds straight back, as the sliders do, keeps every row.
        s.set_unit_bounds(low.clamp(extent.0, extent.1), high.clamp(extent.0, extent.1));
        assert_eq!(s.params().unit_bounds, Some((1_000.0, 9_000.0)));
        assert_eq!(s.scatter.point_count, 3);
    }

    #[test]
    fn inverted_unit_bounds_are_swapped() {
        let mut s = session();
        let (lo, hi) = s.scatter.unit_extent.unwrap();
        s.set_unit_bounds(hi, lo);
        assert_eq!(s.params().unit_bounds, Some((lo, hi)));
    }

    #[test]
    fn town_change_rebuilds_time_series() {
        let mut s = session();
        s.set_town(TOWNS[5]);
        assert_eq!(s.timeseries.point_count, (LAST_YEAR - FIRST_YEAR + 1) as usize);
        assert_eq!(s.timeseries.spec.series[0].name, TOWNS[5]);
    }

    #[test]
    fn regression_without_data_is_a_recoverable_outcome() {
        let ds = HousingDataset::from_observations(vec![Observation::new("Lonely", 2015)
            .with(Measure::TotalAssistedUnits, Some(10.0))
            .with(Measure::PercentAffordable, Some(1.0))]);
        let s = Session::new(ds, PathBuf::from("one.csv"), 20);
        assert_eq!(
            s.regression.outcome,
            Err(RegressionError::InsufficientData { usable: 1 })
        );
        // The other charts still render, and the export skips the fit.
        assert_eq!(s.bar.table.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&s.charts_json().unwrap()).unwrap();
        assert_eq!(json["charts"].as_array().unwrap().len(), 3);
        assert!(json["fit"].is_null());
    }

    #[test]
    fn regression_follows_selected_year() {
        let mut s = session();
        s.set_regression_year(2021);
        assert_eq!(s.regression.year, 2021);
        let reg = s.regression.outcome.as_ref().unwrap();
        assert_eq!(reg.fit.usable, TOWNS.len());
        let json: serde_json::Value = serde_json::from_str(&s.charts_json().unwrap()).unwrap();
        assert_eq!(json["charts"].as_array().unwrap().len(), 4);
        assert_eq!(json["params"]["regression_year"], 2021);
    }

    #[test]
    fn empty_dataset_renders_empty_sections() {
        let s = Session::new(HousingDataset::default(), PathBuf::from("empty.csv"), 20);
        assert_eq!(s.scatter.point_count, 0);
        assert_eq!(s.timeseries.point_count, 0);
        assert!(s.bar.table.is_empty());
        assert!(s.regression.outcome.is_err());
    }

    #[test]
    fn app_state_replaces_session_and_clears_status() {
        let mut state = AppState::new(15);
        state.status_message = Some("Error: boom".into());
        state.set_dataset(sample_dataset(), PathBuf::from("a.csv"));
        assert!(state.status_message.is_none());
        assert_eq!(state.session.as_ref().unwrap().params().top_n, 15);
    }
}
