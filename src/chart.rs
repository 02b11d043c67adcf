use serde::Serialize;

use crate::color::ColorMap;
use crate::data::filter::View;
use crate::data::model::{Field, Measure, Observation};
use crate::data::regression::{LineFit, FIT_CURVE_SAMPLES};

// ---------------------------------------------------------------------------
// Declarative chart description
// ---------------------------------------------------------------------------

/// How an axis encodes its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Quantitative,
    /// Discrete but ordered, e.g. years.
    Ordinal,
    /// Discrete labels; the coordinate is an index into `Axis::categories`.
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
    pub scale: Scale,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl Axis {
    fn quantitative(title: &str) -> Self {
        Self {
            title: title.to_string(),
            scale: Scale::Quantitative,
            categories: Vec::new(),
        }
    }

    fn ordinal(title: &str) -> Self {
        Self {
            scale: Scale::Ordinal,
            ..Self::quantitative(title)
        }
    }

    /// Label for a coordinate on a nominal axis.
    pub fn category(&self, coordinate: f64) -> Option<&str> {
        if coordinate < 0.0 || coordinate.fract() != 0.0 {
            return None;
        }
        self.categories.get(coordinate as usize).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    /// Horizontal bars: `x` is the bar length, `y` the category slot.
    Bar,
    Point { radius: f32 },
    Line { with_points: bool },
}

/// One plotted mark with its hover text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datum {
    pub x: f64,
    pub y: f64,
    pub tooltip: Vec<(String, String)>,
}

impl Datum {
    pub fn tooltip_text(&self) -> String {
        self.tooltip
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub mark: Mark,
    /// RGB; `None` lets the renderer pick its default.
    pub color: Option<[u8; 3]>,
    pub data: Vec<Datum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl ChartSpec {
    /// Marks across all series that come from observations.
    pub fn point_count(&self) -> usize {
        self.series
            .iter()
            .filter(|s| !matches!(s.mark, Mark::Line { with_points: false }))
            .map(|s| s.data.len())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

const POINT_RADIUS: f32 = 4.0;

fn tooltip(obs: &Observation, fields: &[Field]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|f| (f.header().to_string(), f.format(obs)))
        .collect()
}

/// Rows of `view` that have both coordinates.
fn plotted<'v, 'a>(
    view: &'v View<'a>,
    x: Measure,
    y: Measure,
) -> impl Iterator<Item = (&'a Observation, f64, f64)> + 'v {
    view.iter()
        .filter_map(move |obs| Some((obs, x.value(obs)?, y.value(obs)?)))
}

/// Percent Affordable per town, one horizontal bar each, largest on top.
/// The view is expected to be sorted already (see `top_n_by`).
pub fn bar_chart(view: &View<'_>, year: i32) -> ChartSpec {
    const TOOLTIP: [Field; 4] = [
        Field::Town,
        Field::PercentAffordable,
        Field::TotalAssistedUnits,
        Field::CensusUnits,
    ];

    let mut rows: Vec<(&Observation, f64)> = view
        .iter()
        .filter_map(|obs| Some((obs, obs.percent_affordable?)))
        .collect();
    // sort="-x"
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));

    let slots = rows.len();
    // Slot 0 sits at the bottom of the plot, so the largest bar gets the last.
    let mut categories = vec![String::new(); slots];
    let data = rows
        .iter()
        .enumerate()
        .map(|(rank, (obs, pct))| {
            let slot = slots - 1 - rank;
            categories[slot] = obs.town.clone();
            Datum {
                x: *pct,
                y: slot as f64,
                tooltip: tooltip(obs, &TOOLTIP),
            }
        })
        .collect();

    ChartSpec {
        title: format!("Percent Affordable by Town ({year})"),
        x: Axis::quantitative(Field::PercentAffordable.header()),
        y: Axis {
            title: Field::Town.header().to_string(),
            scale: Scale::Nominal,
            categories,
        },
        series: vec![Series {
            name: Field::PercentAffordable.header().to_string(),
            mark: Mark::Bar,
            color: None,
            data,
        }],
    }
}

/// Census units against Percent Affordable, coloured by year.
pub fn scatter_chart(view: &View<'_>) -> ChartSpec {
    const TOOLTIP: [Field; 5] = [
        Field::Town,
        Field::Year,
        Field::CensusUnits,
        Field::TotalAssistedUnits,
        Field::PercentAffordable,
    ];

    let years: Vec<i32> = view.iter().map(|obs| obs.year).collect();
    let colors = ColorMap::new(years.iter());

    let mut series: Vec<Series> = Vec::new();
    for (obs, x, y) in plotted(view, Measure::CensusUnits, Measure::PercentAffordable) {
        let name = obs.year.to_string();
        let idx = match series.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                let c = colors.color_for(&obs.year);
                series.push(Series {
                    name,
                    mark: Mark::Point {
                        radius: POINT_RADIUS,
                    },
                    color: Some([c.r(), c.g(), c.b()]),
                    data: Vec::new(),
                });
                series.len() - 1
            }
        };
        series[idx].data.push(Datum {
            x,
            y,
            tooltip: tooltip(obs, &TOOLTIP),
        });
    }
    // Legend in year order.
    series.sort_by(|a, b| a.name.cmp(&b.name));

    ChartSpec {
        title: "Census Units vs Percent Affordable".to_string(),
        x: Axis::quantitative(Field::CensusUnits.header()),
        y: Axis::quantitative(Field::PercentAffordable.header()),
        series,
    }
}

/// Percent Affordable over the years for one town.
pub fn timeseries_chart(view: &View<'_>, town: &str) -> ChartSpec {
    const TOOLTIP: [Field; 3] = [
        Field::Year,
        Field::PercentAffordable,
        Field::TotalAssistedUnits,
    ];

    let data = view
        .iter()
        .filter_map(|obs| {
            Some(Datum {
                x: f64::from(obs.year),
                y: obs.percent_affordable?,
                tooltip: tooltip(obs, &TOOLTIP),
            })
        })
        .collect();

    ChartSpec {
        title: format!("Percent Affordable in {town}"),
        x: Axis::ordinal(Field::Year.header()),
        y: Axis::quantitative(Field::PercentAffordable.header()),
        series: vec![Series {
            name: town.to_string(),
            mark: Mark::Line { with_points: true },
            color: None,
            data,
        }],
    }
}

/// Observed points plus the fitted line.
pub fn regression_chart(view: &View<'_>, fit: &LineFit) -> ChartSpec {
    let tooltip_fields = [Field::Town, fit.x.field(), fit.y.field()];

    let observed = plotted(view, fit.x, fit.y)
        .map(|(obs, x, y)| Datum {
            x,
            y,
            tooltip: tooltip(obs, &tooltip_fields),
        })
        .collect();

    let fitted = fit
        .curve(FIT_CURVE_SAMPLES)
        .into_iter()
        .map(|[x, y]| Datum {
            x,
            y,
            tooltip: Vec::new(),
        })
        .collect();

    ChartSpec {
        title: format!("{} vs {}", fit.y, fit.x),
        x: Axis::quantitative(fit.x.header()),
        y: Axis::quantitative(fit.y.header()),
        series: vec![
            Series {
                name: "Observed".to_string(),
                mark: Mark::Point {
                    radius: POINT_RADIUS,
                },
                color: None,
                data: observed,
            },
            Series {
                name: format!("{} (fitted)", fit.y),
                mark: Mark::Line { with_points: false },
                color: Some([230, 90, 60]),
                data: fitted,
            },
        ],
    }
}
