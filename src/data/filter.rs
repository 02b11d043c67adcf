use std::cmp::Ordering;
use std::num::NonZeroUsize;

use super::model::{HousingDataset, Measure, Observation};

// ---------------------------------------------------------------------------
// View – a borrowed, ordered subset of the table
// ---------------------------------------------------------------------------

/// An ordered selection of observations borrowed from a [`HousingDataset`].
///
/// Every filter below is a pure function: the same inputs always produce the
/// same rows in the same order. Nothing here mutates the dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct View<'a> {
    rows: Vec<&'a Observation>,
}

impl<'a> View<'a> {
    /// Every row of the dataset, in file order.
    pub fn all(dataset: &'a HousingDataset) -> Self {
        Self {
            rows: dataset.observations().iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Observation> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn retain(&self, keep: impl Fn(&Observation) -> bool) -> Self {
        Self {
            rows: self.rows.iter().copied().filter(|obs| keep(obs)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters over the whole table
// ---------------------------------------------------------------------------

/// Rows observed in `year`, in file order.
pub fn by_year(dataset: &HousingDataset, year: i32) -> View<'_> {
    View::all(dataset).retain(|obs| obs.year == year)
}

/// Rows with `min_year <= year <= max_year`. An inverted range selects nothing.
pub fn by_year_range(dataset: &HousingDataset, min_year: i32, max_year: i32) -> View<'_> {
    if min_year > max_year {
        return View::default();
    }
    View::all(dataset).retain(|obs| (min_year..=max_year).contains(&obs.year))
}

/// Rows for exactly `town`, ordered by ascending year.
pub fn by_town<'a>(dataset: &'a HousingDataset, town: &str) -> View<'a> {
    let mut view = View::all(dataset).retain(|obs| obs.town == town);
    // Vec::sort_by_key is stable: duplicate years keep file order.
    view.rows.sort_by_key(|obs| obs.year);
    view
}

// ---------------------------------------------------------------------------
// Filters over an existing view
// ---------------------------------------------------------------------------

/// The `n` rows with the largest `measure`, largest first.
///
/// Ties keep their relative order. Rows missing the measure sort last, so
/// they only appear when `n` exceeds the number of rows that have a value.
pub fn top_n_by<'a>(view: &View<'a>, measure: Measure, n: NonZeroUsize) -> View<'a> {
    let mut rows = view.rows.clone();
    rows.sort_by(|a, b| descending_missing_last(measure.value(a), measure.value(b)));
    rows.truncate(n.get());
    View { rows }
}

fn descending_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rows with `low <= measure <= high`. Rows missing the measure never match.
pub fn by_measure_range<'a>(view: &View<'a>, measure: Measure, low: f64, high: f64) -> View<'a> {
    view.retain(|obs| measure.value(obs).is_some_and(|v| v >= low && v <= high))
}

/// Smallest and largest value of `measure` in the view, ignoring missing
/// cells. `None` when no row has a value.
pub fn observed_range(view: &View<'_>, measure: Measure) -> Option<(f64, f64)> {
    view.iter()
        .filter_map(|obs| measure.value(obs))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
