use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Field – the closed set of known columns
// ---------------------------------------------------------------------------

/// Header renames applied after trimming: `(as found in the source, canonical)`.
const HEADER_RENAMES: &[(&str, &str)] = &[(
    "Single Family CHFA/ USDA Mortgages",
    "Single Family CHFA/USDA Mortgages",
)];

/// Trim a raw header cell and apply the known renames.
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim();
    HEADER_RENAMES
        .iter()
        .find(|(from, _)| *from == trimmed)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Every column the explorer knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Field {
    Town,
    Year,
    CensusUnits,
    GovernmentAssisted,
    TenantRentalAssistance,
    SingleFamilyMortgages,
    DeedRestrictedUnits,
    TotalAssistedUnits,
    PercentAffordable,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Town,
        Field::Year,
        Field::CensusUnits,
        Field::GovernmentAssisted,
        Field::TenantRentalAssistance,
        Field::SingleFamilyMortgages,
        Field::DeedRestrictedUnits,
        Field::TotalAssistedUnits,
        Field::PercentAffordable,
    ];

    /// Canonical header text (after normalization).
    pub fn header(self) -> &'static str {
        match self {
            Field::Town => "Town",
            Field::Year => "Year",
            Field::CensusUnits => "2010 Census Units",
            Field::GovernmentAssisted => "Government Assisted",
            Field::TenantRentalAssistance => "Tenant Rental Assistance",
            Field::SingleFamilyMortgages => "Single Family CHFA/USDA Mortgages",
            Field::DeedRestrictedUnits => "Deed Restricted Units",
            Field::TotalAssistedUnits => "Total Assisted Units",
            Field::PercentAffordable => "Percent Affordable",
        }
    }

    pub fn from_header(header: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.header() == header)
    }

    /// Whether a file must carry this column to be loadable.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Field::Town
                | Field::Year
                | Field::CensusUnits
                | Field::SingleFamilyMortgages
                | Field::TotalAssistedUnits
                | Field::PercentAffordable
        )
    }

    /// The numeric view of this field, if it has one.
    pub fn measure(self) -> Option<Measure> {
        Measure::ALL.into_iter().find(|m| m.field() == self)
    }

    /// Render the field of one observation for tooltips and tables.
    pub fn format(self, obs: &Observation) -> String {
        match self {
            Field::Town => obs.town.clone(),
            Field::Year => obs.year.to_string(),
            other => match other.measure().and_then(|m| m.value(obs)) {
                Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.0}"),
                Some(v) => format!("{v:.2}"),
                None => "–".to_string(),
            },
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// Measure – numeric columns with typed accessors
// ---------------------------------------------------------------------------

/// Numeric columns usable for sorting, range filters and regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Measure {
    CensusUnits,
    GovernmentAssisted,
    TenantRentalAssistance,
    SingleFamilyMortgages,
    DeedRestrictedUnits,
    TotalAssistedUnits,
    PercentAffordable,
}

impl Measure {
    pub const ALL: [Measure; 7] = [
        Measure::CensusUnits,
        Measure::GovernmentAssisted,
        Measure::TenantRentalAssistance,
        Measure::SingleFamilyMortgages,
        Measure::DeedRestrictedUnits,
        Measure::TotalAssistedUnits,
        Measure::PercentAffordable,
    ];

    pub fn field(self) -> Field {
        match self {
            Measure::CensusUnits => Field::CensusUnits,
            Measure::GovernmentAssisted => Field::GovernmentAssisted,
            Measure::TenantRentalAssistance => Field::TenantRentalAssistance,
            Measure::SingleFamilyMortgages => Field::SingleFamilyMortgages,
            Measure::DeedRestrictedUnits => Field::DeedRestrictedUnits,
            Measure::TotalAssistedUnits => Field::TotalAssistedUnits,
            Measure::PercentAffordable => Field::PercentAffordable,
        }
    }

    pub fn header(self) -> &'static str {
        self.field().header()
    }

    /// Read this measure from an observation. `None` means the cell was empty.
    pub fn value(self, obs: &Observation) -> Option<f64> {
        match self {
            Measure::CensusUnits => obs.census_units,
            Measure::GovernmentAssisted => obs.government_assisted,
            Measure::TenantRentalAssistance => obs.tenant_rental_assistance,
            Measure::SingleFamilyMortgages => obs.single_family_mortgages,
            Measure::DeedRestrictedUnits => obs.deed_restricted_units,
            Measure::TotalAssistedUnits => obs.total_assisted_units,
            Measure::PercentAffordable => obs.percent_affordable,
        }
    }

    fn slot(self, obs: &mut Observation) -> &mut Option<f64> {
        match self {
            Measure::CensusUnits => &mut obs.census_units,
            Measure::GovernmentAssisted => &mut obs.government_assisted,
            Measure::TenantRentalAssistance => &mut obs.tenant_rental_assistance,
            Measure::SingleFamilyMortgages => &mut obs.single_family_mortgages,
            Measure::DeedRestrictedUnits => &mut obs.deed_restricted_units,
            Measure::TotalAssistedUnits => &mut obs.total_assisted_units,
            Measure::PercentAffordable => &mut obs.percent_affordable,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the table
// ---------------------------------------------------------------------------

/// One town's housing statistics for one year.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub town: String,
    pub year: i32,
    pub census_units: Option<f64>,
    pub government_assisted: Option<f64>,
    pub tenant_rental_assistance: Option<f64>,
    pub single_family_mortgages: Option<f64>,
    pub deed_restricted_units: Option<f64>,
    pub total_assisted_units: Option<f64>,
    pub percent_affordable: Option<f64>,
    /// Unknown columns passed through as raw text: header → cell.
    pub extra: BTreeMap<String, String>,
}

impl Observation {
    pub fn new(town: impl Into<String>, year: i32) -> Self {
        Self {
            town: town.into(),
            year,
            ..Default::default()
        }
    }

    /// Builder-style setter used by the loaders and tests.
    pub fn with(mut self, measure: Measure, value: Option<f64>) -> Self {
        self.set(measure, value);
        self
    }

    pub fn set(&mut self, measure: Measure, value: Option<f64>) {
        *measure.slot(self) = value;
    }
}

// ---------------------------------------------------------------------------
// HousingDataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed table with pre-computed indices. Never mutated after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct HousingDataset {
    observations: Vec<Observation>,
    years: Vec<i32>,
    towns: Vec<String>,
    extra_columns: Vec<String>,
}

impl HousingDataset {
    /// Build indices from the loaded rows, keeping file order.
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let mut years: BTreeSet<i32> = BTreeSet::new();
        let mut towns: BTreeSet<String> = BTreeSet::new();
        let mut extra_columns: BTreeSet<String> = BTreeSet::new();

        for obs in &observations {
            years.insert(obs.year);
            towns.insert(obs.town.clone());
            extra_columns.extend(obs.extra.keys().cloned());
        }

        HousingDataset {
            observations,
            years: years.into_iter().collect(),
            towns: towns.into_iter().collect(),
            extra_columns: extra_columns.into_iter().collect(),
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Observed years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Observed towns, ascending.
    pub fn towns(&self) -> &[String] {
        &self.towns
    }

    /// Pass-through column names, ascending.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    /// Number of rows per year.
    pub fn year_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for obs in &self.observations {
            *counts.entry(obs.year).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
