/// Data layer: core types, loading, filtering and line fitting.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  normalize headers, parse rows → HousingDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ HousingDataset │  Vec<Observation>, year / town index
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  year, year range, town, top-N, numeric bounds → View
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ regression │  OLS line + R² over two measures of a View
///   └────────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod regression;

#[cfg(test)]
pub(crate) mod test_support;
