use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{normalize_header, Field, HousingDataset, Observation};

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

/// A source file that does not fit the housing table. Always fatal for the
/// file being loaded.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("column '{column}', row {row}: '{value}' is not a number")]
    MalformedValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{column}', row {row}: value is required")]
    MissingValue { column: &'static str, row: usize },
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a housing dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row + one row per (Town, Year)
/// * `.json`    – `[{ "Town": ..., "Year": ..., ... }, ...]`
/// * `.parquet` – flat columns with the same names as the CSV header
pub fn load_file(path: &Path) -> Result<HousingDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} observations ({} towns, years {:?}) from {}",
        dataset.len(),
        dataset.towns().len(),
        dataset.year_bounds(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Column layout shared by every format
// ---------------------------------------------------------------------------

/// A single cell as handed over by a format-specific reader.
enum RawCell<'a> {
    Text(Cow<'a, str>),
    Number(f64),
    Null,
}

/// Normalized headers of a source, validated against [`Field`] once.
struct ColumnLayout {
    headers: Vec<String>,
    fields: Vec<Option<Field>>,
}

impl ColumnLayout {
    fn from_headers<'h>(raw: impl IntoIterator<Item = &'h str>) -> Result<Self, SchemaError> {
        let headers: Vec<String> = raw.into_iter().map(normalize_header).collect();
        let fields: Vec<Option<Field>> = headers.iter().map(|h| Field::from_header(h)).collect();

        if let Some(missing) = Field::ALL
            .into_iter()
            .filter(|f| f.is_required())
            .find(|f| !fields.contains(&Some(*f)))
        {
            return Err(SchemaError::MissingColumn {
                column: missing.header(),
            });
        }

        Ok(Self { headers, fields })
    }

    /// Assemble one observation. `row` is 1-based and only used in errors.
    fn observation<'c>(
        &self,
        row: usize,
        mut cell: impl FnMut(usize) -> RawCell<'c>,
    ) -> Result<Observation, SchemaError> {
        let mut obs = Observation::default();
        let mut town = None;
        let mut year = None;

        for (idx, header) in self.headers.iter().enumerate() {
            let value = cell(idx);
            match self.fields[idx] {
                Some(Field::Town) => town = text_value(value),
                Some(Field::Year) => year = Some(year_value(value, row)?),
                Some(field) => {
                    if let Some(measure) = field.measure() {
                        obs.set(measure, numeric_value(value, header, row)?);
                    }
                }
                None => {
                    obs.extra
                        .insert(header.clone(), text_value(value).unwrap_or_default());
                }
            }
        }

        obs.town = town.ok_or(SchemaError::MissingValue {
            column: Field::Town.header(),
            row,
        })?;
        obs.year = year.flatten().ok_or(SchemaError::MissingValue {
            column: Field::Year.header(),
            row,
        })?;
        Ok(obs)
    }
}

fn text_value(cell: RawCell<'_>) -> Option<String> {
    match cell {
        RawCell::Text(s) if s.trim().is_empty() => None,
        RawCell::Text(s) => Some(s.into_owned()),
        RawCell::Number(n) => Some(n.to_string()),
        RawCell::Null => None,
    }
}

/// Empty cells and NaN are missing; anything else must parse.
fn numeric_value(cell: RawCell<'_>, column: &str, row: usize) -> Result<Option<f64>, SchemaError> {
    let value = match cell {
        RawCell::Null => return Ok(None),
        RawCell::Number(n) => n,
        RawCell::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| SchemaError::MalformedValue {
                    column: column.to_string(),
                    row,
                    value: trimmed.to_string(),
                })?
        }
    };
    Ok((!value.is_nan()).then_some(value))
}

/// Years may arrive as `2015` or `2015.0`; fractional years are malformed.
fn year_value(cell: RawCell<'_>, row: usize) -> Result<Option<i32>, SchemaError> {
    let malformed = |value: String| SchemaError::MalformedValue {
        column: Field::Year.header().to_string(),
        row,
        value,
    };
    let Some(n) = numeric_value(cell, Field::Year.header(), row)? else {
        return Ok(None);
    };
    if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
        return Err(malformed(n.to_string()));
    }
    Ok(Some(n as i32))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<HousingDataset> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    load_csv_reader(file)
}

/// Parse CSV text with a header row into a dataset.
pub fn load_csv_reader<R: Read>(source: R) -> Result<HousingDataset> {
    let mut reader = csv::Reader::from_reader(source);
    let layout = ColumnLayout::from_headers(
        reader
            .headers()
            .context("reading CSV headers")?
            .iter(),
    )?;

    let mut observations = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = row_no + 1;
        let record = result.with_context(|| format!("CSV row {row}"))?;
        let obs = layout.observation(row, |idx| match record.get(idx) {
            Some(s) => RawCell::Text(Cow::Borrowed(s)),
            None => RawCell::Null,
        })?;
        observations.push(obs);
    }

    Ok(HousingDataset::from_observations(observations))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Town": "Andover", "Year": 2011, "2010 Census Units": 1317, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<HousingDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    load_json_str(&text)
}

fn load_json_str(text: &str) -> Result<HousingDataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    // Normalize keys per record; the layout is the union in first-seen order.
    let mut rows: Vec<BTreeMap<String, &JsonValue>> = Vec::with_capacity(records.len());
    let mut raw_headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {} is not a JSON object", i + 1))?;
        let mut row = BTreeMap::new();
        for (key, val) in obj {
            let header = normalize_header(key);
            if !raw_headers.contains(&header) {
                raw_headers.push(header.clone());
            }
            row.insert(header, val);
        }
        rows.push(row);
    }

    let layout = ColumnLayout::from_headers(raw_headers.iter().map(String::as_str))?;
    let mut observations = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let obs = layout.observation(i + 1, |idx| {
            match row.get(&layout.headers[idx]).copied() {
                Some(JsonValue::String(s)) => RawCell::Text(Cow::Borrowed(s.as_str())),
                Some(JsonValue::Number(n)) => n.as_f64().map_or(RawCell::Null, RawCell::Number),
                Some(JsonValue::Bool(b)) => RawCell::Text(Cow::Owned(b.to_string())),
                Some(JsonValue::Null) | None => RawCell::Null,
                Some(other) => RawCell::Text(Cow::Owned(other.to_string())),
            }
        })?;
        observations.push(obs);
    }

    Ok(HousingDataset::from_observations(observations))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file whose flat columns carry the CSV header names.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), and by the `generate_sample` binary.
fn load_parquet(path: &Path) -> Result<HousingDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let layout = ColumnLayout::from_headers(
        builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str()),
    )?;
    let reader = builder.build().context("building parquet reader")?;

    let mut observations = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let row_no = observations.len() + 1;
            let obs = layout.observation(row_no, |idx| arrow_cell(batch.column(idx), row))?;
            observations.push(obs);
        }
    }

    Ok(HousingDataset::from_observations(observations))
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> RawCell<'static> {
    if col.is_null(row) {
        return RawCell::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => RawCell::Text(Cow::Owned(col.as_string::<i32>().value(row).to_string())),
        DataType::LargeUtf8 => {
            RawCell::Text(Cow::Owned(col.as_string::<i64>().value(row).to_string()))
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(RawCell::Null, |a| RawCell::Number(a.value(row) as f64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(RawCell::Null, |a| RawCell::Number(a.value(row) as f64)),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(RawCell::Null, |a| RawCell::Number(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(RawCell::Null, |a| RawCell::Number(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(RawCell::Null, |a| {
                RawCell::Text(Cow::Owned(a.value(row).to_string()))
            }),
        other => RawCell::Text(Cow::Owned(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::Measure;

    const HEADER: &str = "Town Code,Town,Year,2010 Census Units,Government Assisted,\
Tenant Rental Assistance, Single Family CHFA/ USDA Mortgages,Deed Restricted Units,\
Total Assisted Units,Percent Affordable";

    fn schema_error(err: &anyhow::Error) -> Option<&SchemaError> {
        err.chain().find_map(|e| e.downcast_ref::<SchemaError>())
    }

    #[test]
    fn csv_with_leading_space_header_loads() {
        let text = format!(
            "{HEADER}\n1,Andover,2011,1317,18,1,40,0,59,4.48\n2,Ansonia,2011,8148,932,387,199,0,1518,18.63\n"
        );
        let ds = load_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        let andover = &ds.observations()[0];
        assert_eq!(andover.town, "Andover");
        assert_eq!(andover.year, 2011);
        assert_eq!(Measure::SingleFamilyMortgages.value(andover), Some(40.0));
        assert_eq!(Measure::PercentAffordable.value(andover), Some(4.48));
        assert_eq!(andover.extra.get("Town Code").map(String::as_str), Some("1"));
        assert_eq!(ds.extra_columns(), &["Town Code".to_string()]);
    }

    #[test]
    fn empty_numeric_cells_are_missing() {
        let text = format!("{HEADER}\n1,Andover,2011,1317,,1,40,0,59,\n");
        let ds = load_csv_reader(text.as_bytes()).unwrap();
        let obs = &ds.observations()[0];
        assert_eq!(obs.government_assisted, None);
        assert_eq!(obs.percent_affordable, None);
        assert_eq!(obs.census_units, Some(1317.0));
    }

    #[test]
    fn missing_required_column_is_named() {
        let text = "Town,Year,2010 Census Units,Total Assisted Units,Percent Affordable\nA,2011,1,1,1\n";
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        assert_eq!(
            schema_error(&err),
            Some(&SchemaError::MissingColumn {
                column: "Single Family CHFA/USDA Mortgages"
            })
        );
        assert!(format!("{err:#}").contains("Single Family CHFA/USDA Mortgages"));
    }

    #[test]
    fn unparsable_number_names_column_and_row() {
        let text = format!("{HEADER}\n1,Andover,2011,1317,18,1,40,0,59,4.48\n2,Ansonia,2011,lots,932,387,199,0,1518,18.63\n");
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        assert_eq!(
            schema_error(&err),
            Some(&SchemaError::MalformedValue {
                column: "2010 Census Units".into(),
                row: 2,
                value: "lots".into(),
            })
        );
    }

    #[test]
    fn fractional_or_missing_year_is_rejected() {
        let text = format!("{HEADER}\n1,Andover,2011.5,1317,18,1,40,0,59,4.48\n");
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        assert!(matches!(
            schema_error(&err),
            Some(SchemaError::MalformedValue { column, .. }) if column == "Year"
        ));

        let text = format!("{HEADER}\n1,Andover,,1317,18,1,40,0,59,4.48\n");
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        assert_eq!(
            schema_error(&err),
            Some(&SchemaError::MissingValue {
                column: "Year",
                row: 1
            })
        );
    }

    #[test]
    fn json_records_load_with_normalized_keys() {
        let text = r#"[
            {"Town": "Avon", "Year": 2014, "2010 Census Units": 7389,
             " Single Family CHFA/ USDA Mortgages": 41, "Total Assisted Units": 211,
             "Percent Affordable": 2.86},
            {"Town": "Avon", "Year": 2015, "2010 Census Units": 7389,
             " Single Family CHFA/ USDA Mortgages": null, "Total Assisted Units": 215,
             "Percent Affordable": 2.91}
        ]"#;
        let ds = load_json_str(text).unwrap();
        assert_eq!(ds.years(), &[2014, 2015]);
        assert_eq!(ds.observations()[0].single_family_mortgages, Some(41.0));
        assert_eq!(ds.observations()[1].single_family_mortgages, None);
    }

    #[test]
    fn parquet_columns_load_like_csv() {
        use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
        use arrow::datatypes::{Field as ArrowField, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let headers = [
            "2010 Census Units",
            " Single Family CHFA/ USDA Mortgages",
            "Total Assisted Units",
            "Percent Affordable",
        ];
        let mut fields = vec![
            ArrowField::new("Town", DataType::Utf8, false),
            ArrowField::new("Year", DataType::Int64, false),
        ];
        fields.extend(headers.iter().map(|h| ArrowField::new(*h, DataType::Float64, true)));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["Avon", "Avon"])),
            Arc::new(Int64Array::from(vec![2012, 2013])),
            Arc::new(Float64Array::from(vec![7389.0, 7389.0])),
            Arc::new(Float64Array::from(vec![Some(40.0), None])),
            Arc::new(Float64Array::from(vec![200.0, 210.0])),
            Arc::new(Float64Array::from(vec![2.71, 2.84])),
        ];
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.years(), &[2012, 2013]);
        let first = &ds.observations()[0];
        assert_eq!(first.single_family_mortgages, Some(40.0));
        assert_eq!(first.percent_affordable, Some(2.71));
        assert_eq!(ds.observations()[1].single_family_mortgages, None);
    }

    #[test]
    fn load_file_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "3,Ashford,2020,1903,32,3,38,0,73,3.84").unwrap();
        file.flush().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.towns(), &["Ashford".to_string()]);

        let err = load_file(Path::new("housing.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
