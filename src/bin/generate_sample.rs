//! Writes a synthetic affordable-housing table shaped like the published
//! 2011–2022 file, including its leading-space mortgage header.
//!
//! ```text
//! generate_sample [--parquet] [OUTPUT]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;

const HEADERS: [&str; 10] = [
    "Town Code",
    "Town",
    "Year",
    "2010 Census Units",
    "Government Assisted",
    "Tenant Rental Assistance",
    " Single Family CHFA/ USDA Mortgages",
    "Deed Restricted Units",
    "Total Assisted Units",
    "Percent Affordable",
];

/// Town name and 2010 census housing units.
const TOWNS: &[(&str, u32)] = &[
    ("Andover", 1317),
    ("Ansonia", 8148),
    ("Ashford", 1903),
    ("Avon", 7389),
    ("Barkhamsted", 1589),
    ("Beacon Falls", 2509),
    ("Berlin", 8140),
    ("Bethany", 2044),
    ("Bethel", 7310),
    ("Bethlehem", 1575),
    ("Bloomfield", 9019),
    ("Bolton", 2015),
    ("Bozrah", 1059),
    ("Branford", 13972),
    ("Bridgeport", 57012),
    ("Bridgewater", 919),
    ("Bristol", 27011),
    ("Brookfield", 6562),
    ("Brooklyn", 3235),
    ("Burlington", 3389),
    ("Canaan", 779),
    ("Canterbury", 2043),
    ("Canton", 4338),
    ("Chaplin", 975),
    ("Cheshire", 10424),
    ("Chester", 1923),
    ("Clinton", 6065),
    ("Colchester", 6182),
    ("Colebrook", 722),
    ("Columbia", 2297),
];

const FIRST_YEAR: i64 = 2011;
const LAST_YEAR: i64 = 2022;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[low, high)`.
    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }
}

/// One generated row, columns in [`HEADERS`] order.
struct Row {
    code: i64,
    town: &'static str,
    year: i64,
    census: f64,
    government: f64,
    tenant: f64,
    mortgages: f64,
    deed: f64,
    total: f64,
    percent: f64,
}

fn generate_rows(rng: &mut SimpleRng) -> Vec<Row> {
    // Each town has a base share of assisted housing that drifts over time.
    let bases: Vec<f64> = TOWNS.iter().map(|_| rng.range(0.01, 0.25)).collect();

    let mut rows = Vec::with_capacity(TOWNS.len() * (LAST_YEAR - FIRST_YEAR + 1) as usize);
    for year in FIRST_YEAR..=LAST_YEAR {
        for (i, &(town, census)) in TOWNS.iter().enumerate() {
            let census = f64::from(census);
            let drift = 1.0 + 0.01 * (year - FIRST_YEAR) as f64 + rng.range(-0.03, 0.03);
            let assisted = (census * bases[i] * drift).max(0.0);

            let government = (assisted * rng.range(0.4, 0.7)).round();
            let tenant = (assisted * rng.range(0.1, 0.3)).round();
            let mortgages = (assisted * rng.range(0.05, 0.2)).round();
            let deed = (assisted * rng.range(0.0, 0.05)).round();
            let total = government + tenant + mortgages + deed;

            rows.push(Row {
                code: i as i64 + 1,
                town,
                year,
                census,
                government,
                tenant,
                mortgages,
                deed,
                total,
                percent: (total / census * 10_000.0).round() / 100.0,
            });
        }
    }
    rows
}

fn write_csv(rows: &[Row], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV output")?;
    writer.write_record(HEADERS)?;
    for r in rows {
        writer.write_record([
            r.code.to_string(),
            r.town.to_string(),
            r.year.to_string(),
            r.census.to_string(),
            r.government.to_string(),
            r.tenant.to_string(),
            r.mortgages.to_string(),
            r.deed.to_string(),
            r.total.to_string(),
            format!("{:.2}", r.percent),
        ])?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

fn to_batch(rows: &[Row]) -> Result<RecordBatch> {
    let numeric = |f: fn(&Row) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let mut fields = vec![
        Field::new(HEADERS[0], DataType::Int64, false),
        Field::new(HEADERS[1], DataType::Utf8, false),
        Field::new(HEADERS[2], DataType::Int64, false),
    ];
    fields.extend(
        HEADERS[3..]
            .iter()
            .map(|h| Field::new(*h, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(rows.iter().map(|r| r.code).collect::<Vec<_>>())),
        Arc::new(StringArray::from(rows.iter().map(|r| r.town).collect::<Vec<_>>())),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.year).collect::<Vec<_>>())),
        numeric(|r| r.census),
        numeric(|r| r.government),
        numeric(|r| r.tenant),
        numeric(|r| r.mortgages),
        numeric(|r| r.deed),
        numeric(|r| r.total),
        numeric(|r| r.percent),
    ];

    RecordBatch::try_new(schema, columns).context("building record batch")
}

fn write_parquet(rows: &[Row], path: &Path) -> Result<()> {
    let batch = to_batch(rows)?;
    println!("{}", pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])?);

    let file = std::fs::File::create(path).context("creating parquet output")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut parquet = false;
    let mut output: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--parquet" => parquet = true,
            other => output = Some(PathBuf::from(other)),
        }
    }
    let output = output.unwrap_or_else(|| {
        PathBuf::from(if parquet {
            "sample_housing.parquet"
        } else {
            "sample_housing.csv"
        })
    });

    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng);

    if parquet {
        write_parquet(&rows, &output)?;
    } else {
        write_csv(&rows, &output)?;
    }

    println!(
        "Wrote {} rows ({} towns × {} years) to {}",
        rows.len(),
        TOWNS.len(),
        LAST_YEAR - FIRST_YEAR + 1,
        output.display()
    );
    Ok(())
}
