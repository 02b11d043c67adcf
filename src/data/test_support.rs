//! Deterministic fixture data shared by unit tests.

use super::loader::load_csv_reader;
use super::model::HousingDataset;

pub const TOWNS: [&str; 16] = [
    "Andover",
    "Ansonia",
    "Ashford",
    "Avon",
    "Barkhamsted",
    "Beacon Falls",
    "Berlin",
    "Bethany",
    "Bethel",
    "Bethlehem",
    "Bloomfield",
    "Bolton",
    "Bozrah",
    "Branford",
    "Bridgeport",
    "Bristol",
];

pub const FIRST_YEAR: i32 = 2011;
pub const LAST_YEAR: i32 = 2022;

/// CSV text shaped like the published 2011–2022 file, including the
/// leading-space mortgage header. Rows are grouped by year, like the source.
pub fn sample_csv() -> String {
    let mut out = String::from(
        "Town Code,Town,Year,2010 Census Units,Government Assisted,Tenant Rental Assistance, \
         Single Family CHFA/ USDA Mortgages,Deed Restricted Units,Total Assisted Units,\
         Percent Affordable\n",
    );
    for year in FIRST_YEAR..=LAST_YEAR {
        for (i, town) in TOWNS.iter().enumerate() {
            let census = 1_200 + 1_733 * i as u32;
            let step = (year - FIRST_YEAR) as u32;
            let government = 10 + ((i as u32 * 37 + step * 5) % 400);
            let tenant = 3 + ((i as u32 * 11 + step * 3) % 120);
            let mortgages = 20 + ((i as u32 * 13 + step * 2) % 90);
            let deed = (i as u32 * 7 + step) % 25;
            let total = government + tenant + mortgages + deed;
            let percent = f64::from(total) / f64::from(census) * 100.0;
            out.push_str(&format!(
                "{},{town},{year},{census},{government},{tenant},{mortgages},{deed},{total},{percent:.4}\n",
                i + 1
            ));
        }
    }
    out
}

pub fn sample_dataset() -> HousingDataset {
    load_csv_reader(sample_csv().as_bytes()).expect("fixture CSV is well-formed")
}
