use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One row of the input table. Extra columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialRow {
    pub mpid: String,
    #[serde(rename = "Band_Gap")]
    pub band_gap: f64,
    #[serde(rename = "Bulk_Point")]
    pub bulk_point: f64,
}

/// Load all input rows from a CSV with mpid, Band_Gap and Bulk_Point columns.
pub fn load_rows(path: &Path) -> Result<Vec<MaterialRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: MaterialRow =
            record.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}
