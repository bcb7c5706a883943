//! CSV export of bucketed chart data.

use crate::{Bucket, Result};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    label: &'a str,
    aggregate: f64,
    entries: usize,
}

impl<'a> From<&'a Bucket> for CsvRow<'a> {
    fn from(bucket: &'a Bucket) -> Self {
        CsvRow {
            label: &bucket.label,
            aggregate: bucket.aggregate,
            entries: bucket.entries,
        }
    }
}

/// Write buckets to `path` (overwriting), oldest first, with a header row
pub fn write_buckets_csv(path: &Path, buckets: &[Bucket]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    for bucket in buckets {
        writer.serialize(CsvRow::from(bucket))?;
    }
    writer.flush()?;

    tracing::info!("Exported {} buckets to {:?}", buckets.len(), path);
    Ok(buckets.len())
}
