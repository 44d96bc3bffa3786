//! Segment summaries and CSV export of labeled customer tables

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use polars::prelude::*;
use tracing::info;

use crate::data::require_columns;

/// Per-label customer counts for one segment column.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub column: String,
    pub total: usize,
    /// Label and count, sorted by label.
    pub counts: Vec<(String, usize)>,
}

impl SegmentSummary {
    pub fn count(&self, label: &str) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map_or(0, |(_, n)| *n)
    }

    pub fn percentage(&self, label: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(label) as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for SegmentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary for segment '{}':", self.column)?;
        for (label, count) in &self.counts {
            writeln!(
                f,
                "- {}: {} customers ({:.1}%)",
                label,
                count,
                self.percentage(label)
            )?;
        }
        Ok(())
    }
}

/// Count customers per label in `column`. Nulls are reported as `null`.
pub fn segment_summary(df: &DataFrame, column: &str) -> crate::Result<SegmentSummary> {
    require_columns(df, &[column])?;
    let series = df.column(column)?.cast(&DataType::String)?;
    let labels = series.str()?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in labels.into_iter() {
        *counts.entry(label.unwrap_or("null").to_string()).or_default() += 1;
    }

    Ok(SegmentSummary {
        column: column.to_string(),
        total: df.height(),
        counts: counts.into_iter().collect(),
    })
}

/// Print the summary for `column` and return it as text.
pub fn print_segment_summary(df: &DataFrame, column: &str) -> crate::Result<String> {
    let text = segment_summary(df, column)?.to_string();
    println!("{}", text);
    Ok(text)
}

/// Keep only rows whose `column` equals `label`.
pub fn filter_segment(df: &DataFrame, column: &str, label: &str) -> crate::Result<DataFrame> {
    require_columns(df, &[column])?;
    let series = df.column(column)?.cast(&DataType::String)?;
    let mask: BooleanChunked = series
        .str()?
        .into_iter()
        .map(|value| value == Some(label))
        .collect();

    Ok(df.filter(&mask)?)
}

/// Write `df` to `<output_dir>/<segment_name>_<YYYYmmdd_HHMMSS>.csv`.
///
/// The directory is created if needed. Returns the path written.
pub fn save_segment_to_csv(
    df: &DataFrame,
    segment_name: &str,
    output_dir: &Path,
) -> crate::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{}_{}.csv", segment_name, timestamp));

    let mut file = File::create(&path)?;
    let mut out = df.clone();
    CsvWriter::new(&mut file).include_header(true).finish(&mut out)?;

    info!(segment = segment_name, rows = df.height(), path = %path.display(), "segment exported");
    Ok(path)
}
