//! Customer data loading and schema validation using Polars

use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::SegmentError;

/// Columns every customer table must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 12] = [
    "customer_id",
    "name",
    "email",
    "signup_date",
    "last_purchase_date",
    "purchase_count",
    "total_spend",
    "email_opens_30d",
    "logins_30d",
    "support_tickets",
    "nps_score",
    "plan_type",
];

const DATE_COLUMNS: [&str; 2] = ["signup_date", "last_purchase_date"];
const COUNT_COLUMNS: [&str; 4] = [
    "purchase_count",
    "email_opens_30d",
    "logins_30d",
    "support_tickets",
];
const AMOUNT_COLUMNS: [&str; 2] = ["total_spend", "nps_score"];

/// Mock CRM endpoint reported by the remote source. Nothing is fetched from it.
pub const MOCK_API_URL: &str = "https://api.hubapi.com/crm/v3/objects/contacts/demo-mock";

/// Where customer records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Local CSV file
    #[default]
    #[serde(alias = "csv")]
    #[value(alias = "csv")]
    File,
    /// Remote CRM API (mock dataset)
    #[serde(alias = "api")]
    #[value(alias = "api")]
    Remote,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File => write!(f, "file"),
            DataSource::Remote => write!(f, "remote"),
        }
    }
}

/// Load customers from the given source, logging and swallowing any failure.
///
/// Returns `None` when the data could not be loaded; callers must check
/// before running classifiers.
pub fn load(source: DataSource, csv_path: &Path, api_key: Option<&str>) -> Option<DataFrame> {
    match try_load(source, csv_path, api_key) {
        Ok(df) => Some(df),
        Err(e) => {
            error!("Error: {e}");
            None
        }
    }
}

/// Load customers from the given source.
pub fn try_load(
    source: DataSource,
    csv_path: &Path,
    api_key: Option<&str>,
) -> crate::Result<DataFrame> {
    match source {
        DataSource::File => load_csv(csv_path),
        DataSource::Remote => fetch_remote(api_key),
    }
}

/// Load a customer CSV and validate it against the required schema.
///
/// # Errors
/// * `SourceNotFound` if the path does not exist
/// * `EmptySource` if the file has no bytes or no data rows
/// * `MissingColumns` / `InvalidValue` if the schema contract is violated
pub fn load_csv(path: &Path) -> crate::Result<DataFrame> {
    info!(path = %path.display(), "loading customers from CSV");

    if !path.exists() {
        return Err(SegmentError::SourceNotFound(path.to_path_buf()));
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(SegmentError::EmptySource(path.display().to_string()));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    trim_column_names(&mut df)?;

    if df.height() == 0 {
        return Err(SegmentError::EmptySource(path.display().to_string()));
    }

    validate_schema(&df)?;
    info!(rows = df.height(), "customers loaded");
    Ok(df)
}

/// Return a fixed two-customer dataset standing in for a CRM API response.
pub fn fetch_remote(api_key: Option<&str>) -> crate::Result<DataFrame> {
    info!(
        endpoint = MOCK_API_URL,
        authenticated = api_key.is_some_and(|k| !k.is_empty()),
        "loading customers from remote API"
    );

    let df = df!(
        "customer_id" => &["A1", "A2"],
        "name" => &["API User", "API Maria"],
        "email" => &["apiuser@test.com", "apimaria@test.com"],
        "signup_date" => &["2023-05-01", "2022-07-11"],
        "last_purchase_date" => &["2024-06-01", "2023-10-10"],
        "purchase_count" => &[5i64, 1],
        "total_spend" => &[2000i64, 120],
        "email_opens_30d" => &[4i64, 1],
        "logins_30d" => &[8i64, 1],
        "support_tickets" => &[0i64, 1],
        "nps_score" => &[9i64, 7],
        "plan_type" => &["Premium", "Basic"]
    )?;

    Ok(df)
}

/// Check that all required columns exist and every typed value parses.
pub fn validate_schema(df: &DataFrame) -> crate::Result<()> {
    require_columns(df, &REQUIRED_COLUMNS)?;

    for name in DATE_COLUMNS {
        date_column(df, name)?;
    }
    for name in COUNT_COLUMNS {
        count_column(df, name)?;
    }
    for name in AMOUNT_COLUMNS {
        float_column(df, name)?;
    }
    Ok(())
}

/// Fail with every absent column listed.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> crate::Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| df.get_column_index(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SegmentError::MissingColumns(missing))
    }
}

/// Parse a column of ISO dates.
pub fn date_column(df: &DataFrame, name: &str) -> crate::Result<Vec<NaiveDate>> {
    require_columns(df, &[name])?;
    let series = df.column(name)?.cast(&DataType::String)?;
    let ca = series.str()?;

    let dates = ca
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let raw = value.ok_or_else(|| SegmentError::invalid_value(name, row, "missing date"))?;
            parse_date(raw).ok_or_else(|| {
                SegmentError::invalid_value(name, row, format!("'{raw}' is not a YYYY-MM-DD date"))
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(dates)
}

/// Read a numeric column as `f64`.
pub fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    require_columns(df, &[name])?;
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let ca = series.f64()?;

    let values = ca
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                SegmentError::invalid_value(name, row, "missing or non-numeric value")
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(values)
}

/// Read a counter column as whole numbers.
///
/// Integer columns are read exactly. Float and text columns must hold whole
/// numbers; fractional values are rejected, not rounded.
pub fn count_column(df: &DataFrame, name: &str) -> crate::Result<Vec<i64>> {
    require_columns(df, &[name])?;
    let column = df.column(name)?;

    if !column.dtype().is_integer() {
        return float_column(df, name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                if value.fract() == 0.0 {
                    Ok(value as i64)
                } else {
                    Err(SegmentError::invalid_value(
                        name,
                        row,
                        format!("{value} is not a whole number"),
                    ))
                }
            })
            .collect();
    }

    let series = column.strict_cast(&DataType::Int64).map_err(|_| {
        SegmentError::invalid_value(name, 0, "counter does not fit in a 64-bit integer")
    })?;
    let ca = series.i64()?;

    let values = ca
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| SegmentError::invalid_value(name, row, "missing value"))
        })
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(values)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn trim_column_names(df: &mut DataFrame) -> crate::Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for name in names {
        let trimmed = name.trim();
        if trimmed != name {
            df.rename(&name, trimmed)?;
        }
    }
    Ok(())
}
