//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::config::ThresholdOverrides;
use crate::data::{parse_date, DataSource};

/// Rule-based customer segmentation by recency, RFM and engagement
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customer CSV file
    #[arg(short, long, default_value = "data/sample_customers.csv")]
    pub input: PathBuf,

    /// Path to the JSON threshold configuration
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Data source; overrides `data_source` from the config file
    #[arg(long, value_enum)]
    pub source: Option<DataSource>,

    /// Directory for exported segment CSVs
    #[arg(short, long, default_value = "data/output")]
    pub output_dir: PathBuf,

    /// Reference date for recency (YYYY-MM-DD). Defaults to today
    #[arg(long)]
    pub as_of: Option<String>,

    /// Days since last purchase still counted as Active
    #[arg(long)]
    pub recency_active_days: Option<f64>,

    /// Days since last purchase still counted as AtRisk
    #[arg(long)]
    pub recency_risk_days: Option<f64>,

    /// RFM recency threshold in days
    #[arg(long)]
    pub rfm_recency: Option<f64>,

    /// RFM minimum purchase count
    #[arg(long)]
    pub rfm_frequency: Option<f64>,

    /// RFM minimum total spend
    #[arg(long)]
    pub rfm_monetary: Option<f64>,

    /// Engagement score for the High segment
    #[arg(long)]
    pub engagement_high: Option<f64>,

    /// Engagement score for the Medium segment
    #[arg(long)]
    pub engagement_medium: Option<f64>,

    /// Engagement floor (informational)
    #[arg(long, allow_negative_numbers = true)]
    pub engagement_low: Option<f64>,

    /// Skip writing segment CSVs
    #[arg(long)]
    pub no_export: bool,

    /// Log file, appended to on every run
    #[arg(long, default_value = "logs/segmentation.log")]
    pub log_file: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Threshold values given on the command line.
    pub fn threshold_overrides(&self) -> ThresholdOverrides {
        ThresholdOverrides {
            recency_active_days: self.recency_active_days,
            recency_risk_days: self.recency_risk_days,
            rfm_recency_threshold: self.rfm_recency,
            rfm_frequency_threshold: self.rfm_frequency,
            rfm_monetary_threshold: self.rfm_monetary,
            engagement_high: self.engagement_high,
            engagement_medium: self.engagement_medium,
            engagement_low: self.engagement_low,
        }
    }

    /// Parse the `--as-of` reference date.
    /// Expected format: "YYYY-MM-DD"
    pub fn parse_as_of(&self) -> crate::Result<Option<NaiveDate>> {
        match self.as_of.as_deref() {
            Some(raw) => parse_date(raw).map(Some).ok_or_else(|| {
                crate::SegmentError::InvalidArgument(format!("Invalid --as-of date: {}", raw))
            }),
            None => Ok(None),
        }
    }
}
