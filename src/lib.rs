//! SegmentForge: A Rust CLI application for rule-based customer segmentation
//!
//! This library labels customer tables with recency, RFM (Recency, Frequency,
//! Monetary) and engagement segments using configurable thresholds.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod report;
pub mod segmentation;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{
    load_config, load_config_with_env, SegmentationConfig, ThresholdConfig, ThresholdOverrides,
};
pub use data::{load, try_load, DataSource, REQUIRED_COLUMNS};
pub use error::SegmentError;
pub use report::{filter_segment, print_segment_summary, save_segment_to_csv, segment_summary};
pub use segmentation::{
    classify_engagement, classify_recency, classify_recency_at, classify_rfm, classify_rfm_at,
    EngagementSegment, RecencySegment, RfmScore, RfmSegment,
};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, SegmentError>;
