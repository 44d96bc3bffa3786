//! SegmentForge: Customer segmentation CLI using recency, RFM and engagement rules
//!
//! This is the main entrypoint that orchestrates configuration, data loading,
//! segmentation, summaries and export.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use polars::prelude::DataFrame;
use segmentforge::segmentation::{ENGAGEMENT_SEGMENT, RECENCY_SEGMENT, RFM_SEGMENT};
use segmentforge::{
    classify_engagement, classify_recency_at, classify_rfm_at, filter_segment, load,
    load_config_with_env, logging, print_segment_summary, save_segment_to_csv, Args,
    EngagementSegment, RecencySegment, RfmSegment, ThresholdConfig,
};
use std::time::Instant;
use tracing::{error, info};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init_logging(args.verbose, Some(&args.log_file))?;

    info!("starting customer segmentation run");
    let start_time = Instant::now();

    let config = load_config_with_env(&args.config);
    let thresholds = config.thresholds.resolve(&args.threshold_overrides());
    let source = args.source.unwrap_or(config.data_source);
    let today = args.parse_as_of()?.unwrap_or_else(|| Local::now().date_naive());

    if args.verbose {
        println!("SegmentForge - Rule-based Customer Segmentation");
        println!("===============================================\n");
        println!("Thresholds:");
        for key in ThresholdConfig::KEYS {
            if let Some(value) = thresholds.get(key) {
                println!("  {key} = {value}");
            }
        }
        println!("Data source: {}", source);
        println!("Reference date: {}\n", today);
    }

    let Some(df) = load(source, &args.input, config.hubspot_api_key.as_deref()) else {
        error!("failed to load customer data; nothing to segment");
        bail!("Customer data could not be loaded");
    };
    println!("✓ Data loaded: {} customers", df.height());

    let labeled = run_segmentation(&df, &thresholds, today)?;

    if !args.no_export {
        export_segments(&labeled, &args.output_dir)?;
    }

    println!("\n=== Segmentation Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    info!("segmentation run finished");

    Ok(())
}

/// Tables produced by each classifier over the same input.
struct Labeled {
    recency: DataFrame,
    rfm: DataFrame,
    engagement: DataFrame,
}

/// Run all three classifiers and print a preview and summary for each
fn run_segmentation(df: &DataFrame, t: &ThresholdConfig, today: NaiveDate) -> Result<Labeled> {
    println!("\n=== Recency Segmentation ===");
    let recency = classify_recency_at(df, t.recency_active_days, t.recency_risk_days, today)?;
    info!("recency segmentation done");
    println!(
        "{}",
        recency
            .select([
                "name",
                "last_purchase_date",
                "days_since_last_purchase",
                RECENCY_SEGMENT,
            ])?
            .head(Some(5))
    );
    print_segment_summary(&recency, RECENCY_SEGMENT)?;

    println!("=== RFM Segmentation ===");
    let rfm = classify_rfm_at(
        df,
        t.rfm_recency_threshold,
        t.rfm_frequency_threshold,
        t.rfm_monetary_threshold,
        today,
    )?;
    info!("rfm segmentation done");
    println!("{}", rfm.select(["name", "rfm_score", RFM_SEGMENT])?.head(Some(5)));
    print_segment_summary(&rfm, RFM_SEGMENT)?;

    println!("=== Engagement Segmentation ===");
    let engagement = classify_engagement(
        df,
        t.engagement_high,
        t.engagement_medium,
        t.engagement_low,
    )?;
    info!("engagement segmentation done");
    println!(
        "{}",
        engagement
            .select([
                "name",
                "email_opens_30d",
                "logins_30d",
                "engagement_score",
                ENGAGEMENT_SEGMENT,
            ])?
            .head(Some(5))
    );
    print_segment_summary(&engagement, ENGAGEMENT_SEGMENT)?;

    Ok(Labeled {
        recency,
        rfm,
        engagement,
    })
}

/// Export the headline cohort of each classifier
fn export_segments(labeled: &Labeled, output_dir: &std::path::Path) -> Result<()> {
    let exports = [
        (
            &labeled.recency,
            RECENCY_SEGMENT,
            RecencySegment::Active.as_str(),
            "recency_active",
        ),
        (
            &labeled.rfm,
            RFM_SEGMENT,
            RfmSegment::Champion.as_str(),
            "rfm_champion",
        ),
        (
            &labeled.engagement,
            ENGAGEMENT_SEGMENT,
            EngagementSegment::High.as_str(),
            "engagement_high",
        ),
    ];

    for (table, column, label, name) in exports {
        let cohort = filter_segment(table, column, label)?;
        let path = save_segment_to_csv(&cohort, name, output_dir)?;
        println!("✓ Exported {} {} customers to: {}", cohort.height(), label, path.display());
    }

    Ok(())
}
