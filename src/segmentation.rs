//! Rule-based customer segmentation: recency, RFM and engagement classifiers
//!
//! Every classifier takes a customer table and returns a new table with the
//! derived columns appended. The input frame is never modified.

use std::fmt;

use chrono::{Local, NaiveDate};
use polars::prelude::*;
use tracing::debug;

use crate::data::{count_column, date_column, float_column};
use crate::error::SegmentError;

pub const DAYS_SINCE_LAST_PURCHASE: &str = "days_since_last_purchase";
pub const RECENCY_SEGMENT: &str = "recency_segment";
pub const RFM_RECENCY: &str = "rfm_recency";
pub const RFM_SCORE: &str = "rfm_score";
pub const RFM_SEGMENT: &str = "rfm_segment";
pub const ENGAGEMENT_SCORE: &str = "engagement_score";
pub const ENGAGEMENT_SEGMENT: &str = "engagement_segment";

/// Recency bucket by days since last purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecencySegment {
    Active,
    AtRisk,
    Inactive,
}

impl RecencySegment {
    /// A negative `days` (purchase dated in the future) falls under `Active`.
    pub fn classify(days: i64, days_active: f64, days_risk: f64) -> Self {
        let days = days as f64;
        if days <= days_active {
            RecencySegment::Active
        } else if days <= days_risk {
            RecencySegment::AtRisk
        } else {
            RecencySegment::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecencySegment::Active => "Active",
            RecencySegment::AtRisk => "AtRisk",
            RecencySegment::Inactive => "Inactive",
        }
    }
}

/// Named RFM cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RfmSegment {
    Champion,
    Potential,
    AtRisk,
}

impl RfmSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfmSegment::Champion => "Champion",
            RfmSegment::Potential => "Potential",
            RfmSegment::AtRisk => "AtRisk",
        }
    }
}

/// The three binary RFM signals for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RfmScore {
    pub recency: bool,
    pub frequency: bool,
    pub monetary: bool,
}

impl RfmScore {
    pub fn compute(
        days_since_last_purchase: i64,
        purchase_count: f64,
        total_spend: f64,
        recency_threshold: f64,
        frequency_threshold: f64,
        monetary_threshold: f64,
    ) -> Self {
        RfmScore {
            recency: days_since_last_purchase as f64 <= recency_threshold,
            frequency: purchase_count >= frequency_threshold,
            monetary: total_spend >= monetary_threshold,
        }
    }

    /// Three-character code in R, F, M order, e.g. `"101"`.
    pub fn code(&self) -> String {
        format!(
            "{}{}{}",
            u8::from(self.recency),
            u8::from(self.frequency),
            u8::from(self.monetary)
        )
    }

    /// Exactly `111` is a champion and exactly two signals is potential.
    /// One signal and no signal both land in `AtRisk`.
    pub fn segment(&self) -> RfmSegment {
        match (self.recency, self.frequency, self.monetary) {
            (true, true, true) => RfmSegment::Champion,
            (true, true, false) | (true, false, true) | (false, true, true) => {
                RfmSegment::Potential
            }
            (true, false, false)
            | (false, true, false)
            | (false, false, true)
            | (false, false, false) => {
                RfmSegment::AtRisk
            }
        }
    }
}

#[cfg(test)]
impl std::str::FromStr for RfmScore {
    type Err = SegmentError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let bits: Vec<bool> = code
            .chars()
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                _ => Err(()),
            })
            .collect::<Result<_, _>>()
            .map_err(|_| SegmentError::InvalidArgument(format!("invalid RFM score '{code}'")))?;

        match bits.as_slice() {
            [r, f, m] => Ok(RfmScore {
                recency: *r,
                frequency: *f,
                monetary: *m,
            }),
            _ => Err(SegmentError::InvalidArgument(format!(
                "RFM score must have exactly 3 digits, got '{code}'"
            ))),
        }
    }
}

/// Engagement bucket by combined activity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngagementSegment {
    High,
    Medium,
    Low,
}

impl EngagementSegment {
    /// `Low` is whatever falls below `medium`; there is no lower gate.
    pub fn classify(score: i64, high: f64, medium: f64) -> Self {
        let score = score as f64;
        if score >= high {
            EngagementSegment::High
        } else if score >= medium {
            EngagementSegment::Medium
        } else {
            EngagementSegment::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementSegment::High => "High",
            EngagementSegment::Medium => "Medium",
            EngagementSegment::Low => "Low",
        }
    }
}

macro_rules! impl_display_via_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display_via_as_str!(RecencySegment, RfmSegment, EngagementSegment);

/// Label customers Active / AtRisk / Inactive by days since last purchase.
///
/// Adds `days_since_last_purchase` and `recency_segment`. Today's date is
/// read once per call.
pub fn classify_recency(
    df: &DataFrame,
    days_active: f64,
    days_risk: f64,
) -> crate::Result<DataFrame> {
    classify_recency_at(df, days_active, days_risk, Local::now().date_naive())
}

/// [`classify_recency`] against a fixed reference date.
pub fn classify_recency_at(
    df: &DataFrame,
    days_active: f64,
    days_risk: f64,
    today: NaiveDate,
) -> crate::Result<DataFrame> {
    let days = days_since_last_purchase(df, today)?;
    let segments: Vec<&str> = days
        .iter()
        .map(|&d| RecencySegment::classify(d, days_active, days_risk).as_str())
        .collect();

    debug!(rows = days.len(), days_active, days_risk, "recency segmentation");

    let mut out = df.clone();
    out.with_column(Series::new(DAYS_SINCE_LAST_PURCHASE, days))?;
    out.with_column(Series::new(RECENCY_SEGMENT, segments))?;
    Ok(out)
}

/// Score customers on Recency, Frequency and Monetary flags and map the score to a segment.
///
/// Adds `rfm_recency`, `R`, `F`, `M`, `rfm_score` and `rfm_segment`.
pub fn classify_rfm(
    df: &DataFrame,
    recency_threshold: f64,
    frequency_threshold: f64,
    monetary_threshold: f64,
) -> crate::Result<DataFrame> {
    classify_rfm_at(
        df,
        recency_threshold,
        frequency_threshold,
        monetary_threshold,
        Local::now().date_naive(),
    )
}

/// [`classify_rfm`] against a fixed reference date.
pub fn classify_rfm_at(
    df: &DataFrame,
    recency_threshold: f64,
    frequency_threshold: f64,
    monetary_threshold: f64,
    today: NaiveDate,
) -> crate::Result<DataFrame> {
    let days = days_since_last_purchase(df, today)?;
    let purchase_count = float_column(df, "purchase_count")?;
    let total_spend = float_column(df, "total_spend")?;

    let scores: Vec<RfmScore> = days
        .iter()
        .zip(purchase_count.iter().zip(total_spend.iter()))
        .map(|(&d, (&count, &spend))| {
            RfmScore::compute(
                d,
                count,
                spend,
                recency_threshold,
                frequency_threshold,
                monetary_threshold,
            )
        })
        .collect();

    let r: Vec<i32> = scores.iter().map(|s| i32::from(s.recency)).collect();
    let f: Vec<i32> = scores.iter().map(|s| i32::from(s.frequency)).collect();
    let m: Vec<i32> = scores.iter().map(|s| i32::from(s.monetary)).collect();
    let codes: Vec<String> = scores.iter().map(RfmScore::code).collect();
    let segments: Vec<&str> = scores.iter().map(|s| s.segment().as_str()).collect();

    debug!(
        rows = scores.len(),
        recency_threshold,
        frequency_threshold,
        monetary_threshold,
        "rfm segmentation"
    );

    let mut out = df.clone();
    out.with_column(Series::new(RFM_RECENCY, days))?;
    out.with_column(Series::new("R", r))?;
    out.with_column(Series::new("F", f))?;
    out.with_column(Series::new("M", m))?;
    out.with_column(Series::new(RFM_SCORE, codes))?;
    out.with_column(Series::new(RFM_SEGMENT, segments))?;
    Ok(out)
}

/// Sum email opens and logins into a score and bucket it High / Medium / Low.
///
/// `low` is accepted for symmetry with the configuration but does not gate
/// any bucket. Adds `engagement_score` and `engagement_segment`.
pub fn classify_engagement(
    df: &DataFrame,
    high: f64,
    medium: f64,
    low: f64,
) -> crate::Result<DataFrame> {
    let opens = count_column(df, "email_opens_30d")?;
    let logins = count_column(df, "logins_30d")?;

    let scores: Vec<i64> = opens
        .iter()
        .zip(logins.iter())
        .enumerate()
        .map(|(row, (o, l))| {
            o.checked_add(*l).ok_or_else(|| {
                SegmentError::invalid_value(
                    ENGAGEMENT_SCORE,
                    row,
                    "email_opens_30d + logins_30d overflows a 64-bit integer",
                )
            })
        })
        .collect::<crate::Result<_>>()?;
    let segments: Vec<&str> = scores
        .iter()
        .map(|&s| EngagementSegment::classify(s, high, medium).as_str())
        .collect();

    debug!(rows = scores.len(), high, medium, low, "engagement segmentation");

    let mut out = df.clone();
    out.with_column(Series::new(ENGAGEMENT_SCORE, scores))?;
    out.with_column(Series::new(ENGAGEMENT_SEGMENT, segments))?;
    Ok(out)
}

fn days_since_last_purchase(df: &DataFrame, today: NaiveDate) -> crate::Result<Vec<i64>> {
    Ok(date_column(df, "last_purchase_date")?
        .into_iter()
        .map(|date| (today - date).num_days())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (today() - chrono::Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn create_test_customers() -> DataFrame {
        let dates: Vec<String> = [0, 30, 31, 90, 91, -5].iter().map(|&d| days_ago(d)).collect();
        df!(
            "customer_id" => &["C1", "C2", "C3", "C4", "C5", "C6"],
            "last_purchase_date" => dates,
            "purchase_count" => &[5i64, 4, 10, 1, 0, 6],
            "total_spend" => &[1000.0, 999.99, 5000.0, 20.0, 0.0, 1200.0],
            "email_opens_30d" => &[10i64, 2, 9, 0, 15, 3],
            "logins_30d" => &[6i64, 1, 6, 0, 0, 3]
        )
        .unwrap()
    }

    fn str_values(df: &DataFrame, column: &str) -> Vec<String> {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect()
    }

    fn i64_values(df: &DataFrame, column: &str) -> Vec<i64> {
        df.column(column)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_recency_classify_boundaries() {
        assert_eq!(RecencySegment::classify(30, 30.0, 90.0), RecencySegment::Active);
        assert_eq!(RecencySegment::classify(31, 30.0, 90.0), RecencySegment::AtRisk);
        assert_eq!(RecencySegment::classify(90, 30.0, 90.0), RecencySegment::AtRisk);
        assert_eq!(RecencySegment::classify(91, 30.0, 90.0), RecencySegment::Inactive);
        assert_eq!(RecencySegment::classify(-3, 30.0, 90.0), RecencySegment::Active);
    }

    #[test]
    fn test_recency_inverted_thresholds_are_permissive() {
        // days_active >= days_risk leaves no AtRisk band
        assert_eq!(RecencySegment::classify(50, 60.0, 40.0), RecencySegment::Active);
        assert_eq!(RecencySegment::classify(61, 60.0, 40.0), RecencySegment::Inactive);
    }

    #[test]
    fn test_classify_recency_at() {
        let df = create_test_customers();
        let out = classify_recency_at(&df, 30.0, 90.0, today()).unwrap();

        assert_eq!(i64_values(&out, DAYS_SINCE_LAST_PURCHASE), vec![0, 30, 31, 90, 91, -5]);
        assert_eq!(
            str_values(&out, RECENCY_SEGMENT),
            vec!["Active", "Active", "AtRisk", "AtRisk", "Inactive", "Active"]
        );
    }

    #[test]
    fn test_rfm_all_eight_combinations() {
        let expected = [
            ("111", RfmSegment::Champion),
            ("110", RfmSegment::Potential),
            ("101", RfmSegment::Potential),
            ("011", RfmSegment::Potential),
            ("100", RfmSegment::AtRisk),
            ("010", RfmSegment::AtRisk),
            ("001", RfmSegment::AtRisk),
            ("000", RfmSegment::AtRisk),
        ];

        for (code, segment) in expected {
            let score: RfmScore = code.parse().unwrap();
            assert_eq!(score.code(), code);
            assert_eq!(score.segment(), segment, "score {}", code);
        }
    }

    #[test]
    fn test_rfm_score_parse_rejects_bad_codes() {
        assert!("11".parse::<RfmScore>().is_err());
        assert!("1101".parse::<RfmScore>().is_err());
        assert!("1a1".parse::<RfmScore>().is_err());
    }

    #[test]
    fn test_rfm_champion_at_default_thresholds() {
        let score = RfmScore::compute(10, 5.0, 1000.0, 30.0, 5.0, 1000.0);
        assert_eq!(score.code(), "111");
        assert_eq!(score.segment(), RfmSegment::Champion);
    }

    #[test]
    fn test_classify_rfm_at() {
        let df = create_test_customers();
        let out = classify_rfm_at(&df, 30.0, 5.0, 1000.0, today()).unwrap();

        assert_eq!(
            str_values(&out, RFM_SCORE),
            vec!["111", "100", "011", "000", "000", "111"]
        );
        assert_eq!(
            str_values(&out, RFM_SEGMENT),
            vec!["Champion", "AtRisk", "Potential", "AtRisk", "AtRisk", "Champion"]
        );
        let r: Vec<i32> = out.column("R").unwrap().i32().unwrap().into_no_null_iter().collect();
        assert_eq!(r, vec![1, 1, 0, 0, 0, 1]);
        assert_eq!(i64_values(&out, RFM_RECENCY), vec![0, 30, 31, 90, 91, -5]);
    }

    #[test]
    fn test_engagement_classify_boundaries() {
        assert_eq!(EngagementSegment::classify(15, 15.0, 6.0), EngagementSegment::High);
        assert_eq!(EngagementSegment::classify(14, 15.0, 6.0), EngagementSegment::Medium);
        assert_eq!(EngagementSegment::classify(6, 15.0, 6.0), EngagementSegment::Medium);
        assert_eq!(EngagementSegment::classify(5, 15.0, 6.0), EngagementSegment::Low);
    }

    #[test]
    fn test_classify_engagement() {
        let df = create_test_customers();
        let out = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();

        assert_eq!(i64_values(&out, ENGAGEMENT_SCORE), vec![16, 3, 15, 0, 15, 6]);
        assert_eq!(
            str_values(&out, ENGAGEMENT_SEGMENT),
            vec!["High", "Low", "High", "Low", "High", "Medium"]
        );
    }

    #[test]
    fn test_engagement_ignores_low_threshold() {
        let df = create_test_customers();
        let baseline = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();

        for low in [-100.0, 3.0, 10.0, 1000.0] {
            let out = classify_engagement(&df, 15.0, 6.0, low).unwrap();
            assert_eq!(
                str_values(&out, ENGAGEMENT_SEGMENT),
                str_values(&baseline, ENGAGEMENT_SEGMENT)
            );
        }
    }

    #[test]
    fn test_classifiers_do_not_mutate_input() {
        let df = create_test_customers();
        let snapshot = df.clone();

        let recency = classify_recency_at(&df, 30.0, 90.0, today()).unwrap();
        let rfm = classify_rfm_at(&df, 30.0, 5.0, 1000.0, today()).unwrap();
        let engagement = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();

        assert!(df.equals(&snapshot));
        assert_eq!(df.width(), 6);
        assert_eq!(recency.width(), 8);
        assert_eq!(rfm.width(), 12);
        assert_eq!(engagement.width(), 8);
    }

    #[test]
    fn test_classifiers_are_idempotent() {
        let df = create_test_customers();

        let first = classify_recency_at(&df, 30.0, 90.0, today()).unwrap();
        let second = classify_recency_at(&df, 30.0, 90.0, today()).unwrap();
        assert!(first.equals(&second));

        let first = classify_rfm_at(&df, 30.0, 5.0, 1000.0, today()).unwrap();
        let second = classify_rfm_at(&df, 30.0, 5.0, 1000.0, today()).unwrap();
        assert!(first.equals(&second));

        let first = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();
        let second = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_engagement_score_is_exact_for_large_counters() {
        let df = df!(
            "email_opens_30d" => &[9_007_199_254_740_993i64],
            "logins_30d" => &[0i64]
        )
        .unwrap();

        let out = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();
        assert_eq!(i64_values(&out, ENGAGEMENT_SCORE), vec![9_007_199_254_740_993]);
    }

    #[test]
    fn test_engagement_score_overflow_is_an_error() {
        let df = df!(
            "email_opens_30d" => &[1i64, i64::MAX],
            "logins_30d" => &[1i64, 1]
        )
        .unwrap();

        let err = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            SegmentError::InvalidValue { ref column, row: 1, .. } if column == ENGAGEMENT_SCORE
        ));
    }

    #[test]
    fn test_empty_table_yields_empty_labels() {
        let df = create_test_customers().head(Some(0));
        assert_eq!(df.height(), 0);

        let out = classify_recency_at(&df, 30.0, 90.0, today()).unwrap();
        assert_eq!(out.height(), 0);
        assert!(out.get_column_index(RECENCY_SEGMENT).is_some());

        let out = classify_rfm_at(&df, 30.0, 5.0, 1000.0, today()).unwrap();
        assert_eq!(out.height(), 0);

        let out = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_missing_column_propagates() {
        let df = create_test_customers().drop("logins_30d").unwrap();
        let err = classify_engagement(&df, 15.0, 6.0, 0.0).unwrap_err();
        assert!(matches!(err, SegmentError::MissingColumns(ref cols) if cols == &["logins_30d"]));
    }

    #[test]
    fn test_unparseable_date_propagates() {
        let df = df!(
            "last_purchase_date" => &["2024-01-01", "soon"]
        )
        .unwrap();
        let err = classify_recency_at(&df, 30.0, 90.0, today()).unwrap_err();
        assert!(err.is_schema_error());
    }
}
