//! Percentiles and moments over simulated outcomes

use serde::{Deserialize, Serialize};

/// Percentile of a **sorted** slice by linear interpolation between order statistics
///
/// `rank = p / 100 * (n - 1)`. An empty slice yields zero.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let w = rank - lower as f64;
        let (lo, hi) = (sorted[lower], sorted[upper]);
        (lo + (hi - lo) * w).clamp(lo, hi)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero for fewer than two values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Percentile band with mean and standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl DistributionSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            p10: percentile_sorted(&sorted, 10.0),
            p50: percentile_sorted(&sorted, 50.0),
            p90: percentile_sorted(&sorted, 90.0),
            mean: mean(values),
            std_dev: std_dev(values),
        }
    }
}

/// Cross-path statistics of the simulated rate for one month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateMonthStats {
    /// 1-indexed month since origination
    pub month: u32,
    pub mean: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
}

impl RateMonthStats {
    pub fn from_values(month: u32, values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            month,
            mean: mean(values),
            p10: percentile_sorted(&sorted, 10.0),
            p50: percentile_sorted(&sorted, 50.0),
            p90: percentile_sorted(&sorted, 90.0),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_percentile_interpolates_between_points() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 30.0);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 10.0), 14.0, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 90.0), 46.0, epsilon = 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
        assert_eq!(percentile_sorted(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn test_summary_moments() {
        let s = DistributionSummary::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_abs_diff_eq!(s.mean, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.std_dev, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rate_month_stats() {
        let s = RateMonthStats::from_values(3, &[0.05, 0.03, 0.04]);
        assert_eq!(s.month, 3);
        assert_eq!(s.min, 0.03);
        assert_eq!(s.max, 0.05);
        assert_eq!(s.p50, 0.04);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_percentiles_are_ordered(values in proptest::collection::vec(-1e7f64..1e7, 1..300)) {
            let s = DistributionSummary::from_values(&values);
            prop_assert!(s.p10 <= s.p50);
            prop_assert!(s.p50 <= s.p90);
            prop_assert!(s.std_dev >= 0.0);
        }
    }
}
