//! Equal-width histograms and distribution shape.

use serde::{Deserialize, Serialize};

use crate::accumulate::DISPLAY_PRICE_UNIT;
use crate::coerce::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

/// Sparse equal-width histogram over `[min, max]`.
///
/// Bin edges are rounded to two decimals. When every value is identical the
/// histogram collapses into a single zero-width bin at that value.
pub fn build_histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let step = (hi - lo) / bins as f64;

    if step == 0.0 {
        return vec![HistogramBin {
            start: lo,
            end: lo,
            count: values.len() as u64,
        }];
    }

    let mut counts = vec![0u64; bins];
    for value in values {
        let idx = (((value - lo) / step).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .filter(|(_, count)| *count > 0)
        .map(|(idx, count)| HistogramBin {
            start: round_to(lo + idx as f64 * step, 2),
            end: round_to(lo + (idx + 1) as f64 * step, 2),
            count,
        })
        .collect()
}

/// Population skewness `mean((v - μ)^3) / σ^3`, rounded to two decimals.
/// Empty or zero-variance input yields 0.
pub fn skewness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    let third_moment = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    round_to(third_moment / std_dev.powi(3), 2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledBin {
    pub bin: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDistribution {
    pub raw: Vec<LabeledBin>,
    pub log: Vec<LabeledBin>,
    pub raw_skew: f64,
    pub log_skew: f64,
}

impl PriceDistribution {
    /// The raw histogram is drawn from prices capped at `raw_cap` so a few
    /// extreme sales do not flatten every other bin. Both skewness values and
    /// the log histogram use uncapped prices.
    pub fn from_prices(prices: &[f64], bins: usize, raw_cap: f64) -> Self {
        if prices.is_empty() {
            return Self::default();
        }

        let capped: Vec<f64> = prices.iter().map(|p| p.min(raw_cap)).collect();
        let logged: Vec<f64> = prices.iter().map(|p| p.ln_1p()).collect();

        let raw = build_histogram(&capped, bins)
            .into_iter()
            .map(|bin| LabeledBin {
                bin: raw_label(&bin),
                count: bin.count,
            })
            .collect();
        let log = build_histogram(&logged, bins)
            .into_iter()
            .map(|bin| LabeledBin {
                bin: format!("{:.1}~{:.1}", bin.start, bin.end),
                count: bin.count,
            })
            .collect();

        Self {
            raw,
            log,
            raw_skew: skewness(prices),
            log_skew: skewness(&logged),
        }
    }
}

fn raw_label(bin: &HistogramBin) -> String {
    let start = (bin.start / DISPLAY_PRICE_UNIT).trunc() as i64;
    let end = (bin.end / DISPLAY_PRICE_UNIT).trunc() as i64;
    format!("{start}~{end}억")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sum_to_input_size() {
        let values: Vec<f64> = (0..1_000).map(|i| (i * i % 997) as f64).collect();
        let hist = build_histogram(&values, 40);
        let total: u64 = hist.iter().map(|b| b.count).sum();
        assert_eq!(total, 1_000);
        assert!(hist.len() <= 40);
    }

    #[test]
    fn maximum_lands_in_last_bin() {
        let hist = build_histogram(&[0.0, 5.0, 10.0], 2);
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].count, 1);
        assert_eq!(hist[1].count, 2);
        assert_eq!(hist[1].end, 10.0);
    }

    #[test]
    fn only_non_empty_bins_are_emitted() {
        let hist = build_histogram(&[0.0, 0.1, 10.0], 10);
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].start, 0.0);
        assert_eq!(hist[0].count, 2);
        assert_eq!(hist[1].start, 9.0);
    }

    #[test]
    fn identical_values_collapse_into_one_bin() {
        let hist = build_histogram(&[7.0, 7.0, 7.0], 40);
        assert_eq!(
            hist,
            vec![HistogramBin {
                start: 7.0,
                end: 7.0,
                count: 3
            }]
        );
        assert_eq!(skewness(&[7.0, 7.0, 7.0]), 0.0);
    }

    #[test]
    fn empty_input_is_a_sentinel() {
        assert!(build_histogram(&[], 40).is_empty());
        assert_eq!(skewness(&[]), 0.0);
        assert_eq!(
            PriceDistribution::from_prices(&[], 40, 500_000.0),
            PriceDistribution::default()
        );
    }

    #[test]
    fn skewness_sign_follows_tail() {
        assert_eq!(skewness(&[1.0, 2.0, 3.0]), 0.0);
        assert!(skewness(&[1.0, 1.0, 1.0, 10.0]) > 0.0);
        assert!(skewness(&[1.0, 10.0, 10.0, 10.0]) < 0.0);
    }

    #[test]
    fn raw_histogram_is_capped_but_skew_is_not() {
        let prices = [50_000.0, 60_000.0, 70_000.0, 2_000_000.0];
        let dist = PriceDistribution::from_prices(&prices, 4, 500_000.0);

        assert_eq!(dist.raw.iter().map(|b| b.count).sum::<u64>(), 4);
        assert_eq!(dist.log.iter().map(|b| b.count).sum::<u64>(), 4);
        assert_eq!(dist.raw.last().map(|b| b.bin.as_str()), Some("38~50억"));
        assert_eq!(dist.raw_skew, skewness(&prices));
        assert!(dist.raw_skew > 1.0);
    }

    #[test]
    fn log_labels_use_one_decimal() {
        let dist = PriceDistribution::from_prices(&[10_000.0, 100_000.0], 2, 500_000.0);
        assert_eq!(dist.log.len(), 2);
        assert!(dist.log[0].bin.starts_with("9.2~"));
        assert!(dist.log[1].bin.ends_with("~11.5"));
    }
}
