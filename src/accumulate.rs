//! Grouped price accumulators.
//!
//! Two flavours exist: [`GroupedAccumulator`] keeps only `(count, sum)` per
//! key and is enough for dimensions that report an average, while
//! [`DistributionAccumulator`] retains every value so it can also report a
//! median. Both merge associatively so partitions can be combined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coerce::round_to;
use crate::features::{AreaSegment, DerivedFeatures, FloorSegment, Half, Quarter, RebuildClass};
use crate::record::Record;

/// Raw prices are recorded in 만원; the display unit is 억 (10,000 만원).
pub const DISPLAY_PRICE_UNIT: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountSum {
    count: u64,
    sum: f64,
}

impl CountSum {
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn merge(&mut self, other: &CountSum) {
        self.count += other.count;
        self.sum += other.sum;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Average in `unit`s, rounded to two decimals; `None` when empty.
    pub fn average(&self, unit: f64) -> Option<f64> {
        (self.count > 0).then(|| round_to(self.sum / self.count as f64 / unit, 2))
    }
}

/// Finalized view of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    pub count: u64,
    pub avg: Option<f64>,
    pub median: Option<f64>,
}

impl GroupStat {
    pub fn avg_or_zero(&self) -> f64 {
        self.avg.unwrap_or(0.0)
    }

    pub fn median_or_zero(&self) -> f64 {
        self.median.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAccumulator<K: Ord> {
    groups: BTreeMap<K, CountSum>,
}

impl<K: Ord> Default for GroupedAccumulator<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> GroupedAccumulator<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, key: K, value: f64) {
        self.groups.entry(key).or_default().observe(value);
    }

    pub fn merge(&mut self, other: &GroupedAccumulator<K>) {
        for (key, partial) in &other.groups {
            self.groups.entry(key.clone()).or_default().merge(partial);
        }
    }

    pub fn get(&self, key: &K) -> Option<&CountSum> {
        self.groups.get(key)
    }

    pub fn finalize(&self, key: &K, unit: f64) -> GroupStat {
        let totals = self.groups.get(key).copied().unwrap_or_default();
        GroupStat {
            count: totals.count(),
            avg: totals.average(unit),
            median: None,
        }
    }

    /// Finalized groups in ascending key order.
    pub fn finalize_all(&self, unit: f64) -> Vec<(K, GroupStat)> {
        self.groups
            .keys()
            .map(|key| (key.clone(), self.finalize(key, unit)))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.keys()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.groups.values().map(CountSum::count).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionAccumulator<K: Ord> {
    groups: BTreeMap<K, Vec<f64>>,
}

impl<K: Ord> Default for DistributionAccumulator<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> DistributionAccumulator<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, key: K, value: f64) {
        self.groups.entry(key).or_default().push(value);
    }

    pub fn merge(&mut self, other: &DistributionAccumulator<K>) {
        for (key, values) in &other.groups {
            self.groups
                .entry(key.clone())
                .or_default()
                .extend_from_slice(values);
        }
    }

    pub fn finalize(&self, key: &K, unit: f64) -> GroupStat {
        let values = self.groups.get(key).map(Vec::as_slice).unwrap_or_default();
        GroupStat {
            count: values.len() as u64,
            avg: mean(values).map(|avg| round_to(avg / unit, 2)),
            median: median(values).map(|median| round_to(median / unit, 2)),
        }
    }

    pub fn finalize_all(&self, unit: f64) -> Vec<(K, GroupStat)> {
        self.groups
            .keys()
            .map(|key| (key.clone(), self.finalize(key, unit)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; even-length inputs average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Every grouping dimension fed by a single priced record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceAggregates {
    pub yearly: GroupedAccumulator<String>,
    pub monthly: GroupedAccumulator<String>,
    pub district: GroupedAccumulator<String>,
    pub year_district: GroupedAccumulator<(String, String)>,
    pub by_month: DistributionAccumulator<u32>,
    pub by_quarter: GroupedAccumulator<Quarter>,
    pub by_half: GroupedAccumulator<Half>,
    pub by_age_bin: DistributionAccumulator<i64>,
    pub rebuild: GroupedAccumulator<RebuildClass>,
    pub floor_segment: GroupedAccumulator<FloorSegment>,
    pub area_segment: GroupedAccumulator<AreaSegment>,
}

impl PriceAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &Record, features: &DerivedFeatures, price: f64) {
        self.district.observe(record.district.clone(), price);

        if let Some(period) = record.contract {
            let year = period.year_key();
            self.year_district
                .observe((year.clone(), record.district.clone()), price);
            self.yearly.observe(year, price);
            if let Some(month_key) = period.month_key() {
                self.monthly.observe(month_key, price);
            }
            if let Some(month) = period.month {
                self.by_month.observe(month, price);
            }
        }

        if let Some(quarter) = features.quarter {
            self.by_quarter.observe(quarter, price);
        }
        if let Some(half) = features.half {
            self.by_half.observe(half, price);
        }
        if let Some(bin) = features.age_bin {
            self.by_age_bin.observe(bin, price);
        }
        if let Some(class) = features.rebuild {
            self.rebuild.observe(class, price);
        }
        if let Some(segment) = features.floor_segment {
            self.floor_segment.observe(segment, price);
        }
        if let Some(segment) = features.area_segment {
            self.area_segment.observe(segment, price);
        }
    }

    pub fn merge(&mut self, other: &PriceAggregates) {
        self.yearly.merge(&other.yearly);
        self.monthly.merge(&other.monthly);
        self.district.merge(&other.district);
        self.year_district.merge(&other.year_district);
        self.by_month.merge(&other.by_month);
        self.by_quarter.merge(&other.by_quarter);
        self.by_half.merge(&other.by_half);
        self.by_age_bin.merge(&other.by_age_bin);
        self.rebuild.merge(&other.rebuild);
        self.floor_segment.merge(&other.floor_segment);
        self.area_segment.merge(&other.area_segment);
    }
}
