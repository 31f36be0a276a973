//! Per-class pixel counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel counts per land-cover class code.
///
/// Counts are the source of truth; fractions are derived on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassHistogram {
    counts: BTreeMap<u16, u64>,
}

impl ClassHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one pixel of `class`.
    pub fn record(&mut self, class: u16) {
        self.add(class, 1);
    }

    /// Count `n` pixels of `class`.
    pub fn add(&mut self, class: u16, n: u64) {
        if n > 0 {
            *self.counts.entry(class).or_insert(0) += n;
        }
    }

    /// Number of pixels counted for `class`.
    pub fn count(&self, class: u16) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    /// Total pixels counted.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Class codes in ascending order with their counts.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }

    /// Share of each class in the total, rounded to 4 decimal places.
    pub fn fractions(&self) -> BTreeMap<u16, f64> {
        let total = self.total();
        if total == 0 {
            return BTreeMap::new();
        }
        self.counts
            .iter()
            .map(|(class, count)| {
                let share = *count as f64 / total as f64;
                (*class, (share * 10_000.0).round() / 10_000.0)
            })
            .collect()
    }
}

impl FromIterator<u16> for ClassHistogram {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut histogram = ClassHistogram::new();
        for class in iter {
            histogram.record(class);
        }
        histogram
    }
}
