//! Aggregate summaries over a filtered record set

use crate::filter::PRICE_DISPLAY_FACTOR;
use crate::model::PropertyRecord;

/// Tuning knobs for statistics computation.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Largest valid-record count for which the area median is computed
    /// exactly (sorting is acceptable below this size). Above it the mean
    /// substitutes for the median. A latency/accuracy policy choice, so
    /// it stays configurable.
    pub exact_median_limit: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            exact_median_limit: 50_000,
        }
    }
}

/// Derived numeric summaries, recomputed on every filter change.
///
/// Averages cover only records with positive price and area figures;
/// price averages are reported in display units (萬).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    /// Records in the filtered set, valid or not.
    pub count: usize,
    /// Records contributing to the averages.
    pub valid_count: usize,
    /// Mean total price, display units.
    pub avg_total_price: f64,
    /// Mean unit price, display units per ping.
    pub avg_unit_price: f64,
    /// Mean floor area, ping.
    pub avg_area: f64,
    /// Median floor area, ping. Exact below the configured limit;
    /// otherwise the mean substitutes and the flag below is set.
    pub median_area: f64,
    pub median_is_approximate: bool,
}

/// Compute summaries in a single pass. Only the sub-limit exact median
/// sorts; everything else is an iterative reduction.
pub fn compute<'a, I>(records: I, cfg: &StatsConfig) -> Statistics
where
    I: IntoIterator<Item = &'a PropertyRecord>,
{
    let mut count = 0usize;
    let mut valid = 0usize;
    let mut sum_total = 0.0f64;
    let mut sum_unit = 0.0f64;
    let mut sum_area = 0.0f64;
    let mut areas: Vec<f64> = Vec::new();
    let mut over_limit = false;

    for record in records {
        count += 1;
        if !record.has_valid_figures() {
            continue;
        }
        valid += 1;
        sum_total += record.total_price as f64;
        sum_unit += record.unit_price as f64;
        sum_area += record.area;

        if !over_limit {
            areas.push(record.area);
            if areas.len() > cfg.exact_median_limit {
                // Too many for an exact median; stop buffering.
                areas = Vec::new();
                over_limit = true;
            }
        }
    }

    if valid == 0 {
        return Statistics {
            count,
            ..Default::default()
        };
    }

    let avg_area = sum_area / valid as f64;
    let (median_area, median_is_approximate) = if over_limit {
        (avg_area, true)
    } else {
        (exact_median(&mut areas), false)
    };

    Statistics {
        count,
        valid_count: valid,
        avg_total_price: sum_total / valid as f64 / PRICE_DISPLAY_FACTOR,
        avg_unit_price: sum_unit / valid as f64 / PRICE_DISPLAY_FACTOR,
        avg_area,
        median_area,
        median_is_approximate,
    }
}

fn exact_median(values: &mut [f64]) -> f64 {
    debug_assert!(!values.is_empty());
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
