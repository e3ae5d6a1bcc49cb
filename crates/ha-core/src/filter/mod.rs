//! Pure filter engine over the canonical in-memory dataset
//!
//! Only the fixed predicate shapes the application needs are supported:
//! exact region match, set membership for district/room-type/project,
//! and inclusive date/price ranges. Active constraints combine with AND;
//! membership within one field is OR.

use ahash::AHashSet;
use chrono::NaiveDate;

use crate::model::PropertyRecord;

/// Display-unit factor: source prices are entered in 萬 (10,000 NTD),
/// records store base-unit NTD.
pub const PRICE_DISPLAY_FACTOR: f64 = 10_000.0;

/// User-chosen constraints over the canonical dataset.
///
/// Absent (`None`) or empty fields impose no constraint. Price bounds are
/// in display units (萬).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub region: Option<String>,
    pub districts: AHashSet<String>,
    pub room_types: AHashSet<String>,
    pub projects: AHashSet<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl FilterSpec {
    /// Clamp out-of-range inputs instead of rejecting them: negative
    /// price bounds become zero, a blank region becomes no constraint.
    pub fn sanitized(mut self) -> Self {
        if self.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            self.region = None;
        }
        if let Some(p) = self.min_price {
            self.min_price = Some(p.max(0.0));
        }
        if let Some(p) = self.max_price {
            self.max_price = Some(p.max(0.0));
        }
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.region.is_none()
            && self.districts.is_empty()
            && self.room_types.is_empty()
            && self.projects.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// Evaluate the spec against one record. Pure and synchronous.
    pub fn matches(&self, record: &PropertyRecord) -> bool {
        if let Some(region) = &self.region {
            if record.region != *region {
                return false;
            }
        }

        if !self.districts.is_empty() && !self.districts.contains(&record.district) {
            return false;
        }
        if !self.room_types.is_empty() && !self.room_types.contains(&record.room_type) {
            return false;
        }
        if !self.projects.is_empty() && !self.projects.contains(&record.project) {
            return false;
        }

        // A record without a transaction date never matches a date-bounded
        // query.
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = record.transaction_date else {
                return false;
            };
            if let Some(from) = self.date_from {
                if date < from {
                    return false;
                }
            }
            if let Some(to) = self.date_to {
                if date > to {
                    return false;
                }
            }
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let price = record.total_price as f64 / PRICE_DISPLAY_FACTOR;
            if let Some(min) = self.min_price {
                if price < min {
                    return false;
                }
            }
            if let Some(max) = self.max_price {
                if price > max {
                    return false;
                }
            }
        }

        true
    }
}

/// Partial update for [`FilterSpec`]: only populated fields replace the
/// current value. The double `Option` on scalar fields distinguishes
/// "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct FilterPatch {
    pub region: Option<Option<String>>,
    pub districts: Option<AHashSet<String>>,
    pub room_types: Option<AHashSet<String>>,
    pub projects: Option<AHashSet<String>>,
    pub date_from: Option<Option<NaiveDate>>,
    pub date_to: Option<Option<NaiveDate>>,
    pub min_price: Option<Option<f64>>,
    pub max_price: Option<Option<f64>>,
}

impl FilterPatch {
    /// Merge this patch into an existing spec, producing the sanitized
    /// replacement spec.
    pub fn apply_to(self, mut spec: FilterSpec) -> FilterSpec {
        if let Some(region) = self.region {
            spec.region = region;
        }
        if let Some(districts) = self.districts {
            spec.districts = districts;
        }
        if let Some(room_types) = self.room_types {
            spec.room_types = room_types;
        }
        if let Some(projects) = self.projects {
            spec.projects = projects;
        }
        if let Some(date_from) = self.date_from {
            spec.date_from = date_from;
        }
        if let Some(date_to) = self.date_to {
            spec.date_to = date_to;
        }
        if let Some(min_price) = self.min_price {
            spec.min_price = min_price;
        }
        if let Some(max_price) = self.max_price {
            spec.max_price = max_price;
        }
        spec.sanitized()
    }
}

/// Filter a collection, preserving ingestion order. Single iterative
/// pass, no deduplication.
pub fn apply<'a>(records: &'a [PropertyRecord], spec: &FilterSpec) -> Vec<&'a PropertyRecord> {
    records.iter().filter(|r| spec.matches(r)).collect()
}

/// Indices of matching records, in ingestion order.
pub fn matching_indices(records: &[PropertyRecord], spec: &FilterSpec) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| spec.matches(r))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        region: &str,
        district: &str,
        room_type: &str,
        price_wan: i64,
        date: Option<&str>,
    ) -> PropertyRecord {
        PropertyRecord {
            id: None,
            region: region.to_string(),
            region_name: region.to_string(),
            district: district.to_string(),
            project: format!("{district}-project"),
            room_type: room_type.to_string(),
            area: 20.0,
            floor_raw: String::new(),
            floor: 0,
            total_price: price_wan * 10_000,
            unit_price: 400_000,
            transaction_date: date.and_then(|d| d.parse().ok()),
            address: String::new(),
            building_type: String::new(),
            has_parking: false,
            parking_price: 0,
            land_use: String::new(),
        }
    }

    fn dataset() -> Vec<PropertyRecord> {
        vec![
            record("taipei", "信義區", "3 room(s)", 2800, Some("2024-01-15")),
            record("taipei", "大安區", "2 room(s)", 2200, Some("2024-06-30")),
            record("taoyuan", "中壢區", "3 room(s)", 980, None),
            record("taoyuan", "桃園區", "unknown", 750, Some("2025-02-13")),
            record("taichung", "西屯區", "4 room(s)", 1500, Some("2023-12-31")),
        ]
    }

    #[test]
    fn unrestricted_spec_matches_everything_in_order() {
        let data = dataset();
        let out = apply(&data, &FilterSpec::default());
        assert_eq!(out.len(), data.len());
        let districts: Vec<_> = out.iter().map(|r| r.district.as_str()).collect();
        assert_eq!(
            districts,
            ["信義區", "大安區", "中壢區", "桃園區", "西屯區"]
        );
    }

    #[test]
    fn region_is_exact_match() {
        let data = dataset();
        let spec = FilterSpec {
            region: Some("taipei".to_string()),
            ..Default::default()
        };
        assert_eq!(apply(&data, &spec).len(), 2);
    }

    #[test]
    fn disjoint_membership_sets_are_additive() {
        let data = dataset();
        let d1: AHashSet<String> = ["信義區".to_string()].into_iter().collect();
        let d2: AHashSet<String> = ["中壢區".to_string(), "西屯區".to_string()]
            .into_iter()
            .collect();
        let union: AHashSet<String> = d1.union(&d2).cloned().collect();

        let count = |districts: AHashSet<String>| {
            apply(
                &data,
                &FilterSpec {
                    districts,
                    ..Default::default()
                },
            )
            .len()
        };

        assert_eq!(count(union), count(d1) + count(d2));
    }

    #[test]
    fn extra_constraints_never_grow_the_result() {
        let data = dataset();
        let base = FilterSpec {
            room_types: ["3 room(s)".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let narrowed = FilterSpec {
            region: Some("taipei".to_string()),
            ..base.clone()
        };
        assert!(apply(&data, &narrowed).len() <= apply(&data, &base).len());
    }

    #[test]
    fn null_date_never_matches_date_bounded_query() {
        let data = dataset();
        let spec = FilterSpec {
            date_from: NaiveDate::from_ymd_opt(2020, 1, 1),
            ..Default::default()
        };
        let out = apply(&data, &spec);
        assert!(out.iter().all(|r| r.transaction_date.is_some()));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let data = dataset();
        let spec = FilterSpec {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 15),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 30),
            ..Default::default()
        };
        assert_eq!(apply(&data, &spec).len(), 2);
    }

    #[test]
    fn price_bounds_compare_in_display_units() {
        let data = dataset();
        let spec = FilterSpec {
            min_price: Some(980.0),
            max_price: Some(2200.0),
            ..Default::default()
        };
        // 980, 1500 and 2200 萬 fall inside the inclusive range.
        assert_eq!(apply(&data, &spec).len(), 3);
    }

    #[test]
    fn negative_price_bound_clamps_to_zero() {
        let spec = FilterSpec {
            min_price: Some(-50.0),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(spec.min_price, Some(0.0));
    }

    #[test]
    fn patch_merges_and_clears_individual_fields() {
        let spec = FilterSpec {
            region: Some("taipei".to_string()),
            min_price: Some(1000.0),
            ..Default::default()
        };

        let patched = FilterPatch {
            region: Some(None),
            max_price: Some(Some(3000.0)),
            ..Default::default()
        }
        .apply_to(spec);

        assert_eq!(patched.region, None);
        assert_eq!(patched.min_price, Some(1000.0));
        assert_eq!(patched.max_price, Some(3000.0));
    }

    #[test]
    fn matching_indices_agree_with_apply() {
        let data = dataset();
        let spec = FilterSpec {
            region: Some("taoyuan".to_string()),
            ..Default::default()
        };
        let idx = matching_indices(&data, &spec);
        assert_eq!(idx, vec![2, 3]);
        assert_eq!(idx.len(), apply(&data, &spec).len());
    }
}
