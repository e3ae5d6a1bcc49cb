//! Field normalizer: one raw shard row → one canonical record, or a drop
//!
//! Shard rows use the source schema's field names (an external contract,
//! so the keys stay verbatim). Numeric fields may arrive as JSON numbers
//! or strings; both parse. A row that cannot be normalized is dropped and
//! logged, never an error.

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use ha_core::model::{PropertyRecord, Region};

/// Accepted transaction years. The bound ships with the upstream data
/// contract; its intent (sanity check vs. business rule) is undocumented,
/// so it is preserved literally and overridable via [`NormalizerConfig`].
pub const ACCEPTED_YEARS: RangeInclusive<i32> = 2020..=2030;

/// Source field names, tried in order; the first positive parseable value
/// wins.
const AREA_FIELDS: [&str; 5] = ["面積(坪)", "總面積_坪", "總面積(坪)", "面積", "建物面積"];

const FIELD_TOTAL_PRICE: &str = "總價(萬)";
const FIELD_UNIT_PRICE: &str = "單價(萬/坪)";
const FIELD_ROOM_TYPE: &str = "房型";
const FIELD_DATE: &str = "交易年月日";
const FIELD_DISTRICT: &str = "區域";
const FIELD_PROJECT: &str = "建案名稱";
const FIELD_FLOOR: &str = "樓層";
const FIELD_ADDRESS: &str = "建物門牌";
const FIELD_BUILDING_TYPE: &str = "建物型態";
const FIELD_PARKING: &str = "車位";
const FIELD_PARKING_PRICE: &str = "車位總價";
const FIELD_LAND_USE: &str = "土地使用分區";

/// Source prices are in 萬 (10,000 NTD).
const WAN: f64 = 10_000.0;

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Years outside this range make a transaction date unparseable.
    pub year_range: RangeInclusive<i32>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            year_range: ACCEPTED_YEARS,
        }
    }
}

/// Normalize one raw row. Returns `None` (a drop, not an error) when the
/// row is not an object; individual unusable fields degrade to their
/// documented defaults instead of dropping the row.
pub fn normalize_row(
    raw: &Value,
    region: &Region,
    index: usize,
    cfg: &NormalizerConfig,
) -> Option<PropertyRecord> {
    let Some(row) = raw.as_object() else {
        debug!(region = region.code, index, "dropping non-object row");
        return None;
    };

    let area = AREA_FIELDS
        .iter()
        .find_map(|field| number_field(row, field).filter(|v| *v > 0.0))
        .unwrap_or(0.0);

    let total_price = to_base_unit(number_field(row, FIELD_TOTAL_PRICE));
    let mut unit_price = to_base_unit(number_field(row, FIELD_UNIT_PRICE));
    if unit_price == 0 && total_price > 0 && area > 0.0 {
        // Derive the per-ping price when the source omitted it.
        unit_price = (total_price as f64 / area).round() as i64;
    }

    let parking_price = to_base_unit(number_field(row, FIELD_PARKING_PRICE));
    let has_parking = parking_flag(row.get(FIELD_PARKING)) || parking_price > 0;

    let floor_raw = text_field(row, FIELD_FLOOR).unwrap_or_default();

    Some(PropertyRecord {
        id: None,
        region: region.code.to_string(),
        region_name: region.name.to_string(),
        district: text_field(row, FIELD_DISTRICT).unwrap_or_else(|| "unknown".to_string()),
        project: text_field(row, FIELD_PROJECT).unwrap_or_else(|| "unknown".to_string()),
        room_type: normalize_room_type(row.get(FIELD_ROOM_TYPE)),
        area,
        floor: parse_floor(&floor_raw),
        floor_raw,
        total_price,
        unit_price,
        transaction_date: normalize_date(
            text_field(row, FIELD_DATE).as_deref(),
            &cfg.year_range,
            region.code,
        ),
        address: text_field(row, FIELD_ADDRESS).unwrap_or_default(),
        building_type: text_field(row, FIELD_BUILDING_TYPE).unwrap_or_default(),
        has_parking,
        parking_price,
        land_use: text_field(row, FIELD_LAND_USE).unwrap_or_default(),
    })
}

/// Canonical room-type tag for a count in the accepted range.
fn room_tag(count: i64) -> String {
    if (1..=10).contains(&count) {
        format!("{count} room(s)")
    } else {
        "unknown".to_string()
    }
}

/// Room-type normalization: bare integer in [1, 10] → canonical tag; a
/// value already carrying the `room` marker passes through; otherwise the
/// first embedded integer in range; else `"unknown"`.
fn normalize_room_type(value: Option<&Value>) -> String {
    let Some(text) = value.map(value_to_string) else {
        return "unknown".to_string();
    };
    let text = text.trim();
    if text.is_empty() {
        return "unknown".to_string();
    }

    if let Ok(count) = text.parse::<i64>() {
        return room_tag(count);
    }

    if text.contains("room") {
        return text.to_string();
    }

    if let Some(m) = FIRST_INTEGER.find(text) {
        if let Ok(count) = m.as_str().parse::<i64>() {
            if (1..=10).contains(&count) {
                return room_tag(count);
            }
        }
    }

    "unknown".to_string()
}

/// Transaction-date normalization. Exactly three accepted shapes:
/// `YYYY/M/D`, `YYYY-MM-DD`, and 8-digit `YYYYMMDD`, each requiring a
/// real calendar date with a year inside `year_range`. Everything else
/// is `None`.
fn normalize_date(
    value: Option<&str>,
    year_range: &RangeInclusive<i32>,
    region: &str,
) -> Option<NaiveDate> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = if text.contains('/') {
        parse_slash_date(text)
    } else if text.contains('-') {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
    } else if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[0..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    } else {
        None
    };

    match parsed {
        Some(date) if year_range.contains(&date.year()) => Some(date),
        _ => {
            debug!(region, date = text, "unparseable transaction date");
            None
        }
    }
}

fn parse_slash_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.split('/');
    let year_part = parts.next()?;
    if year_part.len() != 4 {
        return None;
    }
    let year = year_part.parse().ok()?;
    let month = parts.next()?.trim().parse().ok()?;
    let day = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Floor parsing recovered from the source data: `全`/`透天` mean the
/// whole building (-1), `地下層` is the basement (-2), otherwise the
/// first embedded number or a single Chinese numeral; 0 when nothing
/// matches.
fn parse_floor(raw: &str) -> i32 {
    let text = raw.trim();
    if text.is_empty() {
        return 0;
    }
    if text == "全" || text == "透天" {
        return -1;
    }
    if text == "地下層" {
        return -2;
    }

    if let Some(m) = FIRST_INTEGER.find(text) {
        if let Ok(floor) = m.as_str().parse() {
            return floor;
        }
    }

    const CHINESE_NUMERALS: [(&str, i32); 10] = [
        ("一", 1), ("二", 2), ("三", 3), ("四", 4), ("五", 5),
        ("六", 6), ("七", 7), ("八", 8), ("九", 9), ("十", 10),
    ];
    for (numeral, value) in CHINESE_NUMERALS {
        if text.contains(numeral) {
            return value;
        }
    }

    0
}

fn parking_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s == "有" || s.eq_ignore_ascii_case("y")
        }
        _ => false,
    }
}

/// Scale a 萬-denominated source value to base-unit NTD. Missing,
/// unparseable, or non-positive values become 0, never null.
fn to_base_unit(wan: Option<f64>) -> i64 {
    match wan {
        Some(v) if v > 0.0 => (v * WAN).round() as i64,
        _ => 0,
    }
}

fn number_field(row: &Map<String, Value>, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    let value = row.get(key)?;
    let text = value_to_string(value);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TAIPEI: Region = Region {
        code: "taipei",
        name: "台北市",
    };

    fn normalize(raw: Value) -> Option<PropertyRecord> {
        normalize_row(&raw, &TAIPEI, 0, &NormalizerConfig::default())
    }

    #[test]
    fn prices_scale_to_base_unit_exactly() {
        let record = normalize(json!({
            "總價(萬)": 2800,
            "單價(萬/坪)": 45.5,
            "面積(坪)": 61.5,
        }))
        .unwrap();
        assert_eq!(record.total_price, 28_000_000);
        assert_eq!(record.unit_price, 455_000);
    }

    #[test]
    fn numeric_strings_parse_too() {
        let record = normalize(json!({
            "總價(萬)": "2800",
            "單價(萬/坪)": "45.5",
        }))
        .unwrap();
        assert_eq!(record.total_price, 28_000_000);
        assert_eq!(record.unit_price, 455_000);
    }

    #[test]
    fn missing_prices_become_zero_never_null() {
        let record = normalize(json!({ "區域": "信義區" })).unwrap();
        assert_eq!(record.total_price, 0);
        assert_eq!(record.unit_price, 0);
        assert_eq!(record.parking_price, 0);
    }

    #[test]
    fn unit_price_is_derived_when_absent() {
        let record = normalize(json!({
            "總價(萬)": 1000,
            "面積(坪)": 25.0,
        }))
        .unwrap();
        assert_eq!(record.unit_price, 400_000);
    }

    #[test]
    fn area_takes_first_positive_candidate() {
        let record = normalize(json!({
            "面積(坪)": 0,
            "總面積_坪": "not a number",
            "建物面積": 30.5,
        }))
        .unwrap();
        assert!((record.area - 30.5).abs() < 1e-9);

        let record = normalize(json!({})).unwrap();
        assert_eq!(record.area, 0.0);
    }

    #[test]
    fn date_shapes_accepted() {
        let date = |raw: Value| normalize(json!({ "交易年月日": raw })).unwrap().transaction_date;

        let expected = NaiveDate::from_ymd_opt(2025, 2, 13);
        assert_eq!(date(json!("2025/02/13")), expected);
        assert_eq!(date(json!("2025/2/13")), expected);
        assert_eq!(date(json!("2025-02-13")), expected);
        assert_eq!(date(json!("20250213")), expected);
    }

    #[test]
    fn date_shapes_rejected() {
        let date = |raw: Value| normalize(json!({ "交易年月日": raw })).unwrap().transaction_date;

        assert_eq!(date(json!("2031/01/01")), None); // outside year bound
        assert_eq!(date(json!("2019-12-31")), None);
        assert_eq!(date(json!("not-a-date")), None);
        assert_eq!(date(json!("2025/02/30")), None); // not a calendar date
        assert_eq!(date(json!("250213")), None);
        assert_eq!(date(json!("")), None);

        let record = normalize(json!({})).unwrap();
        assert_eq!(record.transaction_date, None);
    }

    #[test]
    fn year_bound_is_overridable() {
        let cfg = NormalizerConfig {
            year_range: 1990..=2030,
        };
        let record = normalize_row(&json!({ "交易年月日": "1995/1/1" }), &TAIPEI, 0, &cfg).unwrap();
        assert_eq!(record.transaction_date, NaiveDate::from_ymd_opt(1995, 1, 1));
    }

    #[test]
    fn room_type_normalization() {
        let room = |raw: Value| normalize(json!({ "房型": raw })).unwrap().room_type;

        assert_eq!(room(json!("3")), "3 room(s)");
        assert_eq!(room(json!(3)), "3 room(s)");
        assert_eq!(room(json!("3房2廳")), "3 room(s)");
        assert_eq!(room(json!("2 room(s)")), "2 room(s)"); // marker passes through
        assert_eq!(room(json!("0")), "unknown");
        assert_eq!(room(json!("11")), "unknown");
        assert_eq!(room(json!("套房")), "unknown");
        assert_eq!(normalize(json!({})).unwrap().room_type, "unknown");
    }

    #[test]
    fn floor_parsing() {
        let floor = |raw: &str| normalize(json!({ "樓層": raw })).unwrap();

        assert_eq!(floor("5樓").floor, 5);
        assert_eq!(floor("5樓").floor_raw, "5樓");
        assert_eq!(floor("全").floor, -1);
        assert_eq!(floor("透天").floor, -1);
        assert_eq!(floor("地下層").floor, -2);
        assert_eq!(floor("十").floor, 10);
        assert_eq!(floor("頂樓加蓋").floor, 0);
    }

    #[test]
    fn parking_flag_and_price() {
        let record = normalize(json!({ "車位": "有" })).unwrap();
        assert!(record.has_parking);
        assert_eq!(record.parking_price, 0);

        let record = normalize(json!({ "車位總價": 150 })).unwrap();
        assert!(record.has_parking);
        assert_eq!(record.parking_price, 1_500_000);

        let record = normalize(json!({ "車位": "無" })).unwrap();
        assert!(!record.has_parking);
    }

    #[test]
    fn non_object_rows_are_dropped() {
        assert!(normalize(json!("just a string")).is_none());
        assert!(normalize(json!(42)).is_none());
        assert!(normalize(json!(null)).is_none());
    }

    #[test]
    fn region_is_stamped_on_every_record() {
        let record = normalize(json!({})).unwrap();
        assert_eq!(record.region, "taipei");
        assert_eq!(record.region_name, "台北市");
        assert_eq!(record.id, None);
    }
}
