pub mod series;

pub use series::{daily_spikes, forecast_weekly, weekly_totals, DailyPoint, Forecast};

use crate::load::{EnrolmentRecord, Transaction, UpdateRecord};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Districts in sensitive border zones, flagged on the enrolment-velocity
/// figures.
static BORDER_DISTRICTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Sitamarhi",
        "Bahraich",
        "Murshidabad",
        "South 24 Parganas",
        "West Champaran",
        "Purbi Champaran",
        "North 24 Parganas",
    ])
});

pub fn is_border_district(district: &str) -> bool {
    BORDER_DISTRICTS.contains(district)
}

/// Group-by-sum of row totals along an arbitrary key. Rows whose key
/// extractor returns `None` are excluded.
pub fn sum_by<T, K, F>(rows: &[T], key: F) -> HashMap<K, i64>
where
    T: Transaction,
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> Option<K>,
{
    let mut totals = HashMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            *totals.entry(k).or_insert(0) += row.total();
        }
    }
    totals
}

pub fn totals_by_state<T: Transaction>(rows: &[T]) -> HashMap<String, i64> {
    sum_by(rows, |r| Some(r.state().to_string()))
}

pub fn totals_by_district<T: Transaction>(rows: &[T]) -> HashMap<String, i64> {
    sum_by(rows, |r| Some(r.district().to_string()))
}

pub fn totals_by_pincode<T: Transaction>(rows: &[T]) -> HashMap<String, i64> {
    sum_by(rows, |r| Some(r.pincode().to_string()))
}

/// Daily totals, ordered by date. Rows with an unparseable date are excluded
/// here rather than carried as a sentinel bucket.
pub fn totals_by_date<T: Transaction>(rows: &[T]) -> BTreeMap<NaiveDate, i64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        if let Some(d) = row.date() {
            *totals.entry(d).or_insert(0) += row.total();
        }
    }
    totals
}

/// Totals per weekday, always in Monday..Sunday order.
pub fn totals_by_weekday<T: Transaction>(rows: &[T]) -> [(chrono::Weekday, i64); 7] {
    use chrono::Weekday::*;
    let mut out = [
        (Mon, 0),
        (Tue, 0),
        (Wed, 0),
        (Thu, 0),
        (Fri, 0),
        (Sat, 0),
        (Sun, 0),
    ];
    for row in rows {
        if let Some(d) = row.date() {
            let idx = d.weekday().num_days_from_monday() as usize;
            out[idx].1 += row.total();
        }
    }
    out
}

/// Totals per calendar month, keyed by the first of the month.
pub fn totals_by_month<T: Transaction>(rows: &[T]) -> BTreeMap<NaiveDate, i64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        if let Some(d) = row.date() {
            if let Some(month_start) = NaiveDate::from_ymd_opt(d.year(), d.month(), 1) {
                *totals.entry(month_start).or_insert(0) += row.total();
            }
        }
    }
    totals
}

/// One district's enrolment volume, with its border-zone flag.
#[derive(Debug, Clone, Serialize)]
pub struct DistrictVolume {
    pub state: String,
    pub district: String,
    pub total: i64,
    pub border: bool,
}

/// Top-`n` (state, district) pairs by enrolment volume, descending.
pub fn top_districts(enrol: &[EnrolmentRecord], n: usize) -> Vec<DistrictVolume> {
    let grouped = sum_by(enrol, |r| {
        Some((r.state().to_string(), r.district().to_string()))
    });
    let mut out: Vec<DistrictVolume> = grouped
        .into_iter()
        .map(|((state, district), total)| DistrictVolume {
            border: is_border_district(&district),
            state,
            district,
            total,
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.district.cmp(&b.district)));
    out.truncate(n);
    out
}

/// One state's growth-vs-maintenance totals.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceGap {
    pub state: String,
    pub enrolments: i64,
    pub updates: i64,
}

/// Total enrolments against total updates (bio + demo) per state, restricted
/// to states with more than 1000 enrolments to cut noise. Descending by
/// enrolments.
pub fn maintenance_gap(
    enrol: &[EnrolmentRecord],
    bio: &[UpdateRecord],
    demo: &[UpdateRecord],
) -> Vec<MaintenanceGap> {
    let enrolments = totals_by_state(enrol);
    let mut updates = totals_by_state(bio);
    for (state, total) in totals_by_state(demo) {
        *updates.entry(state).or_insert(0) += total;
    }

    let mut out: Vec<MaintenanceGap> = enrolments
        .into_iter()
        .filter(|(_, e)| *e > 1000)
        .map(|(state, e)| MaintenanceGap {
            updates: updates.get(&state).copied().unwrap_or(0),
            state,
            enrolments: e,
        })
        .collect();
    out.sort_by(|a, b| b.enrolments.cmp(&a.enrolments).then_with(|| a.state.cmp(&b.state)));
    out
}

/// School-age (5-17) enrolments vs mandatory biometric updates per state.
#[derive(Debug, Clone, Serialize)]
pub struct CompliancePair {
    pub state: String,
    pub new_enrolments_5_17: i64,
    pub bio_updates_5_17: i64,
}

/// Top-`n` states by 5-17 enrolment volume against their 5-17 biometric
/// updates: the compliance-gap figure.
pub fn compliance_5_17(
    enrol: &[EnrolmentRecord],
    bio: &[UpdateRecord],
    n: usize,
) -> Vec<CompliancePair> {
    let mut enrol_by_state: HashMap<String, i64> = HashMap::new();
    for r in enrol {
        *enrol_by_state.entry(r.state.clone()).or_insert(0) += r.age_5_17;
    }
    let mut bio_by_state: HashMap<String, i64> = HashMap::new();
    for r in bio {
        *bio_by_state.entry(r.state.clone()).or_insert(0) += r.age_5_17;
    }

    let mut out: Vec<CompliancePair> = enrol_by_state
        .into_iter()
        .map(|(state, e)| CompliancePair {
            bio_updates_5_17: bio_by_state.get(&state).copied().unwrap_or(0),
            state,
            new_enrolments_5_17: e,
        })
        .collect();
    out.sort_by(|a, b| {
        b.new_enrolments_5_17
            .cmp(&a.new_enrolments_5_17)
            .then_with(|| a.state.cmp(&b.state))
    });
    out.truncate(n);
    out
}

/// Demographic-to-biometric update ratio for one region key.
#[derive(Debug, Clone, Serialize)]
pub struct DigitalRatio {
    pub key: String,
    pub demo: i64,
    pub bio: i64,
    pub ratio: f64,
}

/// The +1 denominator keeps bio=0 regions finite: ratio = demo / (bio + 1).
pub fn digital_ratio(demo: i64, bio: i64) -> f64 {
    demo as f64 / (bio + 1) as f64
}

/// Digital ratio per district, keeping districts with more than `min_bio`
/// biometric updates, descending by ratio, top `n`.
pub fn digital_ratio_by_district(
    demo: &[UpdateRecord],
    bio: &[UpdateRecord],
    min_bio: i64,
    n: usize,
) -> Vec<DigitalRatio> {
    let demo_by_district = totals_by_district(demo);
    let bio_by_district = totals_by_district(bio);

    let mut out: Vec<DigitalRatio> = demo_by_district
        .into_iter()
        .map(|(district, d)| {
            let b = bio_by_district.get(&district).copied().unwrap_or(0);
            DigitalRatio {
                key: district,
                demo: d,
                bio: b,
                ratio: digital_ratio(d, b),
            }
        })
        .filter(|r| r.bio > min_bio)
        .collect();
    out.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    out.truncate(n);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AreaClass {
    Urban,
    Rural,
}

/// One pincode's adult update behaviour, classified urban/rural by volume.
#[derive(Debug, Clone, Serialize)]
pub struct PincodeDivide {
    pub pincode: String,
    pub demo_adult: i64,
    pub bio_adult: i64,
    pub total: i64,
    pub ratio: f64,
    pub class: AreaClass,
}

/// Adult-band digital ratio per pincode, keeping pincodes with total volume
/// above 100. The top decile by volume is classified Urban (a population
/// proxy), the rest Rural.
pub fn urban_rural_divide(demo: &[UpdateRecord], bio: &[UpdateRecord]) -> Vec<PincodeDivide> {
    let mut demo_adult: HashMap<String, i64> = HashMap::new();
    for r in demo {
        *demo_adult.entry(r.pincode.clone()).or_insert(0) += r.age_18_plus;
    }
    let mut bio_adult: HashMap<String, i64> = HashMap::new();
    for r in bio {
        *bio_adult.entry(r.pincode.clone()).or_insert(0) += r.age_18_plus;
    }

    let mut keys: HashSet<String> = demo_adult.keys().cloned().collect();
    keys.extend(bio_adult.keys().cloned());

    let mut entries: Vec<(String, i64, i64)> = keys
        .into_iter()
        .map(|pin| {
            let d = demo_adult.get(&pin).copied().unwrap_or(0);
            let b = bio_adult.get(&pin).copied().unwrap_or(0);
            (pin, d, b)
        })
        .filter(|(_, d, b)| d + b > 100)
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let volumes: Vec<f64> = {
        let mut v: Vec<f64> = entries.iter().map(|(_, d, b)| (d + b) as f64).collect();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        v
    };
    let urban_cutoff = quantile(&volumes, 0.9);

    entries
        .into_iter()
        .map(|(pincode, d, b)| {
            let total = d + b;
            PincodeDivide {
                pincode,
                demo_adult: d,
                bio_adult: b,
                total,
                ratio: digital_ratio(d, b),
                class: if (total as f64) > urban_cutoff {
                    AreaClass::Urban
                } else {
                    AreaClass::Rural
                },
            }
        })
        .collect()
}

/// Adult cohort share of enrolments for one state.
#[derive(Debug, Clone, Serialize)]
pub struct AdultShare {
    pub state: String,
    pub adult: i64,
    pub child: i64,
    pub share_pct: f64,
}

/// Share of enrolments that are adults (18+) against the infant band, per
/// state, descending, top `n`.
pub fn adult_share_by_state(enrol: &[EnrolmentRecord], n: usize) -> Vec<AdultShare> {
    let mut bands: HashMap<String, (i64, i64)> = HashMap::new();
    for r in enrol {
        let e = bands.entry(r.state.clone()).or_insert((0, 0));
        e.0 += r.age_0_5;
        e.1 += r.age_18_plus;
    }

    let mut out: Vec<AdultShare> = bands
        .into_iter()
        .filter(|(_, (child, adult))| child + adult > 0)
        .map(|(state, (child, adult))| AdultShare {
            state,
            adult,
            child,
            share_pct: adult as f64 / (child + adult) as f64 * 100.0,
        })
        .collect();
    out.sort_by(|a, b| {
        b.share_pct
            .partial_cmp(&a.share_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.state.cmp(&b.state))
    });
    out.truncate(n);
    out
}

/// Linear-interpolation quantile over an ascending-sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn enrol(
        date: &str,
        state: &str,
        district: &str,
        bands: (i64, i64, i64),
    ) -> EnrolmentRecord {
        EnrolmentRecord {
            date: crate::load::date_parser::parse_extract_date(date),
            state: state.to_string(),
            district: district.to_string(),
            pincode: "800001".to_string(),
            age_0_5: bands.0,
            age_5_17: bands.1,
            age_18_plus: bands.2,
        }
    }

    fn update(state: &str, district: &str, pincode: &str, bands: (i64, i64)) -> UpdateRecord {
        UpdateRecord {
            date: NaiveDate::from_ymd_opt(2025, 6, 15),
            state: state.to_string(),
            district: district.to_string(),
            pincode: pincode.to_string(),
            age_5_17: bands.0,
            age_18_plus: bands.1,
        }
    }

    #[test]
    fn state_totals_sum_all_bands() {
        let rows = vec![
            enrol("01-06-2025", "Bihar", "Patna", (1, 2, 3)),
            enrol("02-06-2025", "Bihar", "Gaya", (4, 5, 6)),
            enrol("02-06-2025", "Odisha", "Cuttack", (7, 0, 0)),
        ];
        let totals = totals_by_state(&rows);
        assert_eq!(totals["Bihar"], 21);
        assert_eq!(totals["Odisha"], 7);
    }

    #[test]
    fn date_keyed_totals_exclude_null_dates() {
        let rows = vec![
            enrol("01-06-2025", "Bihar", "Patna", (1, 0, 0)),
            enrol("garbage", "Bihar", "Patna", (100, 0, 0)),
        ];
        let daily = totals_by_date(&rows);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[&NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()], 1);
    }

    #[test]
    fn weekday_totals_run_monday_to_sunday() {
        // 2025-06-02 is a Monday, 2025-06-08 a Sunday
        let rows = vec![
            enrol("02-06-2025", "Bihar", "Patna", (1, 0, 0)),
            enrol("08-06-2025", "Bihar", "Patna", (0, 0, 5)),
        ];
        let weekdays = totals_by_weekday(&rows);
        assert_eq!(weekdays[0], (chrono::Weekday::Mon, 1));
        assert_eq!(weekdays[6], (chrono::Weekday::Sun, 5));
    }

    #[test]
    fn pincode_totals_sum_all_bands() {
        let rows = vec![
            update("Odisha", "Cuttack", "753001", (1, 2)),
            update("Odisha", "Cuttack", "753001", (3, 4)),
            update("Odisha", "Puri", "752001", (5, 6)),
        ];
        let totals = totals_by_pincode(&rows);
        assert_eq!(totals["753001"], 10);
        assert_eq!(totals["752001"], 11);
    }

    #[test]
    fn compliance_pairs_rank_by_school_age_enrolments() {
        let enrols = vec![
            enrol("01-06-2025", "Bihar", "Patna", (0, 500, 0)),
            enrol("01-06-2025", "Odisha", "Cuttack", (0, 900, 0)),
        ];
        let bio = vec![update("Bihar", "Patna", "800001", (120, 0))];
        let pairs = compliance_5_17(&enrols, &bio, 10);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].state, "Odisha");
        assert_eq!(pairs[0].new_enrolments_5_17, 900);
        // no biometric updates recorded for Odisha's cohort
        assert_eq!(pairs[0].bio_updates_5_17, 0);
        assert_eq!(pairs[1].state, "Bihar");
        assert_eq!(pairs[1].bio_updates_5_17, 120);

        let top1 = compliance_5_17(&enrols, &bio, 1);
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].state, "Odisha");
    }

    #[test]
    fn ratio_with_zero_bio_equals_demo() {
        assert_eq!(digital_ratio(40, 0), 40.0);
        assert_eq!(digital_ratio(40, 3), 10.0);
    }

    #[test]
    fn district_ratio_filters_and_sorts() {
        let demo = vec![
            update("Odisha", "Cuttack", "753001", (0, 400)),
            update("Odisha", "Puri", "752001", (0, 900)),
        ];
        let bio = vec![
            update("Odisha", "Cuttack", "753001", (0, 199)),
            update("Odisha", "Puri", "752001", (0, 50)),
        ];
        // Puri's bio volume (50) is under min_bio and drops out
        let out = digital_ratio_by_district(&demo, &bio, 100, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "Cuttack");
        assert_eq!(out[0].ratio, 2.0);
    }

    #[test]
    fn border_districts_are_flagged() {
        let rows = vec![
            enrol("01-06-2025", "Bihar", "Sitamarhi", (0, 0, 500)),
            enrol("01-06-2025", "Maharashtra", "Pune", (0, 0, 400)),
        ];
        let top = top_districts(&rows, 5);
        assert_eq!(top[0].district, "Sitamarhi");
        assert!(top[0].border);
        assert!(!top[1].border);
    }

    #[test]
    fn maintenance_gap_ignores_small_states() {
        let enrols = vec![
            enrol("01-06-2025", "Bihar", "Patna", (500, 400, 200)),
            enrol("01-06-2025", "Sikkim", "Gangtok", (10, 10, 10)),
        ];
        let bio = vec![update("Bihar", "Patna", "800001", (5, 5))];
        let demo = vec![update("Bihar", "Patna", "800001", (10, 10))];
        let gaps = maintenance_gap(&enrols, &bio, &demo);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].state, "Bihar");
        assert_eq!(gaps[0].enrolments, 1100);
        assert_eq!(gaps[0].updates, 30);
    }

    #[test]
    fn adult_share_percentage() {
        let rows = vec![
            enrol("01-06-2025", "Meghalaya", "Shillong", (68, 0, 32)),
            enrol("01-06-2025", "Kerala", "Kochi", (99, 0, 1)),
        ];
        let shares = adult_share_by_state(&rows, 10);
        assert_eq!(shares[0].state, "Meghalaya");
        assert!((shares[0].share_pct - 32.0).abs() < 1e-9);
    }

    #[test]
    fn urban_rural_split_at_ninth_decile() {
        // ten pincodes above the volume floor; the largest lands urban
        let mut demo = Vec::new();
        for i in 0..10 {
            let pin = format!("75300{i}");
            demo.push(update("Odisha", "Cuttack", &pin, (0, 150 + i * 10)));
        }
        demo.push(update("Odisha", "Cuttack", "753099", (0, 5000)));
        let divide = urban_rural_divide(&demo, &[]);
        let urban: Vec<_> = divide
            .iter()
            .filter(|p| p.class == AreaClass::Urban)
            .collect();
        assert_eq!(urban.len(), 1);
        assert_eq!(urban[0].pincode, "753099");
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let vals = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&vals, 0.5), 2.5);
        assert_eq!(quantile(&vals, 0.0), 1.0);
        assert_eq!(quantile(&vals, 1.0), 4.0);
    }
}
