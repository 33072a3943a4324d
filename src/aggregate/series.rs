use crate::load::Transaction;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator), the default the source
/// statistics were computed with.
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// One day of load, with its spike flag.
#[derive(Debug, Clone, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub total: i64,
    pub spike: bool,
}

/// Daily totals with days above mean + 2·stddev flagged as spikes. Rows
/// without a parseable date are excluded.
pub fn daily_spikes<T: Transaction>(rows: &[T]) -> Vec<DailyPoint> {
    let daily = super::totals_by_date(rows);
    let values: Vec<f64> = daily.values().map(|&v| v as f64).collect();
    let limit = mean(&values) + 2.0 * sample_stddev(&values);

    daily
        .into_iter()
        .map(|(date, total)| DailyPoint {
            date,
            total,
            spike: total as f64 > limit,
        })
        .collect()
}

/// The Sunday that ends the week containing `date`.
pub fn week_ending_sunday(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(days_to_sunday)
}

/// Totals per week, keyed by the week-ending Sunday.
pub fn weekly_totals<T: Transaction>(rows: &[T]) -> BTreeMap<NaiveDate, i64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        if let Some(d) = row.date() {
            *totals.entry(week_ending_sunday(d)).or_insert(0) += row.total();
        }
    }
    totals
}

/// Weekly actuals plus a momentum projection.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub actual: Vec<(NaiveDate, i64)>,
    pub projected: Vec<(NaiveDate, f64)>,
}

/// Project `horizon_weeks` of load forward from the weekly series: the
/// last-4-week average grown by a damped momentum term,
/// `avg * (1 + growth_rate * 0.1 * i)`. Needs at least four weeks of data.
pub fn forecast_weekly<T: Transaction>(rows: &[T], horizon_weeks: usize) -> Option<Forecast> {
    let weekly = weekly_totals(rows);
    if weekly.len() < 4 {
        return None;
    }

    let actual: Vec<(NaiveDate, i64)> = weekly.into_iter().collect();
    let n = actual.len();
    let last4: Vec<f64> = actual[n - 4..].iter().map(|(_, v)| *v as f64).collect();
    let last4_avg = mean(&last4);
    let base = actual[n - 4].1 as f64;
    let growth_rate = if base != 0.0 {
        (actual[n - 1].1 as f64 - base) / base
    } else {
        0.0
    };

    let last_date = actual[n - 1].0;
    let projected = (1..=horizon_weeks)
        .map(|i| {
            let date = last_date + Duration::weeks(i as i64);
            let value = last4_avg * (1.0 + growth_rate * 0.1 * i as f64);
            (date, value)
        })
        .collect();

    Some(Forecast { actual, projected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::UpdateRecord;

    fn row(date: &str, total: i64) -> UpdateRecord {
        UpdateRecord {
            date: crate::load::date_parser::parse_extract_date(date),
            state: "Bihar".to_string(),
            district: "Patna".to_string(),
            pincode: "800001".to_string(),
            age_5_17: 0,
            age_18_plus: total,
        }
    }

    #[test]
    fn spike_threshold_is_mean_plus_two_sample_stddev() {
        // nine quiet days at 100 and one at 1000
        let mut rows: Vec<UpdateRecord> = (1..=9).map(|d| row(&format!("{d:02}-06-2025"), 100)).collect();
        rows.push(row("10-06-2025", 1000));

        let values: Vec<f64> = vec![100.0; 9]
            .into_iter()
            .chain(std::iter::once(1000.0))
            .collect();
        let limit = mean(&values) + 2.0 * sample_stddev(&values);

        let points = daily_spikes(&rows);
        assert_eq!(points.len(), 10);
        for p in &points {
            assert_eq!(p.spike, p.total as f64 > limit, "day {}", p.date);
        }
        assert!(points.last().unwrap().spike);
        assert!(!points[0].spike);
    }

    #[test]
    fn constant_series_has_no_spikes() {
        let rows: Vec<UpdateRecord> = (1..=7).map(|d| row(&format!("{d:02}-06-2025"), 100)).collect();
        assert!(daily_spikes(&rows).iter().all(|p| !p.spike));
    }

    #[test]
    fn weeks_end_on_sunday() {
        // 2025-06-02 (Mon) .. 2025-06-08 (Sun) share a bucket
        let d = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();
        assert_eq!(week_ending_sunday(d), sunday);
        assert_eq!(week_ending_sunday(sunday), sunday);

        let rows = vec![row("02-06-2025", 10), row("08-06-2025", 20), row("09-06-2025", 5)];
        let weekly = weekly_totals(&rows);
        assert_eq!(weekly[&sunday], 30);
        assert_eq!(weekly.len(), 2);
    }

    #[test]
    fn forecast_projects_requested_horizon() {
        // five consecutive weeks of flat load
        let rows: Vec<UpdateRecord> = (0..5)
            .map(|w| row(&format!("{:02}-06-2025", 1 + w * 7), 700))
            .collect();
        let forecast = forecast_weekly(&rows, 12).expect("enough weeks");
        assert_eq!(forecast.projected.len(), 12);
        // flat history → zero momentum → flat projection
        for (_, v) in &forecast.projected {
            assert!((v - 700.0).abs() < 1e-9);
        }
        let last_actual = forecast.actual.last().unwrap().0;
        assert_eq!(forecast.projected[0].0, last_actual + Duration::weeks(1));
    }

    #[test]
    fn forecast_needs_four_weeks() {
        let rows = vec![row("01-06-2025", 10), row("08-06-2025", 20)];
        assert!(forecast_weekly(&rows, 12).is_none());
    }
}
