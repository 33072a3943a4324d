use crate::aggregate;
use crate::discover::Category;
use crate::load::{Dataset, Transaction};
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

type SharedData = web::Data<Arc<Dataset>>;
type Query = web::Query<HashMap<String, String>>;

/// Route table, separated from `run_server` so tests can mount it on a bare
/// `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/summary", web::get().to(summary_handler))
        .route("/states", web::get().to(states_handler))
        .route("/districts/top", web::get().to(top_districts_handler))
        .route("/load/daily", web::get().to(daily_handler))
        .route("/load/weekday", web::get().to(weekday_handler))
        .route("/load/monthly", web::get().to(monthly_handler))
        .route("/ratio/districts", web::get().to(ratio_handler))
        .route("/ratio/pincodes", web::get().to(pincode_ratio_handler))
        .route("/forecast", web::get().to(forecast_handler))
        .route("/data", web::get().to(data_handler))
        .route("/data/csv", web::get().to(data_csv_handler));
}

/// Serve the dashboard over `bind_addr`. The dataset was loaded once at
/// startup and stays cached for the life of the process; restarting is the
/// cache invalidation.
pub async fn run_server(dataset: Arc<Dataset>, bind_addr: &str) -> std::io::Result<()> {
    info!(
        rows = dataset.total_rows(),
        "dashboard listening on {bind_addr}"
    );
    let data = web::Data::new(dataset);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(bind_addr)?
        .run()
        .await
}

fn empty_category_warning(which: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "warning": format!("no {which} data was loaded; nothing to show for this page")
    }))
}

fn parse_n(query: &Query, default: usize) -> usize {
    query
        .get("n")
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// GET /summary: KPI totals plus per-category file accounting.
async fn summary_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    let enrol_total: i64 = ds.enrolment.rows.iter().map(|r| r.total()).sum();
    let bio_total: i64 = ds.biometric.rows.iter().map(|r| r.total()).sum();
    let demo_total: i64 = ds.demographic.rows.iter().map(|r| r.total()).sum();

    HttpResponse::Ok().json(json!({
        "total_transactions": enrol_total + bio_total + demo_total,
        "new_enrolments": enrol_total,
        "biometric_updates": bio_total,
        "demographic_updates": demo_total,
        "rows": {
            "enrolment": ds.enrolment.rows.len(),
            "biometric": ds.biometric.rows.len(),
            "demographic": ds.demographic.rows.len(),
        },
        "files": {
            "enrolment": {"loaded": ds.enrolment.files_loaded, "skipped": ds.enrolment.files_skipped},
            "biometric": {"loaded": ds.biometric.files_loaded, "skipped": ds.biometric.files_skipped},
            "demographic": {"loaded": ds.demographic.files_loaded, "skipped": ds.demographic.files_skipped},
        },
    }))
}

/// GET /states: per-state totals across the three categories plus the
/// adult enrolment share.
async fn states_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.enrolment.rows.is_empty() {
        return empty_category_warning("enrolment");
    }

    let enrol = aggregate::totals_by_state(&ds.enrolment.rows);
    let bio = aggregate::totals_by_state(&ds.biometric.rows);
    let demo = aggregate::totals_by_state(&ds.demographic.rows);
    let shares: HashMap<String, f64> = aggregate::adult_share_by_state(&ds.enrolment.rows, usize::MAX)
        .into_iter()
        .map(|s| (s.state, s.share_pct))
        .collect();

    let mut states: Vec<&String> = enrol.keys().collect();
    states.sort();
    let body: Vec<serde_json::Value> = states
        .into_iter()
        .map(|state| {
            json!({
                "state": state,
                "enrolments": enrol.get(state).copied().unwrap_or(0),
                "biometric_updates": bio.get(state).copied().unwrap_or(0),
                "demographic_updates": demo.get(state).copied().unwrap_or(0),
                "adult_share_pct": shares.get(state).copied(),
            })
        })
        .collect();
    HttpResponse::Ok().json(body)
}

/// GET /districts/top?n=: enrolment-velocity leaders with border flags.
async fn top_districts_handler(data: SharedData, query: Query) -> impl Responder {
    let ds = data.get_ref();
    if ds.enrolment.rows.is_empty() {
        return empty_category_warning("enrolment");
    }
    let n = parse_n(&query, 15);
    HttpResponse::Ok().json(aggregate::top_districts(&ds.enrolment.rows, n))
}

/// GET /load/daily: daily demographic-update load with spike flags.
async fn daily_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() {
        return empty_category_warning("demographic");
    }
    HttpResponse::Ok().json(aggregate::daily_spikes(&ds.demographic.rows))
}

/// GET /load/weekday: Monday..Sunday load distribution.
async fn weekday_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() {
        return empty_category_warning("demographic");
    }
    let body: Vec<serde_json::Value> = aggregate::totals_by_weekday(&ds.demographic.rows)
        .iter()
        .map(|(day, total)| json!({"weekday": day.to_string(), "total": total}))
        .collect();
    HttpResponse::Ok().json(body)
}

/// GET /load/monthly: calendar-month load series.
async fn monthly_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() {
        return empty_category_warning("demographic");
    }
    let body: Vec<serde_json::Value> = aggregate::totals_by_month(&ds.demographic.rows)
        .iter()
        .map(|(month, total)| json!({"month": month.format("%Y-%m").to_string(), "total": total}))
        .collect();
    HttpResponse::Ok().json(body)
}

/// GET /ratio/districts?n=: digital-ratio leaders. Needs both update
/// categories.
async fn ratio_handler(data: SharedData, query: Query) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() || ds.biometric.rows.is_empty() {
        return empty_category_warning("biometric and demographic");
    }
    let n = parse_n(&query, 10);
    HttpResponse::Ok().json(aggregate::digital_ratio_by_district(
        &ds.demographic.rows,
        &ds.biometric.rows,
        100,
        n,
    ))
}

/// GET /ratio/pincodes: adult update ratio per pincode with the urban/rural
/// volume classification.
async fn pincode_ratio_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() || ds.biometric.rows.is_empty() {
        return empty_category_warning("biometric and demographic");
    }
    HttpResponse::Ok().json(aggregate::urban_rural_divide(
        &ds.demographic.rows,
        &ds.biometric.rows,
    ))
}

/// GET /forecast: weekly actuals plus the 12-week projection.
async fn forecast_handler(data: SharedData) -> impl Responder {
    let ds = data.get_ref();
    if ds.demographic.rows.is_empty() {
        return empty_category_warning("demographic");
    }
    match aggregate::forecast_weekly(&ds.demographic.rows, 12) {
        Some(forecast) => HttpResponse::Ok().json(forecast),
        None => HttpResponse::Ok().json(json!({
            "warning": "fewer than four weeks of data; no projection available"
        })),
    }
}

fn filtered<'a, T: Transaction + Serialize>(
    rows: &'a [T],
    state: Option<&str>,
    limit: usize,
) -> Vec<&'a T> {
    rows.iter()
        .filter(|r| state.map_or(true, |s| r.state() == s))
        .take(limit)
        .collect()
}

/// GET /data?category=&state=&limit=: filtered raw rows as JSON.
async fn data_handler(data: SharedData, query: Query) -> impl Responder {
    let ds = data.get_ref();
    let category = match query.get("category").and_then(|s| Category::from_str(s)) {
        Some(c) => c,
        None => {
            return HttpResponse::BadRequest().json(json!({
                "error": "category query parameter is required: enrolment | biometric | demographic"
            }))
        }
    };
    // Canonicalize the filter so "orissa" matches rows stored as "Odisha".
    let state = query
        .get("state")
        .map(|s| crate::normalize::canonical_state(s));
    let limit: usize = query
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    match category {
        Category::Enrolment => {
            if ds.enrolment.rows.is_empty() {
                return empty_category_warning("enrolment");
            }
            HttpResponse::Ok().json(filtered(&ds.enrolment.rows, state.as_deref(), limit))
        }
        Category::Biometric => {
            if ds.biometric.rows.is_empty() {
                return empty_category_warning("biometric");
            }
            HttpResponse::Ok().json(filtered(&ds.biometric.rows, state.as_deref(), limit))
        }
        Category::Demographic => {
            if ds.demographic.rows.is_empty() {
                return empty_category_warning("demographic");
            }
            HttpResponse::Ok().json(filtered(&ds.demographic.rows, state.as_deref(), limit))
        }
    }
}

fn rows_to_csv<T: Transaction + Serialize>(rows: Vec<&T>) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e)))
}

fn csv_response(result: Result<Vec<u8>, csv::Error>) -> HttpResponse {
    match result {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=\"filtered_data.csv\"",
            ))
            .body(bytes),
        Err(e) => {
            HttpResponse::InternalServerError().json(json!({"error": format!("csv export failed: {e}")}))
        }
    }
}

/// GET /data/csv?category=&state=&limit=: the same filtered table as a CSV
/// download.
async fn data_csv_handler(data: SharedData, query: Query) -> impl Responder {
    let ds = data.get_ref();
    let category = match query.get("category").and_then(|s| Category::from_str(s)) {
        Some(c) => c,
        None => {
            return HttpResponse::BadRequest().json(json!({
                "error": "category query parameter is required: enrolment | biometric | demographic"
            }))
        }
    };
    let state = query
        .get("state")
        .map(|s| crate::normalize::canonical_state(s));
    let limit: usize = query
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(usize::MAX);

    match category {
        Category::Enrolment => {
            if ds.enrolment.rows.is_empty() {
                return empty_category_warning("enrolment");
            }
            csv_response(rows_to_csv(filtered(&ds.enrolment.rows, state.as_deref(), limit)))
        }
        Category::Biometric => {
            if ds.biometric.rows.is_empty() {
                return empty_category_warning("biometric");
            }
            csv_response(rows_to_csv(filtered(&ds.biometric.rows, state.as_deref(), limit)))
        }
        Category::Demographic => {
            if ds.demographic.rows.is_empty() {
                return empty_category_warning("demographic");
            }
            csv_response(rows_to_csv(filtered(&ds.demographic.rows, state.as_deref(), limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{EnrolmentRecord, LoadOutcome, UpdateRecord};
    use actix_web::test;
    use chrono::NaiveDate;

    fn sample_dataset() -> Arc<Dataset> {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15);
        let enrolment = vec![
            EnrolmentRecord {
                date,
                state: "Bihar".to_string(),
                district: "Sitamarhi".to_string(),
                pincode: "843302".to_string(),
                age_0_5: 10,
                age_5_17: 20,
                age_18_plus: 30,
            },
            EnrolmentRecord {
                date,
                state: "Odisha".to_string(),
                district: "Cuttack".to_string(),
                pincode: "753001".to_string(),
                age_0_5: 5,
                age_5_17: 5,
                age_18_plus: 5,
            },
        ];
        let update = |state: &str, n: i64| UpdateRecord {
            date,
            state: state.to_string(),
            district: "Sitamarhi".to_string(),
            pincode: "843302".to_string(),
            age_5_17: n,
            age_18_plus: n,
        };
        Arc::new(Dataset {
            enrolment: LoadOutcome {
                rows: enrolment,
                files_loaded: 2,
                files_skipped: 1,
            },
            biometric: LoadOutcome {
                rows: vec![update("Bihar", 70)],
                files_loaded: 1,
                files_skipped: 0,
            },
            demographic: LoadOutcome {
                rows: vec![update("Bihar", 90)],
                files_loaded: 1,
                files_skipped: 0,
            },
        })
    }

    #[actix_web::test]
    async fn summary_reports_totals_and_skipped_files() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_dataset()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/summary").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["new_enrolments"], 75);
        assert_eq!(body["files"]["enrolment"]["skipped"], 1);
        assert_eq!(body["rows"]["biometric"], 1);
    }

    #[actix_web::test]
    async fn data_filters_by_state() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_dataset()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/data?category=enrolment&state=Bihar")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let rows = body.as_array().expect("array of rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["state"], "Bihar");

        let req = test::TestRequest::get().uri("/data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn pincode_ratios_carry_area_classification() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_dataset()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ratio/pincodes").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let rows = body.as_array().expect("array of pincodes");
        // one pincode clears the volume floor; alone it lands rural
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["pincode"], "843302");
        assert_eq!(rows[0]["class"], "Rural");
        assert_eq!(rows[0]["demo_adult"], 90);
        assert_eq!(rows[0]["bio_adult"], 70);
    }

    #[actix_web::test]
    async fn csv_download_has_csv_content_type() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_dataset()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/data/csv?category=enrolment")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let ct = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(ct.starts_with("text/csv"));
        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("date,state,district,pincode"));
        assert!(text.contains("age_18_greater"));
    }

    #[actix_web::test]
    async fn empty_category_answers_with_warning_not_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(Dataset::default())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/states").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["warning"].is_string());
    }
}
