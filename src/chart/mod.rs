use crate::aggregate::{self, DailyPoint};
use crate::load::Dataset;
use anyhow::{Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CHART_SIZE: (u32, u32) = (1280, 720);

/// Render every figure into fixed subdirectories under `out_dir`. Figures
/// whose source collection is empty are skipped with a warning rather than
/// failing the run.
pub fn render_all(dataset: &Dataset, out_dir: &Path) -> Result<()> {
    let regional = subdir(out_dir, "regional")?;
    let operational = subdir(out_dir, "operational")?;
    let societal = subdir(out_dir, "societal")?;

    let enrol = &dataset.enrolment.rows;
    let bio = &dataset.biometric.rows;
    let demo = &dataset.demographic.rows;

    if enrol.is_empty() {
        warn!("no enrolment data; skipping regional and cohort figures");
    } else {
        top_districts_chart(enrol, &regional.join("top_districts.png"))?;
        adult_share_chart(enrol, &societal.join("adult_share.png"))?;
        if !bio.is_empty() {
            compliance_chart(enrol, bio, &societal.join("compliance_5_17.png"))?;
        }
        if !bio.is_empty() || !demo.is_empty() {
            maintenance_gap_chart(enrol, bio, demo, &regional.join("maintenance_gap.png"))?;
        }
    }

    if demo.is_empty() {
        warn!("no demographic data; skipping operational figures");
    } else {
        daily_anomaly_chart(demo, &operational.join("daily_anomalies.png"))?;
        weekday_chart(demo, &operational.join("weekday_load.png"))?;
        monthly_chart(demo, &operational.join("monthly_trend.png"))?;
        forecast_chart(demo, &operational.join("weekly_forecast.png"))?;
    }

    if demo.is_empty() || bio.is_empty() {
        warn!("need both update categories; skipping ratio figures");
    } else {
        digital_ratio_chart(demo, bio, &societal.join("digital_ratio.png"))?;
        urban_rural_chart(demo, bio, &societal.join("urban_rural_ratio.png"))?;
    }

    info!("charts written under {}", out_dir.display());
    Ok(())
}

fn subdir(out_dir: &Path, name: &str) -> Result<PathBuf> {
    let dir = out_dir.join(name);
    fs::create_dir_all(&dir).with_context(|| format!("creating chart directory {}", dir.display()))?;
    Ok(dir)
}

/// Vertical bars over category labels; `colors` picks the fill per bar.
fn bar_chart(
    path: &Path,
    caption: &str,
    y_desc: &str,
    labels: &[String],
    values: &[i64],
    colors: &[RGBColor],
) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = values.iter().copied().max().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..labels.len() as i32, 0i64..y_max + y_max / 10)?;

    let labels_owned = labels.to_vec();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|x| {
            labels_owned
                .get(*x as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let color = colors.get(i).copied().unwrap_or(RGBColor(52, 152, 219));
        Rectangle::new([(i as i32, 0), (i as i32 + 1, *v)], color.filled())
    }))?;

    root.present()?;
    Ok(())
}

fn top_districts_chart(enrol: &[crate::load::EnrolmentRecord], path: &Path) -> Result<()> {
    let top = aggregate::top_districts(enrol, 15);
    let labels: Vec<String> = top.iter().map(|d| d.district.clone()).collect();
    let values: Vec<i64> = top.iter().map(|d| d.total).collect();
    let colors: Vec<RGBColor> = top
        .iter()
        .map(|d| {
            if d.border {
                RGBColor(255, 75, 75)
            } else {
                RGBColor(189, 195, 199)
            }
        })
        .collect();
    bar_chart(
        path,
        "Top Districts by Enrolment Volume (red = border zone)",
        "New enrolments",
        &labels,
        &values,
        &colors,
    )
}

fn adult_share_chart(enrol: &[crate::load::EnrolmentRecord], path: &Path) -> Result<()> {
    let shares = aggregate::adult_share_by_state(enrol, 10);
    let labels: Vec<String> = shares.iter().map(|s| s.state.clone()).collect();
    let values: Vec<i64> = shares.iter().map(|s| s.share_pct.round() as i64).collect();
    let colors = vec![RGBColor(231, 76, 60); labels.len()];
    bar_chart(
        path,
        "Adult (18+) Share of Enrolments by State",
        "Adult share (%)",
        &labels,
        &values,
        &colors,
    )
}

/// Grouped bars per state: 5-17 enrolments next to 5-17 biometric updates,
/// the gap between the pairs being the point of the figure.
fn compliance_chart(
    enrol: &[crate::load::EnrolmentRecord],
    bio: &[crate::load::UpdateRecord],
    path: &Path,
) -> Result<()> {
    let pairs = aggregate::compliance_5_17(enrol, bio, 10);
    if pairs.is_empty() {
        warn!("no school-age enrolments; skipping compliance figure");
        return Ok(());
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = pairs
        .iter()
        .map(|p| p.new_enrolments_5_17.max(p.bio_updates_5_17))
        .max()
        .unwrap_or(1)
        .max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "School-Age (5-17) Enrolments vs Mandatory Biometric Updates",
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..pairs.len() as f64, 0i64..y_max + y_max / 10)?;

    let labels: Vec<String> = pairs.iter().map(|p| p.state.clone()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(pairs.len())
        .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
        .y_desc("Transactions (5-17 band)")
        .draw()?;

    let enrol_color = RGBColor(52, 152, 219);
    let update_color = RGBColor(230, 126, 34);
    chart
        .draw_series(pairs.iter().enumerate().map(|(i, p)| {
            Rectangle::new(
                [(i as f64 + 0.1, 0), (i as f64 + 0.5, p.new_enrolments_5_17)],
                enrol_color.filled(),
            )
        }))?
        .label("new enrolments")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], enrol_color.filled()));
    chart
        .draw_series(pairs.iter().enumerate().map(|(i, p)| {
            Rectangle::new(
                [(i as f64 + 0.5, 0), (i as f64 + 0.9, p.bio_updates_5_17)],
                update_color.filled(),
            )
        }))?
        .label("biometric updates")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], update_color.filled()));
    chart.configure_series_labels().border_style(&BLACK).draw()?;

    root.present()?;
    Ok(())
}

/// Mean adult update ratio of the urban decile against the rural rest.
fn urban_rural_chart(
    demo: &[crate::load::UpdateRecord],
    bio: &[crate::load::UpdateRecord],
    path: &Path,
) -> Result<()> {
    let divide = aggregate::urban_rural_divide(demo, bio);
    if divide.is_empty() {
        warn!("no pincode cleared the volume floor; skipping urban/rural figure");
        return Ok(());
    }

    let mean_ratio = |class: aggregate::AreaClass| {
        let ratios: Vec<f64> = divide
            .iter()
            .filter(|p| p.class == class)
            .map(|p| p.ratio)
            .collect();
        if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        }
    };
    let values = [
        mean_ratio(aggregate::AreaClass::Urban),
        mean_ratio(aggregate::AreaClass::Rural),
    ];
    let labels = ["Urban", "Rural"];
    let colors = [RGBColor(52, 152, 219), RGBColor(46, 204, 113)];

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = values.iter().copied().fold(0.0, f64::max).max(1.0) * 1.1;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Urban vs Rural Adult Update Ratio (demo : bio)",
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..2f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&|x| labels.get(*x as usize).map(|s| s.to_string()).unwrap_or_default())
        .y_desc("Mean demographic updates per biometric update")
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        Rectangle::new(
            [(i as f64 + 0.25, 0.0), (i as f64 + 0.75, *v)],
            colors[i].filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn digital_ratio_chart(
    demo: &[crate::load::UpdateRecord],
    bio: &[crate::load::UpdateRecord],
    path: &Path,
) -> Result<()> {
    let ratios = aggregate::digital_ratio_by_district(demo, bio, 100, 10);
    if ratios.is_empty() {
        warn!("no district cleared the ratio volume floor; skipping figure");
        return Ok(());
    }
    let labels: Vec<String> = ratios.iter().map(|r| r.key.clone()).collect();
    let values: Vec<i64> = ratios.iter().map(|r| r.ratio.round() as i64).collect();
    let colors = vec![RGBColor(243, 156, 18); labels.len()];
    bar_chart(
        path,
        "Districts Ignoring Biometric Updates (demo : bio ratio)",
        "Demographic updates per biometric update",
        &labels,
        &values,
        &colors,
    )
}

fn daily_anomaly_chart(demo: &[crate::load::UpdateRecord], path: &Path) -> Result<()> {
    let points: Vec<DailyPoint> = aggregate::daily_spikes(demo);
    if points.is_empty() {
        warn!("no dated rows; skipping daily anomaly figure");
        return Ok(());
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = points.iter().map(|p| p.total).max().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption("Daily Load with Spike Anomalies (> mean + 2σ)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..points.len() as i32, 0i64..y_max + y_max / 10)?;

    let dates: Vec<String> = points.iter().map(|p| p.date.to_string()).collect();
    chart
        .configure_mesh()
        .x_label_formatter(&|x| dates.get(*x as usize).cloned().unwrap_or_default())
        .y_desc("Transactions per day")
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().enumerate().map(|(i, p)| (i as i32, p.total)),
        &RGBColor(128, 128, 128),
    ))?;
    chart.draw_series(
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.spike)
            .map(|(i, p)| Circle::new((i as i32, p.total), 5, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}

fn weekday_chart(demo: &[crate::load::UpdateRecord], path: &Path) -> Result<()> {
    let weekdays = aggregate::totals_by_weekday(demo);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = weekdays.iter().map(|(_, v)| *v).max().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption("Weekly Load Distribution", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..7i32, 0i64..y_max + y_max / 10)?;

    let names: Vec<String> = weekdays.iter().map(|(d, _)| d.to_string()).collect();
    chart
        .configure_mesh()
        .x_labels(7)
        .x_label_formatter(&|x| names.get(*x as usize).cloned().unwrap_or_default())
        .y_desc("Transactions")
        .draw()?;

    chart.draw_series(LineSeries::new(
        weekdays.iter().enumerate().map(|(i, (_, v))| (i as i32, *v)),
        RGBColor(31, 119, 180).stroke_width(3),
    ))?;
    chart.draw_series(
        weekdays
            .iter()
            .enumerate()
            .map(|(i, (_, v))| Circle::new((i as i32, *v), 4, RGBColor(31, 119, 180).filled())),
    )?;

    root.present()?;
    Ok(())
}

fn monthly_chart(demo: &[crate::load::UpdateRecord], path: &Path) -> Result<()> {
    let monthly = aggregate::totals_by_month(demo);
    if monthly.is_empty() {
        warn!("no dated rows; skipping monthly trend figure");
        return Ok(());
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = monthly.values().copied().max().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Transaction Trend", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..monthly.len() as i32, 0i64..y_max + y_max / 10)?;

    let labels: Vec<String> = monthly.keys().map(|d| d.format("%Y-%m").to_string()).collect();
    chart
        .configure_mesh()
        .x_labels(monthly.len())
        .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
        .y_desc("Transactions")
        .draw()?;

    chart.draw_series(AreaSeries::new(
        monthly.values().enumerate().map(|(i, v)| (i as i32, *v)),
        0,
        RGBColor(255, 75, 75).mix(0.4),
    ))?;

    root.present()?;
    Ok(())
}

fn forecast_chart(demo: &[crate::load::UpdateRecord], path: &Path) -> Result<()> {
    let forecast = match aggregate::forecast_weekly(demo, 12) {
        Some(f) => f,
        None => {
            warn!("fewer than four weeks of data; skipping forecast figure");
            return Ok(());
        }
    };

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let actual_max = forecast.actual.iter().map(|(_, v)| *v as f64).fold(0.0, f64::max);
    let projected_max = forecast.projected.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let y_max = actual_max.max(projected_max).max(1.0) * 1.1;
    let total_len = forecast.actual.len() + forecast.projected.len();

    let mut chart = ChartBuilder::on(&root)
        .caption("Weekly Load: Actuals and 12-Week Projection", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..total_len as i32, 0f64..y_max)?;

    let labels: Vec<String> = forecast
        .actual
        .iter()
        .map(|(d, _)| d.to_string())
        .chain(forecast.projected.iter().map(|(d, _)| d.to_string()))
        .collect();
    chart
        .configure_mesh()
        .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
        .y_desc("Weekly volume")
        .draw()?;

    let offset = forecast.actual.len();
    chart
        .draw_series(LineSeries::new(
            forecast
                .actual
                .iter()
                .enumerate()
                .map(|(i, (_, v))| (i as i32, *v as f64)),
            RGBColor(31, 119, 180).stroke_width(2),
        ))?
        .label("actual")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RGBColor(31, 119, 180)));
    chart
        .draw_series(LineSeries::new(
            forecast
                .projected
                .iter()
                .enumerate()
                .map(|(i, (_, v))| ((offset + i) as i32, *v)),
            GREEN.stroke_width(2),
        ))?
        .label("projected")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
    chart.configure_series_labels().border_style(&BLACK).draw()?;

    root.present()?;
    Ok(())
}

fn maintenance_gap_chart(
    enrol: &[crate::load::EnrolmentRecord],
    bio: &[crate::load::UpdateRecord],
    demo: &[crate::load::UpdateRecord],
    path: &Path,
) -> Result<()> {
    let gaps = aggregate::maintenance_gap(enrol, bio, demo);
    if gaps.is_empty() {
        warn!("no state cleared the enrolment floor; skipping maintenance-gap figure");
        return Ok(());
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = gaps.iter().map(|g| g.enrolments as f64).fold(0.0, f64::max) * 1.1;
    let y_max = gaps
        .iter()
        .map(|g| g.updates as f64)
        .fold(0.0, f64::max)
        .max(1.0)
        * 1.1;
    let mut chart = ChartBuilder::on(&root)
        .caption("Maintenance Gap: Growth vs Hygiene by State", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max.max(1.0), 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Total new enrolments")
        .y_desc("Total updates")
        .draw()?;

    chart.draw_series(gaps.iter().map(|g| {
        Circle::new(
            (g.enrolments as f64, g.updates as f64),
            6,
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}
