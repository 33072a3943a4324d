use anyhow::Result;
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uidaistats::{chart, load};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) configure dirs ───────────────────────────────────────────
    let data_root = env::var("UIDAI_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let charts_dir = PathBuf::from("charts");

    // ─── 3) discover + load + normalize ──────────────────────────────
    let dataset = load::load_dataset(&data_root)?;
    if dataset.is_empty() {
        anyhow::bail!(
            "no matching CSV files found under {}; expected filenames containing \
             api_data_aadhar_enrolment, api_data_aadhar_biometric or api_data_aadhar_demographic",
            data_root.display()
        );
    }
    if dataset.files_skipped() > 0 {
        warn!(
            skipped = dataset.files_skipped(),
            "some extract files could not be read"
        );
    }

    // ─── 4) render figures ───────────────────────────────────────────
    chart::render_all(&dataset, &charts_dir)?;

    info!("all done");
    Ok(())
}
