use anyhow::Result;
use std::{env, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uidaistats::{dashboard, load};

#[actix_web::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("dashboard startup");

    let data_root = env::var("UIDAI_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let bind_addr = env::var("UIDAI_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    // One load per session; restart to pick up new files.
    let dataset = load::load_dataset(&data_root)?;
    if dataset.is_empty() {
        anyhow::bail!(
            "no matching CSV files found under {}; nothing to serve",
            data_root.display()
        );
    }
    if dataset.files_skipped() > 0 {
        warn!(
            skipped = dataset.files_skipped(),
            "some extract files could not be read"
        );
    }

    dashboard::run_server(Arc::new(dataset), &bind_addr).await?;
    Ok(())
}
