use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use graphstore::GraphFacade;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let db_path = std::env::var("GRAPHSTORE_DB_PATH").unwrap_or_else(|_| "graphstore".to_string());
    info!(
        target: "graphstore",
        "graphstore starting: RUST_LOG='{}', db_path='{}'",
        rust_log, db_path
    );

    let mut facade = GraphFacade::new(&db_path)
        .ok_or_else(|| anyhow::anyhow!("invalid database path: {db_path}"))?;
    facade.database()?;
    info!(target: "graphstore", "database opened, ready");
    Ok(())
}
