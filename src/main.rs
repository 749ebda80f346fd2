use anyhow::Result;
use weatherboard_core::Config;

mod dashboard;
mod error_mapping;

use dashboard::Dashboard;

#[tokio::main]
async fn main() -> Result<()> {
    weatherboard_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    let mut dashboard = Dashboard::from_config(&config)?;

    tracing::info!("Weatherboard started for {}", dashboard.store().user_token());

    dashboard.startup().await;

    dashboard.print_summary();

    Ok(())
}
