use embarque_bridge::start_link;
use embarque_core::telemetry::init_tracing;
use embarque_core::{Embarque, EmbarqueConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = EmbarqueConfig::load();
    let mut embarque = Embarque::new(config)?;

    let dashboard_handle = if embarque.config.dashboard.enabled {
        let dashboard = embarque.dashboard();

        tracing::info!(
            "Dashboard enabled at http://{}",
            embarque.config.dashboard.addr()
        );

        Some(tokio::spawn(async move {
            if let Err(e) = dashboard.serve().await {
                tracing::error!("Dashboard error: {}", e);
            }
        }))
    } else {
        None
    };

    embarque.start().await?;

    // Blocks until the ingress queue goes away
    let link_result = start_link(
        embarque.config.transport.clone(),
        embarque.ingress(),
        embarque.state.clone(),
    )
    .await;

    embarque.shutdown().await?;
    if let Some(handle) = dashboard_handle {
        handle.abort();
    }

    link_result.map_err(|e| e.into())
}
