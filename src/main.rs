use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use opencount::config::CONFIG;
use opencount::core::Counter;
use opencount::state::Store;
use opencount::{api, bot};

#[tokio::main]
async fn main() -> opencount::Result<()> {
    tracing_subscriber::fmt::init();

    // Load persisted data
    let counter = Arc::new(Counter::open(Store::new(&CONFIG.stats_file)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let relay = bot::spawn(&CONFIG, Arc::clone(&counter), shutdown_rx.clone());

    let app = api::router(Arc::clone(&counter))
        .layer(api::cors_layer(&CONFIG.cors))
        .layer(TraceLayer::new_for_http());

    let addr = CONFIG.web_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Snapshot file: {}", CONFIG.stats_file.display());
    tracing::info!("Bot /stats restricted to admin: {}", CONFIG.admin_id.is_some());

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    if let Some(handle) = relay {
        if let Err(e) = handle.await {
            tracing::error!("Bot relay task failed: {}", e);
        }
    }

    // Final save on exit
    counter.persist().await?;
    tracing::info!("Saved {}", CONFIG.stats_file.display());
    Ok(())
}
