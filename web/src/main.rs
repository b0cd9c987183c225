//! Homestead marketplace API server.
//!
//! Wires in-memory stores to the real collaborators when configured
//! (`PAYSTACK_SECRET_KEY`, `ASSISTANT_API_KEY`) and to the scriptable mocks
//! otherwise, so the server runs out of the box for development.

use anyhow::Context;
use homestead_core::assistant::{HttpTextGeneration, MockTextGeneration, TextGeneration};
use homestead_core::config::MarketplaceConfig;
use homestead_core::gateway::{MockPaymentGateway, PaymentGateway, PaystackGateway};
use homestead_web::{router, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MarketplaceConfig::from_env();

    let gateway: Arc<dyn PaymentGateway> = match PaystackGateway::from_env() {
        Ok(gateway) => {
            tracing::info!("using Paystack payment gateway");
            Arc::new(gateway)
        }
        Err(_) => {
            tracing::warn!("PAYSTACK_SECRET_KEY not set; using the mock payment gateway");
            Arc::new(MockPaymentGateway::new())
        }
    };

    let assistant: Arc<dyn TextGeneration> = match HttpTextGeneration::from_env() {
        Ok(assistant) => {
            tracing::info!("using HTTP text generation for assistant replies");
            Arc::new(assistant)
        }
        Err(_) => {
            tracing::warn!("ASSISTANT_API_KEY not set; using the canned assistant");
            Arc::new(MockTextGeneration::new())
        }
    };

    let state = AppState::in_memory(gateway, assistant, config);
    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;

    tracing::info!(port, "marketplace API listening");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
