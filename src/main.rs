// src/main.rs
mod api;
mod chart;
mod config;
mod dashboard;
mod error;
mod extract;
mod gemini;
mod market;
mod models;
mod ticker;
mod view;
mod watchlist;

#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::gemini::GeminiClient;
use crate::market::{GeminiMarket, MarketModel};
use env_logger::{Builder, Env};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    let client = match GeminiClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build model client: {}", e);
            return;
        }
    };
    info!("Using model {}", client.model());

    let model: Arc<dyn MarketModel> = Arc::new(GeminiMarket::new(client));
    let dashboard = Arc::new(Dashboard::new(
        model,
        &config.default_symbol,
        config.tick_interval,
    ));

    // The dashboard opens on the default symbol.
    let initial = dashboard.clone();
    let symbol = config.default_symbol.clone();
    tokio::spawn(async move { initial.select(&symbol).await });

    let routes = api::routes(dashboard.clone());
    let server = warp::serve(routes).try_bind_with_graceful_shutdown(config.bind_addr, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    });

    match server {
        Ok((addr, server)) => {
            info!("Server running on http://{}", addr);
            server.await;
        }
        Err(e) => error!("Failed to bind {}: {}", config.bind_addr, e),
    }

    dashboard.shutdown();
}
