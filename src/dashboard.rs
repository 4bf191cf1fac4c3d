// src/dashboard.rs
use crate::market::MarketModel;
use crate::models::{ChartPoint, LoadingState, StockData, Tick, WatchListItem};
use crate::ticker::spawn_simulation;
use crate::watchlist::initial_watchlist;
use log::{error, info};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

const TICK_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Origin {
    Select,
    Search,
    Reload,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub current_symbol: String,
    pub search_input: String,
    pub status: LoadingState,
    pub data: Option<StockData>,
    pub chart: Vec<ChartPoint>,
    pub live_price: f64,
    /// Identifies the most recent load. Results of older loads are dropped.
    #[serde(skip)]
    pub generation: u64,
}

/// Selection and display state of the single dashboard view.
pub struct Dashboard {
    model: Arc<dyn MarketModel>,
    state: Arc<RwLock<DashboardState>>,
    watchlist: Vec<WatchListItem>,
    ticks: broadcast::Sender<Tick>,
    simulation: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

impl Dashboard {
    pub fn new(model: Arc<dyn MarketModel>, default_symbol: &str, tick_interval: Duration) -> Self {
        let (ticks, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        let state = DashboardState {
            current_symbol: default_symbol.to_string(),
            search_input: default_symbol.to_string(),
            ..DashboardState::default()
        };

        Dashboard {
            model,
            state: Arc::new(RwLock::new(state)),
            watchlist: initial_watchlist(),
            ticks,
            simulation: Mutex::new(None),
            tick_interval,
        }
    }

    pub fn model(&self) -> Arc<dyn MarketModel> {
        self.model.clone()
    }

    pub fn watchlist(&self) -> &[WatchListItem] {
        &self.watchlist
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        self.ticks.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    /// Selects `symbol` as the current symbol and loads it.
    pub async fn select(&self, symbol: &str) {
        let symbol = symbol.trim().to_uppercase();
        self.run_load(&symbol, Origin::Select).await;
    }

    /// Loads the trimmed input. Returns false when there was nothing to search for.
    pub async fn search(&self, input: &str) -> bool {
        let symbol = input.trim();
        if symbol.is_empty() {
            return false;
        }
        self.run_load(symbol, Origin::Search).await;
        true
    }

    /// Reloads whatever symbol is on display, falling back to the current selection.
    pub async fn refresh(&self) {
        let symbol = {
            let state = self.state.read().await;
            state
                .data
                .as_ref()
                .map(|d| d.symbol.clone())
                .unwrap_or_else(|| state.current_symbol.clone())
        };
        self.load(&symbol).await;
    }

    /// Runs one fetch-and-render cycle: overview, then chart, then the tick simulation.
    pub async fn load(&self, symbol: &str) {
        self.run_load(symbol, Origin::Reload).await;
    }

    async fn run_load(&self, symbol: &str, origin: Origin) {
        // Selection and generation change under one guard so the highlighted
        // symbol always belongs to the newest load.
        let generation = {
            let mut state = self.state.write().await;
            match origin {
                Origin::Select => {
                    state.current_symbol = symbol.to_string();
                    state.search_input = symbol.to_string();
                }
                Origin::Search => state.search_input = symbol.to_string(),
                Origin::Reload => {}
            }
            state.generation += 1;
            state.status = LoadingState::Loading;
            state.generation
        };
        self.stop_simulation();
        info!("Loading {} (generation {})", symbol, generation);

        let data = match self.model.fetch_stock_overview(symbol).await {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load {}: {}", symbol, e);
                let mut state = self.state.write().await;
                if state.generation == generation {
                    state.status = LoadingState::Error;
                } else {
                    info!("Dropping failed load of {}: superseded", symbol);
                }
                return;
            }
        };

        let price = data.price;
        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                info!("Dropping overview of {}: superseded", symbol);
                return;
            }
            state.live_price = price;
            state.data = Some(data);
        }

        let chart = self.model.generate_intraday_chart(symbol, price).await;
        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                info!("Dropping chart of {}: superseded", symbol);
                return;
            }
            state.chart = chart;
            state.status = LoadingState::Success;
        }

        self.start_simulation(generation);
    }

    fn start_simulation(&self, generation: u64) {
        let handle = spawn_simulation(
            self.state.clone(),
            generation,
            self.tick_interval,
            self.ticks.clone(),
        );
        if let Ok(mut slot) = self.simulation.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    fn stop_simulation(&self) {
        if let Ok(mut slot) = self.simulation.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    pub fn shutdown(&self) {
        self.stop_simulation();
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.stop_simulation();
    }
}
