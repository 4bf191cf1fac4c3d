// src/ticker.rs
//! Local "live" price simulation. Purely cosmetic: a random walk on the displayed price.
use crate::dashboard::DashboardState;
use crate::models::{LoadingState, Tick};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Relative width of one step; each tick moves at most half of this either way.
pub const VOLATILITY: f64 = 0.0005;

pub fn next_tick<R: Rng + ?Sized>(prev: f64, rng: &mut R) -> f64 {
    let volatility = prev * VOLATILITY;
    prev + (rng.gen::<f64>() - 0.5) * volatility
}

/// Perturbs the dashboard's live price every `period` for as long as `generation`
/// is the current one and the dashboard is showing a loaded symbol.
pub fn spawn_simulation(
    state: Arc<RwLock<DashboardState>>,
    generation: u64,
    period: Duration,
    tx: broadcast::Sender<Tick>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = time::interval_at(Instant::now() + period, period);

        loop {
            interval.tick().await;
            let tick = {
                let mut state = state.write().await;
                if state.generation != generation || state.status != LoadingState::Success {
                    break;
                }
                let symbol = match state.data.as_ref() {
                    Some(data) => data.symbol.clone(),
                    None => break,
                };
                state.live_price = next_tick(state.live_price, &mut rng);
                Tick {
                    symbol,
                    price: state.live_price,
                }
            };
            // Nobody listening is fine; the dashboard state already holds the price.
            let _ = tx.send(tick);
        }

        debug!("Tick simulation for generation {} stopped", generation);
    })
}
