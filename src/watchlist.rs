// src/watchlist.rs
use crate::models::WatchListItem;

const SEED: [(&str, &str, f64, f64); 5] = [
    ("AAPL", "Apple Inc.", 175.43, 1.2),
    ("NVDA", "NVIDIA Corp.", 875.20, 3.5),
    ("TSLA", "Tesla, Inc.", 168.90, -2.1),
    ("GOOGL", "Alphabet Inc.", 155.30, 0.8),
    ("MSFT", "Microsoft", 420.10, 1.1),
];

/// The watchlist shown in the sidebar. Seeded once and never refreshed.
pub fn initial_watchlist() -> Vec<WatchListItem> {
    SEED.iter()
        .map(|(symbol, name, price, change_percent)| WatchListItem {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: *price,
            change_percent: *change_percent,
        })
        .collect()
}
