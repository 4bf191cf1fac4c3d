// src/market.rs
use crate::error::AppError;
use crate::extract::{change_percent, extract_change, extract_price};
use crate::gemini::{GeminiClient, GenerateContentRequest};
use crate::models::{ChartPoint, GroundingSource, StockData};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

pub const CHART_POINTS: usize = 30;
const NO_DATA: &str = "No data available.";

/// Source of market snapshots and intraday series.
#[async_trait]
pub trait MarketModel: Send + Sync {
    async fn fetch_stock_overview(&self, symbol: &str) -> Result<StockData, AppError>;

    /// Never fails: callers get a synthesized series when the source cannot deliver one.
    async fn generate_intraday_chart(&self, symbol: &str, current_price: f64) -> Vec<ChartPoint>;
}

pub struct GeminiMarket {
    client: GeminiClient,
}

impl GeminiMarket {
    pub fn new(client: GeminiClient) -> Self {
        GeminiMarket { client }
    }

    async fn request_chart(
        &self,
        symbol: &str,
        current_price: f64,
    ) -> Result<Vec<ChartPoint>, AppError> {
        let request = GenerateContentRequest::json(chart_prompt(symbol, current_price), chart_schema());
        let response = self.client.generate_content(&request).await?;
        let text = response.text().unwrap_or_else(|| "[]".to_string());
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl MarketModel for GeminiMarket {
    async fn fetch_stock_overview(&self, symbol: &str) -> Result<StockData, AppError> {
        let request = GenerateContentRequest::grounded(overview_prompt(symbol));
        let response = self.client.generate_content(&request).await.map_err(|e| {
            error!("Search-grounded overview for {} failed: {}", symbol, e);
            AppError::Overview
        })?;

        let text = response.text().unwrap_or_else(|| NO_DATA.to_string());
        let data = build_stock_data(symbol, text, response.grounding_sources());
        info!(
            "Overview for {}: price {:.2}, change {:.2} ({} sources)",
            data.symbol,
            data.price,
            data.change,
            data.grounding_sources.len()
        );
        Ok(data)
    }

    async fn generate_intraday_chart(&self, symbol: &str, current_price: f64) -> Vec<ChartPoint> {
        match self.request_chart(symbol, current_price).await {
            Ok(points) => points,
            Err(e) => {
                warn!("Chart generation for {} failed, using fallback: {}", symbol, e);
                let mut rng = StdRng::from_entropy();
                fallback_chart(current_price, &mut rng)
            }
        }
    }
}

pub fn overview_prompt(symbol: &str) -> String {
    format!(
        "Find the current real-time stock price for {symbol}.\n\
         Provide a response that includes:\n\
         1. The current price (in USD if applicable).\n\
         2. The change in price today (value and percentage).\n\
         3. The market cap.\n\
         4. A brief 2-3 sentence summary of why it is moving today (news/sentiment).\n\n\
         Ensure the numbers are clearly stated."
    )
}

pub fn chart_prompt(symbol: &str, current_price: f64) -> String {
    format!(
        "Generate a JSON array of {CHART_POINTS} data points representing the intraday stock price \
         movement for {symbol} leading up to the current price of {current_price}.\n\
         The data should simulate a realistic trading pattern (volatility, trends) for the last few hours.\n\
         Return ONLY the JSON array.\n\
         Format: {{ \"time\": \"HH:MM\", \"price\": number }}"
    )
}

fn chart_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "time": { "type": "STRING" },
                "price": { "type": "NUMBER" }
            },
            "required": ["time", "price"]
        }
    })
}

/// Turns the model's free-text answer into a snapshot. Unparseable numbers become zero.
pub fn build_stock_data(symbol: &str, summary: String, sources: Vec<GroundingSource>) -> StockData {
    let price = extract_price(&summary).unwrap_or(0.0);
    let change = extract_change(&summary).unwrap_or(0.0);

    StockData {
        symbol: symbol.to_uppercase(),
        price,
        change,
        change_percent: change_percent(price, change),
        currency: "USD".to_string(),
        market_cap: Some("N/A".to_string()),
        summary,
        grounding_sources: sources,
        last_updated: Utc::now(),
    }
}

/// Thirty points from 10:00 to 14:50 in ten-minute steps, scattered within
/// ±2.5 of `current_price`.
pub fn fallback_chart<R: Rng + ?Sized>(current_price: f64, rng: &mut R) -> Vec<ChartPoint> {
    (0..CHART_POINTS)
        .map(|i| ChartPoint {
            time: format!("{}:{:02}", 10 + i / 6, (i % 6) * 10),
            price: current_price + (rng.gen::<f64>() - 0.5) * 5.0,
        })
        .collect()
}
