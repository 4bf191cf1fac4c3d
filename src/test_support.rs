// src/test_support.rs
use crate::config::Config;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

pub type Captured = Arc<Mutex<Vec<Value>>>;

pub fn test_config(base_url: &str) -> Config {
    let base_url = base_url.to_string();
    Config::from_lookup(move |key| match key {
        "API_KEY" => Some("test-key".to_string()),
        "GEMINI_BASE_URL" => Some(base_url.clone()),
        "REQUEST_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap()
}

/// Starts a stand-in for the model API on an ephemeral port. `respond` sees the
/// request body and picks the status and JSON reply. Every call is recorded.
pub fn spawn_model_api<F>(respond: F) -> (String, Captured)
where
    F: Fn(&Value) -> (StatusCode, Value) + Clone + Send + Sync + 'static,
{
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let route = warp::post()
        .and(warp::path("models"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::header::<String>("x-goog-api-key"))
        .and(warp::body::json())
        .map(move |target: String, key: String, request: Value| {
            let (status, body) = respond(&request);
            sink.lock()
                .unwrap()
                .push(json!({ "target": target, "key": key, "request": request }));
            warp::reply::with_status(warp::reply::json(&body), status)
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (format!("http://{}", addr), captured)
}
