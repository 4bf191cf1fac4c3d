// src/api.rs
use crate::chart::{render_svg, series_color};
use crate::dashboard::Dashboard;
use crate::error::{handle_rejection, CustomError};
use crate::view::render_page;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use warp::http::Uri;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 320;

#[derive(Deserialize)]
pub struct SearchForm {
    pub symbol: String,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub price: f64,
}

pub fn routes(
    dashboard: Arc<Dashboard>,
) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(index_handler);

    let select = warp::path!("select" / String)
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(select_handler);

    let search = warp::path("search")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::form())
        .and(with_dashboard(dashboard.clone()))
        .and_then(search_handler);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and_then(refresh_handler);

    let chart_svg = warp::path("chart.svg")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(chart_svg_handler);

    let watchlist = warp::path!("api" / "watchlist")
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .map(|dashboard: Arc<Dashboard>| warp::reply::json(&dashboard.watchlist()));

    let state = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(dashboard_handler);

    let stock = warp::path!("api" / "stock" / String)
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(stock_handler);

    let chart = warp::path!("api" / "chart" / String)
        .and(warp::get())
        .and(warp::query::<ChartQuery>())
        .and(with_dashboard(dashboard.clone()))
        .and_then(chart_handler);

    let ticks = warp::path!("ws" / "ticks")
        .and(warp::ws())
        .and(with_dashboard(dashboard))
        .map(|ws: warp::ws::Ws, dashboard: Arc<Dashboard>| {
            ws.on_upgrade(move |socket| tick_stream(socket, dashboard))
        });

    index
        .or(select)
        .or(search)
        .or(refresh)
        .or(chart_svg)
        .or(watchlist)
        .or(state)
        .or(stock)
        .or(chart)
        .or(ticks)
        .recover(handle_rejection)
}

fn with_dashboard(
    dashboard: Arc<Dashboard>,
) -> impl Filter<Extract = (Arc<Dashboard>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || dashboard.clone())
}

fn back_to_index() -> impl Reply {
    warp::redirect::see_other(Uri::from_static("/"))
}

/// Runs a dashboard action in the background so the request returns immediately.
fn spawn_action<F, Fut>(dashboard: Arc<Dashboard>, action: F)
where
    F: FnOnce(Arc<Dashboard>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(action(dashboard));
}

async fn index_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    let state = dashboard.snapshot().await;
    Ok(warp::reply::html(render_page(dashboard.watchlist(), &state)))
}

async fn select_handler(symbol: String, dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    info!("Symbol selected: {}", symbol);
    spawn_action(dashboard, move |d| async move { d.select(&symbol).await });
    Ok(back_to_index())
}

async fn search_handler(form: SearchForm, dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    if form.symbol.trim().is_empty() {
        debug!("Ignoring empty search");
    } else {
        info!("Search submitted: {}", form.symbol.trim());
        spawn_action(dashboard, move |d| async move {
            d.search(&form.symbol).await;
        });
    }
    Ok(back_to_index())
}

async fn refresh_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    spawn_action(dashboard, |d| async move { d.refresh().await });
    Ok(back_to_index())
}

async fn chart_svg_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    let state = dashboard.snapshot().await;
    let positive = state.data.as_ref().map(|d| d.is_positive()).unwrap_or(true);

    match render_svg(&state.chart, series_color(positive), CHART_WIDTH, CHART_HEIGHT) {
        // Same URL for every symbol; the browser must not reuse an earlier chart.
        Ok(svg) => Ok(warp::reply::with_header(
            warp::reply::with_header(svg, "content-type", "image/svg+xml"),
            "cache-control",
            "no-store",
        )),
        Err(e) => {
            error!("Failed to render chart: {}", e);
            Err(warp::reject::custom(CustomError::internal(&e)))
        }
    }
}

async fn dashboard_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&dashboard.snapshot().await))
}

async fn stock_handler(symbol: String, dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    match dashboard.model().fetch_stock_overview(&symbol).await {
        Ok(data) => Ok(warp::reply::json(&data)),
        Err(e) => {
            error!("Failed to fetch overview for {}: {}", symbol, e);
            Err(warp::reject::custom(CustomError::bad_gateway(&e)))
        }
    }
}

async fn chart_handler(
    symbol: String,
    query: ChartQuery,
    dashboard: Arc<Dashboard>,
) -> Result<impl Reply, Rejection> {
    let points = dashboard
        .model()
        .generate_intraday_chart(&symbol, query.price)
        .await;
    Ok(warp::reply::json(&points))
}

async fn tick_stream(socket: WebSocket, dashboard: Arc<Dashboard>) {
    let (mut tx, mut rx) = socket.split();
    let mut ticks = dashboard.subscribe();
    info!("Tick subscriber connected");

    loop {
        tokio::select! {
            tick = ticks.recv() => match tick {
                Ok(tick) => {
                    let payload = match serde_json::to_string(&tick) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!("Failed to encode tick: {}", e);
                            continue;
                        }
                    };
                    if tx.send(Message::text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Tick subscriber lagged, skipped {} ticks", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = rx.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Tick socket error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    info!("Tick subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::tests::{dashboard, StubModel};
    use crate::models::{LoadingState, Tick, WatchListItem};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use warp::http::StatusCode;

    async fn wait_for_status(d: &Arc<Dashboard>, status: LoadingState) {
        for _ in 0..100 {
            if d.snapshot().await.status == status {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("dashboard never reached {:?}", status);
    }

    #[tokio::test]
    async fn index_renders_idle_dashboard() {
        let d = dashboard(StubModel::new(&[]));
        let res = warp::test::request().path("/").reply(&routes(d)).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("NovaTrade"));
        assert!(body.contains("Search for a symbol to begin analysis"));
    }

    #[tokio::test]
    async fn watchlist_is_served_as_json() {
        let d = dashboard(StubModel::new(&[]));
        let res = warp::test::request()
            .path("/api/watchlist")
            .reply(&routes(d))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let list: Vec<WatchListItem> = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(list[1].symbol, "NVDA");
    }

    #[tokio::test]
    async fn select_redirects_and_loads_in_background() {
        let d = dashboard(StubModel::new(&[("GOOGL", 155.3)]));
        let res = warp::test::request()
            .path("/select/GOOGL")
            .reply(&routes(d.clone()))
            .await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/");
        wait_for_status(&d, LoadingState::Success).await;
        assert_eq!(d.snapshot().await.current_symbol, "GOOGL");

        let res = warp::test::request()
            .path("/api/dashboard")
            .reply(&routes(d))
            .await;
        let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["data"]["symbol"], "GOOGL");
        assert!(json.get("generation").is_none());
    }

    #[tokio::test]
    async fn search_form_loads_trimmed_symbol() {
        let d = dashboard(StubModel::new(&[("MSFT", 420.1)]));
        let res = warp::test::request()
            .method("POST")
            .path("/search")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("symbol=+MSFT+")
            .reply(&routes(d.clone()))
            .await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        wait_for_status(&d, LoadingState::Success).await;
        assert_eq!(d.snapshot().await.data.unwrap().symbol, "MSFT");
    }

    #[tokio::test]
    async fn failed_load_shows_error_panel() {
        let d = dashboard(StubModel::new(&[]));
        warp::test::request()
            .method("POST")
            .path("/refresh")
            .reply(&routes(d.clone()))
            .await;
        wait_for_status(&d, LoadingState::Error).await;

        let res = warp::test::request().path("/").reply(&routes(d)).await;
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("Failed to load data"));
    }

    #[tokio::test]
    async fn chart_svg_is_served() {
        let d = dashboard(StubModel::new(&[("AAPL", 175.43)]));
        d.select("AAPL").await;

        let res = warp::test::request().path("/chart.svg").reply(&routes(d)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "image/svg+xml");
        assert_eq!(res.headers()["cache-control"], "no-store");
        assert!(String::from_utf8_lossy(res.body()).contains("<svg"));
    }

    #[tokio::test]
    async fn stock_api_maps_failure_to_bad_gateway() {
        let d = dashboard(StubModel::new(&[("AAPL", 175.43)]));

        let ok = warp::test::request()
            .path("/api/stock/AAPL")
            .reply(&routes(d.clone()))
            .await;
        assert_eq!(ok.status(), StatusCode::OK);

        let res = warp::test::request()
            .path("/api/stock/ZZZZ")
            .reply(&routes(d))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(json["error"], "Failed to fetch stock data.");
    }

    #[tokio::test]
    async fn chart_api_requires_price() {
        let d = dashboard(StubModel::new(&[]));
        let ok = warp::test::request()
            .path("/api/chart/AAPL?price=12.5")
            .reply(&routes(d.clone()))
            .await;
        assert_eq!(ok.status(), StatusCode::OK);

        let missing = warp::test::request()
            .path("/api/chart/AAPL")
            .reply(&routes(d))
            .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let d = dashboard(StubModel::new(&[]));
        let res = warp::test::request().path("/nope").reply(&routes(d)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn websocket_streams_ticks() {
        let d = dashboard(StubModel::new(&[("AAPL", 175.43)]));
        let mut client = warp::test::ws()
            .path("/ws/ticks")
            .handshake(routes(d.clone()))
            .await
            .expect("handshake");

        d.select("AAPL").await;

        let msg = timeout(Duration::from_secs(2), client.recv())
            .await
            .expect("no tick within timeout")
            .expect("socket closed");
        let tick: Tick = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(tick.symbol, "AAPL");
    }
}
