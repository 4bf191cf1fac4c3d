// src/view.rs
//! Server-rendered HTML for the sidebar and the dashboard panels.
use crate::dashboard::DashboardState;
use crate::models::{LoadingState, StockData, WatchListItem};
use pulldown_cmark::{html, Event, Options, Parser};
use std::fmt::Write;

const STYLE: &str = r#"
body{margin:0;display:flex;min-height:100vh;background:#0f172a;color:#f1f5f9;font-family:sans-serif}
aside{width:16rem;border-right:1px solid #1e293b;padding:1.5rem;box-sizing:border-box}
aside .brand{font-size:1.25rem;font-weight:700;color:#60a5fa;margin-bottom:2rem}
aside h4{font-size:.75rem;text-transform:uppercase;color:#64748b;letter-spacing:.05em}
aside a{display:flex;justify-content:space-between;padding:.75rem 1rem;border-radius:.75rem;color:#94a3b8;text-decoration:none;border:1px solid transparent}
aside a.active{background:rgba(37,99,235,.1);border-color:rgba(37,99,235,.3);color:#60a5fa}
aside small{display:block;opacity:.7}
main{flex:1;padding:1.5rem}
header{display:flex;justify-content:space-between;align-items:center;margin-bottom:1.5rem}
input{background:#1e293b;border:1px solid #334155;color:#f1f5f9;padding:.5rem 1rem;border-radius:.5rem;width:20rem}
button{background:#1e293b;border:0;color:#94a3b8;padding:.5rem 1rem;border-radius:.5rem;cursor:pointer}
.cards{display:grid;grid-template-columns:repeat(4,1fr);gap:1rem;margin-bottom:1.5rem}
.card{background:rgba(30,41,59,.5);border:1px solid #334155;border-radius:1rem;padding:1.5rem}
.card h2{font-size:.875rem;color:#94a3b8;margin:0 0 .25rem}
.big{font-size:2rem;font-weight:700}
.up{color:#34d399}.down{color:#f87171}
.grid{display:grid;grid-template-columns:2fr 1fr;gap:1.5rem}
.panel{background:rgba(30,41,59,.3);border:1px solid #334155;border-radius:.75rem;padding:1.5rem;max-height:24rem;overflow-y:auto}
.notice{padding:4rem;text-align:center;color:#64748b}
.error{background:rgba(239,68,68,.1);border:1px solid rgba(239,68,68,.5);color:#fecaca;padding:1rem;border-radius:.75rem}
.sources a{color:#60a5fa;font-size:.75rem}
"#;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `+1.20%` / `-2.10%`.
pub fn signed_percent(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, value)
}

/// `+1.23` / `-0.50` / `0.00`; zero carries no sign.
pub fn signed_change(value: f64) -> String {
    let sign = if value > 0.0 { "+" } else { "" };
    format!("{}{:.2}", sign, value)
}

pub fn render_sidebar(watchlist: &[WatchListItem], current_symbol: &str) -> String {
    let mut html = String::new();
    html.push_str("<aside><div class=\"brand\">NovaTrade</div><h4>Watchlist</h4>");
    for item in watchlist {
        let active = if item.symbol == current_symbol {
            " class=\"active\""
        } else {
            ""
        };
        let direction = if item.change_percent >= 0.0 { "up" } else { "down" };
        let _ = write!(
            html,
            "<a href=\"/select/{sym}\"{active}><span><strong>{sym}</strong><small>{name}</small></span><span class=\"{direction}\">{pct}</span></a>",
            sym = escape_html(&item.symbol),
            active = active,
            name = escape_html(&item.name),
            direction = direction,
            pct = signed_percent(item.change_percent),
        );
    }
    html.push_str("</aside>");
    html
}

fn render_header(state: &DashboardState) -> String {
    let disabled = if state.status == LoadingState::Loading {
        " disabled"
    } else {
        ""
    };
    format!(
        "<header><form method=\"post\" action=\"/search\"><input type=\"text\" name=\"symbol\" value=\"{}\" placeholder=\"Search symbol (e.g. AAPL, BTC)...\"></form>\
         <form method=\"post\" action=\"/refresh\"><button type=\"submit\"{}>Refresh</button></form></header>",
        escape_html(&state.search_input),
        disabled
    )
}

/// Renders the model's Markdown answer. Raw HTML in it is shown as text.
pub fn render_summary(summary: &str) -> String {
    let parser = Parser::new_ext(summary, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn render_success(data: &StockData, live_price: f64) -> String {
    let direction = if data.is_positive() { "up" } else { "down" };
    let mut html = String::new();

    let _ = write!(
        html,
        "<section class=\"cards\">\
         <div class=\"card\"><h2>Current Price</h2><span class=\"big\">${price:.2}</span> <small>{currency}</small></div>\
         <div class=\"card\"><h2>Daily Change</h2><span class=\"big {direction}\">{change}</span> <span class=\"{direction}\">{pct:.2}%</span></div>\
         <div class=\"card\"><h2>Symbol</h2><div class=\"big\">{symbol}</div><small>Nasdaq &bull; Real-time</small></div>\
         <div class=\"card\"><h2>Market Cap</h2><div>{cap}</div></div>\
         </section>",
        price = live_price,
        currency = escape_html(&data.currency),
        direction = direction,
        change = signed_change(data.change),
        pct = data.change_percent,
        symbol = escape_html(&data.symbol),
        cap = escape_html(data.market_cap.as_deref().unwrap_or("N/A")),
    );

    html.push_str(
        "<section class=\"grid\"><div><h3>Price Performance</h3>\
         <img src=\"/chart.svg\" alt=\"Intraday price chart\" width=\"100%\"></div>",
    );
    html.push_str("<div class=\"panel\"><h3>Market Intelligence</h3>");
    html.push_str(&render_summary(&data.summary));

    if !data.grounding_sources.is_empty() {
        html.push_str("<div class=\"sources\"><h4>Sources</h4><ul>");
        for source in &data.grounding_sources {
            let _ = write!(
                html,
                "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
                escape_html(&source.url),
                escape_html(&source.title)
            );
        }
        html.push_str("</ul></div>");
    }
    html.push_str("</div></section>");
    html
}

fn render_body(state: &DashboardState) -> String {
    match (state.status, state.data.as_ref()) {
        (LoadingState::Error, _) => {
            "<div class=\"error\">Failed to load data. Please try searching again.</div>".to_string()
        }
        (LoadingState::Success, Some(data)) => render_success(data, state.live_price),
        (LoadingState::Loading, _) => {
            "<div class=\"notice\">Consulting Gemini Market Minds...</div>".to_string()
        }
        _ => "<div class=\"notice\">Search for a symbol to begin analysis</div>".to_string(),
    }
}

pub fn render_page(watchlist: &[WatchListItem], state: &DashboardState) -> String {
    let refresh = if state.status == LoadingState::Loading {
        "<meta http-equiv=\"refresh\" content=\"2\">"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>NovaTrade</title>{}<style>{}</style></head>\
         <body>{}<main>{}{}</main></body></html>",
        refresh,
        STYLE,
        render_sidebar(watchlist, &state.current_symbol),
        render_header(state),
        render_body(state)
    )
}
