use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use gci::{init_tracing_once, with_gci, GciOptions, GciStats, Interceptor};
use std::net::SocketAddr;
use std::sync::Arc;

/// Demo HTTP server with memory-pressure shedding in front of every route.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Demo server for the GC control interceptor")]
struct Args {
    /// HTTP port.
    #[clap(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Kilobytes each `/` request allocates and frees, to build up heap pressure.
    #[clap(long, env = "GCI_DEMO_ALLOC_KB", default_value_t = 64)]
    alloc_kb: usize,

    /// Overrides GCI_SHEDDING_THRESHOLD.
    #[clap(long)]
    threshold: Option<f64>,

    /// Overrides GCI_MIN_WINDOW / GCI_MAX_WINDOW, e.g. `--window 40 400`.
    #[clap(long, num_args = 2, value_names = ["MIN", "MAX"])]
    window: Option<Vec<u64>>,
}

#[derive(Clone)]
struct AppState {
    gci: Arc<Interceptor>,
    alloc_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing_once();
    let args = Args::parse();

    let mut opts = GciOptions::from_env()?;
    if let Some(t) = args.threshold {
        opts = opts.with_shedding_threshold(t);
    }
    if let Some([min, max]) = args.window.as_deref() {
        opts = opts.with_window_bounds(*min, *max);
    }
    // Fails fast on a bad configuration, before the listener exists.
    let gci = Arc::new(Interceptor::new(opts)?);
    tracing::info!(options = ?gci.options(), "interceptor ready");

    let state = AppState { gci: Arc::clone(&gci), alloc_bytes: args.alloc_kb * 1024 };
    let app = Router::new()
        .route("/", get(hello))
        .route("/gci/stats", get(stats))
        .with_state(state);
    let app = with_gci(app, gci);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn hello(State(state): State<AppState>) -> String {
    let buf = vec![1u8; state.alloc_bytes];
    let touched: usize = buf.iter().step_by(4096).map(|b| *b as usize).sum();
    format!("Hello World! ({touched} pages touched)\n")
}

async fn stats(State(state): State<AppState>) -> Json<GciStats> {
    Json(state.gci.stats())
}
