use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod handler;
mod http;
mod logger;
mod predictor;
mod server;

use predictor::{MandiPredictor, Predictor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional config path (without extension), defaults to ./config.toml
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Create Tokio runtime, sized by workers configuration
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let history_file = cfg.predictor.history_file.as_deref();
    let predictor = MandiPredictor::load(history_file.map(Path::new))?;
    logger::log_predictor_loaded(
        history_file.unwrap_or("built-in sample table"),
        predictor.commodities().len(),
    );

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(config::AppState::new(cfg, Arc::new(predictor)));
    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    server::serve(listener, state, shutdown).await?;
    Ok(())
}
