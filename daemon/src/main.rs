use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::info;

use aegis_common::config::{
    DEFAULT_MAX_EVENT_HISTORY, DEFAULT_MAX_INTENT_HISTORY, DEFAULT_MAX_SUBSCRIBERS,
    DEFAULT_MAX_TRANSACTIONS, VERSION,
};
use aegis_vault::WalletVault;

use aegis_daemon::{
    api::{self, AppState},
    byoa::{ExternalAgentRegistry, IntentRouter, RateLimiter, WalletBinder},
    chain::{ChainClient, HttpChainClient},
    config::{CliArgs, DaemonConfig},
    events::EventBus,
    history::IntentHistory,
    orchestrator::{Orchestrator, TransactionLedger},
    strategy::StrategyRegistry,
};

fn init_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    let colors = fern::colors::ColoredLevelConfig::new()
        .info(fern::colors::Color::Green)
        .warn(fern::colors::Color::Yellow)
        .error(fern::colors::Color::Red)
        .debug(fern::colors::Color::Blue);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("actix_server", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = DaemonConfig::load(&args).context("invalid configuration")?;
    init_logger(config.log_level.to_filter()).context("logger init failed")?;

    info!(
        "aegis-daemon v{} starting on {} (rpc: {})",
        VERSION, config.network, config.rpc_url
    );

    // composition root, dependency order: bus -> strategies -> chain ->
    // vault -> orchestrator, then registry -> binder -> router
    let events = Arc::new(EventBus::new(
        DEFAULT_MAX_SUBSCRIBERS,
        DEFAULT_MAX_EVENT_HISTORY,
    ));
    let strategies = Arc::new(StrategyRegistry::with_builtins());
    let chain: Arc<dyn ChainClient> = Arc::new(
        HttpChainClient::new(
            config.rpc_url.clone(),
            config.network,
            config.max_retries,
            Duration::from_millis(config.confirmation_timeout_ms),
        )
        .context("chain client init failed")?,
    );
    let vault = Arc::new(
        WalletVault::new(&config.key_encryption_secret).context("vault init failed")?,
    );
    let history = Arc::new(IntentHistory::new(DEFAULT_MAX_INTENT_HISTORY));
    let ledger = Arc::new(TransactionLedger::new(DEFAULT_MAX_TRANSACTIONS));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&vault),
        Arc::clone(&chain),
        Arc::clone(&strategies),
        Arc::clone(&events),
        Arc::clone(&history),
        Arc::clone(&ledger),
        config.max_agents,
    ));
    let external_agents = Arc::new(ExternalAgentRegistry::new(config.max_agents));
    let binder = Arc::new(WalletBinder::new(
        Arc::clone(&vault),
        Arc::clone(&external_agents),
    ));
    let router = Arc::new(IntentRouter::new(
        Arc::clone(&external_agents),
        Arc::clone(&vault),
        Arc::clone(&chain),
        Arc::clone(&events),
        Arc::clone(&history),
        Arc::clone(&ledger),
        RateLimiter::default(),
    ));

    if chain.check_health().await.is_err() {
        log::warn!("chain rpc endpoint is not healthy yet, continuing anyway");
    }

    let reset_tasks = vec![vault.spawn_daily_reset(), orchestrator.spawn_daily_reset()];

    let state = AppState {
        config: Arc::new(config.clone()),
        vault,
        chain,
        strategies,
        orchestrator: Arc::clone(&orchestrator),
        external_agents,
        binder,
        router,
        events,
        history,
        started_at: Instant::now(),
    };

    let api_state = state.clone();
    let api_server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(api_state.clone()))
            .configure(api::configure)
    })
    .bind(("0.0.0.0", config.port))
    .with_context(|| format!("cannot bind api port {}", config.port))?
    .run();

    let ws_state = state.clone();
    let ws_server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(ws_state.clone()))
            .route("/ws", actix_web::web::get().to(api::ws::websocket))
    })
    .bind(("0.0.0.0", config.ws_port))
    .with_context(|| format!("cannot bind websocket port {}", config.ws_port))?
    .run();

    info!(
        "listening on :{} (http) and :{} (ws)",
        config.port, config.ws_port
    );

    // actix installs the SIGINT/SIGTERM handlers; both servers stop together
    let (api_result, ws_result) = tokio::join!(api_server, ws_server);

    // teardown in reverse construction order
    info!("shutting down");
    orchestrator.shutdown().await;
    for task in reset_tasks {
        task.abort();
    }

    api_result?;
    ws_result?;
    Ok(())
}
