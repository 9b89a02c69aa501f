// REST surface. Every response rides the `{success, data?, error?,
// timestamp}` envelope; admin endpoints check `X-Admin-Key`, BYOA intent
// submission authenticates a bearer control token.

mod error;
pub mod ws;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Instant;

use actix_web::{
    web::{self, Data, Json, Path, Query, ServiceConfig},
    HttpRequest, HttpResponse,
};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::{Deserialize, Serialize};

use aegis_common::{
    api::ApiResponse,
    config::VERSION,
    crypto::constant_time_eq,
    intent::{ExternalIntentRequest, IntentStatus},
};
use aegis_vault::WalletVault;

use crate::{
    byoa::{ExternalAgentRegistry, IntentRouter, Registration, WalletBinder},
    chain::ChainClient,
    config::DaemonConfig,
    events::EventBus,
    history::IntentHistory,
    orchestrator::{
        AgentConfigPatch, CreateAgentConfig, Orchestrator, OrchestratorStats,
    },
    strategy::StrategyRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DaemonConfig>,
    pub vault: Arc<WalletVault>,
    pub chain: Arc<dyn ChainClient>,
    pub strategies: Arc<StrategyRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub external_agents: Arc<ExternalAgentRegistry>,
    pub binder: Arc<WalletBinder>,
    pub router: Arc<IntentRouter>,
    pub events: Arc<EventBus>,
    pub history: Arc<IntentHistory>,
    pub started_at: Instant,
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .route("/stats", web::get().to(stats))
            .route("/agents", web::get().to(list_agents))
            .route("/agents", web::post().to(create_agent))
            .route("/agents/{id}", web::get().to(get_agent))
            .route("/agents/{id}/config", web::patch().to(update_agent_config))
            .route("/agents/{id}/start", web::post().to(start_agent))
            .route("/agents/{id}/stop", web::post().to(stop_agent))
            .route("/transactions", web::get().to(list_transactions))
            .route("/events", web::get().to(list_events))
            .route("/intents", web::get().to(list_intents))
            .route("/strategies", web::get().to(list_strategies))
            .route("/strategies/{name}", web::get().to(get_strategy))
            .route("/byoa/register", web::post().to(register_external_agent))
            .route("/byoa/intents", web::post().to(submit_intent))
            .route("/byoa/agents", web::get().to(list_external_agents))
            .route("/byoa/agents/{id}", web::get().to(get_external_agent))
            .route(
                "/byoa/agents/{id}/intents",
                web::get().to(external_agent_intents),
            )
            .route(
                "/byoa/agents/{id}/activate",
                web::post().to(activate_external_agent),
            )
            .route(
                "/byoa/agents/{id}/deactivate",
                web::post().to(deactivate_external_agent),
            )
            .route(
                "/byoa/agents/{id}/revoke",
                web::post().to(revoke_external_agent),
            )
            .route("/explorer/{signature}", web::get().to(explorer_url)),
    );
}

// Admin endpoints are gated on a client-supplied header compared in
// constant time against the configured key.
fn require_admin(req: &HttpRequest, state: &AppState) -> Result<(), ApiError> {
    let Some(configured) = state.config.admin_api_key.as_deref() else {
        return Err(ApiError::Forbidden(
            "admin endpoints are disabled: no ADMIN_API_KEY configured".to_owned(),
        ));
    };
    let supplied = req
        .headers()
        .get("X-Admin-Key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !constant_time_eq(supplied.as_bytes(), configured.as_bytes()) {
        return Err(ApiError::Forbidden("invalid admin key".to_owned()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CountQuery {
    count: Option<usize>,
}

const DEFAULT_LIST_COUNT: usize = 50;

// --- system ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    network: String,
    chain_healthy: bool,
    uptime_secs: u64,
}

async fn health(state: Data<AppState>) -> HttpResponse {
    let chain_healthy = state.chain.check_health().await.is_ok();
    HttpResponse::Ok().json(ApiResponse::ok(HealthResponse {
        status: "ok",
        version: VERSION,
        network: state.config.network.to_string(),
        chain_healthy,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(flatten)]
    orchestrator: OrchestratorStats,
    external_agents: usize,
    active_external_agents: usize,
    uptime_secs: u64,
}

async fn stats(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(StatsResponse {
        orchestrator: state.orchestrator.get_stats(),
        external_agents: state.external_agents.agent_count(),
        active_external_agents: state.external_agents.get_active().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

// --- built-in agents ---

async fn list_agents(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.orchestrator.get_all_agents()))
}

async fn get_agent(state: Data<AppState>, id: Path<String>) -> Result<HttpResponse, ApiError> {
    let agent = state.orchestrator.get_agent(&id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(agent)))
}

async fn create_agent(
    req: HttpRequest,
    state: Data<AppState>,
    body: Json<CreateAgentConfig>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    let info = state.orchestrator.create_agent(body.into_inner())?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(info)))
}

async fn update_agent_config(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
    body: Json<AgentConfigPatch>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    let info = state
        .orchestrator
        .update_agent_config(&id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(info)))
}

async fn start_agent(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    state.orchestrator.start_agent(&id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.orchestrator.get_agent(&id)?)))
}

async fn stop_agent(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    state.orchestrator.stop_agent(&id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.orchestrator.get_agent(&id)?)))
}

// --- observation ---

async fn list_transactions(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.orchestrator.get_all_transactions()))
}

async fn list_events(state: Data<AppState>, query: Query<CountQuery>) -> HttpResponse {
    let count = query.count.unwrap_or(DEFAULT_LIST_COUNT);
    HttpResponse::Ok().json(ApiResponse::ok(state.events.get_recent_events(count)))
}

async fn list_intents(state: Data<AppState>, query: Query<CountQuery>) -> HttpResponse {
    let count = query.count.unwrap_or(DEFAULT_LIST_COUNT);
    HttpResponse::Ok().json(ApiResponse::ok(state.history.recent(count)))
}

async fn list_strategies(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.strategies.list_dtos()))
}

async fn get_strategy(
    state: Data<AppState>,
    name: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let dto = state
        .strategies
        .to_dto(&name)
        .ok_or_else(|| ApiError::NotFound(format!("strategy '{}' not found", name)))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(dto)))
}

// --- BYOA ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterExternalAgentResponse {
    agent_id: String,
    // returned exactly once, never retrievable again
    control_token: String,
    wallet_id: String,
    wallet_public_key: aegis_common::crypto::Address,
}

async fn register_external_agent(
    req: HttpRequest,
    state: Data<AppState>,
    body: Json<Registration>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    let receipt = state.external_agents.register(body.into_inner())?;
    let (wallet_id, wallet_public_key) = state.binder.bind_new_wallet(&receipt.agent_id)?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(RegisterExternalAgentResponse {
        agent_id: receipt.agent_id,
        control_token: receipt.control_token,
        wallet_id,
        wallet_public_key,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitIntentRequest {
    // optional explicit target; must match the token's agent when present
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(flatten)]
    intent: ExternalIntentRequest,
}

async fn submit_intent(
    state: Data<AppState>,
    auth: BearerAuth,
    body: Json<SubmitIntentRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();

    if let Some(target) = &request.agent_id {
        let agent = state.router.authenticate(auth.token())?;
        if &agent.id != target {
            return Err(ApiError::Forbidden(format!(
                "token does not control agent '{}'",
                target
            )));
        }
    }

    let result = state
        .router
        .submit_intent(auth.token(), request.intent)
        .await?;

    // a policy/quota rejection is a well-formed result, not a transport error
    let status = match result.status {
        IntentStatus::Executed => HttpResponse::Ok(),
        IntentStatus::Rejected => HttpResponse::UnprocessableEntity(),
    };
    let mut response = status;
    Ok(response.json(ApiResponse::ok(result)))
}

async fn list_external_agents(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.external_agents.get_all()))
}

async fn get_external_agent(
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let agent = state.external_agents.get_agent(&id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(agent)))
}

async fn external_agent_intents(
    state: Data<AppState>,
    id: Path<String>,
    query: Query<CountQuery>,
) -> Result<HttpResponse, ApiError> {
    // 404 on unknown agents rather than an empty feed
    state.external_agents.get_agent(&id)?;
    let count = query.count.unwrap_or(DEFAULT_LIST_COUNT);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.history.for_agent(&id, count))))
}

async fn activate_external_agent(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.external_agents.activate(&id)?)))
}

async fn deactivate_external_agent(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.external_agents.deactivate(&id)?)))
}

async fn revoke_external_agent(
    req: HttpRequest,
    state: Data<AppState>,
    id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &state)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.external_agents.revoke(&id)?)))
}

// --- helpers ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerResponse {
    signature: String,
    url: String,
}

async fn explorer_url(state: Data<AppState>, signature: Path<String>) -> HttpResponse {
    let signature = signature.into_inner();
    let url = format!(
        "https://explorer.solana.com/tx/{}?cluster={}",
        signature,
        state.config.network.explorer_cluster()
    );
    HttpResponse::Ok().json(ApiResponse::ok(ExplorerResponse { signature, url }))
}
