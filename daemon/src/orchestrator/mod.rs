// Scheduler for built-in agents.
//
// Each started agent gets its own ticker task; cycles for one agent never
// overlap (a tick landing mid-cycle is dropped), while different agents run
// concurrently. All intent execution funnels through the shared `Executor`.

mod agent;
mod executor;
mod ledger;

pub use agent::{
    AgentConfigPatch, AgentInfo, AgentStatus, CreateAgentConfig, ExecutionSettings,
    ExecutionSettingsPatch,
};
pub use executor::{ExecutionError, Executor};
pub use ledger::{TransactionLedger, TransactionRecord, TransactionStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use aegis_common::{
    config::MAX_CONTEXT_SIGNATURES,
    crypto::Address,
    event::SystemEvent,
    intent::IntentEnvelope,
    time::{duration_until_local_midnight, get_current_time_in_millis, TimestampMillis},
    utils::generate_id,
};
use aegis_vault::{VaultError, WalletVault};

use crate::{
    chain::{ChainClient, ChainError},
    events::EventBus,
    history::IntentHistory,
    strategy::{AgentContext, Strategy, StrategyError, StrategyRegistry},
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("maximum number of agents ({0}) reached")]
    Capacity(usize),
    #[error("agent '{0}' not found")]
    AgentNotFound(String),
    #[error("agent '{0}' is already running")]
    AlreadyRunning(String),
    #[error("agent '{0}' is disabled; enable it before starting")]
    Disabled(String),
    #[error("invalid execution settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

struct TickerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct ManagedAgent {
    name: String,
    strategy_kind: String,
    wallet_id: String,
    wallet_public_key: Address,
    status: AgentStatus,
    strategy_params: Value,
    execution_settings: ExecutionSettings,
    created_at: TimestampMillis,
    last_action_at: Option<TimestampMillis>,
    error_message: Option<String>,
    actions_today: u32,
    strategy: Arc<AsyncMutex<Box<dyn Strategy>>>,
    cycle_in_progress: Arc<AtomicBool>,
    ticker: Option<TickerHandle>,
}

impl ManagedAgent {
    fn snapshot(&self, id: &str) -> AgentInfo {
        AgentInfo {
            id: id.to_owned(),
            name: self.name.clone(),
            strategy_kind: self.strategy_kind.clone(),
            wallet_id: self.wallet_id.clone(),
            wallet_public_key: self.wallet_public_key.clone(),
            status: self.status,
            strategy_params: self.strategy_params.clone(),
            execution_settings: self.execution_settings,
            created_at: self.created_at,
            last_action_at: self.last_action_at,
            error_message: self.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub total_agents: usize,
    pub running_agents: usize,
    pub total_wallets: usize,
    pub total_transactions: usize,
    pub confirmed_transactions: usize,
    pub failed_transactions: usize,
    pub intents_recorded: usize,
}

// Releases the per-agent non-overlap flag when a cycle ends on any path
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    vault: Arc<WalletVault>,
    chain: Arc<dyn ChainClient>,
    registry: Arc<StrategyRegistry>,
    events: Arc<EventBus>,
    history: Arc<IntentHistory>,
    ledger: Arc<TransactionLedger>,
    executor: Executor,
    agents: Mutex<HashMap<String, ManagedAgent>>,
    max_agents: usize,
}

impl Orchestrator {
    pub fn new(
        vault: Arc<WalletVault>,
        chain: Arc<dyn ChainClient>,
        registry: Arc<StrategyRegistry>,
        events: Arc<EventBus>,
        history: Arc<IntentHistory>,
        ledger: Arc<TransactionLedger>,
        max_agents: usize,
    ) -> Self {
        let executor = Executor::new(
            Arc::clone(&vault),
            Arc::clone(&chain),
            Arc::clone(&events),
            Arc::clone(&ledger),
            Arc::clone(&history),
        );
        Orchestrator {
            vault,
            chain,
            registry,
            events,
            history,
            ledger,
            executor,
            agents: Mutex::new(HashMap::new()),
            max_agents,
        }
    }

    fn agents(&self) -> MutexGuard<'_, HashMap<String, ManagedAgent>> {
        self.agents.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- agent lifecycle ---

    pub fn create_agent(&self, config: CreateAgentConfig) -> Result<AgentInfo, OrchestratorError> {
        let normalized = self
            .registry
            .validate_params(&config.strategy_kind, &config.strategy_params)?;

        let mut settings = ExecutionSettings::default();
        if let Some(patch) = &config.execution_settings {
            settings.apply(patch);
        }
        settings
            .validate()
            .map_err(OrchestratorError::InvalidSettings)?;

        let mut agents = self.agents();
        if agents.len() >= self.max_agents {
            return Err(OrchestratorError::Capacity(self.max_agents));
        }

        let wallet = self
            .vault
            .create_wallet(Some(format!("agent:{}", config.name)))?;

        // the factory can still reject parameter combinations the schema
        // cannot express; roll the wallet back in that case
        let strategy = match self.registry.build(&config.strategy_kind, &normalized) {
            Ok(strategy) => strategy,
            Err(factory_error) => {
                if let Err(delete_error) = self.vault.delete_wallet(&wallet.id) {
                    warn!(
                        "failed to roll back wallet {} after strategy factory error: {}",
                        wallet.id, delete_error
                    );
                }
                return Err(factory_error.into());
            }
        };

        let id = generate_id("agt");
        let params_value = serde_json::to_value(&normalized).unwrap_or(Value::Null);
        let agent = ManagedAgent {
            name: config.name.clone(),
            strategy_kind: config.strategy_kind.clone(),
            wallet_id: wallet.id.clone(),
            wallet_public_key: wallet.public_key.clone(),
            status: AgentStatus::Idle,
            strategy_params: params_value,
            execution_settings: settings,
            created_at: get_current_time_in_millis(),
            last_action_at: None,
            error_message: None,
            actions_today: 0,
            strategy: Arc::new(AsyncMutex::new(strategy)),
            cycle_in_progress: Arc::new(AtomicBool::new(false)),
            ticker: None,
        };
        let info = agent.snapshot(&id);
        agents.insert(id.clone(), agent);
        drop(agents);

        info!(
            "created agent {} ({}) with strategy {}",
            id, config.name, config.strategy_kind
        );
        self.events.emit(SystemEvent::AgentCreated {
            agent_id: id,
            name: config.name,
            strategy: config.strategy_kind,
            wallet_public_key: wallet.public_key,
        });
        Ok(info)
    }

    pub fn start_agent(self: &Arc<Self>, id: &str) -> Result<(), OrchestratorError> {
        let mut agents = self.agents();
        let agent = agents
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_owned()))?;
        if !agent.execution_settings.enabled {
            return Err(OrchestratorError::Disabled(id.to_owned()));
        }
        if agent.ticker.is_some() {
            return Err(OrchestratorError::AlreadyRunning(id.to_owned()));
        }

        agent.status = AgentStatus::Idle;
        agent.error_message = None;
        let interval = agent.execution_settings.cycle_interval_ms;
        // the first cycle runs immediately, then the cadence takes over
        agent.ticker = Some(self.spawn_ticker(id.to_owned(), interval, true));
        info!("started agent {} with a {}ms cadence", id, interval);
        Ok(())
    }

    pub fn stop_agent(&self, id: &str) -> Result<(), OrchestratorError> {
        let previous = {
            let mut agents = self.agents();
            let agent = agents
                .get_mut(id)
                .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_owned()))?;
            if let Some(ticker) = agent.ticker.take() {
                // the ticker loop exits after any in-flight cycle completes
                let _ = ticker.stop.send(true);
            }
            let previous = agent.status;
            agent.status = AgentStatus::Stopped;
            previous
        };
        info!("stopped agent {}", id);
        self.events.emit(SystemEvent::AgentStatusChanged {
            agent_id: id.to_owned(),
            status: AgentStatus::Stopped.to_string(),
            previous: Some(previous.to_string()),
        });
        Ok(())
    }

    pub async fn update_agent_config(
        self: &Arc<Self>,
        id: &str,
        patch: AgentConfigPatch,
    ) -> Result<AgentInfo, OrchestratorError> {
        // phase 1: validate against the registry and snapshot what we need
        let (strategy, strategy_kind) = {
            let agents = self.agents();
            let agent = agents
                .get(id)
                .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_owned()))?;
            (Arc::clone(&agent.strategy), agent.strategy_kind.clone())
        };

        let normalized = match &patch.strategy_params {
            Some(params) => Some(self.registry.validate_params(&strategy_kind, params)?),
            None => None,
        };

        // phase 2: apply parameters to the live strategy outside the map lock
        if let Some(normalized) = &normalized {
            strategy.lock().await.apply_params(normalized)?;
        }

        // phase 3: store settings and swap the ticker atomically
        let mut agents = self.agents();
        let agent = agents
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_owned()))?;

        if let Some(normalized) = normalized {
            agent.strategy_params = serde_json::to_value(&normalized).unwrap_or(Value::Null);
        }

        if let Some(settings_patch) = &patch.execution_settings {
            let mut updated = agent.execution_settings;
            updated.apply(settings_patch);
            updated
                .validate()
                .map_err(OrchestratorError::InvalidSettings)?;

            let interval_changed =
                updated.cycle_interval_ms != agent.execution_settings.cycle_interval_ms;
            agent.execution_settings = updated;

            if interval_changed {
                if let Some(old) = agent.ticker.take() {
                    let _ = old.stop.send(true);
                    old.task.abort();
                    // the new cadence takes effect at the next cycle, not now
                    agent.ticker =
                        Some(self.spawn_ticker(id.to_owned(), updated.cycle_interval_ms, false));
                    debug!(
                        "replaced ticker for {} with a {}ms cadence",
                        id, updated.cycle_interval_ms
                    );
                }
            }
        }

        Ok(agent.snapshot(id))
    }

    pub fn get_agent(&self, id: &str) -> Result<AgentInfo, OrchestratorError> {
        self.agents()
            .get(id)
            .map(|agent| agent.snapshot(id))
            .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_owned()))
    }

    pub fn get_all_agents(&self) -> Vec<AgentInfo> {
        self.agents()
            .iter()
            .map(|(id, agent)| agent.snapshot(id))
            .collect()
    }

    pub fn get_agent_transactions(&self, id: &str) -> Vec<Arc<TransactionRecord>> {
        self.ledger.for_agent(id)
    }

    pub fn get_all_transactions(&self) -> Vec<Arc<TransactionRecord>> {
        self.ledger.all()
    }

    pub fn get_stats(&self) -> OrchestratorStats {
        let agents = self.agents();
        OrchestratorStats {
            total_agents: agents.len(),
            running_agents: agents.values().filter(|a| a.ticker.is_some()).count(),
            total_wallets: self.vault.wallet_count(),
            total_transactions: self.ledger.len(),
            confirmed_transactions: self.ledger.count_by_status(TransactionStatus::Confirmed),
            failed_transactions: self.ledger.count_by_status(TransactionStatus::Failed),
            intents_recorded: self.history.len(),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    // --- cycle machinery ---

    fn spawn_ticker(
        self: &Arc<Self>,
        agent_id: String,
        interval_ms: u64,
        immediate_first_cycle: bool,
    ) -> TickerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            let period = Duration::from_millis(interval_ms);
            let start = if immediate_first_cycle {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + period
            };
            let mut ticker = tokio::time::interval_at(start, period);
            // ticks that land while a cycle is running must be dropped
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        orchestrator.run_cycle(&agent_id).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        TickerHandle {
            stop: stop_tx,
            task,
        }
    }

    /// One decide→(maybe execute) round for an agent. Public so tests and
    /// the immediate-first-cycle path can drive it directly.
    pub async fn run_cycle(self: &Arc<Self>, agent_id: &str) {
        let snapshot = {
            let agents = self.agents();
            let Some(agent) = agents.get(agent_id) else {
                return;
            };
            if agent.status == AgentStatus::Stopped {
                return;
            }
            (
                agent.wallet_id.clone(),
                agent.wallet_public_key.clone(),
                Arc::clone(&agent.strategy),
                Arc::clone(&agent.cycle_in_progress),
                agent.execution_settings.max_actions_per_day,
                agent.actions_today,
            )
        };
        let (wallet_id, public_key, strategy, flag, max_actions, actions_today) = snapshot;

        // non-overlap guarantee: a tick firing mid-cycle is dropped
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("cycle already in flight for {}, dropping tick", agent_id);
            return;
        }
        let _guard = CycleGuard(flag);

        self.set_status(agent_id, AgentStatus::Thinking);

        if actions_today >= max_actions {
            self.events.emit(SystemEvent::AgentAction {
                agent_id: agent_id.to_owned(),
                action: "decided_to_wait".to_owned(),
                reasoning: Some(format!(
                    "Daily action budget of {} exhausted",
                    max_actions
                )),
                data: Value::Null,
            });
            self.set_status(agent_id, AgentStatus::Waiting);
            return;
        }

        let ctx = match self.assemble_context(agent_id, &public_key).await {
            Ok(ctx) => ctx,
            Err(e) => {
                self.fail_agent(agent_id, format!("context assembly failed: {}", e));
                return;
            }
        };

        let decision = strategy.lock().await.decide(&ctx);
        let action = if decision.should_act {
            "decided_to_act"
        } else {
            "decided_to_wait"
        };
        self.events.emit(SystemEvent::AgentAction {
            agent_id: agent_id.to_owned(),
            action: action.to_owned(),
            reasoning: Some(decision.reasoning.clone()),
            data: decision
                .intent
                .as_ref()
                .map(|intent| json!({ "intent": intent }))
                .unwrap_or(Value::Null),
        });

        if decision.should_act {
            if let Some(intent) = decision.intent {
                self.set_status(agent_id, AgentStatus::Executing);
                let envelope = IntentEnvelope {
                    id: generate_id("int"),
                    agent_id: agent_id.to_owned(),
                    timestamp: get_current_time_in_millis(),
                    intent,
                };
                match self
                    .executor
                    .execute(&envelope, &wallet_id, &public_key, ctx.balance)
                    .await
                {
                    Ok(_) => {
                        if let Ok(after) = self.chain.get_balance(&public_key).await {
                            if after.raw_units != ctx.balance {
                                self.events.emit(SystemEvent::BalanceChanged {
                                    wallet_id: wallet_id.clone(),
                                    public_key: public_key.clone(),
                                    previous: ctx.balance,
                                    current: after.raw_units,
                                });
                            }
                        }
                    }
                    Err(e) if e.is_policy() => {
                        // recorded as a rejected intent; the agent keeps running
                        warn!("agent {} intent rejected by policy: {}", agent_id, e);
                    }
                    Err(e) => {
                        self.record_action(agent_id, true);
                        self.fail_agent(agent_id, e.to_string());
                        return;
                    }
                }
            }
        }

        self.record_action(agent_id, decision.should_act);
        self.set_status(agent_id, AgentStatus::Idle);
    }

    async fn assemble_context(
        &self,
        agent_id: &str,
        public_key: &Address,
    ) -> Result<AgentContext, ChainError> {
        let balance = self.chain.get_balance(public_key).await?;
        // token balances and signature history are best-effort context
        let token_balances = self
            .chain
            .get_token_balances(public_key)
            .await
            .unwrap_or_default();
        let recent_signatures = self
            .chain
            .get_recent_signatures(public_key, MAX_CONTEXT_SIGNATURES)
            .await
            .unwrap_or_default();
        Ok(AgentContext {
            agent_id: agent_id.to_owned(),
            public_key: public_key.clone(),
            balance: balance.raw_units,
            token_balances,
            recent_signatures,
        })
    }

    fn set_status(&self, agent_id: &str, status: AgentStatus) {
        let previous = {
            let mut agents = self.agents();
            let Some(agent) = agents.get_mut(agent_id) else {
                return;
            };
            if agent.status == status {
                return;
            }
            let previous = agent.status;
            agent.status = status;
            previous
        };
        self.events.emit(SystemEvent::AgentStatusChanged {
            agent_id: agent_id.to_owned(),
            status: status.to_string(),
            previous: Some(previous.to_string()),
        });
    }

    fn fail_agent(&self, agent_id: &str, message: String) {
        error!("agent {} errored: {}", agent_id, message);
        {
            let mut agents = self.agents();
            if let Some(agent) = agents.get_mut(agent_id) {
                agent.status = AgentStatus::Error;
                agent.error_message = Some(message.clone());
            }
        }
        self.events.emit(SystemEvent::SystemError {
            component: "orchestrator".to_owned(),
            message,
        });
    }

    fn record_action(&self, agent_id: &str, acted: bool) {
        let mut agents = self.agents();
        if let Some(agent) = agents.get_mut(agent_id) {
            agent.last_action_at = Some(get_current_time_in_millis());
            if acted {
                agent.actions_today = agent.actions_today.saturating_add(1);
            }
        }
    }

    // --- daily reset & shutdown ---

    /// One-shot timer at the next local midnight invoking every managed
    /// strategy's reset hook, then rescheduling itself.
    pub fn spawn_daily_reset(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wait = duration_until_local_midnight();
                debug!("next strategy daily reset in {:?}", wait);
                tokio::time::sleep(wait).await;
                orchestrator.run_daily_reset().await;
            }
        })
    }

    pub async fn run_daily_reset(&self) {
        let strategies: Vec<(String, Arc<AsyncMutex<Box<dyn Strategy>>>)> = {
            let mut agents = self.agents();
            for agent in agents.values_mut() {
                agent.actions_today = 0;
            }
            agents
                .iter()
                .map(|(id, agent)| (id.clone(), Arc::clone(&agent.strategy)))
                .collect()
        };
        for (id, strategy) in strategies {
            strategy.lock().await.daily_reset();
            debug!("daily reset applied to agent {}", id);
        }
        info!(
            "strategy daily counters reset at local midnight (host-process local time)"
        );
    }

    /// Cancel all tickers and mark every agent stopped. In-flight cycles run
    /// to completion before their ticker task exits.
    pub async fn shutdown(&self) {
        let tickers: Vec<(String, TickerHandle)> = {
            let mut agents = self.agents();
            agents
                .iter_mut()
                .filter_map(|(id, agent)| {
                    agent.status = AgentStatus::Stopped;
                    agent.ticker.take().map(|t| (id.clone(), t))
                })
                .collect()
        };
        for (id, ticker) in tickers {
            let _ = ticker.stop.send(true);
            if ticker.task.await.is_err() {
                warn!("ticker task for {} ended abnormally", id);
            }
        }
        info!("orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use aegis_common::network::Network;
    use serde_json::json;

    fn orchestrator(max_agents: usize) -> (Arc<Orchestrator>, Arc<MockChainClient>, Arc<WalletVault>) {
        let vault = Arc::new(WalletVault::new("orchestrator-test-pass").unwrap());
        let chain = Arc::new(MockChainClient::new(Network::Devnet));
        let registry = Arc::new(StrategyRegistry::with_builtins());
        let events = Arc::new(EventBus::default());
        let history = Arc::new(IntentHistory::default());
        let ledger = Arc::new(TransactionLedger::default());
        let chain_dyn: Arc<dyn ChainClient> = chain.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&vault),
            chain_dyn,
            registry,
            events,
            history,
            ledger,
            max_agents,
        ));
        (orchestrator, chain, vault)
    }

    fn accumulator_config(name: &str) -> CreateAgentConfig {
        CreateAgentConfig {
            name: name.to_owned(),
            strategy_kind: "accumulator".to_owned(),
            strategy_params: json!({}),
            execution_settings: None,
        }
    }

    #[tokio::test]
    async fn capacity_is_enforced_without_leaking_wallets() {
        let (orchestrator, _chain, vault) = orchestrator(1);
        orchestrator.create_agent(accumulator_config("one")).unwrap();
        assert_eq!(vault.wallet_count(), 1);

        let err = orchestrator
            .create_agent(accumulator_config("two"))
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Capacity(1)));
        // the capacity check runs before wallet creation
        assert_eq!(vault.wallet_count(), 1);
    }

    #[tokio::test]
    async fn factory_failure_rolls_back_the_wallet() {
        let (orchestrator, _chain, vault) = orchestrator(4);
        // empty recipient list passes the schema but fails the factory
        let err = orchestrator
            .create_agent(CreateAgentConfig {
                name: "dist".to_owned(),
                strategy_kind: "distributor".to_owned(),
                strategy_params: json!({"recipients": []}),
                execution_settings: None,
            })
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Strategy(_)));
        assert_eq!(vault.wallet_count(), 0);
    }

    #[tokio::test]
    async fn unknown_strategy_is_rejected_before_wallet_creation() {
        let (orchestrator, _chain, vault) = orchestrator(4);
        let err = orchestrator
            .create_agent(CreateAgentConfig {
                name: "x".to_owned(),
                strategy_kind: "flashloan".to_owned(),
                strategy_params: json!({}),
                execution_settings: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Strategy(StrategyError::UnknownStrategy(_))
        ));
        assert_eq!(vault.wallet_count(), 0);
    }

    #[tokio::test]
    async fn starting_a_disabled_or_running_agent_fails() {
        let (orchestrator, _chain, _vault) = orchestrator(4);
        let info = orchestrator
            .create_agent(CreateAgentConfig {
                execution_settings: Some(ExecutionSettingsPatch {
                    enabled: Some(false),
                    ..Default::default()
                }),
                ..accumulator_config("agent")
            })
            .unwrap();
        assert!(matches!(
            orchestrator.start_agent(&info.id),
            Err(OrchestratorError::Disabled(_))
        ));

        orchestrator
            .update_agent_config(
                &info.id,
                AgentConfigPatch {
                    execution_settings: Some(ExecutionSettingsPatch {
                        enabled: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        orchestrator.start_agent(&info.id).unwrap();
        assert!(matches!(
            orchestrator.start_agent(&info.id),
            Err(OrchestratorError::AlreadyRunning(_))
        ));
        orchestrator.stop_agent(&info.id).unwrap();
        assert_eq!(
            orchestrator.get_agent(&info.id).unwrap().status,
            AgentStatus::Stopped
        );
    }
}
