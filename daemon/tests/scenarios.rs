// End-to-end scenarios over the orchestrator and the intent router,
// driven against the in-memory chain backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use aegis_common::{
    config::UNITS_PER_COIN,
    crypto::WalletKeypair,
    event::SystemEvent,
    intent::{ExternalIntentKind, ExternalIntentRequest, IntentStatus},
    network::Network,
};
use aegis_daemon::{
    byoa::{
        ExternalAgentKind, ExternalAgentRegistry, IntentRouter, RateLimiter, Registration,
        WalletBinder,
    },
    chain::{ChainClient, MockChainClient},
    events::EventBus,
    history::IntentHistory,
    orchestrator::{
        AgentConfigPatch, AgentStatus, CreateAgentConfig, ExecutionSettingsPatch, Orchestrator,
        TransactionLedger, TransactionStatus,
    },
    strategy::StrategyRegistry,
};
use aegis_vault::WalletVault;

struct Harness {
    orchestrator: Arc<Orchestrator>,
    chain: Arc<MockChainClient>,
    vault: Arc<WalletVault>,
    events: Arc<EventBus>,
    history: Arc<IntentHistory>,
    ledger: Arc<TransactionLedger>,
    external_agents: Arc<ExternalAgentRegistry>,
    binder: Arc<WalletBinder>,
    router: IntentRouter,
}

fn harness() -> Harness {
    let vault = Arc::new(WalletVault::new("scenario-test-passphrase").unwrap());
    let chain = Arc::new(MockChainClient::new(Network::Devnet));
    let chain_dyn: Arc<dyn ChainClient> = chain.clone();
    let registry = Arc::new(StrategyRegistry::with_builtins());
    let events = Arc::new(EventBus::default());
    let history = Arc::new(IntentHistory::default());
    let ledger = Arc::new(TransactionLedger::default());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&vault),
        Arc::clone(&chain_dyn),
        registry,
        Arc::clone(&events),
        Arc::clone(&history),
        Arc::clone(&ledger),
        10,
    ));
    let external_agents = Arc::new(ExternalAgentRegistry::new(10));
    let binder = Arc::new(WalletBinder::new(
        Arc::clone(&vault),
        Arc::clone(&external_agents),
    ));
    let router = IntentRouter::new(
        Arc::clone(&external_agents),
        Arc::clone(&vault),
        Arc::clone(&chain_dyn),
        Arc::clone(&events),
        Arc::clone(&history),
        Arc::clone(&ledger),
        RateLimiter::default(),
    );
    Harness {
        orchestrator,
        chain,
        vault,
        events,
        history,
        ledger,
        external_agents,
        binder,
        router,
    }
}

fn agent_config(name: &str, strategy: &str, params: serde_json::Value) -> CreateAgentConfig {
    CreateAgentConfig {
        name: name.to_owned(),
        strategy_kind: strategy.to_owned(),
        strategy_params: params,
        execution_settings: None,
    }
}

fn decision_count(events: &EventBus) -> usize {
    events
        .get_recent_events(1_000)
        .iter()
        .filter(|envelope| {
            matches!(
                &envelope.event,
                SystemEvent::AgentAction { action, .. } if action.starts_with("decided")
            )
        })
        .count()
}

// Scenario: an underfunded accumulator requests exactly one airdrop and the
// events, ledger and intent history all reflect it.
#[tokio::test]
async fn accumulator_airdrop_end_to_end() {
    let h = harness();
    let info = h
        .orchestrator
        .create_agent(agent_config(
            "acc",
            "accumulator",
            json!({"minBalance": 0.5, "airdropAmount": 1.0, "maxAirdropsPerDay": 5}),
        ))
        .unwrap();
    h.chain
        .set_balance(&info.wallet_public_key, UNITS_PER_COIN / 5);

    h.orchestrator.run_cycle(&info.id).await;

    // exactly one airdrop of 1.0
    let airdrops = h.chain.airdrops();
    assert_eq!(airdrops.len(), 1);
    assert_eq!(airdrops[0].0, info.wallet_public_key);
    assert_eq!(airdrops[0].1, UNITS_PER_COIN);

    // one confirmed airdrop transaction for the agent
    let transactions = h.orchestrator.get_agent_transactions(&info.id);
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, "airdrop");
    assert_eq!(transactions[0].status, TransactionStatus::Confirmed);
    assert!(transactions[0].signature.is_some());

    // decided_to_act precedes the transaction event
    let events = h.events.get_recent_events(100);
    let act = events
        .iter()
        .position(|e| {
            matches!(&e.event, SystemEvent::AgentAction { action, .. } if action == "decided_to_act")
        })
        .expect("agent action event");
    let transaction = events
        .iter()
        .position(|e| matches!(&e.event, SystemEvent::Transaction { .. }))
        .expect("transaction event");
    assert!(act < transaction);

    // one executed REQUEST_AIRDROP record in the shared intent feed
    let records = h.history.for_agent(&info.id, 10);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ExternalIntentKind::RequestAirdrop);
    assert_eq!(records[0].status, IntentStatus::Executed);

    // funds arrived
    assert_eq!(
        h.chain.balance_of(&info.wallet_public_key),
        UNITS_PER_COIN / 5 + UNITS_PER_COIN
    );
}

// Scenario: a distributor whose recipient list starts with its own address
// skips itself with reasoning and pays the next recipient on the following
// cycle.
#[tokio::test]
async fn distributor_skips_self_then_pays() {
    let h = harness();
    let other = WalletKeypair::generate().address();
    let placeholder = WalletKeypair::generate().address();
    let info = h
        .orchestrator
        .create_agent(agent_config(
            "dist",
            "distributor",
            json!({
                "recipients": [placeholder.to_string()],
                "distributionProbability": 1.0,
                "distributionAmount": 0.1,
            }),
        ))
        .unwrap();

    // now that the wallet exists, point the list at [self, other]
    h.orchestrator
        .update_agent_config(
            &info.id,
            AgentConfigPatch {
                strategy_params: Some(json!({
                    "recipients": [info.wallet_public_key.to_string(), other.to_string()],
                    "distributionProbability": 1.0,
                    "distributionAmount": 0.1,
                })),
                execution_settings: None,
            },
        )
        .await
        .unwrap();
    h.chain
        .set_balance(&info.wallet_public_key, 10 * UNITS_PER_COIN);

    h.orchestrator.run_cycle(&info.id).await;
    h.orchestrator.run_cycle(&info.id).await;

    // only the second cycle sent anything
    assert_eq!(h.chain.sent_transactions().len(), 1);
    let transactions = h.orchestrator.get_agent_transactions(&info.id);
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].to.as_ref(), Some(&other));

    // the self cycle waited with the skip reasoning
    let skipped = h.events.get_recent_events(100).iter().any(|e| {
        matches!(
            &e.event,
            SystemEvent::AgentAction { action, reasoning, .. }
                if action == "decided_to_wait"
                    && reasoning.as_deref() == Some("Skipping self as recipient")
        )
    });
    assert!(skipped);
}

// Scenario: a transfer over the policy cap is rejected before any record or
// chain call is made, and the intent feed shows the rejection.
#[tokio::test]
async fn over_max_transfer_is_rejected_cleanly() {
    let h = harness();
    let recipient = WalletKeypair::generate().address();
    let info = h
        .orchestrator
        .create_agent(agent_config(
            "payer",
            "scheduled_payer",
            // just over the default 1.0 max transfer amount
            json!({"recipient": recipient.to_string(), "paymentAmount": 1.001}),
        ))
        .unwrap();
    h.chain
        .set_balance(&info.wallet_public_key, 10 * UNITS_PER_COIN);

    h.orchestrator.run_cycle(&info.id).await;

    // no transaction record, nothing sent, nothing airdropped
    assert!(h.ledger.is_empty());
    assert!(h.chain.sent_transactions().is_empty());
    assert!(h.chain.airdrops().is_empty());

    let records = h.history.for_agent(&info.id, 10);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, IntentStatus::Rejected);
    assert!(records[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("exceeds"));

    // a policy rejection does not error the agent
    assert_eq!(
        h.orchestrator.get_agent(&info.id).unwrap().status,
        AgentStatus::Idle
    );
}

fn register_external(
    h: &Harness,
    name: &str,
    supported: Vec<ExternalIntentKind>,
) -> (String, String) {
    let receipt = h
        .external_agents
        .register(Registration {
            name: name.to_owned(),
            kind: ExternalAgentKind::Local,
            endpoint: None,
            supported_intents: supported,
        })
        .unwrap();
    h.binder.bind_new_wallet(&receipt.agent_id).unwrap();
    (receipt.agent_id, receipt.control_token)
}

// Scenario: the 31st intent inside one minute is rejected with a rate-limit
// error and produces no chain traffic.
#[tokio::test]
async fn byoa_rate_limit_kicks_in_at_31() {
    let h = harness();
    let (_agent_id, token) =
        register_external(&h, "quota", vec![ExternalIntentKind::QueryBalance]);

    for n in 0..30 {
        let result = h
            .router
            .submit_intent(
                &token,
                ExternalIntentRequest {
                    kind: ExternalIntentKind::QueryBalance,
                    params: json!({}),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.status, IntentStatus::Executed, "intent #{}", n + 1);
    }

    let calls_before = h.chain.call_count();
    let result = h
        .router
        .submit_intent(
            &token,
            ExternalIntentRequest {
                kind: ExternalIntentKind::QueryBalance,
                params: json!({}),
            },
        )
        .await
        .unwrap();
    assert_eq!(result.status, IntentStatus::Rejected);
    assert!(result.error.unwrap_or_default().contains("Rate limit"));
    // the rejected intent made no chain call
    assert_eq!(h.chain.call_count(), calls_before);
}

// Scenario: an intent kind outside the agent's declared set is rejected by
// name, without touching the chain.
#[tokio::test]
async fn byoa_unsupported_intent_is_rejected() {
    let h = harness();
    let (_agent_id, token) =
        register_external(&h, "reader", vec![ExternalIntentKind::QueryBalance]);

    let calls_before = h.chain.call_count();
    let result = h
        .router
        .submit_intent(
            &token,
            ExternalIntentRequest {
                kind: ExternalIntentKind::TransferSol,
                params: json!({
                    "recipient": WalletKeypair::generate().address().to_string(),
                    "amount": 0.1,
                }),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.status, IntentStatus::Rejected);
    assert!(result.error.unwrap_or_default().contains("TRANSFER_SOL"));
    assert_eq!(h.chain.call_count(), calls_before);
    assert!(h.chain.sent_transactions().is_empty());
}

// Round-trip: a revoked agent's original token authenticates never again,
// and the failed attempt leaves no intent record.
#[tokio::test]
async fn revoked_token_cannot_submit() {
    let h = harness();
    let (agent_id, token) =
        register_external(&h, "gone", vec![ExternalIntentKind::QueryBalance]);
    h.external_agents.revoke(&agent_id).unwrap();

    let history_before = h.history.len();
    let result = h
        .router
        .submit_intent(
            &token,
            ExternalIntentRequest {
                kind: ExternalIntentKind::QueryBalance,
                params: json!({}),
            },
        )
        .await;
    assert!(result.is_err());
    assert_eq!(h.history.len(), history_before);
    assert!(h.chain.sent_transactions().is_empty());
}

// Scenario: changing the cadence at runtime takes effect at the next cycle,
// which fires between 9 and 11 seconds after the change.
#[tokio::test(start_paused = true)]
async fn runtime_recadence_applies_on_next_cycle() {
    let h = harness();
    let info = h
        .orchestrator
        .create_agent(agent_config("acc", "accumulator", json!({})))
        .unwrap();
    // plenty of balance so every cycle decides to wait
    h.chain
        .set_balance(&info.wallet_public_key, 100 * UNITS_PER_COIN);

    h.orchestrator.start_agent(&info.id).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(decision_count(&h.events), 1, "immediate first cycle");

    h.orchestrator
        .update_agent_config(
            &info.id,
            AgentConfigPatch {
                strategy_params: None,
                execution_settings: Some(ExecutionSettingsPatch {
                    cycle_interval_ms: Some(10_000),
                    ..Default::default()
                }),
            },
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(8_900)).await;
    assert_eq!(decision_count(&h.events), 1, "no cycle before 9s");

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(decision_count(&h.events), 2, "next cycle within 11s");

    h.orchestrator.stop_agent(&info.id).unwrap();
}

// Invariant: two simultaneous cycle requests for one agent run one cycle.
#[tokio::test]
async fn cycles_never_overlap_for_one_agent() {
    let h = harness();
    let info = h
        .orchestrator
        .create_agent(agent_config("acc", "accumulator", json!({})))
        .unwrap();
    h.chain
        .set_balance(&info.wallet_public_key, 100 * UNITS_PER_COIN);
    h.chain.set_balance_latency(Duration::from_millis(20));

    tokio::join!(
        h.orchestrator.run_cycle(&info.id),
        h.orchestrator.run_cycle(&info.id),
    );

    assert_eq!(decision_count(&h.events), 1);
}

// Boundary: after deleting a wallet, every vault operation is NotFound —
// including signing attempts from an orphaned agent cycle.
#[tokio::test]
async fn deleted_wallet_is_not_found_everywhere() {
    let h = harness();
    let info = h
        .orchestrator
        .create_agent(agent_config("acc", "accumulator", json!({})))
        .unwrap();
    h.vault.delete_wallet(&info.wallet_id).unwrap();
    assert!(h.vault.get_wallet(&info.wallet_id).is_err());
    assert!(h.vault.get_public_key(&info.wallet_id).is_err());
    assert!(h.vault.record_transfer(&info.wallet_id).is_err());
}
