// Bounded in-memory pub/sub for system events.
//
// Fire-and-forget: ordering is preserved within one `emit` call, handlers
// are isolated from each other, and a panicking subscriber never takes the
// emitter or its peers down with it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, warn};

use aegis_common::{
    config::{DEFAULT_MAX_EVENT_HISTORY, DEFAULT_MAX_SUBSCRIBERS},
    event::{EventEnvelope, SystemEvent},
    sanitize::sanitize_value,
    time::get_current_time_in_millis,
};

pub type EventHandler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Opaque handle returned by `subscribe`. The zero id is a no-op handle
/// handed out when the subscriber limit is reached; unsubscribing it does
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub const NOOP: SubscriptionId = SubscriptionId(0);

    pub fn is_noop(&self) -> bool {
        self.0 == 0
    }
}

struct BusState {
    handlers: HashMap<u64, EventHandler>,
    history: Vec<EventEnvelope>,
}

pub struct EventBus {
    state: Mutex<BusState>,
    next_event_id: AtomicU64,
    next_subscription_id: AtomicU64,
    max_subscribers: usize,
    max_history: usize,
}

impl EventBus {
    pub fn new(max_subscribers: usize, max_history: usize) -> Self {
        EventBus {
            state: Mutex::new(BusState {
                handlers: HashMap::new(),
                history: Vec::new(),
            }),
            next_event_id: AtomicU64::new(1),
            next_subscription_id: AtomicU64::new(1),
            max_subscribers,
            max_history,
        }
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
        let mut state = self.state();
        if state.handlers.len() >= self.max_subscribers {
            warn!(
                "subscriber limit of {} reached, rejecting subscription",
                self.max_subscribers
            );
            return SubscriptionId::NOOP;
        }
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        state.handlers.insert(id, handler);
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if id.is_noop() {
            return;
        }
        self.state().handlers.remove(&id.0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().handlers.len()
    }

    /// Append to history, then deliver to every subscriber. A handler that
    /// panics is logged and skipped; delivery to the others continues.
    pub fn emit(&self, event: SystemEvent) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            timestamp: get_current_time_in_millis(),
            event,
        };

        if log::log_enabled!(log::Level::Debug) {
            // event payloads go through the secret-field sanitizer before
            // they can reach a log line
            if let Ok(raw) = serde_json::to_value(&envelope) {
                debug!("event {}", sanitize_value(&raw));
            }
        }

        // snapshot handlers so a subscriber can emit or unsubscribe without
        // deadlocking against the bus lock
        let handlers: Vec<EventHandler> = {
            let mut state = self.state();
            state.history.push(envelope.clone());
            // amortised trim: only compact once history overshoots by half
            if state.history.len() > self.max_history + self.max_history / 2 {
                let excess = state.history.len() - self.max_history;
                state.history.drain(..excess);
            }
            state.handlers.values().cloned().collect()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&envelope))).is_err() {
                error!("event subscriber panicked on event {}", envelope.id);
            }
        }

        envelope
    }

    pub fn get_recent_events(&self, count: usize) -> Vec<EventEnvelope> {
        let state = self.state();
        let skip = state.history.len().saturating_sub(count);
        state.history[skip..].to_vec()
    }

    pub fn get_agent_events(&self, agent_id: &str, count: usize) -> Vec<EventEnvelope> {
        let state = self.state();
        let mut events: Vec<EventEnvelope> = state
            .history
            .iter()
            .rev()
            .filter(|envelope| envelope.event.agent_id() == Some(agent_id))
            .take(count)
            .cloned()
            .collect();
        events.reverse();
        events
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUBSCRIBERS, DEFAULT_MAX_EVENT_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn error_event(message: &str) -> SystemEvent {
        SystemEvent::SystemError {
            component: "test".into(),
            message: message.into(),
        }
    }

    fn action_event(agent_id: &str) -> SystemEvent {
        SystemEvent::AgentAction {
            agent_id: agent_id.into(),
            action: "decided_to_wait".into(),
            reasoning: None,
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn event_ids_are_monotonic() {
        let bus = EventBus::default();
        let first = bus.emit(error_event("one"));
        let second = bus.emit(error_event("two"));
        assert!(second.id > first.id);
    }

    #[test]
    fn panicking_subscriber_does_not_poison_the_bus() {
        let bus = EventBus::default();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.subscribe(Arc::new(|_| panic!("boom")));
        let counter = Arc::clone(&delivered);
        bus.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(error_event("one"));
        bus.emit(error_event("two"));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscriber_limit_returns_noop_handle() {
        let bus = EventBus::new(1, 16);
        let first = bus.subscribe(Arc::new(|_| {}));
        assert!(!first.is_noop());
        let second = bus.subscribe(Arc::new(|_| {}));
        assert!(second.is_noop());
        assert_eq!(bus.subscriber_count(), 1);

        // unsubscribing the no-op handle changes nothing
        bus.unsubscribe(second);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn history_is_bounded_with_amortised_trim() {
        let bus = EventBus::new(4, 10);
        for i in 0..16 {
            bus.emit(error_event(&i.to_string()));
        }
        let recent = bus.get_recent_events(100);
        assert!(recent.len() <= 15, "history grew past 1.5x the bound");
        // the tail is always the newest event
        assert_eq!(recent.last().unwrap().id, 16);
    }

    #[test]
    fn agent_filter_matches_direct_and_nested_ids() {
        let bus = EventBus::default();
        bus.emit(action_event("agt_a"));
        bus.emit(action_event("agt_b"));
        bus.emit(SystemEvent::Transaction {
            agent_id: None,
            transaction: serde_json::json!({"agentId": "agt_a"}),
        });

        let events = bus.get_agent_events("agt_a", 10);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn clear_history() {
        let bus = EventBus::default();
        bus.emit(error_event("x"));
        bus.clear_history();
        assert!(bus.get_recent_events(10).is_empty());
    }
}
