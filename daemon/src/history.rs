// Shared intent feed: one bounded ring buffer covering built-in and
// externally submitted intents alike.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use aegis_common::{config::DEFAULT_MAX_INTENT_HISTORY, intent::IntentHistoryRecord};

pub struct IntentHistory {
    records: Mutex<VecDeque<IntentHistoryRecord>>,
    capacity: usize,
}

impl IntentHistory {
    pub fn new(capacity: usize) -> Self {
        IntentHistory {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    fn records(&self) -> MutexGuard<'_, VecDeque<IntentHistoryRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, record: IntentHistoryRecord) {
        let mut records = self.records();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn recent(&self, count: usize) -> Vec<IntentHistoryRecord> {
        let records = self.records();
        records
            .iter()
            .skip(records.len().saturating_sub(count))
            .cloned()
            .collect()
    }

    pub fn for_agent(&self, agent_id: &str, count: usize) -> Vec<IntentHistoryRecord> {
        let records = self.records();
        let mut filtered: Vec<IntentHistoryRecord> = records
            .iter()
            .rev()
            .filter(|record| record.agent_id == agent_id)
            .take(count)
            .cloned()
            .collect();
        filtered.reverse();
        filtered
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl Default for IntentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INTENT_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_common::intent::{ExternalIntentKind, IntentStatus};

    fn record(agent_id: &str, n: u64) -> IntentHistoryRecord {
        IntentHistoryRecord {
            intent_id: format!("int_{}", n),
            agent_id: agent_id.into(),
            kind: ExternalIntentKind::QueryBalance,
            params: serde_json::Value::Null,
            status: IntentStatus::Executed,
            result: None,
            error: None,
            created_at: n,
        }
    }

    #[test]
    fn oldest_records_are_evicted() {
        let history = IntentHistory::new(3);
        for n in 0..5 {
            history.push(record("agt", n));
        }
        let recent = history.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].intent_id, "int_2");
    }

    #[test]
    fn per_agent_filter_preserves_order() {
        let history = IntentHistory::new(10);
        history.push(record("a", 1));
        history.push(record("b", 2));
        history.push(record("a", 3));
        let records = history.for_agent("a", 10);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].intent_id, "int_1");
        assert_eq!(records[1].intent_id, "int_3");
    }
}
