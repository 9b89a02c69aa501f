// Bounded in-memory transaction ledger.
//
// Records are stored behind `Arc` and replaced wholesale on status updates,
// so a reader always sees either the old or the new record, never a
// half-written one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use aegis_common::{
    config::DEFAULT_MAX_TRANSACTIONS,
    crypto::{Address, Signature},
    time::{get_current_time_in_millis, TimestampMillis},
    utils::generate_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Submitted,
    Confirmed,
    Finalized,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub intent_id: String,
    pub wallet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: TimestampMillis,
    pub updated_at: TimestampMillis,
}

impl TransactionRecord {
    pub fn pending(
        intent_id: &str,
        wallet_id: &str,
        agent_id: Option<&str>,
        kind: &str,
    ) -> Self {
        let now = get_current_time_in_millis();
        TransactionRecord {
            id: generate_id("txn"),
            intent_id: intent_id.to_owned(),
            wallet_id: wallet_id.to_owned(),
            agent_id: agent_id.map(str::to_owned),
            kind: kind.to_owned(),
            status: TransactionStatus::Pending,
            amount: None,
            from: None,
            to: None,
            mint: None,
            signature: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

struct LedgerState {
    order: VecDeque<String>,
    records: HashMap<String, Arc<TransactionRecord>>,
}

pub struct TransactionLedger {
    state: Mutex<LedgerState>,
    capacity: usize,
}

impl TransactionLedger {
    pub fn new(capacity: usize) -> Self {
        TransactionLedger {
            state: Mutex::new(LedgerState {
                order: VecDeque::new(),
                records: HashMap::new(),
            }),
            capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, record: TransactionRecord) -> Arc<TransactionRecord> {
        let record = Arc::new(record);
        let mut state = self.state();
        state.order.push_back(record.id.clone());
        state.records.insert(record.id.clone(), Arc::clone(&record));
        if state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.records.remove(&evicted);
            }
        }
        record
    }

    // Replace a record atomically. Terminal records are immutable.
    pub fn update<F>(&self, id: &str, f: F) -> Option<Arc<TransactionRecord>>
    where
        F: FnOnce(&TransactionRecord) -> TransactionRecord,
    {
        let mut state = self.state();
        let current = state.records.get(id)?;
        if matches!(
            current.status,
            TransactionStatus::Confirmed | TransactionStatus::Finalized | TransactionStatus::Failed
        ) {
            return Some(Arc::clone(current));
        }
        let mut updated = f(current);
        updated.id = current.id.clone();
        updated.created_at = current.created_at;
        updated.updated_at = get_current_time_in_millis();
        let updated = Arc::new(updated);
        state.records.insert(id.to_owned(), Arc::clone(&updated));
        Some(updated)
    }

    pub fn get(&self, id: &str) -> Option<Arc<TransactionRecord>> {
        self.state().records.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<TransactionRecord>> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }

    pub fn for_agent(&self, agent_id: &str) -> Vec<Arc<TransactionRecord>> {
        self.all()
            .into_iter()
            .filter(|record| record.agent_id.as_deref() == Some(agent_id))
            .collect()
    }

    pub fn for_wallet(&self, wallet_id: &str) -> Vec<Arc<TransactionRecord>> {
        self.all()
            .into_iter()
            .filter(|record| record.wallet_id == wallet_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().order.is_empty()
    }

    pub fn count_by_status(&self, status: TransactionStatus) -> usize {
        self.all()
            .iter()
            .filter(|record| record.status == status)
            .count()
    }
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRANSACTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(kind: &str) -> TransactionRecord {
        TransactionRecord::pending("int_1", "wal_1", Some("agt_1"), kind)
    }

    #[test]
    fn insert_update_read() {
        let ledger = TransactionLedger::new(8);
        let record = ledger.insert(pending("airdrop"));
        assert_eq!(record.status, TransactionStatus::Pending);

        let updated = ledger
            .update(&record.id, |r| TransactionRecord {
                status: TransactionStatus::Confirmed,
                ..r.clone()
            })
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Confirmed);
        assert_eq!(ledger.get(&record.id).unwrap().status, TransactionStatus::Confirmed);
    }

    #[test]
    fn terminal_records_are_immutable() {
        let ledger = TransactionLedger::new(8);
        let record = ledger.insert(pending("airdrop"));
        ledger.update(&record.id, |r| TransactionRecord {
            status: TransactionStatus::Failed,
            error: Some("boom".into()),
            ..r.clone()
        });
        let after = ledger
            .update(&record.id, |r| TransactionRecord {
                status: TransactionStatus::Confirmed,
                ..r.clone()
            })
            .unwrap();
        assert_eq!(after.status, TransactionStatus::Failed);
    }

    #[test]
    fn ledger_is_bounded() {
        let ledger = TransactionLedger::new(2);
        let first = ledger.insert(pending("a"));
        ledger.insert(pending("b"));
        ledger.insert(pending("c"));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.get(&first.id).is_none());
    }
}
