//! In-memory entity sink
//!
//! Used by tests that compare the output of two runs or inject load failures.

use crate::model::{Entity, EntityKey};
use crate::output::traits::{Ack, Sink, SinkError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sink keeping entity payloads in a sorted map
///
/// Loads are staged and only become visible on commit.
#[derive(Debug, Default)]
pub struct MemorySink {
    committed: BTreeMap<EntityKey, Value>,
    staged: Option<BTreeMap<EntityKey, Value>>,
    /// Keys in the order they were upserted, across all loads
    upsert_order: Vec<EntityKey>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every upsert after the first `n`
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Committed entities, in natural-key order
    pub fn entities(&self) -> &BTreeMap<EntityKey, Value> {
        &self.committed
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Value> {
        self.committed.get(key)
    }

    pub fn upsert_order(&self) -> &[EntityKey] {
        &self.upsert_order
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

impl Sink for MemorySink {
    fn begin(&mut self) -> Result<(), SinkError> {
        if self.staged.is_some() {
            return Err(SinkError::Transaction("load already in progress".to_string()));
        }
        self.staged = Some(self.committed.clone());
        Ok(())
    }

    fn upsert(&mut self, entity: &Entity) -> Result<Ack, SinkError> {
        let key = entity.key();

        if let Some(limit) = self.fail_after {
            if self.upsert_order.len() >= limit {
                return Err(SinkError::Rejected {
                    key,
                    reason: format!("sink accepts at most {} upserts", limit),
                });
            }
        }

        let payload = entity.payload();
        let target = self.staged.as_mut().unwrap_or(&mut self.committed);
        let changed = target.get(&key) != Some(&payload);
        if changed {
            target.insert(key.clone(), payload);
        }
        self.upsert_order.push(key.clone());

        Ok(Ack { key, changed })
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| SinkError::Transaction("no load in progress".to_string()))?;
        self.committed = staged;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SinkError> {
        self.staged = None;
        Ok(())
    }
}
