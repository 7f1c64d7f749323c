//! Test support: a programmable in-memory backend.
//!
//! Used by this crate's tests and by the pagination, prefetch and sdk
//! crates, which script responses and assert on call counts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::RemoteBackend;
use crate::error::QueryError;

/// Which backend entry point a call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Mutation,
}

/// One recorded backend invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub kind: CallKind,
    pub name: String,
    pub args: Value,
}

#[derive(Default)]
struct Script {
    /// One-shot results consumed before the default response.
    queued: HashMap<String, VecDeque<Result<Value, QueryError>>>,
    /// Standing responses by operation name.
    defaults: HashMap<String, Value>,
    /// Artificial latency by operation name.
    delays: HashMap<String, Duration>,
    calls: Vec<CallRecord>,
}

/// Scriptable [`RemoteBackend`] for tests.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the standing response for an operation.
    pub fn respond(&self, name: &str, value: Value) {
        self.lock().defaults.insert(name.to_string(), value);
    }

    /// Queue a one-shot result, consumed before the standing response.
    pub fn enqueue(&self, name: &str, result: Result<Value, QueryError>) {
        self.lock()
            .queued
            .entry(name.to_string())
            .or_default()
            .push_back(result);
    }

    /// Delay every call to an operation by `duration`.
    pub fn delay(&self, name: &str, duration: Duration) {
        self.lock().delays.insert(name.to_string(), duration);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Number of query calls to an operation.
    pub fn query_calls(&self, name: &str) -> usize {
        self.count(CallKind::Query, name)
    }

    /// Number of mutation calls to an operation.
    pub fn mutation_calls(&self, name: &str) -> usize {
        self.count(CallKind::Mutation, name)
    }

    /// The arguments of the most recent call to an operation.
    pub fn last_args(&self, name: &str) -> Option<Value> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.args.clone())
    }

    fn count(&self, kind: CallKind, name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind && c.name == name)
            .count()
    }

    async fn invoke(&self, kind: CallKind, name: &str, args: Value) -> Result<Value, QueryError> {
        let (result, delay) = {
            let mut script = self.lock();
            script.calls.push(CallRecord {
                kind,
                name: name.to_string(),
                args,
            });
            let result = match script.queued.get_mut(name).and_then(|q| q.pop_front()) {
                Some(result) => result,
                None => match script.defaults.get(name) {
                    Some(value) => Ok(value.clone()),
                    None => Err(QueryError::Network(format!("no scripted response for {name}"))),
                },
            };
            (result, script.delays.get(name).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[async_trait]
impl RemoteBackend for MockBackend {
    async fn invoke_query(&self, name: &str, args: Value) -> Result<Value, QueryError> {
        self.invoke(CallKind::Query, name, args).await
    }

    async fn invoke_mutation(&self, name: &str, args: Value) -> Result<Value, QueryError> {
        self.invoke(CallKind::Mutation, name, args).await
    }
}
