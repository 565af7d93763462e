//! Per-group concurrency admission control.
//!
//! # Responsibilities
//! - Keep one counter set per resource group, created on first reference
//! - Admit while `current < limit`, reject immediately otherwise
//! - Release each admitted request exactly once
//! - Report per-group load for observability
//!
//! # Design Decisions
//! - No waiting queue: a full group answers `ResourceExhausted` at once
//! - A group's limit is fixed when its semaphore is created
//! - Lock-free CAS on `current`; the map lock is held only for the lookup
//! - The permit releases on drop, so an aborted handler future frees its slot

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::http::request::PinnedConfig;
use crate::http::response::Rejection;
use crate::observability::metrics;

/// Counters for one resource group.
#[derive(Debug)]
pub struct GroupSemaphore {
    group: String,
    limit: usize,
    current: AtomicUsize,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl GroupSemaphore {
    fn new(group: &str, limit: usize) -> Self {
        Self {
            group: group.to_string(),
            limit,
            current: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn try_acquire(self: &Arc<Self>) -> Result<BulkheadPermit, Rejection> {
        let mut prev = self.current.load(Ordering::Acquire);
        loop {
            if prev >= self.limit {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::record_bulkhead_rejected(&self.group);
                return Err(Rejection::ResourceExhausted {
                    group: self.group.clone(),
                    current: prev,
                    limit: self.limit,
                });
            }
            match self.current.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::record_bulkhead_admitted(&self.group, prev + 1);

        Ok(BulkheadPermit {
            semaphore: Arc::clone(self),
            token: Uuid::new_v4(),
            released: AtomicBool::new(false),
        })
    }

    fn stats(&self) -> GroupStats {
        let current = self.current();
        GroupStats {
            current,
            limit: self.limit,
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            utilization_percent: if self.limit == 0 {
                0.0
            } else {
                current as f64 / self.limit as f64 * 100.0
            },
        }
    }
}

/// One admission. Releases its slot on [`BulkheadPermit::release`] or on drop,
/// whichever happens first.
#[derive(Debug)]
pub struct BulkheadPermit {
    semaphore: Arc<GroupSemaphore>,
    token: Uuid,
    released: AtomicBool,
}

impl BulkheadPermit {
    pub fn group(&self) -> &str {
        &self.semaphore.group
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Release the slot. Returns false if it was already released.
    pub fn release(&self, signal: &'static str) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            tracing::trace!(token = %self.token, signal, "Permit already released");
            return false;
        }
        let remaining = self.semaphore.current.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_bulkhead_released(&self.semaphore.group, remaining);
        tracing::trace!(group = %self.semaphore.group, token = %self.token, signal, "Permit released");
        true
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.release("drop");
    }
}

/// Snapshot of one group's load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub current: usize,
    pub limit: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub utilization_percent: f64,
}

/// Process-wide set of group semaphores.
#[derive(Debug, Default)]
pub struct BulkheadRegistry {
    groups: DashMap<String, Arc<GroupSemaphore>>,
}

impl BulkheadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit one request into `group`. `limit` is used only when the
    /// group is seen for the first time.
    pub fn admit(&self, group: &str, limit: usize) -> Result<BulkheadPermit, Rejection> {
        let semaphore = match self.groups.get(group) {
            Some(existing) => Arc::clone(existing.value()),
            None => {
                let created = self
                    .groups
                    .entry(group.to_string())
                    .or_insert_with(|| {
                        tracing::debug!(group, limit, "Creating bulkhead group");
                        Arc::new(GroupSemaphore::new(group, limit))
                    });
                Arc::clone(created.value())
            }
        };
        semaphore.try_acquire()
    }

    pub fn group(&self, group: &str) -> Option<Arc<GroupSemaphore>> {
        self.groups.get(group).map(|g| Arc::clone(g.value()))
    }

    /// Per-group load, read-only.
    pub fn metrics(&self) -> BTreeMap<String, GroupStats> {
        self.groups
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }
}

/// State for one bulkhead-guarded route group.
#[derive(Clone)]
pub struct BulkheadLayerState {
    pub registry: Arc<BulkheadRegistry>,
    pub group: &'static str,
}

/// Axum middleware: admit into the group, run the handler, release.
pub async fn bulkhead_middleware(
    State(state): State<BulkheadLayerState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(PinnedConfig(config)) = request.extensions().get::<PinnedConfig>().cloned() else {
        tracing::error!(group = state.group, "Bulkhead reached without a pinned configuration snapshot");
        metrics::record_gatekeeper_rejection(Rejection::InternalError.code());
        return Rejection::InternalError.into_response();
    };

    let permit = match state.registry.admit(state.group, config.group_limit(state.group)) {
        Ok(permit) => permit,
        Err(rejection) => {
            tracing::warn!(group = state.group, "Bulkhead full, request rejected");
            return rejection.into_response();
        }
    };
    tracing::debug!(group = permit.group(), token = %permit.token(), "Bulkhead permit granted");

    let response = next.run(request).await;
    permit.release("completed");
    response
}
