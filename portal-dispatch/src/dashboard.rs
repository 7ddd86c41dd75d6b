//! Monitoring sinks notified at the start and end of every call.

use crate::config::PortalConfig;
use chrono::{DateTime, Utc};
use portal_types::{CallId, Operation};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// One start or completion notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub call_id: CallId,
    pub object_type: String,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
    /// Failure text for a failed completion.
    pub fault: Option<String>,
}

impl CallEvent {
    pub fn new(call_id: CallId, object_type: impl Into<String>, operation: Operation) -> Self {
        Self {
            call_id,
            object_type: object_type.into(),
            operation,
            timestamp: Utc::now(),
            fault: None,
        }
    }

    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

/// Receives call notifications. Implementations must return promptly and
/// cannot fail the call.
pub trait DashboardSink: Send + Sync {
    fn initialize_call(&self, event: &CallEvent);
    fn complete_call(&self, event: &CallEvent);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDashboard;

impl DashboardSink for NullDashboard {
    fn initialize_call(&self, _: &CallEvent) {}
    fn complete_call(&self, _: &CallEvent) {}
}

/// Aggregated call statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_calls: u64,
    pub completed_calls: u64,
    pub failed_calls: u64,
    pub first_call: Option<DateTime<Utc>>,
    pub last_call: Option<DateTime<Utc>>,
    /// Most recent completions, oldest first.
    pub recent: VecDeque<CallEvent>,
}

struct DashboardState {
    started: Mutex<VecDeque<CallEvent>>,
    completed: Mutex<VecDeque<CallEvent>>,
    stats: Mutex<DashboardStats>,
    recent_capacity: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Notifications a [`Dashboard`] queues before the notifying call drains
/// them itself.
pub const MAX_PENDING_EVENTS: usize = 4096;

/// Buffering dashboard.
///
/// Notifications only push onto a queue. Statistics are folded in by
/// [`Dashboard::drain`], called directly or from the task started by
/// [`Dashboard::spawn_drain`]. A queue that reaches
/// [`MAX_PENDING_EVENTS`] is drained by the notification that filled it, so
/// an undrained dashboard stays bounded.
#[derive(Clone)]
pub struct Dashboard {
    state: Arc<DashboardState>,
}

impl Dashboard {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            state: Arc::new(DashboardState {
                started: Mutex::new(VecDeque::new()),
                completed: Mutex::new(VecDeque::new()),
                stats: Mutex::new(DashboardStats::default()),
                recent_capacity,
            }),
        }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(config.recent_activity_count)
    }

    /// Folds every queued notification into the statistics.
    pub fn drain(&self) {
        Self::drain_state(&self.state);
    }

    fn drain_state(state: &DashboardState) {
        let started: Vec<_> = lock(&state.started).drain(..).collect();
        let completed: Vec<_> = lock(&state.completed).drain(..).collect();
        if started.is_empty() && completed.is_empty() {
            return;
        }

        let mut stats = lock(&state.stats);
        for event in started {
            stats.total_calls += 1;
            stats.first_call.get_or_insert(event.timestamp);
            stats.last_call = Some(event.timestamp);
        }
        for event in completed {
            if event.is_success() {
                stats.completed_calls += 1;
            } else {
                stats.failed_calls += 1;
            }
            stats.recent.push_back(event);
            while stats.recent.len() > state.recent_capacity {
                stats.recent.pop_front();
            }
        }
    }

    /// Drains every `period` until the last dashboard handle is dropped.
    pub fn spawn_drain(&self, period: Duration) -> JoinHandle<()> {
        let state: Weak<DashboardState> = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else {
                    debug!("Dashboard dropped, stopping drain task");
                    break;
                };
                Self::drain_state(&state);
            }
        })
    }

    /// Statistics as of the last drain.
    pub fn stats(&self) -> DashboardStats {
        lock(&self.state.stats).clone()
    }

    /// Notifications not yet drained.
    pub fn pending(&self) -> usize {
        lock(&self.state.started).len() + lock(&self.state.completed).len()
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

impl DashboardSink for Dashboard {
    fn initialize_call(&self, event: &CallEvent) {
        self.enqueue(&self.state.started, event);
    }

    fn complete_call(&self, event: &CallEvent) {
        self.enqueue(&self.state.completed, event);
    }
}

impl Dashboard {
    fn enqueue(&self, queue: &Mutex<VecDeque<CallEvent>>, event: &CallEvent) {
        let full = {
            let mut queue = lock(queue);
            queue.push_back(event.clone());
            queue.len() >= MAX_PENDING_EVENTS
        };
        if full {
            debug!("Dashboard queue full, draining inline");
            Self::drain_state(&self.state);
        }
    }
}
