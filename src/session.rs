// src/session.rs
//! Session Manager: one task per connected client.
//!
//! `open()` registers the session, hands back the receiving end of its event
//! stream and spawns two tasks: the session itself (connected event, initial
//! batch, then the periodic loop) and a watcher that cancels the session as
//! soon as the client side of the stream is dropped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::scheduler::{DeltaScheduler, TickOutcome};
use crate::stream::{EventSink, StreamEvent};

pub type SessionId = u64;

#[derive(Clone, Copy, Debug)]
pub struct SinkCfg {
    pub capacity: usize,
    pub write_timeout: Duration,
}

impl Default for SinkCfg {
    fn default() -> Self {
        Self {
            capacity: 32,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// What the HTTP layer (or a test) gets back for a new connection.
pub struct SessionHandle {
    pub id: SessionId,
    pub events: mpsc::Receiver<StreamEvent>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

pub struct SessionManager {
    scheduler: DeltaScheduler,
    sink_cfg: SinkCfg,
    sessions: Mutex<HashSet<SessionId>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(scheduler: DeltaScheduler, sink_cfg: SinkCfg) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            sink_cfg,
            sessions: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn open(self: &Arc<Self>) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let (sink, events) = EventSink::channel(self.sink_cfg.capacity, self.sink_cfg.write_timeout);

        self.register(id);
        counter!("relay_sessions_opened_total").increment(1);
        info!(target: "relay::session", session = id, "client connected");

        let watcher_sink = sink.clone();
        let watcher_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watcher_sink.closed() => watcher_cancel.cancel(),
                _ = watcher_cancel.cancelled() => {}
            }
        });

        let mgr = Arc::clone(self);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _reg = Registration { mgr: &mgr, id };
            match mgr.run_session(&sink, &task_cancel).await {
                Ok(()) => info!(target: "relay::session", session = id, "client disconnected"),
                Err(e) => info!(target: "relay::session", session = id, error = %e, "session closed"),
            }
            task_cancel.cancel();
        });

        SessionHandle {
            id,
            events,
            cancel,
            task,
        }
    }

    async fn run_session(&self, sink: &EventSink, cancel: &CancellationToken) -> Result<(), RelayError> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        sink.emit(StreamEvent::connected()).await?;

        let outcome = self.scheduler.initial_phase(sink, cancel).await?;
        debug!(target: "relay::session", ?outcome, "initial phase done");
        if outcome == TickOutcome::Cancelled {
            return Ok(());
        }

        self.scheduler.run_periodic(sink, cancel).await
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().expect("sessions mutex poisoned").len()
    }

    /// Cancel every live session. Sessions opened afterwards start cancelled.
    pub fn shutdown(&self) {
        info!(target: "relay::session", active = self.active_sessions(), "shutting down sessions");
        self.shutdown.cancel();
    }

    fn register(&self, id: SessionId) {
        let mut map = self.sessions.lock().expect("sessions mutex poisoned");
        map.insert(id);
        gauge!("relay_sessions_active").set(map.len() as f64);
    }

    fn deregister(&self, id: SessionId) {
        let mut map = self.sessions.lock().expect("sessions mutex poisoned");
        map.remove(&id);
        gauge!("relay_sessions_active").set(map.len() as f64);
    }
}

/// Removes the session from the registry when its task ends, panics included.
struct Registration<'a> {
    mgr: &'a SessionManager,
    id: SessionId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.mgr.deregister(self.id);
    }
}
