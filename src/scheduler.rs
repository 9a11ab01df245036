// src/scheduler.rs
//! Delta Scheduler: the per-session polling cadence.
//!
//! A session first receives an initial snapshot of the top stories (seeding
//! the shared [`SeenSet`]), then one delta check per interval. Only ids the
//! seen-set reports as new are fetched, validated and delivered, in upstream
//! rank order, capped per tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::feed::types::{FeedSource, ItemId};
use crate::seen::SeenSet;
use crate::stream::{EventSink, StreamEvent};
use crate::validate::{validate, Validation};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    /// K: stories sent to a freshly connected client.
    pub initial_batch: usize,
    /// M: new stories sent per tick at most.
    pub max_new_per_tick: usize,
    pub interval: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            initial_batch: 10,
            max_new_per_tick: 5,
            interval: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Ids handed to the delivery loop (after truncation).
    pub attempted: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Delivered(DeliveryReport),
    NoNewData,
    ListFailed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    Delta,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Delta => "delta",
        }
    }
}

#[derive(Clone)]
pub struct DeltaScheduler {
    feed: Arc<dyn FeedSource>,
    seen: Arc<SeenSet>,
    cfg: SchedulerCfg,
}

impl DeltaScheduler {
    pub fn new(feed: Arc<dyn FeedSource>, seen: Arc<SeenSet>, cfg: SchedulerCfg) -> Self {
        Self { feed, seen, cfg }
    }

    pub fn cfg(&self) -> SchedulerCfg {
        self.cfg
    }

    /// Send the top `initial_batch` stories without consulting the seen-set,
    /// then mark each delivered id as seen.
    ///
    /// Only a write failure is returned as `Err`; feed failures are reported
    /// to the client and folded into the outcome.
    pub async fn initial_phase(
        &self,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, RelayError> {
        info!(target: "relay::scheduler", feed = self.feed.name(), "sending initial batch");

        let Some(ids) = self.fetch_list(Phase::Initial, sink, cancel).await? else {
            return Ok(TickOutcome::Cancelled);
        };
        let Some(ids) = ids else {
            return Ok(TickOutcome::ListFailed);
        };

        let batch = &ids[..ids.len().min(self.cfg.initial_batch)];
        match self.deliver(batch, Phase::Initial, sink, cancel).await? {
            Some(report) => Ok(TickOutcome::Delivered(report)),
            None => Ok(TickOutcome::Cancelled),
        }
    }

    /// One delta check: fetch the list, diff it against the seen-set, deliver
    /// at most `max_new_per_tick` of the new ids.
    pub async fn tick(
        &self,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, RelayError> {
        counter!("relay_ticks_total").increment(1);
        debug!(target: "relay::scheduler", "checking for new stories");

        let Some(ids) = self.fetch_list(Phase::Delta, sink, cancel).await? else {
            return Ok(TickOutcome::Cancelled);
        };
        // list failure leaves the seen-set untouched; the same ids are retried next tick
        let Some(ids) = ids else {
            return Ok(TickOutcome::ListFailed);
        };

        let new_ids = self.seen.mark_and_diff(&ids);
        if new_ids.is_empty() {
            debug!(target: "relay::scheduler", "no new stories");
            self.emit(sink, cancel, StreamEvent::no_new_data()).await?;
            return Ok(TickOutcome::NoNewData);
        }

        info!(target: "relay::scheduler", new = new_ids.len(), "found new stories");
        // ids past the cap stay marked seen and are never delivered to anyone
        let batch = &new_ids[..new_ids.len().min(self.cfg.max_new_per_tick)];
        match self.deliver(batch, Phase::Delta, sink, cancel).await? {
            Some(report) => Ok(TickOutcome::Delivered(report)),
            None => Ok(TickOutcome::Cancelled),
        }
    }

    /// Tick every `interval` until cancelled. The first tick fires one full
    /// interval after the call; late ticks are delayed, never bunched.
    pub async fn run_periodic(
        &self,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), RelayError> {
        let mut ticker = interval_at(Instant::now() + self.cfg.interval, self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            if self.tick(sink, cancel).await? == TickOutcome::Cancelled {
                return Ok(());
            }
        }
    }

    /// Outer `None`: cancelled. Inner `None`: list failed and was reported.
    async fn fetch_list(
        &self,
        phase: Phase,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Option<Option<Vec<ItemId>>>, RelayError> {
        let Some(res) = until_cancelled(cancel, self.feed.fetch_top_ids()).await else {
            return Ok(None);
        };
        match res {
            Ok(ids) => Ok(Some(Some(ids))),
            Err(e) => {
                warn!(target: "relay::scheduler", phase = phase.label(), error = %e, "top story list unavailable");
                let msg = describe_list_error(phase, &e);
                self.emit(sink, cancel, StreamEvent::error(msg)).await?;
                Ok(Some(None))
            }
        }
    }

    /// Fetch, validate and send each id in order. `None` if cancelled midway.
    async fn deliver(
        &self,
        ids: &[ItemId],
        phase: Phase,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Option<DeliveryReport>, RelayError> {
        let mut report = DeliveryReport {
            attempted: ids.len(),
            ..DeliveryReport::default()
        };

        for &id in ids {
            let Some(res) = until_cancelled(cancel, self.feed.fetch_item(id)).await else {
                return Ok(None);
            };

            let item = match res {
                Ok(item) => item,
                Err(e) => {
                    warn!(target: "relay::scheduler", phase = phase.label(), id, error = %e, "story unavailable");
                    report.failed += 1;
                    let msg = describe_item_error(phase, id, &e);
                    self.emit(sink, cancel, StreamEvent::story_error(msg)).await?;
                    continue;
                }
            };

            if let Validation::Skip(reason) = validate(&item) {
                debug!(target: "relay::scheduler", phase = phase.label(), id, kind = %item.kind.0, ?reason, "skipping item");
                counter!("relay_items_skipped_total").increment(1);
                report.skipped += 1;
                continue;
            }

            let event = match StreamEvent::new_story(&item) {
                Ok(ev) => ev,
                Err(e) => {
                    report.failed += 1;
                    let msg = describe_item_error(phase, id, &e);
                    self.emit(sink, cancel, StreamEvent::story_error(msg)).await?;
                    continue;
                }
            };

            self.emit(sink, cancel, event).await?;
            report.delivered += 1;
            counter!("relay_items_delivered_total").increment(1);
            if phase == Phase::Initial {
                self.seen.mark_seeded([id]);
            }
            info!(
                target: "relay::scheduler",
                phase = phase.label(),
                id,
                title = item.title.as_deref().unwrap_or_default(),
                "sent story"
            );
        }

        Ok(Some(report))
    }

    async fn emit(
        &self,
        sink: &EventSink,
        cancel: &CancellationToken,
        event: StreamEvent,
    ) -> Result<(), RelayError> {
        if cancel.is_cancelled() {
            return Err(RelayError::Write("session cancelled".into()));
        }
        sink.emit(event).await
    }
}

async fn until_cancelled<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        v = fut => Some(v),
    }
}

fn describe_list_error(phase: Phase, e: &RelayError) -> String {
    let what = match phase {
        Phase::Initial => "initial top story IDs",
        Phase::Delta => "top story IDs for delta",
    };
    match e {
        RelayError::Decode { cause, .. } => format!("Error decoding {what}: {cause}"),
        RelayError::Fetch { cause, .. } => format!("Error fetching {what}: {cause}"),
        other => format!("Error fetching {what}: {other}"),
    }
}

fn describe_item_error(phase: Phase, id: ItemId, e: &RelayError) -> String {
    let phase = phase.label();
    match e {
        RelayError::Decode { cause, .. } => format!("Error decoding {phase} story {id}: {cause}"),
        RelayError::Encode { cause, .. } => {
            format!("Error marshalling {phase} story {id} to JSON: {cause}")
        }
        RelayError::Fetch { cause, .. } => format!("Error fetching {phase} story {id}: {cause}"),
        other => format!("Error fetching {phase} story {id}: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_error_messages_name_the_phase() {
        let e = RelayError::fetch(None, "timed out");
        assert_eq!(
            describe_list_error(Phase::Delta, &e),
            "Error fetching top story IDs for delta: timed out"
        );
        let e = RelayError::decode(None, "bad json");
        assert_eq!(
            describe_list_error(Phase::Initial, &e),
            "Error decoding initial top story IDs: bad json"
        );
    }

    #[test]
    fn item_error_messages_carry_the_id() {
        let e = RelayError::fetch(Some(12), "404");
        assert_eq!(
            describe_item_error(Phase::Delta, 12, &e),
            "Error fetching delta story 12: 404"
        );
        let e = RelayError::Encode {
            id: 3,
            cause: "nope".into(),
        };
        assert_eq!(
            describe_item_error(Phase::Initial, 3, &e),
            "Error marshalling initial story 3 to JSON: nope"
        );
    }

    #[test]
    fn default_limits() {
        let cfg = SchedulerCfg::default();
        assert_eq!(cfg.initial_batch, 10);
        assert_eq!(cfg.max_new_per_tick, 5);
        assert_eq!(cfg.interval, Duration::from_secs(120));
    }
}
