use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

use crate::db::SnapshotStore;
use crate::diff::compute_changes;
use crate::error::StoreError;
use crate::model::Report;
use crate::notify::{MessageSink, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A report with this many changes went out.
    Sent(usize),
    /// Nothing new to say, or the send failed and will be retried.
    Quiet(usize),
    /// The store could not be read.
    Failed,
}

/// Runs diff + notify on a fixed interval, one tick at a time.
///
/// The last delivered report lives only in memory; after a restart the first
/// non-empty report is always sent.
pub struct Scheduler<St, S> {
    store: St,
    notifier: Notifier<S>,
    interval: Duration,
    baseline: Report,
    state: State,
}

impl<St: SnapshotStore, S: MessageSink> Scheduler<St, S> {
    pub fn new(store: St, notifier: Notifier<S>, interval: Duration) -> Self {
        Scheduler {
            store,
            notifier,
            interval,
            baseline: Report::empty(),
            state: State::Idle,
        }
    }

    /// One diff/notify cycle. Errors are logged here and never propagated.
    pub async fn tick(&mut self) -> TickOutcome {
        debug_assert_eq!(self.state, State::Idle);
        self.state = State::Running;
        let outcome = match self.try_tick().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let kind = match e {
                    StoreError::Write(_) => "store_write",
                    _ => "store_read",
                };
                error!(error_kind = kind, "Tick failed: {}", e);
                TickOutcome::Failed
            }
        };
        self.state = State::Idle;
        outcome
    }

    async fn try_tick(&mut self) -> Result<TickOutcome, StoreError> {
        let observations = self.store.read_all_by_recency_desc()?;
        let report = compute_changes(&observations);
        let changes = report.len();

        let baseline = std::mem::take(&mut self.baseline);
        let delivery = self.notifier.notify(report, baseline).await;
        self.baseline = delivery.baseline;

        Ok(if delivery.sent {
            TickOutcome::Sent(changes)
        } else {
            TickOutcome::Quiet(changes)
        })
    }

    /// Tick, wait the interval, repeat. Stops after `max_ticks` ticks when
    /// given, or on Ctrl-C.
    pub async fn run(&mut self, max_ticks: Option<u64>) {
        self.run_until(max_ticks, tokio::signal::ctrl_c()).await;
    }

    /// `shutdown` is polled during ticks as well as between them.
    async fn run_until<F: Future>(&mut self, max_ticks: Option<u64>, shutdown: F) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Watching for price changes"
        );
        tokio::pin!(shutdown);
        let mut ticks = 0u64;
        loop {
            let outcome = tokio::select! {
                outcome = self.tick() => outcome,
                _ = &mut shutdown => {
                    info!("Interrupted during tick, stopping");
                    break;
                }
            };
            ticks += 1;
            info!(tick = ticks, ?outcome, "Tick finished");

            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }
        self.state = State::Idle;
    }

    #[cfg(test)]
    fn state(&self) -> State {
        self.state
    }

    #[cfg(test)]
    fn baseline(&self) -> &Report {
        &self.baseline
    }

    #[cfg(test)]
    fn store(&self) -> &St {
        &self.store
    }

    #[cfg(test)]
    fn sink(&self) -> &S {
        self.notifier.sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::model::{NewObservation, Observation};
    use crate::notify::tests::RecordingSink;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use crate::error::NotifyError;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn obs(name: &str, price: &str) -> NewObservation {
        NewObservation {
            name: name.to_string(),
            price: Decimal::from_str(price).unwrap(),
            detail_url: format!("https://shop.test/{}", name),
        }
    }

    fn scheduler(history: &[NewObservation]) -> Scheduler<SqliteStore, RecordingSink> {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.append(history).unwrap();
        Scheduler::new(
            store,
            Notifier::new(RecordingSink::default(), "chat"),
            Duration::ZERO,
        )
    }

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn append(&self, _: &[NewObservation]) -> Result<usize, StoreError> {
            Err(StoreError::Write(rusqlite::Error::InvalidQuery))
        }

        fn read_all_by_recency_desc(&self) -> Result<Vec<Observation>, StoreError> {
            Err(StoreError::Read(rusqlite::Error::InvalidQuery))
        }
    }

    #[tokio::test]
    async fn identical_ticks_send_once() {
        let mut s = scheduler(&[obs("A", "10"), obs("B", "5"), obs("A", "12")]);
        assert_eq!(s.tick().await, TickOutcome::Sent(1));
        assert_eq!(s.tick().await, TickOutcome::Quiet(1));
        assert_eq!(s.sink().count(), 1);
        assert_eq!(s.state(), State::Idle);
    }

    #[tokio::test]
    async fn new_scrape_triggers_new_message() {
        let mut s = scheduler(&[obs("A", "10"), obs("A", "12")]);
        s.tick().await;
        s.store().append(&[obs("A", "9")]).unwrap();
        assert_eq!(s.tick().await, TickOutcome::Sent(1));

        let sent = s.sink().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.contains("Price Difference: -3"));
    }

    #[tokio::test]
    async fn unchanged_prices_never_send() {
        let mut s = scheduler(&[obs("A", "10"), obs("A", "10")]);
        assert_eq!(s.tick().await, TickOutcome::Quiet(0));
        assert_eq!(s.sink().count(), 0);
    }

    #[tokio::test]
    async fn failed_send_is_retried_next_tick() {
        let mut s = scheduler(&[obs("A", "10"), obs("A", "12")]);
        s.sink().failing.store(true, Ordering::SeqCst);
        assert_eq!(s.tick().await, TickOutcome::Quiet(1));
        assert!(s.baseline().is_empty());

        s.sink().failing.store(false, Ordering::SeqCst);
        assert_eq!(s.tick().await, TickOutcome::Sent(1));
        assert_eq!(s.sink().count(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_contained() {
        let mut s = Scheduler::new(
            BrokenStore,
            Notifier::new(RecordingSink::default(), "chat"),
            Duration::ZERO,
        );
        assert_eq!(s.tick().await, TickOutcome::Failed);
        assert_eq!(s.tick().await, TickOutcome::Failed);
        assert_eq!(s.state(), State::Idle);
        assert_eq!(s.sink().count(), 0);
    }

    /// Fires `shutdown` from inside the first delivery.
    struct InterruptingSink(Mutex<Option<oneshot::Sender<()>>>);

    impl MessageSink for InterruptingSink {
        async fn send_text(&self, _: &str, _: &str) -> Result<(), NotifyError> {
            if let Some(tx) = self.0.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn interrupt_during_a_tick_stops_the_loop() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.append(&[obs("A", "10"), obs("A", "12")]).unwrap();
        let (tx, rx) = oneshot::channel();
        let mut s = Scheduler::new(
            store,
            Notifier::new(InterruptingSink(Mutex::new(Some(tx))), "chat"),
            Duration::ZERO,
        );

        tokio::time::timeout(Duration::from_secs(5), s.run_until(None, rx))
            .await
            .expect("loop kept running after the interrupt");
        assert_eq!(s.state(), State::Idle);
    }

    #[tokio::test]
    async fn run_stops_after_max_ticks() {
        let mut s = scheduler(&[obs("A", "10"), obs("A", "12")]);
        s.run(Some(3)).await;
        assert_eq!(s.sink().count(), 1);
        assert_eq!(s.baseline().len(), 1);
    }
}
