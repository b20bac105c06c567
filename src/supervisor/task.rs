use std::{future::Future, time::Duration};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Longest supported period between two ticks.
pub const MAX_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Piece of work which is repeated until cancelled or dropped.
#[derive(Debug)]
pub struct Task {
    _shutdown: DropGuard,
}

impl Task {
    /// Spawns a `tokio::task` running `tick` every `period`, the first time one `period` from now.
    ///
    /// Ticks never overlap: if a tick takes longer than `period` the missed ones are skipped.
    /// `period` is clamped to [`MAX_PERIOD`].
    pub fn repeat<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        tokio::task::spawn(async move {
            let now = Instant::now();
            let start = now.checked_add(period).unwrap_or(now);
            let mut interval = time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                // Outside of the select so cancelling never interrupts a running tick.
                tick().await;
            }
        });

        Self {
            _shutdown: shutdown.drop_guard(),
        }
    }

    /// Prevents any further ticks. A tick which is already running is allowed to complete.
    pub fn cancel(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting(period: Duration, delay: Duration) -> (Task, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (started.clone(), finished.clone());
        let task = Task::repeat(period, move || {
            let (s, f) = (s.clone(), f.clone());
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                time::sleep(delay).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, started, finished)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let (task, started, _) = counting(Duration::from_secs(10), Duration::ZERO);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(started.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);

        task.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let (task, started, _) = counting(Duration::from_secs(10), Duration::ZERO);

        time::sleep(Duration::from_secs(15)).await;
        task.cancel();
        time::sleep(Duration::from_secs(100)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn running_tick_completes_after_cancel() {
        let (task, started, finished) =
            counting(Duration::from_secs(10), Duration::from_secs(30));

        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        task.cancel();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stops_ticking() {
        let (task, started, _) = counting(Duration::from_secs(10), Duration::ZERO);

        time::sleep(Duration::from_secs(15)).await;
        drop(task);
        time::sleep(Duration::from_secs(100)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_periods_are_clamped() {
        let (task, started, _) = counting(Duration::from_secs(u64::MAX), Duration::ZERO);

        time::sleep(MAX_PERIOD - Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        task.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_do_not_overlap() {
        let (task, started, finished) =
            counting(Duration::from_secs(10), Duration::from_secs(25));

        time::sleep(Duration::from_secs(100)).await;

        // Every started tick but the current one has finished.
        let started = started.load(Ordering::SeqCst);
        let finished = finished.load(Ordering::SeqCst);
        assert!(started - finished <= 1);
        assert!(started < 10);

        task.cancel();
    }
}
