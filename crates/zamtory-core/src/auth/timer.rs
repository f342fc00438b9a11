use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Periodic background task driving automatic token refresh.
///
/// At most one task runs at a time. Arming again restarts the period, so
/// a refresh that replaces the user record pushes the next firing a full
/// period out instead of overlapping with a still-running tick.
pub(crate) struct RefreshTimer {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshTimer {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            handle: Mutex::new(None),
        }
    }

    /// Start or restart the timer. `tick` runs once per period until it
    /// returns false or the timer is disarmed.
    pub(crate) fn arm<F, Fut>(&self, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let period = self.period;
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if !tick().await {
                    debug!("Refresh timer stopping");
                    break;
                }
            }
        });

        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(period_secs = period.as_secs(), "Refresh timer armed");
    }

    pub(crate) fn disarm(&self) {
        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.abort();
            debug!("Refresh timer disarmed");
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_tick(counter: &Arc<AtomicUsize>, keep_going: bool) -> impl Fn() -> std::future::Ready<bool> {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(keep_going)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let timer = RefreshTimer::new(Duration::from_secs(300));
        timer.arm(counting_tick(&ticks, true));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_stops_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let timer = RefreshTimer::new(Duration::from_secs(300));
        timer.arm(counting_tick(&ticks, true));
        timer.disarm();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let timer = RefreshTimer::new(Duration::from_secs(300));
        timer.arm(counting_tick(&ticks, true));

        tokio::time::sleep(Duration::from_secs(200)).await;
        timer.arm(counting_tick(&ticks, true));

        // The first task would have fired at 300s
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(101)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_false_stops_timer() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let timer = RefreshTimer::new(Duration::from_secs(60));
        timer.arm(counting_tick(&ticks, false));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }
}
