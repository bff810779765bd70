use std::time::Duration;
use tokio::{task::JoinHandle, time::Instant};

// Single slot one-shot timer. Scheduling replaces (aborts) the previous
// action, so at most one action is pending at any time. Must be used from
// within a tokio runtime.
#[derive(Debug, Default)]
pub struct Timer {
    join_handle: Option<JoinHandle<()>>,
}
impl Timer {
    pub fn new() -> Self {
        Self { join_handle: None }
    }

    // deadline is fixed here, not when the task gets polled for the first time
    pub fn schedule<F>(
        &mut self,
        duration: Duration,
        action: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let deadline = Instant::now() + duration;
        let join_handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            action();
        });
        self.join_handle = Some(join_handle);
    }

    // aborting an already finished task does nothing
    pub fn cancel(&mut self) -> bool {
        match self.join_handle.take() {
            Some(join_handle) => {
                let pending = !join_handle.is_finished();
                join_handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|join_handle| !join_handle.is_finished())
    }
}
impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = Timer::new();

        let fired_ = fired.clone();
        timer.schedule(Duration::from_secs(5), move || {
            fired_.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_pending());

        tokio::time::advance(Duration::from_millis(4999)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());

        // cancelling fired timer is harmless
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = Timer::new();

        for seconds in [1, 3] {
            let fired_ = fired.clone();
            timer.schedule(Duration::from_secs(seconds), move || {
                fired_.fetch_add(seconds as usize, Ordering::SeqCst);
            });
        }

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = Timer::new();

        let fired_ = fired.clone();
        timer.schedule(Duration::from_secs(1), move || {
            fired_.fetch_add(1, Ordering::SeqCst);
        });
        drop(timer);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
