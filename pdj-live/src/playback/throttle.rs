//! Trailing throttle for outbound prompt updates
//!
//! `trigger(args)` records `args` as the pending value. The first trigger in an
//! idle period opens a window; when the window elapses the action runs once with
//! the latest pending value. Earlier values in the same window are superseded,
//! not queued. Triggers arriving while the action runs open the next window
//! right after it finishes, so executions never overlap and are at least one
//! window apart.
//!
//! Every caller gets a oneshot receiver resolved with the result of the
//! execution that consumed its value. `cancel()` drops the pending value and
//! its waiters (their receivers see the sender dropped).

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Async action run by the throttle
pub type ThrottleAction<T, R> = Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>;

struct Window<T, R> {
    pending: Option<T>,
    waiters: Vec<oneshot::Sender<R>>,
    timer: Option<JoinHandle<()>>,
}

/// Single-flight trailing throttle
pub struct Throttle<T, R> {
    window: Duration,
    action: ThrottleAction<T, R>,
    state: Arc<Mutex<Window<T, R>>>,
}

fn lock<T, R>(state: &Mutex<Window<T, R>>) -> MutexGuard<'_, Window<T, R>> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T, R> Throttle<T, R>
where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    pub fn new(window: Duration, action: ThrottleAction<T, R>) -> Self {
        Self {
            window,
            action,
            state: Arc::new(Mutex::new(Window {
                pending: None,
                waiters: Vec::new(),
                timer: None,
            })),
        }
    }

    /// Record `args` as the latest value; resolves after the execution that uses it
    pub fn trigger(&self, args: T) -> oneshot::Receiver<R> {
        self.enqueue(args, true)
    }

    /// Like `trigger`, but a value already pending in the open window is kept
    /// and `args` is discarded
    pub fn trigger_or_keep_pending(&self, args: T) -> oneshot::Receiver<R> {
        self.enqueue(args, false)
    }

    fn enqueue(&self, args: T, supersede: bool) -> oneshot::Receiver<R> {
        let (tx, rx) = oneshot::channel();
        let mut state = lock(&self.state);
        match (&state.pending, supersede) {
            (None, _) => state.pending = Some(args),
            (Some(_), true) => {
                debug!("Throttle: superseding pending value");
                state.pending = Some(args);
            }
            (Some(_), false) => debug!("Throttle: joining pending value"),
        }
        state.waiters.push(tx);

        if state.timer.is_none() {
            let window = self.window;
            let action = Arc::clone(&self.action);
            let shared = Arc::clone(&self.state);
            state.timer = Some(tokio::spawn(run_windows(window, action, shared)));
        }
        rx
    }

    /// Drop the pending value and stop the open window
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.pending.take().is_some() {
            debug!("Throttle: pending value cancelled");
        }
        state.waiters.clear();
    }

    /// True while a window is open or an execution is running
    pub fn is_active(&self) -> bool {
        lock(&self.state).timer.is_some()
    }
}

async fn run_windows<T, R>(
    window: Duration,
    action: ThrottleAction<T, R>,
    state: Arc<Mutex<Window<T, R>>>,
) where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    loop {
        tokio::time::sleep(window).await;

        let (args, waiters) = {
            let mut guard = lock(&state);
            match guard.pending.take() {
                Some(args) => (args, std::mem::take(&mut guard.waiters)),
                None => {
                    guard.timer = None;
                    return;
                }
            }
        };

        let result = action(args).await;
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        let mut guard = lock(&state);
        if guard.pending.is_none() {
            guard.timer = None;
            return;
        }
    }
}

impl<T, R> Drop for Throttle<T, R> {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.state).timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_throttle(
        window: Duration,
    ) -> (Throttle<u32, u32>, Arc<Mutex<Vec<u32>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let action: ThrottleAction<u32, u32> = Arc::new(move |value| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(value);
                value * 10
            }
            .boxed()
        });
        (Throttle::new(window, action), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_last_value() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));

        let mut receivers = Vec::new();
        for i in 0..10 {
            receivers.push(throttle.trigger(i));
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        for rx in receivers {
            assert_eq!(rx.await.unwrap(), 90);
        }
        assert_eq!(*calls.lock().unwrap(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executes_after_window_not_before() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));
        let rx = throttle.trigger(1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert!(throttle.is_active());

        assert_eq!(rx.await.unwrap(), 10);
        assert_eq!(*calls.lock().unwrap(), vec![1]);
        tokio::task::yield_now().await;
        assert!(!throttle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_continued_activity_does_not_postpone() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));

        // One trigger every 50ms for 500ms: a debounce would never fire
        for i in 0..10 {
            throttle.trigger(i);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        let calls = calls.lock().unwrap();
        assert!(calls.len() >= 2, "expected several windows, got {:?}", *calls);
        assert_eq!(*calls.last().unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_each_execute() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));

        assert_eq!(throttle.trigger(1).await.unwrap(), 10);
        assert_eq!(throttle.trigger(2).await.unwrap(), 20);
        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_pending_joins_open_window() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));

        let first = throttle.trigger(3);
        tokio::time::advance(Duration::from_millis(50)).await;
        let joined = throttle.trigger_or_keep_pending(0);

        assert_eq!(first.await.unwrap(), 30);
        assert_eq!(joined.await.unwrap(), 30);
        assert_eq!(*calls.lock().unwrap(), vec![3]);

        // Nothing pending: the value is used
        assert_eq!(throttle.trigger_or_keep_pending(0).await.unwrap(), 0);
        assert_eq!(*calls.lock().unwrap(), vec![3, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (throttle, calls) = recording_throttle(Duration::from_millis(200));
        let rx = throttle.trigger(7);
        throttle.cancel();

        assert!(rx.await.is_err());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert!(!throttle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_executions_never_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (r, m) = (Arc::clone(&running), Arc::clone(&max_seen));
        let action: ThrottleAction<u32, ()> = Arc::new(move |_| {
            let (r, m) = (Arc::clone(&r), Arc::clone(&m));
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                r.fetch_sub(1, Ordering::SeqCst);
            }
            .boxed()
        });
        let throttle = Throttle::new(Duration::from_millis(100), action);

        let first = throttle.trigger(1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let second = throttle.trigger(2);

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
