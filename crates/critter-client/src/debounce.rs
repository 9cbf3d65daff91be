use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs only the most recently scheduled call, once `delay` has passed
/// without a newer one. Scheduling aborts whatever is pending, including
/// a call that already started.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F, Fut>(&mut self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f().await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn only_last_call_runs() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer = Debouncer::new(Duration::from_millis(30));

        for n in 0..3 {
            let calls = calls.clone();
            debouncer.schedule(move || async move { calls.lock().unwrap().push(n) });
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(*calls.lock().unwrap(), [2]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn cancel_drops_pending_call() {
        let calls = Arc::new(Mutex::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(20));

        let counter = calls.clone();
        debouncer.schedule(move || async move { *counter.lock().unwrap() += 1 });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
