//! Cooperative kill switch shared between the animation thread and whoever
//! started it.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the switch and wake anyone blocked in `wait`.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first.
    /// Returns true if the token was cancelled. A timeout too large to
    /// represent as a deadline waits for cancellation alone.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !*cancelled {
                cancelled = cvar.wait(cancelled).unwrap_or_else(|e| e.into_inner());
            }
            return true;
        };
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = match cvar.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        *cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.wait(Duration::from_millis(1)));
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait(Duration::from_secs(10)));
    }

    #[test]
    fn cancel_interrupts_wait() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(token.wait(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_timeout_still_wakes_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(token.wait(Duration::from_secs(u64::MAX)));
        assert!(token.wait(Duration::MAX));
        handle.join().unwrap();
    }
}
