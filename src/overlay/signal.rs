use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-shot, level-triggered flag that other threads can block on.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let (flag, cvar) = &*self.inner;
        if let Ok(mut guard) = flag.lock() {
            *guard = true;
        }
        cvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        self.inner.0.lock().map(|g| *g).unwrap_or(true)
    }

    /// Block until set or `timeout` elapses. Returns whether it is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let Ok(mut guard) = flag.lock() else {
            return true;
        };
        while !*guard {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match cvar.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(_) => return true,
            };
        }
        true
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("set", &self.is_set()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Signal;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_once_set_from_another_thread() {
        let signal = Signal::new();
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.set();
        });
        assert!(signal.wait_timeout(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_when_unset() {
        let signal = Signal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        assert!(!signal.is_set());
    }
}
