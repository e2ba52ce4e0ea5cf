use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    closed: bool,
}

/// Pause flag owned by the HUD. Only the HUD thread flips it; the control
/// loop blocks on it between steps.
#[derive(Debug, Clone, Default)]
pub struct PauseGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl PauseGate {
    pub fn new(paused: bool) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(GateState {
                    paused,
                    closed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.0.lock().map(|s| s.paused).unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.0.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        let (state, cvar) = &*self.inner;
        if let Ok(mut guard) = state.lock() {
            guard.paused = paused;
        }
        cvar.notify_all();
    }

    /// Release every waiter for good; used when the HUD goes away.
    pub(crate) fn close(&self) {
        let (state, cvar) = &*self.inner;
        if let Ok(mut guard) = state.lock() {
            guard.closed = true;
        }
        cvar.notify_all();
    }

    /// Block while paused, re-checking at least every `poll`. Returns `false`
    /// if the gate was closed instead of resumed.
    pub fn wait_while_paused(&self, poll: Duration) -> bool {
        let (state, cvar) = &*self.inner;
        let Ok(mut guard) = state.lock() else {
            return false;
        };
        while guard.paused && !guard.closed {
            guard = match cvar.wait_timeout(guard, poll) {
                Ok((g, _)) => g,
                Err(_) => return false,
            };
        }
        !guard.closed
    }
}
