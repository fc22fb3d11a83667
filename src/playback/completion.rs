//! One-shot, multi-observer end-of-track signal.

use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    fired: Mutex<bool>,
    cond: Condvar,
}

/// Firing side of the signal. Firing more than once is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        let mut fired = self.inner.fired.lock();
        if *fired {
            return false;
        }
        *fired = true;
        self.inner.cond.notify_all();
        true
    }

    #[cfg(test)]
    pub fn is_fired(&self) -> bool {
        *self.inner.fired.lock()
    }

    /// Read-only view handed to observers.
    pub fn signal(&self) -> EndedSignal {
        EndedSignal {
            inner: self.inner.clone(),
        }
    }
}

/// Observer side: can be queried or waited on, never fired.
#[derive(Debug, Clone)]
pub struct EndedSignal {
    inner: Arc<Inner>,
}

impl EndedSignal {
    pub fn is_fired(&self) -> bool {
        *self.inner.fired.lock()
    }

    /// Block until the signal fires or `timeout` elapses. Returns whether it fired.
    #[cfg(test)]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut fired = self.inner.fired.lock();
        if !*fired {
            self.inner.cond.wait_while_for(&mut fired, |f| !*f, timeout);
        }
        *fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fires_exactly_once() {
        let c = Completion::new();
        let s = c.signal();
        assert!(!s.is_fired());
        assert!(c.fire());
        assert!(!c.fire());
        assert!(s.is_fired());
        assert!(c.is_fired());
    }

    #[test]
    fn wakes_every_waiter() {
        let c = Completion::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let s = c.signal();
                thread::spawn(move || s.wait_timeout(Duration::from_secs(5)))
            })
            .collect();
        c.fire();
        for w in waiters {
            assert!(w.join().unwrap());
        }
    }

    #[test]
    fn wait_timeout_reports_unfired() {
        let c = Completion::new();
        assert!(!c.signal().wait_timeout(Duration::from_millis(10)));
    }
}
