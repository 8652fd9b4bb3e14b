//! Cancellable idle timer backing session auto-lock.
//!
//! One worker thread per timer sleeps on a condition variable until the
//! current deadline. Activity pushes the deadline forward with
//! [`IdleTimer::rearm`]; when a deadline passes without being pushed, the
//! callback runs once and the timer goes idle until re-armed. Dropping the
//! timer stops and joins the worker.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// One-shot timer that fires `on_expire` after `timeout` of inactivity.
pub struct IdleTimer {
    shared: Arc<Shared>,
    timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl IdleTimer {
    /// Spawn the worker and arm the timer.
    ///
    /// `on_expire` runs on the worker thread with no timer lock held, so it
    /// may call back into code that re-arms this timer.
    pub fn start<F>(timeout: Duration, on_expire: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                deadline: Some(Instant::now() + timeout),
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("sealvault-idle-timer".to_string())
            .spawn(move || run(&worker_shared, &on_expire))?;

        debug!(?timeout, "Idle timer started");
        Ok(Self {
            shared,
            timeout,
            worker: Some(worker),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the countdown from now.
    pub fn rearm(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = Some(Instant::now() + self.timeout);
        self.shared.wake.notify_one();
        trace!("Idle timer re-armed");
    }

    /// Stop the countdown without firing. A later [`rearm`](Self::rearm) restarts it.
    pub fn disarm(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        self.shared.wake.notify_one();
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.wake.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!("Idle timer stopped");
    }
}

impl std::fmt::Debug for IdleTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleTimer")
            .field("timeout", &self.timeout)
            .field("armed", &self.is_armed())
            .finish_non_exhaustive()
    }
}

fn run(shared: &Shared, on_expire: &dyn Fn()) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                state.deadline = None;
                debug!("Idle timeout reached");
                MutexGuard::unlocked(&mut state, on_expire);
            }
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
}
