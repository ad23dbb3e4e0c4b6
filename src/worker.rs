//! Named worker threads with cooperative cancellation.
//!
//! Every long-running routine on the board is a [`Worker`]. Workers never
//! stop on their own; they check a shared [`StopSignal`] each time they go to
//! sleep, so a stop request takes effect at the next sleep boundary.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct Flag {
    set: Mutex<bool>,
    cond: Condvar,
}

impl Flag {
    fn raise(&self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        *set = true;
        self.cond.notify_all();
    }

    fn is_raised(&self) -> bool {
        *self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until raised or `timeout` elapses; returns whether it is raised.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        let (set, _) = self
            .cond
            .wait_timeout_while(set, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *set
    }

    fn wait(&self) {
        let set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        let _set = self
            .cond
            .wait_while(set, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Shared stop request. Cloning hands out another handle to the same signal.
#[derive(Clone, Default)]
pub struct StopSignal {
    flag: Arc<Flag>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.raise();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.is_raised()
    }

    /// Sleep for `period` unless a stop arrives first. Returns true if the
    /// caller should keep running.
    pub fn sleep(&self, period: Duration) -> bool {
        !self.flag.wait_timeout(period)
    }
}

/// One-shot gate: closed until `open` is called, open forever after.
#[derive(Clone, Default)]
pub struct Latch {
    flag: Arc<Flag>,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.flag.raise();
    }

    pub fn is_open(&self) -> bool {
        self.flag.is_raised()
    }

    pub fn wait(&self) {
        self.flag.wait();
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.flag.wait_timeout(timeout)
    }
}

/// Stack floor for host builds, where test binaries run without the
/// firmware's size tuning.
#[cfg(not(target_os = "espidf"))]
const HOST_MIN_STACK: usize = 64 * 1024;

fn effective_stack(requested: usize) -> usize {
    #[cfg(not(target_os = "espidf"))]
    let requested = requested.max(HOST_MIN_STACK);
    requested
}

pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<F>(name: &str, stack_size: usize, body: F) -> io::Result<Worker>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.into())
            .stack_size(effective_stack(stack_size))
            .spawn(body)?;
        Ok(Worker {
            name: name.to_string(),
            handle,
        })
    }

    /// Run `tick` immediately and then once per `period` until `stop` fires.
    pub fn spawn_periodic<F>(
        name: &str,
        stack_size: usize,
        period: Duration,
        stop: StopSignal,
        mut tick: F,
    ) -> io::Result<Worker>
    where
        F: FnMut() + Send + 'static,
    {
        Worker::spawn(name, stack_size, move || {
            while !stop.is_stopped() {
                tick();
                if !stop.sleep(period) {
                    break;
                }
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
