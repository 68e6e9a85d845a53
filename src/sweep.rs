//! Background expiration sweeper.
//!
//! ## Architecture
//!
//! ```text
//!   CacheTable ──owns──► Sweeper ──owns──► JoinHandle
//!        ▲                  │
//!        │ Weak             │ Arc<SweepSignal>
//!        │                  ▼
//!   sweep thread ◄──── Mutex<SweepState> + Condvar
//!                       next_deadline, shutdown
//! ```
//!
//! The thread only holds a weak reference to its target, so dropping the last
//! table handle drops the `Sweeper`, which raises `shutdown` and joins the
//! thread.
//!
//! ## Strategies
//!
//! - `Adaptive`: wait until `next_deadline`; `schedule` lowers it and wakes
//!   the thread when an earlier deadline arrives. After each sweep the target
//!   reports the nearest remaining deadline.
//! - `Interval(p)`: wake every `p` and sweep.
//! - `Manual`: no thread is started.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::SweepStrategy;

/// Something the sweeper can expire.
pub(crate) trait Sweep: Send + Sync + 'static {
    /// Removes every due entry and returns the nearest remaining deadline.
    fn sweep(&self) -> Option<Instant>;
}

#[derive(Debug, Default)]
struct SweepState {
    next_deadline: Option<Instant>,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct SweepSignal {
    state: Mutex<SweepState>,
    wake: Condvar,
}

impl SweepSignal {
    fn schedule(&self, deadline: Instant) {
        let mut state = self.state.lock();
        if state.next_deadline.is_none_or(|current| deadline < current) {
            state.next_deadline = Some(deadline);
            self.wake.notify_one();
        }
    }

    /// Blocks until the next sweep is due. Returns `false` on shutdown.
    fn wait_for_turn(&self, strategy: SweepStrategy) -> bool {
        let mut state = self.state.lock();
        match strategy {
            SweepStrategy::Interval(period) => match Instant::now().checked_add(period) {
                Some(until) => {
                    while !state.shutdown {
                        if self.wake.wait_until(&mut state, until).timed_out() {
                            break;
                        }
                    }
                },
                None => {
                    while !state.shutdown {
                        self.wake.wait(&mut state);
                    }
                },
            },
            _ => loop {
                if state.shutdown {
                    break;
                }
                match state.next_deadline {
                    Some(deadline) if deadline <= Instant::now() => {
                        state.next_deadline = None;
                        break;
                    },
                    Some(deadline) => {
                        self.wake.wait_until(&mut state, deadline);
                    },
                    None => self.wake.wait(&mut state),
                }
            },
        }
        !state.shutdown
    }

    fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.wake.notify_all();
    }
}

/// Owner side of a table's sweep thread.
#[derive(Debug)]
pub(crate) struct Sweeper {
    signal: Arc<SweepSignal>,
    strategy: SweepStrategy,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Starts the sweep thread for `target` unless the strategy is manual.
    ///
    /// A failed thread spawn degrades to manual sweeping; expire-on-read keeps
    /// lookups correct in that case.
    pub(crate) fn start<T: Sweep>(target: Weak<T>, name: &str, strategy: SweepStrategy) -> Self {
        let strategy = match strategy {
            SweepStrategy::Interval(period) if period.is_zero() => {
                warn!(table = %name, "zero sweep interval, falling back to adaptive sweeping");
                SweepStrategy::Adaptive
            },
            strategy => strategy,
        };
        let signal = Arc::new(SweepSignal::default());
        let handle = match strategy {
            SweepStrategy::Manual => None,
            SweepStrategy::Adaptive | SweepStrategy::Interval(_) => {
                let thread_signal = Arc::clone(&signal);
                let table = name.to_owned();
                let spawned = thread::Builder::new()
                    .name(format!("cachetable-sweep-{name}"))
                    .spawn(move || run(target, thread_signal, strategy, table));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        warn!(table = %name, error = %err, "failed to start sweep thread");
                        None
                    },
                }
            },
        };
        Self {
            signal,
            strategy,
            handle: Mutex::new(handle),
        }
    }

    /// Makes sure a sweep happens no later than `deadline`.
    pub(crate) fn schedule(&self, deadline: Instant) {
        if self.strategy == SweepStrategy::Adaptive {
            self.signal.schedule(deadline);
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the sweep thread and waits for it, unless called from the sweep
    /// thread itself (the thread may drop the last table handle).
    pub(crate) fn shutdown(&self) {
        self.signal.shutdown();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: Sweep>(target: Weak<T>, signal: Arc<SweepSignal>, strategy: SweepStrategy, table: String) {
    debug!(table = %table, ?strategy, "sweep thread started");
    while signal.wait_for_turn(strategy) {
        // Upgrade fails while the table is still being constructed or is
        // being torn down; shutdown is observed on the next turn.
        let Some(target) = target.upgrade() else {
            continue;
        };
        let next = target.sweep();
        drop(target);
        if let Some(next) = next {
            signal.schedule(next);
        }
    }
    debug!(table = %table, "sweep thread stopped");
}
