// Copyright (C) 2026 The Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, trace, warn};

use crate::builtins::BuiltinTable;
use crate::environment::Environment;
use crate::eval::vm_eval;
use crate::state::EnvState;

/// A plain counting semaphore: `acquire` blocks while the count is zero,
/// `release` increments and wakes one waiter. Used by the runnable queue as
/// its "escapement" — a mutex and a counting semaphore governing the
/// runnable queue.
struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    fn new(initial: usize) -> Self {
        Semaphore {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        while *count == 0 {
            count = self.cond.wait(count).expect("semaphore mutex poisoned");
        }
        *count -= 1;
    }

    fn release(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        *count += 1;
        self.cond.notify_one();
    }
}

/// Reader/writer gate around dict mutation (the `RDLOCK`/`WRLOCK`
/// opcodes): any number of readers may hold it together, but a writer
/// excludes everyone else. Tracked by hand rather than `std::sync::RwLock`
/// because the acquire and release happen in two different opcode
/// dispatches, with arbitrary VM work running in between — no single scope
/// can own a `RwLockReadGuard`.
struct RwGate {
    state: Mutex<RwGateState>,
    cond: Condvar,
}

enum RwGateState {
    Idle,
    Reading(usize),
    Writing,
}

impl RwGate {
    fn new() -> Self {
        RwGate {
            state: Mutex::new(RwGateState::Idle),
            cond: Condvar::new(),
        }
    }

    fn acquire_read(&self) {
        let mut state = self.state.lock().expect("rwgate mutex poisoned");
        loop {
            match *state {
                RwGateState::Writing => {
                    state = self.cond.wait(state).expect("rwgate mutex poisoned");
                }
                RwGateState::Idle => {
                    *state = RwGateState::Reading(1);
                    return;
                }
                RwGateState::Reading(n) => {
                    *state = RwGateState::Reading(n + 1);
                    return;
                }
            }
        }
    }

    fn release_read(&self) {
        let mut state = self.state.lock().expect("rwgate mutex poisoned");
        match *state {
            RwGateState::Reading(1) => {
                *state = RwGateState::Idle;
                self.cond.notify_all();
            }
            RwGateState::Reading(n) => *state = RwGateState::Reading(n - 1),
            _ => warn!("release_read called without a held read lock"),
        }
    }

    fn acquire_write(&self) {
        let mut state = self.state.lock().expect("rwgate mutex poisoned");
        while !matches!(*state, RwGateState::Idle) {
            state = self.cond.wait(state).expect("rwgate mutex poisoned");
        }
        *state = RwGateState::Writing;
    }

    fn release_write(&self) {
        let mut state = self.state.lock().expect("rwgate mutex poisoned");
        if matches!(*state, RwGateState::Writing) {
            *state = RwGateState::Idle;
            self.cond.notify_all();
        } else {
            warn!("release_write called without a held write lock");
        }
    }
}

/// The runnable-environment queue, the dict reader/writer gate, and the
/// builtin table, shared by every worker thread.
pub struct Runtime {
    queue: Mutex<VecDeque<Environment>>,
    escapement: Semaphore,
    dict_gate: RwGate,
    builtins: BuiltinTable,
    /// Environments enqueued but not yet terminal, counted so the driver can
    /// tell when a whole run (all top-level environments and anything they
    /// yielded and resumed) has finished without the workers themselves
    /// needing a shutdown protocol.
    outstanding: AtomicUsize,
    idle: Condvar,
    idle_lock: Mutex<()>,
}

impl Runtime {
    pub fn new(builtins: BuiltinTable) -> Arc<Self> {
        Arc::new(Runtime {
            queue: Mutex::new(VecDeque::new()),
            escapement: Semaphore::new(0),
            dict_gate: RwGate::new(),
            builtins,
            outstanding: AtomicUsize::new(0),
            idle: Condvar::new(),
            idle_lock: Mutex::new(()),
        })
    }

    pub(crate) fn dict_gate(&self) -> &RwGate {
        &self.dict_gate
    }

    pub(crate) fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    /// `vm_env_enq`: push `env` onto the runnable queue and wake one worker.
    pub fn enqueue(&self, env: Environment) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.queue.lock().expect("queue mutex poisoned");
        queue.push_back(env);
        drop(queue);
        self.escapement.release();
    }

    /// `vm_env_deq`: block until an environment is runnable, then take it.
    fn dequeue(&self) -> Environment {
        self.escapement.acquire();
        let mut queue = self.queue.lock().expect("queue mutex poisoned");
        queue.pop_front().expect("escapement count matches queue occupancy")
    }

    /// Block the calling thread until every enqueued environment has
    /// reached a terminal state.
    pub fn wait_idle(&self) {
        let mut guard = self.idle_lock.lock().expect("idle mutex poisoned");
        while self.outstanding.load(Ordering::SeqCst) != 0 {
            guard = self.idle.wait(guard).expect("idle mutex poisoned");
        }
    }

    fn mark_terminal(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = self.idle_lock.lock().expect("idle mutex poisoned");
            self.idle.notify_all();
        }
    }
}

/// Run `thread_count` worker threads that each pull an environment off the
/// queue, drive it with `vm_eval` until it yields or terminates, and either
/// re-enqueue (still runnable) or report it (terminal) through `on_done`.
/// The threads are daemon-style: they run until the process exits, parked
/// on the escapement semaphore whenever the queue is empty. Callers drive
/// shutdown with [`Runtime::wait_idle`], not by joining these handles.
pub fn run_workers(
    runtime: Arc<Runtime>,
    thread_count: usize,
    on_done: impl Fn(Environment) + Send + Sync + 'static,
) -> Vec<JoinHandle<()>> {
    let on_done = Arc::new(on_done);
    (0..thread_count.max(1))
        .map(|id| {
            let runtime = runtime.clone();
            let on_done = on_done.clone();
            std::thread::Builder::new()
                .name(format!("lt-vm-worker-{id}"))
                .spawn(move || worker_loop(runtime, on_done))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

fn worker_loop(runtime: Arc<Runtime>, on_done: Arc<dyn Fn(Environment) + Send + Sync>) {
    loop {
        let mut env = runtime.dequeue();
        trace!(state = ?env.state, "dispatching environment");
        vm_eval(&mut env, &runtime);
        if env.state.is_runnable() {
            debug!("environment yielded, re-enqueuing");
            let mut queue = runtime.queue.lock().expect("queue mutex poisoned");
            queue.push_back(env);
            drop(queue);
            runtime.escapement.release();
        } else {
            runtime.mark_terminal();
            on_done(env);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_tree::Ltv;

    #[test]
    fn enqueue_then_dequeue_round_trips() {
        let runtime = Runtime::new(BuiltinTable::with_defaults());
        let env = Environment::new(Ltv::none());
        runtime.enqueue(env);
        let got = runtime.dequeue();
        assert!(matches!(got.state, EnvState::Runnable));
    }

    #[test]
    fn rwgate_allows_concurrent_readers() {
        let gate = RwGate::new();
        gate.acquire_read();
        gate.acquire_read();
        gate.release_read();
        gate.release_read();
    }
}
