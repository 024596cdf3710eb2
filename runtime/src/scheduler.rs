//! Scheduler (spec §4.4, C6): assigns tasks to workers and maintains their
//! ready queues.
//!
//! Grounded in `cj_Task_enqueue`/`cj_Worker_wait_dqueue` in `cj.c`: pick the
//! worker minimising `time_remaining[i] + cost`, push under that worker's
//! lock, bump its running total.

use crate::coherence::CoherenceDirectory;
use crate::cost::CostModel;
use crate::device::DeviceRegistry;
use crate::graph::{Task, TaskGraph, TaskId};
use crate::tile::BaseMatrix;
use crate::worker::WorkerSpec;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

struct WorkerQueue {
    ready: VecDeque<TaskId>,
    expected_finish: f64,
}

/// Per-worker ready queues plus the running `expected_finish` estimate
/// used to balance load. Index 0 is the reserved submission/coordination
/// worker and is never assigned a task (spec §4.4) but still gets an entry
/// so indices line up with worker ids.
pub struct Scheduler {
    queues: Vec<Mutex<WorkerQueue>>,
    ready_cv: Vec<Condvar>,
    shutdown: AtomicBool,
}

impl Scheduler {
    pub fn new(worker_count: usize) -> Self {
        Self {
            queues: (0..worker_count)
                .map(|_| {
                    Mutex::new(WorkerQueue {
                        ready: VecDeque::new(),
                        expected_finish: 0.0,
                    })
                })
                .collect(),
            ready_cv: (0..worker_count).map(|_| Condvar::new()).collect(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    /// Picks the best worker for `task` among the executor workers
    /// (excludes worker 0, reserved), assigns its cost, and appends it to
    /// that worker's ready queue. Ties favour the lowest worker id (spec
    /// §4.4 reproducibility rule). Returns `None` if there is no executor
    /// worker to assign to (pool of exactly one worker — spec §4.4: "all
    /// tasks run on the submission worker inline").
    pub fn enqueue(
        &self,
        graph: &TaskGraph,
        task: &Task,
        workers: &[WorkerSpec],
        cost_model: &CostModel,
        devices: &DeviceRegistry,
        coherence: &CoherenceDirectory,
        bases: &HashMap<crate::tile::BaseId, BaseMatrix>,
    ) -> Option<usize> {
        if self.queues.len() <= 1 {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None; // (worker, finish_time, cost)
        for worker in workers.iter().filter(|w| w.id != 0) {
            let cost = cost_model.estimate(task, worker.device_id, devices, coherence, bases);
            let current_finish = self.queues[worker.id].lock().expected_finish;
            let candidate_finish = current_finish + cost;
            let better = match best {
                None => true,
                Some((_, finish, _)) => candidate_finish < finish,
            };
            if better {
                best = Some((worker.id, candidate_finish, cost));
            }
        }

        let (w, _finish, cost) = best.expect("at least one executor worker");
        graph.set_queued(task.id, cost);
        {
            let mut q = self.queues[w].lock();
            q.ready.push_back(task.id);
            q.expected_finish += cost;
        }
        self.ready_cv[w].notify_one();
        Some(w)
    }

    /// Blocking pop for worker `id`: waits on its ready-queue condvar until
    /// a task is available or shutdown is signalled.
    pub fn wait_pop(&self, id: usize) -> Option<TaskId> {
        let mut q = self.queues[id].lock();
        loop {
            if let Some(task) = q.ready.pop_front() {
                return Some(task);
            }
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            self.ready_cv[id].wait(&mut q);
        }
    }

    pub fn expected_finish(&self, id: usize) -> f64 {
        self.queues[id].lock().expected_finish
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for cv in &self.ready_cv {
            cv.notify_all();
        }
    }
}
