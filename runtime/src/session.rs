//! Session Controller (spec §4.7, C8): lifecycle, quiescence, submission
//! gating.
//!
//! Grounded in `cj_Init`/`cj_Term`/`cj_Queue_begin`/`cj_Queue_end` in
//! `cj.c`. Per the redesign note in spec.md §9, the runtime is a value
//! (`Session`) constructed by `init` and shared with worker threads via
//! `Arc`, rather than the original's single process-wide `static cj_t cj`.

use crate::analyser;
use crate::cache::DeviceCache;
use crate::coherence::CoherenceDirectory;
use crate::cost::{Autotuner, CostModel, StaticAutotuner};
use crate::device::DeviceRegistry;
use crate::diagnostics;
use crate::error::{CjError, CjResult};
use crate::graph::{TaskGraph, TaskId, TaskStatus};
use crate::tile::{BaseId, BaseMatrix, ElementType, MatrixRef};
use crate::worker::{self, Kernel, WorkerSpec};
use crate::scheduler::Scheduler;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Recording,
    Draining,
}

/// One accelerator device to register at `init` time.
pub struct AcceleratorConfig {
    pub device_id: i32,
    pub cache_slots: usize,
    pub line_bytes: usize,
    pub link_bandwidth_bytes_per_sec: f64,
}

/// Parameters for `init`. No environment variables are read (spec §6);
/// everything the runtime needs is explicit here.
pub struct RuntimeConfig {
    /// Number of executor workers, not counting the reserved
    /// submission/coordination worker (spec §4.4, §6). Zero is valid: the
    /// pool then holds only the reserved worker and every task runs
    /// inline (spec §4.4 "fewer than two workers").
    pub executor_workers: usize,
    pub accelerators: Vec<AcceleratorConfig>,
    pub autotuner: Option<Arc<dyn Autotuner>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            executor_workers: 1,
            accelerators: Vec::new(),
            autotuner: None,
        }
    }
}

/// Outcome of `term()`: the dependency graph in DOT-like form (spec §6)
/// plus a summary of tasks that ended `Failed` (spec §7).
pub struct TermReport {
    pub dot: String,
    pub failed_tasks: Vec<TaskId>,
}

/// The runtime, constructed by `init` and torn down by `term`. Shared with
/// worker threads via `Arc<Session>`.
pub struct Session {
    graph: TaskGraph,
    coherence: CoherenceDirectory,
    devices: DeviceRegistry,
    autotuner: Arc<dyn Autotuner>,
    scheduler: Scheduler,
    workers: Vec<WorkerSpec>,
    bases: Mutex<HashMap<BaseId, BaseMatrix>>,
    next_base_id: AtomicU32,
    state: Mutex<SessionState>,
    /// Graph-wide lock, held only during dependency analysis and
    /// diagnostic reporting (spec §5).
    analysis_lock: Mutex<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    drain_lock: Mutex<()>,
    drain_cv: Condvar,
}

impl Session {
    /// Starts the runtime with the given configuration (spec §6 `init`).
    ///
    /// `executor_workers == 0` is a valid, degenerate configuration: the
    /// pool then holds only the reserved worker, and every task runs
    /// inline at dispatch time (spec §4.4 "fewer than two workers").
    pub fn init(config: RuntimeConfig) -> CjResult<Arc<Self>> {
        let mut devices = DeviceRegistry::new();
        for acc in &config.accelerators {
            devices.add_accelerator(acc.device_id, acc.cache_slots, acc.line_bytes, acc.link_bandwidth_bytes_per_sec);
        }

        let total_workers = config.executor_workers + 1;
        let accel_ids = devices.accelerator_ids();
        let mut workers = vec![WorkerSpec::cpu(0)];
        for i in 1..total_workers {
            match accel_ids.get(i - 1) {
                Some(&dev) => workers.push(WorkerSpec::accelerator(i, dev)),
                None => workers.push(WorkerSpec::cpu(i)),
            }
        }

        let autotuner = config
            .autotuner
            .unwrap_or_else(|| Arc::new(StaticAutotuner::default()));

        let session = Arc::new(Session {
            graph: TaskGraph::new(),
            coherence: CoherenceDirectory::new(),
            devices,
            autotuner,
            scheduler: Scheduler::new(total_workers),
            workers: workers.clone(),
            bases: Mutex::new(HashMap::new()),
            next_base_id: AtomicU32::new(0),
            state: Mutex::new(SessionState::Recording),
            analysis_lock: Mutex::new(()),
            handles: Mutex::new(Vec::new()),
            drain_lock: Mutex::new(()),
            drain_cv: Condvar::new(),
        });

        let handles = workers
            .into_iter()
            .filter(|w| w.id != 0)
            .map(|w| {
                let session = session.clone();
                thread::Builder::new()
                    .name(format!("cj-worker-{}", w.id))
                    .spawn(move || worker_loop(session, w))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        *session.handles.lock() = handles;

        log::info!(
            "session initialised: {} executor worker(s), {} accelerator(s)",
            config.executor_workers,
            session.devices.accelerator_ids().len()
        );
        Ok(session)
    }

    /// Registers a new base matrix and returns its id. Allocation of the
    /// backing numeric buffer is an external collaborator's job (spec §1);
    /// this only records the tile grid shape the coherence directory and
    /// cost model need.
    pub fn register_base(&self, tile_rows: u32, tile_cols: u32, tile_side: u32, elem_type: ElementType) -> BaseId {
        let id = BaseId(self.next_base_id.fetch_add(1, Ordering::Relaxed));
        self.bases
            .lock()
            .insert(id, BaseMatrix::new(id, tile_rows, tile_cols, tile_side, elem_type));
        id
    }

    pub fn base(&self, id: BaseId) -> Option<BaseMatrix> {
        self.bases.lock().get(&id).cloned()
    }

    /// Creates a task, runs dependency analysis, and leaves it `NotReady`
    /// while the session is recording (spec §6 `submit`). Rejected
    /// synchronously (API misuse, spec §7) before any graph mutation if an
    /// argument names an unregistered or out-of-bounds tile.
    pub fn submit(
        &self,
        kernel_label: &'static str,
        args: Vec<MatrixRef>,
        kernel: Arc<dyn Kernel>,
    ) -> CjResult<TaskId> {
        {
            let bases = self.bases.lock();
            for arg in &args {
                let base = bases.get(&arg.tile.base).ok_or_else(|| CjError::InvalidArgument {
                    func: "submit",
                    msg: format!("tile {} references an unregistered base matrix", arg.tile),
                })?;
                if !base.contains(arg.tile) {
                    return Err(CjError::InvalidArgument {
                        func: "submit",
                        msg: format!("tile {} is out of bounds for its base matrix", arg.tile),
                    });
                }
            }
        }

        let _analysis = self.analysis_lock.lock();
        let task = self.graph.create(kernel_label, args, kernel);
        analyser::analyse(&self.graph, &self.coherence, task.id, &task.args);
        drop(_analysis);

        if *self.state.lock() == SessionState::Draining && task.pending_deps() == 0 {
            self.dispatch(task.id);
        }
        Ok(task.id)
    }

    /// Re-enters recording mode. A no-op in effect if no submissions
    /// happened since the last `queue_end` (spec §8 idempotence property).
    pub fn queue_begin(&self) {
        *self.state.lock() = SessionState::Recording;
    }

    /// Transitions to draining: every task whose pending-deps counter is
    /// already zero and which is still `NotReady` is released to the
    /// scheduler (spec §4.7).
    pub fn queue_end(&self) {
        *self.state.lock() = SessionState::Draining;
        self.release_ready();
    }

    fn release_ready(&self) {
        for id in self.graph.zero_dep_not_ready() {
            self.dispatch(id);
        }
    }

    /// Assigns `id` to a worker via the scheduler, or — when the pool has
    /// only the reserved worker — runs it inline on the spot (spec §4.4).
    fn dispatch(&self, id: TaskId) {
        let task = self.graph.get(id);
        let cost_model = CostModel::new(self.autotuner.as_ref());
        let assigned = {
            let bases = self.bases.lock();
            self.scheduler.enqueue(
                &self.graph,
                &task,
                &self.workers,
                &cost_model,
                &self.devices,
                &self.coherence,
                &bases,
            )
        };

        if assigned.is_some() {
            return;
        }

        // No executor workers: run inline on the reserved worker.
        self.graph.set_running(id, 0);
        match worker::run_task(&task, &WorkerSpec::cpu(0), &self.coherence, &self.devices) {
            Ok(()) => {
                let ready = self.graph.complete_and_collect_ready(id);
                self.notify_drain();
                for r in ready {
                    self.dispatch(r);
                }
            }
            Err(e) => {
                log::warn!("task {:?} failed inline: {e}", id);
                self.graph.fail_transitively(id);
                self.notify_drain();
            }
        }
    }

    fn notify_drain(&self) {
        self.drain_cv.notify_all();
    }

    fn all_done(&self) -> bool {
        self.graph
            .all()
            .iter()
            .all(|t| matches!(t.status(), TaskStatus::Done | TaskStatus::Failed))
    }

    fn wait_until_drained(&self) {
        loop {
            if self.all_done() {
                return;
            }
            let mut guard = self.drain_lock.lock();
            if self.all_done() {
                return;
            }
            self.drain_cv.wait_for(&mut guard, Duration::from_millis(20));
        }
    }

    /// Current status of a task — mainly useful to tests and diagnostics.
    pub fn task_status(&self, id: TaskId) -> TaskStatus {
        self.graph.get(id).status()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn coherence(&self) -> &CoherenceDirectory {
        &self.coherence
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn accelerator_cache(&self, device_id: i32) -> Option<&DeviceCache> {
        self.devices.cache_of(device_id)
    }

    /// Drains the queue, joins worker threads, and emits the final
    /// dependency graph for diagnostics (spec §4.7, §6).
    pub fn term(&self) -> TermReport {
        self.release_ready();
        self.wait_until_drained();
        self.scheduler.shutdown();

        let handles = std::mem::take(&mut *self.handles.lock());
        for h in handles {
            if let Err(e) = h.join() {
                log::error!("worker thread panicked: {e:?}");
            }
        }

        let failed_tasks = self
            .graph
            .all()
            .iter()
            .filter(|t| t.status() == TaskStatus::Failed)
            .map(|t| t.id)
            .collect();

        let _analysis = self.analysis_lock.lock();
        let dot = diagnostics::to_dot(&self.graph);
        drop(_analysis);

        log::info!("session terminated: {} task(s)", self.graph.len());
        TermReport { dot, failed_tasks }
    }
}

fn worker_loop(session: Arc<Session>, worker: WorkerSpec) {
    loop {
        let task_id = match session.scheduler.wait_pop(worker.id) {
            Some(id) => id,
            None => break,
        };
        let task = session.graph.get(task_id);
        session.graph.set_running(task_id, worker.id);

        match worker::run_task(&task, &worker, &session.coherence, &session.devices) {
            Ok(()) => {
                let ready = session.graph.complete_and_collect_ready(task_id);
                session.notify_drain();
                for r in ready {
                    session.dispatch(r);
                }
            }
            Err(e) => {
                log::warn!(
                    "task {:?} kernel failed on worker {}: {e}",
                    task_id,
                    worker.id
                );
                session.graph.fail_transitively(task_id);
                session.notify_drain();
            }
        }
    }
}
